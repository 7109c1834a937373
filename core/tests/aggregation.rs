mod common;

use common::*;
use promolens_core::aggregate::{aggregate_groups, GroupKey};
use promolens_core::catalog::OfferType;
use promolens_core::event::EventKind;
use promolens_core::grouping::group_transcript;

/// One row per (customer, group): ordered kind list, summed amount, offer
/// attributes from the receive event.
#[test]
fn grouped_row_collapses_one_lifecycle() {
    let a = spec(1, OfferType::Discount, 10.0, 5.0);
    let events = vec![
        received("p", &a, 0),
        viewed("p", &a, 1),
        transaction("p", 2, 12.0),
        completed("p", &a, 2),
    ];

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    assert_eq!(frame.rows.len(), 1);

    let row = &frame.rows[0];
    assert_eq!(row.key, GroupKey::Offer { id: 1 });
    assert_eq!(
        row.events,
        vec![
            EventKind::OfferReceived,
            EventKind::OfferViewed,
            EventKind::OfferCompleted
        ]
    );
    assert_eq!(row.amount, 12.0);
    assert_eq!(row.difficulty, 10.0);
    assert_eq!(row.duration_days, 5.0);
    assert_eq!(row.offer_type, Some(OfferType::Discount));
    assert_eq!(row.offer_index, 1);
    assert_eq!(row.wave, 1);
    assert_eq!(row.non_offer_amount, 0.0);
    assert!(row.channels.email);
}

/// Background spend in the same wave is pulled into non_offer_amount on the
/// offer row, and the non-offer bucket surfaces as its own row.
#[test]
fn non_offer_spend_joins_back_onto_offer_rows() {
    let a = spec(1, OfferType::Discount, 50.0, 1.0); // expires t=24
    let events = vec![
        received("p", &a, 0),
        transaction("p", 2, 5.0),   // absorbed by the group (not redeemed)
        transaction("p", 30, 7.0),  // expired → non-offer, wave 1
        transaction("p", 40, 3.0),  // ditto
    ];

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    assert_eq!(frame.rows.len(), 2);

    let offer_row = frame
        .rows
        .iter()
        .find(|r| matches!(r.key, GroupKey::Offer { .. }))
        .unwrap();
    assert_eq!(offer_row.amount, 5.0);
    assert_eq!(offer_row.non_offer_amount, 10.0);

    let bucket_row = frame
        .rows
        .iter()
        .find(|r| r.key == GroupKey::NonOffer { wave: 1 })
        .unwrap();
    assert_eq!(bucket_row.amount, 0.0);
    assert_eq!(bucket_row.non_offer_amount, 10.0);
    assert_eq!(bucket_row.offer_index, 0);
    assert!(bucket_row.events.is_empty());

    assert_eq!(
        frame.non_offer_spend.get(&("p".to_string(), 1)),
        Some(&10.0)
    );
}

/// Every transaction dollar shows up exactly once: grouped amounts plus the
/// per-(customer, wave) non-offer spend map equal the raw total.
#[test]
fn conservation_of_spend() {
    let a = spec(1, OfferType::Discount, 10.0, 2.0);
    let info = spec(3, OfferType::Informational, 0.0, 3.0);
    let events = vec![
        received("p", &a, 0),
        transaction("p", 1, 4.0),
        transaction("p", 2, 7.0),   // redeems a
        transaction("p", 3, 2.5),   // redeemed → non-offer
        received("p", &info, 200),
        transaction("p", 210, 6.0), // synthesized completion, amount kept
        transaction("p", 600, 1.5), // expired → non-offer, wave 6
    ];
    let raw_total: f64 = events
        .iter()
        .filter(|e| e.kind == EventKind::Transaction)
        .map(|e| e.amount)
        .sum();

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    let grouped: f64 = frame.rows.iter().map(|r| r.amount).sum();
    let non_offer: f64 = frame.non_offer_spend.values().sum();
    assert!((raw_total - (grouped + non_offer)).abs() < 1e-9);
}

/// The informational group's aggregated list contains the synthesized
/// completion even though the raw stream never carried one.
#[test]
fn informational_completion_reaches_the_event_list() {
    let info = spec(3, OfferType::Informational, 0.0, 3.0);
    let events = vec![received("p", &info, 0), transaction("p", 5, 9.0)];

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    let row = &frame.rows[0];
    assert_eq!(
        row.events,
        vec![EventKind::OfferReceived, EventKind::OfferCompleted]
    );
    assert_eq!(row.amount, 9.0);
}

/// Orphaned signals are counted but produce no rows.
#[test]
fn orphans_are_counted_not_aggregated() {
    let a = spec(1, OfferType::Bogo, 5.0, 7.0);
    let events = vec![viewed("p", &a, 3)];

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    assert_eq!(frame.unmatched_events, 1);
    assert!(frame.rows.is_empty());
}
