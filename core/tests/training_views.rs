mod common;

use common::*;
use chrono::NaiveDate;
use promolens_core::aggregate::aggregate_groups;
use promolens_core::catalog::{CustomerProfile, Gender, OfferType};
use promolens_core::features::derive_features;
use promolens_core::grouping::group_transcript;
use promolens_core::training::{receive_view, select_view};
use promolens_core::PipelineConfig;

fn profile(person: &str, age: Option<u8>, income: Option<f64>) -> CustomerProfile {
    CustomerProfile {
        person_id:        person.to_string(),
        gender:           Gender::M,
        age,
        income,
        became_member_on: NaiveDate::from_ymd_opt(2016, 7, 1),
    }
}

/// One purchased lifecycle for person `p` at `spec` index 1.
fn purchased_events(person: &str) -> Vec<promolens_core::event::Event> {
    let a = spec(1, OfferType::Discount, 10.0, 5.0);
    vec![
        received(person, &a, 0),
        viewed(person, &a, 1),
        transaction(person, 2, 12.0),
        completed(person, &a, 2),
    ]
}

/// The receive view keeps only known-age rows that actually received an
/// offer; synthesized and non-offer rows disappear.
#[test]
fn receive_view_filters_rows() {
    let mut events = purchased_events("with-age");
    events.extend(purchased_events("no-age"));
    events.push(transaction("with-age", 300, 5.0)); // non-offer row

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    let config = PipelineConfig::default();
    let profiles = vec![
        profile("with-age", Some(30), Some(55_000.0)),
        profile("no-age", None, None),
    ];
    let features = derive_features(&frame, &profiles, &config);
    let view = receive_view(&features, &config);

    // Only with-age's offer-group row survives.
    assert_eq!(view.rows.len(), 1);

    let purchased_col = view.column("purchased").unwrap();
    assert_eq!(purchased_col, vec![1.0]);

    // One-hot demographics: male, millennial, 18-34, discount.
    assert_eq!(view.column("gender_m").unwrap(), vec![1.0]);
    assert_eq!(view.column("gender_f").unwrap(), vec![0.0]);
    assert_eq!(view.column("generation_millennial").unwrap(), vec![1.0]);
    assert_eq!(view.column("age_group_18-34").unwrap(), vec![1.0]);
    assert_eq!(view.column("offer_type_discount").unwrap(), vec![1.0]);
    assert_eq!(view.column("member_year").unwrap(), vec![2016.0]);
}

/// Missing income is imputed — no NaN survives projection.
#[test]
fn receive_view_imputes_missing_income() {
    let mut events = Vec::new();
    let mut profiles = Vec::new();
    for i in 0..30 {
        let person = format!("p{i:02}");
        events.extend(purchased_events(&person));
        let income = if i == 0 { None } else { Some(40_000.0 + i as f64 * 500.0) };
        profiles.push(profile(&person, Some(20 + i as u8), income));
    }

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    let config = PipelineConfig::default();
    let features = derive_features(&frame, &profiles, &config);
    let view = receive_view(&features, &config);

    assert_eq!(view.rows.len(), 30);
    for row in &view.rows {
        assert!(row.iter().all(|v| v.is_finite()), "NaN survived imputation");
    }
    let incomes = view.column("income").unwrap();
    let (min, max) = incomes
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    // The imputed value stays within the observed income range.
    assert!(min >= 40_000.0 && max <= 55_000.0);
}

/// The select view collapses to one row per customer with multi-hot offer
/// presence columns over every distinct earned recommendation.
#[test]
fn select_view_collapses_per_customer() {
    let a = spec(1, OfferType::Discount, 10.0, 5.0);
    let b = spec(2, OfferType::Bogo, 5.0, 5.0);
    let mut events = vec![
        received("p", &a, 0),
        viewed("p", &a, 1),
        transaction("p", 2, 12.0),
        completed("p", &a, 2),
        // second wave, offer b also purchased
        received("p", &b, 200),
        viewed("p", &b, 201),
        transaction("p", 202, 6.0),
        completed("p", &b, 203),
        // third wave, offer a purchased again — deduplicated
        received("p", &a, 420),
        viewed("p", &a, 421),
        transaction("p", 422, 11.0),
        completed("p", &a, 423),
    ];
    events.extend(purchased_events("q"));

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    let config = PipelineConfig::default();
    let profiles = vec![
        profile("p", Some(30), Some(50_000.0)),
        profile("q", Some(45), Some(52_000.0)),
    ];
    let features = derive_features(&frame, &profiles, &config);
    let view = select_view(&features, 10, &config);

    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.column("1").unwrap(), vec![1.0, 1.0]);
    assert_eq!(view.column("2").unwrap(), vec![1.0, 0.0]);
    assert_eq!(view.column("3").unwrap(), vec![0.0, 0.0]);
    assert_eq!(view.column("age").unwrap(), vec![30.0, 45.0]);
}

/// Income outliers beyond the Tukey fences drop out of the select view.
#[test]
fn select_view_drops_income_outliers() {
    let mut events = Vec::new();
    let mut profiles = Vec::new();
    for i in 0..20 {
        let person = format!("p{i:02}");
        events.extend(purchased_events(&person));
        profiles.push(profile(&person, Some(30), Some(50_000.0 + i as f64 * 100.0)));
    }
    // One extreme earner far beyond Q3 + 1.5*IQR.
    events.extend(purchased_events("rich"));
    profiles.push(profile("rich", Some(30), Some(400_000.0)));

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    let config = PipelineConfig::default();
    let features = derive_features(&frame, &profiles, &config);
    let view = select_view(&features, 10, &config);

    assert_eq!(view.rows.len(), 20);
    let incomes = view.column("income").unwrap();
    assert!(incomes.iter().all(|&v| v < 100_000.0));
}

/// The fence width is a config knob: widening it keeps rows the default
/// multiplier would drop.
#[test]
fn wider_iqr_fences_keep_the_outlier() {
    let mut events = Vec::new();
    let mut profiles = Vec::new();
    for i in 0..20 {
        let person = format!("p{i:02}");
        events.extend(purchased_events(&person));
        profiles.push(profile(&person, Some(30), Some(50_000.0 + i as f64 * 100.0)));
    }
    events.extend(purchased_events("rich"));
    profiles.push(profile("rich", Some(30), Some(400_000.0)));

    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    let config = PipelineConfig {
        iqr_multiplier: 400.0,
        ..PipelineConfig::default()
    };
    let features = derive_features(&frame, &profiles, &config);
    let view = select_view(&features, 10, &config);

    assert_eq!(view.rows.len(), 21);
    let incomes = view.column("income").unwrap();
    assert!(incomes.iter().any(|&v| v == 400_000.0));
}

/// Customers lacking age or income never reach either training view.
#[test]
fn demographic_less_customers_excluded_from_views() {
    let events = purchased_events("anon");
    let frame = aggregate_groups(&group_transcript(&events).unwrap());
    let config = PipelineConfig::default();
    let profiles = vec![profile("anon", None, None)];
    let features = derive_features(&frame, &profiles, &config);

    assert!(!features.is_empty()); // retained in the raw feature table
    assert!(receive_view(&features, &config).rows.is_empty());
    assert!(select_view(&features, 10, &config).rows.is_empty());
}
