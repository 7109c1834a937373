//! Group aggregator — collapses the attributed event stream into one row
//! per (customer, group).
//!
//! Produces:
//!   1. GroupedRow per real offer group: ordered event-kind list, summed
//!      transaction amount, max reward/difficulty/duration, first offer
//!      type and channels, min wave
//!   2. GroupedRow per non-offer bucket with spend, so background spend is
//!      visible even for customers who never held an offer in that wave
//!   3. A per-(customer, wave) non-offer spend map, left-joined back onto
//!      every row of the same customer-wave as `non_offer_amount`
//!
//! The spend map is the accounting source of truth: conservation checks run
//! against it, not against the joined copies.

use crate::{
    catalog::{Channels, OfferType},
    event::{AttributedEvent, Attribution, EventKind},
    types::{GroupId, OfferId, OfferIndex, PersonId, Wave},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies one grouped row within a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKey {
    /// A reconstructed offer lifecycle.
    Offer { id: GroupId },
    /// The synthetic non-offer bucket for one wave.
    NonOffer { wave: Wave },
}

/// One record per (customer, group) — the unit fed into feature derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedRow {
    pub person_id:        PersonId,
    pub key:              GroupKey,
    /// Minimum wave over the group's events; the profile join key.
    pub wave:             Wave,
    /// 0 for non-offer rows.
    pub offer_index:      OfferIndex,
    pub offer_id:         Option<OfferId>,
    /// Ordered non-transaction event kinds, after the informational
    /// completion rewrite. Positional stage checks read this.
    pub events:           Vec<EventKind>,
    /// Summed transaction amount attributed to this group.
    pub amount:           f64,
    pub reward:           f64,
    pub difficulty:       f64,
    pub duration_days:    f64,
    pub offer_type:       Option<OfferType>,
    pub channels:         Channels,
    /// Background spend of the same (customer, wave); joined after the fold.
    pub non_offer_amount: f64,
}

/// Aggregated output: rows plus the canonical non-offer spend map.
#[derive(Debug, Clone, Default)]
pub struct GroupedFrame {
    pub rows:             Vec<GroupedRow>,
    pub non_offer_spend:  BTreeMap<(PersonId, Wave), f64>,
    pub unmatched_events: usize,
}

pub fn aggregate_groups(attributed: &[AttributedEvent]) -> GroupedFrame {
    let mut accums: BTreeMap<(PersonId, GroupKey), GroupedRow> = BTreeMap::new();
    let mut non_offer_spend: BTreeMap<(PersonId, Wave), f64> = BTreeMap::new();
    let mut unmatched_events = 0usize;

    for attr in attributed {
        let event = &attr.event;
        let key = match attr.attribution {
            Attribution::Group { id } => GroupKey::Offer { id },
            Attribution::NonOffer { wave } => {
                *non_offer_spend
                    .entry((event.person_id.clone(), wave))
                    .or_insert(0.0) += event.amount;
                GroupKey::NonOffer { wave }
            }
            Attribution::Unmatched => {
                unmatched_events += 1;
                continue;
            }
        };

        let row = accums
            .entry((event.person_id.clone(), key))
            .or_insert_with(|| GroupedRow {
                person_id:        event.person_id.clone(),
                key,
                wave:             event.wave,
                offer_index:      0,
                offer_id:         None,
                events:           Vec::new(),
                amount:           0.0,
                reward:           0.0,
                difficulty:       0.0,
                duration_days:    0.0,
                offer_type:       None,
                channels:         Channels::default(),
                non_offer_amount: 0.0,
            });

        row.wave = row.wave.min(event.wave);
        row.offer_index = row.offer_index.max(event.offer_index);
        if row.offer_id.is_none() {
            row.offer_id = event.offer_id.clone();
        }
        if event.kind != EventKind::Transaction {
            row.events.push(event.kind);
        }
        // Transactions carry the amount; so do synthesized completions,
        // which were transactions before the informational rewrite.
        row.amount += event.amount;
        row.reward = row.reward.max(event.reward);
        row.difficulty = row.difficulty.max(event.difficulty);
        row.duration_days = row.duration_days.max(event.duration_days);
        if row.offer_type.is_none() {
            row.offer_type = event.offer_type;
            row.channels = event.channels;
        }
    }

    // Non-offer rows hold their spend in non_offer_amount, not amount,
    // matching the pulled-out field the join produces for offer rows.
    let mut rows: Vec<GroupedRow> = accums.into_values().collect();
    for row in &mut rows {
        if let GroupKey::NonOffer { .. } = row.key {
            row.amount = 0.0;
        }
        row.non_offer_amount = non_offer_spend
            .get(&(row.person_id.clone(), row.wave))
            .copied()
            .unwrap_or(0.0);
    }

    log::info!(
        "aggregator: {} grouped rows, {} non-offer buckets, {} orphaned events",
        rows.len(),
        non_offer_spend.len(),
        unmatched_events
    );

    GroupedFrame {
        rows,
        non_offer_spend,
        unmatched_events,
    }
}
