//! Offer grouping engine — the core state machine.
//!
//! Partitions one customer's chronologically-sorted event sequence into
//! offer groups: one group per `offer received` event, reconstructing that
//! offer instance's lifecycle (receive → view → complete / transactions).
//!
//! Attribution rules, in event order:
//!   1. OfferReceived   — deactivate every prior group, open a new one
//!   2. Viewed/Completed — first group (creation order) with a matching
//!      offer id that has not yet seen this kind; expiry, active, and
//!      redeemed state are ignored so lagging signals still land
//!   3. Transaction     — the single active, unexpired, unredeemed group;
//!      otherwise the wave-keyed non-offer bucket
//!   4. Post-pass       — transactions absorbed by informational groups are
//!      rewritten into synthetic OfferCompleted events, since informational
//!      offers have no explicit completion signal
//!
//! The per-customer group set is discarded after each customer; no state
//! crosses a customer boundary.

use crate::{
    error::{PipeResult, PipelineError},
    event::{AttributedEvent, Attribution, Event, EventKind},
    types::{GroupId, OfferId, OfferIndex, PersonId, Timestamp},
};
use crate::catalog::OfferType;
use std::collections::BTreeMap;

// ── Group state ──────────────────────────────────────────────────────────────

/// The reconstructed lifecycle of one received-offer instance.
#[derive(Debug, Clone)]
pub struct OfferGroup {
    pub group_id:             GroupId,
    pub offer_id:             OfferId,
    pub offer_index:          OfferIndex,
    pub offer_type:           OfferType,
    /// Difficulty remaining before redemption; decremented per transaction.
    pub remaining_difficulty: f64,
    /// receive_time + duration_days * 24.
    pub expiry:               Timestamp,
    pub seen_viewed:          bool,
    pub seen_completed:       bool,
    pub redeemed:             bool,
    /// Cleared as soon as the customer receives a newer offer. Inactive
    /// groups still match viewed/completed but never another redemption.
    pub active:               bool,
}

impl OfferGroup {
    fn open(group_id: GroupId, event: &Event) -> Self {
        Self {
            group_id,
            offer_id:             event.offer_id.clone().unwrap_or_default(),
            offer_index:          event.offer_index,
            offer_type:           event.offer_type.unwrap_or(OfferType::Informational),
            remaining_difficulty: event.difficulty,
            expiry:               event.time + (event.duration_days * 24.0) as Timestamp,
            seen_viewed:          false,
            seen_completed:       false,
            redeemed:             false,
            active:               true,
        }
    }

    /// Whether a viewed/completed signal for `offer_id` belongs here.
    /// Deliberately ignores expiry and active/redeemed state: a late view
    /// on an expired group is still that group's view.
    fn matches_signal(&self, kind: EventKind, offer_id: &str) -> bool {
        if self.offer_id != offer_id {
            return false;
        }
        match kind {
            EventKind::OfferViewed => !self.seen_viewed,
            EventKind::OfferCompleted => !self.seen_completed,
            _ => false,
        }
    }

    fn mark_seen(&mut self, kind: EventKind) {
        match kind {
            EventKind::OfferViewed => self.seen_viewed = true,
            EventKind::OfferCompleted => self.seen_completed = true,
            _ => {}
        }
    }

    fn can_redeem(&self, time: Timestamp) -> bool {
        self.active && !self.redeemed && time <= self.expiry
    }

    fn absorb_transaction(&mut self, amount: f64) {
        self.remaining_difficulty -= amount;
        self.redeemed = self.remaining_difficulty <= 0.0;
    }
}

/// One customer's group set, in creation order. Creation order is the
/// first-match tie-break, so this is a plain ordered list, never a hash map.
#[derive(Debug, Clone, Default)]
pub struct OfferGroups {
    groups:  Vec<OfferGroup>,
    next_id: GroupId,
}

impl OfferGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[OfferGroup] {
        &self.groups
    }

    pub fn get(&self, id: GroupId) -> Option<&OfferGroup> {
        self.groups.iter().find(|g| g.group_id == id)
    }
}

// ── State transition ─────────────────────────────────────────────────────────

/// Apply one event to the group set. Takes the prior set and returns the new
/// set plus the event's attribution — no hidden mutation, so fixtures can
/// drive it event by event.
pub fn step(mut groups: OfferGroups, event: &Event) -> (OfferGroups, Attribution) {
    let attribution = match event.kind {
        EventKind::OfferReceived => {
            // Receiving a new offer ends redemption eligibility for every
            // prior group; they stay addressable for view/complete matches.
            for group in &mut groups.groups {
                group.active = false;
            }
            groups.next_id += 1;
            let id = groups.next_id;
            groups.groups.push(OfferGroup::open(id, event));
            Attribution::Group { id }
        }
        EventKind::OfferViewed | EventKind::OfferCompleted => {
            let offer_id = event.offer_id.as_deref().unwrap_or("");
            match groups
                .groups
                .iter_mut()
                .find(|g| g.matches_signal(event.kind, offer_id))
            {
                Some(group) => {
                    group.mark_seen(event.kind);
                    Attribution::Group { id: group.group_id }
                }
                None => Attribution::Unmatched,
            }
        }
        EventKind::Transaction => {
            match groups.groups.iter_mut().find(|g| g.can_redeem(event.time)) {
                Some(group) => {
                    group.absorb_transaction(event.amount);
                    Attribution::Group { id: group.group_id }
                }
                None => Attribution::NonOffer { wave: event.wave },
            }
        }
    };
    (groups, attribution)
}

// ── Per-customer pass ────────────────────────────────────────────────────────

/// Group one customer's sorted event sequence. Fails fast on a timestamp
/// regression — attribution is order-sensitive, and silently mis-grouping
/// is worse than rejecting the batch.
pub fn group_customer_events(events: &[Event]) -> PipeResult<Vec<AttributedEvent>> {
    let mut groups = OfferGroups::new();
    let mut out = Vec::with_capacity(events.len());
    let mut prev_time: Option<Timestamp> = None;

    for event in events {
        if let Some(prev) = prev_time {
            if event.time < prev {
                return Err(PipelineError::UnsortedTranscript {
                    person_id: event.person_id.clone(),
                    prev,
                    next: event.time,
                });
            }
        }
        prev_time = Some(event.time);

        let (next, attribution) = step(groups, event);
        groups = next;

        if attribution == Attribution::Unmatched {
            log::warn!(
                "grouping: orphaned {:?} for person {} offer {:?} at t={}",
                event.kind,
                event.person_id,
                event.offer_id,
                event.time
            );
        }

        out.push(AttributedEvent {
            event: event.clone(),
            attribution,
            synthesized: false,
        });
    }

    rewrite_informational_completions(&groups, &mut out);
    Ok(out)
}

/// Informational offers carry no explicit completion signal: "completed"
/// means a purchase happened while the offer was active. Rewrite any
/// transaction attributed to an informational group into a synthetic
/// OfferCompleted, keeping the amount for aggregation.
fn rewrite_informational_completions(groups: &OfferGroups, out: &mut [AttributedEvent]) {
    for attributed in out.iter_mut() {
        if attributed.event.kind != EventKind::Transaction {
            continue;
        }
        let Attribution::Group { id } = attributed.attribution else {
            continue;
        };
        let Some(group) = groups.get(id) else { continue };
        if group.offer_type == OfferType::Informational {
            attributed.event.kind = EventKind::OfferCompleted;
            attributed.synthesized = true;
        }
    }
}

/// Group a whole normalized transcript: split by customer (customers are
/// independent — no ordering dependency crosses a customer boundary), run
/// the per-customer pass, and concatenate in customer order.
pub fn group_transcript(events: &[Event]) -> PipeResult<Vec<AttributedEvent>> {
    let mut per_person: BTreeMap<PersonId, Vec<Event>> = BTreeMap::new();
    for event in events {
        per_person
            .entry(event.person_id.clone())
            .or_default()
            .push(event.clone());
    }

    let customers = per_person.len();
    let mut out = Vec::with_capacity(events.len());
    for (_, person_events) in per_person {
        out.extend(group_customer_events(&person_events)?);
    }

    log::info!(
        "grouping: {} events attributed across {} customers",
        out.len(),
        customers
    );
    Ok(out)
}
