//! Normalized events and attribution targets.
//!
//! RULE: every event downstream of the normalizer carries its wave and day
//! buckets and its portfolio-derived offer attributes. The grouping engine
//! never looks anything up — it only reads event fields.

use crate::{
    catalog::{Channels, OfferType},
    types::{GroupId, OfferId, OfferIndex, PersonId, Timestamp, Wave},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OfferReceived,
    OfferViewed,
    OfferCompleted,
    Transaction,
}

impl EventKind {
    /// Parse the transcript's event labels ("offer received", "transaction").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "offer received" | "offer_received" => Some(Self::OfferReceived),
            "offer viewed" | "offer_viewed" => Some(Self::OfferViewed),
            "offer completed" | "offer_completed" => Some(Self::OfferCompleted),
            "transaction" => Some(Self::Transaction),
            _ => None,
        }
    }
}

/// One normalized transcript event. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub person_id:     PersonId,
    pub kind:          EventKind,
    /// None for transactions.
    pub offer_id:      Option<OfferId>,
    /// 0 for transactions.
    pub offer_index:   OfferIndex,
    pub time:          Timestamp,
    pub wave:          Wave,
    pub day:           i64,
    /// Transaction amount; 0 for non-transaction events.
    pub amount:        f64,
    // Portfolio-derived offer attributes (zeroed for transactions).
    pub channels:      Channels,
    pub duration_days: f64,
    pub difficulty:    f64,
    pub reward:        f64,
    pub offer_type:    Option<OfferType>,
}

/// Where the grouping engine assigned an event.
///
/// A tagged type rather than a signed sentinel id: positive ids, negative
/// wave-keyed ids, and the orphan zero were distinct numeric cases in the
/// source encoding and are distinct variants here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attribution {
    /// A real offer group, by per-customer group id.
    Group { id: GroupId },
    /// The synthetic per-wave bucket for spend unrelated to any active offer.
    NonOffer { wave: Wave },
    /// Orphaned view/complete event with no matching group. Tolerated,
    /// logged, and excluded from aggregation.
    Unmatched,
}

/// An event plus its assigned attribution. The informational post-pass may
/// rewrite `kind` from Transaction to OfferCompleted; `synthesized` records
/// that the completion never appeared verbatim in the raw stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedEvent {
    pub event:       Event,
    pub attribution: Attribution,
    pub synthesized: bool,
}
