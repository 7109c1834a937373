//! Shared primitive types used across the entire pipeline.

/// A customer identifier, as it appears in the profile and transcript tables.
pub type PersonId = String;

/// A portfolio offer identifier (opaque hash string in the source tables).
pub type OfferId = String;

/// An event timestamp, in hours since the start of the observation window.
pub type Timestamp = i64;

/// A campaign wave number, 1..=6.
pub type Wave = u8;

/// A per-customer offer-group identifier. Assigned 1, 2, 3, ... in receive
/// order within one customer's pass; never shared across customers.
pub type GroupId = u32;

/// The 1-based position of an offer in the portfolio table.
/// 0 is the "no offer" sentinel used by `recommended_offer` and the
/// select view's multi-hot columns.
pub type OfferIndex = u8;
