//! Feature deriver — turns grouped rows into the flat classifier-ready table.
//!
//! This module:
//!   1. Derives the received/viewed/completed stage flags positionally
//!   2. Derives purchased, recommended_offer, and spendings
//!   3. Buckets age into generation and coarse age group, splits the
//!      membership date into year/month/day
//!   4. Merges in the customer profile
//!   5. Synthesizes a row for every (profiled customer, wave) with no events
//!
//! Missing-value policy: numerics default to 0, channel flags to false,
//! gender to Unknown, offer type to NoOffer. Age and income stay optional —
//! customers lacking demographics are excluded downstream, never imputed here.

use crate::{
    aggregate::{GroupKey, GroupedFrame, GroupedRow},
    catalog::{Channels, CustomerProfile, Gender, OfferType},
    config::PipelineConfig,
    types::{OfferIndex, PersonId, Wave},
    wave::WAVE_COUNT,
};
use crate::event::EventKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ── Categorical feature levels ───────────────────────────────────────────────

/// Offer type at the feature layer, with the explicit missing-data category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferTypeFeature {
    Bogo,
    Informational,
    Discount,
    NoOffer,
}

impl OfferTypeFeature {
    pub const ALL: [Self; 4] = [Self::Bogo, Self::Informational, Self::Discount, Self::NoOffer];

    pub fn label(self) -> &'static str {
        match self {
            Self::Bogo => "bogo",
            Self::Informational => "informational",
            Self::Discount => "discount",
            Self::NoOffer => "no_offer",
        }
    }

    fn from_offer_type(offer_type: Option<OfferType>) -> Self {
        match offer_type {
            Some(OfferType::Bogo) => Self::Bogo,
            Some(OfferType::Informational) => Self::Informational,
            Some(OfferType::Discount) => Self::Discount,
            None => Self::NoOffer,
        }
    }
}

/// Ordered five-level generation bucketing, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generation {
    Silent,
    Boomer,
    GenX,
    Millennial,
    GenZ,
}

impl Generation {
    pub const ALL: [Self; 5] = [
        Self::Silent,
        Self::Boomer,
        Self::GenX,
        Self::Millennial,
        Self::GenZ,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Boomer => "boomer",
            Self::GenX => "gen_x",
            Self::Millennial => "millennial",
            Self::GenZ => "gen_z",
        }
    }
}

/// Ordered four-level coarse age bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "18-34")]
    From18To34,
    #[serde(rename = "35-49")]
    From35To49,
    #[serde(rename = "50-64")]
    From50To64,
    #[serde(rename = "65+")]
    From65Plus,
}

impl AgeGroup {
    pub const ALL: [Self; 4] = [
        Self::From18To34,
        Self::From35To49,
        Self::From50To64,
        Self::From65Plus,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::From18To34 => "18-34",
            Self::From35To49 => "35-49",
            Self::From50To64 => "50-64",
            Self::From65Plus => "65+",
        }
    }
}

pub fn generation_of(age: u8, config: &PipelineConfig) -> Generation {
    let birth_year = config.reference_year - age as i32;
    let cut = &config.generation_cutoffs;
    if birth_year <= cut.silent_until {
        Generation::Silent
    } else if birth_year <= cut.boomer_until {
        Generation::Boomer
    } else if birth_year <= cut.gen_x_until {
        Generation::GenX
    } else if birth_year <= cut.millennial_until {
        Generation::Millennial
    } else {
        Generation::GenZ
    }
}

pub fn age_group_of(age: u8) -> AgeGroup {
    match age {
        0..=34 => AgeGroup::From18To34,
        35..=49 => AgeGroup::From35To49,
        50..=64 => AgeGroup::From50To64,
        _ => AgeGroup::From65Plus,
    }
}

// ── Feature rows ─────────────────────────────────────────────────────────────

/// One record per (customer, group), plus one synthesized record per
/// (profiled customer, wave) with no grouped row — the unit fed into the
/// training-view projectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub person_id:         PersonId,
    pub wave:              Wave,
    /// None for synthesized empty-wave rows.
    pub group:             Option<GroupKey>,
    pub received:          bool,
    pub viewed:            bool,
    pub completed:         bool,
    pub purchased:         bool,
    /// Offer index if purchased, else 0.
    pub recommended_offer: OfferIndex,
    pub amount:            f64,
    pub non_offer_amount:  f64,
    /// amount + non_offer_amount.
    pub spendings:         f64,
    pub reward:            f64,
    pub difficulty:        f64,
    pub duration_days:     f64,
    pub offer_type:        OfferTypeFeature,
    pub channels:          Channels,
    pub gender:            Gender,
    pub age:               Option<u8>,
    pub income:            Option<f64>,
    pub generation:        Option<Generation>,
    pub age_group:         Option<AgeGroup>,
    pub member_year:       Option<i32>,
    pub member_month:      Option<u32>,
    pub member_day:        Option<u32>,
}

/// Derive the full feature table from the aggregated frame and the profile.
/// Customers are the profile table, not merely the set with events: every
/// profiled customer gets a row for every wave.
pub fn derive_features(
    frame: &GroupedFrame,
    profiles: &[CustomerProfile],
    config: &PipelineConfig,
) -> Vec<FeatureRow> {
    let profile_by_id: HashMap<&str, &CustomerProfile> = profiles
        .iter()
        .map(|p| (p.person_id.as_str(), p))
        .collect();

    let mut covered: BTreeSet<(PersonId, Wave)> = BTreeSet::new();
    let mut rows = Vec::with_capacity(frame.rows.len() + profiles.len());

    for grouped in &frame.rows {
        covered.insert((grouped.person_id.clone(), grouped.wave));
        let profile = profile_by_id.get(grouped.person_id.as_str()).copied();
        rows.push(feature_row_for_group(grouped, profile, config));
    }

    // Customers with no events in a wave still produce a feature row.
    let mut synthesized = 0usize;
    for profile in profiles {
        for wave in 1..=WAVE_COUNT as Wave {
            if covered.contains(&(profile.person_id.clone(), wave)) {
                continue;
            }
            rows.push(empty_wave_row(profile, wave, config));
            synthesized += 1;
        }
    }

    log::info!(
        "features: {} rows derived ({} synthesized for empty waves)",
        rows.len(),
        synthesized
    );
    rows
}

fn feature_row_for_group(
    grouped: &GroupedRow,
    profile: Option<&CustomerProfile>,
    config: &PipelineConfig,
) -> FeatureRow {
    // Positional stage checks. Index 1 or 2 for completed tolerates the
    // informational completed-without-viewed ordering.
    let received = grouped.events.first() == Some(&EventKind::OfferReceived);
    let viewed = grouped.events.get(1) == Some(&EventKind::OfferViewed);
    let completed = grouped.events.get(1) == Some(&EventKind::OfferCompleted)
        || grouped.events.get(2) == Some(&EventKind::OfferCompleted);

    let purchased = if received {
        viewed && completed
    } else {
        grouped.non_offer_amount > 0.0
    };
    let recommended_offer = if purchased { grouped.offer_index } else { 0 };

    let mut row = FeatureRow {
        person_id:         grouped.person_id.clone(),
        wave:              grouped.wave,
        group:             Some(grouped.key),
        received,
        viewed,
        completed,
        purchased,
        recommended_offer,
        amount:            grouped.amount,
        non_offer_amount:  grouped.non_offer_amount,
        spendings:         grouped.amount + grouped.non_offer_amount,
        reward:            grouped.reward,
        difficulty:        grouped.difficulty,
        duration_days:     grouped.duration_days,
        offer_type:        OfferTypeFeature::from_offer_type(grouped.offer_type),
        channels:          grouped.channels,
        gender:            Gender::Unknown,
        age:               None,
        income:            None,
        generation:        None,
        age_group:         None,
        member_year:       None,
        member_month:      None,
        member_day:        None,
    };
    if let Some(profile) = profile {
        merge_profile(&mut row, profile, config);
    }
    row
}

fn empty_wave_row(profile: &CustomerProfile, wave: Wave, config: &PipelineConfig) -> FeatureRow {
    let mut row = FeatureRow {
        person_id:         profile.person_id.clone(),
        wave,
        group:             None,
        received:          false,
        viewed:            false,
        completed:         false,
        purchased:         false,
        recommended_offer: 0,
        amount:            0.0,
        non_offer_amount:  0.0,
        spendings:         0.0,
        reward:            0.0,
        difficulty:        0.0,
        duration_days:     0.0,
        offer_type:        OfferTypeFeature::NoOffer,
        channels:          Channels::default(),
        gender:            Gender::Unknown,
        age:               None,
        income:            None,
        generation:        None,
        age_group:         None,
        member_year:       None,
        member_month:      None,
        member_day:        None,
    };
    merge_profile(&mut row, profile, config);
    row
}

fn merge_profile(row: &mut FeatureRow, profile: &CustomerProfile, config: &PipelineConfig) {
    use chrono::Datelike;

    row.gender = profile.gender;
    row.age = profile.age;
    row.income = profile.income;
    if let Some(age) = profile.age {
        row.generation = Some(generation_of(age, config));
        row.age_group = Some(age_group_of(age));
    }
    if let Some(date) = profile.became_member_on {
        row.member_year = Some(date.year());
        row.member_month = Some(date.month());
        row.member_day = Some(date.day());
    }
}
