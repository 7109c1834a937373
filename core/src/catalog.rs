//! Input tables — portfolio, profile, transcript.
//!
//! RULE: Only this module parses the raw JSON tables.
//! Everything downstream works with the cleaned, typed rows.
//!
//! Cleaning performed here:
//!   - offer_type and channel strings become enums / flag structs
//!   - `became_member_on` integers (YYYYMMDD) become chrono dates
//!   - the age-missing sentinel (118) becomes None
//!   - each offer gets a stable 1-based index from its table position

use crate::{
    error::{PipeResult, PipelineError},
    types::{OfferId, OfferIndex, PersonId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Age value the source profile table uses to encode "not provided".
const AGE_MISSING_SENTINEL: i64 = 118;

// ── Categorical types ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    Bogo,
    Informational,
    Discount,
}

impl OfferType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "bogo" => Some(Self::Bogo),
            "informational" => Some(Self::Informational),
            "discount" => Some(Self::Discount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    F,
    M,
    O,
    /// Explicit missing-data category — never silently dropped.
    Unknown,
}

/// Delivery channel flags for one offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channels {
    pub email:  bool,
    pub mobile: bool,
    pub social: bool,
    pub web:    bool,
}

impl Channels {
    pub fn from_names(names: &[String]) -> Self {
        let mut ch = Channels::default();
        for name in names {
            match name.as_str() {
                "email" => ch.email = true,
                "mobile" => ch.mobile = true,
                "social" => ch.social = true,
                "web" => ch.web = true,
                other => log::warn!("portfolio: ignoring unknown channel '{other}'"),
            }
        }
        ch
    }
}

// ── Raw table records (as serialized in the JSON files) ──────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RawPortfolioRecord {
    pub id:         OfferId,
    pub offer_type: String,
    pub difficulty: f64,
    pub reward:     f64,
    /// Validity duration in days.
    pub duration:   f64,
    pub channels:   Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawProfileRecord {
    pub id:               PersonId,
    #[serde(default)]
    pub gender:           Option<String>,
    #[serde(default)]
    pub age:              Option<i64>,
    #[serde(default)]
    pub income:           Option<f64>,
    #[serde(default)]
    pub became_member_on: Option<u64>,
}

/// One raw transcript line. The `value` payload is schema-shifting in the
/// source data ("offer id" for received/viewed, "offer_id" for completed,
/// "amount" for transactions), so it stays a JSON value until normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTranscriptRecord {
    pub person: PersonId,
    pub event:  String,
    pub time:   i64,
    #[serde(default)]
    pub value:  serde_json::Value,
}

impl RawTranscriptRecord {
    /// The offer id carried in the value payload, under either key spelling.
    pub fn offer_id(&self) -> Option<&str> {
        self.value
            .get("offer id")
            .or_else(|| self.value.get("offer_id"))
            .and_then(|v| v.as_str())
    }

    pub fn amount(&self) -> f64 {
        self.value.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0)
    }
}

// ── Cleaned tables ───────────────────────────────────────────────────────────

/// One cleaned portfolio entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferSpec {
    pub offer_id:      OfferId,
    /// 1-based position in the portfolio table. Stable across the run;
    /// this is the numeric offer id the training views expose.
    pub index:         OfferIndex,
    pub offer_type:    OfferType,
    pub channels:      Channels,
    pub difficulty:    f64,
    pub reward:        f64,
    pub duration_days: f64,
}

/// The cleaned portfolio, with an id lookup preserving table order.
#[derive(Debug, Clone)]
pub struct Portfolio {
    offers: Vec<OfferSpec>,
    by_id:  HashMap<OfferId, usize>,
}

impl Portfolio {
    pub fn from_records(records: Vec<RawPortfolioRecord>) -> PipeResult<Self> {
        if records.is_empty() {
            return Err(PipelineError::EmptyTable { name: "portfolio" });
        }
        let mut offers = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());
        for (pos, rec) in records.into_iter().enumerate() {
            let offer_type = OfferType::parse(&rec.offer_type).ok_or_else(|| {
                anyhow::anyhow!("portfolio offer '{}' has unknown type '{}'", rec.id, rec.offer_type)
            })?;
            by_id.insert(rec.id.clone(), pos);
            offers.push(OfferSpec {
                offer_id:      rec.id,
                index:         (pos + 1) as OfferIndex,
                offer_type,
                channels:      Channels::from_names(&rec.channels),
                difficulty:    rec.difficulty,
                reward:        rec.reward,
                duration_days: rec.duration,
            });
        }
        Ok(Self { offers, by_id })
    }

    pub fn get(&self, offer_id: &str) -> Option<&OfferSpec> {
        self.by_id.get(offer_id).map(|&pos| &self.offers[pos])
    }

    pub fn offers(&self) -> &[OfferSpec] {
        &self.offers
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

/// One cleaned customer profile row. Age and income stay optional: customers
/// lacking demographics are excluded from training views downstream, never
/// imputed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub person_id:        PersonId,
    pub gender:           Gender,
    pub age:              Option<u8>,
    pub income:           Option<f64>,
    pub became_member_on: Option<NaiveDate>,
}

pub fn clean_profile(records: Vec<RawProfileRecord>) -> PipeResult<Vec<CustomerProfile>> {
    if records.is_empty() {
        return Err(PipelineError::EmptyTable { name: "profile" });
    }
    let mut out = Vec::with_capacity(records.len());
    for rec in records {
        let gender = match rec.gender.as_deref() {
            Some("F") => Gender::F,
            Some("M") => Gender::M,
            Some("O") => Gender::O,
            _ => Gender::Unknown,
        };
        let age = match rec.age {
            Some(a) if a != AGE_MISSING_SENTINEL && (0..=117).contains(&a) => Some(a as u8),
            _ => None,
        };
        let became_member_on = rec.became_member_on.and_then(parse_member_date);
        out.push(CustomerProfile {
            person_id: rec.id,
            gender,
            age,
            income: rec.income,
            became_member_on,
        });
    }
    Ok(out)
}

/// `became_member_on` is stored as a YYYYMMDD integer, e.g. 20170212.
fn parse_member_date(raw: u64) -> Option<NaiveDate> {
    let year = (raw / 10_000) as i32;
    let month = ((raw / 100) % 100) as u32;
    let day = (raw % 100) as u32;
    let date = NaiveDate::from_ymd_opt(year, month, day);
    if date.is_none() {
        log::warn!("profile: unparseable became_member_on value {raw}");
    }
    date
}

// ── JSON loading ─────────────────────────────────────────────────────────────

pub fn load_portfolio(path: &Path) -> PipeResult<Portfolio> {
    let records: Vec<RawPortfolioRecord> = load_json(path)?;
    Portfolio::from_records(records)
}

pub fn load_profile(path: &Path) -> PipeResult<Vec<CustomerProfile>> {
    let records: Vec<RawProfileRecord> = load_json(path)?;
    clean_profile(records)
}

pub fn load_transcript(path: &Path) -> PipeResult<Vec<RawTranscriptRecord>> {
    let records: Vec<RawTranscriptRecord> = load_json(path)?;
    if records.is_empty() {
        return Err(PipelineError::EmptyTable { name: "transcript" });
    }
    Ok(records)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> PipeResult<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
