//! The batch pipeline — fixed stage order, logged progress.
//!
//! STAGE ORDER (fixed, documented, never reordered):
//!   1. Normalizer      (portfolio join, wave/day buckets)
//!   2. Grouping engine (per-customer offer groups)
//!   3. Aggregator      (one row per customer-group)
//!   4. Feature deriver (flags, demographics, empty-wave synthesis)
//!   5. Projectors      (receive view, select view)
//!
//! The whole pipeline is a deterministic transform over in-memory tables:
//! same inputs, same outputs, no I/O past ingestion.

use crate::{
    aggregate::{aggregate_groups, GroupKey, GroupedFrame},
    catalog::{CustomerProfile, Portfolio, RawTranscriptRecord},
    config::PipelineConfig,
    error::PipeResult,
    event::{AttributedEvent, EventKind},
    features::{derive_features, FeatureRow},
    grouping::group_transcript,
    training::{receive_view, select_view, TrainingFrame},
    wave::normalize_transcript,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub customers:          usize,
    pub events:             usize,
    pub offer_groups:       usize,
    pub non_offer_buckets:  usize,
    pub unmatched_events:   usize,
    pub feature_rows:       usize,
    pub receive_rows:       usize,
    pub select_rows:        usize,
    pub total_spend:        f64,
}

pub struct PipelineOutput {
    pub attributed: Vec<AttributedEvent>,
    pub grouped:    GroupedFrame,
    pub features:   Vec<FeatureRow>,
    pub receive:    TrainingFrame,
    pub select:     TrainingFrame,
    pub summary:    RunSummary,
}

/// Run the full transform: transcript → attributed events → grouped rows →
/// feature table → training views.
pub fn run_pipeline(
    portfolio: &Portfolio,
    profiles: &[CustomerProfile],
    transcript: &[RawTranscriptRecord],
    config: &PipelineConfig,
) -> PipeResult<PipelineOutput> {
    let events = normalize_transcript(portfolio, transcript)?;
    let customers: BTreeSet<&str> = events.iter().map(|e| e.person_id.as_str()).collect();
    let total_spend: f64 = events
        .iter()
        .filter(|e| e.kind == EventKind::Transaction)
        .map(|e| e.amount)
        .sum();

    let attributed = group_transcript(&events)?;
    let grouped = aggregate_groups(&attributed);
    let features = derive_features(&grouped, profiles, config);
    let receive = receive_view(&features, config);
    let select = select_view(&features, portfolio.len(), config);

    let offer_groups = grouped
        .rows
        .iter()
        .filter(|r| matches!(r.key, GroupKey::Offer { .. }))
        .count();

    let summary = RunSummary {
        customers: customers.len(),
        events: events.len(),
        offer_groups,
        non_offer_buckets: grouped.non_offer_spend.len(),
        unmatched_events: grouped.unmatched_events,
        feature_rows: features.len(),
        receive_rows: receive.rows.len(),
        select_rows: select.rows.len(),
        total_spend,
    };

    log::info!(
        "pipeline: {} customers, {} events, {} offer groups, {} feature rows",
        summary.customers,
        summary.events,
        summary.offer_groups,
        summary.feature_rows
    );

    Ok(PipelineOutput {
        attributed,
        grouped,
        features,
        receive,
        select,
        summary,
    })
}
