//! promolens-core — promotional-offer lifecycle reconstruction.
//!
//! Rebuilds per-customer offer lifecycles from an interleaved event
//! transcript, then derives a flat feature table for two classification
//! tasks: whether a customer will act on an offer ("receive") and which
//! offers to recommend ("select").
//!
//! Data flows strictly:
//!   raw transcript → normalizer → grouping engine → aggregator →
//!   feature deriver → training-view projectors
//!
//! Everything is a deterministic, single-threaded batch transform over
//! in-memory tables. Customers are independent; no grouping state crosses
//! a customer boundary.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod features;
pub mod grouping;
pub mod pipeline;
pub mod synth;
pub mod training;
pub mod types;
pub mod wave;

pub use config::PipelineConfig;
pub use error::{PipeResult, PipelineError};
pub use pipeline::{run_pipeline, PipelineOutput, RunSummary};
