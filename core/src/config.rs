//! Pipeline configuration.
//!
//! Everything here has a sensible default matching the source campaign data;
//! callers only override for what-if runs. Wave hour boundaries are fixed by
//! the campaign calendar and live in `wave.rs`, not here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Year the observation window ends; birth year = reference_year - age.
    pub reference_year: i32,
    /// Birth-year cutoffs for the five-level generation bucketing.
    /// Ordered oldest to youngest: silent ends, boomer ends, gen_x ends,
    /// millennial ends. Anything later is gen_z.
    pub generation_cutoffs: GenerationCutoffs,
    /// Number of round-robin passes for regression imputation in the
    /// receive training view.
    pub imputation_rounds: usize,
    /// Tukey fence width for the select view's income outlier filter:
    /// rows beyond Q1 - k*IQR or Q3 + k*IQR are dropped.
    pub iqr_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationCutoffs {
    pub silent_until:     i32,
    pub boomer_until:     i32,
    pub gen_x_until:      i32,
    pub millennial_until: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_year: 2018,
            generation_cutoffs: GenerationCutoffs {
                silent_until:     1945,
                boomer_until:     1964,
                gen_x_until:      1980,
                millennial_until: 1996,
            },
            imputation_rounds: 5,
            iqr_multiplier: 1.5,
        }
    }
}
