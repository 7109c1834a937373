//! Training-view projectors — reshape the feature table into the two
//! disjoint numeric frames the downstream classifiers expect.
//!
//! Receive view ("will this customer act on an offer?"):
//!   - rows: known age AND received an offer; non-offer rows dropped
//!   - categoricals (gender, generation, age group, offer type) one-hot
//!   - remaining missing numerics imputed by round-robin multivariate
//!     regression, seeded with most-frequent-value initialization
//!
//! Select view ("which offers should we recommend?"):
//!   - one row per customer; labels are multi-hot offer-presence columns
//!     "1".."10" over the distinct non-zero recommended offers, first-seen
//!     order preserved
//!   - income outliers dropped by the IQR rule
//!
//! Both projections are deterministic: fixed column order, fixed row order,
//! fixed imputation round count.

use crate::{
    aggregate::GroupKey,
    catalog::Gender,
    config::PipelineConfig,
    features::{AgeGroup, FeatureRow, Generation, OfferTypeFeature},
    types::OfferIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A flat numeric frame: named columns, f64 cells, NaN for missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingFrame {
    pub columns: Vec<String>,
    pub rows:    Vec<Vec<f64>>,
}

impl TrainingFrame {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn opt(v: Option<f64>) -> f64 {
    v.unwrap_or(f64::NAN)
}

// ── Receive view ─────────────────────────────────────────────────────────────

pub fn receive_view(features: &[FeatureRow], config: &PipelineConfig) -> TrainingFrame {
    let mut columns: Vec<String> = vec![
        "purchased".into(),
        "age".into(),
        "income".into(),
        "non_offer_amount".into(),
        "reward".into(),
        "difficulty".into(),
        "duration_days".into(),
        "member_year".into(),
        "member_month".into(),
        "member_day".into(),
        "channel_email".into(),
        "channel_mobile".into(),
        "channel_social".into(),
        "channel_web".into(),
    ];
    for g in [Gender::F, Gender::M, Gender::O, Gender::Unknown] {
        columns.push(format!("gender_{}", gender_label(g)));
    }
    for g in Generation::ALL {
        columns.push(format!("generation_{}", g.label()));
    }
    for a in AgeGroup::ALL {
        columns.push(format!("age_group_{}", a.label()));
    }
    for t in OfferTypeFeature::ALL {
        columns.push(format!("offer_type_{}", t.label()));
    }

    let mut rows = Vec::new();
    for feature in features {
        // Known age, actually received, and a real offer group — non-offer
        // buckets and synthesized empty-wave rows carry no offer to act on.
        if feature.age.is_none() || !feature.received {
            continue;
        }
        if !matches!(feature.group, Some(GroupKey::Offer { .. })) {
            continue;
        }

        let mut row = vec![
            flag(feature.purchased),
            feature.age.map(f64::from).unwrap_or(f64::NAN),
            opt(feature.income),
            feature.non_offer_amount,
            feature.reward,
            feature.difficulty,
            feature.duration_days,
            opt(feature.member_year.map(f64::from)),
            opt(feature.member_month.map(f64::from)),
            opt(feature.member_day.map(f64::from)),
            flag(feature.channels.email),
            flag(feature.channels.mobile),
            flag(feature.channels.social),
            flag(feature.channels.web),
        ];
        for g in [Gender::F, Gender::M, Gender::O, Gender::Unknown] {
            row.push(flag(feature.gender == g));
        }
        for g in Generation::ALL {
            row.push(flag(feature.generation == Some(g)));
        }
        for a in AgeGroup::ALL {
            row.push(flag(feature.age_group == Some(a)));
        }
        for t in OfferTypeFeature::ALL {
            row.push(flag(feature.offer_type == t));
        }
        rows.push(row);
    }

    let mut frame = TrainingFrame { columns, rows };
    impute_round_robin(&mut frame.rows, config.imputation_rounds);
    log::info!(
        "training: receive view projected ({} rows x {} columns)",
        frame.rows.len(),
        frame.columns.len()
    );
    frame
}

fn gender_label(g: Gender) -> &'static str {
    match g {
        Gender::F => "f",
        Gender::M => "m",
        Gender::O => "o",
        Gender::Unknown => "unknown",
    }
}

// ── Select view ──────────────────────────────────────────────────────────────

pub fn select_view(
    features: &[FeatureRow],
    offer_count: usize,
    config: &PipelineConfig,
) -> TrainingFrame {
    struct Collapsed {
        offers:       Vec<OfferIndex>,
        age:          f64,
        income:       f64,
        gender:       Gender,
        generation:   Option<Generation>,
        age_group:    Option<AgeGroup>,
        member_year:  f64,
        member_month: f64,
        member_day:   f64,
    }

    // Collapse to one record per customer, keeping first-seen order of
    // distinct non-zero recommended offers. Customers lacking age or income
    // are excluded from training views.
    let mut collapsed: BTreeMap<String, Collapsed> = BTreeMap::new();
    for feature in features {
        let (Some(age), Some(income)) = (feature.age, feature.income) else {
            continue;
        };
        let entry = collapsed
            .entry(feature.person_id.clone())
            .or_insert_with(|| Collapsed {
                offers:       Vec::new(),
                age:          f64::from(age),
                income,
                gender:       feature.gender,
                generation:   feature.generation,
                age_group:    feature.age_group,
                member_year:  opt(feature.member_year.map(f64::from)),
                member_month: opt(feature.member_month.map(f64::from)),
                member_day:   opt(feature.member_day.map(f64::from)),
            });
        if feature.recommended_offer != 0 && !entry.offers.contains(&feature.recommended_offer) {
            entry.offers.push(feature.recommended_offer);
        }
    }

    // IQR rule on income: drop rows beyond Q1 - k*IQR or Q3 + k*IQR.
    let mut incomes: Vec<f64> = collapsed.values().map(|c| c.income).collect();
    incomes.sort_by(|a, b| a.total_cmp(b));
    let (low, high) = iqr_fences(&incomes, config.iqr_multiplier);

    let mut columns: Vec<String> = (1..=offer_count).map(|i| i.to_string()).collect();
    columns.extend([
        "age".to_string(),
        "income".to_string(),
        "member_year".to_string(),
        "member_month".to_string(),
        "member_day".to_string(),
    ]);
    for g in [Gender::F, Gender::M, Gender::O, Gender::Unknown] {
        columns.push(format!("gender_{}", gender_label(g)));
    }
    for g in Generation::ALL {
        columns.push(format!("generation_{}", g.label()));
    }
    for a in AgeGroup::ALL {
        columns.push(format!("age_group_{}", a.label()));
    }

    let mut rows = Vec::new();
    let mut outliers = 0usize;
    for c in collapsed.values() {
        if c.income < low || c.income > high {
            outliers += 1;
            continue;
        }
        let mut row = Vec::with_capacity(columns.len());
        for i in 1..=offer_count {
            row.push(flag(c.offers.contains(&(i as OfferIndex))));
        }
        row.extend([c.age, c.income, c.member_year, c.member_month, c.member_day]);
        for g in [Gender::F, Gender::M, Gender::O, Gender::Unknown] {
            row.push(flag(c.gender == g));
        }
        for g in Generation::ALL {
            row.push(flag(c.generation == Some(g)));
        }
        for a in AgeGroup::ALL {
            row.push(flag(c.age_group == Some(a)));
        }
        rows.push(row);
    }

    log::info!(
        "training: select view projected ({} rows, {} income outliers dropped)",
        rows.len(),
        outliers
    );
    TrainingFrame { columns, rows }
}

/// Tukey fences over a sorted sample. Returns (low, high); an empty sample
/// yields fences that exclude nothing.
fn iqr_fences(sorted: &[f64], multiplier: f64) -> (f64, f64) {
    if sorted.is_empty() {
        return (f64::NEG_INFINITY, f64::INFINITY);
    }
    let q1 = percentile(sorted, 0.25);
    let q3 = percentile(sorted, 0.75);
    let iqr = q3 - q1;
    (q1 - multiplier * iqr, q3 + multiplier * iqr)
}

/// Linear-interpolated percentile over a sorted sample, q in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

// ── Round-robin regression imputation ────────────────────────────────────────

/// Fill NaN cells in place: initialize every missing cell with its column's
/// most frequent observed value, then run `rounds` passes where each
/// incomplete column is regressed (ordinary least squares with a small
/// ridge term) on all other columns and its missing cells re-predicted.
pub fn impute_round_robin(rows: &mut [Vec<f64>], rounds: usize) {
    if rows.is_empty() {
        return;
    }
    let n_cols = rows[0].len();
    let missing: Vec<Vec<usize>> = (0..n_cols)
        .map(|c| {
            rows.iter()
                .enumerate()
                .filter(|(_, r)| r[c].is_nan())
                .map(|(i, _)| i)
                .collect()
        })
        .collect();
    if missing.iter().all(|m| m.is_empty()) {
        return;
    }

    // Seed: most frequent observed value per column.
    for c in 0..n_cols {
        if missing[c].is_empty() {
            continue;
        }
        let fill = column_mode(rows, c).unwrap_or(0.0);
        for &r in &missing[c] {
            rows[r][c] = fill;
        }
    }

    for _ in 0..rounds {
        for c in 0..n_cols {
            if missing[c].is_empty() {
                continue;
            }
            let observed: Vec<usize> = (0..rows.len())
                .filter(|i| !missing[c].contains(i))
                .collect();
            // Underdetermined fit: keep the mode seed.
            if observed.len() <= n_cols {
                continue;
            }
            let Some(beta) = fit_ols(rows, &observed, c) else {
                continue;
            };
            for &r in &missing[c] {
                let value = predict(&rows[r], c, &beta);
                rows[r][c] = value;
            }
        }
    }
}

/// Most frequent observed (non-NaN) value; ties broken toward the smaller
/// value for determinism.
fn column_mode(rows: &[Vec<f64>], col: usize) -> Option<f64> {
    let mut counts: BTreeMap<u64, (usize, f64)> = BTreeMap::new();
    for row in rows {
        let v = row[col];
        if v.is_nan() {
            continue;
        }
        let entry = counts.entry(v.to_bits()).or_insert((0, v));
        entry.0 += 1;
    }
    counts
        .values()
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.total_cmp(&a.1)))
        .map(|&(_, v)| v)
}

/// OLS of column `target` on all other columns plus an intercept, over the
/// given row subset. Solves (X'X + eps*I) b = X'y by Gaussian elimination;
/// the ridge term keeps collinear one-hot blocks solvable.
fn fit_ols(rows: &[Vec<f64>], subset: &[usize], target: usize) -> Option<Vec<f64>> {
    let n_cols = rows[0].len();
    let dim = n_cols; // (n_cols - 1) predictors + intercept

    let mut xtx = vec![vec![0.0f64; dim]; dim];
    let mut xty = vec![0.0f64; dim];
    for &r in subset {
        let x = predictor_vector(&rows[r], target);
        let y = rows[r][target];
        for i in 0..dim {
            xty[i] += x[i] * y;
            for j in 0..dim {
                xtx[i][j] += x[i] * x[j];
            }
        }
    }
    for (i, row) in xtx.iter_mut().enumerate() {
        row[i] += 1e-6;
    }
    solve_linear(xtx, xty)
}

/// Predictors for one row: every column except `target`, plus a trailing 1.
fn predictor_vector(row: &[f64], target: usize) -> Vec<f64> {
    let mut x: Vec<f64> = row
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target)
        .map(|(_, &v)| v)
        .collect();
    x.push(1.0);
    x
}

fn predict(row: &[f64], target: usize, beta: &[f64]) -> f64 {
    let x = predictor_vector(row, target);
    x.iter().zip(beta).map(|(a, b)| a * b).sum()
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0f64; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for col in (row + 1)..n {
            acc -= a[row][col] * x[col];
        }
        x[row] = acc / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 0.25) - 1.75).abs() < 1e-12);
        assert!((percentile(&sorted, 0.75) - 3.25).abs() < 1e-12);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 1.0), 4.0);
    }

    #[test]
    fn mode_prefers_most_frequent_then_smallest() {
        let rows = vec![vec![2.0], vec![1.0], vec![2.0], vec![1.0], vec![3.0]];
        assert_eq!(column_mode(&rows, 0), Some(1.0));
    }

    #[test]
    fn solver_inverts_small_system() {
        // 2x + y = 5, x + 3y = 10 → x = 1, y = 3
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let b = vec![5.0, 10.0];
        let x = solve_linear(a, b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!((x[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn imputation_recovers_linear_relationship() {
        // y = 2x; one missing y should land near 2 * its x after refinement.
        let mut rows = vec![
            vec![1.0, 2.0],
            vec![2.0, 4.0],
            vec![3.0, 6.0],
            vec![4.0, 8.0],
            vec![5.0, f64::NAN],
        ];
        impute_round_robin(&mut rows, 5);
        assert!((rows[4][1] - 10.0).abs() < 0.5, "got {}", rows[4][1]);
    }
}
