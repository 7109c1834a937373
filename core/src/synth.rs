//! Deterministic synthetic data — portfolio, profile, and transcript tables
//! for demos and tests.
//!
//! RULE: nothing here calls a platform RNG. All randomness flows through a
//! single Pcg64Mcg stream derived from the caller's seed, so a given seed
//! always produces byte-identical tables.
//!
//! The generated transcript follows the source stream's shape: customers get
//! offers delivered at wave starts, view some of them, spend over the whole
//! window, and receive explicit completion signals only for non-informational
//! offers.

use crate::{
    catalog::{
        clean_profile, CustomerProfile, Portfolio, RawPortfolioRecord, RawProfileRecord,
        RawTranscriptRecord,
    },
    error::PipeResult,
    wave::WAVE_BOUNDS,
};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde_json::json;

pub struct SynthConfig {
    pub seed:      u64,
    pub customers: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed:      42,
            customers: 200,
        }
    }
}

/// Seeded RNG with the few draws the generator needs.
struct SynthRng {
    inner: Pcg64Mcg,
}

impl SynthRng {
    fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Generate the three cleaned input tables for one seed.
pub fn generate(config: &SynthConfig) -> PipeResult<(Portfolio, Vec<CustomerProfile>, Vec<RawTranscriptRecord>)> {
    let mut rng = SynthRng::new(config.seed);

    let portfolio_records = synth_portfolio(&mut rng);
    let portfolio = Portfolio::from_records(portfolio_records)?;

    let profile_records = synth_profiles(&mut rng, config.customers);
    let transcript = synth_transcript(&mut rng, &portfolio, &profile_records);
    let profiles = clean_profile(profile_records)?;

    log::info!(
        "synth: seed {} -> {} offers, {} customers, {} transcript lines",
        config.seed,
        portfolio.len(),
        profiles.len(),
        transcript.len()
    );
    Ok((portfolio, profiles, transcript))
}

fn synth_portfolio(rng: &mut SynthRng) -> Vec<RawPortfolioRecord> {
    (0..10)
        .map(|i| {
            let offer_type = match i % 3 {
                0 => "bogo",
                1 => "discount",
                _ => "informational",
            };
            let informational = offer_type == "informational";
            let mut channels = vec!["email".to_string()];
            if rng.chance(0.8) {
                channels.push("mobile".into());
            }
            if rng.chance(0.5) {
                channels.push("social".into());
            }
            if rng.chance(0.6) {
                channels.push("web".into());
            }
            RawPortfolioRecord {
                id: format!("offer-{:02}", i + 1),
                offer_type: offer_type.to_string(),
                difficulty: if informational { 0.0 } else { 5.0 + rng.below(16) as f64 },
                reward: if informational { 0.0 } else { 2.0 + rng.below(9) as f64 },
                duration: 3.0 + rng.below(8) as f64,
                channels,
            }
        })
        .collect()
}

fn synth_profiles(rng: &mut SynthRng, customers: usize) -> Vec<RawProfileRecord> {
    (0..customers)
        .map(|i| {
            let roll = rng.next_f64();
            let gender = if roll < 0.45 {
                Some("F".to_string())
            } else if roll < 0.88 {
                Some("M".to_string())
            } else if roll < 0.92 {
                Some("O".to_string())
            } else {
                None
            };
            // ~10% of profiles carry the age-missing sentinel, as the real
            // table does; income goes missing alongside it.
            let (age, income) = if rng.chance(0.1) {
                (Some(118), None)
            } else {
                (
                    Some(18 + rng.below(70) as i64),
                    Some(30_000.0 + (rng.below(90) as f64) * 1_000.0),
                )
            };
            let year = 2013 + rng.below(6);
            let month = 1 + rng.below(12);
            let day = 1 + rng.below(28);
            RawProfileRecord {
                id: format!("person-{i:04}"),
                gender,
                age,
                income,
                became_member_on: Some(year * 10_000 + month * 100 + day),
            }
        })
        .collect()
}

fn synth_transcript(
    rng: &mut SynthRng,
    portfolio: &Portfolio,
    profiles: &[RawProfileRecord],
) -> Vec<RawTranscriptRecord> {
    let mut out = Vec::new();
    let offers = portfolio.offers();

    for profile in profiles {
        let mut lines: Vec<RawTranscriptRecord> = Vec::new();

        for (start, end) in WAVE_BOUNDS {
            // Offer delivery at the wave start, most waves.
            if rng.chance(0.7) {
                let spec = &offers[rng.below(offers.len() as u64) as usize];
                let received_at = start + rng.below(24) as i64;
                lines.push(RawTranscriptRecord {
                    person: profile.id.clone(),
                    event: "offer received".into(),
                    time: received_at,
                    value: json!({ "offer id": spec.offer_id }),
                });
                if rng.chance(0.75) {
                    lines.push(RawTranscriptRecord {
                        person: profile.id.clone(),
                        event: "offer viewed".into(),
                        time: received_at + 1 + rng.below(48) as i64,
                        value: json!({ "offer id": spec.offer_id }),
                    });
                }
                // The source stream only signals completion for offers with
                // a spend threshold; informational completion is inferred
                // downstream from transactions.
                if spec.difficulty > 0.0 && rng.chance(0.5) {
                    let window = (spec.duration_days * 24.0) as u64;
                    lines.push(RawTranscriptRecord {
                        person: profile.id.clone(),
                        event: "offer completed".into(),
                        time: received_at + 2 + rng.below(window.max(3)) as i64,
                        value: json!({ "offer_id": spec.offer_id, "reward": spec.reward }),
                    });
                }
            }

            // Background spend through the wave.
            for _ in 0..rng.below(4) {
                let at = start + rng.below((end - start + 1) as u64) as i64;
                let amount = ((1.0 + rng.next_f64() * 25.0) * 100.0).round() / 100.0;
                lines.push(RawTranscriptRecord {
                    person: profile.id.clone(),
                    event: "transaction".into(),
                    time: at,
                    value: json!({ "amount": amount }),
                });
            }
        }

        // The grouping engine requires per-customer monotonic timestamps.
        lines.sort_by_key(|l| l.time);
        out.extend(lines);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_tables() {
        let config = SynthConfig {
            seed: 7,
            customers: 20,
        };
        let (_, profiles_a, transcript_a) = generate(&config).unwrap();
        let (_, profiles_b, transcript_b) = generate(&config).unwrap();
        assert_eq!(profiles_a.len(), profiles_b.len());
        assert_eq!(transcript_a.len(), transcript_b.len());
        for (a, b) in transcript_a.iter().zip(&transcript_b) {
            assert_eq!(a.person, b.person);
            assert_eq!(a.event, b.event);
            assert_eq!(a.time, b.time);
            assert_eq!(a.value, b.value);
        }
    }

    #[test]
    fn transcript_is_sorted_per_customer() {
        let (_, _, transcript) = generate(&SynthConfig {
            seed: 11,
            customers: 30,
        })
        .unwrap();
        let mut last: std::collections::HashMap<&str, i64> = Default::default();
        for line in &transcript {
            let prev = last.entry(line.person.as_str()).or_insert(i64::MIN);
            assert!(line.time >= *prev, "timestamps regressed for {}", line.person);
            *prev = line.time;
        }
    }
}
