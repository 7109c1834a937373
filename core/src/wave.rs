//! Event stream normalizer — wave and day bucketing, portfolio join.
//!
//! Waves are the coarse campaign-time buckets used as the join key between
//! event data and the static customer profile. Boundaries are fixed by the
//! campaign calendar: six uneven hour ranges covering the 714-hour window.

use crate::{
    catalog::Portfolio,
    error::{PipeResult, PipelineError},
    event::{Event, EventKind},
    types::{Timestamp, Wave},
};

/// Inclusive hour ranges for waves 1..=6.
pub const WAVE_BOUNDS: [(Timestamp, Timestamp); 6] = [
    (0, 167),
    (168, 335),
    (336, 407),
    (408, 503),
    (504, 575),
    (576, 714),
];

pub const WAVE_COUNT: usize = WAVE_BOUNDS.len();

/// The wave containing `time`. Out-of-window hours clamp to the nearest end
/// of the window rather than being dropped: negative hours into wave 1,
/// hours past the last boundary into the final wave.
pub fn wave_of(time: Timestamp) -> Wave {
    if time < 0 {
        log::debug!("wave: clamping negative hour {time} into wave 1");
        return 1;
    }
    for (i, (start, end)) in WAVE_BOUNDS.iter().enumerate() {
        if time >= *start && time <= *end {
            return (i + 1) as Wave;
        }
    }
    log::debug!("wave: clamping out-of-window hour {time} into wave {WAVE_COUNT}");
    WAVE_COUNT as Wave
}

pub fn day_of(time: Timestamp) -> i64 {
    time / 24
}

/// Join raw transcript lines against the portfolio and assign wave/day
/// buckets. Input order is preserved — the caller's sort guarantee carries
/// through to the grouping engine unchanged.
pub fn normalize_transcript(
    portfolio: &Portfolio,
    raw: &[crate::catalog::RawTranscriptRecord],
) -> PipeResult<Vec<Event>> {
    let mut events = Vec::with_capacity(raw.len());

    for rec in raw {
        let kind = EventKind::parse(&rec.event)
            .ok_or_else(|| PipelineError::UnknownEventKind(rec.event.clone()))?;

        let event = match kind {
            EventKind::Transaction => Event {
                person_id:     rec.person.clone(),
                kind,
                offer_id:      None,
                offer_index:   0,
                time:          rec.time,
                wave:          wave_of(rec.time),
                day:           day_of(rec.time),
                amount:        rec.amount(),
                channels:      Default::default(),
                duration_days: 0.0,
                difficulty:    0.0,
                reward:        0.0,
                offer_type:    None,
            },
            _ => {
                let offer_id = rec.offer_id().ok_or_else(|| PipelineError::UnknownOffer {
                    person_id: rec.person.clone(),
                    offer_id: String::from("<missing>"),
                })?;
                let spec = portfolio.get(offer_id).ok_or_else(|| PipelineError::UnknownOffer {
                    person_id: rec.person.clone(),
                    offer_id: offer_id.to_string(),
                })?;
                Event {
                    person_id:     rec.person.clone(),
                    kind,
                    offer_id:      Some(spec.offer_id.clone()),
                    offer_index:   spec.index,
                    time:          rec.time,
                    wave:          wave_of(rec.time),
                    day:           day_of(rec.time),
                    amount:        0.0,
                    channels:      spec.channels,
                    duration_days: spec.duration_days,
                    difficulty:    spec.difficulty,
                    reward:        spec.reward,
                    offer_type:    Some(spec.offer_type),
                }
            }
        };
        events.push(event);
    }

    log::info!("normalizer: {} transcript lines normalized", events.len());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_boundaries_are_inclusive() {
        assert_eq!(wave_of(0), 1);
        assert_eq!(wave_of(167), 1);
        assert_eq!(wave_of(168), 2);
        assert_eq!(wave_of(407), 3);
        assert_eq!(wave_of(408), 4);
        assert_eq!(wave_of(576), 6);
        assert_eq!(wave_of(714), 6);
    }

    #[test]
    fn out_of_window_hours_clamp_to_last_wave() {
        assert_eq!(wave_of(715), 6);
        assert_eq!(wave_of(10_000), 6);
    }

    #[test]
    fn negative_hours_clamp_to_first_wave() {
        assert_eq!(wave_of(-1), 1);
        assert_eq!(wave_of(-10_000), 1);
    }

    #[test]
    fn day_is_hour_over_24() {
        assert_eq!(day_of(0), 0);
        assert_eq!(day_of(23), 0);
        assert_eq!(day_of(24), 1);
        assert_eq!(day_of(714), 29);
    }
}
