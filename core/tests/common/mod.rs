//! Shared fixtures: hand-built normalized events for driving the grouping
//! engine without the ingestion path.
#![allow(dead_code)] // not every test binary uses every helper

use promolens_core::catalog::{Channels, OfferSpec, OfferType};
use promolens_core::event::{Event, EventKind};
use promolens_core::wave::{day_of, wave_of};

pub fn spec(index: u8, offer_type: OfferType, difficulty: f64, duration_days: f64) -> OfferSpec {
    OfferSpec {
        offer_id: format!("offer-{index:02}"),
        index,
        offer_type,
        channels: Channels {
            email:  true,
            mobile: true,
            social: false,
            web:    true,
        },
        difficulty,
        reward: if difficulty > 0.0 { 2.0 } else { 0.0 },
        duration_days,
    }
}

pub fn offer_event(person: &str, kind: EventKind, spec: &OfferSpec, time: i64) -> Event {
    Event {
        person_id:     person.to_string(),
        kind,
        offer_id:      Some(spec.offer_id.clone()),
        offer_index:   spec.index,
        time,
        wave:          wave_of(time),
        day:           day_of(time),
        amount:        0.0,
        channels:      spec.channels,
        duration_days: spec.duration_days,
        difficulty:    spec.difficulty,
        reward:        spec.reward,
        offer_type:    Some(spec.offer_type),
    }
}

pub fn received(person: &str, spec: &OfferSpec, time: i64) -> Event {
    offer_event(person, EventKind::OfferReceived, spec, time)
}

pub fn viewed(person: &str, spec: &OfferSpec, time: i64) -> Event {
    offer_event(person, EventKind::OfferViewed, spec, time)
}

pub fn completed(person: &str, spec: &OfferSpec, time: i64) -> Event {
    offer_event(person, EventKind::OfferCompleted, spec, time)
}

pub fn transaction(person: &str, time: i64, amount: f64) -> Event {
    Event {
        person_id:     person.to_string(),
        kind:          EventKind::Transaction,
        offer_id:      None,
        offer_index:   0,
        time,
        wave:          wave_of(time),
        day:           day_of(time),
        amount,
        channels:      Channels::default(),
        duration_days: 0.0,
        difficulty:    0.0,
        reward:        0.0,
        offer_type:    None,
    }
}
