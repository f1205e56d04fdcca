#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use sorteio_engine::application::capacity::CapacityResolver;
use sorteio_engine::application::engine::ResolutionEngine;
use sorteio_engine::domain::round::{
    ClaimedNumbers, Participant, ParticipantId, Reservation, Round, RoundId, RoundStatus,
    SlotNumber,
};
use sorteio_engine::infrastructure::in_memory::{
    FixedNumberSource, InMemoryConfig, InMemoryStore, RecordingNotifier,
};

pub fn participant(id: i64, name: &str, email: Option<&str>) -> Participant {
    Participant {
        id: ParticipantId(id),
        name: Some(name.to_string()),
        email: email.map(str::to_string),
    }
}

pub fn open_round(id: i64, age_days: i64, now: DateTime<Utc>) -> Round {
    Round::new_open(RoundId(id), now - TimeDelta::days(age_days))
}

pub fn closed_unrealized_round(id: i64, now: DateTime<Utc>) -> Round {
    let mut round = Round::new_open(RoundId(id), now - TimeDelta::days(3));
    round.status = RoundStatus::ClosedUnrealized;
    round.closed_at = Some(now - TimeDelta::days(1));
    round
}

pub async fn reserve(
    store: &InMemoryStore,
    round: i64,
    participant: i64,
    numbers: &[u8],
    paid: bool,
) {
    let numbers = if numbers.len() == 1 {
        ClaimedNumbers::Single(SlotNumber::new(numbers[0] as i64).unwrap())
    } else {
        ClaimedNumbers::Set(
            numbers
                .iter()
                .map(|n| SlotNumber::new(*n as i64).unwrap())
                .collect(),
        )
    };
    store
        .insert_reservation(Reservation {
            round_id: RoundId(round),
            participant_id: ParticipantId(participant),
            numbers,
            paid,
        })
        .await;
}

/// Engine over the in-memory store with a fixed official number and the
/// given configuration table entries.
pub fn engine(
    store: &InMemoryStore,
    notifier: &RecordingNotifier,
    number: u8,
    config: Vec<(&str, &str)>,
) -> ResolutionEngine {
    ResolutionEngine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(FixedNumberSource(SlotNumber::new(number as i64).unwrap())),
        CapacityResolver::new(vec![Box::new(InMemoryConfig::new(config))]),
        Box::new(notifier.clone()),
    )
}
