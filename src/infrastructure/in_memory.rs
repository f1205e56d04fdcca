use crate::domain::notification::Notification;
use crate::domain::ports::{
    ConfigSource, EligibilityIndex, Notifier, NumberSource, RoundStore, UnitOfWork,
};
use crate::domain::round::{
    Finalization, Participant, Reservation, Round, RoundId, RoundStatus, SlotNumber,
};
use crate::error::{RaffleError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default, Clone)]
struct State {
    rounds: BTreeMap<i64, Round>,
    reservations: Vec<Reservation>,
    participants: HashMap<i64, Participant>,
}

/// A thread-safe in-memory store implementing every storage port.
///
/// The unit of work is a whole-state snapshot: `begin` clones the state,
/// `rollback` restores it, `commit` drops it. That makes dry-run isolation
/// directly observable in tests.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    snapshot: Arc<RwLock<Option<State>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_round(&self, round: Round) {
        self.state.write().await.rounds.insert(round.id.0, round);
    }

    pub async fn insert_participant(&self, participant: Participant) {
        self.state
            .write()
            .await
            .participants
            .insert(participant.id.0, participant);
    }

    pub async fn insert_reservation(&self, reservation: Reservation) {
        self.state.write().await.reservations.push(reservation);
    }

    pub async fn round(&self, id: RoundId) -> Option<Round> {
        self.state.read().await.rounds.get(&id.0).cloned()
    }

    pub async fn round_count(&self) -> usize {
        self.state.read().await.rounds.len()
    }
}

#[async_trait]
impl RoundStore for InMemoryStore {
    async fn pending_rounds(&self) -> Result<Vec<Round>> {
        let state = self.state.read().await;
        Ok(state
            .rounds
            .values()
            .filter(|r| r.realized_at.is_none())
            .cloned()
            .collect())
    }

    async fn latest_open_round(&self) -> Result<Option<Round>> {
        let state = self.state.read().await;
        Ok(state
            .rounds
            .values()
            .rev()
            .find(|r| r.status == RoundStatus::Open)
            .cloned())
    }

    async fn finalize(&self, finalization: &Finalization) -> Result<bool> {
        let mut state = self.state.write().await;
        let round = state
            .rounds
            .get_mut(&finalization.round_id.0)
            .ok_or_else(|| {
                RaffleError::Config(format!("unknown round {}", finalization.round_id))
            })?;
        if round.realized_at.is_some() {
            return Ok(false);
        }
        round.status = RoundStatus::Drawn;
        round.winner_number = Some(finalization.winner_number);
        round.winner_id = finalization.winner.as_ref().map(|w| w.id);
        round.winner_name = finalization
            .winner
            .as_ref()
            .and_then(|w| w.name.clone());
        round.closed_at = round.closed_at.or(Some(finalization.finalized_at));
        round.realized_at = Some(finalization.finalized_at);
        Ok(true)
    }

    async fn open_round(&self, opened_at: DateTime<Utc>) -> Result<RoundId> {
        let mut state = self.state.write().await;
        let id = state.rounds.keys().next_back().copied().unwrap_or(0) + 1;
        state
            .rounds
            .insert(id, Round::new_open(RoundId(id), opened_at));
        Ok(RoundId(id))
    }
}

#[async_trait]
impl EligibilityIndex for InMemoryStore {
    async fn owner_of(&self, round: RoundId, number: SlotNumber) -> Result<Option<Participant>> {
        let state = self.state.read().await;
        let owner = state
            .reservations
            .iter()
            .find(|r| r.round_id == round && r.paid && r.numbers.contains(number))
            .map(|r| r.participant_id);
        Ok(owner.and_then(|id| state.participants.get(&id.0).cloned()))
    }

    async fn sold_count(&self, round: RoundId) -> Result<u32> {
        let state = self.state.read().await;
        let numbers: BTreeSet<u8> = state
            .reservations
            .iter()
            .filter(|r| r.round_id == round && r.paid)
            .flat_map(|r| r.numbers.iter().map(SlotNumber::value))
            .collect();
        Ok(numbers.len() as u32)
    }

    async fn valid_participants(&self, round: RoundId) -> Result<Vec<Participant>> {
        let state = self.state.read().await;
        let ids: BTreeSet<i64> = state
            .reservations
            .iter()
            .filter(|r| r.round_id == round && r.paid)
            .map(|r| r.participant_id.0)
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| state.participants.get(&id))
            .filter(|p| p.notifiable_email().is_some())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<()> {
        let state = self.state.read().await.clone();
        *self.snapshot.write().await = Some(state);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.snapshot.write().await.take();
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.write().await.take() {
            *self.state.write().await = snapshot;
        }
        Ok(())
    }
}

/// A fixed key/value table for capacity-resolution tests.
#[derive(Default, Clone)]
pub struct InMemoryConfig {
    entries: Vec<(String, String)>,
}

impl InMemoryConfig {
    pub fn new(entries: Vec<(&str, &str)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ConfigSource for InMemoryConfig {
    async fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self.entries.clone())
    }
}

/// Always returns the same drawn number.
pub struct FixedNumberSource(pub SlotNumber);

#[async_trait]
impl NumberSource for FixedNumberSource {
    async fn fetch(&self) -> Result<SlotNumber> {
        Ok(self.0)
    }
}

/// Always fails, for the upstream-fatal path.
pub struct FailingNumberSource;

#[async_trait]
impl NumberSource for FailingNumberSource {
    async fn fetch(&self) -> Result<SlotNumber> {
        Err(RaffleError::Upstream("lottery endpoint unavailable".into()))
    }
}

/// Records every intent instead of transmitting.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.sent.write().await.push(notification.clone());
        Ok(())
    }
}
