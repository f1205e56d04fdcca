use super::notification::Notification;
use super::round::{Finalization, Participant, Round, RoundId, SlotNumber};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Fetches the most recent officially drawn number. Called once per
/// invocation; the single value is shared by every round evaluated that run.
#[async_trait]
pub trait NumberSource: Send + Sync {
    async fn fetch(&self) -> Result<SlotNumber>;
}

#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Every round whose realized_at is null, ascending by id: open rounds
    /// plus closed-but-unrealized rounds awaiting recovery.
    async fn pending_rounds(&self) -> Result<Vec<Round>>;

    /// The most recently opened round still in the open state.
    async fn latest_open_round(&self) -> Result<Option<Round>>;

    /// Applies the terminal transition. Returns false when the round was
    /// already realized, in which case nothing was written.
    async fn finalize(&self, finalization: &Finalization) -> Result<bool>;

    /// Opens the successor round.
    async fn open_round(&self, opened_at: DateTime<Utc>) -> Result<RoundId>;
}

#[async_trait]
pub trait EligibilityIndex: Send + Sync {
    /// The paying participant whose reservation covers `number`, if any.
    async fn owner_of(&self, round: RoundId, number: SlotNumber) -> Result<Option<Participant>>;

    /// Count of distinct numbers with a valid (paying) reservation.
    async fn sold_count(&self, round: RoundId) -> Result<u32>;

    /// Participants with at least one valid reservation and a non-empty
    /// email, deduplicated.
    async fn valid_participants(&self, round: RoundId) -> Result<Vec<Participant>>;
}

/// One flat key/value configuration table.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn entries(&self) -> Result<Vec<(String, String)>>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// One invocation's worth of storage work, committed or discarded as a whole.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
}

pub type NumberSourceBox = Box<dyn NumberSource>;
pub type RoundStoreBox = Box<dyn RoundStore>;
pub type EligibilityIndexBox = Box<dyn EligibilityIndex>;
pub type ConfigSourceBox = Box<dyn ConfigSource>;
pub type NotifierBox = Box<dyn Notifier>;
pub type UnitOfWorkBox = Box<dyn UnitOfWork>;
