use super::round::{Participant, RoundId, SlotNumber};
use chrono::{DateTime, Utc};

/// The round fields every template needs, snapshotted at intent time.
#[derive(Debug, Clone)]
pub struct RoundRef {
    pub id: RoundId,
    pub label: String,
}

/// A notification intent emitted by the engine. Rendering and transport are
/// the dispatcher's concern; the engine only decides which intents exist.
#[derive(Debug, Clone)]
pub enum Notification {
    Winner {
        round: RoundRef,
        number: SlotNumber,
        recipient: Participant,
    },
    Loser {
        round: RoundRef,
        number: SlotNumber,
        winner_name: String,
        recipient: Participant,
    },
    /// Always emitted on finalization; winner fields are blank when the drawn
    /// number had no paying owner.
    AdminSummary {
        round: RoundRef,
        number: SlotNumber,
        winner_name: Option<String>,
        winner_email: Option<String>,
        closed_at: DateTime<Utc>,
    },
    /// `round` is None when a reminder run found no open round and falls back
    /// to the operator notice.
    PreDrawReminder {
        round: Option<RoundRef>,
        recipient_email: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Winner { .. } => "winner",
            Self::Loser { .. } => "loser",
            Self::AdminSummary { .. } => "admin-summary",
            Self::PreDrawReminder { .. } => "pre-draw-reminder",
        }
    }

    pub fn round_id(&self) -> Option<RoundId> {
        match self {
            Self::Winner { round, .. }
            | Self::Loser { round, .. }
            | Self::AdminSummary { round, .. } => Some(round.id),
            Self::PreDrawReminder { round, .. } => round.as_ref().map(|r| r.id),
        }
    }
}
