use crate::error::{RaffleError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoundId(pub i64);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub i64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the addressable two-digit values (00-99) a participant can claim.
///
/// Also the type of the officially drawn number, so range validation happens
/// in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotNumber(u8);

impl SlotNumber {
    pub const MAX: u8 = 99;

    pub fn new(value: i64) -> Result<Self> {
        if (0..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(RaffleError::InvalidNumber(value.to_string()))
        }
    }

    /// Parses the wire form used by the lottery API: two-digit strings with
    /// leading zeros ("07" -> 7).
    pub fn parse(raw: &str) -> Result<Self> {
        let value: i64 = raw
            .trim()
            .parse()
            .map_err(|_| RaffleError::InvalidNumber(raw.to_string()))?;
        Self::new(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    /// Accepting sales, not yet decided.
    Open,
    /// Closed by some external path but never realized; must be recovered.
    ClosedUnrealized,
    /// Terminal: outcome recorded, realized_at set.
    Drawn,
}

impl RoundStatus {
    /// Maps the stored status string. `realized_at` decides between the
    /// terminal state and the recovery state for anything not open.
    pub fn from_db(status: &str, realized: bool) -> Self {
        match (status, realized) {
            ("open", _) => Self::Open,
            (_, true) => Self::Drawn,
            (_, false) => Self::ClosedUnrealized,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::ClosedUnrealized => "closed",
            Self::Drawn => "sorteado",
        }
    }
}

/// One raffle instance, mapped to a typed record at the repository boundary.
///
/// `winner_number` and `winner_id` are set together or not at all, and only
/// ever transition from null to a value. `realized_at` is set exactly once and
/// is the sole idempotency marker: a realized round is never processed again.
#[derive(Debug, Clone)]
pub struct Round {
    pub id: RoundId,
    pub status: RoundStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_at: Option<DateTime<Utc>>,
    pub winner_number: Option<SlotNumber>,
    pub winner_id: Option<ParticipantId>,
    pub winner_name: Option<String>,
    /// Optional friendly label; schemas without the metadata column leave it
    /// empty and `display_label` falls back to the identifier.
    pub label: Option<String>,
}

impl Round {
    pub fn new_open(id: RoundId, opened_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: RoundStatus::Open,
            opened_at,
            closed_at: None,
            realized_at: None,
            winner_number: None,
            winner_id: None,
            winner_name: None,
            label: None,
        }
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.opened_at).num_days()
    }

    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => format!("Sorteio #{}", self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Participant {
    /// Participants without an email cannot be notified but remain eligible
    /// winners.
    pub fn notifiable_email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Participante")
    }
}

/// The two physical reservation shapes. Callers never distinguish them; the
/// eligibility adapter resolves the shape once and queries accordingly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimedNumbers {
    Single(SlotNumber),
    Set(Vec<SlotNumber>),
}

impl ClaimedNumbers {
    pub fn contains(&self, number: SlotNumber) -> bool {
        match self {
            Self::Single(n) => *n == number,
            Self::Set(set) => set.contains(&number),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = SlotNumber> + '_ {
        match self {
            Self::Single(n) => std::slice::from_ref(n).iter().copied(),
            Self::Set(set) => set.iter().copied(),
        }
    }
}

/// A participant's claim on numbers within a round, with its payment outcome
/// already folded in: `paid` is true when the reservation itself is paid or
/// its linked payment was approved.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub round_id: RoundId,
    pub participant_id: ParticipantId,
    pub numbers: ClaimedNumbers,
    pub paid: bool,
}

/// The state transition applied when a round finalizes.
#[derive(Debug, Clone)]
pub struct Finalization {
    pub round_id: RoundId,
    pub winner_number: SlotNumber,
    /// "No winner" is a valid terminal outcome, not an error.
    pub winner: Option<Participant>,
    pub finalized_at: DateTime<Utc>,
}
