use super::capacity::CapacityResolver;
use crate::domain::notification::{Notification, RoundRef};
use crate::domain::ports::{EligibilityIndexBox, NotifierBox, NumberSourceBox, RoundStoreBox};
use crate::domain::round::{Finalization, Round, RoundStatus, SlotNumber};
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// An open round that neither sold out nor reached this age stays open.
pub const MAX_ROUND_AGE_DAYS: i64 = 7;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub evaluated: usize,
    /// Open rounds closed this run (each also opened a successor).
    pub finalized: usize,
    /// Stale closed-unrealized rounds driven to the terminal state.
    pub recovered: usize,
    pub skipped: usize,
    pub notifications: usize,
}

/// The draw resolution engine.
///
/// Each invocation recomputes every decision from current stored data plus
/// one externally fetched number; the engine holds no state across runs.
pub struct ResolutionEngine {
    rounds: RoundStoreBox,
    eligibility: EligibilityIndexBox,
    numbers: NumberSourceBox,
    capacity: CapacityResolver,
    notifier: NotifierBox,
}

impl ResolutionEngine {
    pub fn new(
        rounds: RoundStoreBox,
        eligibility: EligibilityIndexBox,
        numbers: NumberSourceBox,
        capacity: CapacityResolver,
        notifier: NotifierBox,
    ) -> Self {
        Self {
            rounds,
            eligibility,
            numbers,
            capacity,
            notifier,
        }
    }

    /// One resolution pass over every pending round.
    ///
    /// The official number and the capacity are loaded once and shared by all
    /// rounds, so an upstream failure aborts before any round is touched.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let pending = self.rounds.pending_rounds().await?;
        if pending.is_empty() {
            info!("no pending rounds; nothing to do");
            return Ok(RunSummary::default());
        }

        let capacity = self.capacity.resolve().await;
        let number = self.numbers.fetch().await?;
        info!(
            rounds = pending.len(),
            capacity,
            number = %number,
            "starting resolution pass"
        );

        let mut summary = RunSummary::default();
        for round in pending {
            summary.evaluated += 1;
            match round.status {
                // Excluded by the pending query; guarded anyway.
                RoundStatus::Drawn => {
                    warn!(round = %round.id, "already realized round in pending set; skipping");
                }
                RoundStatus::ClosedUnrealized => {
                    info!(round = %round.id, "recovering closed round that was never realized");
                    self.finalize_round(&round, number, now, &mut summary)
                        .await?;
                    summary.recovered += 1;
                }
                RoundStatus::Open => {
                    let sold = self.eligibility.sold_count(round.id).await?;
                    let age_days = round.age_days(now);
                    if sold >= capacity || age_days >= MAX_ROUND_AGE_DAYS {
                        info!(
                            round = %round.id,
                            sold,
                            age_days,
                            "closing round (sold out or past maximum age)"
                        );
                        self.finalize_round(&round, number, now, &mut summary)
                            .await?;
                        let successor = self.rounds.open_round(now).await?;
                        info!(round = %round.id, successor = %successor, "opened successor round");
                        summary.finalized += 1;
                    } else {
                        info!(round = %round.id, sold, age_days, "round stays open");
                        summary.skipped += 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Applies the terminal transition and emits the full set of intents.
    ///
    /// The store guards the write on the realized marker; when another run
    /// already realized the round nothing is written and no intent is sent.
    async fn finalize_round(
        &self,
        round: &Round,
        number: SlotNumber,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let owner = self.eligibility.owner_of(round.id, number).await?;
        let finalization = Finalization {
            round_id: round.id,
            winner_number: number,
            winner: owner.clone(),
            finalized_at: now,
        };
        if !self.rounds.finalize(&finalization).await? {
            warn!(round = %round.id, "round was already realized; skipping");
            return Ok(());
        }

        match &owner {
            Some(winner) => {
                info!(round = %round.id, participant = %winner.id, number = %number, "winner found")
            }
            None => info!(round = %round.id, number = %number, "drawn number has no paying owner"),
        }

        let round_ref = RoundRef {
            id: round.id,
            label: round.display_label(),
        };

        if let Some(winner) = &owner {
            if winner.notifiable_email().is_some() {
                self.notifier
                    .deliver(&Notification::Winner {
                        round: round_ref.clone(),
                        number,
                        recipient: winner.clone(),
                    })
                    .await?;
                summary.notifications += 1;
            } else {
                warn!(
                    round = %round.id,
                    participant = %winner.id,
                    "winner has no email; cannot notify"
                );
            }
        }

        self.notifier
            .deliver(&Notification::AdminSummary {
                round: round_ref.clone(),
                number,
                winner_name: owner.as_ref().map(|w| w.display_name().to_string()),
                winner_email: owner
                    .as_ref()
                    .and_then(|w| w.notifiable_email())
                    .map(str::to_string),
                closed_at: now,
            })
            .await?;
        summary.notifications += 1;

        let winner_name = owner
            .as_ref()
            .map(|w| w.display_name().to_string())
            .unwrap_or_else(|| "-".to_string());
        for participant in self.eligibility.valid_participants(round.id).await? {
            if owner.as_ref().is_some_and(|w| w.id == participant.id) {
                continue;
            }
            self.notifier
                .deliver(&Notification::Loser {
                    round: round_ref.clone(),
                    number,
                    winner_name: winner_name.clone(),
                    recipient: participant,
                })
                .await?;
            summary.notifications += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::{
        FailingNumberSource, FixedNumberSource, InMemoryConfig, InMemoryStore, RecordingNotifier,
    };
    use chrono::TimeDelta;

    fn engine_with(
        store: &InMemoryStore,
        notifier: &RecordingNotifier,
        number: u8,
    ) -> ResolutionEngine {
        ResolutionEngine::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(FixedNumberSource(SlotNumber::new(number as i64).unwrap())),
            CapacityResolver::new(vec![Box::new(InMemoryConfig::new(vec![]))]),
            Box::new(notifier.clone()),
        )
    }

    #[tokio::test]
    async fn test_empty_pending_set_skips_the_fetch() {
        let store = InMemoryStore::new();
        let notifier = RecordingNotifier::new();
        let engine = ResolutionEngine::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            // Would fail the run if the fetch happened.
            Box::new(FailingNumberSource),
            CapacityResolver::new(vec![]),
            Box::new(notifier.clone()),
        );

        let summary = engine.run(Utc::now()).await.unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_upstream_failure_aborts_before_touching_rounds() {
        let store = InMemoryStore::new();
        let round = crate::domain::round::RoundId(1);
        store
            .insert_round(Round::new_open(round, Utc::now() - TimeDelta::days(10)))
            .await;
        let notifier = RecordingNotifier::new();
        let engine = ResolutionEngine::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(FailingNumberSource),
            CapacityResolver::new(vec![]),
            Box::new(notifier.clone()),
        );

        assert!(engine.run(Utc::now()).await.is_err());
        let untouched = store.round(round).await.unwrap();
        assert_eq!(untouched.status, RoundStatus::Open);
        assert!(notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_sold_out_round_closes_regardless_of_age() {
        use crate::domain::round::{ClaimedNumbers, Participant, ParticipantId, Reservation};
        let store = InMemoryStore::new();
        let round = crate::domain::round::RoundId(1);
        store
            .insert_round(Round::new_open(round, Utc::now() - TimeDelta::days(1)))
            .await;
        store
            .insert_participant(Participant {
                id: ParticipantId(1),
                name: Some("Ana".into()),
                email: Some("ana@example.com".into()),
            })
            .await;
        // One participant holding all 100 numbers.
        store
            .insert_reservation(Reservation {
                round_id: round,
                participant_id: ParticipantId(1),
                numbers: ClaimedNumbers::Set(
                    (0..=99).map(|n| SlotNumber::new(n).unwrap()).collect(),
                ),
                paid: true,
            })
            .await;

        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier, 42);
        let summary = engine.run(Utc::now()).await.unwrap();

        assert_eq!(summary.finalized, 1);
        let drawn = store.round(round).await.unwrap();
        assert_eq!(drawn.status, RoundStatus::Drawn);
        assert_eq!(drawn.winner_id, Some(ParticipantId(1)));
    }
}
