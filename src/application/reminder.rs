use crate::domain::notification::{Notification, RoundRef};
use crate::domain::ports::{EligibilityIndexBox, NotifierBox, RoundStoreBox};
use crate::error::Result;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSummary {
    pub notified: usize,
}

/// Read-only pre-draw flow: tells everyone with a valid claim on the most
/// recently opened round that the drawing happens tonight. Mutates nothing;
/// the store connection is expected to be opened read-only.
pub struct ReminderFlow {
    rounds: RoundStoreBox,
    eligibility: EligibilityIndexBox,
    notifier: NotifierBox,
    fallback_recipient: Option<String>,
}

impl ReminderFlow {
    pub fn new(
        rounds: RoundStoreBox,
        eligibility: EligibilityIndexBox,
        notifier: NotifierBox,
        fallback_recipient: Option<String>,
    ) -> Self {
        Self {
            rounds,
            eligibility,
            notifier,
            fallback_recipient,
        }
    }

    pub async fn run(&self) -> Result<ReminderSummary> {
        let mut summary = ReminderSummary::default();

        let Some(round) = self.rounds.latest_open_round().await? else {
            info!("no open round; nothing to announce");
            if let Some(fallback) = &self.fallback_recipient {
                self.notifier
                    .deliver(&Notification::PreDrawReminder {
                        round: None,
                        recipient_email: fallback.clone(),
                    })
                    .await?;
                summary.notified += 1;
            }
            return Ok(summary);
        };

        let participants = self.eligibility.valid_participants(round.id).await?;
        let mut recipients: BTreeSet<String> = participants
            .iter()
            .filter_map(|p| p.notifiable_email())
            .map(str::to_string)
            .collect();
        if recipients.is_empty()
            && let Some(fallback) = &self.fallback_recipient
        {
            recipients.insert(fallback.clone());
        }
        if recipients.is_empty() {
            info!(round = %round.id, "no recipients found (participants or fallback)");
            return Ok(summary);
        }

        let round_ref = RoundRef {
            id: round.id,
            label: round.display_label(),
        };
        info!(round = %round.id, recipients = recipients.len(), "sending pre-draw reminders");
        for recipient in recipients {
            self.notifier
                .deliver(&Notification::PreDrawReminder {
                    round: Some(round_ref.clone()),
                    recipient_email: recipient,
                })
                .await?;
            summary.notified += 1;
        }
        Ok(summary)
    }
}
