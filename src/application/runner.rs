//! Wraps one invocation in a single unit of work gated by the commit flag.
//!
//! Known risk, inherited from the job's contract: notification dispatch is
//! not part of the storage transaction. A message transmitted before a later
//! rollback is not revoked, so notifications are at-least-once while storage
//! keeps exactly-once intent. The non-destructive mode (rollback + log-only
//! notifications) is the default for that reason.

use super::engine::{ResolutionEngine, RunSummary};
use crate::domain::ports::UnitOfWorkBox;
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

pub struct TransactionalRunner {
    unit: UnitOfWorkBox,
    commit: bool,
}

impl TransactionalRunner {
    pub fn new(unit: UnitOfWorkBox, commit: bool) -> Self {
        Self { unit, commit }
    }

    /// Runs the engine inside one transaction. Commits only in commit mode;
    /// any engine error rolls everything back and propagates.
    pub async fn execute(
        &self,
        engine: &ResolutionEngine,
        now: DateTime<Utc>,
    ) -> Result<RunSummary> {
        self.unit.begin().await?;
        match engine.run(now).await {
            Ok(summary) => {
                if self.commit {
                    self.unit.commit().await?;
                    info!("commit applied");
                } else {
                    self.unit.rollback().await?;
                    info!("dry-run: storage changes discarded");
                }
                Ok(summary)
            }
            Err(err) => {
                if let Err(rb) = self.unit.rollback().await {
                    warn!(error = %rb, "rollback after failure also failed");
                }
                Err(err)
            }
        }
    }
}
