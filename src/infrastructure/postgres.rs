use crate::config::{Settings, clean_postgres_url, mask_postgres_url};
use crate::domain::ports::{ConfigSource, EligibilityIndex, RoundStore, UnitOfWork};
use crate::domain::round::{
    Finalization, Participant, ParticipantId, Round, RoundId, RoundStatus, SlotNumber,
};
use crate::error::{RaffleError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::info;

/// The two physical reservation layouts the store knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservationShape {
    /// `reservations.number` holds exactly one claimed number per row.
    SingleNumber,
    /// `reservations.numbers` holds an array of claimed numbers per row.
    NumberSet,
}

struct Inner {
    pool: PgPool,
    /// The open unit of work, if any. All statements run on it once `begin`
    /// was called; before that they hit the pool directly (reminder flow).
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
    shape: OnceCell<ReservationShape>,
    has_label: OnceCell<bool>,
}

/// Postgres adapter implementing every storage port over one connection.
///
/// Rows are mapped into typed records here; nothing above this boundary sees
/// raw key/value rows.
#[derive(Clone)]
pub struct PgStore {
    inner: Arc<Inner>,
}

const PAID_PREDICATE: &str = "(r.status = 'paid' OR p.status IN ('approved','paid'))";

impl PgStore {
    pub async fn connect(settings: &Settings) -> Result<Self> {
        if settings.postgres_url.trim().is_empty() {
            return Err(RaffleError::Config("POSTGRES_URL is not configured".into()));
        }
        let url = clean_postgres_url(&settings.postgres_url)?;
        info!(url = %mask_postgres_url(&url), "connecting to Postgres");
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(20))
            .connect(&url)
            .await?;
        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                tx: Mutex::new(None),
                shape: OnceCell::new(),
                has_label: OnceCell::new(),
            }),
        })
    }

    /// Connects with the session forced read-only, for flows that must not
    /// mutate anything.
    pub async fn connect_read_only(settings: &Settings) -> Result<Self> {
        let store = Self::connect(settings).await?;
        sqlx::query("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
            .execute(&store.inner.pool)
            .await?;
        Ok(store)
    }

    async fn fetch_all(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<PgRow>> {
        let mut guard = self.inner.tx.lock().await;
        let rows = match guard.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.inner.pool).await?,
        };
        Ok(rows)
    }

    async fn fetch_optional(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Option<PgRow>> {
        let mut guard = self.inner.tx.lock().await;
        let row = match guard.as_mut() {
            Some(tx) => query.fetch_optional(&mut **tx).await?,
            None => query.fetch_optional(&self.inner.pool).await?,
        };
        Ok(row)
    }

    async fn fetch_one(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<PgRow> {
        let mut guard = self.inner.tx.lock().await;
        let row = match guard.as_mut() {
            Some(tx) => query.fetch_one(&mut **tx).await?,
            None => query.fetch_one(&self.inner.pool).await?,
        };
        Ok(row)
    }

    async fn execute(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<u64> {
        let mut guard = self.inner.tx.lock().await;
        let result = match guard.as_mut() {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&self.inner.pool).await?,
        };
        Ok(result.rows_affected())
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let row = self
            .fetch_one(
                sqlx::query(
                    "SELECT COUNT(*) AS n FROM information_schema.columns \
                     WHERE table_name = $1 AND column_name = $2",
                )
                .bind(table)
                .bind(column),
            )
            .await?;
        let count: i64 = row.try_get("n")?;
        Ok(count > 0)
    }

    /// Resolves the reservation layout once; neither known column present is
    /// fatal, since eligibility cannot be determined by guessing.
    async fn reservation_shape(&self) -> Result<ReservationShape> {
        self.inner
            .shape
            .get_or_try_init(|| async {
                if self.column_exists("reservations", "number").await? {
                    Ok(ReservationShape::SingleNumber)
                } else if self.column_exists("reservations", "numbers").await? {
                    Ok(ReservationShape::NumberSet)
                } else {
                    Err(RaffleError::UnsupportedSchema(
                        "reservations has neither a 'number' column nor a 'numbers' array".into(),
                    ))
                }
            })
            .await
            .copied()
    }

    /// Whether draws carry the optional friendly-label column. Missing
    /// metadata is not an error; labels fall back to the identifier.
    async fn label_column(&self) -> Result<bool> {
        self.inner
            .has_label
            .get_or_try_init(|| async { self.column_exists("draws", "name").await })
            .await
            .copied()
    }

    fn round_columns(has_label: bool) -> &'static str {
        if has_label {
            "id, status, opened_at, closed_at, realized_at, \
             winner_number, winner_user_id, winner_name, name"
        } else {
            "id, status, opened_at, closed_at, realized_at, \
             winner_number, winner_user_id, winner_name"
        }
    }

    fn row_to_round(row: &PgRow, has_label: bool) -> Result<Round> {
        let realized_at: Option<DateTime<Utc>> = row.try_get("realized_at")?;
        let status: String = row.try_get("status")?;
        let winner_number: Option<i32> = row.try_get("winner_number")?;
        Ok(Round {
            id: RoundId(row.try_get("id")?),
            status: RoundStatus::from_db(&status, realized_at.is_some()),
            opened_at: row.try_get("opened_at")?,
            closed_at: row.try_get("closed_at")?,
            realized_at,
            winner_number: winner_number
                .map(|n| SlotNumber::new(n as i64))
                .transpose()?,
            winner_id: row
                .try_get::<Option<i64>, _>("winner_user_id")?
                .map(ParticipantId),
            winner_name: row.try_get("winner_name")?,
            label: if has_label { row.try_get("name")? } else { None },
        })
    }

    fn row_to_participant(row: &PgRow) -> Result<Participant> {
        Ok(Participant {
            id: ParticipantId(row.try_get("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
        })
    }
}

#[async_trait]
impl RoundStore for PgStore {
    async fn pending_rounds(&self) -> Result<Vec<Round>> {
        let has_label = self.label_column().await?;
        let sql = format!(
            "SELECT {} FROM draws WHERE realized_at IS NULL ORDER BY id ASC",
            Self::round_columns(has_label)
        );
        let rows = self.fetch_all(sqlx::query(&sql)).await?;
        rows.iter()
            .map(|row| Self::row_to_round(row, has_label))
            .collect()
    }

    async fn latest_open_round(&self) -> Result<Option<Round>> {
        let has_label = self.label_column().await?;
        let sql = format!(
            "SELECT {} FROM draws WHERE status = 'open' ORDER BY id DESC LIMIT 1",
            Self::round_columns(has_label)
        );
        let row = self.fetch_optional(sqlx::query(&sql)).await?;
        row.map(|row| Self::row_to_round(&row, has_label)).transpose()
    }

    async fn finalize(&self, finalization: &Finalization) -> Result<bool> {
        // Guarded on the realized marker so a repeated run writes nothing.
        let affected = self
            .execute(
                sqlx::query(
                    "UPDATE draws \
                        SET status = $2, \
                            winner_number = $3, \
                            winner_user_id = $4, \
                            winner_name = $5, \
                            closed_at = COALESCE(closed_at, $6), \
                            realized_at = $6 \
                      WHERE id = $1 \
                        AND realized_at IS NULL",
                )
                .bind(finalization.round_id.0)
                .bind(RoundStatus::Drawn.as_str())
                .bind(finalization.winner_number.value() as i32)
                .bind(finalization.winner.as_ref().map(|w| w.id.0))
                .bind(finalization.winner.as_ref().and_then(|w| w.name.as_deref()))
                .bind(finalization.finalized_at),
            )
            .await?;
        Ok(affected == 1)
    }

    async fn open_round(&self, opened_at: DateTime<Utc>) -> Result<RoundId> {
        let row = self
            .fetch_one(
                sqlx::query("INSERT INTO draws (status, opened_at) VALUES ($1, $2) RETURNING id")
                    .bind(RoundStatus::Open.as_str())
                    .bind(opened_at),
            )
            .await?;
        Ok(RoundId(row.try_get("id")?))
    }
}

#[async_trait]
impl EligibilityIndex for PgStore {
    async fn owner_of(&self, round: RoundId, number: SlotNumber) -> Result<Option<Participant>> {
        let number_predicate = match self.reservation_shape().await? {
            ReservationShape::SingleNumber => "r.number = $2",
            ReservationShape::NumberSet => "$2 = ANY(r.numbers)",
        };
        let sql = format!(
            "SELECT u.id, u.name, u.email \
               FROM reservations r \
          LEFT JOIN payments p ON p.id = r.payment_id \
               JOIN users u ON u.id = r.user_id \
              WHERE r.draw_id = $1 AND {number_predicate} AND {PAID_PREDICATE} \
              LIMIT 1"
        );
        let row = self
            .fetch_optional(
                sqlx::query(&sql)
                    .bind(round.0)
                    .bind(number.value() as i32),
            )
            .await?;
        row.map(|row| Self::row_to_participant(&row)).transpose()
    }

    async fn sold_count(&self, round: RoundId) -> Result<u32> {
        let sql = match self.reservation_shape().await? {
            ReservationShape::SingleNumber => format!(
                "SELECT COUNT(DISTINCT r.number) AS sold \
                   FROM reservations r \
              LEFT JOIN payments p ON p.id = r.payment_id \
                  WHERE r.draw_id = $1 AND {PAID_PREDICATE}"
            ),
            ReservationShape::NumberSet => format!(
                "SELECT COUNT(DISTINCT n.n) AS sold \
                   FROM reservations r \
              LEFT JOIN payments p ON p.id = r.payment_id \
             CROSS JOIN LATERAL unnest(r.numbers) AS n(n) \
                  WHERE r.draw_id = $1 AND {PAID_PREDICATE}"
            ),
        };
        let row = self.fetch_one(sqlx::query(&sql).bind(round.0)).await?;
        let sold: i64 = row.try_get("sold")?;
        Ok(sold as u32)
    }

    async fn valid_participants(&self, round: RoundId) -> Result<Vec<Participant>> {
        // Participants reached either through a paid reservation or through
        // an approved payment recorded directly against the draw.
        let sql = format!(
            "SELECT DISTINCT u.id, u.name, u.email \
               FROM users u \
               JOIN reservations r ON r.user_id = u.id \
          LEFT JOIN payments p ON p.id = r.payment_id \
              WHERE r.draw_id = $1 AND {PAID_PREDICATE} \
                AND COALESCE(NULLIF(u.email, ''), '') <> '' \
              UNION \
             SELECT DISTINCT u.id, u.name, u.email \
               FROM users u \
               JOIN payments p ON p.user_id = u.id \
              WHERE p.draw_id = $1 AND p.status IN ('approved','paid') \
                AND COALESCE(NULLIF(u.email, ''), '') <> '' \
              ORDER BY 1"
        );
        let rows = self.fetch_all(sqlx::query(&sql).bind(round.0)).await?;
        rows.iter().map(Self::row_to_participant).collect()
    }
}

#[async_trait]
impl UnitOfWork for PgStore {
    async fn begin(&self) -> Result<()> {
        let tx = self.inner.pool.begin().await?;
        *self.inner.tx.lock().await = Some(tx);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        if let Some(tx) = self.inner.tx.lock().await.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        if let Some(tx) = self.inner.tx.lock().await.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

/// One of the flat key/value configuration tables, exposed as a
/// `ConfigSource` view over the shared store.
pub struct PgConfigTable {
    store: PgStore,
    table: &'static str,
}

impl PgConfigTable {
    pub fn new(store: PgStore, table: &'static str) -> Self {
        Self { store, table }
    }
}

#[async_trait]
impl ConfigSource for PgConfigTable {
    async fn entries(&self) -> Result<Vec<(String, String)>> {
        // `table` comes from a fixed internal list, never from user input.
        let sql = format!("SELECT key, value FROM {}", self.table);
        let rows = self.store.fetch_all(sqlx::query(&sql)).await?;
        rows.iter()
            .map(|row| Ok((row.try_get("key")?, row.try_get("value")?)))
            .collect()
    }
}
