//! # Ingredient Event Outbox Repository
//!
//! Durable record of every committed ingredient change, and the claim that
//! makes its delivery happen exactly once.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  update_ingredient                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. UPDATE ingredients SET ... WHERE id = ?                     │   │
//! │  │  2. INSERT INTO ingredient_events (id, payload, ...)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ──► event released to the dispatcher (hot path)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  DISPATCHER (hot path or relay sweep)                           │   │
//! │  │                                                                 │   │
//! │  │  claim:  UPDATE ingredient_events SET claimed_at = now,         │   │
//! │  │            attempts = attempts + 1                              │   │
//! │  │          WHERE id = ? AND dispatched_at IS NULL                 │   │
//! │  │          AND (claimed_at IS NULL OR claimed_at <= lease cutoff) │   │
//! │  │                                                                 │   │
//! │  │  rows_affected = 1 → this caller runs the cascade               │   │
//! │  │  rows_affected = 0 → someone else holds or finished it; skip    │   │
//! │  │                                                                 │   │
//! │  │  cascade ran             → mark_dispatched / mark_failed        │   │
//! │  │  cascade could not start → release (claimed_at = NULL)          │   │
//! │  │                            or give up after max attempts        │   │
//! │  │  dispatcher died         → claim expires, relay reclaims        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use costify_core::{Id, IngredientUpdated};

/// One stored event with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub event: IngredientUpdated,
    pub created_at: DateTime<Utc>,
    /// Last claim. Ignored once `dispatched_at` is set.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Delivery finished.
    pub dispatched_at: Option<DateTime<Utc>>,
    pub attempts: i64,
    pub last_error: Option<String>,
}

impl OutboxEntry {
    pub fn event_id(&self) -> Uuid {
        self.event.event_id
    }

    pub fn ingredient_id(&self) -> &Id {
        &self.event.ingredient_id
    }
}

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: String,
    payload: String,
    created_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    dispatched_at: Option<DateTime<Utc>>,
    attempts: i64,
    last_error: Option<String>,
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = DbError;

    fn try_from(row: OutboxRow) -> DbResult<Self> {
        let event: IngredientUpdated = serde_json::from_str(&row.payload)?;
        if event.event_id.to_string() != row.id {
            return Err(DbError::InvalidData(format!(
                "outbox row {} carries event {}",
                row.id, event.event_id
            )));
        }
        Ok(OutboxEntry {
            event,
            created_at: row.created_at,
            claimed_at: row.claimed_at,
            dispatched_at: row.dispatched_at,
            attempts: row.attempts,
            last_error: row.last_error,
        })
    }
}

/// Writes the outbox row inside the caller's transaction.
pub(crate) async fn insert_event(conn: &mut SqliteConnection, event: &IngredientUpdated) -> DbResult<()> {
    let payload = serde_json::to_string(event)?;

    sqlx::query(
        r#"
        INSERT INTO ingredient_events (
            id, ingredient_id, event_type, payload, created_at, attempts
        ) VALUES (?1, ?2, ?3, ?4, ?5, 0)
        "#,
    )
    .bind(event.event_id.to_string())
    .bind(event.ingredient_id.as_str())
    .bind(event.event_type())
    .bind(payload)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Repository for the ingredient event outbox.
#[derive(Debug, Clone)]
pub struct EventOutboxRepository {
    pool: SqlitePool,
}

impl EventOutboxRepository {
    /// Creates a new EventOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EventOutboxRepository { pool }
    }

    /// Gets one entry by event id.
    pub async fn get(&self, event_id: Uuid) -> DbResult<Option<OutboxEntry>> {
        let row: Option<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, payload, created_at, claimed_at, dispatched_at, attempts, last_error
            FROM ingredient_events
            WHERE id = ?1
            "#,
        )
        .bind(event_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OutboxEntry::try_from).transpose()
    }

    /// Atomically claims an event for delivery.
    ///
    /// A previous claim made at or before `stale_before` that never finished
    /// is taken over.
    ///
    /// ## Returns
    /// `true` for exactly one caller per live claim; `false` if the row is
    /// dispatched, held by a live claim, or does not exist (yet).
    pub async fn claim(&self, event_id: Uuid, stale_before: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ingredient_events SET
                claimed_at = ?2,
                attempts = attempts + 1
            WHERE id = ?1
            AND dispatched_at IS NULL
            AND (claimed_at IS NULL OR claimed_at <= ?3)
            "#,
        )
        .bind(event_id.to_string())
        .bind(Utc::now())
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
        debug!(event_id = %event_id, claimed, "Outbox claim");
        Ok(claimed)
    }

    /// Undispatched entries created at or before `older_than` that are
    /// unclaimed or whose claim dates from `stale_before` or earlier, oldest
    /// first.
    pub async fn pending(
        &self,
        older_than: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<OutboxEntry>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, payload, created_at, claimed_at, dispatched_at, attempts, last_error
            FROM ingredient_events
            WHERE dispatched_at IS NULL
            AND created_at <= ?1
            AND (claimed_at IS NULL OR claimed_at <= ?2)
            ORDER BY created_at ASC
            LIMIT ?3
            "#,
        )
        .bind(older_than)
        .bind(stale_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    /// Drops the claim after a delivery that could not start.
    pub async fn release(&self, event_id: Uuid, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE ingredient_events SET
                claimed_at = NULL,
                last_error = ?2
            WHERE id = ?1 AND dispatched_at IS NULL
            "#,
        )
        .bind(event_id.to_string())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Marks a claimed event delivered.
    pub async fn mark_dispatched(&self, event_id: Uuid) -> DbResult<()> {
        sqlx::query("UPDATE ingredient_events SET dispatched_at = ?2 WHERE id = ?1")
            .bind(event_id.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Marks a claimed event finished with an error. It is not delivered again.
    pub async fn mark_failed(&self, event_id: Uuid, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE ingredient_events SET
                dispatched_at = ?2,
                last_error = ?3
            WHERE id = ?1
            "#,
        )
        .bind(event_id.to_string())
        .bind(Utc::now())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts undispatched entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ingredient_events WHERE dispatched_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes dispatched entries older than `cutoff`.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn prune_dispatched(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM ingredient_events
            WHERE dispatched_at IS NOT NULL
            AND dispatched_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
