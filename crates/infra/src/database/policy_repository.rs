//! SQLite-backed buffer policy store.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use slotbook_core::booking::ports::PolicyStore;
use slotbook_domain::{BufferPolicy, Result as DomainResult};
use tokio::task;

use super::appointment_repository::map_join_error;
use super::manager::{map_sql_error, DbManager};

/// SQLite-backed policy repository.
pub struct SqlitePolicyRepository {
    db: Arc<DbManager>,
}

const POLICY_SELECT_SQL: &str = "SELECT buffer_before_min, buffer_after_min, \
     max_appointments_per_day, min_notice_hours, reservation_hold_minutes \
     FROM buffer_policies WHERE professional_id = ?1";

const POLICY_UPSERT_SQL: &str = "INSERT INTO buffer_policies (
        professional_id, buffer_before_min, buffer_after_min, max_appointments_per_day,
        min_notice_hours, reservation_hold_minutes
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT (professional_id) DO UPDATE SET
        buffer_before_min = excluded.buffer_before_min,
        buffer_after_min = excluded.buffer_after_min,
        max_appointments_per_day = excluded.max_appointments_per_day,
        min_notice_hours = excluded.min_notice_hours,
        reservation_hold_minutes = excluded.reservation_hold_minutes";

impl SqlitePolicyRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Create or replace one professional's booking rules.
    pub async fn upsert_policy(
        &self,
        professional_id: &str,
        policy: &BufferPolicy,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let professional_id = professional_id.to_string();
        let policy = policy.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                POLICY_UPSERT_SQL,
                params![
                    professional_id,
                    policy.buffer_before_min,
                    policy.buffer_after_min,
                    i64::from(policy.max_appointments_per_day),
                    policy.min_notice_hours,
                    policy.reservation_hold_minutes,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyRepository {
    async fn policy_for(&self, professional_id: &str) -> DomainResult<BufferPolicy> {
        let db = Arc::clone(&self.db);
        let professional_id = professional_id.to_string();

        task::spawn_blocking(move || -> DomainResult<BufferPolicy> {
            let conn = db.get_connection()?;
            load_policy(&conn, &professional_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Load one professional's rules, defaulting when unconfigured.
///
/// Shared with the reservation repository so the finalize transaction reads
/// the policy on the same snapshot it validates against.
pub(crate) fn load_policy(
    conn: &Connection,
    professional_id: &str,
) -> rusqlite::Result<BufferPolicy> {
    let row = conn
        .query_row(POLICY_SELECT_SQL, params![professional_id], |row| {
            Ok(BufferPolicy {
                buffer_before_min: row.get(0)?,
                buffer_after_min: row.get(1)?,
                max_appointments_per_day: row.get::<_, i64>(2)?.max(0) as u32,
                min_notice_hours: row.get(3)?,
                reservation_hold_minutes: row.get(4)?,
            })
        })
        .optional()?;
    Ok(row.unwrap_or_default())
}
