//! In-process [`Store`] used by the test suite and `STORE_BACKEND=memory`.
//!
//! Mirrors the relational store where handlers can observe it: `created_at`
//! is stamped on insert, a duplicate `data.id` is rejected, and deleting a
//! user cascades to their records. `client_id` is not checked against
//! `users`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::models::{DataPatch, DataRecord, NewDataRecord, User, UserPatch};
use crate::window::TimeFilter;

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    data: Vec<DataRecord>,
}

/// Cheap to clone; clones share the same tables.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user row, as an external provisioning step would.
    pub async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.user_id == user.user_id) {
            return Err(StoreError::Conflict(format!(
                "users.user_id {} already exists",
                user.user_id
            )));
        }
        tables.users.push(user);
        Ok(())
    }

    /// Add a record with its `created_at` already set.
    pub async fn insert_record(&self, record: DataRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        ensure_free_id(&tables.data, record.id)?;
        tables.data.push(record);
        Ok(())
    }
}

fn ensure_free_id(data: &[DataRecord], id: i64) -> StoreResult<()> {
    if data.iter().any(|r| r.id == id) {
        return Err(StoreError::Conflict(format!("data.id {id} already exists")));
    }
    Ok(())
}

/// Interpret a client-supplied bound the way Postgres casts text to `timestamptz`
/// for the formats clients send: RFC 3339, `YYYY-MM-DDTHH:MM:SS`, or a bare date
/// (midnight UTC).
fn parse_bound(raw: &str) -> StoreResult<DateTime<Utc>> {
    // ---
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
        .ok_or_else(|| StoreError::InvalidBound(raw.to_string()))
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email == email && u.password == password)
            .cloned())
    }

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn update_user(&self, user_id: i64, patch: &UserPatch) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .map(|user| {
                patch.apply(user);
                user.clone()
            }))
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<()> {
        // ---
        let mut tables = self.tables.write().await;
        tables.users.retain(|u| u.user_id != user_id);
        // ON DELETE CASCADE
        tables.data.retain(|r| r.client_id != user_id);
        Ok(())
    }

    async fn max_data_id(&self) -> StoreResult<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables.data.iter().map(|r| r.id).max())
    }

    async fn insert_data(&self, record: &NewDataRecord) -> StoreResult<Vec<DataRecord>> {
        // ---
        let mut tables = self.tables.write().await;
        ensure_free_id(&tables.data, record.id)?;

        let r = record.readings;
        let row = DataRecord {
            id: record.id,
            client_id: r.client_id,
            avg_blink_rate: r.avg_blink_rate,
            avg_temp: r.avg_temp,
            left_eye_redness: r.left_eye_redness,
            right_eye_redness: r.right_eye_redness,
            created_at: Utc::now(),
        };
        tables.data.push(row.clone());
        Ok(vec![row])
    }

    async fn data_for_client(
        &self,
        client_id: i64,
        filter: &TimeFilter,
    ) -> StoreResult<Vec<DataRecord>> {
        // ---
        let (lower, upper) = match filter {
            TimeFilter::Unbounded => (None, None),
            TimeFilter::Since(cutoff) => (Some(*cutoff), None),
            TimeFilter::Between { start, end } => {
                (Some(parse_bound(start)?), Some(parse_bound(end)?))
            }
        };

        let tables = self.tables.read().await;
        let mut rows: Vec<DataRecord> = tables
            .data
            .iter()
            .filter(|r| r.client_id == client_id)
            .filter(|r| lower.map_or(true, |t| r.created_at >= t))
            .filter(|r| upper.map_or(true, |t| r.created_at <= t))
            .cloned()
            .collect();

        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_data(&self, id: i64) -> StoreResult<Option<DataRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.data.iter().find(|r| r.id == id).cloned())
    }

    async fn update_data(&self, id: i64, patch: &DataPatch) -> StoreResult<Option<DataRecord>> {
        let mut tables = self.tables.write().await;
        Ok(tables.data.iter_mut().find(|r| r.id == id).map(|record| {
            patch.apply(record);
            record.clone()
        }))
    }

    async fn delete_data(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.data.retain(|r| r.id != id);
        Ok(())
    }
}
