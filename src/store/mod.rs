//! Store gateway: the [`Store`] trait every backend implements, its error
//! type, and [`connect`] which builds the backend selected in [`Config`].
//!
//! Handlers only ever see `Arc<dyn Store>`, so tests swap in
//! [`MemoryStore`] without touching routing code.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, StoreBackend};
use crate::models::{DataPatch, DataRecord, NewDataRecord, User, UserPatch};
use crate::window::TimeFilter;

mod memory;
mod postgres;
mod rest;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rest::RestStore;

// ---

/// Failures reported by a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// The REST store answered with a non-success status.
    #[error("store rejected request ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("could not decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A time bound the store cannot interpret.
    #[error("invalid date bound '{0}'")]
    InvalidBound(String),

    /// Primary-key collision.
    #[error("duplicate key: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Table-level operations over `users` and `data`.
///
/// Lookups return `Ok(None)` for a missing row; `Err` is reserved for the
/// store itself failing.
#[async_trait]
pub trait Store: Send + Sync {
    /// First user whose email and password both match exactly.
    async fn find_user_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> StoreResult<Option<User>>;

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>>;

    /// Apply `patch` and return the updated row, or `None` if it vanished.
    async fn update_user(&self, user_id: i64, patch: &UserPatch) -> StoreResult<Option<User>>;

    /// Delete a user; their `data` rows go with them.
    async fn delete_user(&self, user_id: i64) -> StoreResult<()>;

    /// Greatest `data.id`, or `None` when the table is empty.
    async fn max_data_id(&self) -> StoreResult<Option<i64>>;

    /// Insert with the caller-chosen id and return the stored rows.
    async fn insert_data(&self, record: &NewDataRecord) -> StoreResult<Vec<DataRecord>>;

    /// Rows for `client_id` matching `filter`, newest `created_at` first.
    async fn data_for_client(
        &self,
        client_id: i64,
        filter: &TimeFilter,
    ) -> StoreResult<Vec<DataRecord>>;

    async fn find_data(&self, id: i64) -> StoreResult<Option<DataRecord>>;

    async fn update_data(&self, id: i64, patch: &DataPatch) -> StoreResult<Option<DataRecord>>;

    async fn delete_data(&self, id: i64) -> StoreResult<()>;
}

/// Shared handle injected into the router as state.
pub type SharedStore = Arc<dyn Store>;

/// Build the store selected by `cfg.backend`.
pub async fn connect(cfg: &Config) -> Result<SharedStore> {
    // ---
    let store: SharedStore = match cfg.backend {
        StoreBackend::Postgres => {
            let db_url = cfg
                .db_url
                .as_deref()
                .ok_or_else(|| anyhow!("DATABASE_URL is required for the postgres backend"))?;
            Arc::new(PgStore::connect(db_url, cfg.db_pool_max).await?)
        }
        StoreBackend::Rest => {
            let (url, key) = cfg
                .rest_url
                .as_deref()
                .zip(cfg.rest_key.as_deref())
                .ok_or_else(|| {
                    anyhow!("SUPABASE_URL and SUPABASE_KEY are required for the rest backend")
                })?;
            Arc::new(RestStore::new(url, key)?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(store)
}
