//! `ocular-sensor-api`: HTTP CRUD over the `users` and `data` tables of a
//! hosted relational database.
//!
//! Sibling modules only know about each other through the re-exports here,
//! so `main.rs` and the integration tests share one gateway.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;
pub mod window;

pub use config::{Config, StoreBackend};
pub use error::{AppError, AppResult};
pub use models::{
    DataPatch, DataRecord, NewDataRecord, PublicUser, SensorReadings, User, UserPatch,
};
pub use routes::router;
pub use store::{MemoryStore, PgStore, RestStore, SharedStore, Store, StoreError};
pub use window::{TimeFilter, TimeRange, WindowQuery};
