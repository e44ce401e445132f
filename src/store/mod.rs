pub mod fake;
pub mod postgres;

pub use fake::FakeStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{MatchRecord, PerformanceSnapshot, Subject};

/// Default trigger times seeded into `scraper_config` and used as the
/// fallback when the config row cannot be read.
pub const DEFAULT_RUN_TIMES: &str = "09:00,21:00";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Persistence backend for scraped records, the subject registry, the
/// schedule config and the tunnel status row. `PgStore` is the real
/// implementation; `FakeStore` backs the tests.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert match records one statement at a time, skipping rows whose
    /// battle_id already exists. Returns the number of rows actually
    /// inserted. A failing row is logged and does not stop the batch.
    async fn insert_matches(&self, matches: &[MatchRecord]) -> Result<u64, StoreError>;

    /// Insert or overwrite the snapshot for (user_code, recorded_at).
    async fn upsert_snapshot(&self, snapshot: &PerformanceSnapshot) -> Result<(), StoreError>;

    async fn list_subjects(&self) -> Result<Vec<Subject>, StoreError>;

    async fn active_subjects(&self) -> Result<Vec<Subject>, StoreError>;

    async fn subject(&self, user_code: &str) -> Result<Option<Subject>, StoreError>;

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StoreError>;

    /// Raw `run_times` CSV. Falls back to [`DEFAULT_RUN_TIMES`] when the
    /// config row is missing.
    async fn run_times(&self) -> Result<String, StoreError>;

    async fn set_run_times(&self, csv: &str) -> Result<(), StoreError>;

    async fn set_public_url(&self, url: &str) -> Result<(), StoreError>;
}
