//! Persistence behind the ingestion and query pipelines.
//!
//! Everything that touches storage goes through the [`Store`] trait so
//! the pipelines can be driven against [`MemStore`] in tests and local
//! development while production runs on [`PgStore`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CoordinatorReading, SensorFields, Tick};

pub use memory::MemStore;
pub use postgres::PgStore;

/// Most-recent entries kept per rolling ingest log stream.
pub const LOG_CAPACITY: i64 = 1000;

/// Time-series plus registry storage.
///
/// Appends never deduplicate: two records with the same score are both
/// kept and their relative order is unspecified. Every operation is a
/// single round trip; there are no multi-statement transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a tick into the sensor's series, ordered by `score`
    /// (seconds since epoch).
    async fn append_tick(&self, sensor_id: &str, score: i64, tick: &Tick) -> Result<()>;

    /// Fetch by ordinal position, newest first; 0 is the most recent
    /// record and `stop` is inclusive.
    async fn ticks_by_index(&self, sensor_id: &str, start: i64, stop: i64) -> Result<Vec<Tick>>;

    /// Fetch all ticks with `start <= score <= end`, oldest first.
    async fn ticks_by_score(&self, sensor_id: &str, start: i64, end: i64) -> Result<Vec<Tick>>;

    async fn append_coordinator_reading(
        &self,
        score: i64,
        reading: &CoordinatorReading,
    ) -> Result<()>;

    async fn coordinator_readings_by_index(
        &self,
        coordinator_id: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<CoordinatorReading>>;

    /// Which coordinator currently owns the sensor, if any.
    async fn coordinator_for_sensor(&self, sensor_id: &str) -> Result<Option<String>>;

    /// Point the sensor at a coordinator (last writer wins) and add it
    /// to that coordinator's sensor set (grows monotonically).
    async fn associate_sensor(&self, sensor_id: &str, coordinator_id: &str) -> Result<()>;

    /// Make the coordinator known and overwrite its access token.
    async fn register_coordinator(&self, coordinator_id: &str, token: &str) -> Result<()>;

    async fn coordinator_sensor_ids(&self, coordinator_id: &str) -> Result<Vec<String>>;

    async fn coordinator_token(&self, coordinator_id: &str) -> Result<Option<String>>;

    async fn coordinator_label(&self, coordinator_id: &str) -> Result<Option<String>>;

    async fn set_coordinator_label(&self, coordinator_id: &str, label: &str) -> Result<()>;

    async fn sensor_fields(&self, sensor_id: &str) -> Result<SensorFields>;

    /// Upsert per-sensor admin fields; `None` values leave the stored
    /// field untouched.
    async fn update_sensor_fields(&self, sensor_id: &str, fields: &SensorFields) -> Result<()>;

    /// Append to a rolling diagnostic log, trimmed to [`LOG_CAPACITY`].
    async fn push_ingest_log(&self, stream: &str, entry: &str) -> Result<()>;

    /// Most recent entries first, at most `limit`.
    async fn recent_ingest_logs(&self, stream: &str, limit: i64) -> Result<Vec<String>>;
}
