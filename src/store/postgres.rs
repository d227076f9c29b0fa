//! Postgres implementation of the [`Store`] trait.
//!
//! The original deployment kept these structures in Redis sorted sets
//! and hashes; the same logical layout maps onto plain tables here.
//! Scores stay explicit BIGINT columns so index- and score-range reads
//! keep their sorted-set semantics.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};

use super::{Store, LOG_CAPACITY};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{CoordinatorReading, SensorFields, Tick};

pub type DbPool = Pool<Postgres>;

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    /// Connect and make sure the schema exists.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ticks (
                sensor_id TEXT NOT NULL,
                score BIGINT NOT NULL,
                datetime TIMESTAMPTZ NOT NULL,
                next_data_session TEXT,
                battery_voltage DOUBLE PRECISION NOT NULL,
                raw_temperature DOUBLE PRECISION NOT NULL,
                temperature DOUBLE PRECISION NOT NULL,
                humidity BIGINT NOT NULL,
                radio_quality BIGINT NOT NULL,
                send_counter BIGINT NOT NULL,
                version BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ticks_sensor_score ON ticks (sensor_id, score)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coordinator_readings (
                coordinator_id TEXT NOT NULL,
                score BIGINT NOT NULL,
                datetime TIMESTAMPTZ NOT NULL,
                gsm_coverage BIGINT NOT NULL,
                battery_voltage DOUBLE PRECISION NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_coordinator_readings_score \
             ON coordinator_readings (coordinator_id, score)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coordinators (
                id TEXT PRIMARY KEY,
                label TEXT,
                token TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sensor_coordinator (
                sensor_id TEXT PRIMARY KEY,
                coordinator_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coordinator_sensors (
                coordinator_id TEXT NOT NULL,
                sensor_id TEXT NOT NULL,
                PRIMARY KEY (coordinator_id, sensor_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sensors (
                id TEXT PRIMARY KEY,
                lat TEXT,
                lng TEXT,
                calibration_constant DOUBLE PRECISION
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingest_logs (
                seq BIGSERIAL PRIMARY KEY,
                stream TEXT NOT NULL,
                entry TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ingest_logs_stream ON ingest_logs (stream, seq DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn append_tick(&self, sensor_id: &str, score: i64, tick: &Tick) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ticks (sensor_id, score, datetime, next_data_session, battery_voltage,
                raw_temperature, temperature, humidity, radio_quality, send_counter, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(sensor_id)
        .bind(score)
        .bind(tick.datetime)
        .bind(&tick.next_data_session)
        .bind(tick.battery_voltage)
        .bind(tick.raw_temperature)
        .bind(tick.temperature)
        .bind(tick.humidity)
        .bind(tick.radio_quality)
        .bind(tick.send_counter)
        .bind(tick.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ticks_by_index(&self, sensor_id: &str, start: i64, stop: i64) -> Result<Vec<Tick>> {
        let limit = (stop - start + 1).max(0);
        let ticks = sqlx::query_as::<_, Tick>(
            r#"
            SELECT sensor_id, datetime, next_data_session, battery_voltage, raw_temperature,
                temperature, humidity, radio_quality, send_counter, version
            FROM ticks WHERE sensor_id = $1
            ORDER BY score DESC OFFSET $2 LIMIT $3
            "#,
        )
        .bind(sensor_id)
        .bind(start)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ticks)
    }

    async fn ticks_by_score(&self, sensor_id: &str, start: i64, end: i64) -> Result<Vec<Tick>> {
        let ticks = sqlx::query_as::<_, Tick>(
            r#"
            SELECT sensor_id, datetime, next_data_session, battery_voltage, raw_temperature,
                temperature, humidity, radio_quality, send_counter, version
            FROM ticks WHERE sensor_id = $1 AND score BETWEEN $2 AND $3
            ORDER BY score ASC
            "#,
        )
        .bind(sensor_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(ticks)
    }

    async fn append_coordinator_reading(
        &self,
        score: i64,
        reading: &CoordinatorReading,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coordinator_readings (coordinator_id, score, datetime, gsm_coverage,
                battery_voltage)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&reading.coordinator_id)
        .bind(score)
        .bind(reading.datetime)
        .bind(reading.gsm_coverage)
        .bind(reading.battery_voltage)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn coordinator_readings_by_index(
        &self,
        coordinator_id: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<CoordinatorReading>> {
        let limit = (stop - start + 1).max(0);
        let readings = sqlx::query_as::<_, CoordinatorReading>(
            "SELECT coordinator_id, datetime, gsm_coverage, battery_voltage \
             FROM coordinator_readings WHERE coordinator_id = $1 \
             ORDER BY score DESC OFFSET $2 LIMIT $3",
        )
        .bind(coordinator_id)
        .bind(start)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }

    async fn coordinator_for_sensor(&self, sensor_id: &str) -> Result<Option<String>> {
        let row =
            sqlx::query("SELECT coordinator_id FROM sensor_coordinator WHERE sensor_id = $1")
                .bind(sensor_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| r.get("coordinator_id")))
    }

    async fn associate_sensor(&self, sensor_id: &str, coordinator_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sensor_coordinator (sensor_id, coordinator_id)
            VALUES ($1, $2)
            ON CONFLICT (sensor_id) DO UPDATE SET coordinator_id = EXCLUDED.coordinator_id
            "#,
        )
        .bind(sensor_id)
        .bind(coordinator_id)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO coordinator_sensors (coordinator_id, sensor_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(coordinator_id)
        .bind(sensor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn register_coordinator(&self, coordinator_id: &str, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coordinators (id, token)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET token = EXCLUDED.token
            "#,
        )
        .bind(coordinator_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn coordinator_sensor_ids(&self, coordinator_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT sensor_id FROM coordinator_sensors WHERE coordinator_id = $1 \
             ORDER BY sensor_id",
        )
        .bind(coordinator_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get("sensor_id")).collect())
    }

    async fn coordinator_token(&self, coordinator_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT token FROM coordinators WHERE id = $1")
            .bind(coordinator_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| r.get::<Option<String>, _>("token")))
    }

    async fn coordinator_label(&self, coordinator_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT label FROM coordinators WHERE id = $1")
            .bind(coordinator_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| r.get::<Option<String>, _>("label")))
    }

    async fn set_coordinator_label(&self, coordinator_id: &str, label: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coordinators (id, label)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET label = EXCLUDED.label
            "#,
        )
        .bind(coordinator_id)
        .bind(label)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn sensor_fields(&self, sensor_id: &str) -> Result<SensorFields> {
        let fields = sqlx::query_as::<_, SensorFields>(
            "SELECT lat, lng, calibration_constant FROM sensors WHERE id = $1",
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(fields.unwrap_or_default())
    }

    async fn update_sensor_fields(&self, sensor_id: &str, fields: &SensorFields) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sensors (id, lat, lng, calibration_constant)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                lat = COALESCE(EXCLUDED.lat, sensors.lat),
                lng = COALESCE(EXCLUDED.lng, sensors.lng),
                calibration_constant =
                    COALESCE(EXCLUDED.calibration_constant, sensors.calibration_constant)
            "#,
        )
        .bind(sensor_id)
        .bind(&fields.lat)
        .bind(&fields.lng)
        .bind(fields.calibration_constant)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn push_ingest_log(&self, stream: &str, entry: &str) -> Result<()> {
        sqlx::query("INSERT INTO ingest_logs (stream, entry) VALUES ($1, $2)")
            .bind(stream)
            .bind(entry)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM ingest_logs
            WHERE stream = $1 AND seq NOT IN (
                SELECT seq FROM ingest_logs WHERE stream = $1
                ORDER BY seq DESC LIMIT $2
            )
            "#,
        )
        .bind(stream)
        .bind(LOG_CAPACITY)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_ingest_logs(&self, stream: &str, limit: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT entry FROM ingest_logs WHERE stream = $1 ORDER BY seq DESC LIMIT $2",
        )
        .bind(stream)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get("entry")).collect())
    }
}
