//! Read-side service backing the HTTP API.
//!
//! Ingestion writes through [`crate::ingest::Ingestor`]; everything the API
//! serves (tick ranges, downsampled dots, coordinator rosters) is assembled
//! here from the same [`Store`].

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::downsample::downsample;
use crate::error::{AppError, Result};
use crate::models::{Coordinator, Sensor, SensorFields, Tick};
use crate::store::Store;

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn Store>,
}

impl QueryService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// All ticks for a sensor with epoch score in `start..=end`, oldest first.
    pub async fn ticks(&self, sensor_id: &str, start: i64, end: i64) -> Result<Vec<Tick>> {
        self.store.ticks_by_score(sensor_id, start, end).await
    }

    /// Ticks in `start..=end` averaged into `dots_per_day` buckets per day.
    /// `dots_per_day == 0` disables averaging and returns the raw ticks.
    pub async fn dots(
        &self,
        sensor_id: &str,
        start: i64,
        end: i64,
        dots_per_day: i64,
    ) -> Result<Vec<Tick>> {
        if !(0..=24).contains(&dots_per_day) {
            return Err(AppError::InvalidInput(
                "dots_per_day must be in range 0-24".to_string(),
            ));
        }

        let ticks = self.store.ticks_by_score(sensor_id, start, end).await?;
        let start = from_epoch(start, "start")?;
        let end = from_epoch(end, "end")?;

        Ok(downsample(&ticks, dots_per_day, start, end))
    }

    /// Every sensor a coordinator has reported for, with the timestamp of its
    /// most recent tick and any stored position.
    pub async fn coordinator_sensors(&self, coordinator_id: &str) -> Result<Vec<Sensor>> {
        let ids = self.store.coordinator_sensor_ids(coordinator_id).await?;

        let mut sensors = Vec::with_capacity(ids.len());
        for id in ids {
            let fields = self.store.sensor_fields(&id).await?;
            let newest = self.store.ticks_by_index(&id, 0, 0).await?;

            sensors.push(Sensor {
                id,
                last_tick: newest.first().map(|tick| tick.datetime),
                coordinator_id: coordinator_id.to_string(),
                lat: fields.lat,
                lng: fields.lng,
            });
        }

        Ok(sensors)
    }

    /// Look up a coordinator, authenticating with its access token. The label
    /// falls back to the id until one has been stored.
    pub async fn coordinator_by_token(
        &self,
        coordinator_id: &str,
        token: &str,
    ) -> Result<Coordinator> {
        match self.store.coordinator_token(coordinator_id).await? {
            Some(stored) if stored == token => {}
            _ => return Err(AppError::Unauthorized),
        }

        let label = self
            .store
            .coordinator_label(coordinator_id)
            .await?
            .unwrap_or_else(|| coordinator_id.to_string());

        Ok(Coordinator {
            id: coordinator_id.to_string(),
            label,
            token: token.to_string(),
        })
    }

    pub async fn set_coordinator_label(&self, coordinator_id: &str, label: &str) -> Result<()> {
        self.store.set_coordinator_label(coordinator_id, label).await
    }

    /// Merge position and calibration updates into the sensor registry.
    /// Fields absent from `fields` keep their stored values.
    pub async fn update_sensor(&self, sensor_id: &str, fields: &SensorFields) -> Result<()> {
        self.store.update_sensor_fields(sensor_id, fields).await
    }

    /// Newest-first raw upload log entries for one ingestion stream.
    pub async fn recent_logs(&self, stream: &str, limit: i64) -> Result<Vec<String>> {
        self.store.recent_ingest_logs(stream, limit).await
    }
}

fn from_epoch(secs: i64, field: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AppError::InvalidInput(format!("invalid {field}: {secs}")))
}
