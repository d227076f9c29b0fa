//! Decode-and-save pipeline behind the upload listeners.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};

use crate::codec;
use crate::error::{AppError, Result};
use crate::framer::extract_messages;
use crate::models::{FormatVersion, Tick};
use crate::protocol::{v1, v2, v3};
use crate::store::Store;

pub struct Ingestor {
    store: Arc<dyn Store>,
    default_coordinator_id: String,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, default_coordinator_id: impl Into<String>) -> Self {
        Self {
            store,
            default_coordinator_id: default_coordinator_id.into(),
        }
    }

    /// Decode a raw upload buffer with the decoder bound to the port
    /// that received it, then persist every reading.
    pub async fn handle_upload(&self, version: FormatVersion, payload: &[u8]) -> Result<()> {
        // The raw buffer goes to the rolling log even when it later
        // fails to decode; the log exists to debug exactly those.
        let entry = format!("{} {}", Utc::now(), String::from_utf8_lossy(payload));
        if let Err(e) = self
            .store
            .push_ingest_log(version.log_stream(), &entry)
            .await
        {
            error!(stream = version.log_stream(), error = %e, "failed to append ingest log");
        }

        match version {
            FormatVersion::V1 => self.ingest_v1(payload).await,
            FormatVersion::V2 => self.ingest_v2(payload).await,
            FormatVersion::V3 => self.ingest_v3(payload).await,
        }
    }

    async fn ingest_v1(&self, payload: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(payload);
        let ticks = v1::decode_upload(&text)?;
        let count = ticks.len();

        for mut tick in ticks {
            codec::apply_conversion(&mut tick, FormatVersion::V1, None);
            self.save(tick).await?;
        }

        debug!(count, "v1 upload saved");
        Ok(())
    }

    async fn ingest_v2(&self, payload: &[u8]) -> Result<()> {
        let messages = extract_messages(payload);
        let (ticks, trailer) = v2::decode_batch(&messages, Utc::now())?;
        let count = ticks.len();

        // The trailer only stamps the batch; it is not persisted.
        for mut tick in ticks {
            codec::apply_conversion(&mut tick, FormatVersion::V2, None);
            self.save(tick).await?;
        }

        debug!(count, coordinator_id = %trailer.coordinator_id, "v2 upload saved");
        Ok(())
    }

    async fn ingest_v3(&self, payload: &[u8]) -> Result<()> {
        let now = Utc::now();
        let (ticks, reading) = v3::decode(payload, now)?;

        self.store
            .append_coordinator_reading(now.timestamp(), &reading)
            .await?;

        let count = ticks.len();
        for mut tick in ticks {
            let calibration = self
                .store
                .sensor_fields(&tick.sensor_id)
                .await?
                .calibration_constant;
            codec::apply_conversion(&mut tick, FormatVersion::V3, calibration);
            self.save(tick).await?;
        }

        debug!(count, coordinator_id = %reading.coordinator_id, "v3 upload saved");
        Ok(())
    }

    /// Persist one tick and run the registry side effects: resolve the
    /// owning coordinator (falling back to the configured default),
    /// refresh that coordinator's token and record the membership.
    pub async fn save(&self, mut tick: Tick) -> Result<()> {
        if tick.sensor_id.is_empty() {
            return Err(AppError::MissingSensorId);
        }

        debug!(
            sensor_id = %tick.sensor_id,
            score = tick.score(),
            version = tick.version,
            "saving tick"
        );

        self.store
            .append_tick(&tick.sensor_id, tick.score(), &tick)
            .await?;

        if tick.coordinator_id.is_none() {
            tick.coordinator_id = self.store.coordinator_for_sensor(&tick.sensor_id).await?;
        }
        let coordinator_id = match tick.coordinator_id {
            Some(ref id) if !id.is_empty() => id.clone(),
            _ => {
                debug!(
                    sensor_id = %tick.sensor_id,
                    default = %self.default_coordinator_id,
                    "no coordinator mapping, using default"
                );
                self.default_coordinator_id.clone()
            }
        };

        let token = codec::coordinator_token(&coordinator_id);
        self.store
            .register_coordinator(&coordinator_id, &token)
            .await?;
        self.store
            .associate_sensor(&tick.sensor_id, &coordinator_id)
            .await?;

        Ok(())
    }
}
