//! In-memory [`Store`] for tests and local development.
//!
//! Mirrors the Postgres semantics exactly: non-deduplicating appends
//! ordered by score, last-writer-wins sensor association, monotonic
//! coordinator sensor sets and capacity-trimmed rolling logs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Store, LOG_CAPACITY};
use crate::error::Result;
use crate::models::{CoordinatorReading, SensorFields, Tick};

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    ticks: HashMap<String, Vec<(i64, Tick)>>,
    coordinator_readings: HashMap<String, Vec<(i64, CoordinatorReading)>>,
    sensor_to_coordinator: HashMap<String, String>,
    coordinator_sensors: HashMap<String, BTreeSet<String>>,
    coordinator_tokens: HashMap<String, String>,
    coordinator_labels: HashMap<String, String>,
    sensor_fields: HashMap<String, SensorFields>,
    logs: HashMap<String, Vec<String>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn slice_by_index<T: Clone>(series: &[(i64, T)], start: i64, stop: i64) -> Vec<T> {
    if start < 0 || stop < start {
        return Vec::new();
    }
    series
        .iter()
        .rev()
        .skip(start as usize)
        .take((stop - start + 1) as usize)
        .map(|(_, record)| record.clone())
        .collect()
}

#[async_trait]
impl Store for MemStore {
    async fn append_tick(&self, sensor_id: &str, score: i64, tick: &Tick) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let series = inner.ticks.entry(sensor_id.to_string()).or_default();
        series.push((score, tick.clone()));
        series.sort_by_key(|(score, _)| *score);
        Ok(())
    }

    async fn ticks_by_index(&self, sensor_id: &str, start: i64, stop: i64) -> Result<Vec<Tick>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .ticks
            .get(sensor_id)
            .map(|series| slice_by_index(series, start, stop))
            .unwrap_or_default())
    }

    async fn ticks_by_score(&self, sensor_id: &str, start: i64, end: i64) -> Result<Vec<Tick>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .ticks
            .get(sensor_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|(score, _)| *score >= start && *score <= end)
                    .map(|(_, tick)| tick.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_coordinator_reading(
        &self,
        score: i64,
        reading: &CoordinatorReading,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let series = inner
            .coordinator_readings
            .entry(reading.coordinator_id.clone())
            .or_default();
        series.push((score, reading.clone()));
        series.sort_by_key(|(score, _)| *score);
        Ok(())
    }

    async fn coordinator_readings_by_index(
        &self,
        coordinator_id: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<CoordinatorReading>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .coordinator_readings
            .get(coordinator_id)
            .map(|series| slice_by_index(series, start, stop))
            .unwrap_or_default())
    }

    async fn coordinator_for_sensor(&self, sensor_id: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sensor_to_coordinator.get(sensor_id).cloned())
    }

    async fn associate_sensor(&self, sensor_id: &str, coordinator_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sensor_to_coordinator
            .insert(sensor_id.to_string(), coordinator_id.to_string());
        inner
            .coordinator_sensors
            .entry(coordinator_id.to_string())
            .or_default()
            .insert(sensor_id.to_string());
        Ok(())
    }

    async fn register_coordinator(&self, coordinator_id: &str, token: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .coordinator_tokens
            .insert(coordinator_id.to_string(), token.to_string());
        Ok(())
    }

    async fn coordinator_sensor_ids(&self, coordinator_id: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .coordinator_sensors
            .get(coordinator_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn coordinator_token(&self, coordinator_id: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.coordinator_tokens.get(coordinator_id).cloned())
    }

    async fn coordinator_label(&self, coordinator_id: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.coordinator_labels.get(coordinator_id).cloned())
    }

    async fn set_coordinator_label(&self, coordinator_id: &str, label: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .coordinator_labels
            .insert(coordinator_id.to_string(), label.to_string());
        Ok(())
    }

    async fn sensor_fields(&self, sensor_id: &str) -> Result<SensorFields> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sensor_fields.get(sensor_id).cloned().unwrap_or_default())
    }

    async fn update_sensor_fields(&self, sensor_id: &str, fields: &SensorFields) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.sensor_fields.entry(sensor_id.to_string()).or_default();
        if fields.lat.is_some() {
            entry.lat = fields.lat.clone();
        }
        if fields.lng.is_some() {
            entry.lng = fields.lng.clone();
        }
        if fields.calibration_constant.is_some() {
            entry.calibration_constant = fields.calibration_constant;
        }
        Ok(())
    }

    async fn push_ingest_log(&self, stream: &str, entry: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let log = inner.logs.entry(stream.to_string()).or_default();
        log.push(entry.to_string());
        while log.len() as i64 > LOG_CAPACITY {
            log.remove(0);
        }
        Ok(())
    }

    async fn recent_ingest_logs(&self, stream: &str, limit: i64) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .logs
            .get(stream)
            .map(|log| {
                log.iter()
                    .rev()
                    .take(limit.max(0) as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn tick(sensor_id: &str, offset_secs: i64) -> Tick {
        let mut t = Tick::zero_at(Utc::now() + Duration::seconds(offset_secs));
        t.sensor_id = sensor_id.to_string();
        t.temperature = offset_secs as f64;
        t
    }

    #[tokio::test]
    async fn appends_keep_duplicates_and_order_by_score() {
        let store = MemStore::new();
        let a = tick("9", 0);
        let b = tick("9", 10);

        store.append_tick("9", a.score(), &a).await.unwrap();
        store.append_tick("9", b.score(), &b).await.unwrap();
        store.append_tick("9", a.score(), &a).await.unwrap();

        let ascending = store.ticks_by_score("9", 0, i64::MAX).await.unwrap();
        assert_eq!(ascending.len(), 3);
        assert!(ascending[0].score() <= ascending[2].score());

        let newest = store.ticks_by_index("9", 0, 0).await.unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].temperature, 10.0);
    }

    #[tokio::test]
    async fn index_range_is_inclusive_and_clamped() {
        let store = MemStore::new();
        for offset in 0..5 {
            let t = tick("3", offset);
            store.append_tick("3", t.score(), &t).await.unwrap();
        }

        assert_eq!(store.ticks_by_index("3", 0, 2).await.unwrap().len(), 3);
        assert_eq!(store.ticks_by_index("3", 0, 99).await.unwrap().len(), 5);
        assert!(store.ticks_by_index("3", 2, 1).await.unwrap().is_empty());
        assert!(store.ticks_by_index("missing", 0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn association_is_last_writer_wins_but_sets_grow() {
        let store = MemStore::new();
        store.associate_sensor("5", "1").await.unwrap();
        store.associate_sensor("5", "2").await.unwrap();

        assert_eq!(
            store.coordinator_for_sensor("5").await.unwrap(),
            Some("2".to_string())
        );
        // the first coordinator keeps the sensor in its historical set
        assert_eq!(store.coordinator_sensor_ids("1").await.unwrap(), vec!["5"]);
        assert_eq!(store.coordinator_sensor_ids("2").await.unwrap(), vec!["5"]);
    }

    #[tokio::test]
    async fn sensor_field_updates_merge() {
        let store = MemStore::new();
        store
            .update_sensor_fields(
                "7",
                &SensorFields {
                    lat: Some("59.3".into()),
                    lng: None,
                    calibration_constant: None,
                },
            )
            .await
            .unwrap();
        store
            .update_sensor_fields(
                "7",
                &SensorFields {
                    lat: None,
                    lng: Some("18.1".into()),
                    calibration_constant: Some(0.5),
                },
            )
            .await
            .unwrap();

        let fields = store.sensor_fields("7").await.unwrap();
        assert_eq!(fields.lat.as_deref(), Some("59.3"));
        assert_eq!(fields.lng.as_deref(), Some("18.1"));
        assert_eq!(fields.calibration_constant, Some(0.5));
    }

    #[tokio::test]
    async fn logs_are_capped_and_newest_first() {
        let store = MemStore::new();
        for i in 0..(LOG_CAPACITY + 5) {
            store
                .push_ingest_log("v2", &format!("entry {}", i))
                .await
                .unwrap();
        }

        let recent = store.recent_ingest_logs("v2", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0], format!("entry {}", LOG_CAPACITY + 4));

        let all = store.recent_ingest_logs("v2", LOG_CAPACITY * 2).await.unwrap();
        assert_eq!(all.len(), LOG_CAPACITY as usize);
    }
}
