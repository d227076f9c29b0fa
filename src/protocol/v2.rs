//! Second-generation batch format.
//!
//! One upload carries any number of framed sensor readings followed by
//! exactly one framed coordinator summary. Readings have no timestamp
//! of their own; every tick in the batch is stamped with the ingestion
//! time and with the trailer's coordinator id.

use chrono::{DateTime, Utc};

use super::{parse_f64, parse_i64};
use crate::error::{AppError, Result};
use crate::models::{CoordinatorReading, FormatVersion, Tick};

const READING_FIELDS: usize = 5;
const TRAILER_FIELDS: usize = 3;

/// Decode a framed batch. Empty message bodies are skipped; the first
/// malformed message fails the whole batch.
pub fn decode_batch(
    messages: &[String],
    now: DateTime<Utc>,
) -> Result<(Vec<Tick>, CoordinatorReading)> {
    if messages.len() < 2 {
        return Err(AppError::Malformed(
            "at least 1 sensor reading and 1 coordinator reading expected".into(),
        ));
    }

    let trailer = decode_trailer(&messages[messages.len() - 1], now)?;

    let mut ticks = Vec::new();
    for body in &messages[..messages.len() - 1] {
        if body.is_empty() {
            continue;
        }
        let mut tick = decode_reading(body, now)?;
        tick.coordinator_id = Some(trailer.coordinator_id.clone());
        ticks.push(tick);
    }

    Ok((ticks, trailer))
}

/// `sensor_id;raw_temperature;raw_battery;humidity;send_counter`
pub fn decode_reading(body: &str, now: DateTime<Utc>) -> Result<Tick> {
    let parts: Vec<&str> = body.split(';').collect();
    if parts.len() != READING_FIELDS {
        return Err(AppError::Malformed(format!(
            "{} fields expected, got {}",
            READING_FIELDS,
            parts.len()
        )));
    }

    let sensor_id = parts[0].trim();
    if sensor_id.is_empty() {
        return Err(AppError::Malformed("missing sensor id".into()));
    }

    Ok(Tick {
        sensor_id: sensor_id.to_string(),
        datetime: now,
        next_data_session: None,
        battery_voltage: parse_f64(parts[2], "raw_battery")?,
        raw_temperature: parse_f64(parts[1], "raw_temperature")?,
        humidity: parse_i64(parts[3], "humidity")?,
        radio_quality: 0,
        send_counter: parse_i64(parts[4], "send_counter")?,
        temperature: 0.0,
        version: FormatVersion::V2.as_i64(),
        coordinator_id: None,
    })
}

/// `coordinator_id;gsm_coverage;raw_battery`
pub fn decode_trailer(body: &str, now: DateTime<Utc>) -> Result<CoordinatorReading> {
    let parts: Vec<&str> = body.split(';').collect();
    if parts.len() != TRAILER_FIELDS {
        return Err(AppError::Malformed(format!(
            "{} fields expected, got {}",
            TRAILER_FIELDS,
            parts.len()
        )));
    }

    let coordinator_id = parts[0].trim();
    if coordinator_id.is_empty() {
        return Err(AppError::Malformed("missing coordinator id".into()));
    }

    Ok(CoordinatorReading {
        coordinator_id: coordinator_id.to_string(),
        datetime: now,
        gsm_coverage: parse_i64(parts[1], "gsm_coverage")?,
        battery_voltage: parse_f64(parts[2], "raw_battery")?,
    })
}
