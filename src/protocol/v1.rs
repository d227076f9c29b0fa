//! First-generation line format.
//!
//! One reading per physical line:
//! `<YYYY-M-D H:M:S;sensor_id;next_data_session;battery;raw_temp;humidity;radio_quality>`
//! with month, day, hour, minute and second allowed to be one or two
//! digits. The timestamp is the device's own clock, taken as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::{parse_f64, parse_i64};
use crate::error::{AppError, Result};
use crate::models::{FormatVersion, Tick};

const FIELD_COUNT: usize = 7;

/// Decode a whole v1 upload: one message per line, blank segments
/// skipped. The first bad line fails the upload.
pub fn decode_upload(input: &str) -> Result<Vec<Tick>> {
    let mut ticks = Vec::new();
    for line in input.split(['\n', '\r']) {
        if line.trim().is_empty() {
            continue;
        }
        ticks.push(decode_line(line)?);
    }
    Ok(ticks)
}

/// Decode a single line, with or without its surrounding `<`/`>` pair.
pub fn decode_line(line: &str) -> Result<Tick> {
    let body = line
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>');

    let parts: Vec<&str> = body.split(';').collect();
    if parts.len() != FIELD_COUNT {
        return Err(AppError::Malformed(format!(
            "{} fields expected, got {}",
            FIELD_COUNT,
            parts.len()
        )));
    }

    let datetime = parse_datetime(parts[0])?;

    let sensor_id = parts[1].trim();
    if sensor_id.is_empty() {
        return Err(AppError::Malformed("missing sensor id".into()));
    }

    Ok(Tick {
        sensor_id: sensor_id.to_string(),
        datetime,
        next_data_session: Some(parts[2].trim().to_string()),
        battery_voltage: parse_f64(parts[3], "battery_voltage")?,
        raw_temperature: parse_f64(parts[4], "raw_temperature")?,
        humidity: parse_i64(parts[5], "humidity")?,
        radio_quality: parse_i64(parts[6], "radio_quality")?,
        send_counter: 0,
        temperature: 0.0,
        version: FormatVersion::V1.as_i64(),
        coordinator_id: None,
    })
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|e| AppError::Malformed(format!("invalid datetime {:?}: {}", value, e)))?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}
