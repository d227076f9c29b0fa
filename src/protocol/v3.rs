//! Third-generation JSON format.
//!
//! The coordinator posts a single JSON object holding its own health
//! block plus an array of relayed sensor readings. Missing fields
//! default to zero values rather than failing the upload; devices in
//! the field omit anything they have no value for.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{CoordinatorReading, FormatVersion, Tick};

#[derive(Debug, Default, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub coordinator: CoordinatorBlock,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoordinatorBlock {
    #[serde(default)]
    pub coordinator_id: i64,
    #[serde(default)]
    pub gsm_coverage: i64,
    #[serde(default)]
    pub battery_voltage: i64,
    #[serde(default)]
    pub uptime: i64,
    #[serde(default)]
    pub first_overflow: i64,
    #[serde(default)]
    pub tries: i64,
    #[serde(default)]
    pub successes: i64,
    #[serde(default)]
    pub sensor_readings: Vec<SensorReading>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub sensor_id: String,
    #[serde(default)]
    pub battery_voltage: i64,
    #[serde(default)]
    pub cpu_temperature: i64,
    #[serde(default)]
    pub sensor_temperature: i64,
    #[serde(default)]
    pub moisture: i64,
    #[serde(default)]
    pub sendcounter: i64,
}

/// Decode a v3 upload into per-sensor ticks plus the coordinator's own
/// reading. `cpu_temperature` has no canonical counterpart and is
/// dropped. The coordinator battery stays in its raw unit here.
pub fn decode(buf: &[u8], now: DateTime<Utc>) -> Result<(Vec<Tick>, CoordinatorReading)> {
    let payload: Payload = serde_json::from_slice(buf)?;
    let c = payload.coordinator;
    let coordinator_id = c.coordinator_id.to_string();

    let reading = CoordinatorReading {
        coordinator_id: coordinator_id.clone(),
        datetime: now,
        gsm_coverage: c.gsm_coverage,
        battery_voltage: c.battery_voltage as f64,
    };

    let ticks = c
        .sensor_readings
        .into_iter()
        .map(|r| Tick {
            sensor_id: r.sensor_id,
            datetime: now,
            next_data_session: None,
            battery_voltage: r.battery_voltage as f64,
            raw_temperature: r.sensor_temperature as f64,
            humidity: r.moisture,
            radio_quality: 0,
            send_counter: r.sendcounter,
            temperature: 0.0,
            version: FormatVersion::V3.as_i64(),
            coordinator_id: Some(coordinator_id.clone()),
        })
        .collect();

    Ok((ticks, reading))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EXAMPLE: &str = r#"{
        "coordinator": {
            "coordinator_id": 20,
            "gsm_coverage": 26,
            "battery_voltage": 166,
            "uptime": 1890037,
            "first_overflow": 0,
            "tries": 2,
            "successes": 2,
            "sensor_readings": [
                {
                    "sensor_id": "13A20040B421AC",
                    "battery_voltage": 797,
                    "cpu_temperature": 338,
                    "sensor_temperature": 621,
                    "moisture": 92,
                    "sendcounter": 18
                },
                {
                    "sensor_id": "13A20040B421AD",
                    "battery_voltage": 801,
                    "cpu_temperature": 340,
                    "sensor_temperature": 633,
                    "moisture": 88,
                    "sendcounter": 4
                }
            ]
        }
    }"#;

    #[test]
    fn decodes_payload_block() {
        let payload: Payload = serde_json::from_str(EXAMPLE).unwrap();
        let c = &payload.coordinator;
        assert_eq!(c.coordinator_id, 20);
        assert_eq!(c.gsm_coverage, 26);
        assert_eq!(c.battery_voltage, 166);
        assert_eq!(c.uptime, 1890037);
        assert_eq!(c.first_overflow, 0);
        assert_eq!(c.tries, 2);
        assert_eq!(c.successes, 2);
        assert_eq!(c.sensor_readings.len(), 2);

        let r = &c.sensor_readings[0];
        assert_eq!(r.sensor_id, "13A20040B421AC");
        assert_eq!(r.battery_voltage, 797);
        assert_eq!(r.cpu_temperature, 338);
        assert_eq!(r.sensor_temperature, 621);
        assert_eq!(r.moisture, 92);
        assert_eq!(r.sendcounter, 18);
    }

    #[test]
    fn builds_ticks_and_coordinator_reading() {
        let now = Utc::now();
        let (ticks, reading) = decode(EXAMPLE.as_bytes(), now).unwrap();

        assert_eq!(reading.coordinator_id, "20");
        assert_eq!(reading.gsm_coverage, 26);
        assert_eq!(reading.battery_voltage, 166.0);
        assert_eq!(reading.datetime, now);

        assert_eq!(ticks.len(), 2);
        let tick = &ticks[0];
        assert_eq!(tick.sensor_id, "13A20040B421AC");
        assert_eq!(tick.raw_temperature, 621.0);
        assert_eq!(tick.battery_voltage, 797.0);
        assert_eq!(tick.humidity, 92);
        assert_eq!(tick.send_counter, 18);
        assert_eq!(tick.version, 3);
        assert_eq!(tick.coordinator_id.as_deref(), Some("20"));
        assert_eq!(tick.datetime, now);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let (ticks, reading) = decode(
            br#"{"coordinator": {"coordinator_id": 7, "sensor_readings": [{"sensor_id": "A1"}]}}"#,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(reading.coordinator_id, "7");
        assert_eq!(reading.gsm_coverage, 0);
        assert_eq!(ticks[0].sensor_id, "A1");
        assert_eq!(ticks[0].raw_temperature, 0.0);
        assert_eq!(ticks[0].humidity, 0);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(decode(b"not json", Utc::now()).is_err());
        assert!(decode(b"", Utc::now()).is_err());
    }
}
