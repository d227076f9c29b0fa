use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Wire generation that produced a reading. The listening port decides
/// the variant; the codec dispatches its conversion formula on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V1,
    V2,
    V3,
}

impl FormatVersion {
    pub fn as_i64(self) -> i64 {
        match self {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
            FormatVersion::V3 => 3,
        }
    }

    pub fn log_stream(self) -> &'static str {
        match self {
            FormatVersion::V1 => "v1",
            FormatVersion::V2 => "v2",
            FormatVersion::V3 => "v3",
        }
    }
}

/// One measurement event from a sensor.
///
/// `battery_voltage` is in volts for v2/v3 readings; v1 units kept the
/// device's native millivolts and are converted only for display.
/// `version` is 0 on synthetic records (averaged buckets).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tick {
    pub sensor_id: String,
    pub datetime: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_data_session: Option<String>,
    pub battery_voltage: f64,
    pub raw_temperature: f64,
    pub temperature: f64,
    pub humidity: i64,
    pub radio_quality: i64,
    pub send_counter: i64,
    pub version: i64,
    /// Routing key resolved at save time, never part of the stored payload.
    #[serde(skip)]
    #[sqlx(default)]
    pub coordinator_id: Option<String>,
}

impl Tick {
    /// Zero-valued record used for averaged buckets with no samples.
    pub fn zero_at(datetime: DateTime<Utc>) -> Self {
        Self {
            sensor_id: String::new(),
            datetime,
            next_data_session: None,
            battery_voltage: 0.0,
            raw_temperature: 0.0,
            temperature: 0.0,
            humidity: 0,
            radio_quality: 0,
            send_counter: 0,
            version: 0,
            coordinator_id: None,
        }
    }

    /// Ordering score in the time series: seconds since epoch.
    pub fn score(&self) -> i64 {
        self.datetime.timestamp()
    }
}

/// Gateway health summary persisted from v3 uploads; the v2 trailer
/// produces one transiently for stamping but it is never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoordinatorReading {
    pub coordinator_id: String,
    pub datetime: DateTime<Utc>,
    pub gsm_coverage: i64,
    pub battery_voltage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinator {
    pub id: String,
    pub label: String,
    pub token: String,
}

/// Sensor summary as listed under a coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<DateTime<Utc>>,
    pub coordinator_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<String>,
}

/// Administrative per-sensor fields; absent values leave the stored
/// field untouched on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct SensorFields {
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub calibration_constant: Option<f64>,
}
