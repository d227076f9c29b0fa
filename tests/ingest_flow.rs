// End-to-end flows over the in-memory store: raw upload buffers through the
// ingestion pipeline, then read back through the query service exactly as the
// HTTP handlers would.

use std::sync::Arc;

use chrono::Utc;

use sensor_uplink_api::codec;
use sensor_uplink_api::error::AppError;
use sensor_uplink_api::ingest::Ingestor;
use sensor_uplink_api::models::{FormatVersion, SensorFields};
use sensor_uplink_api::query::QueryService;
use sensor_uplink_api::store::MemStore;

const DAY_START: i64 = 1365292800; // 2013-04-07 00:00:00 UTC
const DAY_END: i64 = DAY_START + 86400;

fn setup() -> (Ingestor, QueryService) {
    let store = Arc::new(MemStore::new());
    (
        Ingestor::new(store.clone(), "1"),
        QueryService::new(store),
    )
}

#[tokio::test]
async fn test_v2_upload_round_trip() {
    let (ingestor, service) = setup();

    ingestor
        .handle_upload(FormatVersion::V2, b"<13;347;886;199;51>(132207)<13;22;196>")
        .await
        .unwrap();

    let now = Utc::now().timestamp();
    let ticks = service.ticks("13", now - 60, now + 60).await.unwrap();
    assert_eq!(ticks.len(), 1);
    let tick = &ticks[0];
    assert_eq!(tick.sensor_id, "13");
    assert_eq!(tick.version, 2);
    assert_eq!(tick.temperature, codec::temperature_v2(347.0));
    assert_eq!(tick.battery_voltage, codec::battery_volts(886.0));
    assert_eq!(tick.humidity, 199);
    assert_eq!(tick.send_counter, 51);

    // The trailer routed the sensor to coordinator 13, whose derived token
    // now authenticates it.
    let token = codec::coordinator_token("13");
    let coordinator = service.coordinator_by_token("13", &token).await.unwrap();
    assert_eq!(coordinator.id, "13");
    assert_eq!(coordinator.label, "13");
}

#[tokio::test]
async fn test_v1_upload_feeds_ticks_and_dots() {
    let (ingestor, service) = setup();

    let upload = "<2013-04-07 01:00:00;55;3600;3000;5056;40;90>\n\
                  <2013-04-07 02:00:00;55;3600;3000;2528;44;90>";
    ingestor
        .handle_upload(FormatVersion::V1, upload.as_bytes())
        .await
        .unwrap();

    let ticks = service.ticks("55", DAY_START, DAY_END).await.unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[0].temperature, 19.5);
    assert_eq!(ticks[1].temperature, 9.5);
    // v1 batteries stay in native millivolts
    assert_eq!(ticks[0].battery_voltage, 3000.0);

    // One dot per day averages the whole range into a single bucket.
    let dots = service.dots("55", DAY_START, DAY_END, 1).await.unwrap();
    assert_eq!(dots.len(), 1);
    assert_eq!(dots[0].datetime.timestamp(), DAY_START);
    assert_eq!(dots[0].temperature, 14.5);
    assert_eq!(dots[0].humidity, 42);
    assert_eq!(dots[0].battery_voltage, 3000.0);
    assert_eq!(dots[0].radio_quality, 90);

    // Hourly buckets: readings land in their own hours, empty hours are
    // zero-filled at the bucket start.
    let dots = service.dots("55", DAY_START, DAY_END, 24).await.unwrap();
    assert_eq!(dots.len(), 24);
    assert_eq!(dots[0].temperature, 0.0);
    assert_eq!(dots[1].temperature, 19.5);
    assert_eq!(dots[2].temperature, 9.5);
    assert_eq!(dots[3].datetime.timestamp(), DAY_START + 3 * 3600);
}

#[tokio::test]
async fn test_v1_upload_registers_default_coordinator() {
    let (ingestor, service) = setup();

    ingestor
        .handle_upload(
            FormatVersion::V1,
            b"<2013-04-07 01:00:00;55;3600;3000;5056;40;90>",
        )
        .await
        .unwrap();

    // Nothing in the v1 format names a coordinator, so the sensor lands
    // under the configured default.
    let sensors = service.coordinator_sensors("1").await.unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].id, "55");
    assert_eq!(sensors[0].coordinator_id, "1");
    assert_eq!(
        sensors[0].last_tick.map(|dt| dt.timestamp()),
        Some(DAY_START + 3600)
    );

    let token = codec::coordinator_token("1");
    assert!(service.coordinator_by_token("1", &token).await.is_ok());
}

#[tokio::test]
async fn test_v3_upload_applies_calibration_and_saves_coordinator_reading() {
    let (ingestor, service) = setup();

    // Calibration set through the admin API before the device uploads.
    service
        .update_sensor(
            "13A20040B421AC",
            &SensorFields {
                lat: None,
                lng: None,
                calibration_constant: Some(2.0),
            },
        )
        .await
        .unwrap();

    let payload = br#"{"coordinator": {
        "coordinator_id": 20, "gsm_coverage": 26, "battery_voltage": 166,
        "sensor_readings": [
            {"sensor_id": "13A20040B421AC", "battery_voltage": 797,
             "cpu_temperature": 338, "sensor_temperature": 621,
             "moisture": 92, "sendcounter": 18}
        ]}}"#;
    ingestor
        .handle_upload(FormatVersion::V3, payload)
        .await
        .unwrap();

    let now = Utc::now().timestamp();
    let ticks = service
        .ticks("13A20040B421AC", now - 60, now + 60)
        .await
        .unwrap();
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].version, 3);
    assert_eq!(ticks[0].temperature, codec::temperature_v3(621.0, Some(2.0)));

    let sensors = service.coordinator_sensors("20").await.unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].id, "13A20040B421AC");
    assert!(sensors[0].last_tick.is_some());
}

#[tokio::test]
async fn test_sensor_updates_merge_across_saves() {
    let (ingestor, service) = setup();

    service
        .update_sensor(
            "13A20040B421AC",
            &SensorFields {
                lat: Some("59.33".to_string()),
                lng: Some("18.06".to_string()),
                calibration_constant: None,
            },
        )
        .await
        .unwrap();
    service
        .update_sensor(
            "13A20040B421AC",
            &SensorFields {
                lat: None,
                lng: None,
                calibration_constant: Some(1.5),
            },
        )
        .await
        .unwrap();

    let payload = br#"{"coordinator": {
        "coordinator_id": 20, "gsm_coverage": 26, "battery_voltage": 166,
        "sensor_readings": [
            {"sensor_id": "13A20040B421AC", "battery_voltage": 797,
             "cpu_temperature": 338, "sensor_temperature": 621,
             "moisture": 92, "sendcounter": 18}
        ]}}"#;
    ingestor
        .handle_upload(FormatVersion::V3, payload)
        .await
        .unwrap();

    // Position from the first update survived the calibration-only second
    // update, and the calibration reached the conversion.
    let sensors = service.coordinator_sensors("20").await.unwrap();
    assert_eq!(sensors[0].lat.as_deref(), Some("59.33"));
    assert_eq!(sensors[0].lng.as_deref(), Some("18.06"));

    let now = Utc::now().timestamp();
    let ticks = service
        .ticks("13A20040B421AC", now - 60, now + 60)
        .await
        .unwrap();
    assert_eq!(ticks[0].temperature, codec::temperature_v3(621.0, Some(1.5)));
}

#[tokio::test]
async fn test_upload_log_keeps_raw_payload() {
    let (ingestor, service) = setup();

    let payload = b"<13;347;886;199;51>(132207)<13;22;196>";
    ingestor
        .handle_upload(FormatVersion::V2, payload)
        .await
        .unwrap();

    let logs = service.recent_logs("v2", 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].ends_with("<13;347;886;199;51>(132207)<13;22;196>"));

    // Other streams stay empty.
    assert!(service.recent_logs("v1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dots_per_day_out_of_range_is_rejected() {
    let (_, service) = setup();

    let err = service.dots("55", DAY_START, DAY_END, 25).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}
