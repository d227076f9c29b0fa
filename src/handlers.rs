use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{Coordinator, Sensor, SensorFields, Tick};
use crate::query::QueryService;
use crate::store::LOG_CAPACITY;

#[derive(Deserialize)]
pub struct RangeParams {
    start: i64,
    end: i64,
}

#[derive(Deserialize)]
pub struct DotsParams {
    start: i64,
    end: i64,
    dots_per_day: i64,
}

#[derive(Deserialize)]
pub struct LogParams {
    stream: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct CoordinatorUpdate {
    #[serde(default)]
    label: String,
}

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

pub async fn get_coordinator_sensors(
    State(service): State<QueryService>,
    Path(coordinator_id): Path<String>,
) -> Result<Json<Vec<Sensor>>> {
    let sensors = service.coordinator_sensors(&coordinator_id).await?;
    Ok(Json(sensors))
}

pub async fn get_coordinator(
    State(service): State<QueryService>,
    Path((coordinator_id, token)): Path<(String, String)>,
) -> Result<Json<Coordinator>> {
    let coordinator = service.coordinator_by_token(&coordinator_id, &token).await?;
    Ok(Json(coordinator))
}

pub async fn put_coordinator(
    State(service): State<QueryService>,
    Path(coordinator_id): Path<String>,
    Json(update): Json<CoordinatorUpdate>,
) -> Result<StatusCode> {
    service
        .set_coordinator_label(&coordinator_id, &update.label)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn put_sensor(
    State(service): State<QueryService>,
    Path(sensor_id): Path<String>,
    Json(fields): Json<SensorFields>,
) -> Result<StatusCode> {
    service.update_sensor(&sensor_id, &fields).await?;
    Ok(StatusCode::OK)
}

pub async fn get_sensor_ticks(
    State(service): State<QueryService>,
    Path(sensor_id): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<Tick>>> {
    let ticks = service.ticks(&sensor_id, params.start, params.end).await?;
    Ok(Json(ticks))
}

pub async fn get_sensor_dots(
    State(service): State<QueryService>,
    Path(sensor_id): Path<String>,
    Query(params): Query<DotsParams>,
) -> Result<Json<Vec<Tick>>> {
    let dots = service
        .dots(&sensor_id, params.start, params.end, params.dots_per_day)
        .await?;
    Ok(Json(dots))
}

/// Raw upload log as plain text, newest entry first.
pub async fn get_logs(
    State(service): State<QueryService>,
    Query(params): Query<LogParams>,
) -> Result<String> {
    let stream = params.stream.unwrap_or_else(|| "v1".to_string());
    let limit = params.limit.unwrap_or(LOG_CAPACITY);
    let entries = service.recent_logs(&stream, limit).await?;

    let mut body = String::new();
    for entry in &entries {
        body.push_str(entry);
        body.push_str("\n\r");
    }
    Ok(body)
}
