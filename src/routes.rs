use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    get_coordinator, get_coordinator_sensors, get_logs, get_sensor_dots, get_sensor_ticks, health,
    put_coordinator, put_sensor,
};
use crate::query::QueryService;

/// Route paths keep the original `controllers` wording for the benefit of
/// deployed devices; everywhere else they are coordinators.
pub fn create_router(service: QueryService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/controllers/:controller_id/sensors",
            get(get_coordinator_sensors),
        )
        .route(
            "/api/controllers/:controller_id",
            post(put_coordinator).put(put_coordinator),
        )
        .route(
            "/api/controllers/:controller_id/:hash",
            get(get_coordinator),
        )
        .route("/api/sensors/:sensor_id", post(put_sensor).put(put_sensor))
        .route("/api/sensors/:sensor_id/ticks", get(get_sensor_ticks))
        .route("/api/sensors/:sensor_id/dots", get(get_sensor_dots))
        .route("/api/log", get(get_logs))
        .route("/api/logs", get(get_logs))
        .with_state(service)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
