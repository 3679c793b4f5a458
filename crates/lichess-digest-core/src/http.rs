use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    delivery::DeliveryReport,
    digest::{DigestService, ScheduleController, UserReport},
    types::{DailySummary, ScheduleConfig, TrackedUser},
};

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub digest: Arc<DigestService>,
    pub schedule: Arc<ScheduleController>,
}

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub handle: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub time: String,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct DailyStatsResponse {
    summaries: Vec<DailySummary>,
    /// The Markdown digest exactly as it would be sent; absent with no data.
    report: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScheduleResponse {
    time: String,
    timezone: String,
    armed: bool,
}

#[derive(Debug, Serialize)]
struct DigestRunResponse {
    sent: bool,
    delivery: Option<DeliveryReport>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/users", get(api_list_users).post(api_add_user))
        .route("/api/users/{handle}", delete(api_remove_user))
        .route("/api/stats/daily", get(api_daily_stats))
        .route("/api/stats/daily/{handle}", get(api_daily_stats_for))
        .route("/api/stats/full/{handle}", get(api_full_stats))
        .route("/api/schedule", get(api_get_schedule).put(api_set_schedule))
        .route("/api/digest/run", post(api_run_digest))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    "Lichess digest API"
}

async fn health() -> &'static str {
    "ok"
}

async fn api_list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<TrackedUser>>, ApiError> {
    let users = state
        .digest
        .roster()
        .list_users()
        .await
        .map_err(internal_error)?;
    Ok(Json(users))
}

async fn api_add_user(
    State(state): State<AppState>,
    Json(request): Json<AddUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = TrackedUser::new(request.handle.trim(), request.display_name.trim());
    if user.handle.is_empty() || user.display_name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "handle and display_name are required".to_owned(),
        ));
    }

    if state
        .digest
        .aggregator()
        .fetch_profile(&user.handle)
        .await
        .is_none()
    {
        return Err((
            StatusCode::NOT_FOUND,
            format!("player {} was not found on Lichess", user.handle),
        ));
    }

    let added = state
        .digest
        .roster()
        .add_user(user.clone())
        .await
        .map_err(internal_error)?;
    if !added {
        return Err((
            StatusCode::CONFLICT,
            format!("{} is already tracked", user.handle),
        ));
    }

    info!(handle = %user.handle, "tracked user added via API");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn api_remove_user(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state
        .digest
        .roster()
        .remove_user(&handle)
        .await
        .map_err(internal_error)?;
    Ok(Json(DeletedResponse { deleted }))
}

async fn api_daily_stats(
    State(state): State<AppState>,
) -> Result<Json<DailyStatsResponse>, ApiError> {
    let summaries = state
        .digest
        .daily_summaries()
        .await
        .map_err(internal_error)?;
    let report =
        (!summaries.is_empty()).then(|| state.digest.formatter().format_summaries(&summaries));
    Ok(Json(DailyStatsResponse { summaries, report }))
}

async fn api_daily_stats_for(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<DailySummary>, ApiError> {
    let user = state
        .digest
        .roster()
        .find_user(&handle)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_tracked(&handle))?;

    state
        .digest
        .aggregator()
        .daily_summary(&user)
        .await
        .map(Json)
        .ok_or_else(|| unavailable(&handle))
}

async fn api_full_stats(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .digest
        .full_profile_report(&handle)
        .await
        .map_err(internal_error)?;

    match report {
        UserReport::Ready(text) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )),
        UserReport::UnknownUser => Err(not_tracked(&handle)),
        UserReport::Unavailable => Err(unavailable(&handle)),
    }
}

async fn api_get_schedule(
    State(state): State<AppState>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let config = state
        .schedule
        .current_config()
        .await
        .map_err(internal_error)?;
    let armed = state.schedule.active_config().await.as_ref() == Some(&config);
    Ok(Json(schedule_response(&config, armed)))
}

async fn api_set_schedule(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let config = state
        .schedule
        .set_time(&request.time)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("invalid time {:?}, expected HH:MM", request.time),
            )
        })?;
    Ok(Json(schedule_response(&config, true)))
}

async fn api_run_digest(
    State(state): State<AppState>,
) -> Result<Json<DigestRunResponse>, ApiError> {
    info!("digest run requested via API");
    let delivery = state
        .digest
        .run_scheduled()
        .await
        .map_err(internal_error)?;
    Ok(Json(DigestRunResponse {
        sent: delivery.is_some(),
        delivery,
    }))
}

fn schedule_response(config: &ScheduleConfig, armed: bool) -> ScheduleResponse {
    ScheduleResponse {
        time: config.time_label(),
        timezone: config.timezone.name().to_owned(),
        armed,
    }
}

fn not_tracked(handle: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{handle} is not tracked"))
}

fn unavailable(handle: &str) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        format!("stats for {handle} are unavailable"),
    )
}

fn internal_error(error: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("internal error: {error}"),
    )
}
