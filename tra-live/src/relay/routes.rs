//! HTTP route handlers.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Local, NaiveDate};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::tdx::{Resource, TRA_PREFIX, TdxError, TrainDate, Upstream};

use super::state::RelayState;

/// Create the relay router.
pub fn create_router<U: Upstream + 'static>(state: RelayState<U>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(&format!("{TRA_PREFIX}/Station"), get(station_map::<U>))
        .route(
            &format!("{TRA_PREFIX}/DailyStationTimetable/Today"),
            get(station_timetable_today::<U>),
        )
        .route(
            &format!("{TRA_PREFIX}/DailyStationTimetable/TrainDate/:date"),
            get(station_timetable_on::<U>),
        )
        .route(
            &format!("{TRA_PREFIX}/DailyTrainTimetable/Today"),
            get(train_timetable_today::<U>),
        )
        .route(
            &format!("{TRA_PREFIX}/DailyTrainTimetable/TrainDate/:date"),
            get(train_timetable_on::<U>),
        )
        .route(&format!("{TRA_PREFIX}/TrainLiveBoard"), get(live_board::<U>))
        .route(&format!("{TRA_PREFIX}/TrainType"), get(train_types::<U>))
        .fallback(redirect_any::<U>)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

type Params = Query<HashMap<String, String>>;

async fn station_map<U: Upstream + 'static>(
    State(state): State<RelayState<U>>,
    uri: Uri,
    Query(params): Params,
) -> Result<Response, AppError> {
    relay(&state, Resource::StationMap, &uri, &params).await
}

async fn station_timetable_today<U: Upstream + 'static>(
    State(state): State<RelayState<U>>,
    uri: Uri,
    Query(params): Params,
) -> Result<Response, AppError> {
    let resource = Resource::StationTimetable(TrainDate::Today);
    relay(&state, resource, &uri, &params).await
}

async fn station_timetable_on<U: Upstream + 'static>(
    State(state): State<RelayState<U>>,
    Path(date): Path<String>,
    uri: Uri,
    Query(params): Params,
) -> Result<Response, AppError> {
    match parse_date(&date) {
        Some(date) => {
            let resource = Resource::StationTimetable(TrainDate::On(date));
            relay(&state, resource, &uri, &params).await
        }
        None => Ok(redirect(&state, &uri)),
    }
}

async fn train_timetable_today<U: Upstream + 'static>(
    State(state): State<RelayState<U>>,
    uri: Uri,
    Query(params): Params,
) -> Result<Response, AppError> {
    let resource = Resource::TrainTimetable(TrainDate::Today);
    relay(&state, resource, &uri, &params).await
}

async fn train_timetable_on<U: Upstream + 'static>(
    State(state): State<RelayState<U>>,
    Path(date): Path<String>,
    uri: Uri,
    Query(params): Params,
) -> Result<Response, AppError> {
    match parse_date(&date) {
        Some(date) => {
            let resource = Resource::TrainTimetable(TrainDate::On(date));
            relay(&state, resource, &uri, &params).await
        }
        None => Ok(redirect(&state, &uri)),
    }
}

async fn live_board<U: Upstream + 'static>(
    State(state): State<RelayState<U>>,
    uri: Uri,
    Query(params): Params,
) -> Result<Response, AppError> {
    relay(&state, Resource::LiveBoard, &uri, &params).await
}

async fn train_types<U: Upstream + 'static>(
    State(state): State<RelayState<U>>,
    uri: Uri,
    Query(params): Params,
) -> Result<Response, AppError> {
    relay(&state, Resource::TrainTypes, &uri, &params).await
}

/// Anything the relay does not serve itself goes to the origin.
async fn redirect_any<U: Upstream + 'static>(
    State(state): State<RelayState<U>>,
    uri: Uri,
) -> Response {
    redirect(&state, &uri)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Serve `resource` from the cache if the request is the canonical one and
/// the resource is cacheable today, otherwise redirect.
async fn relay<U: Upstream>(
    state: &RelayState<U>,
    resource: Resource,
    uri: &Uri,
    params: &HashMap<String, String>,
) -> Result<Response, AppError> {
    let today = Local::now().date_naive();
    let cacheable = state.cache.cache().policy(&resource, today).is_some();
    if !cacheable || !resource.matches_query(params) {
        return Ok(redirect(state, uri));
    }

    let entry = state.cache.get(&resource).await?;
    info!(%resource, fetched_at = %entry.fetched_at(), "serving from cache");
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        entry.body().clone(),
    )
        .into_response())
}

/// 302 to the same path and query on the origin.
fn redirect<U>(state: &RelayState<U>, uri: &Uri) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let target = format!("{}{}", state.origin, path);
    info!(%target, "redirecting to origin");
    (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}

/// Relay error type.
#[derive(Debug)]
pub enum AppError {
    /// The origin could not be reached or answered with an error
    Upstream { status: StatusCode, message: String },
}

impl From<TdxError> for AppError {
    fn from(e: TdxError) -> Self {
        let status = match e {
            TdxError::RateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        AppError::Upstream {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError::Upstream { status, message } = self;
        warn!(%status, %message, "relay request failed");
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
