//! HTTP request handlers for the v1 API.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use chrono::Utc;
use claw_alertmanager::{
    AlertFilter, AlertMetrics, AlertView, Matcher, PostableAlert, Receiver, Silence,
    StatusSnapshot, create_silence, expire_silence, get_silence, insert_alerts, list_alerts,
    list_silences, parse_matchers,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{AlertQuery, DeleteReceiverRequest, Envelope, SilenceCreated, SilenceQuery};

type Reply<T> = ApiResult<Json<Envelope<T>>>;

/// Decodes a JSON request body, reporting failures as `bad_data`.
fn decode<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|err| {
        debug!(error = %err, "decoding request failed");
        ApiError::bad_data(err.to_string())
    })
}

/// Parses a boolean query parameter; absent or empty means `true`.
pub fn parse_bool_param(name: &str, value: Option<&str>) -> ApiResult<bool> {
    match value {
        None | Some("" | "true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(ApiError::bad_data(format!(
            "parameter \"{name}\" can either be 'true' or 'false', not \"{other}\""
        ))),
    }
}

fn parse_filter(filter: Option<&str>) -> ApiResult<Vec<Matcher>> {
    match filter {
        Some(expr) if !expr.is_empty() => Ok(parse_matchers(expr)?),
        _ => Ok(Vec::new()),
    }
}

/// Handle GET /status - configuration, version and cluster view.
pub async fn get_status(State(state): State<AppState>) -> Reply<StatusSnapshot> {
    let snapshot = state.reconfig().snapshot();
    let status = StatusSnapshot::capture(&snapshot.config, state.started_at(), state.peer())
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(Envelope::success(status)))
}

/// Handle GET /receivers - configured receiver names.
pub async fn list_receivers(State(state): State<AppState>) -> Reply<Vec<String>> {
    Ok(Json(Envelope::success(
        state.reconfig().snapshot().config.receiver_names(),
    )))
}

/// Handle POST /receivers - add a receiver.
pub async fn add_receiver(State(state): State<AppState>, body: Bytes) -> Reply<Receiver> {
    let receiver: Receiver = decode(&body)?;
    let added = state.reconfig().add_receiver(receiver).await?;
    Ok(Json(Envelope::success(added)))
}

/// Handle PUT /receivers/ - replace an existing receiver.
pub async fn edit_receiver(State(state): State<AppState>, body: Bytes) -> Reply<Receiver> {
    let receiver: Receiver = decode(&body)?;
    let edited = state.reconfig().edit_receiver(receiver).await?;
    Ok(Json(Envelope::success(edited)))
}

/// Handle DELETE /receivers/ - delete a receiver by name.
pub async fn delete_receiver(State(state): State<AppState>, body: Bytes) -> Reply<&'static str> {
    let request: DeleteReceiverRequest = decode(&body)?;
    state.reconfig().delete_receiver(request.name).await?;
    Ok(Json(Envelope::success("receiver deleted successfully")))
}

/// Handle GET /alerts - query alerts.
pub async fn get_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> Reply<Vec<AlertView>> {
    let mut filter = AlertFilter::default().with_matchers(parse_filter(query.filter.as_deref())?);
    filter.show_active = parse_bool_param("active", query.active.as_deref())?;
    filter.show_silenced = parse_bool_param("silenced", query.silenced.as_deref())?;
    filter.show_inhibited = parse_bool_param("inhibited", query.inhibited.as_deref())?;
    filter.show_unprocessed = parse_bool_param("unprocessed", query.unprocessed.as_deref())?;
    if let Some(pattern) = query.receiver.as_deref().filter(|p| !p.is_empty()) {
        filter = filter.with_receiver_pattern(pattern)?;
    }

    // Dropping the request future cancels the scan.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let snapshot = state.reconfig().snapshot();
    let alerts = list_alerts(
        state.alerts(),
        state.marker(),
        snapshot.table.route(),
        &filter,
        &cancel,
        Utc::now(),
    )
    .await?;
    Ok(Json(Envelope::success(alerts)))
}

/// Handle POST /alerts - ingest a batch of alerts.
pub async fn post_alerts(State(state): State<AppState>, body: Bytes) -> Reply<()> {
    let alerts: Vec<PostableAlert> = decode(&body)?;
    let resolve_timeout = state.reconfig().snapshot().config.global.resolve_timeout();
    insert_alerts(
        state.alerts(),
        state.metrics(),
        alerts,
        resolve_timeout,
        Utc::now(),
    )
    .await?;
    Ok(Json(Envelope::empty()))
}

/// Handle GET /silences - query silences.
pub async fn get_silences(
    State(state): State<AppState>,
    Query(query): Query<SilenceQuery>,
) -> Reply<Vec<Silence>> {
    let matchers = parse_filter(query.filter.as_deref())?;
    let silences = list_silences(state.silences(), &matchers, Utc::now())?;
    Ok(Json(Envelope::success(silences)))
}

/// Handle POST /silences - create or update a silence.
pub async fn post_silence(State(state): State<AppState>, body: Bytes) -> Reply<SilenceCreated> {
    let silence: Silence = decode(&body)?;
    let silence_id = create_silence(state.silences(), &silence, Utc::now())?;
    Ok(Json(Envelope::success(SilenceCreated { silence_id })))
}

/// Handle GET /silence/{sid} - fetch one silence.
pub async fn get_silence_by_id(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Reply<Silence> {
    let silence = get_silence(state.silences(), &sid, Utc::now())?;
    Ok(Json(Envelope::success(silence)))
}

/// Handle DELETE /silence/{sid} - expire a silence.
pub async fn delete_silence(State(state): State<AppState>, Path(sid): Path<String>) -> Reply<()> {
    expire_silence(state.silences(), &sid, Utc::now())?;
    Ok(Json(Envelope::empty()))
}

/// Handle GET /metrics - Prometheus text exposition.
pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, AlertMetrics::content_type())],
        state.metrics().encode(),
    )
}
