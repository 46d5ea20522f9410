use std::{collections::BTreeMap, convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use futures_core::stream::Stream;
use serde::Serialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use fintech_core::{
    history::{ChartData, ChartPeriod, HistoryStats},
    portfolio::StatusBanner,
    sync::SyncOrchestrator,
    PortfolioSnapshot,
};
use fintech_market_data::CreditsInfo;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    period: ChartPeriod,
    data: ChartData,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    initialized: bool,
    syncing: bool,
    banner: Option<StatusBanner>,
    history: Option<HistoryStats>,
    last_error: Option<String>,
    credits: BTreeMap<&'static str, CreditsInfo>,
}

async fn require_orchestrator(state: &AppState) -> ApiResult<Arc<SyncOrchestrator>> {
    state
        .controller
        .orchestrator()
        .await
        .ok_or_else(|| ApiError::Conflict("Sync engine is not initialized".to_string()))
}

async fn get_portfolio(State(state): State<Arc<AppState>>) -> ApiResult<Json<PortfolioSnapshot>> {
    let orchestrator = require_orchestrator(&state).await?;
    orchestrator
        .snapshot()
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(period): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let period: ChartPeriod = period.parse().map_err(ApiError::BadRequest)?;
    let orchestrator = require_orchestrator(&state).await?;
    let data = orchestrator.chart_data(period).await;
    Ok(Json(HistoryResponse { period, data }))
}

async fn get_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatusResponse>> {
    let syncing = state.controller.is_syncing().await;
    let Some(orchestrator) = state.controller.orchestrator().await else {
        return Ok(Json(StatusResponse {
            initialized: false,
            syncing,
            banner: None,
            history: None,
            last_error: None,
            credits: BTreeMap::new(),
        }));
    };
    Ok(Json(StatusResponse {
        initialized: true,
        syncing,
        banner: orchestrator.status_at(Utc::now()).await,
        history: Some(orchestrator.history_stats().await),
        last_error: orchestrator.last_error().await,
        credits: orchestrator.provider_credits(),
    }))
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = BroadcastStream::new(state.event_bus.subscribe());
    let stream = tokio_stream::StreamExt::filter_map(receiver, |event| match event {
        Ok(evt) => match SseEvent::default().event(evt.name).json_data(&evt.payload) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(err) => {
                tracing::error!("Failed to serialize SSE payload for {}: {}", evt.name, err);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!("SSE client lagged, {} events dropped", skipped);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/portfolio", get(get_portfolio))
        .route("/history/{period}", get(get_history))
        .route("/status", get(get_status))
        .route("/events/stream", get(stream_events))
}
