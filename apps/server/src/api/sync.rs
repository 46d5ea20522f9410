use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;
use serde_json::Value;

use fintech_core::{FintechConfig, PortfolioSnapshot};

use crate::{
    controller::SyncStart,
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BeginSyncResponse {
    started: bool,
}

async fn initialize(
    State(state): State<Arc<AppState>>,
    body: Option<Json<Value>>,
) -> ApiResult<StatusCode> {
    let value = body
        .map(|Json(inner)| inner)
        .unwrap_or_else(|| Value::Object(Default::default()));
    let config = FintechConfig::from_json(value)?;
    state.controller.initialize(config).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn begin_sync(State(state): State<Arc<AppState>>) -> ApiResult<Json<BeginSyncResponse>> {
    match state.controller.begin_sync().await? {
        SyncStart::Started => Ok(Json(BeginSyncResponse { started: true })),
        SyncStart::AlreadyRunning => Ok(Json(BeginSyncResponse { started: false })),
        SyncStart::NotInitialized => Err(ApiError::Conflict(
            "Sync engine is not initialized".to_string(),
        )),
    }
}

async fn sync_holdings(State(state): State<Arc<AppState>>) -> ApiResult<Json<PortfolioSnapshot>> {
    let orchestrator = state
        .controller
        .orchestrator()
        .await
        .ok_or_else(|| ApiError::Conflict("Sync engine is not initialized".to_string()))?;
    orchestrator.run_holdings_sync().await;
    if let Some(message) = orchestrator.last_error().await {
        return Err(ApiError::Internal(message));
    }
    orchestrator
        .snapshot()
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/init", post(initialize))
        .route("/sync/begin", post(begin_sync))
        .route("/sync/holdings", post(sync_holdings))
}
