//! Shared types and HTTP API for the sync daemon.

pub mod config;

use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use btcmap_sync::{CollectionStatus, SyncOutcome, SyncRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub use config::DaemonConfig;

/// State shared by the HTTP handlers.
pub struct AppState {
    pub registry: SyncRegistry,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusResponse {
    pub collections: Vec<CollectionStatus>,
}

/// Outcome of one collection's sync, flattened for JSON.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutcomeReport {
    pub name: String,
    /// `skipped`, `cache_hit`, `unchanged`, `updated`, `degraded` or `failed`.
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutcomeReport {
    pub fn new(name: impl Into<String>, outcome: &SyncOutcome) -> Self {
        let (result, error) = match outcome {
            SyncOutcome::Skipped => ("skipped", None),
            SyncOutcome::CacheHit { .. } => ("cache_hit", None),
            SyncOutcome::Unchanged { .. } => ("unchanged", None),
            SyncOutcome::Updated { .. } => ("updated", None),
            SyncOutcome::Degraded { error, .. } => ("degraded", Some(error.clone())),
            SyncOutcome::Failed { error } => ("failed", Some(error.clone())),
        };
        Self {
            name: name.into(),
            result: result.to_string(),
            count: outcome.count(),
            error,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SyncResponse {
    pub outcomes: Vec<OutcomeReport>,
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        collections: state.registry.status(),
    })
}

async fn sync_handler(State(state): State<Arc<AppState>>) -> Json<SyncResponse> {
    let outcomes = sync_pass(&state.registry).await;
    Json(SyncResponse { outcomes })
}

/// Build the HTTP API router with the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/sync", post(sync_handler))
        .with_state(state)
}

/// Syncs every collection once and logs a line per collection.
pub async fn sync_pass(registry: &SyncRegistry) -> Vec<OutcomeReport> {
    let reports: Vec<OutcomeReport> = registry
        .sync_all()
        .await
        .iter()
        .map(|(name, outcome)| OutcomeReport::new(name.as_str(), outcome))
        .collect();

    for report in &reports {
        match &report.error {
            Some(error) => warn!("{}: {} ({})", report.name, report.result, error),
            None => info!(
                "{}: {} ({} records)",
                report.name,
                report.result,
                report.count.unwrap_or_default()
            ),
        }
    }
    reports
}

/// Runs a sync pass immediately and then every `period`.
pub fn spawn_sync_loop(registry: SyncRegistry, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sync_pass(&registry).await;
        }
    })
}
