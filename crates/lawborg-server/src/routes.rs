use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use lawborg_core::types::Request;
use lawborg_search::{CascadeOutcome, Strategy};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::AppState;

// ── Request body types ────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchBody {
    pub query: String,
    pub desired_count: Option<usize>,
    /// Overrides the classifier's strategy (kebab-case name).
    pub strategy: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Deserialize)]
pub(crate) struct ClassifyBody {
    pub query: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_s": state.start_time.elapsed().as_secs(),
    }))
}

pub(crate) async fn draft(
    State(state): State<Arc<AppState>>,
    Json(request): Json<Request>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cancel = state.shutdown.child_token();
    match state.pipeline.run(&request, &cancel).await {
        Ok(output) => Ok(Json(json!(output))),
        Err(e) => Err((StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))),
    }
}

/// Cascade contract: `{success: true, query, results, timestamp, sourceLabel}`
/// or `{success: false, error}`.
pub(crate) async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchBody>,
) -> Json<Value> {
    let classification = state.classifier.classify(&body.query);
    let strategy = match body.strategy.as_deref() {
        Some(name) => match Strategy::parse(name) {
            Some(s) => s,
            None => {
                warn!(strategy = name, "unknown strategy requested");
                return Json(json!({
                    "success": false,
                    "error": format!("unknown strategy `{name}`"),
                }));
            }
        },
        None => classification.strategy,
    };
    let desired = body.desired_count.unwrap_or(state.desired_results);
    info!(
        category = ?classification.category,
        strategy = strategy.as_str(),
        desired,
        "search requested"
    );

    let outcome = state
        .cascade
        .search(&classification.normalized_query, strategy, desired, body.force)
        .await;
    Json(match outcome {
        CascadeOutcome::Success {
            query,
            results,
            strategy,
            source_label,
            timestamp,
        } => json!({
            "success": true,
            "query": query,
            "results": results,
            "timestamp": timestamp,
            "sourceLabel": source_label,
            "strategy": strategy,
        }),
        CascadeOutcome::Exhausted { reason, .. } => json!({
            "success": false,
            "error": reason,
        }),
    })
}

pub(crate) async fn classify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClassifyBody>,
) -> Json<Value> {
    Json(json!(state.classifier.classify(&body.query)))
}

// SSE logs: replays the ring buffer, then streams live lines

pub(crate) async fn sse_logs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    // Subscribe before snapshotting the ring so no line falls between them
    let mut live_rx = state.log_tx.subscribe();
    let history: Vec<String> = state
        .log_ring
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .cloned()
        .collect();
    tokio::spawn(async move {
        for line in history {
            if tx.send(line).is_err() {
                return;
            }
        }
        loop {
            match live_rx.recv().await {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
    let stream = UnboundedReceiverStream::new(rx)
        .map(|data| Ok::<_, Infallible>(Event::default().data(data)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    )
}
