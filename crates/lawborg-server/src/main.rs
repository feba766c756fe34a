mod logging;
mod routes;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use lawborg_agent::model_from_config;
use lawborg_core::{
    config::Config,
    pipeline::{DraftingPipeline, PipelineEvent},
    refine::Refiner,
    retriever::Retriever,
};
use lawborg_search::{
    legal::{CourtListenerClient, FederalRegisterClient},
    providers::{brave::BraveSearch, knowledge_base::KnowledgeBase, reader::ReaderExtractor},
    CascadeAdapter, CascadeSearch, CascadeSettings, QueryClassifier, ScoringPolicy, TierProviders,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::logging::BroadcastLayer;

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub start_time: Instant,
    pub log_tx: broadcast::Sender<String>,
    pub log_ring: Arc<std::sync::Mutex<VecDeque<String>>>,
    pub pipeline: DraftingPipeline,
    pub classifier: Arc<QueryClassifier>,
    pub cascade: Arc<CascadeSearch>,
    pub desired_results: usize,
    /// Parent of every per-request token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/draft", post(routes::draft))
        .route("/api/search", post(routes::search))
        .route("/api/classify", post(routes::classify))
        .route("/api/logs", get(routes::sse_logs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Wiring ────────────────────────────────────────────────────────────────

fn build_search(config: &Config) -> (Arc<QueryClassifier>, Arc<CascadeSearch>) {
    let provider_timeout = Duration::from_secs(config.provider_timeout_s);
    let policy = ScoringPolicy::new(
        config.official_domains.clone(),
        config.academic_domains.clone(),
        config.blocked_domains.clone(),
    );
    let web = Arc::new(BraveSearch::new(
        config.brave_api_key.clone(),
        config.provider_concurrency,
        provider_timeout,
    ));
    let knowledge_base = Arc::new(KnowledgeBase::with_file(&config.knowledge_base_path));
    info!(entries = knowledge_base.len(), "knowledge base loaded");

    let tiers = TierProviders::scoped(web, knowledge_base, &policy);
    let settings = CascadeSettings {
        attempt_timeout: provider_timeout,
        extract_top_k: config.extract_top_k,
        extract_max_chars: config.extract_max_chars,
        extract_timeout: Duration::from_secs(config.extract_timeout_s),
    };
    let mut cascade = CascadeSearch::new(tiers, policy, settings);
    if !config.reader_base_url.is_empty() && config.extract_top_k > 0 {
        cascade = cascade.with_extractor(Arc::new(ReaderExtractor::new(
            config.reader_base_url.clone(),
            config.provider_concurrency,
            Duration::from_secs(config.extract_timeout_s),
        )));
    }

    let classifier = QueryClassifier::new(
        config.default_jurisdiction.clone(),
        config.jurisdiction_markers.clone(),
    );
    (Arc::new(classifier), Arc::new(cascade))
}

fn build_retriever(
    config: &Config,
    classifier: Arc<QueryClassifier>,
    cascade: Arc<CascadeSearch>,
) -> Retriever {
    let timeout = Duration::from_secs(config.provider_timeout_s);
    let web = Arc::new(CascadeAdapter::new(classifier, cascade, config.desired_results));
    let mut retriever = Retriever::new(web, config.retriever_fanout).with_adapter(Arc::new(
        FederalRegisterClient::new(config.desired_results, config.provider_concurrency, timeout),
    ));
    if config.courtlistener_token.is_empty() {
        info!("COURTLISTENER_TOKEN not set, case-law lookups use the web cascade");
    } else {
        retriever = retriever.with_adapter(Arc::new(CourtListenerClient::new(
            config.courtlistener_token.clone(),
            config.desired_results,
            config.provider_concurrency,
            timeout,
        )));
    }
    retriever
}

/// Mirror pipeline stage events into the SSE log stream.
fn forward_pipeline_events(
    mut rx: broadcast::Receiver<PipelineEvent>,
    log_tx: broadcast::Sender<String>,
    log_ring: Arc<std::sync::Mutex<VecDeque<String>>>,
) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(evt) => {
                    let data = serde_json::json!({
                        "ts": chrono::Utc::now().timestamp(),
                        "level": "info",
                        "category": "pipeline",
                        "type": evt.kind(),
                        "run_id": evt.run_id(),
                        "message": evt.message(),
                    })
                    .to_string();
                    let _ = log_tx.send(data.clone());
                    logging::push_ring(&log_ring, data);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        return;
    }
    info!("shutdown requested, cancelling in-flight runs");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_tx, _log_rx) = broadcast::channel::<String>(256);
    let log_ring = Arc::new(std::sync::Mutex::new(VecDeque::new()));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "lawborg_server=info,lawborg_core=info,lawborg_search=info,lawborg_agent=info,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .with(BroadcastLayer {
            tx: log_tx.clone(),
            ring: Arc::clone(&log_ring),
        })
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let (classifier, cascade) = build_search(&config);
    let retriever = build_retriever(&config, Arc::clone(&classifier), Arc::clone(&cascade));
    let refiner = model_from_config(&config)?
        .map(|model| Refiner::new(model, Duration::from_secs(config.model_timeout_s)));
    match &refiner {
        Some(r) => info!(model = %r.model_id(), "language-model refinement enabled"),
        None => info!("no BACKEND configured, drafts stay deterministic"),
    }

    let (pipeline, pipeline_rx) = DraftingPipeline::new(&config, retriever, refiner);
    forward_pipeline_events(pipeline_rx, log_tx.clone(), Arc::clone(&log_ring));

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        start_time: Instant::now(),
        log_tx,
        log_ring,
        pipeline,
        classifier,
        cascade,
        desired_results: config.desired_results,
        shutdown: shutdown.clone(),
    });

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}
