use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use dotenvy::dotenv;
use prometheus::{Encoder, TextEncoder};
use sensorpeek_mqtt::ConnectionConfig;
use tokio::signal;
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod metrics;
mod models;
mod render;
mod services;
mod settings;

use metrics::Metrics;
use models::{FetchForm, FetchRequest};
use render::DashboardView;
use services::FetchService;
use settings::ServerSettings;

#[derive(Clone)]
struct AppState {
    fetcher: FetchService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let settings = ServerSettings::from_env()?;
    let defaults = ConnectionConfig::from_env();
    info!(
        broker = %defaults.broker,
        port = defaults.port,
        topic = %defaults.topic,
        timeout_secs = settings.fetch_timeout.as_secs(),
        "Dashboard defaults loaded"
    );

    let state = AppState {
        fetcher: FetchService::new(defaults, settings.fetch_timeout, Metrics::new()),
    };

    let app = Router::new()
        .route("/", get(dashboard))
        .route("/fetch", post(submit_fetch))
        .route("/api/fetch", post(api_fetch))
        .route("/api/state", get(api_state))
        .route("/healthz", get(healthz))
        .route("/version", get(version))
        .route("/metrics", get(metrics_handler))
        .nest_service("/static", ServeDir::new(&settings.static_dir))
        .with_state(state);

    info!(addr = %settings.http_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(settings.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.http_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,axum=info,hyper=info,rumqttc=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(?e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

async fn healthz() -> &'static str { "ok" }

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(?e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buf,
    )
        .into_response()
}

// ----- Dashboard -----

async fn dashboard(State(state): State<AppState>) -> Html<String> {
    let session = state.fetcher.snapshot().await;
    Html(render::dashboard(&DashboardView {
        session: &session,
        timeout: state.fetcher.timeout(),
        notice: None,
    }))
}

async fn submit_fetch(State(state): State<AppState>, Form(form): Form<FetchForm>) -> Response {
    match form.into_config() {
        Ok(config) => {
            state.fetcher.fetch(config).await;
            Redirect::to("/").into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, "Rejected fetch form");
            let session = state.fetcher.snapshot().await;
            let notice = e.to_string();
            let page = render::dashboard(&DashboardView {
                session: &session,
                timeout: state.fetcher.timeout(),
                notice: Some(&notice),
            });
            (StatusCode::BAD_REQUEST, Html(page)).into_response()
        }
    }
}

// ----- JSON API -----

async fn api_fetch(State(state): State<AppState>, Json(req): Json<FetchRequest>) -> Response {
    match req.into_config(state.fetcher.defaults()) {
        Ok(config) => Json(state.fetcher.fetch(config).await).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn api_state(State(state): State<AppState>) -> Response {
    Json(state.fetcher.snapshot().await).into_response()
}
