use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use typoscout::api::{self, AppState};
use typoscout::auth;
use typoscout::bulk::BulkScheduler;
use typoscout::config;
use typoscout::custom_api;
use typoscout::logging;
use typoscout::metrics;
use typoscout::registrar;
use typoscout::store::RedisStore;
use typoscout::ws;

const LISTEN_PORT: u16 = 8080;
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    if let Err(err) = config::init() {
        eprintln!("Error reading config file: {err}");
        std::process::exit(1);
    }
    let cfg = config::get();

    let log_sink = logging::init(&cfg.log_level)?;
    info!("typoscout v{} starting", env!("CARGO_PKG_VERSION"));

    metrics::init_metrics();

    let store = RedisStore::connect().await?;
    let scheduler = BulkScheduler::new(store);
    scheduler.init().await?;

    custom_api::setup_limiters();
    registrar::setup_limiters();

    // A run interrupted by a restart resumes from the pending hash.
    scheduler.clone().startup_recovery().await;

    let state = AppState {
        scheduler,
        log_sink,
    };

    let admin_routes = Router::new()
        .route(
            "/setting",
            get(api::admin_setting_list).put(api::setting_update),
        )
        .route("/log", get(api::download_log).delete(api::reset_log))
        .route("/bulkcheckupload", post(api::bulk_check_upload))
        .route(
            "/bulkcheckresultdownload",
            get(api::bulk_check_result_download),
        )
        .route_layer(axum::middleware::from_fn(auth::require_admin));

    let mut app = Router::new()
        .route("/api/login", post(auth::login))
        .route("/api/web/setting", get(api::web_setting_list))
        .nest("/api/admin", admin_routes)
        .route("/app/ws", get(ws::ws_handler));

    // Diagnostic surface, enabled only when tuning is requested.
    let app_tuning = std::env::var("APP_TUNING")
        .map(|value| value.to_lowercase() == "true")
        .unwrap_or(false);
    if app_tuning {
        app = app.route("/api/tuning/metrics", get(metrics::metrics_handler));
    }

    let app = app
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], LISTEN_PORT));
    let listener = TcpListener::bind(addr).await?;
    info!("typoscout listening on {}", addr);

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("Received shutdown signal, gracefully shutting down...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}
