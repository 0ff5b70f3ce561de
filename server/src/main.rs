use std::net::SocketAddr;
use tokio::net::TcpListener;

use facade_server::config::{generate_config_template, Config};
use facade_server::live::retention;
use facade_server::{db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    init_tracing(config.json_logs);

    tracing::info!("Facade server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    let app_state = state::AppState::new(db.clone(), config.hub.settings());
    let hub = app_state.hub.clone();

    let cleanup = retention::spawn_play_history_cleanup(
        db,
        config.retention.clone(),
        hub.shutdown_token().clone(),
    );
    tracing::info!(
        "Play history retention: {} days, checked every {}s",
        config.retention.play_history_days,
        config.retention.cleanup_interval_secs
    );

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    let shutdown_hub = hub.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received, closing connections");
        shutdown_hub.shutdown();
    })
    .await?;

    hub.shutdown();
    let _ = cleanup.await;

    tracing::info!("Facade server stopped");
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("facade_server=info,tower_http=info"));

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}
