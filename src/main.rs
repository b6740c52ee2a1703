use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use basion_relay::api::router;
use basion_relay::config::Config;
use basion_relay::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = std::fs::create_dir_all(&config.data_dir) {
        eprintln!("failed to create data dir {:?}: {err}", config.data_dir);
        std::process::exit(1);
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");
    let maintenance = config.maintenance_mode;

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("failed to open database: {err}");
            std::process::exit(1);
        }
    };
    let app = router(state);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_shutdown_signal().await;
            tracing::info!("shutdown signal received, draining connections");
            shutdown.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!(%addr, maintenance, "Basion relay listening (docs at /docs)");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .expect("HTTP server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
