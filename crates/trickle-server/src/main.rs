//! `trickle-server`: streams a synthetic payload over HTTP, one chunk per
//! pacing interval.
//!
//! ```text
//! GET /                        100 KiB chunks, 10000 of them
//! GET /{value}{unit}           value * unit bytes per chunk (unit: B, K, M)
//! GET /{value}{unit}/{count}   same, `count` chunks
//! GET /health                  SERVING / NOT_SERVING
//! ```

mod server;

use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::service::handler::StreamService;
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let service = StreamService::new(config.clone());
    let app = service.clone().router();

    if config.uds {
        #[cfg(unix)]
        {
            use tokio::net::UnixListener;
            let uds_path = config.server_addr.clone();
            let uds = UnixListener::bind(&uds_path)?;
            log_startup_info(&uds_path, &config);
            let res = axum::serve(uds, app)
                .with_graceful_shutdown(shutdown_signal(service))
                .await;
            // Best effort; a panic might still leave the socket file behind.
            let _ = std::fs::remove_file(&uds_path);
            res?;
        }
        #[cfg(not(unix))]
        {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    } else {
        let tcp = TcpListener::bind(&config.server_addr).await?;
        log_startup_info(&config.server_addr, &config);
        axum::serve(tcp, app)
            .with_graceful_shutdown(shutdown_signal(service))
            .await?;
    }

    tracing::info!("Service shut down successfully");
    providers.shutdown();
    Ok(())
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting stream service on {} with full config: {:#?}",
            addr,
            config
        );
    } else {
        tracing::info!(
            "Starting stream service on {} (pacing interval {:?})",
            addr,
            config.pacing_interval
        );
    }
}

async fn shutdown_signal(service: StreamService) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!(
        "Shutdown signal received, terminating gracefully ({} streams in flight)...",
        service.registry().inflight()
    );

    // In-flight streams get a chance to finish, then are cancelled so the
    // server can close their connections.
    service.shutdown().await;
}
