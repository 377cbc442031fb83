mod cli;

use crate::cli::CLI;
use anyhow::{anyhow, Context};
use clap::Parser;
use rand::Rng;
use snip_core::Repository;
use snip_gateway::{App, AppState};
use snip_identity::TokenCodec;
use snip_shortener::generator::random::RandomGenerator;
use snip_shortener::{DeletionPool, PoolSettings, ShortenerService};
use snip_storage::{MapFileRepository, SqliteRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    snip_telemetry::init(config.log_format)?;

    let codec = token_codec(config.secret_key.as_deref())?;

    match config.database_dsn.as_deref() {
        Some(dsn) => {
            let repository = SqliteRepository::connect(dsn)
                .await
                .context("failed to connect to database")?;
            info!(storage_backend = "sqlite", "storage ready");
            run(config, Arc::new(repository), codec).await
        }
        None => {
            let repository = MapFileRepository::open(&config.file_storage_path)
                .with_context(|| {
                    format!(
                        "failed to open storage file {}",
                        config.file_storage_path.display()
                    )
                })?;
            info!(
                storage_backend = "map-file",
                path = %config.file_storage_path.display(),
                "storage ready"
            );
            run(config, Arc::new(repository), codec).await
        }
    }
}

fn token_codec(secret: Option<&str>) -> anyhow::Result<TokenCodec> {
    match secret {
        Some(secret) => Ok(TokenCodec::new(secret)?),
        None => {
            warn!("no secret key configured, identities will not survive a restart");
            let mut secret = [0u8; 32];
            rand::rng().fill(&mut secret);
            Ok(TokenCodec::new(secret)?)
        }
    }
}

async fn run<R: Repository>(
    config: CLI,
    repository: Arc<R>,
    codec: TokenCodec,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let settings = PoolSettings::builder()
        .workers(config.delete_workers)
        .queue_capacity(config.delete_queue_capacity)
        .build();
    let mut pool = DeletionPool::spawn(Arc::clone(&repository), settings, &shutdown);

    let service = ShortenerService::new(
        repository,
        RandomGenerator::new(),
        Duration::from_millis(config.timeout_ms),
    );
    let state = AppState::new(
        Arc::new(service),
        codec,
        config.base_url.clone(),
        pool.submitter(),
    );

    let listener = TcpListener::bind(config.server_address).await?;
    info!(
        listen_addr = %listener.local_addr()?,
        base_url = %config.base_url,
        timeout_ms = config.timeout_ms,
        "starting http server"
    );

    let server = axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server = tokio::spawn(async move { server.await });
    let mut server_stopped = false;

    let failure = tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            None
        }
        failure = pool.failure() => failure,
        joined = &mut server => {
            server_stopped = true;
            warn!("http server stopped unexpectedly");
            joined??;
            None
        }
    };

    shutdown.cancel();
    if !server_stopped {
        server.await??;
    }
    let failure = failure.or(pool.shutdown().await);

    match failure {
        Some(err) => {
            error!(error = %err, "stopped after deletion pool failure");
            Err(anyhow!(err).context("deletion pool failed"))
        }
        None => {
            info!("server stopped");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
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
}
