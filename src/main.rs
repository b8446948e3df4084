use clap::{Parser, ValueEnum};
use doc_embeddings_worker::config::WorkerConfig;
use doc_embeddings_worker::handlers::QueueItemHandler;
use doc_embeddings_worker::infrastructure::{processor, queue, storage};
use doc_embeddings_worker::services::worker::QueueWorker;
use doc_embeddings_worker::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Poll the queue until shutdown
    Worker,
    /// Handle a single batch and exit
    Once,
    /// Queue worker plus the health endpoint
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to run
    #[arg(short, long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// Port for the health endpoint
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Use Azurite endpoints and the no-op processor
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_embeddings_worker=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Document Embeddings Worker [Mode: {:?}]...", args.mode);

    let config = if args.dev {
        WorkerConfig::development()
    } else {
        WorkerConfig::production()
    };
    info!(
        "⚙️  Worker Config: Batch={}, Concurrency={}, Visibility={}s, Max Dequeue={}, SAS Expiry={}s",
        config.batch_size,
        config.max_concurrency,
        config.visibility_timeout_secs,
        config.max_dequeue_count,
        config.sas_expiry_secs
    );

    // 2. Setup Collaborators
    let storage_service = storage::setup_storage(&config).await?;
    let queue_service = queue::setup_queue(&config).await?;
    let processor_service = processor::setup_processor(&config).await?;

    let handler = Arc::new(QueueItemHandler::new(
        storage_service.clone(),
        processor_service.clone(),
    ));

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    if args.mode == Mode::Once {
        let worker = QueueWorker::new(queue_service, handler, &config, shutdown_rx);
        let summary = worker.run_once().await;
        info!(
            "📊 Received={}, Completed={}, Failed={}, Poisoned={}",
            summary.received, summary.completed, summary.failed, summary.poisoned
        );
        return Ok(());
    }

    let mut handles = Vec::new();

    // 4. Initialize Queue Worker
    if matches!(args.mode, Mode::Worker | Mode::All) {
        let worker = QueueWorker::new(
            queue_service.clone(),
            handler.clone(),
            &config,
            shutdown_rx.clone(),
        );
        handles.push(tokio::spawn(worker.run()));
        info!("👷 Queue worker initialized on '{}'.", config.queue_name);
    }

    // 5. Initialize Health Endpoint
    if args.mode == Mode::All {
        let state = AppState {
            storage: storage_service.clone(),
            queue: queue_service.clone(),
            processor: processor_service.clone(),
        };

        let app = create_app(state).layer(TraceLayer::new_for_http());
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("✅ Health endpoint listening on: http://0.0.0.0:{}/health", args.port);

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for Shutdown Signal
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Waiting for in-flight queue items...");
    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Worker exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
