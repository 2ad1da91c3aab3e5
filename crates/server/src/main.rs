use clap::Parser;
use rankd_core::config::{self, ServiceSettings};
use rankd_core::SearchService;
use rankd_server::api::create_router;
use rankd_server::api::handlers::AppState;
use rankd_server::api::metrics;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rankd", about = "Multi-tenant passage search server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Directory holding raw `<index>.tsv` collections
    #[arg(short, long, default_value = config::DEFAULT_DATA_DIR)]
    data_dir: String,

    /// Index root template; `{index_name}` is replaced with the tenant name
    #[arg(long, env = "INDEX_ROOT", default_value = config::DEFAULT_INDEX_ROOT)]
    index_root: String,

    /// Index directory name under each tenant's index root
    #[arg(long, env = "INDEX_NAME", default_value = config::DEFAULT_INDEX_NAME)]
    index_name: String,

    /// Model checkpoint recorded by index builds
    #[arg(long, default_value = config::DEFAULT_CHECKPOINT)]
    checkpoint: String,

    /// Query cache capacity in entries per index (0 = unbounded)
    #[arg(long, default_value_t = config::DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,

    /// Attach every built index under the data directory at startup
    #[arg(long, default_value_t = false)]
    init_on_start: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value_t = config::DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rankd_server=info".parse()?)
                .add_directive("rankd_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }
    let data_path = std::path::Path::new(&args.data_dir);
    if data_path.exists() && !data_path.is_dir() {
        eprintln!(
            "Error: data_dir '{}' exists but is not a directory",
            args.data_dir
        );
        std::process::exit(1);
    }
    if !args.index_root.contains(config::INDEX_ROOT_PLACEHOLDER) {
        tracing::warn!(
            index_root = %args.index_root,
            "index_root has no {} placeholder; all tenants share one index root",
            config::INDEX_ROOT_PLACEHOLDER
        );
    }

    let settings = ServiceSettings {
        data_dir: PathBuf::from(&args.data_dir),
        index_root: args.index_root.clone(),
        index_name: args.index_name.clone(),
        checkpoint: PathBuf::from(&args.checkpoint),
        cache_capacity: args.cache_capacity,
    };
    let service = Arc::new(SearchService::new(settings));

    if args.init_on_start {
        let boot = Arc::clone(&service);
        match tokio::task::spawn_blocking(move || boot.initialize_all()).await? {
            Ok(report) => tracing::info!(
                loaded = report.loaded.len(),
                failed = report.failed.len(),
                "Searchers initialized at startup"
            ),
            Err(e) => tracing::warn!("Could not initialize searchers: {}", e),
        }
    }

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let state = AppState {
        service: Arc::clone(&service),
        prometheus_handle,
        start_time: Instant::now(),
    };
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", args.port);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        data_dir = %args.data_dir,
        index_root = %args.index_root,
        index_name = %args.index_name,
        cache_capacity = args.cache_capacity,
        indexes = service.registry().len(),
        "rankd ready"
    );

    // Spawn registry/cache metrics background task
    let metrics_service = Arc::clone(&service);
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config::METRICS_REFRESH_SECS));
        loop {
            interval.tick().await;
            metrics::update_service_metrics(&metrics_service);
        }
    });

    let shutdown_timeout = args.shutdown_timeout;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        _ = wait_for_signal() => {}
        result = &mut server => {
            result??;
            return Ok(());
        }
    }
    let _ = stop_tx.send(());

    match tokio::time::timeout(Duration::from_secs(shutdown_timeout), server).await {
        Ok(result) => result??,
        Err(_) => tracing::error!(
            "Shutdown drain timeout ({}s) exceeded, abandoning in-flight requests",
            shutdown_timeout
        ),
    }

    let building = service.builds_in_progress();
    if !building.is_empty() {
        tracing::warn!(
            ?building,
            "Exiting with index builds still running"
        );
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
}
