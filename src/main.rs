//! docharbor - main entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use docharbor::{
    Config, DocsRepository, DocsService, GitClient, LocalDirStore, WorkerPool, ZigDocBuilder,
};

#[derive(Parser)]
#[command(name = "docharbor")]
#[command(version, about = "On-demand documentation server for remote Zig modules")]
struct Cli {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to configuration file (JSON or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = "DOCHARBOR_HOST")]
    host: Option<String>,

    /// Listen port
    #[arg(long, env = "DOCHARBOR_PORT")]
    port: Option<u16>,

    /// HTTP worker thread count
    #[arg(long, env = "DOCHARBOR_HTTP_WORKERS")]
    http_workers: Option<usize>,

    /// Artifact store root
    #[arg(long, env = "DOCHARBOR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Path to the VCS binary
    #[arg(long, env = "DOCHARBOR_GIT_EXECUTABLE")]
    git_executable: Option<PathBuf>,

    /// Path to the documentation-generator binary
    #[arg(long, env = "DOCHARBOR_ZIG_EXECUTABLE")]
    zig_executable: Option<PathBuf>,

    /// Cache directory handed to the documentation generator
    #[arg(long, env = "DOCHARBOR_ZIG_CACHE_DIR")]
    zig_cache_dir: Option<PathBuf>,
}

impl Cli {
    /// Fold CLI flags over the file- or environment-derived configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(workers) = self.http_workers {
            config.http_workers = workers;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(git) = &self.git_executable {
            config.git_executable = git.clone();
        }
        if let Some(zig) = &self.zig_executable {
            config.zig_executable = zig.clone();
        }
        if let Some(cache) = &self.zig_cache_dir {
            config.zig_cache_dir = Some(cache.clone());
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.debug {
        EnvFilter::from_default_env().add_directive("docharbor=debug".parse()?)
    } else {
        EnvFilter::from_default_env().add_directive("docharbor=info".parse()?)
    };
    fmt().with_env_filter(filter).with_target(false).init();

    // Load configuration
    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::from_env()
    };
    cli.apply(&mut config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.http_workers.max(1))
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(LocalDirStore::new(&config.data_dir)?);
    let vcs = Arc::new(GitClient::new(&config.git_executable));
    let builder = Arc::new(ZigDocBuilder::new(
        &config.zig_executable,
        config.zig_cache_dir.clone(),
    ));
    let pool = WorkerPool::new();
    let repository = DocsRepository::new(store, vcs, builder, pool.clone());
    let service = DocsService::new(repository);

    docharbor::server::serve(
        &config.host,
        config.port,
        service,
        pool.clone(),
        shutdown_signal(),
    )
    .await?;

    // The listener is closed; join the in-flight builds before exiting.
    info!("draining in-flight builds");
    pool.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM. Teardown itself happens on the runtime,
/// never in signal context.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
