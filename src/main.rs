use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use kagami::cache::{CacheManager, CacheStore, MemoryCacheStore, NullCacheStore};
use kagami::config::{Config, SourceKind};
use kagami::constants::DEFAULT_CONFIG_PATH;
use kagami::image_optimizer::{CodecRegistry, TransformEngine};
use kagami::metrics::Metrics;
use kagami::pipeline::{BackgroundTasks, ImagePipeline, PipelineOptions};
use kagami::server::{self, AppState};
use kagami::storage::{FsStore, ObjectStore, S3Store};
use tokio::net::TcpListener;

/// Kagami - edge image transformation service
#[derive(Parser, Debug)]
#[command(name = "kagami")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,
}

async fn build_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let source = &config.source;
    let max_size = config.image.max_size_bytes as u64;
    let store: Arc<dyn ObjectStore> = match source.kind {
        SourceKind::S3 => {
            let bucket = source
                .bucket
                .as_deref()
                .ok_or_else(|| anyhow!("source.bucket is required for the s3 source"))?;
            Arc::new(
                S3Store::connect(bucket, &source.region, source.endpoint.as_deref())
                    .await
                    .with_size_limit(max_size),
            )
        }
        SourceKind::Filesystem => {
            let root = source
                .root
                .as_deref()
                .ok_or_else(|| anyhow!("source.root is required for the filesystem source"))?;
            Arc::new(FsStore::new(root).with_size_limit(max_size))
        }
    };
    Ok(store)
}

fn build_cache(config: &Config) -> CacheManager {
    let store: Arc<dyn CacheStore> = if config.cache.enabled {
        Arc::new(MemoryCacheStore::new(&config.cache))
    } else {
        Arc::new(NullCacheStore)
    };
    CacheManager::new(store, BackgroundTasks::new())
}

#[tokio::main]
async fn main() -> Result<()> {
    kagami::logging::init_subscriber()
        .map_err(|e| anyhow!("Failed to initialize logging subsystem: {}", e))?;

    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    config.validate().context("Configuration is invalid")?;

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        source = ?config.source.kind,
        cache_enabled = config.cache.enabled,
        purge_enabled = config.auth.purge_secret.is_some(),
        "Configuration loaded successfully"
    );

    if args.test {
        println!("Configuration file {} is valid", args.config.display());
        return Ok(());
    }

    let store = build_store(&config).await?;
    let cache = build_cache(&config);
    let engine = Arc::new(TransformEngine::new(
        Arc::new(CodecRegistry::new()),
        config.image.max_width,
        config.image.max_height,
    ));

    let pipeline = Arc::new(ImagePipeline::new(
        store,
        cache,
        engine,
        config.image.to_validation_policy(),
        Arc::new(Metrics::new()),
        PipelineOptions::from_config(&config),
    ));
    let state = Arc::new(AppState::from_config(pipeline, &config));

    let listen_addr = config.listen_address();
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;

    tracing::info!(address = %listen_addr, "Starting Kagami");

    server::serve_with_shutdown(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    tracing::info!("Kagami stopped");
    Ok(())
}
