// src/main.rs
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use menusync::cache::{CacheBackend, MemoryCache, ReadThroughCache, RedisCache};
use menusync::config::AppConfig;
use menusync::db::CatalogStore;
use menusync::monitoring::{init_tracing, metrics, MonitoringConfig};
use menusync::sync::{ReconciliationEngine, SheetsSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    let monitoring = MonitoringConfig::from_env();
    // Held until exit; dropping it stops the file writer.
    let _log_guard = init_tracing(&monitoring)?;
    metrics::init();

    let config = AppConfig::from_env()?;
    info!(path = %config.database_path.display(), "Opening catalog store");
    let store = CatalogStore::open(&config.database_path)?;

    let redis = if config.redis_enabled {
        Some(RedisCache::connect_or_disabled(&config.redis_url).await)
    } else {
        info!("Redis disabled, using in-process cache");
        None
    };
    if let Some(redis) = &redis {
        match redis.health_check().await {
            Ok(reply) => info!(reply = %reply, "Redis health check"),
            Err(e) => warn!(error = %e, "Redis health check failed, reads will fall through to the store"),
        }
    }
    let backend: Arc<dyn CacheBackend> = match &redis {
        Some(redis) => Arc::new(redis.clone()),
        None => Arc::new(MemoryCache::new()),
    };
    let cache = ReadThroughCache::new(backend);
    info!(backend = cache.backend_name(), "Cache ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sync_task = match (config.sync.enabled, &config.sync.sheets) {
        (true, Some(sheets)) => {
            let source = SheetsSource::new(sheets.clone(), config.sync.fetch_timeout)?;
            let engine = ReconciliationEngine::new(
                Arc::new(source),
                store.clone(),
                cache.clone(),
                config.sync.settings(),
            );
            Some(Arc::new(engine).spawn(shutdown_rx))
        }
        _ => {
            warn!("Reconciliation disabled");
            None
        }
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown_tx.send(true).ok();

    if let Some(task) = sync_task {
        if let Err(e) = task.await {
            error!(error = %e, "Reconciliation task ended abnormally");
        }
    }
    if let Some(redis) = redis {
        redis.close().await;
    }

    debug!(metrics = %metrics::render(), "Final metrics");
    info!("menusync stopped");
    Ok(())
}
