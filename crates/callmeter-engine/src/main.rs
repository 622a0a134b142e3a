//! callmeter demo
//!
//! - Loads operation specs from `callmeter.yaml` (or the path given as the
//!   first argument); falls back to built-in specs when the file is absent
//! - Drives the demo inventory workload through the interceptor
//! - Logs the registry snapshot as JSON

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use callmeter_core::error::{CallMeterError, Result};
use callmeter_engine::{config, demo, InMemoryRegistry, InstrumentedCallEngine, Interceptor};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "callmeter.yaml".to_string());

    let registry = InMemoryRegistry::global();
    let engine = Arc::new(InstrumentedCallEngine::new(registry.clone()));
    let interceptor = Arc::new(Interceptor::new(engine));

    if Path::new(&path).exists() {
        let cfg = config::load_from_file(&path)?;
        let n = cfg.apply(&interceptor)?;
        tracing::info!(%path, operations = n, "instrumentation config loaded");
    } else {
        tracing::info!(%path, "no config file, using built-in specs");
        demo::install_default_specs(&interceptor)?;
    }

    let size = demo::run(Arc::clone(&interceptor), registry.as_ref(), 4).await;

    let snapshot = serde_json::to_string_pretty(&registry.snapshot())
        .map_err(|e| CallMeterError::Internal(format!("snapshot encode failed: {e}")))?;
    tracing::info!(stock = size, "demo finished");
    println!("{snapshot}");
    Ok(())
}
