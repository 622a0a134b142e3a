//! Demo inventory service driven through the interceptor.
//!
//! `StockManager` is plain business logic with its own counter and gauge; the
//! timing of its operations comes entirely from the specs installed on the
//! interceptor.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;

use callmeter_core::call::ArgSnapshot;
use callmeter_core::error::Result;
use callmeter_core::spec::InstrumentationSpec;
use callmeter_core::tags::{MeterId, Tags};

use crate::intercept::{Instrumented, Interceptor};
use crate::registry::{Counter, Gauge, MeterRegistry};

#[derive(Debug, Error)]
pub enum StockError {
    #[error("batch must contain at least one item")]
    EmptyBatch,
}

pub struct StockManager {
    orders: Mutex<Vec<String>>,
    order_created: Option<Arc<dyn Counter>>,
    stock_size: Option<Arc<dyn Gauge>>,
}

impl StockManager {
    pub fn new(registry: &dyn MeterRegistry) -> Self {
        let order_created = registry
            .counter(MeterId::new("order_created", Tags::new()), Some("number of orders created"))
            .map_err(|e| tracing::warn!(error = %e, "order_created counter unavailable"))
            .ok();
        let stock_size = registry
            .gauge(MeterId::new("stock.size", Tags::new()), Some("Number of items in stocks"))
            .map_err(|e| tracing::warn!(error = %e, "stock.size gauge unavailable"))
            .ok();
        Self {
            orders: Mutex::new(Vec::new()),
            order_created,
            stock_size,
        }
    }

    fn orders(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn number_of_items(&self) -> usize {
        self.orders().len()
    }

    fn measure(&self, size: usize) {
        if let Some(gauge) = &self.stock_size {
            let _ = gauge.set(size as f64);
        }
    }

    /// Append items; returns the new stock size.
    pub fn add_items(&self, items: Vec<String>) -> std::result::Result<usize, StockError> {
        if items.is_empty() {
            return Err(StockError::EmptyBatch);
        }
        let size = {
            let mut orders = self.orders();
            orders.extend(items);
            orders.len()
        };
        self.measure(size);
        Ok(size)
    }

    /// Take up to `count` items, oldest first.
    pub fn get_items(&self, count: usize) -> std::result::Result<Vec<String>, StockError> {
        let (taken, size) = {
            let mut orders = self.orders();
            let n = count.min(orders.len());
            let taken: Vec<String> = orders.drain(..n).collect();
            (taken, orders.len())
        };
        if let Some(counter) = &self.order_created {
            let _ = counter.increment(1.0);
        }
        self.measure(size);
        Ok(taken)
    }

    /// Slow maintenance pass: sort and de-duplicate the stock.
    pub async fn rebuild(&self, pause: Duration) -> std::result::Result<usize, StockError> {
        tokio::time::sleep(pause).await;
        let size = {
            let mut orders = self.orders();
            orders.sort();
            orders.dedup();
            orders.len()
        };
        self.measure(size);
        Ok(size)
    }
}

/// Specs used when no config file is supplied.
pub fn install_default_specs(interceptor: &Interceptor) -> Result<()> {
    interceptor.register_unit("StockManager", Interceptor::profiler_spec());
    interceptor.register_method(
        "StockManager",
        "add_items",
        InstrumentationSpec::builder()
            .extra_tags(["team", "inventory"])
            .logging_enabled(true)
            .build()?,
    );
    interceptor.register_method(
        "StockManager",
        "rebuild",
        InstrumentationSpec::builder()
            .metric_name("stock.rebuild")
            .long_task(true)
            .description("stock maintenance in flight")
            .build()?,
    );
    Ok(())
}

/// Drive the demo workload. Returns the final stock size.
pub async fn run(interceptor: Arc<Interceptor>, registry: &dyn MeterRegistry, workers: usize) -> usize {
    let stock = Instrumented::new(StockManager::new(registry), interceptor);

    let producers = (0..workers).map(|w| {
        let stock = stock.clone();
        tokio::spawn(async move {
            for i in 0..5 {
                let items = vec![format!("w{w}-item{i}"), format!("shared-{i}")];
                let args = ArgSnapshot::new().with(&items);
                if let Err(e) = stock.invoke("add_items", args, move |s| s.add_items(items)) {
                    tracing::warn!(error = %e, "add_items failed");
                }
                tokio::task::yield_now().await;
            }
        })
    });
    for joined in join_all(producers).await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "producer task failed");
        }
    }

    // recorded with exception=EmptyBatch
    if let Err(e) = stock.invoke("add_items", ArgSnapshot::new().with(&Vec::<String>::new()), |s| {
        s.add_items(Vec::new())
    }) {
        tracing::info!(error = %e, "empty batch rejected");
    }

    if let Err(e) = stock
        .invoke_async("rebuild", ArgSnapshot::new(), |s| s.rebuild(Duration::from_millis(50)))
        .await
    {
        tracing::warn!(error = %e, "rebuild failed");
    }

    if let Err(e) = stock.invoke("get_items", ArgSnapshot::new().with(&3usize), |s| s.get_items(3)) {
        tracing::warn!(error = %e, "get_items failed");
    }

    stock.inner().number_of_items()
}
