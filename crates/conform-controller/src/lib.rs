pub mod manager;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use conform_common::error::Result;
use conform_metrics::MetricsSys;

pub use manager::{Manager, Runnable};

#[async_trait]
impl Runnable for MetricsSys {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        self.start(shutdown).await
    }
}

/// Hook for wiring one domain controller into the manager with a handle
/// to the metrics reporter.
pub type ControllerSetup = fn(&mut Manager, Arc<MetricsSys>) -> Result<()>;

/// Wire the metrics reporter and all controllers into the manager.
///
/// Registers the reporter's instruments first; a registration failure
/// aborts startup and is returned to the caller. The reporter is then
/// scheduled as a long-running task and each controller setup function
/// receives a handle to it.
pub fn add_to_manager(
    manager: &mut Manager,
    metrics: Arc<MetricsSys>,
    controllers: &[ControllerSetup],
) -> Result<()> {
    metrics.register()?;
    manager.add(Arc::clone(&metrics) as Arc<dyn Runnable>);
    info!("metrics reporter added to manager");

    for setup in controllers {
        setup(manager, Arc::clone(&metrics))?;
    }

    Ok(())
}
