use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use conform_common::error::{ConformError, Result};

/// A long-running unit of the control plane. `run` blocks until the
/// token is cancelled or the unit fails on its own.
#[async_trait]
pub trait Runnable: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()>;
}

/// Owns the long-running tasks of the process and a root cancellation
/// token. The first task failure (or an external cancel) stops all of
/// them.
pub struct Manager {
    runnables: Vec<Arc<dyn Runnable>>,
    shutdown: CancellationToken,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            runnables: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn add(&mut self, runnable: Arc<dyn Runnable>) {
        self.runnables.push(runnable);
    }

    /// Token callers cancel to stop every task this manager runs.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run all added tasks to completion. Returns the first task error,
    /// after cancelling and draining the remaining tasks.
    pub async fn run(self) -> Result<()> {
        let Self {
            runnables,
            shutdown,
        } = self;

        let mut tasks = JoinSet::new();
        for runnable in runnables {
            let token = shutdown.child_token();
            let name = runnable.name();
            info!(task = name, "starting long-running task");
            tasks.spawn(async move { (name, runnable.run(token).await) });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let failed = match joined {
                Ok((_, Ok(()))) => None,
                Ok((name, Err(err))) => {
                    error!(task = name, error = %err, "long-running task failed");
                    Some(err)
                }
                Err(err) => Some(ConformError::InternalError(format!(
                    "long-running task panicked: {err}"
                ))),
            };

            if let Some(err) = failed
                && first_error.is_none()
            {
                first_error = Some(err);
                shutdown.cancel();
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct WaitsForShutdown {
        finished: AtomicBool,
    }

    #[async_trait]
    impl Runnable for WaitsForShutdown {
        fn name(&self) -> &'static str {
            "waits-for-shutdown"
        }

        async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
            shutdown.cancelled().await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailsImmediately;

    #[async_trait]
    impl Runnable for FailsImmediately {
        fn name(&self) -> &'static str {
            "fails-immediately"
        }

        async fn run(self: Arc<Self>, _shutdown: CancellationToken) -> Result<()> {
            Err(ConformError::InternalError("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn cancellation_stops_all_tasks() {
        let task = Arc::new(WaitsForShutdown {
            finished: AtomicBool::new(false),
        });

        let mut manager = Manager::new();
        manager.add(Arc::clone(&task) as Arc<dyn Runnable>);

        let shutdown = manager.shutdown_token();
        shutdown.cancel();

        manager.run().await.expect("clean shutdown");
        assert!(task.finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn task_failure_cancels_the_rest() {
        let task = Arc::new(WaitsForShutdown {
            finished: AtomicBool::new(false),
        });

        let mut manager = Manager::new();
        manager.add(Arc::clone(&task) as Arc<dyn Runnable>);
        manager.add(Arc::new(FailsImmediately));

        let err = manager.run().await.unwrap_err();
        assert!(matches!(err, ConformError::InternalError(_)));
        assert!(task.finished.load(Ordering::SeqCst));
    }
}
