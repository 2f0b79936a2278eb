use std::sync::Arc;

use tokio::task::JoinHandle;

use super::executor::{ProbeExecutor, ProbeMethod, failure_for, probe_target};
use super::pool::WorkerPool;
use super::result::{FailureKind, ProbeResult};
use super::target::ProbeConfig;

const CANCELLED_MESSAGE: &str = "Probe cancelled";

/// Probes one configured target.
///
/// Cheap to clone; clones share the executor and the worker pool. Calls do
/// not touch any state on the service, so they may run concurrently.
#[derive(Debug, Clone)]
pub struct ProbeService {
    config: Arc<ProbeConfig>,
    executor: Arc<ProbeExecutor>,
    pool: WorkerPool,
}

impl ProbeService {
    pub fn new(config: ProbeConfig) -> Self {
        Self::with_parts(config, ProbeExecutor::default(), WorkerPool::default())
    }

    pub fn with_parts(config: ProbeConfig, executor: ProbeExecutor, pool: WorkerPool) -> Self {
        Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
            pool,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Runs the probe on the calling thread.
    pub fn probe(&self, method: ProbeMethod) -> ProbeResult {
        self.executor.execute(&self.config, method)
    }

    /// Runs the probe on the worker pool and waits for it without blocking
    /// the async runtime.
    pub async fn probe_async(&self, method: ProbeMethod) -> ProbeResult {
        offload(
            self.config.clone(),
            self.executor.clone(),
            self.pool.clone(),
            method,
        )
        .await
    }

    /// Starts the probe as its own task. Must be called within a tokio runtime.
    pub fn spawn(&self, method: ProbeMethod) -> ProbeHandle {
        let task = tokio::spawn(offload(
            self.config.clone(),
            self.executor.clone(),
            self.pool.clone(),
            method,
        ));
        ProbeHandle {
            task,
            config: self.config.clone(),
            method,
        }
    }
}

/// A probe started with [`ProbeService::spawn`].
#[derive(Debug)]
pub struct ProbeHandle {
    task: JoinHandle<ProbeResult>,
    config: Arc<ProbeConfig>,
    method: ProbeMethod,
}

impl ProbeHandle {
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn method(&self) -> ProbeMethod {
        self.method
    }

    /// Stops waiting for the probe. A subprocess or socket already in use is
    /// still bounded by its own timeouts.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> ProbeResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                let (host, sent) = probe_target(&self.config, self.method);
                ProbeResult::failed(host, FailureKind::Fault, CANCELLED_MESSAGE, sent)
            }
            Err(e) => failure_for(&self.config, self.method, FailureKind::Fault, &e.to_string()),
        }
    }
}

async fn offload(
    config: Arc<ProbeConfig>,
    executor: Arc<ProbeExecutor>,
    pool: WorkerPool,
    method: ProbeMethod,
) -> ProbeResult {
    let job_config = config.clone();
    let job = match pool
        .submit(move || executor.execute(&job_config, method))
        .await
    {
        Ok(job) => job,
        Err(e) => return failure_for(&config, method, FailureKind::Fault, &e.to_string()),
    };

    // Time spent waiting for a free worker does not count against the bound.
    match tokio::time::timeout(config.watchdog_bound(), job).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            log::error!("Probe worker for {} failed: {e}", config.host());
            failure_for(&config, method, FailureKind::Fault, &e.to_string())
        }
        Err(_) => {
            log::warn!(
                "Probe of {} exceeded {:?}",
                config.host(),
                config.watchdog_bound()
            );
            failure_for(&config, method, FailureKind::Timeout, "")
        }
    }
}
