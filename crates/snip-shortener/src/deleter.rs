//! Background application of soft deletes.
//!
//! Handlers hand [`DeleteRequest`]s to a [`DeleteSubmitter`], which feeds a
//! bounded queue drained by a fixed set of workers. The first storage error
//! in any worker stops every worker and is reported once through
//! [`DeletionPool::failure`]; the owner is expected to shut down on it.
//!
//! Requests still buffered when the pool stops are dropped.

use snip_core::{DeleteRequest, Deleter, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

/// Sizing of a [`DeletionPool`].
///
/// ```rust
/// use snip_shortener::PoolSettings;
///
/// let settings = PoolSettings::builder().workers(2).build();
/// assert_eq!(settings.queue_capacity, 1000);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct PoolSettings {
    /// Number of concurrent worker tasks.
    #[builder(default = 4)]
    pub workers: usize,

    /// Requests buffered before `submit` starts waiting.
    #[builder(default = 1000)]
    pub queue_capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Why the pool stopped on its own.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("soft delete failed: {0}")]
    Storage(#[from] StorageError),
    #[error("delete worker panicked: {0}")]
    WorkerPanicked(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("deletion pool is not accepting requests")]
    Closed,
}

/// Cloneable handle that enqueues delete requests.
#[derive(Debug, Clone)]
pub struct DeleteSubmitter {
    sender: mpsc::Sender<DeleteRequest>,
}

impl DeleteSubmitter {
    /// Enqueues `request`, waiting while the queue is full.
    ///
    /// Fails once every worker has exited.
    pub async fn submit(&self, request: DeleteRequest) -> Result<(), SubmitError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| SubmitError::Closed)
    }
}

pub struct DeletionPool {
    sender: mpsc::Sender<DeleteRequest>,
    cancel: CancellationToken,
    failure: Option<oneshot::Receiver<PoolError>>,
    supervisor: JoinHandle<()>,
}

impl DeletionPool {
    /// Starts the workers.
    ///
    /// The pool runs until `shutdown` is cancelled, [`DeletionPool::shutdown`]
    /// is called, or a worker fails.
    pub fn spawn<D: Deleter>(
        deleter: Arc<D>,
        settings: PoolSettings,
        shutdown: &CancellationToken,
    ) -> Self {
        let cancel = shutdown.child_token();
        let workers = settings.workers.max(1);
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let mut set = JoinSet::new();
        for worker in 0..workers {
            set.spawn(run_worker(
                worker,
                Arc::clone(&deleter),
                Arc::clone(&receiver),
                cancel.clone(),
            ));
        }
        // Only workers keep the receiver alive, so the queue closes when they exit.
        drop(receiver);

        let (failure_tx, failure_rx) = oneshot::channel();
        let supervisor = tokio::spawn(supervise(set, cancel.clone(), failure_tx));

        info!(
            workers,
            queue_capacity = settings.queue_capacity,
            "deletion pool started"
        );

        Self {
            sender,
            cancel,
            failure: Some(failure_rx),
            supervisor,
        }
    }

    pub fn submitter(&self) -> DeleteSubmitter {
        DeleteSubmitter {
            sender: self.sender.clone(),
        }
    }

    /// Resolves with the error that stopped the pool, or `None` when it
    /// stopped cleanly. The error is handed out once.
    ///
    /// Cancel safe.
    pub async fn failure(&mut self) -> Option<PoolError> {
        let receiver = self.failure.as_mut()?;
        let outcome = receiver.await.ok();
        self.failure = None;
        outcome
    }

    /// Stops the workers without draining the queue and waits for them.
    ///
    /// Returns the pool's failure if it had one that was not yet collected.
    pub async fn shutdown(mut self) -> Option<PoolError> {
        self.cancel.cancel();
        if let Err(err) = (&mut self.supervisor).await {
            warn!(error = %err, "deletion pool supervisor did not finish cleanly");
        }
        self.failure.take().and_then(|mut rx| rx.try_recv().ok())
    }
}

async fn run_worker<D: Deleter>(
    worker: usize,
    deleter: Arc<D>,
    receiver: Arc<Mutex<mpsc::Receiver<DeleteRequest>>>,
    cancel: CancellationToken,
) -> Result<(), StorageError> {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = async { receiver.lock().await.recv().await } => next,
        };
        let Some(request) = next else { break };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = deleter.soft_delete_one(&request) => result?,
        }
        debug!(
            worker,
            short_code = %request.short_code,
            owner = %request.owner,
            "soft delete applied"
        );
    }

    debug!(worker, "delete worker stopped");
    Ok(())
}

/// Waits for every worker, cancelling the rest on the first failure.
async fn supervise(
    mut set: JoinSet<Result<(), StorageError>>,
    cancel: CancellationToken,
    failure_tx: oneshot::Sender<PoolError>,
) {
    let mut first_failure = None;

    while let Some(joined) = set.join_next().await {
        let failure = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => PoolError::Storage(err),
            Err(err) => PoolError::WorkerPanicked(err.to_string()),
        };

        if first_failure.is_none() {
            error!(error = %failure, "delete worker failed, stopping deletion pool");
            cancel.cancel();
            first_failure = Some(failure);
        } else {
            warn!(error = %failure, "additional delete worker failure");
        }
    }

    match first_failure {
        Some(failure) => {
            let _ = failure_tx.send(failure);
        }
        None => info!("deletion pool stopped"),
    }
}
