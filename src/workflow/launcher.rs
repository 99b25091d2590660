//! Worker launcher
//!
//! Each detective or provisioner run is its own tokio task. A worker races
//! its runtime call against the build's cancellation token and reports at
//! most once. Result channels are sized to the number of workers feeding
//! them, and workers only ever `try_send`, so a worker never blocks on a
//! collector that has stopped listening.

use super::error::WorkflowError;
use crate::artifact::{Artifact, DetectiveResult, ProvisionerResult};
use crate::component::{Detective, Provisioner};
use crate::runtime::Runtime;
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What a provisioner worker hands back: the result, or the key of a
/// provisioner that produced nothing
pub type ProvisionerReport = Result<ProvisionerResult, String>;

#[derive(Clone)]
pub struct Launcher {
    runtime: Arc<dyn Runtime>,
    cancel: CancellationToken,
    permits: Option<Arc<Semaphore>>,
}

impl Launcher {
    /// `max_workers` bounds how many workers run at once; `None` starts every
    /// worker immediately
    pub fn new(
        runtime: Arc<dyn Runtime>,
        cancel: CancellationToken,
        max_workers: Option<usize>,
    ) -> Self {
        Self {
            runtime,
            cancel,
            permits: max_workers.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn spawn_detective(
        &self,
        detective: Detective,
        tx: mpsc::Sender<DetectiveResult>,
    ) -> Result<(), WorkflowError> {
        validate_descriptor(&detective.repository, &detective.tag)?;

        let runtime = Arc::clone(&self.runtime);
        let cancel = self.cancel.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let key = detective.key();
            let Some(_permit) = acquire(permits, &cancel).await else {
                return;
            };

            debug!(detective = %key, "Launching detective");
            let artifact = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(detective = %key, "Detective abandoned on cancellation");
                    return;
                }
                outcome = runtime.run_detective(&detective) => absent_on_error(outcome, &key),
            };

            let result = DetectiveResult {
                category: detective.category,
                next: detective.related,
                artifact,
            };
            report(&tx, &cancel, result, &key);
        });

        Ok(())
    }

    pub fn spawn_provisioner(
        &self,
        provisioner: Provisioner,
        input: Artifact,
        tx: mpsc::Sender<ProvisionerReport>,
    ) -> Result<(), WorkflowError> {
        validate_descriptor(&provisioner.repository, &provisioner.tag)?;

        let runtime = Arc::clone(&self.runtime);
        let cancel = self.cancel.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let key = provisioner.key();
            let Some(_permit) = acquire(permits, &cancel).await else {
                return;
            };

            debug!(provisioner = %key, input_bytes = input.len(), "Launching provisioner");
            let artifact = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(provisioner = %key, "Provisioner abandoned on cancellation");
                    return;
                }
                outcome = runtime.run_provisioner(&provisioner, &input) => absent_on_error(outcome, &key),
            };

            let report_value = match artifact {
                Some(artifact) => Ok(ProvisionerResult {
                    category: provisioner.category.clone(),
                    provisioner,
                    artifact,
                }),
                None => Err(key.clone()),
            };
            report(&tx, &cancel, report_value, &key);
        });

        Ok(())
    }
}

fn validate_descriptor(repository: &str, tag: &str) -> Result<(), WorkflowError> {
    let key = format!("{}:{}", repository, tag);
    if repository.trim().is_empty() {
        return Err(WorkflowError::InvalidDescriptor {
            key,
            reason: "empty repository".to_string(),
        });
    }
    if tag.trim().is_empty() {
        return Err(WorkflowError::InvalidDescriptor {
            key,
            reason: "empty tag".to_string(),
        });
    }
    Ok(())
}

/// `None` when cancelled while waiting for a slot. An unbounded launcher
/// hands out `Some(None)`.
async fn acquire(
    permits: Option<Arc<Semaphore>>,
    cancel: &CancellationToken,
) -> Option<Option<OwnedSemaphorePermit>> {
    let Some(permits) = permits else {
        return Some(None);
    };
    tokio::select! {
        _ = cancel.cancelled() => None,
        permit = permits.acquire_owned() => permit.ok().map(Some),
    }
}

/// Runtime failures are "nothing produced", never a hard error at this layer
fn absent_on_error<E: std::fmt::Display>(
    outcome: Result<Option<Artifact>, E>,
    key: &str,
) -> Option<Artifact> {
    match outcome {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(component = %key, error = %e, "Component run failed, treating as no output");
            None
        }
    }
}

fn report<T>(tx: &mpsc::Sender<T>, cancel: &CancellationToken, value: T, key: &str) {
    if cancel.is_cancelled() {
        return;
    }
    if tx.try_send(value).is_err() {
        debug!(component = %key, "Collector no longer listening, dropping result");
    }
}

/// Receive exactly `expected` messages, racing every wait against `cancel`.
///
/// Collected messages are discarded on cancellation.
pub async fn collect<T>(
    rx: &mut mpsc::Receiver<T>,
    expected: usize,
    cancel: &CancellationToken,
    mut on_message: impl FnMut(T),
) -> Result<(), WorkflowError> {
    for _ in 0..expected {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
            message = rx.recv() => match message {
                Some(message) => on_message(message),
                // Every sender is gone without reporting: workers only do
                // that when the build was cancelled
                None => return Err(WorkflowError::Cancelled),
            },
        }
    }
    Ok(())
}
