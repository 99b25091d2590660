//! Image conversion workflow
//!
//! A build discovers the installed components, prepares the transport
//! volume, runs every detective, hands each detection to its provisioner,
//! groups the provisioned fragments by category and assembles them into the
//! build context in a fixed order.

pub mod aggregate;
pub mod assemble;
pub mod detective;
pub mod error;
pub mod launcher;
pub mod matcher;
pub mod provisioner;
pub mod session;

pub use aggregate::{persist, Bucket, PersistedResults, ResultSet};
pub use assemble::AssemblyStage;
pub use error::WorkflowError;
pub use launcher::Launcher;
pub use session::BuildSession;

use crate::component::Category;
use crate::config::V2cConfig;
use crate::context::{BuildContext, DirectoryContext, ProductMetadata};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::runtime::Runtime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How detectives and provisioners are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Start every worker of a stage at once, then collect
    Concurrent,
    /// Start one worker and wait for it before starting the next
    Sequential,
}

impl ExecutionMode {
    pub fn from_one_by_one(one_by_one: bool) -> Self {
        if one_by_one {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Concurrent
        }
    }
}

/// Parameters of a single build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Output image repository and tag
    pub target: String,
    /// Source VM disk image or device
    pub device: String,
    /// Keep the transport volume after the build
    pub no_clean: bool,
    pub one_by_one: bool,
}

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub max_workers: Option<usize>,
    pub product_name: String,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            max_workers: None,
            product_name: "v2c".to_string(),
        }
    }
}

impl From<&V2cConfig> for WorkflowOptions {
    fn from(config: &V2cConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            product_name: config.product_name.clone(),
        }
    }
}

pub struct Workflow {
    runtime: Arc<dyn Runtime>,
    options: WorkflowOptions,
    progress: Arc<dyn ProgressHandler>,
}

impl Workflow {
    pub fn new(runtime: Arc<dyn Runtime>, options: WorkflowOptions) -> Self {
        Self {
            runtime,
            options,
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    /// Convert `request.device` into a build context inside `working_dir`.
    ///
    /// `working_dir` must be empty. On success the accumulated Dockerfile and
    /// the unpacked files are left there and the directory path is returned.
    pub async fn build(
        &self,
        cancel: CancellationToken,
        working_dir: &Path,
        request: &BuildRequest,
    ) -> Result<String, WorkflowError> {
        ensure_empty(working_dir)?;

        let mut context = DirectoryContext::new(working_dir);
        self.build_into(cancel, request, &mut context).await?;
        context.finish()?;
        Ok(working_dir.display().to_string())
    }

    /// Run the whole pipeline against a caller-supplied build context
    pub async fn build_into(
        &self,
        cancel: CancellationToken,
        request: &BuildRequest,
        context: &mut dyn BuildContext,
    ) -> Result<(), WorkflowError> {
        let start = Instant::now();
        self.progress.on_progress(&ProgressEvent::Started {
            target: request.target.clone(),
            device: request.device.clone(),
        });

        let mut session = BuildSession::new(Arc::clone(&self.runtime), request.no_clean);
        let outcome = self.run(&cancel, request, &mut session, context).await;
        session.cleanup().await;

        match &outcome {
            Ok(()) => {
                info!(image = %request.target, "Build context assembled");
                self.progress.on_progress(&ProgressEvent::Completed {
                    duration: start.elapsed(),
                });
            }
            Err(e) => self.progress.on_progress(&ProgressEvent::Failed {
                error: e.to_string(),
            }),
        }
        outcome
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        request: &BuildRequest,
        session: &mut BuildSession,
        context: &mut dyn BuildContext,
    ) -> Result<(), WorkflowError> {
        let components = self.runtime.detect_components().await?;
        if components.packagers.is_empty() {
            return Err(WorkflowError::NoPackagers);
        }

        // Unpacking can take minutes; the session still owns the volume if this is cut short
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
            prepared = session.prepare(&components, &request.target, &request.device) => prepared?,
        }
        self.progress.on_progress(&ProgressEvent::TransportVolumeReady {
            reused: session.reused_volume(),
        });

        let mode = ExecutionMode::from_one_by_one(request.one_by_one);
        let launcher = Launcher::new(
            Arc::clone(&self.runtime),
            cancel.clone(),
            self.options.max_workers,
        );

        let detections = detective::run(&launcher, &components.detectives, mode).await?;
        session.release_packager().await?;
        self.progress.on_progress(&ProgressEvent::DetectionComplete {
            detected: detections.len(),
            total: components.detectives.len(),
        });

        if detections.is_empty() {
            return Err(WorkflowError::NoComponentsDetected);
        }

        let results =
            provisioner::run(&launcher, &components.provisioners, detections, mode).await?;
        self.progress.on_progress(&ProgressEvent::ProvisioningComplete {
            results: results.len(),
        });

        let persisted = persist(results);
        for category in persisted.categories() {
            if !is_assembled(category) {
                warn!(%category, "Category has no assembly stage, its results are ignored");
            }
        }

        let metadata = ProductMetadata::new(&self.options.product_name, &request.target);
        assemble::assemble(&persisted, &metadata, context, self.progress.as_ref())
    }
}

fn is_assembled(category: &Category) -> bool {
    AssemblyStage::ORDER
        .iter()
        .any(|stage| stage.category() == Some(category.as_str()))
}

/// The build context is written into the working directory, which must start empty
pub fn ensure_empty(dir: &Path) -> Result<(), WorkflowError> {
    let mut entries = std::fs::read_dir(dir).map_err(WorkflowError::WorkingDirectoryUnreadable)?;
    match entries.next() {
        None => Ok(()),
        Some(Ok(_)) => Err(WorkflowError::WorkingDirectoryNotEmpty(PathBuf::from(dir))),
        Some(Err(e)) => Err(WorkflowError::WorkingDirectoryUnreadable(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_execution_mode_from_flag() {
        assert_eq!(ExecutionMode::from_one_by_one(true), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::from_one_by_one(false), ExecutionMode::Concurrent);
    }

    #[test]
    fn test_ensure_empty() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_empty(dir.path()).is_ok());

        std::fs::write(dir.path().join("leftover"), "x").unwrap();
        assert!(matches!(
            ensure_empty(dir.path()),
            Err(WorkflowError::WorkingDirectoryNotEmpty(_))
        ));

        assert!(matches!(
            ensure_empty(&dir.path().join("missing")),
            Err(WorkflowError::WorkingDirectoryUnreadable(_))
        ));
    }

    #[test]
    fn test_only_fixed_categories_are_assembled() {
        assert!(is_assembled(&Category::from("os")));
        assert!(is_assembled(&Category::from("init")));
        assert!(!is_assembled(&Category::from("tooling")));
    }

    #[test]
    fn test_options_from_config() {
        let config = V2cConfig {
            max_workers: Some(4),
            product_name: "acme".to_string(),
            ..V2cConfig::default()
        };
        let options = WorkflowOptions::from(&config);
        assert_eq!(options.max_workers, Some(4));
        assert_eq!(options.product_name, "acme");
    }
}
