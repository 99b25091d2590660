use super::assemble::AssemblyStage;
use crate::context::ContextError;
use crate::runtime::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal errors of a build run
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Unable to determine if the current working directory is empty: {0}")]
    WorkingDirectoryUnreadable(#[source] std::io::Error),

    #[error("The current working directory is not empty: {}", .0.display())]
    WorkingDirectoryNotEmpty(PathBuf),

    #[error("no installed packagers")]
    NoPackagers,

    #[error("Task cancelled or late.")]
    Cancelled,

    #[error("No components were detected.")]
    NoComponentsDetected,

    #[error("No installed provisioner matches {next}")]
    NoMatchingProvisioner { next: String },

    #[error("Invalid component descriptor {key}: {reason}")]
    InvalidDescriptor { key: String, reason: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("{stage} stage failed: {source}")]
    Assembly {
        stage: AssemblyStage,
        #[source]
        source: ContextError,
    },

    #[error("Failed to write build context: {0}")]
    Context(#[from] ContextError),
}

impl WorkflowError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkflowError::Cancelled)
    }
}
