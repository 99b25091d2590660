//! Container runtime collaborator
//!
//! The workflow never talks to Docker directly. Everything it needs from the
//! host (catalog discovery, the transport volume, running component
//! containers) goes through the [`Runtime`] trait so the orchestration can be
//! exercised against [`MockRuntime`].

pub mod archive;
pub mod docker;
pub mod mock;

pub use docker::DockerRuntime;
pub use mock::{MockOutcome, MockRuntime};

use crate::artifact::Artifact;
use crate::component::{Components, Detective, Packager, Provisioner};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Container {container} exited with status {status}")]
    ContainerFailed { container: String, status: i64 },

    #[error("Invalid component image {image}: {reason}")]
    InvalidComponent { image: String, reason: String },

    #[error("Archive error: {0}")]
    Archive(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Runtime: Send + Sync {
    /// List the packagers, detectives and provisioners installed on the host
    async fn detect_components(&self) -> Result<Components, RuntimeError>;

    async fn transport_volume_exists(&self) -> Result<bool, RuntimeError>;

    async fn create_transport_volume(&self) -> Result<(), RuntimeError>;

    async fn remove_transport_volume(&self) -> Result<(), RuntimeError>;

    /// Unpack `device` into the transport volume; returns the packager's container name
    async fn launch_packager(
        &self,
        packager: &Packager,
        target: &str,
        device: &str,
    ) -> Result<String, RuntimeError>;

    async fn remove_container(&self, container: &str) -> Result<(), RuntimeError>;

    /// Force-remove every container this runtime created and has not removed
    /// yet, e.g. workers abandoned on cancellation. Returns how many were removed.
    async fn remove_orphans(&self) -> Result<usize, RuntimeError>;

    /// Run a detective to completion. `Ok(None)` means nothing was detected.
    async fn run_detective(&self, detective: &Detective) -> Result<Option<Artifact>, RuntimeError>;

    /// Run a provisioner over a detective's artifact
    async fn run_provisioner(
        &self,
        provisioner: &Provisioner,
        input: &Artifact,
    ) -> Result<Option<Artifact>, RuntimeError>;
}
