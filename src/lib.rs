//! v2c - convert virtual machine disk images into container images
//!
//! A conversion is driven by three kinds of component images installed on
//! the Docker host:
//!
//! - **Packagers** unpack the source disk image into a shared transport volume
//! - **Detectives** inspect the unpacked image; each one that recognizes
//!   something emits an artifact and names the provisioner that consumes it
//! - **Provisioners** turn a detective's artifact into a build context
//!   fragment for one category (os, application, config, init)
//!
//! The [`workflow`] module fans detectives and provisioners out, collects
//! their results, and assembles the fragments into a build context in a
//! fixed stage order.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use v2c::{BuildRequest, DockerRuntime, V2cConfig, Workflow, WorkflowOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = V2cConfig::from_env()?;
//! let runtime = DockerRuntime::connect(&config.transport_volume, config.docker_timeout())?;
//! let workflow = Workflow::new(Arc::new(runtime), WorkflowOptions::from(&config));
//!
//! let request = BuildRequest {
//!     target: "acme/legacy:1.0".to_string(),
//!     device: "/images/legacy.vmdk".to_string(),
//!     no_clean: false,
//!     one_by_one: false,
//! };
//! let dir = workflow
//!     .build(CancellationToken::new(), Path::new("/tmp/ctx"), &request)
//!     .await?;
//! println!("Build context in {}", dir);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`component`]: component catalog types
//! - [`artifact`]: detective and provisioner results
//! - [`runtime`]: container runtime seam, Docker and in-memory implementations
//! - [`workflow`]: orchestration, matching, aggregation and assembly
//! - [`context`]: build context sinks

pub mod artifact;
pub mod cli;
pub mod component;
pub mod config;
pub mod context;
pub mod progress;
pub mod runtime;
pub mod util;
pub mod workflow;

pub use artifact::{Artifact, Detection, DetectiveResult, ProvisionerResult};
pub use component::{Category, Components, Detective, Packager, Provisioner};
pub use config::{ConfigError, V2cConfig};
pub use context::{BuildContext, ContextError, DirectoryContext, ProductMetadata};
pub use progress::{LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
pub use runtime::{DockerRuntime, MockOutcome, MockRuntime, Runtime, RuntimeError};
pub use util::{init_from_config, init_logging, LoggingConfig};
pub use workflow::{
    AssemblyStage, BuildRequest, ExecutionMode, Workflow, WorkflowError, WorkflowOptions,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
