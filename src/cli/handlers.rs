//! Command handlers; each returns the process exit code

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::commands::{BuildArgs, ComponentsArgs};
use crate::cli::output::OutputFormatter;
use crate::config::{ConfigError, V2cConfig};
use crate::progress::LoggingHandler;
use crate::runtime::{DockerRuntime, Runtime};
use crate::workflow::{BuildRequest, Workflow, WorkflowError, WorkflowOptions};

/// Exit code used when the build is interrupted
const EXIT_CANCELLED: i32 = 130;

pub async fn handle_build(args: &BuildArgs, quiet: bool) -> i32 {
    let config = match build_config(args) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("\nPlease check your environment variables and command-line arguments.");
            return 1;
        }
    };

    let working_dir = match working_dir(args) {
        Ok(dir) => dir,
        Err(e) => {
            error!("Unable to resolve the working directory: {}", e);
            return 1;
        }
    };
    debug!("Working directory: {}", working_dir.display());

    let runtime = match DockerRuntime::connect(&config.transport_volume, config.docker_timeout()) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to connect to Docker: {}", e);
            return 1;
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_watcher(cancel.clone());

    let workflow = Workflow::new(Arc::new(runtime), WorkflowOptions::from(&config))
        .with_progress(Arc::new(LoggingHandler));
    let request = BuildRequest {
        target: args.target.clone(),
        device: args.device.clone(),
        no_clean: args.no_clean,
        one_by_one: args.one_by_one,
    };

    let outcome = workflow.build(cancel, &working_dir, &request).await;
    interrupt.abort();

    match outcome {
        Ok(path) => {
            if !quiet {
                println!("Build context for {} written to {}", request.target, path);
            }
            0
        }
        Err(e) => {
            error!("Build failed: {}", e);
            exit_code(&e)
        }
    }
}

pub async fn handle_components(args: &ComponentsArgs) -> i32 {
    let config = match V2cConfig::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return 1;
        }
    };

    let runtime = match DockerRuntime::connect(&config.transport_volume, config.docker_timeout()) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to connect to Docker: {}", e);
            return 1;
        }
    };

    let components = match runtime.detect_components().await {
        Ok(components) => components,
        Err(e) => {
            error!("Failed to list components: {}", e);
            return 1;
        }
    };

    match OutputFormatter::new(args.format.into()).format(&components) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            error!("Failed to format output: {}", e);
            1
        }
    }
}

/// Environment configuration with command-line overrides applied
fn build_config(args: &BuildArgs) -> Result<V2cConfig, ConfigError> {
    let env_config = V2cConfig::from_env()?;
    let config = V2cConfig {
        max_workers: args.max_workers.or(env_config.max_workers),
        ..env_config
    };
    if args.max_workers.is_some() {
        debug!("Max workers overridden to: {:?}", config.max_workers);
    }
    config.validate()?;
    Ok(config)
}

fn working_dir(args: &BuildArgs) -> std::io::Result<PathBuf> {
    match &args.directory {
        Some(dir) => Ok(dir.clone()),
        None => env::current_dir(),
    }
}

/// First Ctrl-C cancels the build; cleanup still runs before exit
fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling build");
                cancel.cancel();
            }
            Err(e) => info!("Interrupt handling unavailable: {}", e),
        }
    })
}

fn exit_code(error: &WorkflowError) -> i32 {
    if error.is_cancelled() {
        EXIT_CANCELLED
    } else {
        1
    }
}
