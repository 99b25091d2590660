//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { target, device } => {
                info!(image = %target, device = %device, "Starting build");
            }
            ProgressEvent::TransportVolumeReady { reused } => {
                debug!(reused, "Transport volume ready");
            }
            ProgressEvent::DetectionComplete { detected, total } => {
                info!(
                    detected,
                    detectives = total,
                    "Detection complete"
                );
            }
            ProgressEvent::ProvisioningComplete { results } => {
                info!(results, "Provisioning complete");
            }
            ProgressEvent::StageApplied { stage } => {
                info!(stage = %stage, "Applied assembly stage");
            }
            ProgressEvent::Completed { duration } => {
                info!(duration_ms = duration.as_millis(), "Build complete");
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Build failed");
            }
        }
    }
}
