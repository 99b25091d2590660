//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a build runs
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Build started
    Started { target: String, device: String },

    /// Transport volume created and populated, or left over from a previous run
    TransportVolumeReady { reused: bool },

    /// All detectives reported
    DetectionComplete { detected: usize, total: usize },

    /// All provisioners reported
    ProvisioningComplete { results: usize },

    /// An assembly stage changed the build context
    StageApplied { stage: String },

    /// Build context fully assembled
    Completed { duration: Duration },

    /// Build failed
    Failed { error: String },
}

/// Trait for handling progress events during a build
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
