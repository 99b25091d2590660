//! Per-build ownership of the transport volume and packager container

use super::error::WorkflowError;
use crate::component::Components;
use crate::runtime::Runtime;
use std::sync::Arc;
use tracing::{info, warn};

pub struct BuildSession {
    runtime: Arc<dyn Runtime>,
    no_clean: bool,
    volume_ready: bool,
    reused_volume: bool,
    packager_container: Option<String>,
}

impl BuildSession {
    pub fn new(runtime: Arc<dyn Runtime>, no_clean: bool) -> Self {
        Self {
            runtime,
            no_clean,
            volume_ready: false,
            reused_volume: false,
            packager_container: None,
        }
    }

    pub fn reused_volume(&self) -> bool {
        self.reused_volume
    }

    /// Make the transport volume available, unpacking the source image into it
    /// unless a previous run left it behind
    pub async fn prepare(
        &mut self,
        components: &Components,
        target: &str,
        device: &str,
    ) -> Result<(), WorkflowError> {
        if self.runtime.transport_volume_exists().await? {
            info!("Using existing unpacked image.");
            self.volume_ready = true;
            self.reused_volume = true;
            return Ok(());
        }

        self.runtime.create_transport_volume().await?;
        self.volume_ready = true;

        let packager = components
            .choose_packager()
            .ok_or(WorkflowError::NoPackagers)?;
        info!(packager = %packager.key(), device, "Unpacking source image");
        let container = self.runtime.launch_packager(packager, target, device).await?;
        self.packager_container = Some(container);
        Ok(())
    }

    /// Remove the packager once detection no longer needs it
    pub async fn release_packager(&mut self) -> Result<(), WorkflowError> {
        if let Some(container) = self.packager_container.take() {
            self.runtime.remove_container(&container).await?;
        }
        Ok(())
    }

    /// Deferred teardown; failures are logged, never returned
    pub async fn cleanup(mut self) {
        if let Some(container) = self.packager_container.take() {
            if let Err(e) = self.runtime.remove_container(&container).await {
                warn!(container = %container, error = %e, "Unable to remove the packager container");
            }
        }

        if !self.volume_ready {
            return;
        }
        // Abandoned workers still mount the volume and would block its removal
        if let Err(e) = self.runtime.remove_orphans().await {
            warn!(error = %e, "Unable to remove orphaned component containers");
        }
        if self.no_clean {
            info!("The transport volume remains intact.");
            return;
        }
        if let Err(e) = self.runtime.remove_transport_volume().await {
            warn!(error = %e, "Unable to remove the transport volume");
        }
    }
}
