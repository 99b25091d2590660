//! Docker-backed runtime
//!
//! Component images advertise themselves through labels:
//!
//! - `com.docker.v2c.component`: `packager`, `detective` or `provisioner`
//! - `com.docker.v2c.component.category`: category of a detective/provisioner
//! - `com.docker.v2c.component.related`: provisioner key a detective feeds
//!
//! Every component container gets the transport volume at `/v2c`. Detectives
//! and provisioners leave their output under `/output`; provisioners find
//! their input under `/input`.
//!
//! Containers are addressed by the name the runtime gives them. Every name is
//! tracked from creation until removal so that containers whose worker was
//! abandoned mid-run can still be reaped by [`Runtime::remove_orphans`].

use super::archive;
use super::{Runtime, RuntimeError};
use crate::artifact::Artifact;
use crate::component::{Category, Components, Detective, Packager, Provisioner};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, RemoveContainerOptions,
    StartContainerOptions, UploadToContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::ListImagesOptions;
use bollard::service::HostConfig;
use bollard::volume::{CreateVolumeOptions, RemoveVolumeOptions};
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const COMPONENT_LABEL: &str = "com.docker.v2c.component";
const CATEGORY_LABEL: &str = "com.docker.v2c.component.category";
const RELATED_LABEL: &str = "com.docker.v2c.component.related";

const TRANSPORT_MOUNT: &str = "/v2c";
const DEVICE_MOUNT: &str = "/v2c-device";
const OUTPUT_DIR: &str = "output";
const INPUT_DIR: &str = "input";

pub struct DockerRuntime {
    docker: Docker,
    volume: String,
    containers: ContainerLedger,
}

/// Names of containers created and not yet removed
#[derive(Debug, Default)]
struct ContainerLedger {
    live: Mutex<HashSet<String>>,
}

impl ContainerLedger {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, name: &str) {
        self.lock().insert(name.to_string());
    }

    fn untrack(&self, name: &str) {
        self.lock().remove(name);
    }

    fn drain(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().drain().collect();
        names.sort();
        names
    }
}

impl DockerRuntime {
    /// Connect to the local Docker daemon
    pub fn connect(volume: impl Into<String>, timeout: Duration) -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()?.with_timeout(timeout);
        Ok(Self {
            docker,
            volume: volume.into(),
            containers: ContainerLedger::default(),
        })
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    async fn list_components(&self, kind: &str) -> Result<Vec<ComponentImage>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("{}={}", COMPONENT_LABEL, kind)],
        );

        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                filters,
                ..Default::default()
            }))
            .await?;

        let mut components = Vec::new();
        for image in images {
            // Untagged images cannot be addressed by key
            let Some(reference) = image.repo_tags.iter().find(|t| t.as_str() != "<none>:<none>")
            else {
                debug!(image = %image.id, kind, "Skipping untagged component image");
                continue;
            };
            let (repository, tag) = split_reference(reference)?;
            components.push(ComponentImage {
                repository,
                tag,
                labels: image.labels,
            });
        }
        Ok(components)
    }

    fn transport_bind(&self, read_only: bool) -> String {
        if read_only {
            format!("{}:{}:ro", self.volume, TRANSPORT_MOUNT)
        } else {
            format!("{}:{}", self.volume, TRANSPORT_MOUNT)
        }
    }

    async fn create(
        &self,
        role: &str,
        image: String,
        binds: Vec<String>,
        env: Vec<String>,
    ) -> Result<String, RuntimeError> {
        let name = format!("v2c-{}-{}", role, uuid::Uuid::new_v4());
        let config = Config {
            image: Some(image),
            env: Some(env),
            host_config: Some(HostConfig {
                binds: Some(binds),
                ..Default::default()
            }),
            ..Default::default()
        };

        // Tracked before the request so a create abandoned in flight is still reaped
        self.containers.track(&name);
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await;
        match created {
            Ok(created) => {
                debug!(container = %created.id, name = %name, "Created component container");
                Ok(name)
            }
            Err(e) => {
                self.containers.untrack(&name);
                Err(e.into())
            }
        }
    }

    /// Start a created container and wait for it to exit; returns the exit status
    async fn start_and_wait(&self, container: &str) -> Result<i64, RuntimeError> {
        self.docker
            .start_container(container, None::<StartContainerOptions<String>>)
            .await?;

        let mut wait = self
            .docker
            .wait_container(container, None::<WaitContainerOptions<String>>);

        let mut status = 0;
        while let Some(response) = wait.next().await {
            match response {
                Ok(r) => status = r.status_code,
                Err(BollardError::DockerContainerWaitError { code, .. }) => status = code,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(status)
    }

    async fn download_output(&self, container: &str) -> Result<Artifact, RuntimeError> {
        let mut stream = self.docker.download_from_container(
            container,
            Some(DownloadFromContainerOptions {
                path: format!("/{}", OUTPUT_DIR),
            }),
        );

        let mut raw = Vec::new();
        while let Some(chunk) = stream.next().await {
            raw.extend_from_slice(&chunk?);
        }

        let rooted = archive::reroot(&raw, OUTPUT_DIR, "")?;
        Ok(Artifact::new(rooted))
    }

    async fn force_remove(&self, container: &str) {
        if let Err(e) = self.remove_container(container).await {
            warn!(container, error = %e, "Unable to remove component container");
        }
    }

    /// Run a worker container to completion and collect its output.
    /// A non-zero exit means the worker had nothing to report.
    async fn run_worker(&self, container: &str, key: &str) -> Result<Option<Artifact>, RuntimeError> {
        let status = self.start_and_wait(container).await?;
        if status != 0 {
            debug!(component = key, status, "Component produced no output");
            return Ok(None);
        }
        self.download_output(container).await.map(Some)
    }
}

struct ComponentImage {
    repository: String,
    tag: String,
    labels: HashMap<String, String>,
}

impl ComponentImage {
    fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    fn label(&self, name: &str) -> Result<String, RuntimeError> {
        self.labels
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| RuntimeError::InvalidComponent {
                image: self.reference(),
                reason: format!("missing label {}", name),
            })
    }
}

/// Split `registry:5000/repo:tag` on the last colon that follows the last slash
fn split_reference(reference: &str) -> Result<(String, String), RuntimeError> {
    let slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[slash..].rfind(':') {
        Some(i) => {
            let colon = slash + i;
            Ok((
                reference[..colon].to_string(),
                reference[colon + 1..].to_string(),
            ))
        }
        None => Err(RuntimeError::InvalidComponent {
            image: reference.to_string(),
            reason: "image reference has no tag".to_string(),
        }),
    }
}

#[async_trait]
impl Runtime for DockerRuntime {
    async fn detect_components(&self) -> Result<Components, RuntimeError> {
        let packagers = self
            .list_components("packager")
            .await?
            .into_iter()
            .map(|c| Packager::new(c.repository, c.tag))
            .collect::<Vec<_>>();

        let mut detectives = Vec::new();
        for image in self.list_components("detective").await? {
            let category = image.label(CATEGORY_LABEL)?;
            let related = image.label(RELATED_LABEL)?;
            detectives.push(Detective::new(
                image.repository,
                image.tag,
                Category::new(category),
                related,
            ));
        }

        let mut provisioners = Vec::new();
        for image in self.list_components("provisioner").await? {
            let category = image.label(CATEGORY_LABEL)?;
            provisioners.push(Provisioner::new(
                image.repository,
                image.tag,
                Category::new(category),
            ));
        }

        info!(
            packagers = packagers.len(),
            detectives = detectives.len(),
            provisioners = provisioners.len(),
            "Discovered components"
        );

        Ok(Components {
            packagers,
            detectives,
            provisioners,
        })
    }

    async fn transport_volume_exists(&self) -> Result<bool, RuntimeError> {
        match self.docker.inspect_volume(&self.volume).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_transport_volume(&self) -> Result<(), RuntimeError> {
        self.docker
            .create_volume(CreateVolumeOptions {
                name: self.volume.as_str(),
                ..Default::default()
            })
            .await?;
        debug!(volume = %self.volume, "Created transport volume");
        Ok(())
    }

    async fn remove_transport_volume(&self) -> Result<(), RuntimeError> {
        self.docker
            .remove_volume(&self.volume, Some(RemoveVolumeOptions { force: true }))
            .await?;
        debug!(volume = %self.volume, "Removed transport volume");
        Ok(())
    }

    async fn launch_packager(
        &self,
        packager: &Packager,
        target: &str,
        device: &str,
    ) -> Result<String, RuntimeError> {
        let container = self
            .create(
                "packager",
                packager.key(),
                vec![
                    self.transport_bind(false),
                    format!("{}:{}:ro", device, DEVICE_MOUNT),
                ],
                vec![
                    format!("V2C_TARGET={}", target),
                    format!("V2C_DEVICE={}", DEVICE_MOUNT),
                ],
            )
            .await?;

        let status = self.start_and_wait(&container).await?;
        if status != 0 {
            self.force_remove(&container).await;
            return Err(RuntimeError::ContainerFailed { container, status });
        }
        info!(packager = %packager.key(), "Unpacked source image into transport volume");
        Ok(container)
    }

    async fn remove_container(&self, container: &str) -> Result<(), RuntimeError> {
        let removed = self
            .docker
            .remove_container(
                container,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await;
        match removed {
            Ok(()) => {}
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => debug!(container, "Container already gone"),
            Err(e) => return Err(e.into()),
        }
        self.containers.untrack(container);
        Ok(())
    }

    async fn remove_orphans(&self) -> Result<usize, RuntimeError> {
        let mut removed = 0;
        let mut first_error = None;
        for container in self.containers.drain() {
            match self.remove_container(&container).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(container = %container, error = %e, "Unable to remove orphaned container");
                    first_error.get_or_insert(e);
                }
            }
        }
        if removed > 0 {
            info!(removed, "Removed orphaned component containers");
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    async fn run_detective(&self, detective: &Detective) -> Result<Option<Artifact>, RuntimeError> {
        let key = detective.key();
        let container = self
            .create("detective", key.clone(), vec![self.transport_bind(true)], Vec::new())
            .await?;

        let outcome = self.run_worker(&container, &key).await;
        self.force_remove(&container).await;
        outcome
    }

    async fn run_provisioner(
        &self,
        provisioner: &Provisioner,
        input: &Artifact,
    ) -> Result<Option<Artifact>, RuntimeError> {
        let key = provisioner.key();
        let container = self
            .create(
                "provisioner",
                key.clone(),
                vec![self.transport_bind(true)],
                vec![format!("V2C_CATEGORY={}", provisioner.category)],
            )
            .await?;

        let upload = async {
            let staged = archive::reroot(input.bytes(), "", INPUT_DIR)?;
            self.docker
                .upload_to_container(
                    &container,
                    Some(UploadToContainerOptions {
                        path: "/",
                        ..Default::default()
                    }),
                    Bytes::from(staged),
                )
                .await?;
            Ok::<(), RuntimeError>(())
        };

        let outcome = match upload.await {
            Ok(()) => self.run_worker(&container, &key).await,
            Err(e) => Err(e),
        };
        self.force_remove(&container).await;
        outcome
    }
}
