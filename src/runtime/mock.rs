use super::{Runtime, RuntimeError};
use crate::artifact::Artifact;
use crate::component::{Components, Detective, Packager, Provisioner};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted result for one detective or provisioner
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Artifact(Artifact),
    Nothing,
    Delayed(Duration, Option<Artifact>),
    /// Never completes; only cancellation gets the worker out
    Hang,
    Fail(String),
}

impl MockOutcome {
    pub fn artifact(payload: impl Into<Vec<u8>>) -> Self {
        MockOutcome::Artifact(Artifact::from(payload.into()))
    }
}

/// In-memory runtime recording every call made by the workflow
pub struct MockRuntime {
    components: Components,
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    volume_exists: AtomicBool,
    fail_volume_create: AtomicBool,
    fail_packager_removal: AtomicBool,
    hang_packager: AtomicBool,
    /// Launched containers whose run never finished, as Docker would keep them
    running: AtomicUsize,
    calls: Mutex<Vec<String>>,
    launches: Mutex<Vec<String>>,
    provisioner_inputs: Mutex<Vec<(String, Artifact)>>,
}

impl MockRuntime {
    pub fn new(components: Components) -> Self {
        Self {
            components,
            outcomes: Mutex::new(HashMap::new()),
            volume_exists: AtomicBool::new(false),
            fail_volume_create: AtomicBool::new(false),
            fail_packager_removal: AtomicBool::new(false),
            hang_packager: AtomicBool::new(false),
            running: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
            provisioner_inputs: Mutex::new(Vec::new()),
        }
    }

    /// Script the outcome for a component identified by `repository:tag`.
    /// Unscripted components produce nothing.
    pub fn with_outcome(self, key: impl Into<String>, outcome: MockOutcome) -> Self {
        self.outcomes.lock().unwrap().insert(key.into(), outcome);
        self
    }

    pub fn with_existing_volume(self) -> Self {
        self.volume_exists.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_failing_volume_create(self) -> Self {
        self.fail_volume_create.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_failing_packager_removal(self) -> Self {
        self.fail_packager_removal.store(true, Ordering::SeqCst);
        self
    }

    /// The packager never finishes unpacking
    pub fn with_hanging_packager(self) -> Self {
        self.hang_packager.store(true, Ordering::SeqCst);
        self
    }

    /// Every runtime call in order, e.g. `create_transport_volume` or `remove_container:packager-0`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Detective and provisioner keys in the order they were launched
    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().unwrap().clone()
    }

    pub fn provisioner_launches(&self) -> Vec<String> {
        let provisioners: Vec<String> = self.components.provisioners.iter().map(|p| p.key()).collect();
        self.launches()
            .into_iter()
            .filter(|k| provisioners.contains(k))
            .collect()
    }

    pub fn provisioner_inputs(&self) -> Vec<(String, Artifact)> {
        self.provisioner_inputs.lock().unwrap().clone()
    }

    pub fn volume_exists(&self) -> bool {
        self.volume_exists.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    async fn play(&self, key: String) -> Result<Option<Artifact>, RuntimeError> {
        self.launches.lock().unwrap().push(key.clone());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(MockOutcome::Nothing);

        // Only decremented when the run completes; a run dropped mid-flight stays counted
        self.running.fetch_add(1, Ordering::SeqCst);
        let result = match outcome {
            MockOutcome::Artifact(a) => Ok(Some(a)),
            MockOutcome::Nothing => Ok(None),
            MockOutcome::Delayed(delay, a) => {
                tokio::time::sleep(delay).await;
                Ok(a)
            }
            MockOutcome::Hang => std::future::pending().await,
            MockOutcome::Fail(message) => Err(RuntimeError::Other(message)),
        };
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl Runtime for MockRuntime {
    async fn detect_components(&self) -> Result<Components, RuntimeError> {
        self.record("detect_components");
        Ok(self.components.clone())
    }

    async fn transport_volume_exists(&self) -> Result<bool, RuntimeError> {
        self.record("transport_volume_exists");
        Ok(self.volume_exists())
    }

    async fn create_transport_volume(&self) -> Result<(), RuntimeError> {
        self.record("create_transport_volume");
        if self.fail_volume_create.load(Ordering::SeqCst) {
            return Err(RuntimeError::Other("volume create failed".to_string()));
        }
        self.volume_exists.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_transport_volume(&self) -> Result<(), RuntimeError> {
        self.record("remove_transport_volume");
        self.volume_exists.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn launch_packager(
        &self,
        packager: &Packager,
        _target: &str,
        _device: &str,
    ) -> Result<String, RuntimeError> {
        self.record(format!("launch_packager:{}", packager.key()));
        if self.hang_packager.load(Ordering::SeqCst) {
            self.running.fetch_add(1, Ordering::SeqCst);
            return std::future::pending().await;
        }
        Ok("packager-0".to_string())
    }

    async fn remove_container(&self, container: &str) -> Result<(), RuntimeError> {
        self.record(format!("remove_container:{}", container));
        if self.fail_packager_removal.load(Ordering::SeqCst) {
            return Err(RuntimeError::Other("container removal failed".to_string()));
        }
        Ok(())
    }

    async fn remove_orphans(&self) -> Result<usize, RuntimeError> {
        self.record("remove_orphans");
        Ok(self.running.swap(0, Ordering::SeqCst))
    }

    async fn run_detective(&self, detective: &Detective) -> Result<Option<Artifact>, RuntimeError> {
        self.play(detective.key()).await
    }

    async fn run_provisioner(
        &self,
        provisioner: &Provisioner,
        input: &Artifact,
    ) -> Result<Option<Artifact>, RuntimeError> {
        self.provisioner_inputs
            .lock()
            .unwrap()
            .push((provisioner.key(), input.clone()));
        self.play(provisioner.key()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_component_detects_nothing() {
        let runtime = MockRuntime::new(Components::default());
        let detective = Detective::new("d", "1", "os", "p:1");
        assert!(runtime.run_detective(&detective).await.unwrap().is_none());
        assert_eq!(runtime.launches(), vec!["d:1"]);
    }

    #[tokio::test]
    async fn test_volume_lifecycle_is_recorded() {
        let runtime = MockRuntime::new(Components::default());
        assert!(!runtime.transport_volume_exists().await.unwrap());
        runtime.create_transport_volume().await.unwrap();
        assert!(runtime.volume_exists());
        runtime.remove_transport_volume().await.unwrap();
        assert_eq!(
            runtime.calls(),
            vec![
                "transport_volume_exists",
                "create_transport_volume",
                "remove_transport_volume"
            ]
        );
    }

    #[tokio::test]
    async fn test_abandoned_runs_are_orphans() {
        let runtime = MockRuntime::new(Components::default())
            .with_outcome("d:1", MockOutcome::Hang)
            .with_outcome("p:1", MockOutcome::artifact(b"x".to_vec()));

        let hung = Detective::new("d", "1", "os", "p:1");
        let abandoned = tokio::time::timeout(Duration::from_millis(10), runtime.run_detective(&hung)).await;
        assert!(abandoned.is_err());

        let provisioner = Provisioner::new("p", "1", "os");
        runtime
            .run_provisioner(&provisioner, &Artifact::from(&b"in"[..]))
            .await
            .unwrap();

        assert_eq!(runtime.remove_orphans().await.unwrap(), 1);
        assert_eq!(runtime.remove_orphans().await.unwrap(), 0);
    }
}
