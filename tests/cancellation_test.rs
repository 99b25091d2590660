//! Cancellation regression tests
//!
//! A cancelled build must return promptly, apply nothing, reap abandoned
//! containers before the volume goes, and every worker task must exit,
//! releasing its handle on the runtime.

mod support;

use std::sync::Arc;
use std::time::Duration;
use support::{scenario_components, RecordingContext};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use v2c::{BuildRequest, MockOutcome, MockRuntime, Workflow, WorkflowError, WorkflowOptions};

fn request(one_by_one: bool) -> BuildRequest {
    BuildRequest {
        target: "acme/legacy:1.0".to_string(),
        device: "/images/legacy.vmdk".to_string(),
        no_clean: false,
        one_by_one,
    }
}

async fn wait_for_workers(runtime: &Arc<MockRuntime>) {
    timeout(Duration::from_secs(2), async {
        while Arc::strong_count(runtime) > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker tasks still hold the runtime");
}

/// Cancel 20ms into the build and check it ends as a clean cancellation
async fn cancel_midway(runtime: Arc<MockRuntime>, one_by_one: bool) {
    let cancel = CancellationToken::new();
    let workflow = Workflow::new(runtime.clone(), WorkflowOptions::default());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let mut context = RecordingContext::default();
    let outcome = timeout(
        Duration::from_secs(2),
        workflow.build_into(cancel, &request(one_by_one), &mut context),
    )
    .await
    .expect("build did not return after cancellation");

    assert!(matches!(outcome, Err(WorkflowError::Cancelled)));
    assert!(context.stage_names().is_empty());

    let calls = runtime.calls();
    let n = calls.len();
    assert!(n >= 2);
    assert_eq!(calls[n - 2], "remove_orphans");
    assert_eq!(calls[n - 1], "remove_transport_volume");

    drop(workflow);
    wait_for_workers(&runtime).await;
}

fn hanging_detectives() -> Arc<MockRuntime> {
    Arc::new(
        MockRuntime::new(scenario_components())
            .with_outcome("d1:v1", MockOutcome::Hang)
            .with_outcome("d2:v1", MockOutcome::Hang),
    )
}

fn hanging_provisioner() -> Arc<MockRuntime> {
    Arc::new(
        MockRuntime::new(scenario_components())
            .with_outcome("d1:v1", MockOutcome::artifact(b"A".to_vec()))
            .with_outcome("prov1:v1", MockOutcome::Hang),
    )
}

#[tokio::test]
async fn test_concurrent_detection_cancelled() {
    let runtime = hanging_detectives();
    cancel_midway(runtime.clone(), false).await;
    assert!(runtime.provisioner_launches().is_empty());
}

#[tokio::test]
async fn test_sequential_detection_cancelled() {
    let runtime = hanging_detectives();
    cancel_midway(runtime.clone(), true).await;
    assert_eq!(runtime.launches(), vec!["d1:v1"]);
}

#[tokio::test]
async fn test_concurrent_provisioning_cancelled() {
    let runtime = hanging_provisioner();
    cancel_midway(runtime.clone(), false).await;
    assert_eq!(runtime.provisioner_launches(), vec!["prov1:v1"]);
}

#[tokio::test]
async fn test_sequential_provisioning_cancelled() {
    let runtime = hanging_provisioner();
    cancel_midway(runtime.clone(), true).await;
    assert_eq!(runtime.launches(), vec!["d1:v1", "d2:v1", "prov1:v1"]);
}

#[tokio::test]
async fn test_unpacking_cancelled() {
    let runtime = Arc::new(MockRuntime::new(scenario_components()).with_hanging_packager());
    cancel_midway(runtime.clone(), false).await;

    assert!(runtime.launches().is_empty());
    assert!(!runtime.volume_exists());
}

#[tokio::test]
async fn test_cancel_before_start() {
    let runtime = Arc::new(
        MockRuntime::new(scenario_components()).with_outcome("d1:v1", MockOutcome::Hang),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let workflow = Workflow::new(runtime.clone(), WorkflowOptions::default());
    let mut context = RecordingContext::default();

    let err = workflow
        .build_into(cancel, &request(false), &mut context)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Task cancelled or late.");
    assert!(runtime.launches().is_empty());

    drop(workflow);
    wait_for_workers(&runtime).await;
}
