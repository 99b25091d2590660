//! Detective stage: fan out one worker per detective, keep what was detected

use super::error::WorkflowError;
use super::launcher::{collect, Launcher};
use super::ExecutionMode;
use crate::artifact::{DetectiveResult, Detection};
use crate::component::Detective;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub async fn run(
    launcher: &Launcher,
    detectives: &[Detective],
    mode: ExecutionMode,
) -> Result<Vec<Detection>, WorkflowError> {
    let detected = match mode {
        ExecutionMode::Concurrent => run_concurrent(launcher, detectives).await?,
        ExecutionMode::Sequential => run_sequential(launcher, detectives).await?,
    };

    info!(
        detected = detected.len(),
        detectives = detectives.len(),
        ?mode,
        "Detective stage complete"
    );
    Ok(detected)
}

fn keep(detected: &mut Vec<Detection>, result: DetectiveResult) {
    match result.into_detection() {
        Some(detection) => {
            debug!(next = %detection.next, category = %detection.category, "Component detected");
            detected.push(detection);
        }
        None => debug!("Detective found nothing"),
    }
}

async fn run_concurrent(
    launcher: &Launcher,
    detectives: &[Detective],
) -> Result<Vec<Detection>, WorkflowError> {
    let (tx, mut rx) = mpsc::channel(detectives.len().max(1));
    for detective in detectives {
        launcher.spawn_detective(detective.clone(), tx.clone())?;
    }
    drop(tx);

    let mut detected = Vec::new();
    collect(&mut rx, detectives.len(), launcher.cancel_token(), |result| {
        keep(&mut detected, result)
    })
    .await?;
    Ok(detected)
}

async fn run_sequential(
    launcher: &Launcher,
    detectives: &[Detective],
) -> Result<Vec<Detection>, WorkflowError> {
    let mut detected = Vec::new();
    for detective in detectives {
        let (tx, mut rx) = mpsc::channel(1);
        launcher.spawn_detective(detective.clone(), tx)?;
        collect(&mut rx, 1, launcher.cancel_token(), |result| {
            keep(&mut detected, result)
        })
        .await?;
    }
    Ok(detected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Components;
    use crate::runtime::{MockOutcome, MockRuntime};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn detectives() -> Vec<Detective> {
        vec![
            Detective::new("d1", "v1", "os", "prov1:v1"),
            Detective::new("d2", "v1", "application", "prov2:v1"),
            Detective::new("d3", "v1", "config", "prov3:v1"),
        ]
    }

    fn runtime() -> MockRuntime {
        MockRuntime::new(Components::default())
            .with_outcome(
                "d1:v1",
                MockOutcome::Delayed(Duration::from_millis(30), Some(b"os".to_vec().into())),
            )
            .with_outcome("d2:v1", MockOutcome::Nothing)
            .with_outcome("d3:v1", MockOutcome::artifact(b"config".to_vec()))
    }

    #[tokio::test]
    async fn test_both_modes_keep_only_detections() {
        for mode in [ExecutionMode::Concurrent, ExecutionMode::Sequential] {
            let launcher = Launcher::new(Arc::new(runtime()), CancellationToken::new(), None);
            let detected = run(&launcher, &detectives(), mode).await.unwrap();

            let mut next: Vec<_> = detected.iter().map(|d| d.next.as_str()).collect();
            next.sort();
            assert_eq!(next, vec!["prov1:v1", "prov3:v1"], "mode {:?}", mode);
        }
    }

    #[tokio::test]
    async fn test_sequential_launches_in_catalog_order() {
        let runtime = Arc::new(runtime());
        let launcher = Launcher::new(runtime.clone(), CancellationToken::new(), None);
        let detected = run(&launcher, &detectives(), ExecutionMode::Sequential)
            .await
            .unwrap();

        assert_eq!(runtime.launches(), vec!["d1:v1", "d2:v1", "d3:v1"]);
        assert_eq!(detected[0].next, "prov1:v1");
        assert_eq!(detected[1].next, "prov3:v1");
    }

    #[tokio::test]
    async fn test_empty_catalog_detects_nothing() {
        let launcher = Launcher::new(
            Arc::new(MockRuntime::new(Components::default())),
            CancellationToken::new(),
            None,
        );
        let detected = run(&launcher, &[], ExecutionMode::Concurrent).await.unwrap();
        assert!(detected.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_discards_collected_detections() {
        let runtime = MockRuntime::new(Components::default())
            .with_outcome("d1:v1", MockOutcome::artifact(b"os".to_vec()))
            .with_outcome("d2:v1", MockOutcome::Hang);
        let cancel = CancellationToken::new();
        let launcher = Launcher::new(Arc::new(runtime), cancel.clone(), None);

        let stage = tokio::spawn(async move {
            let detectives = vec![
                Detective::new("d1", "v1", "os", "prov1:v1"),
                Detective::new("d2", "v1", "os", "prov2:v1"),
            ];
            run(&launcher, &detectives, ExecutionMode::Concurrent).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(1), stage)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, Err(WorkflowError::Cancelled)));
    }
}
