//! Provisioner stage: one worker per detection, results grouped by category

use super::aggregate::ResultSet;
use super::error::WorkflowError;
use super::launcher::{collect, Launcher, ProvisionerReport};
use super::matcher;
use super::ExecutionMode;
use crate::artifact::Detection;
use crate::component::Provisioner;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn run(
    launcher: &Launcher,
    provisioners: &[Provisioner],
    detections: Vec<Detection>,
    mode: ExecutionMode,
) -> Result<ResultSet, WorkflowError> {
    let expected = detections.len();
    let results = match mode {
        ExecutionMode::Concurrent => run_concurrent(launcher, provisioners, detections).await?,
        ExecutionMode::Sequential => run_sequential(launcher, provisioners, detections).await?,
    };

    info!(
        provisioned = results.len(),
        expected,
        ?mode,
        "Provisioner stage complete"
    );
    Ok(results)
}

fn group(results: &mut ResultSet, report: ProvisionerReport) {
    match report {
        Ok(result) => {
            debug!(
                provisioner = %result.provisioner.key(),
                category = %result.category,
                bytes = result.artifact.len(),
                "Provisioner result received"
            );
            results.insert(result);
        }
        Err(key) => warn!(provisioner = %key, "Provisioner produced no build context"),
    }
}

async fn run_concurrent(
    launcher: &Launcher,
    provisioners: &[Provisioner],
    detections: Vec<Detection>,
) -> Result<ResultSet, WorkflowError> {
    // Resolve everything up front so an unmatched key launches nothing
    let matched = detections
        .into_iter()
        .map(|d| matcher::resolve(&d.next, provisioners).map(|p| (p.clone(), d)))
        .collect::<Result<Vec<_>, _>>()?;

    let expected = matched.len();
    let (tx, mut rx) = mpsc::channel(expected.max(1));
    for (provisioner, detection) in matched {
        launcher.spawn_provisioner(provisioner, detection.artifact, tx.clone())?;
    }
    drop(tx);

    let mut results = ResultSet::default();
    collect(&mut rx, expected, launcher.cancel_token(), |report| {
        group(&mut results, report)
    })
    .await?;
    Ok(results)
}

async fn run_sequential(
    launcher: &Launcher,
    provisioners: &[Provisioner],
    detections: Vec<Detection>,
) -> Result<ResultSet, WorkflowError> {
    let mut results = ResultSet::default();
    for detection in detections {
        let provisioner = matcher::resolve(&detection.next, provisioners)?.clone();
        let (tx, mut rx) = mpsc::channel(1);
        launcher.spawn_provisioner(provisioner, detection.artifact, tx)?;
        collect(&mut rx, 1, launcher.cancel_token(), |report| {
            group(&mut results, report)
        })
        .await?;
    }
    Ok(results)
}
