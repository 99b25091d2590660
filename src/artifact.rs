//! Worker outputs passed between the detective and provisioner stages

use crate::component::{Category, Provisioner};
use bytes::Bytes;

/// Opaque payload produced by a detective or provisioner (a tar stream in practice)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact(Bytes);

impl Artifact {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self(payload.into())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Artifact {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<&'static [u8]> for Artifact {
    fn from(payload: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(payload))
    }
}

/// Outcome of one detective run
///
/// An absent artifact means the detective found nothing of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectiveResult {
    pub category: Category,
    /// Identity key of the provisioner that should consume `artifact`
    pub next: String,
    pub artifact: Option<Artifact>,
}

impl DetectiveResult {
    pub fn is_detected(&self) -> bool {
        self.artifact.is_some()
    }
}

/// A detection that will be handed to a provisioner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub category: Category,
    pub next: String,
    pub artifact: Artifact,
}

impl DetectiveResult {
    /// Keep only results that carry an artifact
    pub fn into_detection(self) -> Option<Detection> {
        let DetectiveResult {
            category,
            next,
            artifact,
        } = self;
        artifact.map(|artifact| Detection {
            category,
            next,
            artifact,
        })
    }
}

/// Build context fragment produced by one provisioner run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerResult {
    pub provisioner: Provisioner,
    pub category: Category,
    pub artifact: Artifact,
}
