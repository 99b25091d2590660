//! Build context assembled from provisioner output

mod directory;

pub use directory::DirectoryContext;

use crate::component::Category;
use crate::workflow::aggregate::Bucket;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid artifact from {provisioner}: {reason}")]
    InvalidArtifact { provisioner: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Build metadata stamped between the OS layer and the application layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMetadata {
    pub product: String,
    pub target: String,
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
}

impl ProductMetadata {
    pub fn new(product: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            target: target.into(),
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
        }
    }
}

/// Accumulating build context, mutated only by the assembler in stage order
pub trait BuildContext: Send {
    fn apply_category(&mut self, category: &Category, bucket: &Bucket) -> Result<(), ContextError>;

    fn add_product_metadata(&mut self, metadata: &ProductMetadata) -> Result<(), ContextError>;
}
