//! Build context assembly
//!
//! Stages run in a fixed order, each one building on what the previous
//! stages left in the context: OS, product metadata, application, config,
//! init. The first failing stage stops assembly.

use super::aggregate::PersistedResults;
use super::error::WorkflowError;
use crate::component::Category;
use crate::context::{BuildContext, ProductMetadata};
use crate::progress::{ProgressEvent, ProgressHandler};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStage {
    Os,
    ProductMetadata,
    Application,
    Config,
    Init,
}

impl AssemblyStage {
    pub const ORDER: [AssemblyStage; 5] = [
        AssemblyStage::Os,
        AssemblyStage::ProductMetadata,
        AssemblyStage::Application,
        AssemblyStage::Config,
        AssemblyStage::Init,
    ];

    /// Category bucket consumed by this stage; product metadata consumes none
    pub fn category(&self) -> Option<&'static str> {
        match self {
            AssemblyStage::Os => Some(Category::OS),
            AssemblyStage::ProductMetadata => None,
            AssemblyStage::Application => Some(Category::APPLICATION),
            AssemblyStage::Config => Some(Category::CONFIG),
            AssemblyStage::Init => Some(Category::INIT),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssemblyStage::Os => "os",
            AssemblyStage::ProductMetadata => "product-metadata",
            AssemblyStage::Application => "application",
            AssemblyStage::Config => "config",
            AssemblyStage::Init => "init",
        }
    }
}

impl fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn assemble(
    persisted: &PersistedResults,
    metadata: &ProductMetadata,
    context: &mut dyn BuildContext,
    progress: &dyn ProgressHandler,
) -> Result<(), WorkflowError> {
    for stage in AssemblyStage::ORDER {
        let applied = match stage.category() {
            None => context.add_product_metadata(metadata).map(|_| true),
            Some(name) => {
                let category = Category::from(name);
                match persisted.get(&category) {
                    Some(bucket) => context.apply_category(&category, bucket).map(|_| true),
                    None => Ok(false),
                }
            }
        };

        match applied {
            Ok(true) => progress.on_progress(&ProgressEvent::StageApplied {
                stage: stage.name().to_string(),
            }),
            Ok(false) => debug!(%stage, "Nothing to apply"),
            Err(source) => return Err(WorkflowError::Assembly { stage, source }),
        }
    }
    Ok(())
}
