//! Component catalog
//!
//! Packagers, detectives and provisioners are container images discovered on
//! the host. Each one is identified by its `repository:tag` pair; detectives
//! and provisioners also carry the category they contribute to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline category label used for bucketing provisioner output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub const OS: &'static str = "os";
    pub const APPLICATION: &'static str = "application";
    pub const CONFIG: &'static str = "config";
    pub const INIT: &'static str = "init";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Unpacks the source image into the transport volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packager {
    pub repository: String,
    pub tag: String,
}

/// Analyzes the unpacked image and hints at the provisioner for its output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detective {
    pub repository: String,
    pub tag: String,
    pub category: Category,
    /// Identity key of the provisioner expected to consume this detective's output
    pub related: String,
}

/// Transforms a detective's artifact into a build context fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provisioner {
    pub repository: String,
    pub tag: String,
    pub category: Category,
}

fn identity_key(repository: &str, tag: &str) -> String {
    format!("{}:{}", repository, tag)
}

impl Packager {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    pub fn key(&self) -> String {
        identity_key(&self.repository, &self.tag)
    }
}

impl Detective {
    pub fn new(
        repository: impl Into<String>,
        tag: impl Into<String>,
        category: impl Into<Category>,
        related: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
            category: category.into(),
            related: related.into(),
        }
    }

    pub fn key(&self) -> String {
        identity_key(&self.repository, &self.tag)
    }
}

impl Provisioner {
    pub fn new(
        repository: impl Into<String>,
        tag: impl Into<String>,
        category: impl Into<Category>,
    ) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
            category: category.into(),
        }
    }

    pub fn key(&self) -> String {
        identity_key(&self.repository, &self.tag)
    }
}

/// Everything installed on the host, fixed for the duration of a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Components {
    pub packagers: Vec<Packager>,
    pub detectives: Vec<Detective>,
    pub provisioners: Vec<Provisioner>,
}

impl Components {
    /// First installed packager wins
    pub fn choose_packager(&self) -> Option<&Packager> {
        self.packagers.first()
    }

    pub fn is_empty(&self) -> bool {
        self.packagers.is_empty() && self.detectives.is_empty() && self.provisioners.is_empty()
    }
}
