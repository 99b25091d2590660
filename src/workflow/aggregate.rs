//! Result set and persisted results
//!
//! `persist` is the seam for caching and conflict resolution between
//! provisioner outputs of the same category. Today it only orders each
//! bucket by provisioner key so concurrent and sequential runs agree.

use crate::artifact::ProvisionerResult;
use crate::component::Category;
use std::collections::{BTreeMap, HashMap};

/// Provisioner results grouped by category, in arrival order
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    results: HashMap<Category, Vec<ProvisionerResult>>,
}

impl ResultSet {
    pub fn insert(&mut self, result: ProvisionerResult) {
        self.results
            .entry(result.category.clone())
            .or_default()
            .push(result);
    }

    pub fn get(&self, category: &Category) -> Option<&[ProvisionerResult]> {
        self.results.get(category).map(Vec::as_slice)
    }

    /// Total number of results across all categories
    pub fn len(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the assembler applies for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    results: Vec<ProvisionerResult>,
}

impl Bucket {
    pub fn results(&self) -> &[ProvisionerResult] {
        &self.results
    }

    pub fn provisioner_keys(&self) -> Vec<String> {
        self.results.iter().map(|r| r.provisioner.key()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedResults {
    buckets: BTreeMap<Category, Bucket>,
}

impl PersistedResults {
    pub fn get(&self, category: &Category) -> Option<&Bucket> {
        self.buckets.get(category)
    }

    pub fn remove(&mut self, category: &Category) -> Option<Bucket> {
        self.buckets.remove(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.buckets.keys()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

pub fn persist(results: ResultSet) -> PersistedResults {
    let buckets = results
        .results
        .into_iter()
        .map(|(category, mut results)| {
            results.sort_by_key(|r| r.provisioner.key());
            (category, Bucket { results })
        })
        .collect();
    PersistedResults { buckets }
}
