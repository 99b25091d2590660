#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use v2c::workflow::Bucket;
use v2c::{
    BuildContext, Category, Components, ContextError, Detective, Packager, ProductMetadata,
    Provisioner,
};

pub fn get_v2c_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.join("v2c")
}

/// Tar stream holding the given files
pub fn tar_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Two detectives and one provisioner: `d1` finds an OS handled by
/// `prov1:v1`, `d2` finds nothing
pub fn scenario_components() -> Components {
    Components {
        packagers: vec![Packager::new("v2c/packager", "1")],
        detectives: vec![
            Detective::new("d1", "v1", "os", "prov1:v1"),
            Detective::new("d2", "v1", "application", "prov2:v1"),
        ],
        provisioners: vec![Provisioner::new("prov1", "v1", "os")],
    }
}

/// What a build context was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Category(String, Vec<String>),
    ProductMetadata(String),
}

/// Build context that only records calls; the log outlives the context
#[derive(Clone, Default)]
pub struct RecordingContext {
    log: Arc<Mutex<Vec<Applied>>>,
}

impl RecordingContext {
    pub fn applied(&self) -> Vec<Applied> {
        self.log.lock().unwrap().clone()
    }

    /// Names of the stages that touched the context
    pub fn stage_names(&self) -> Vec<String> {
        self.applied()
            .into_iter()
            .map(|a| match a {
                Applied::Category(name, _) => name,
                Applied::ProductMetadata(_) => "product-metadata".to_string(),
            })
            .collect()
    }
}

impl BuildContext for RecordingContext {
    fn apply_category(&mut self, category: &Category, bucket: &Bucket) -> Result<(), ContextError> {
        self.log.lock().unwrap().push(Applied::Category(
            category.to_string(),
            bucket.provisioner_keys(),
        ));
        Ok(())
    }

    fn add_product_metadata(&mut self, metadata: &ProductMetadata) -> Result<(), ContextError> {
        self.log
            .lock()
            .unwrap()
            .push(Applied::ProductMetadata(metadata.target.clone()));
        Ok(())
    }
}
