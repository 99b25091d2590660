use super::{BuildContext, ContextError, ProductMetadata};
use crate::component::Category;
use crate::runtime::archive::normalize;
use crate::workflow::aggregate::Bucket;
use std::fmt::Write as _;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DOCKERFILE: &str = "Dockerfile";

/// Build context backed by a directory on disk.
///
/// Provisioner artifacts are tar streams. Their files are unpacked into the
/// directory in stage order, so later categories overwrite earlier ones. A
/// top-level `Dockerfile` entry is not unpacked; its instructions are
/// appended to the Dockerfile accumulated across all stages.
pub struct DirectoryContext {
    root: PathBuf,
    dockerfile: String,
}

impl DirectoryContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dockerfile: String::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dockerfile(&self) -> &str {
        &self.dockerfile
    }

    /// Write the accumulated Dockerfile; returns its path
    pub fn finish(self) -> Result<PathBuf, ContextError> {
        let path = self.root.join(DOCKERFILE);
        std::fs::write(&path, self.dockerfile)?;
        debug!(path = %path.display(), "Wrote Dockerfile");
        Ok(path)
    }

    fn unpack(&mut self, provisioner: &str, payload: &[u8]) -> Result<(), ContextError> {
        let mut archive = tar::Archive::new(Cursor::new(payload));
        let entries = archive
            .entries()
            .map_err(|e| ContextError::InvalidArtifact {
                provisioner: provisioner.to_string(),
                reason: e.to_string(),
            })?;

        for entry in entries {
            let mut entry = entry.map_err(|e| ContextError::InvalidArtifact {
                provisioner: provisioner.to_string(),
                reason: e.to_string(),
            })?;
            let path = normalize(&entry.path()?);

            if path == Path::new(DOCKERFILE) {
                let mut fragment = String::new();
                entry.read_to_string(&mut fragment)?;
                self.append_fragment(provisioner, &fragment);
                continue;
            }

            if !entry.unpack_in(&self.root)? {
                warn!(provisioner, path = %path.display(), "Skipped artifact entry outside the build context");
            }
        }
        Ok(())
    }

    fn append_fragment(&mut self, source: &str, fragment: &str) {
        if !self.dockerfile.is_empty() && !self.dockerfile.ends_with("\n\n") {
            self.dockerfile.push('\n');
        }
        let _ = writeln!(self.dockerfile, "# {}", source);
        self.dockerfile.push_str(fragment.trim_end());
        self.dockerfile.push('\n');
    }
}

impl BuildContext for DirectoryContext {
    fn apply_category(&mut self, category: &Category, bucket: &Bucket) -> Result<(), ContextError> {
        for result in bucket.results() {
            let key = result.provisioner.key();
            debug!(%category, provisioner = %key, bytes = result.artifact.len(), "Applying provisioner output");
            self.unpack(&key, result.artifact.bytes())?;
        }
        Ok(())
    }

    fn add_product_metadata(&mut self, metadata: &ProductMetadata) -> Result<(), ContextError> {
        let labels = format!(
            "LABEL com.docker.v2c.product=\"{}\" \\\n      com.docker.v2c.target=\"{}\" \\\n      com.docker.v2c.build-id=\"{}\" \\\n      com.docker.v2c.built-at=\"{}\"",
            label_value(&metadata.product),
            label_value(&metadata.target),
            metadata.build_id,
            metadata.built_at.to_rfc3339()
        );
        self.append_fragment("product metadata", &labels);
        Ok(())
    }
}

/// Quote-safe `LABEL` value; line breaks would end the instruction
fn label_value(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}
