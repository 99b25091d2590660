//! Tar helpers for moving artifacts in and out of component containers

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

/// Rewrite every entry of `archive` from under `strip` to under `prefix`.
///
/// Docker's archive endpoint returns paths rooted at the requested
/// directory name (`output/...`); artifacts are kept rooted at the build
/// context instead, and re-rooted again when handed to a provisioner.
/// The entry for `strip` itself is dropped.
pub fn reroot(archive: &[u8], strip: &str, prefix: &str) -> std::io::Result<Vec<u8>> {
    let mut source = tar::Archive::new(Cursor::new(archive));
    let mut builder = tar::Builder::new(Vec::new());

    for entry in source.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let relative = normalize(&path);
        let relative = relative.strip_prefix(strip).unwrap_or(&relative);
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = if prefix.is_empty() {
            relative.to_path_buf()
        } else {
            Path::new(prefix).join(relative)
        };

        let mut header = entry.header().clone();
        builder.append_data(&mut header, target, &mut entry)?;
    }

    builder.into_inner()
}

/// Drop `.` components and any leading `/` so entries compare as relative paths
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn paths(bytes: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(Cursor::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn test_reroot_strips_output_dir() {
        let src = archive(&[
            ("output/Dockerfile", &b"FROM scratch\n"[..]),
            ("output/etc/hosts", &b""[..]),
        ]);
        let out = reroot(&src, "output", "").unwrap();
        assert_eq!(paths(&out), vec!["Dockerfile", "etc/hosts"]);
    }

    #[test]
    fn test_reroot_adds_prefix() {
        let src = archive(&[("Dockerfile", &b"FROM scratch\n"[..])]);
        let out = reroot(&src, "", "input").unwrap();
        assert_eq!(paths(&out), vec!["input/Dockerfile"]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("./a/./b")), PathBuf::from("a/b"));
        assert_eq!(normalize(Path::new("/abs/file")), PathBuf::from("abs/file"));
    }
}
