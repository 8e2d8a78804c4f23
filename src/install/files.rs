// src/install/files.rs

use std::path::{Component, Path};

use serde::Deserialize;
use tracing::{debug, info};

use crate::fs::FileSystem;

use super::InstallError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileSpec {
    pub path: String,
    pub content: String,
}

/// Body of the file-install action: either `{files: [...]}` or a single
/// `{path, content}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InstallFilesInput {
    Many { files: Vec<FileSpec> },
    One(FileSpec),
}

impl InstallFilesInput {
    pub fn into_files(self) -> Vec<FileSpec> {
        match self {
            InstallFilesInput::Many { files } => files,
            InstallFilesInput::One(file) => vec![file],
        }
    }
}

/// Reject absolute paths and anything that climbs out with `..`.
pub fn ensure_relative(path: &str) -> Result<(), InstallError> {
    let p = Path::new(path);
    let safe = !path.trim().is_empty()
        && p.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(())
    } else {
        Err(InstallError::UnsafePath(path.to_string()))
    }
}

/// Validate every path first, then write them in order. Returns the number of
/// files written.
pub fn write_all(
    fs: &dyn FileSystem,
    root: &Path,
    files: &[FileSpec],
) -> Result<usize, InstallError> {
    for file in files {
        ensure_relative(&file.path)?;
    }

    for file in files {
        let target = root.join(&file.path);
        debug!(path = %target.display(), bytes = file.content.len(), "writing file");
        fs.write(&target, file.content.as_bytes())
            .map_err(|e| InstallError::Write(format!("{e:#}")))?;
    }

    info!(count = files.len(), root = %root.display(), "installed files");
    Ok(files.len())
}
