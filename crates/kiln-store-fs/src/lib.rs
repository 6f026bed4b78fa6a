// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `DesignStore` for Kiln designs (uses platform data dir).
#![forbid(unsafe_code)]

use directories::ProjectDirs;
use kiln_core::{DesignStore, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store designs as JSON files under one directory.
#[derive(Debug, Clone)]
pub struct FsDesignStore {
    base: PathBuf,
}

impl FsDesignStore {
    /// Create a store rooted at the user data directory
    /// (e.g., `~/.local/share/kiln/designs`).
    pub fn new() -> Result<Self, StoreError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Kiln")
            .ok_or_else(|| StoreError::Other("could not resolve data dir".into()))?;
        Self::at(proj.data_dir().join("designs"))
    }

    /// Create a store rooted at `base`, creating the directory if needed.
    pub fn at(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        debug!(root = %base.display(), "design store opened");
        Ok(Self { base })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.base
    }

    /// Names of every stored design, sorted.
    pub fn names(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.base.join(format!("{name}.json")))
    }
}

/// Rejects names that could escape the store root or hide the file.
fn validate_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        return Err(StoreError::Other(format!("invalid design name `{name}`")));
    }
    Ok(())
}

fn not_found_or(err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound
    } else {
        StoreError::Io(err)
    }
}

impl DesignStore for FsDesignStore {
    fn load_raw(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(name)?;
        fs::read(path).map_err(not_found_or)
    }

    fn save_raw(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        // Write beside the target and rename so readers never see a torn file.
        let staging = path.with_extension("json.tmp");
        if let Err(err) = fs::write(&staging, data).and_then(|()| fs::rename(&staging, &path)) {
            // Best effort; the write or rename error is what gets reported.
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }
        debug!(path = %path.display(), bytes = data.len(), "design written");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        fs::remove_file(path).map_err(not_found_or)
    }
}
