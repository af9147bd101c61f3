//! Artifact store - submitted source files keyed by name

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{ArtifactName, GatewayError};

/// Flat directory of persisted artifacts
///
/// Every artifact lives directly under the root. Writes truncate, so the
/// last writer for a name wins; there is no locking between writers.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating the root directory if absent
    ///
    /// A relative root is resolved against the current directory here, so
    /// artifact paths stay valid for children running somewhere else.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let root = std::path::absolute(root.as_ref())?;
        debug!(?root, "ArtifactStore::open: called");

        if !root.exists() {
            fs::create_dir_all(&root)?;
            info!("Created storage directory: {}", root.display());
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an artifact with this name is stored at
    pub fn path_for(&self, name: &ArtifactName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Write `body` as the full content of the named artifact
    pub fn persist(&self, name: &ArtifactName, body: &str) -> Result<PathBuf, GatewayError> {
        let path = self.path_for(name);
        debug!(?path, bytes = body.len(), "ArtifactStore::persist: called");

        // A root removed after open is recreated rather than reported
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|source| GatewayError::Persistence {
                path: path.clone(),
                source,
            })?;
        }

        fs::write(&path, body).map_err(|source| GatewayError::Persistence {
            path: path.clone(),
            source,
        })?;

        info!("Code written to file: {}", path.display());
        Ok(path)
    }

    /// Read an artifact back
    pub fn read(&self, name: &ArtifactName) -> Result<String, GatewayError> {
        debug!(%name, "ArtifactStore::read: called");
        Ok(fs::read_to_string(self.path_for(name))?)
    }

    /// Names of all stored artifacts, sorted
    pub fn list(&self) -> Result<Vec<String>, GatewayError> {
        debug!("ArtifactStore::list: called");
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Delete an artifact, returning whether it existed
    pub fn remove(&self, name: &ArtifactName) -> Result<bool, GatewayError> {
        debug!(%name, "ArtifactStore::remove: called");
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
