//! Artifact storage
//!
//! Rendered reports are stored per session under fixed artifact file
//! names. The store is a trait so hosts can keep artifacts on local disk
//! or in memory; the pipeline depends only on the seam.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Per-session artifact storage
pub trait ArtifactStore: Send + Sync {
    /// Store one artifact, replacing any previous bytes under the same name
    fn put(&self, session_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch one artifact
    fn get(&self, session_id: Uuid, file_name: &str) -> Result<Vec<u8>>;

    /// Remove every artifact of one session. Removing a session with no
    /// stored artifacts is not an error.
    fn delete_session(&self, session_id: Uuid) -> Result<()>;

    /// Artifact file names of one session, sorted
    fn list_session(&self, session_id: Uuid) -> Result<Vec<String>>;
}

/// Artifact names are plain file names; anything with a path component
/// is rejected before it reaches the filesystem.
fn checked_name(file_name: &str) -> Result<&str> {
    if file_name.is_empty() || file_name == ".." || file_name.contains(['/', '\\']) {
        return Err(Error::InvalidRequest(format!(
            "artifact name '{file_name}' is not a plain file name"
        )));
    }
    Ok(file_name)
}

/// Filesystem-backed store: `<root>/<session id>/<file name>`
#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.root.join(session_id.to_string())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, session_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<()> {
        let file_name = checked_name(file_name)?;
        let dir = self.session_dir(session_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(file_name), bytes)?;
        Ok(())
    }

    fn get(&self, session_id: Uuid, file_name: &str) -> Result<Vec<u8>> {
        let file_name = checked_name(file_name)?;
        let path = self.session_dir(session_id).join(file_name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "artifact '{file_name}' for session {session_id}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_session(&self, session_id: Uuid) -> Result<()> {
        match std::fs::remove_dir_all(self.session_dir(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_session(&self, session_id: Uuid) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(self.session_dir(session_id)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory store for tests and embedded hosts
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: RwLock<HashMap<Uuid, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, session_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<()> {
        let file_name = checked_name(file_name)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Internal("artifact store lock poisoned".into()))?;
        entries
            .entry(session_id)
            .or_default()
            .insert(file_name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, session_id: Uuid, file_name: &str) -> Result<Vec<u8>> {
        let file_name = checked_name(file_name)?;
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::Internal("artifact store lock poisoned".into()))?;
        entries
            .get(&session_id)
            .and_then(|files| files.get(file_name))
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("artifact '{file_name}' for session {session_id}"))
            })
    }

    fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Internal("artifact store lock poisoned".into()))?;
        entries.remove(&session_id);
        Ok(())
    }

    fn list_session(&self, session_id: Uuid) -> Result<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::Internal("artifact store lock poisoned".into()))?;
        Ok(entries
            .get(&session_id)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default())
    }
}
