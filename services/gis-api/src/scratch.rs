//! Per-request scratch directories.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tempfile::TempDir;
use uuid::Uuid;

/// Scratch root plus the set of scope directories owned by in-flight
/// requests. Clones share the same set.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
    live: Arc<Mutex<HashSet<String>>>,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a scope for request `id`, registered as live until dropped.
    pub fn scope(&self, id: Uuid) -> io::Result<RequestScope> {
        std::fs::create_dir_all(&self.root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", id))
            .tempdir_in(&self.root)?;

        let name = dir
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "scope name is not UTF-8"))?;
        self.lock().insert(name.clone());

        Ok(RequestScope {
            dir,
            name,
            live: Arc::clone(&self.live),
        })
    }

    /// Whether the directory `name` belongs to a request still in flight.
    pub fn is_live(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set holds plain names; a panic mid-insert cannot corrupt it
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scratch directory owned by a single request.
///
/// The directory is named `<request-id>-<random>` under the scratch root
/// and is deleted when the scope is dropped, including during unwinding.
#[derive(Debug)]
pub struct RequestScope {
    dir: TempDir,
    name: String,
    live: Arc<Mutex<HashSet<String>>>,
}

impl RequestScope {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create (if needed) and return a subdirectory of the scope.
    pub fn subdir(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Directory that outputs are written to.
    pub fn out_dir(&self) -> io::Result<PathBuf> {
        self.subdir("out")
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

/// Request id encoded in a scope directory name, if it is one.
pub fn scope_id(name: &str) -> Option<Uuid> {
    name.get(..36).and_then(|prefix| Uuid::parse_str(prefix).ok())
}
