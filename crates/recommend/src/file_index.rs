use codenav_protocol::FileId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// The path arena: sole owner of file identity for the engine.
///
/// Ids are dense, assigned on first observation, and never reused within
/// one arena. Every other component (vector set, co-edit graph) holds ids
/// only and resolves paths through the arena, so nothing downstream ever
/// depends on cross-run id stability.
#[derive(Debug, Default)]
pub(crate) struct FileIndex {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    paths: Vec<PathBuf>,
    ids: HashMap<PathBuf, FileId>,
}

impl FileIndex {
    pub fn new() -> FileIndex {
        FileIndex::default()
    }

    /// Id for `path`, allocating on first observation.
    pub fn to_id(&self, path: &Path) -> FileId {
        if let Some(&id) = self.inner.read().unwrap_or_else(|e| e.into_inner()).ids.get(path) {
            return id;
        }
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(&id) = inner.ids.get(path) {
            return id;
        }
        let id = FileId(inner.paths.len() as u32);
        inner.paths.push(path.to_path_buf());
        inner.ids.insert(path.to_path_buf(), id);
        id
    }

    pub fn from_id(&self, id: FileId) -> Option<PathBuf> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .paths
            .get(id.0 as usize)
            .cloned()
    }
}
