use crate::cache::{Bundle, RepoCache};
use crate::{HistoryError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Default cap on the serialized bundle, in bytes.
const DEFAULT_MAX_STORAGE_SIZE: usize = 10_000_000;

/// Options for [`Storage::new`].
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Persist the bundle to `path` instead of keeping it in memory.
    pub use_disk: bool,
    /// Bundle file location; required when `use_disk` is set.
    pub path: PathBuf,
    /// Cap on the serialized bundle size; 0 means the default.
    pub max_storage_size: usize,
}

enum Backend {
    Memory(Option<Vec<u8>>),
    Disk(PathBuf),
}

/// Commit-cache storage shared by every repository open.
///
/// All access goes through one lock spanning the full read-merge-write of
/// a save, so concurrent saves from different projects cannot lose each
/// other's updates. The disk backend additionally holds an advisory file
/// lock for the same span to stay correct across processes sharing one
/// cache file.
pub struct Storage {
    backend: Mutex<Backend>,
    max_size: usize,
}

impl Storage {
    pub fn new(opts: StorageOptions) -> Result<Storage> {
        let backend = if opts.use_disk {
            if let Some(parent) = opts.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Backend::Disk(opts.path)
        } else {
            Backend::Memory(None)
        };
        let max_size = if opts.max_storage_size == 0 {
            DEFAULT_MAX_STORAGE_SIZE
        } else {
            opts.max_storage_size
        };
        Ok(Storage {
            backend: Mutex::new(backend),
            max_size,
        })
    }

    /// Load one repository's cache; a missing bundle or repository is an
    /// empty cache, a corrupt bundle is an error.
    pub(crate) fn load_repo(&self, key: &str) -> Result<RepoCache> {
        let backend = self.backend.lock().unwrap_or_else(|e| e.into_inner());
        let _file_lock = FileLock::acquire(&backend)?;
        let bundle = read_bundle(&backend)?;
        Ok(bundle.get(key).cloned().unwrap_or_default())
    }

    /// Merge one repository's cache into the bundle and persist it,
    /// evicting least-recently-used repositories until the serialized
    /// document fits under the size cap.
    pub(crate) fn save_repo(&self, key: &str, cache: RepoCache) -> Result<()> {
        let mut backend = self.backend.lock().unwrap_or_else(|e| e.into_inner());
        let _file_lock = FileLock::acquire(&backend)?;
        let mut bundle = read_bundle(&backend)?;
        bundle.put(key, cache);

        let bytes = loop {
            let bytes = bundle.encode().map_err(HistoryError::CorruptCache)?;
            if bytes.len() <= self.max_size {
                break bytes;
            }
            if !bundle.evict_oldest() {
                break bundle.encode().map_err(HistoryError::CorruptCache)?;
            }
        };
        write_bytes(&mut backend, bytes)
    }

    #[cfg(test)]
    pub(crate) fn raw_len(&self) -> usize {
        let backend = self.backend.lock().unwrap_or_else(|e| e.into_inner());
        read_bytes(&backend).unwrap().map_or(0, |b| b.len())
    }
}

fn read_bundle(backend: &Backend) -> Result<Bundle> {
    match read_bytes(backend)? {
        None => Ok(Bundle::default()),
        Some(bytes) if bytes.is_empty() => Ok(Bundle::default()),
        Some(bytes) => Bundle::decode(&bytes).map_err(HistoryError::CorruptCache),
    }
}

fn read_bytes(backend: &Backend) -> Result<Option<Vec<u8>>> {
    match backend {
        Backend::Memory(bytes) => Ok(bytes.clone()),
        Backend::Disk(path) => match File::open(path) {
            Ok(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        },
    }
}

fn write_bytes(backend: &mut Backend, bytes: Vec<u8>) -> Result<()> {
    match backend {
        Backend::Memory(slot) => {
            *slot = Some(bytes);
            Ok(())
        }
        Backend::Disk(path) => {
            let mut file = File::create(path)?;
            file.write_all(&bytes)?;
            Ok(())
        }
    }
}

/// Advisory lock on a sibling of the cache file, held across the whole
/// read-merge-write. Memory backends need no cross-process lock.
struct FileLock {
    file: Option<File>,
}

impl FileLock {
    fn acquire(backend: &Backend) -> Result<FileLock> {
        let Backend::Disk(path) = backend else {
            return Ok(FileLock { file: None });
        };
        let lock_path = path.with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;
        file.lock_exclusive()?;
        Ok(FileLock { file: Some(file) })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = file.unlock();
        }
    }
}
