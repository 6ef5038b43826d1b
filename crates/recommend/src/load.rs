use crate::recommend::Recommender;
use crate::vectorizer::{ShingleCounter, ShingleVector, VectorSetChanges};
use crate::{RecommendError, Result};
use codenav_history::{CommitGraph, CommitId, GraphOptions, Repo, Storage};
use codenav_protocol::{CancelToken, FileId};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use walkdir::WalkDir;

impl Recommender {
    /// Load the co-edit graph from version-control history.
    ///
    /// Called after the vectorizer load, which owns counting files and
    /// fast-failing when there are too many.
    pub(crate) fn load_graph(
        &self,
        cancel: &CancelToken,
        storage: &Storage,
    ) -> Result<CommitGraph> {
        let file_edits = self.get_commits(cancel, storage)?;
        let mut files = HashMap::with_capacity(file_edits.len());
        for (path, edits) in file_edits {
            let id = self.file_index.to_id(&self.opts.root.join(path));
            files.insert(id, edits);
        }
        Ok(CommitGraph::new(files, GraphOptions::default()))
    }

    /// Associate repository paths with the commits that modified them.
    /// Commits touching at most one file carry no co-edit signal and are
    /// dropped; mining stops once the file×commit matrix would exceed its
    /// size bound.
    fn get_commits(
        &self,
        cancel: &CancelToken,
        storage: &Storage,
    ) -> Result<HashMap<String, Vec<CommitId>>> {
        let mut repo = Repo::open(&self.opts.root, self.opts.computed_commits_limit, storage)?;

        let mut files: HashMap<String, Vec<CommitId>> = HashMap::new();
        let mut num_files = 0usize;
        let mut num_edits = 0usize;
        while let Some(commit) = repo.next(cancel)? {
            if commit.files.len() <= 1 {
                continue;
            }
            for file in &commit.files {
                if !files.contains_key(file) {
                    num_files += 1;
                }
            }
            num_edits += 1;
            if num_files * num_edits > self.params.max_matrix_size {
                log::debug!("commit matrix bound reached after {num_edits} commits");
                break;
            }
            let id = CommitId(num_edits as u32);
            for file in commit.files {
                files.entry(file).or_default().push(id);
            }
        }

        repo.save(storage)?;
        Ok(files)
    }

    /// Assumes parent directories were already checked and found usable.
    pub(crate) fn can_use_dir(&self, path: &Path) -> bool {
        self.can_use(path, true, 0)
    }

    /// Assumes parent directories were already checked and found usable.
    pub(crate) fn can_use_file(&self, path: &Path, size: u64) -> bool {
        self.can_use(path, false, size)
    }

    fn can_use(&self, path: &Path, is_dir: bool, size: u64) -> bool {
        if self.ignorer.ignore(path, is_dir) {
            return false;
        }
        if is_dir {
            return true;
        }
        if !codenav_protocol::has_supported_extension(path) {
            return false;
        }
        size <= self.opts.max_file_size
    }

    /// Two passes over the code base: learn how common shingles are,
    /// then cache a vector per file (via the initial refresh).
    pub(crate) fn load_vectorizer(&mut self, cancel: &CancelToken) -> Result<()> {
        let mut valid_files = Vec::new();
        let mut walker = WalkDir::new(&self.opts.root).into_iter();
        while let Some(entry) = walker.next() {
            cancel.check()?;
            let entry = entry.map_err(|err| RecommendError::Io(err.into()))?;
            if entry.file_type().is_dir() {
                if !self.can_use_dir(entry.path()) {
                    walker.skip_current_dir();
                }
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if !self.can_use_file(entry.path(), size) {
                continue;
            }
            if valid_files.len() >= self.opts.max_files {
                return Err(RecommendError::TooManyFiles);
            }
            valid_files.push(entry.path().to_path_buf());
        }

        let mut counter = ShingleCounter::new(self.opts.keep_underscores);
        for path in &valid_files {
            cancel.check()?;
            match self.read(path) {
                Ok(contents) => counter.add(&String::from_utf8_lossy(&contents)),
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        self.vectorizer = counter.into_vectorizer();

        if !self.can_use_dir(&self.opts.root) {
            return Err(RecommendError::RootUnusable);
        }
        let modified = fs::metadata(&self.opts.root)?.modified()?;
        self.vectorizer
            .watch_dirs
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            // Backdate so the first refresh descends into the root.
            .insert(self.opts.root.clone(), modified - Duration::from_secs(1));
        self.refresh_vector_set(cancel)?;
        Ok(())
    }

    /// Length-capped read through the rate-limited opener.
    pub(crate) fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let file = self.opener.open(path)?;
        let mut contents = Vec::new();
        file.take(self.opts.max_file_size)
            .read_to_end(&mut contents)?;
        Ok(contents)
    }

    /// Re-vectorize what changed. Returns the number of refreshed files.
    pub(crate) fn refresh_vector_set(&self, cancel: &CancelToken) -> Result<usize> {
        let changes = self.compute_vector_set_changes(cancel)?;
        let refreshed = changes.updates.len();
        self.vectorizer.vector_set.update(changes);
        Ok(refreshed)
    }

    fn compute_vector_set_changes(&self, cancel: &CancelToken) -> Result<VectorSetChanges> {
        // The vector-set sweep re-checks every indexed file by metadata
        // instead of reading every watched directory; when nothing was
        // modified this touches no directory at all, which is the common
        // case between keystrokes.
        let mut watch = self
            .vectorizer
            .watch_dirs
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let vectors = self
            .vectorizer
            .vector_set
            .data
            .read()
            .unwrap_or_else(|e| e.into_inner());

        let mut changes = VectorSetChanges::default();
        let watched: Vec<PathBuf> = watch.keys().cloned().collect();
        for path in watched {
            cancel.check()?;
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    watch.remove(&path);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if !meta.is_dir() {
                watch.remove(&path);
                continue;
            }
            let modified = meta.modified()?;
            if watch.get(&path) == Some(&modified) {
                continue;
            }
            if !self.can_use_dir(&path) {
                watch.remove(&path);
                continue;
            }
            watch.insert(path.clone(), modified);
            let batch = self.refresh_dir(cancel, &mut watch, &vectors, &path)?;
            changes.add(batch);
        }

        for (&id, vector) in vectors.iter() {
            cancel.check()?;
            let Some(path) = self.file_index.from_id(id) else {
                continue;
            };
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    changes.deletes.push(id);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if meta.is_dir() {
                changes.deletes.push(id);
                continue;
            }
            let modified = meta.modified()?;
            if vector.mod_time == Some(modified) {
                continue;
            }
            if changes
                .updates
                .get(&id)
                .is_some_and(|update| update.mod_time == Some(modified))
            {
                continue;
            }
            if !self.can_use_file(&path, meta.len()) {
                changes.deletes.push(id);
                continue;
            }
            let contents = match self.read(&path) {
                Ok(contents) => contents,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            if contents.is_empty() {
                continue;
            }
            let vector = self.vectorizer.make_vector(&String::from_utf8_lossy(&contents));
            changes.updates.insert(
                id,
                ShingleVector {
                    mod_time: Some(modified),
                    ..vector
                },
            );
        }
        Ok(changes)
    }

    fn refresh_dir(
        &self,
        cancel: &CancelToken,
        watch: &mut HashMap<PathBuf, SystemTime>,
        vectors: &HashMap<FileId, ShingleVector>,
        dir: &Path,
    ) -> Result<VectorSetChanges> {
        cancel.check()?;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                watch.remove(dir);
                return Ok(VectorSetChanges::default());
            }
            Err(err) => return Err(err.into()),
        };

        let mut changes = VectorSetChanges::default();
        for entry in entries {
            let child = entry?.path();
            let meta = match fs::symlink_metadata(&child) {
                Ok(meta) => meta,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            let modified = meta.modified()?;
            if meta.is_dir() {
                if watch.get(&child) == Some(&modified) {
                    continue;
                }
                if !self.can_use_dir(&child) {
                    watch.remove(&child);
                    continue;
                }
                watch.insert(child.clone(), modified);
                let batch = self.refresh_dir(cancel, watch, vectors, &child)?;
                changes.add(batch);
                continue;
            }
            if !self.can_use_file(&child, meta.len()) {
                continue;
            }
            let id = self.file_index.to_id(&child);
            if vectors.get(&id).is_some_and(|v| v.mod_time == Some(modified)) {
                continue;
            }
            let contents = match self.read(&child) {
                Ok(contents) => contents,
                Err(err) if err.is_not_found() => {
                    changes.deletes.push(id);
                    continue;
                }
                Err(err) => return Err(err),
            };
            let vector = self.vectorizer.make_vector(&String::from_utf8_lossy(&contents));
            changes.updates.insert(
                id,
                ShingleVector {
                    mod_time: Some(modified),
                    ..vector
                },
            );
        }
        Ok(changes)
    }
}

/// Serializes file opens during indexing: counts unique files against the
/// build cap and paces opens to bound initial-scan IOPS.
///
/// The cap applies to unique paths because a build opens most files twice
/// (once counting shingles, once vectorizing). After a successful build
/// the counter is released and only the pacing remains.
#[derive(Debug)]
pub(crate) struct FileOpener {
    state: Mutex<OpenerState>,
    max: usize,
    rate: Duration,
}

#[derive(Debug)]
struct OpenerState {
    counter: Option<std::collections::HashSet<PathBuf>>,
    prev: Instant,
}

impl FileOpener {
    pub fn new(max_files: usize, max_opens_per_second: u32) -> FileOpener {
        let rate = if max_opens_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / max_opens_per_second
        };
        FileOpener {
            state: Mutex::new(OpenerState {
                counter: Some(std::collections::HashSet::new()),
                prev: Instant::now(),
            }),
            max: max_files,
            rate,
        }
    }

    pub fn open(&self, path: &Path) -> Result<File> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(counter) = &mut state.counter {
            counter.insert(path.to_path_buf());
            if counter.len() > self.max {
                return Err(RecommendError::TooManyFiles);
            }
        }

        let next = state.prev + self.rate;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        }
        state.prev = Instant::now();
        File::open(path).map_err(Into::into)
    }

    pub fn counter_size(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .counter
            .as_ref()
            .map_or(0, |counter| counter.len())
    }

    /// Stop counting opens against the cap; later refreshes may open any
    /// number of files.
    pub fn release_max(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .counter = None;
    }
}
