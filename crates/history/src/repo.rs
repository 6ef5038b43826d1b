use crate::cache::RepoCache;
use crate::storage::Storage;
use crate::Result;
use codenav_protocol::{has_supported_extension, CancelToken};
use git2::{Oid, Repository, Sort};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Default bound on newly computed commits per repository open.
pub const DEFAULT_COMPUTED_COMMITS_LIMIT: usize = 500;

/// Load shedding ahead of each computed diff, against pathological
/// histories and disk contention.
const DIFF_PAUSE: Duration = Duration::from_millis(2);

/// Bound on one tree diff; a diff that exceeds it ends mining for this
/// open and the partial result is used as-is.
const DIFF_TIMEOUT: Duration = Duration::from_secs(1);

/// One mined commit: the repository-relative (slash-separated) paths it
/// touched, filtered to supported extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub files: Vec<String>,
}

/// An open repository walk over commit history, newest first.
///
/// Cached commits are returned without touching the object database and
/// do not count toward the computed-commit limit; once the limit is
/// reached the walk ends regardless of how many cache hits preceded it.
pub struct Repo {
    key: String,
    cache: RepoCache,
    repo: Repository,
    oids: std::vec::IntoIter<Oid>,
    computed: usize,
    computed_limit: usize,
    worker: Option<DiffWorker>,
    done: bool,
}

impl Repo {
    pub fn open(root: &Path, computed_commits_limit: usize, storage: &Storage) -> Result<Repo> {
        let repo = Repository::discover(root)?;
        let key = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_string_lossy()
            .into_owned();
        let cache = storage.load_repo(&key)?;

        let oids = collect_history(&repo)?;
        log::debug!(
            "opened {key} with {} commits, {} cached",
            oids.len(),
            cache.num_commits()
        );

        Ok(Repo {
            key,
            cache,
            oids: oids.into_iter(),
            repo,
            computed: 0,
            computed_limit: computed_commits_limit,
            worker: None,
            done: false,
        })
    }

    /// Advance to the next single-parent commit. Merge and root commits
    /// are skipped; `None` means the walk is exhausted (or hit a bound).
    pub fn next(&mut self, cancel: &CancelToken) -> Result<Option<Commit>> {
        while !self.done {
            cancel.check()?;
            let Some(oid) = self.oids.next() else {
                self.done = true;
                break;
            };
            let parent_count = self.repo.find_commit(oid)?.parent_count();
            if parent_count != 1 {
                continue;
            }
            let hash = oid.to_string();
            if let Some(files) = self.cache.get(&hash) {
                return Ok(Some(Commit { files }));
            }

            if self.computed >= self.computed_limit {
                self.done = true;
                break;
            }
            thread::sleep(DIFF_PAUSE);
            let changed = match self.diff_with_timeout(oid) {
                Some(result) => result?,
                None => {
                    log::warn!("diff of {hash} exceeded {DIFF_TIMEOUT:?}, ending walk");
                    self.done = true;
                    break;
                }
            };
            let files: Vec<String> = changed
                .into_iter()
                .filter(|path| has_supported_extension(Path::new(path)))
                .collect();
            self.computed += 1;
            self.cache.insert(&hash, &files);
            return Ok(Some(Commit { files }));
        }
        Ok(None)
    }

    /// Persist this repository's cache back into the shared bundle.
    pub fn save(&self, storage: &Storage) -> Result<()> {
        storage.save_repo(&self.key, self.cache.clone())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Commits diffed (not served from cache) so far in this open.
    pub fn computed(&self) -> usize {
        self.computed
    }

    fn diff_with_timeout(
        &mut self,
        oid: Oid,
    ) -> Option<std::result::Result<Vec<String>, git2::Error>> {
        let git_dir = self.repo.path().to_path_buf();
        let worker = self
            .worker
            .get_or_insert_with(|| DiffWorker::spawn(git_dir));
        worker.diff(oid, DIFF_TIMEOUT)
    }
}

fn collect_history(repo: &Repository) -> Result<Vec<Oid>> {
    let mut revwalk = repo.revwalk()?;
    // Sorting must be configured before pushing: changing it resets the
    // walker.
    revwalk.set_sorting(Sort::TIME)?;
    if let Err(err) = revwalk.push_head() {
        // A repository without commits has no history to mine.
        if matches!(
            err.code(),
            git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
        ) {
            return Ok(Vec::new());
        }
        return Err(err.into());
    }
    Ok(revwalk.filter_map(|oid| oid.ok()).collect())
}

/// Computes tree diffs on its own thread so each one can be awaited with
/// a timeout. The worker owns a second handle to the repository; it exits
/// when the request channel closes.
struct DiffWorker {
    requests: mpsc::Sender<Oid>,
    responses: mpsc::Receiver<std::result::Result<Vec<String>, git2::Error>>,
}

impl DiffWorker {
    fn spawn(git_dir: PathBuf) -> DiffWorker {
        let (requests, request_rx) = mpsc::channel::<Oid>();
        let (response_tx, responses) = mpsc::channel();
        thread::spawn(move || {
            let repo = Repository::open(&git_dir);
            for oid in request_rx {
                let result = match &repo {
                    Ok(repo) => changed_paths(repo, oid),
                    Err(err) => Err(git2::Error::from_str(&err.to_string())),
                };
                if response_tx.send(result).is_err() {
                    break;
                }
            }
        });
        DiffWorker {
            requests,
            responses,
        }
    }

    /// `None` on timeout (or a dead worker); the caller stops mining.
    fn diff(
        &self,
        oid: Oid,
        timeout: Duration,
    ) -> Option<std::result::Result<Vec<String>, git2::Error>> {
        self.requests.send(oid).ok()?;
        self.responses.recv_timeout(timeout).ok()
    }
}

fn changed_paths(repo: &Repository, oid: Oid) -> std::result::Result<Vec<String>, git2::Error> {
    let commit = repo.find_commit(oid)?;
    let parent = commit.parent(0)?;
    let tree = commit.tree()?;
    let parent_tree = parent.tree()?;
    let diff = repo.diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)?;

    let mut paths = BTreeSet::new();
    for delta in diff.deltas() {
        for file in [delta.old_file(), delta.new_file()] {
            if let Some(path) = file.path().and_then(Path::to_str) {
                paths.insert(path.to_string());
            }
        }
    }
    Ok(paths.into_iter().collect())
}
