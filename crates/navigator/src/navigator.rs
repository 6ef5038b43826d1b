use crate::iterator::FileIterator;
use crate::roots::{block_path, current_os, find_project_root, is_project_root, normalize};
use crate::terminator::Terminator;
use crate::{NavigateError, Result};
use codenav_history::{Storage, StorageOptions, DEFAULT_COMPUTED_COMMITS_LIMIT};
use codenav_ignore::{Ignorer, Options as IgnoreOptions};
use codenav_protocol::{has_supported_extension, CancelToken, MetricsSink};
use codenav_recommend::{Options as RecommendOptions, Recommend, Recommender, Request};
use lru::LruCache;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

const DEFAULT_MAX_PROJECTS: usize = 4;

/// Where a project currently is in its lifecycle.
///
/// Inactive → InProgress → {Active | Failed | IgnorerFailed}; Active
/// returns to InProgress when a rebuild condition is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    Inactive,
    InProgress,
    Active,
    Failed,
    IgnorerFailed,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProjectStatus::Inactive => "inactive",
            ProjectStatus::InProgress => "in progress",
            ProjectStatus::Active => "active",
            ProjectStatus::Failed => "failed",
            ProjectStatus::IgnorerFailed => "ignorer failed",
        };
        f.write_str(name)
    }
}

/// Status probe result for one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub status: ProjectStatus,
    pub root: PathBuf,
    /// Failure recorded by the last build, for Failed/IgnorerFailed.
    pub error: Option<String>,
}

/// Options for [`Navigator::new`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Mine commit history during builds.
    pub use_commits: bool,
    pub computed_commits_limit: usize,
    /// Commit-cache storage shared by all projects.
    pub storage: StorageOptions,
    /// Bound on concurrently resident projects; 0 means the default.
    pub max_projects: usize,
    /// Ignore file names consulted at each project root.
    pub ignore_filenames: Vec<String>,
    /// Patterns used when no ignore file exists.
    pub fallback_ignore_patterns: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            use_commits: true,
            computed_commits_limit: DEFAULT_COMPUTED_COMMITS_LIMIT,
            storage: StorageOptions::default(),
            max_projects: DEFAULT_MAX_PROJECTS,
            ignore_filenames: vec![".gitignore".to_string(), ".ignore".to_string()],
            fallback_ignore_patterns: vec![".*".to_string()],
        }
    }
}

/// The unit cached per project root.
struct ProjectState {
    status: ProjectStatus,
    last_used: Instant,
    ignorer: Option<Arc<Ignorer>>,
    recommender: Option<Arc<dyn Recommend>>,
    error: Option<String>,
    /// The failure was the file-open cap; retryable after an ignore-file
    /// change tightens the rules.
    too_many_files: bool,
}

impl ProjectState {
    fn inactive() -> ProjectState {
        ProjectState {
            status: ProjectStatus::Inactive,
            last_used: Instant::now(),
            ignorer: None,
            recommender: None,
            error: None,
            too_many_files: false,
        }
    }
}

struct ProjectNavigator {
    state: Mutex<ProjectState>,
}

type LoadFn = Arc<
    dyn Fn(&CancelToken, &Storage, IgnoreOptions, RecommendOptions, Arc<MetricsSink>) -> ProjectState
        + Send
        + Sync,
>;
type RootProbe = Arc<dyn Fn(&Path) -> io::Result<bool> + Send + Sync>;

/// Per-project lifecycle manager behind a bounded LRU of project roots.
///
/// The request path never blocks on a build: `navigate` answers with a
/// "should load" or "still indexing" sentinel instead, and the expensive
/// build happens in [`Navigator::maybe_load`], serialized navigator-wide
/// through a single-slot admission gate.
pub struct Navigator {
    projects: Mutex<LruCache<PathBuf, Arc<ProjectNavigator>>>,
    storage: Arc<Storage>,
    metrics: Arc<MetricsSink>,
    indexing: Arc<Semaphore>,
    term: Terminator,
    opts: Options,
    load: LoadFn,
    is_project_root: RootProbe,
}

impl Navigator {
    pub fn new(opts: Options) -> Result<Navigator> {
        let storage = Arc::new(Storage::new(opts.storage.clone())?);
        let probe: RootProbe = Arc::new(is_project_root);
        Ok(Navigator::with_hooks(
            opts,
            storage,
            Arc::new(load_project),
            probe,
        ))
    }

    fn with_hooks(
        opts: Options,
        storage: Arc<Storage>,
        load: LoadFn,
        is_project_root: RootProbe,
    ) -> Navigator {
        let max_projects = if opts.max_projects == 0 {
            DEFAULT_MAX_PROJECTS
        } else {
            opts.max_projects
        };
        Navigator {
            projects: Mutex::new(LruCache::new(
                NonZeroUsize::new(max_projects).unwrap_or(NonZeroUsize::MIN),
            )),
            storage,
            metrics: Arc::new(MetricsSink::new()),
            indexing: Arc::new(Semaphore::new(1)),
            term: Terminator::new(),
            opts,
            load,
            is_project_root,
        }
    }

    /// Engine counters for the embedding layer to snapshot and reset.
    pub fn metrics(&self) -> Arc<MetricsSink> {
        Arc::clone(&self.metrics)
    }

    /// Answer a navigation request from whatever state currently exists.
    ///
    /// Returns [`NavigateError::ShouldLoad`] when the project needs a
    /// (re)build and [`NavigateError::StillIndexing`] while one is in
    /// flight; callers trigger `maybe_load` asynchronously and retry
    /// rather than waiting here.
    pub fn navigate(&self, request: Request) -> Result<FileIterator> {
        if self.term.was_terminated() {
            return Err(NavigateError::Terminated);
        }
        request.location.validate()?;
        let root = self.resolve_root(&request.location.current_path)?;
        let project = self.get_or_insert(&root);

        let recommender = {
            let mut state = project.state.lock().unwrap_or_else(|e| e.into_inner());
            state.last_used = Instant::now();
            match state.status {
                ProjectStatus::Inactive => return Err(NavigateError::ShouldLoad),
                ProjectStatus::InProgress => return Err(NavigateError::StillIndexing),
                ProjectStatus::IgnorerFailed => return Err(NavigateError::BuildFailed),
                ProjectStatus::Failed => {
                    if state.too_many_files && ignorer_changed(&state.ignorer) {
                        return Err(NavigateError::ShouldLoad);
                    }
                    return Err(NavigateError::BuildFailed);
                }
                ProjectStatus::Active => match &state.recommender {
                    Some(recommender) => Arc::clone(recommender),
                    None => return Err(NavigateError::BuildFailed),
                },
            }
        };

        if recommender.should_rebuild().unwrap_or(false) {
            return Err(NavigateError::ShouldLoad);
        }
        let cancel = CancelToken::new();
        let ranked = recommender.recommend(&cancel, request.clone())?;
        Ok(FileIterator::new(recommender, request, cancel, ranked))
    }

    /// Build (or rebuild) the project owning `path` if it needs one.
    ///
    /// Cheap when the project is fresh. At most one build runs per
    /// navigator; a caller losing the admission race returns immediately
    /// instead of queueing behind a multi-second build.
    pub async fn maybe_load(&self, path: &Path, max_file_size: u64, max_files: usize) {
        if self.term.was_terminated() {
            return;
        }
        let Ok(root) = self.resolve_root(path) else {
            return;
        };
        let project = self.get_or_insert(&root);
        {
            let mut state = project.state.lock().unwrap_or_else(|e| e.into_inner());
            state.last_used = Instant::now();
            match state.status {
                ProjectStatus::InProgress => return,
                ProjectStatus::Active => {
                    let stale = match &state.recommender {
                        Some(recommender) => recommender.should_rebuild().unwrap_or(true),
                        None => true,
                    };
                    if !stale {
                        return;
                    }
                }
                ProjectStatus::Failed => {
                    if !state.too_many_files || !ignorer_changed(&state.ignorer) {
                        return;
                    }
                }
                ProjectStatus::Inactive | ProjectStatus::IgnorerFailed => {}
            }
        }

        let Ok(permit) = Arc::clone(&self.indexing).try_acquire_owned() else {
            return;
        };
        {
            let mut state = project.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.status == ProjectStatus::InProgress {
                return;
            }
            state.status = ProjectStatus::InProgress;
        }

        let cancel = CancelToken::new();
        if !self.term.register(cancel.clone()) {
            let mut state = project.state.lock().unwrap_or_else(|e| e.into_inner());
            state.status = ProjectStatus::Inactive;
            return;
        }

        log::info!("building project {}", root.display());
        let load = Arc::clone(&self.load);
        let storage = Arc::clone(&self.storage);
        let metrics = Arc::clone(&self.metrics);
        let ignore_opts = IgnoreOptions {
            root: root.clone(),
            ignore_filenames: self.opts.ignore_filenames.clone(),
            fallback_patterns: self.opts.fallback_ignore_patterns.clone(),
        };
        let rec_opts = RecommendOptions {
            use_commits: self.opts.use_commits,
            computed_commits_limit: self.opts.computed_commits_limit,
            root: root.clone(),
            max_file_size,
            max_files,
            keep_underscores: false,
        };
        let build_cancel = cancel.clone();
        let result = tokio::task::spawn_blocking(move || {
            load(&build_cancel, &storage, ignore_opts, rec_opts, metrics)
        })
        .await;
        self.term.clear();

        let built = match result {
            Ok(state) => state,
            Err(err) => {
                log::warn!("project build panicked: {err}");
                ProjectState {
                    status: ProjectStatus::Failed,
                    error: Some(err.to_string()),
                    ..ProjectState::inactive()
                }
            }
        };
        {
            let mut state = project.state.lock().unwrap_or_else(|e| e.into_inner());
            *state = built;
            state.last_used = Instant::now();
        }
        drop(permit);
    }

    /// Resolve a path to its project and report the project's status.
    /// An unknown root is allocated as an Inactive placeholder.
    pub fn project_info(&self, path: &Path) -> Result<ProjectInfo> {
        let root = self.resolve_root(path)?;
        let project = self.get_or_insert(&root);
        let state = project.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(ProjectInfo {
            status: state.status,
            root,
            error: state.error.clone(),
        })
    }

    /// Evict Active projects idle for longer than `idle`, bounding
    /// resident memory across many opened projects.
    pub fn maybe_unload(&self, idle: Duration) {
        let mut projects = self.projects.lock().unwrap_or_else(|e| e.into_inner());
        let stale: Vec<PathBuf> = projects
            .iter()
            .filter_map(|(root, project)| {
                let state = project.state.lock().unwrap_or_else(|e| e.into_inner());
                (state.status == ProjectStatus::Active && state.last_used.elapsed() > idle)
                    .then(|| root.clone())
            })
            .collect();
        for root in stale {
            projects.pop(&root);
            log::info!("unloaded idle project {}", root.display());
        }
    }

    /// Cancel the in-flight build (if any) and refuse all further calls.
    pub fn terminate(&self) {
        self.term.terminate();
    }

    pub fn was_terminated(&self) -> bool {
        self.term.was_terminated()
    }

    fn resolve_root(&self, path: &Path) -> Result<PathBuf> {
        let os = current_os();
        let normalized = PathBuf::from(normalize(os, &path.to_string_lossy()));
        if !normalized.is_absolute() {
            return Err(NavigateError::NotInProject);
        }
        if !has_supported_extension(&normalized) {
            return Err(NavigateError::UnsupportedExtension);
        }
        if let Some(err) = block_path(os, &normalized) {
            return Err(err);
        }
        find_project_root(&normalized, self.is_project_root.as_ref())
    }

    fn get_or_insert(&self, root: &Path) -> Arc<ProjectNavigator> {
        let mut projects = self.projects.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(project) = projects.get(root) {
            return Arc::clone(project);
        }
        let project = Arc::new(ProjectNavigator {
            state: Mutex::new(ProjectState::inactive()),
        });
        projects.push(root.to_path_buf(), Arc::clone(&project));
        project
    }
}

fn ignorer_changed(ignorer: &Option<Arc<Ignorer>>) -> bool {
    ignorer
        .as_ref()
        .is_some_and(|ignorer| ignorer.should_rebuild().unwrap_or(false))
}

/// The real build: ignorer first, then the recommender through it.
fn load_project(
    cancel: &CancelToken,
    storage: &Storage,
    ignore_opts: IgnoreOptions,
    rec_opts: RecommendOptions,
    metrics: Arc<MetricsSink>,
) -> ProjectState {
    let ignorer = match Ignorer::new(ignore_opts) {
        Ok(ignorer) => Arc::new(ignorer),
        Err(err) => {
            log::warn!("ignorer build failed: {err}");
            return ProjectState {
                status: ProjectStatus::IgnorerFailed,
                error: Some(err.to_string()),
                ..ProjectState::inactive()
            };
        }
    };

    match Recommender::new(cancel, rec_opts, Arc::clone(&ignorer), storage, metrics) {
        Ok(recommender) => ProjectState {
            status: ProjectStatus::Active,
            ignorer: Some(ignorer),
            recommender: Some(Arc::new(recommender)),
            ..ProjectState::inactive()
        },
        Err(err) => {
            log::warn!("project build failed: {err}");
            ProjectState {
                status: ProjectStatus::Failed,
                too_many_files: err.is_too_many_files(),
                ignorer: Some(ignorer),
                error: Some(err.to_string()),
                ..ProjectState::inactive()
            }
        }
    }
}
