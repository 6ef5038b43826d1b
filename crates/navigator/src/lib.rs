//! # Codenav Navigator
//!
//! Per-project lifecycle for the recommendation engine.
//!
//! A [`Navigator`] resolves request paths to project roots, caches one
//! state machine per root in a bounded LRU, and coordinates builds so
//! that the request path never waits on one: at most one build runs at a
//! time, a request arriving mid-build gets a distinguishable "still
//! indexing" signal, and an unbuilt project answers "should load" so the
//! caller can trigger [`Navigator::maybe_load`] asynchronously and retry.
//!
//! Callers distinguish outcomes by matching on [`NavigateError`]
//! variants, never by string inspection.

mod iterator;
mod navigator;
mod roots;
mod terminator;

pub use iterator::FileIterator;
pub use navigator::{Navigator, Options, ProjectInfo, ProjectStatus};

pub type Result<T> = std::result::Result<T, NavigateError>;

#[derive(thiserror::Error, Debug)]
pub enum NavigateError {
    /// The project has no built index yet; trigger `maybe_load` and retry.
    #[error("project should be loaded")]
    ShouldLoad,

    /// A build is in flight; retry once it settles.
    #[error("project is still indexing")]
    StillIndexing,

    /// The last build failed and the failure is not retryable as-is.
    #[error("project build failed")]
    BuildFailed,

    #[error("path is not in a tracked project")]
    NotInProject,

    #[error("path has an unsupported extension")]
    UnsupportedExtension,

    #[error("path is in a filtered directory")]
    FilteredDirectory,

    #[error("navigator was terminated")]
    Terminated,

    #[error("iterator is exhausted")]
    EmptyIterator,

    #[error("batch size must be positive")]
    NonPositiveBatchSize,

    #[error("recommend error: {0}")]
    Recommend(#[from] codenav_recommend::RecommendError),

    #[error("history error: {0}")]
    History(#[from] codenav_history::HistoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
