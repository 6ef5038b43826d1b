//! # Codenav History
//!
//! Co-edit signal mined from version-control history.
//!
//! A [`Repo`] walks commit history in committer-time order, diffing each
//! single-parent commit against its parent to find the files it touched.
//! Results are cached per repository in a [`Storage`]-backed bundle so
//! that across runs only new commits cost a diff; the bundle is capped by
//! serialized size and evicts least-recently-used repositories wholesale.
//!
//! The mined file↔commit structure is scored by a [`CommitGraph`]: files
//! sharing narrow commits with the queried file rank highest, with a small
//! query-independent activity bonus.

mod cache;
mod graph;
mod repo;
mod storage;

pub use graph::{CommitGraph, CommitId, GraphOptions};
pub use repo::{Commit, Repo, DEFAULT_COMPUTED_COMMITS_LIMIT};
pub use storage::{Storage, StorageOptions};

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("corrupt commit cache: {0}")]
    CorruptCache(serde_json::Error),

    #[error("operation cancelled")]
    Cancelled(#[from] codenav_protocol::Cancelled),
}
