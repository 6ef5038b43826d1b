//! # Codenav Recommend
//!
//! The recommendation engine: a shingle-based TF-IDF similarity index
//! over project files, incrementally refreshed as files change, blended
//! with the co-edit signal mined by `codenav-history`.
//!
//! ## Pipeline
//!
//! ```text
//! Project root
//!     │
//!     ├──> Corpus walk (ignorer-pruned, capped, rate-limited)
//!     │      └─> Shingle document frequencies → IDF table
//!     │
//!     ├──> Vector set (fileID → sparse weighted vector)
//!     │      └─> Incremental refresh via watched directories
//!     │
//!     └──> Ranking (7/8 similarity + 1/8 co-edit graph)
//!            └─> Files, blocks, keywords
//! ```

mod file_index;
mod load;
mod recommend;
mod types;
mod vectorizer;

pub use recommend::{Options, Recommender};
pub use types::{Block, BlockRequest, File, Keyword, Location, Request};

use codenav_protocol::{CancelToken, FileId};

/// The recommendation contract consumed by the lifecycle layer.
pub trait Recommend: Send + Sync {
    /// Ranked related-file recommendations for the requested position.
    fn recommend(&self, cancel: &CancelToken, request: Request) -> Result<Vec<File>>;

    /// Block-level recommendations for a caller-supplied candidate set.
    fn recommend_blocks(&self, cancel: &CancelToken, request: BlockRequest) -> Result<Vec<File>>;

    /// Lexicographic listing of indexed paths and ancestor directories.
    fn ranked_files(&self) -> Result<Vec<File>>;

    /// Whether the underlying ignore rules changed since the build.
    fn should_rebuild(&self) -> Result<bool>;
}

impl Recommend for Recommender {
    fn recommend(&self, cancel: &CancelToken, request: Request) -> Result<Vec<File>> {
        Recommender::recommend(self, cancel, request)
    }

    fn recommend_blocks(&self, cancel: &CancelToken, request: BlockRequest) -> Result<Vec<File>> {
        Recommender::recommend_blocks(self, cancel, request)
    }

    fn ranked_files(&self) -> Result<Vec<File>> {
        Recommender::ranked_files(self)
    }

    fn should_rebuild(&self) -> Result<bool> {
        Recommender::should_rebuild(self)
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(thiserror::Error, Debug)]
pub enum RecommendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ignore error: {0}")]
    Ignore(#[from] codenav_ignore::IgnoreError),

    #[error("history error: {0}")]
    History(#[from] codenav_history::HistoryError),

    #[error("operation cancelled")]
    Cancelled(#[from] codenav_protocol::Cancelled),

    #[error("current path must be an absolute path")]
    RelativeCurrentPath,

    #[error("inspect path must be an absolute path")]
    RelativeInspectPath,

    #[error("invalid current line")]
    InvalidCurrentLine,

    #[error("max file size must be positive")]
    NonPositiveMaxFileSize,

    #[error("max files must be positive")]
    NonPositiveMaxFiles,

    #[error("opened too many files")]
    TooManyFiles,

    #[error("cannot use root")]
    RootUnusable,

    #[error("unknown file id {0}")]
    UnknownFileId(FileId),
}

impl RecommendError {
    /// The build cap was exceeded; recoverable only by tightening ignore
    /// rules and rebuilding.
    pub fn is_too_many_files(&self) -> bool {
        matches!(self, RecommendError::TooManyFiles)
    }

    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, RecommendError::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}
