use crate::{RecommendError, Result};
use codenav_protocol::FileId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The requested position: an absolute file path and an optional 1-based
/// cursor line (0 means "no specific line").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "filename")]
    pub current_path: PathBuf,
    #[serde(rename = "line", default, skip_serializing_if = "is_zero")]
    pub current_line: usize,
}

fn is_zero(line: &usize) -> bool {
    *line == 0
}

impl Location {
    pub fn validate(&self) -> Result<()> {
        if !self.current_path.is_absolute() {
            return Err(RecommendError::RelativeCurrentPath);
        }
        Ok(())
    }
}

/// Request for [`crate::Recommender::recommend`].
///
/// Limits use `-1` for unlimited and `0` for none.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Skip the incremental refresh before ranking; used by low-latency
    /// repeat calls that tolerate a slightly stale index.
    pub skip_refresh: bool,

    pub max_file_recs: i32,
    pub max_block_recs: i32,
    pub max_file_keywords: i32,
    pub max_block_keywords: i32,

    pub location: Location,
    /// In-memory contents used instead of reading `location.current_path`.
    pub buffer_contents: Option<Vec<u8>>,
}

impl Request {
    pub(crate) fn validate(&self) -> Result<()> {
        self.location.validate()
    }
}

/// Request for [`crate::Recommender::recommend_blocks`].
#[derive(Debug, Clone, Default)]
pub struct BlockRequest {
    pub request: Request,
    /// Typically the files returned by `recommend`, blocks and keywords
    /// not yet filled in.
    pub inspect_files: Vec<File>,
}

impl BlockRequest {
    pub(crate) fn validate(&self) -> Result<()> {
        for file in &self.inspect_files {
            if !file.path.is_absolute() {
                return Err(RecommendError::RelativeInspectPath);
            }
        }
        self.request.location.validate()
    }
}

/// One recommended file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(rename = "absolute_path")]
    pub path: PathBuf,
    #[serde(rename = "score")]
    pub probability: f64,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,

    #[serde(skip)]
    pub(crate) id: Option<FileId>,
}

impl File {
    pub fn with_path(path: impl Into<PathBuf>) -> File {
        File {
            path: path.into(),
            ..File::default()
        }
    }
}

/// A code block inside a recommended file.
///
/// Line numbers use 1-based indexing; both bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub content: String,
    #[serde(rename = "firstline")]
    pub first_line: usize,
    #[serde(rename = "lastline")]
    pub last_line: usize,
    #[serde(rename = "score")]
    pub probability: f64,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

/// An identifier-like token explaining a recommendation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    #[serde(rename = "keyword")]
    pub word: String,
    #[serde(skip)]
    pub score: f64,
}

/// Apply a request limit: negative means unlimited.
pub(crate) fn truncate_to_limit<T>(items: &mut Vec<T>, limit: i32) {
    if limit >= 0 && items.len() > limit as usize {
        items.truncate(limit as usize);
    }
}
