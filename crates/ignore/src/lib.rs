//! # Codenav Ignore
//!
//! Gitignore-style path exclusion for the recommendation engine.
//!
//! An [`Ignorer`] is built once per project from up to two ignore files
//! found at the project root (or literal fallback patterns when none
//! exist). Raw lines are normalized by the munger, parsed into simple or
//! double-star patterns, and folded in file order so that later patterns
//! override earlier ones.
//!
//! Exclusion is judged one path at a time: callers walking a tree are
//! expected to prune ignored directories themselves, so a file is never
//! re-included once an ancestor directory was excluded.

mod ignorer;
mod munge;
mod pattern;

pub use ignorer::{Ignorer, Options};

pub type Result<T> = std::result::Result<T, IgnoreError>;

#[derive(thiserror::Error, Debug)]
pub enum IgnoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
