use crate::{NavigateError, Result};
use codenav_protocol::CancelToken;
use codenav_recommend::{BlockRequest, File, Recommend, Request};
use std::sync::Arc;

/// Lazily computes block-level recommendations for a batch of
/// already-ranked files on each [`FileIterator::next`] call, deferring
/// the more expensive block scoring until the caller actually consumes a
/// page of results.
pub struct FileIterator {
    recommender: Arc<dyn Recommend>,
    request: Request,
    cancel: CancelToken,
    ranked: Vec<File>,
    position: usize,
}

impl FileIterator {
    pub(crate) fn new(
        recommender: Arc<dyn Recommend>,
        request: Request,
        cancel: CancelToken,
        ranked: Vec<File>,
    ) -> FileIterator {
        FileIterator {
            recommender,
            request,
            cancel,
            ranked,
            position: 0,
        }
    }

    /// The next up-to-`n` ranked files with their blocks and keywords
    /// filled in. A short batch is returned near the end; exhaustion is
    /// the [`NavigateError::EmptyIterator`] sentinel; `n == 0` is a usage
    /// error.
    pub fn next(&mut self, n: usize) -> Result<Vec<File>> {
        if n == 0 {
            return Err(NavigateError::NonPositiveBatchSize);
        }
        if self.position >= self.ranked.len() {
            return Err(NavigateError::EmptyIterator);
        }
        let end = (self.position + n).min(self.ranked.len());
        let batch = self.ranked[self.position..end].to_vec();
        self.position = end;

        let files = self.recommender.recommend_blocks(
            &self.cancel,
            BlockRequest {
                request: self.request.clone(),
                inspect_files: batch,
            },
        )?;
        Ok(files)
    }

    /// Files ranked but not yet consumed.
    pub fn remaining(&self) -> usize {
        self.ranked.len() - self.position
    }
}
