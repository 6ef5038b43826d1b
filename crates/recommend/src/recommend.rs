use crate::file_index::FileIndex;
use crate::load::FileOpener;
use crate::types::{truncate_to_limit, Block, BlockRequest, File, Keyword, Request};
use crate::vectorizer::Vectorizer;
use crate::{RecommendError, Result};
use codenav_history::{CommitGraph, Storage};
use codenav_protocol::{CancelToken, FileId, MetricsSink};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Options for [`Recommender::new`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Mine commit history into a co-edit graph and blend its scores in.
    pub use_commits: bool,
    /// Bound on newly computed commits per build; cache hits are free.
    pub computed_commits_limit: usize,
    /// Project root everything is indexed relative to.
    pub root: PathBuf,
    /// Files larger than this are excluded and reads are capped to it.
    pub max_file_size: u64,
    /// Opening more unique files than this aborts the build.
    pub max_files: usize,

    /// Keep underscores when shingling instead of stripping them.
    pub keep_underscores: bool,
}

impl Options {
    fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(RecommendError::NonPositiveMaxFileSize);
        }
        if self.max_files == 0 {
            return Err(RecommendError::NonPositiveMaxFiles);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Parameters {
    pub vectorizer_coef: f64,
    pub graph_coef: f64,
    pub max_file_opens_per_second: u32,
    pub max_matrix_size: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            vectorizer_coef: 1.0,
            graph_coef: 0.0,
            max_file_opens_per_second: 500,
            max_matrix_size: 10_000_000,
        }
    }
}

/// Recommends related files and code blocks for a position in a project.
///
/// Building one runs the full corpus scan (and, with `use_commits`, the
/// history mining); afterwards every method takes `&self` and is safe to
/// call from many threads.
#[derive(Debug)]
pub struct Recommender {
    pub(crate) file_index: FileIndex,
    pub(crate) graph: Option<CommitGraph>,
    pub(crate) vectorizer: Vectorizer,
    pub(crate) opener: FileOpener,
    pub(crate) ignorer: Arc<codenav_ignore::Ignorer>,
    pub(crate) metrics: Arc<MetricsSink>,
    pub(crate) params: Parameters,
    pub(crate) opts: Options,
}

impl Recommender {
    pub fn new(
        cancel: &CancelToken,
        opts: Options,
        ignorer: Arc<codenav_ignore::Ignorer>,
        storage: &Storage,
        metrics: Arc<MetricsSink>,
    ) -> Result<Recommender> {
        let start = Instant::now();
        opts.validate()?;

        let params = Parameters::default();
        let mut r = Recommender {
            file_index: FileIndex::new(),
            graph: None,
            vectorizer: Vectorizer::empty(opts.keep_underscores),
            opener: FileOpener::new(opts.max_files, params.max_file_opens_per_second),
            ignorer,
            metrics,
            params,
            opts,
        };

        // Load the vectorizer before the graph: the vectorizer pass owns
        // counting files and fast-failing when there are too many.
        r.load_vectorizer(cancel)?;
        r.metrics
            .record_index(start.elapsed(), r.opener.counter_size() as u64);
        r.opener.release_max();

        if !r.opts.use_commits {
            return Ok(r);
        }
        r.graph = Some(r.load_graph(cancel, storage)?);
        r.params.vectorizer_coef = 7.0 / 8.0;
        r.params.graph_coef = 1.0 / 8.0;
        Ok(r)
    }

    /// Ranked related-file recommendations for the requested position.
    pub fn recommend(&self, cancel: &CancelToken, request: Request) -> Result<Vec<File>> {
        request.validate()?;
        let current_id = self.file_index.to_id(&request.location.current_path);
        let contents = self.base_content(&request)?;
        let content = String::from_utf8_lossy(&contents).into_owned();
        self.recommend_files(cancel, current_id, &content, &request)
    }

    /// Block-level recommendations for a caller-supplied candidate set,
    /// typically the files a prior `recommend` returned.
    pub fn recommend_blocks(
        &self,
        cancel: &CancelToken,
        request: BlockRequest,
    ) -> Result<Vec<File>> {
        let start = Instant::now();
        request.validate()?;
        let contents = self.base_content(&request.request)?;
        let base = String::from_utf8_lossy(&contents).into_owned();

        let mut files = Vec::new();
        for inspect in &request.inspect_files {
            cancel.check()?;
            let contents = self.read(&inspect.path)?;
            let inspect_content = String::from_utf8_lossy(&contents);
            let (blocks, keywords) =
                self.blocks_and_keywords(&base, &inspect_content, &request.request)?;
            files.push(File {
                path: inspect.path.clone(),
                probability: inspect.probability,
                blocks,
                keywords,
                id: None,
            });
        }
        self.metrics.record_batch(start.elapsed(), files.len() as u64);
        Ok(files)
    }

    /// Deterministic lexicographic listing of every indexed path plus the
    /// ancestor directories linking them to the root, for tree rendering.
    /// Not a relevance ranking.
    pub fn ranked_files(&self) -> Result<Vec<File>> {
        let vectors = self
            .vectorizer
            .vector_set
            .data
            .read()
            .unwrap_or_else(|e| e.into_inner());

        let root = self.opts.root.clone();
        let mut files = vec![File::with_path(root.clone())];
        let mut seen: HashSet<PathBuf> = HashSet::new();
        seen.insert(root);
        for &id in vectors.keys() {
            let leaf = self
                .file_index
                .from_id(id)
                .ok_or_else(|| RecommendError::UnknownFileId(id))?;
            let mut path = leaf;
            while !seen.contains(&path) {
                files.push(File::with_path(path.clone()));
                seen.insert(path.clone());
                let Some(parent) = path.parent() else {
                    break;
                };
                path = parent.to_path_buf();
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Whether the ignore rules changed since this recommender was built.
    pub fn should_rebuild(&self) -> Result<bool> {
        self.ignorer.should_rebuild().map_err(Into::into)
    }

    fn recommend_files(
        &self,
        cancel: &CancelToken,
        current_id: FileId,
        content: &str,
        request: &Request,
    ) -> Result<Vec<File>> {
        let start = Instant::now();
        let mut graph_probs: HashMap<FileId, f64> = HashMap::new();
        if let Some(graph) = &self.graph {
            for (id, probability) in graph.recommend(current_id) {
                graph_probs.insert(id, probability);
            }
        }

        let mut num_refreshed = 0;
        if !request.skip_refresh {
            num_refreshed = self.refresh_vector_set(cancel)?;
        }

        let mut recs =
            self.vectorizer
                .recommend_files(current_id, content, request.location.current_line)?;
        for rec in &mut recs {
            let Some(id) = rec.id else {
                continue;
            };
            let vectorizer_part = rec.probability * self.params.vectorizer_coef;
            let graph_part =
                graph_probs.get(&id).copied().unwrap_or(0.0) * self.params.graph_coef;
            rec.path = self
                .file_index
                .from_id(id)
                .ok_or(RecommendError::UnknownFileId(id))?;
            rec.probability = vectorizer_part + graph_part;
        }
        recs.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });

        let num_files = recs.len();
        truncate_to_limit(&mut recs, request.max_file_recs);
        self.metrics
            .record_rank(start.elapsed(), num_files as u64, num_refreshed as u64);
        Ok(recs)
    }

    fn blocks_and_keywords(
        &self,
        base: &str,
        inspect: &str,
        request: &Request,
    ) -> Result<(Vec<Block>, Vec<Keyword>)> {
        if request.max_block_recs == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        let mut blocks = self.vectorizer.recommend_blocks(
            base,
            inspect,
            request.location.current_line,
            request.max_block_keywords,
        )?;
        truncate_to_limit(&mut blocks, request.max_block_recs);

        // A word may appear in several blocks but counts once per file.
        let mut keywords: Vec<Keyword> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for block in &blocks {
            for keyword in &block.keywords {
                if seen.insert(keyword.word.clone()) {
                    keywords.push(keyword.clone());
                }
            }
        }
        keywords.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.word.cmp(&b.word))
        });
        truncate_to_limit(&mut keywords, request.max_file_keywords);
        Ok((blocks, keywords))
    }

    fn base_content(&self, request: &Request) -> Result<Vec<u8>> {
        if let Some(contents) = &request.buffer_contents {
            return Ok(contents.clone());
        }
        self.read(&request.location.current_path)
    }
}
