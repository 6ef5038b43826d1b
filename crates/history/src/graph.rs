use codenav_protocol::FileId;
use std::collections::{HashMap, HashSet};

/// Per-process commit identity, assigned sequentially while mining.
/// Like file ids, commit ids are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    /// Weight of the query-independent edit score relative to the co-edit
    /// score. Kept an order of magnitude below 1 so shared commits
    /// dominate ranking.
    pub edit_weight: f64,
    /// Added to the per-query score total before normalizing, damping
    /// probabilities on sparsely-connected files.
    pub regularization: f64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            edit_weight: 0.1,
            regularization: 1.0,
        }
    }
}

/// Bipartite file↔commit structure with additive scoring.
///
/// Rebuilt from scratch on every mining pass, never patched in place.
#[derive(Debug, Default)]
pub struct CommitGraph {
    files: HashMap<FileId, Vec<CommitId>>,
    edit_size: HashMap<CommitId, u32>,
    edit_scores: HashMap<FileId, f64>,
    total_edit_score: f64,
    opts: GraphOptions,
}

impl CommitGraph {
    /// Build from the mined file→commits table. Fan-out counts and edit
    /// scores are precomputed here; `recommend` only sums cached values.
    pub fn new(files: HashMap<FileId, Vec<CommitId>>, opts: GraphOptions) -> CommitGraph {
        let mut edit_size: HashMap<CommitId, u32> = HashMap::new();
        for edits in files.values() {
            for &edit in edits {
                *edit_size.entry(edit).or_insert(0) += 1;
            }
        }

        let mut edit_scores = HashMap::with_capacity(files.len());
        let mut total_edit_score = 0.0;
        for (&file, edits) in &files {
            let score: f64 = edits
                .iter()
                .map(|edit| opts.edit_weight / f64::from(edit_size[edit]))
                .sum();
            edit_scores.insert(file, score);
            total_edit_score += score;
        }

        CommitGraph {
            files,
            edit_size,
            edit_scores,
            total_edit_score,
            opts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    pub fn num_commits(&self) -> usize {
        self.edit_size.len()
    }

    /// Probability-like scores for files related to `current`.
    ///
    /// co-edit = Σ 1/fan-out over commits shared with `current`;
    /// candidate score = co-edit + precomputed edit score; zero scores are
    /// dropped and the rest normalized by (total + regularization).
    pub fn recommend(&self, current: FileId) -> Vec<(FileId, f64)> {
        let current_commits: HashSet<CommitId> = self
            .files
            .get(&current)
            .map(|edits| edits.iter().copied().collect())
            .unwrap_or_default();

        let mut scored = Vec::new();
        let mut total = 0.0;
        for (&file, edits) in &self.files {
            if file == current {
                continue;
            }
            let mut coedit = 0.0;
            for edit in edits {
                if current_commits.contains(edit) {
                    coedit += 1.0 / f64::from(self.edit_size[edit]);
                }
            }
            let score = coedit + self.edit_scores[&file];
            if score == 0.0 {
                continue;
            }
            total += score;
            scored.push((file, score));
        }

        let normalizer = total + self.opts.regularization;
        for (_, score) in &mut scored {
            *score /= normalizer;
        }
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored
    }
}
