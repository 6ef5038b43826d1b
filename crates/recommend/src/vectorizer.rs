use crate::types::{truncate_to_limit, Block, File, Keyword};
use crate::{RecommendError, Result};
use codenav_protocol::FileId;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};
use std::time::SystemTime;

/// Fixed-width integer encoding of a lowercase character run: 5 bits per
/// character, 5 characters per shingle, wildcard buckets for non a–z
/// letters. 25 bits used of 32.
pub(crate) type Shingle = u32;

const WORD_PATTERN: &str = "[a-zA-Z0-9_]+";

#[derive(Debug, Clone, Copy)]
pub(crate) struct Localization {
    /// Window half-width in lines; the cursor line repeats `size` times.
    pub size: usize,
    /// Mixing weight of the localized covector against the whole file.
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct VectorizerOptions {
    pub shingle_size: usize,
    pub keep_underscores: bool,

    /// Added to the candidate norm when scoring, damping tiny-file bias.
    pub score_regularization: f32,
    /// Added to the probability total before normalizing.
    pub prob_regularization: f64,

    pub file_localization: Localization,
    pub block_localization: Localization,
}

impl Default for VectorizerOptions {
    fn default() -> Self {
        Self {
            shingle_size: 5,
            keep_underscores: false,
            score_regularization: 10.0,
            prob_regularization: 0.05,
            file_localization: Localization {
                size: 20,
                weight: 0.5,
            },
            block_localization: Localization {
                size: 10,
                weight: 0.75,
            },
        }
    }
}

/// Sparse weighted representation of one file's or block's content.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShingleVector {
    pub coords: Vec<(Shingle, f32)>,
    pub norm: f32,
    pub mod_time: Option<SystemTime>,
}

impl ShingleVector {
    pub fn to_covector(&self) -> ShingleCovector {
        ShingleCovector {
            coords: self.coords.iter().copied().collect(),
            norm: self.norm,
        }
    }
}

/// Query-side representation: dense lookup plus cached norm.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShingleCovector {
    pub coords: HashMap<Shingle, f32>,
    pub norm: f32,
}

/// fileID → vector map under a reader/writer lock: many concurrent
/// scorers, one refresher. Entries are always replaced wholesale so a
/// reader never observes a half-updated vector.
#[derive(Debug, Default)]
pub(crate) struct VectorSet {
    pub data: RwLock<HashMap<FileId, ShingleVector>>,
}

/// Batched refresh outcome, applied under one writer lock.
#[derive(Debug, Default)]
pub(crate) struct VectorSetChanges {
    pub updates: HashMap<FileId, ShingleVector>,
    pub deletes: Vec<FileId>,
}

impl VectorSetChanges {
    pub fn add(&mut self, other: VectorSetChanges) {
        self.updates.extend(other.updates);
        self.deletes.extend(other.deletes);
    }
}

impl VectorSet {
    pub fn update(&self, changes: VectorSetChanges) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        for id in changes.deletes {
            data.remove(&id);
        }
        for (id, vector) in changes.updates {
            data.insert(id, vector);
        }
    }
}

/// Directory → modification time map used to detect additions and
/// removals without a full rescan.
#[derive(Debug, Default)]
pub(crate) struct WatchDirs {
    pub data: Mutex<HashMap<PathBuf, SystemTime>>,
}

/// Corpus-wide document-frequency counter, the first of the two build
/// passes.
#[derive(Debug)]
pub(crate) struct ShingleCounter {
    counts: HashMap<Shingle, usize>,
    size: usize,
    shingle_size: usize,
    keep_underscores: bool,
}

impl ShingleCounter {
    pub fn new(keep_underscores: bool) -> ShingleCounter {
        ShingleCounter {
            counts: HashMap::new(),
            size: 0,
            shingle_size: 5,
            keep_underscores,
        }
    }

    pub fn add(&mut self, content: &str) {
        self.size += 1;
        for shingle in count_shingles(content, self.shingle_size, self.keep_underscores).into_keys()
        {
            *self.counts.entry(shingle).or_insert(0) += 1;
        }
    }

    /// Finish the corpus pass: compute the probabilistic IDF table,
    /// ln((N−df)/df), keeping only positive values. A shingle occurring
    /// in at least half the documents carries no signal and is dropped.
    pub fn into_vectorizer(self) -> Vectorizer {
        let mut idf = HashMap::new();
        for (shingle, count) in &self.counts {
            let value = ((self.size as f64 - *count as f64) / *count as f64).ln() as f32;
            if value > 0.0 {
                idf.insert(*shingle, value);
            }
        }

        Vectorizer {
            idf,
            vector_set: VectorSet::default(),
            watch_dirs: WatchDirs::default(),
            words: Regex::new(WORD_PATTERN).unwrap(),
            opts: VectorizerOptions {
                shingle_size: self.shingle_size,
                keep_underscores: self.keep_underscores,
                ..VectorizerOptions::default()
            },
        }
    }
}

#[derive(Debug)]
pub(crate) struct Vectorizer {
    idf: HashMap<Shingle, f32>,
    pub vector_set: VectorSet,
    pub watch_dirs: WatchDirs,
    words: Regex,
    pub opts: VectorizerOptions,
}

impl Vectorizer {
    /// Placeholder with an empty corpus; replaced by the build.
    pub fn empty(keep_underscores: bool) -> Vectorizer {
        ShingleCounter::new(keep_underscores).into_vectorizer()
    }

    pub fn make_vector(&self, content: &str) -> ShingleVector {
        let shingles = count_shingles(content, self.opts.shingle_size, self.opts.keep_underscores);
        let mut coords = Vec::new();
        for (shingle, tf) in shingles {
            let Some(&idf) = self.idf.get(&shingle) else {
                continue;
            };
            coords.push((shingle, (1.0 + tf as f64).ln() as f32 * idf));
        }
        let norm = vector_norm(&coords);
        ShingleVector {
            coords,
            norm,
            mod_time: None,
        }
    }

    fn score(&self, cov: &ShingleCovector, vec: &ShingleVector) -> f32 {
        let numerator = shingle_dot(&cov.coords, &vec.coords);
        let denominator = (vec.norm + self.opts.score_regularization) * cov.norm;
        if denominator == 0.0 {
            return 0.0;
        }
        numerator / denominator
    }

    /// Query covector for `content`, localized around `current_line` when
    /// one is set (non-zero).
    pub fn make_covector(
        &self,
        content: &str,
        current_line: usize,
        local: Localization,
    ) -> Result<ShingleCovector> {
        let global = self.make_vector(content).to_covector();
        if current_line == 0 {
            return Ok(global);
        }
        let curated = curate_local_content(content, current_line, local)?;
        let localized = self.make_vector(&curated).to_covector();
        Ok(mix_covectors(&global, &localized, local))
    }

    /// Score every indexed file against the covector built from the
    /// current content; the queried file is never recommended to itself.
    pub fn recommend_files(
        &self,
        current: FileId,
        content: &str,
        current_line: usize,
    ) -> Result<Vec<File>> {
        let cov = self.make_covector(content, current_line, self.opts.file_localization)?;
        Ok(self.recommend_files_from_covector(current, &cov))
    }

    fn recommend_files_from_covector(&self, current: FileId, cov: &ShingleCovector) -> Vec<File> {
        let data = self.vector_set.data.read().unwrap_or_else(|e| e.into_inner());

        let mut files = Vec::new();
        let mut total = 0.0f64;
        for (&id, vector) in data.iter() {
            if id == current {
                continue;
            }
            let probability = f64::from(self.score(cov, vector));
            if probability == 0.0 {
                continue;
            }
            total += probability;
            files.push(File {
                probability,
                id: Some(id),
                ..File::default()
            });
        }
        let normalizer = total + self.opts.prob_regularization;
        for file in &mut files {
            file.probability /= normalizer;
        }
        files.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        files
    }

    /// Score `inspect`'s blocks against a covector localized in `base`.
    pub fn recommend_blocks(
        &self,
        base: &str,
        inspect: &str,
        current_line: usize,
        max_block_keywords: i32,
    ) -> Result<Vec<Block>> {
        let cov = self.make_covector(base, current_line, self.opts.block_localization)?;

        let mut unnormalized = Vec::new();
        let mut total = 0.0f64;
        for mut block in split_blocks(inspect) {
            let vector = self.make_vector(&block.content);
            block.probability = f64::from(self.score(&cov, &vector));
            if block.probability == 0.0 {
                continue;
            }
            total += block.probability;
            block.keywords = self.find_keywords(&block.content, &cov, max_block_keywords);
            unnormalized.push(block);
        }
        let normalizer = total + self.opts.prob_regularization;
        for block in &mut unnormalized {
            block.probability /= normalizer;
        }
        unnormalized.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.first_line.cmp(&b.first_line))
        });
        Ok(unnormalized)
    }

    /// Identifier-like tokens of `content` scored against the covector,
    /// highest first, ties broken by word.
    pub fn find_keywords(
        &self,
        content: &str,
        cov: &ShingleCovector,
        max_keywords: i32,
    ) -> Vec<Keyword> {
        let mut keywords = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for word in self.words.find_iter(content) {
            let word = word.as_str();
            if !seen.insert(word) {
                continue;
            }
            let vector = self.make_vector(word);
            let score = f64::from(shingle_dot(&cov.coords, &vector.coords));
            if score == 0.0 {
                continue;
            }
            keywords.push(Keyword {
                word: word.to_string(),
                score,
            });
        }

        keywords.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.word.cmp(&b.word))
        });
        truncate_to_limit(&mut keywords, max_keywords);
        keywords
    }
}

/// Content emphasizing the text near `current_line`: the cursor line is
/// repeated `local.size` times, a line `k` away `local.size − k` times
/// (a triangular kernel), then vectorized in the usual uniform way.
fn curate_local_content(
    content: &str,
    current_line: usize,
    local: Localization,
) -> Result<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    if current_line == 0 || current_line > lines.len() {
        return Err(RecommendError::InvalidCurrentLine);
    }
    let mut curated = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        // current_line is 1-based, i is 0-based
        let distance = (current_line as i64 - i as i64 - 1).unsigned_abs() as usize;
        let repeats = local.size.saturating_sub(distance);
        for _ in 0..repeats {
            curated.push(*line);
        }
    }
    Ok(curated.join("\n"))
}

/// Linear mix of the whole-content and localized covectors, each side
/// renormalized by its own norm first.
fn mix_covectors(
    global: &ShingleCovector,
    localized: &ShingleCovector,
    local: Localization,
) -> ShingleCovector {
    let mut mixed: HashMap<Shingle, f32> = HashMap::new();

    let global_scale = (1.0 - local.weight) / global.norm;
    for (&shingle, &value) in &global.coords {
        *mixed.entry(shingle).or_insert(0.0) += global_scale * value;
    }

    let local_scale = local.weight / localized.norm;
    for (&shingle, &value) in &localized.coords {
        *mixed.entry(shingle).or_insert(0.0) += local_scale * value;
    }

    let norm = covector_norm(&mixed);
    ShingleCovector {
        coords: mixed,
        norm,
    }
}

/// Split content into non-overlapping blocks separated by empty lines or
/// single-character lines (a lone `}` or `{` closes its block).
pub(crate) fn split_blocks(content: &str) -> Vec<Block> {
    let terminated = format!("{content}\n");
    let lines: Vec<&str> = terminated.split('\n').collect();

    let mut blocks = Vec::new();
    let mut start = 0;
    let mut block_lines: Vec<&str> = Vec::new();
    for (curr, &line) in lines.iter().enumerate() {
        if block_lines.is_empty() {
            start = curr;
        }
        if line.len() > 1 {
            block_lines.push(line);
            continue;
        }
        if block_lines.is_empty() {
            continue;
        }
        if line.len() == 1 {
            block_lines.push(line);
        }
        blocks.push(Block {
            content: block_lines.join("\n"),
            first_line: start + 1,
            last_line: start + block_lines.len(),
            ..Block::default()
        });
        block_lines.clear();
    }
    blocks
}

pub(crate) fn count_shingles(
    content: &str,
    shingle_size: usize,
    keep_underscores: bool,
) -> HashMap<Shingle, usize> {
    let content = if keep_underscores {
        content.to_string()
    } else {
        content.replace('_', "")
    };
    let lower: Vec<char> = content.to_lowercase().chars().collect();

    // Sliding window over `lower`; `window` counts how many of the runes
    // currently inside are letters. Only all-letter windows count.
    let mut counts = HashMap::new();
    let mut window = 0usize;
    for (j, &r) in lower.iter().enumerate() {
        if r.is_alphabetic() {
            window += 1;
        }
        if j + 1 < shingle_size {
            continue;
        }
        if window == shingle_size {
            *counts
                .entry(new_shingle(&lower[j + 1 - shingle_size..=j]))
                .or_insert(0) += 1;
        }
        if lower[j + 1 - shingle_size].is_alphabetic() {
            window -= 1;
        }
    }
    counts
}

/// Pack a run of lowercase runes into an integer, 5 bits per rune.
///
/// Runes outside a–z land in one of six wildcard buckets (26 + r mod 6).
/// At 5 bits × 5 runes this uses 25 of 32 bits; growing the shingle past
/// six runes would need a 64-bit carrier.
pub(crate) fn new_shingle(runes: &[char]) -> Shingle {
    let mut s: Shingle = 0;
    for (i, &r) in runes.iter().enumerate() {
        if i != 0 {
            s <<= 5;
        }
        if !r.is_ascii_lowercase() {
            s = s.wrapping_add(26 + (r as u32) % 6);
            continue;
        }
        s = s.wrapping_add(r as u32 - 'a' as u32);
    }
    s
}

pub(crate) fn shingle_dot(cov: &HashMap<Shingle, f32>, vec: &[(Shingle, f32)]) -> f32 {
    vec.iter()
        .map(|(shingle, value)| cov.get(shingle).copied().unwrap_or(0.0) * value)
        .sum()
}

pub(crate) fn vector_norm(vec: &[(Shingle, f32)]) -> f32 {
    vec.iter().map(|(_, v)| v * v).sum::<f32>().sqrt()
}

pub(crate) fn covector_norm(cov: &HashMap<Shingle, f32>) -> f32 {
    cov.values().map(|v| v * v).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shingle(s: &str) -> Shingle {
        new_shingle(&s.chars().collect::<Vec<_>>())
    }

    fn vectorizer_with_idf(entries: &[(&str, f32)]) -> Vectorizer {
        let mut v = Vectorizer::empty(false);
        v.idf = entries.iter().map(|(s, w)| (shingle(s), *w)).collect();
        v
    }

    #[test]
    fn shingle_packing() {
        assert_eq!(new_shingle(&[]), 0);
        assert_eq!(new_shingle(&['a']), 0);
        assert_eq!(new_shingle(&['b', 'a']), 0x20);
        assert_eq!(new_shingle(&['c', 'b', 'a']), 0x820);
        assert_eq!(new_shingle(&['d', 'c', 'b', 'a']), 0x18820);
        assert_eq!(new_shingle(&['e', 'd', 'c', 'b', 'a']), 0x418820);
        assert_eq!(new_shingle(&['f', 'e', 'd', 'c', 'b', 'a']), 0xa418820);
        // Wildcard buckets for runes outside a-z.
        assert_eq!(new_shingle(&['e', 'd', 'c', 'b', '\0']), 0x41883a);
        assert_eq!(new_shingle(&['e', 'd', 'c', 'b', '\u{5}']), 0x41883f);
        assert_eq!(new_shingle(&['e', 'd', 'c', 'b', '\u{6}']), 0x41883a);
    }

    #[test]
    fn count_shingles_underscores_removed_by_default() {
        let content = "\nalpha beta\nGAMMA(Delta_Epsilon, phi)\n\tzeta zALPHA\n";
        let counts = count_shingles(content, 5, false);
        let expected: HashMap<Shingle, usize> = [
            ("alpha", 2),
            ("gamma", 1),
            ("delta", 1),
            ("epsil", 1),
            ("psilo", 1),
            ("silon", 1),
            ("zalph", 1),
            ("eltae", 1),
            ("ltaep", 1),
            ("taeps", 1),
            ("aepsi", 1),
        ]
        .into_iter()
        .map(|(s, c)| (shingle(s), c))
        .collect();
        assert_eq!(counts, expected);
    }

    #[test]
    fn count_shingles_keep_underscores() {
        let content = "\nalpha beta\nGAMMA(Delta_Epsilon, phi)\n\tzeta zALPHA\n";
        let counts = count_shingles(content, 5, true);
        let expected: HashMap<Shingle, usize> = [
            ("alpha", 2),
            ("gamma", 1),
            ("delta", 1),
            ("epsil", 1),
            ("psilo", 1),
            ("silon", 1),
            ("zalph", 1),
        ]
        .into_iter()
        .map(|(s, c)| (shingle(s), c))
        .collect();
        assert_eq!(counts, expected);
    }

    #[test]
    fn count_shingles_non_ascii_letters() {
        let counts = count_shingles("çöêøåñéù êøåñé", 4, false);
        let expected: HashMap<Shingle, usize> = [
            ("çöêø", 1),
            ("öêøå", 1),
            ("êøåñ", 2),
            ("øåñé", 2),
            ("åñéù", 1),
        ]
        .into_iter()
        .map(|(s, c)| (shingle(s), c))
        .collect();
        assert_eq!(counts, expected);
    }

    #[test]
    fn counter_tracks_document_frequency_not_term_frequency() {
        let mut counter = ShingleCounter::new(false);
        counter.shingle_size = 4;
        counter.add("alpha beta gamma alpha beta");
        assert_eq!(counter.size, 1);
        assert_eq!(counter.counts[&shingle("alph")], 1);
        counter.add("alpha");
        assert_eq!(counter.counts[&shingle("alph")], 2);
        counter.add("");
        assert_eq!(counter.size, 3);
    }

    #[test]
    fn probabilistic_idf_drops_common_shingles() {
        let mut counter = ShingleCounter::new(false);
        counter.size = 15;
        counter.counts = [
            (shingle("alpha"), 3),
            (shingle("betaa"), 8),
            (shingle("gamma"), 11),
            (shingle("delta"), 1),
        ]
        .into_iter()
        .collect();
        let v = counter.into_vectorizer();
        assert!((v.idf[&shingle("alpha")] - 1.386).abs() < 1e-3);
        assert!((v.idf[&shingle("delta")] - 2.639).abs() < 1e-3);
        assert!(!v.idf.contains_key(&shingle("betaa")));
        assert!(!v.idf.contains_key(&shingle("gamma")));
    }

    #[test]
    fn vectorization_is_idempotent() {
        let v = vectorizer_with_idf(&[("alpha", 10.0), ("gamma", 20.0), ("delta", 15.0)]);
        let content = "alpha.beta()\ngamma.delta()\n";
        let first = v.make_vector(content);
        let second = v.make_vector(content);
        let mut a = first.coords.clone();
        let mut b = second.coords.clone();
        a.sort_by_key(|(s, _)| *s);
        b.sort_by_key(|(s, _)| *s);
        assert_eq!(a, b);
        assert_eq!(first.norm, second.norm);
    }

    #[test]
    fn dot_and_norms() {
        let cov: HashMap<Shingle, f32> = [
            (shingle("alpha"), 1.5),
            (shingle("betaa"), 0.5),
            (shingle("gamma"), 3.5),
        ]
        .into_iter()
        .collect();
        let vec = vec![
            (shingle("betaa"), 4.5),
            (shingle("gamma"), 5.5),
            (shingle("delta"), 3.5),
        ];
        assert_eq!(shingle_dot(&cov, &vec), 21.5);
        assert_eq!(shingle_dot(&HashMap::new(), &vec), 0.0);
        assert_eq!(shingle_dot(&cov, &[]), 0.0);

        let vec = vec![(shingle("alpha"), 3.0), (shingle("betaa"), 4.0)];
        assert_eq!(vector_norm(&vec), 5.0);
        assert_eq!(vector_norm(&[]), 0.0);
        let cov: HashMap<Shingle, f32> =
            [(shingle("alpha"), 3.0), (shingle("betaa"), 4.0)].into_iter().collect();
        assert_eq!(covector_norm(&cov), 5.0);
    }

    #[test]
    fn split_blocks_on_blank_and_single_character_lines() {
        let blocks = split_blocks("alpha beta\ngamma\n\ndelta epsilon zeta");
        assert_eq!(
            blocks,
            vec![
                Block {
                    content: "alpha beta\ngamma".to_string(),
                    first_line: 1,
                    last_line: 2,
                    ..Block::default()
                },
                Block {
                    content: "delta epsilon zeta".to_string(),
                    first_line: 4,
                    last_line: 4,
                    ..Block::default()
                },
            ]
        );

        let blocks = split_blocks("alpha beta\ngamma\nz\ndelta epsilon zeta");
        assert_eq!(
            blocks,
            vec![
                Block {
                    content: "alpha beta\ngamma\nz".to_string(),
                    first_line: 1,
                    last_line: 3,
                    ..Block::default()
                },
                Block {
                    content: "delta epsilon zeta".to_string(),
                    first_line: 4,
                    last_line: 4,
                    ..Block::default()
                },
            ]
        );
    }

    #[test]
    fn split_blocks_trailing_newline() {
        let blocks = split_blocks("alpha beta\ngamma\n\ndelta\nepsilon\nzeta\n\neta theta\niota\n");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].content, "eta theta\niota");
        assert_eq!(blocks[2].first_line, 8);
        assert_eq!(blocks[2].last_line, 9);
    }

    #[test]
    fn curate_repeats_lines_by_distance() {
        let content = "\nalpha\nbeta\ngamma\ndelta\nepsilon\n\nalpha\nbeta\n\ngamma\ndelta\nepsilon\n";
        let curated = curate_local_content(content, 8, Localization { size: 3, weight: 0.5 }).unwrap();
        assert_eq!(curated, "epsilon\n\n\nalpha\nalpha\nalpha\nbeta\nbeta\n");
    }

    #[test]
    fn curate_rejects_out_of_range_lines() {
        let local = Localization { size: 3, weight: 0.5 };
        assert!(matches!(
            curate_local_content("alpha\nbeta", 0, local),
            Err(RecommendError::InvalidCurrentLine)
        ));
        assert!(matches!(
            curate_local_content("alpha\nbeta", 3, local),
            Err(RecommendError::InvalidCurrentLine)
        ));
    }

    #[test]
    fn find_keywords_ranks_by_score_then_word() {
        let v = vectorizer_with_idf(&[
            ("alpha", 10.0),
            ("gamma", 20.0),
            ("delta", 15.0),
            ("epsil", 1.0),
            ("psilo", 2.0),
            ("silon", 3.0),
        ]);
        let base = "\nalpha.beta()\ngamma.delta()\nepsilon()\nbeta = gamma()\n";
        let block = "\nalpha.beta()\nalpha.gamma(epsilon())\nphi.sigma(alpha.alpha())\nalpha = alpha(alpha.alpha())\n";
        let cov = v.make_vector(base).to_covector();

        let words: Vec<String> = v
            .find_keywords(block, &cov, -1)
            .into_iter()
            .map(|k| k.word)
            .collect();
        assert_eq!(words, vec!["gamma", "alpha", "epsilon"]);

        let words: Vec<String> = v
            .find_keywords(block, &cov, 2)
            .into_iter()
            .map(|k| k.word)
            .collect();
        assert_eq!(words, vec!["gamma", "alpha"]);
    }

    #[test]
    fn recommend_blocks_orders_by_probability_then_first_line() {
        let v = vectorizer_with_idf(&[
            ("alpha", 4.0),
            ("gamma", 2.0),
            ("epsil", 15.0),
            ("psilo", 15.0),
            ("silon", 15.0),
        ]);
        let base = "\nalpha(beta)\nalpha.beta\nbeta(delta)\n\ndelta.epsilon\ndelta(gamma.delta)\n";
        let inspect = "\ngamma.beta\n\nepsilon(alpha)\n\n\nbeta.gamma\ndelta(epsilon)\n\ngamma.beta\n";

        let blocks = v.recommend_blocks(base, inspect, 0, 3).unwrap();
        let summary: Vec<(String, usize, usize)> = blocks
            .iter()
            .map(|b| (b.content.clone(), b.first_line, b.last_line))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("epsilon(alpha)".to_string(), 4, 4),
                ("beta.gamma\ndelta(epsilon)".to_string(), 7, 8),
                ("gamma.beta".to_string(), 2, 2),
                ("gamma.beta".to_string(), 10, 10),
            ]
        );
        let keywords: Vec<Vec<&str>> = blocks
            .iter()
            .map(|b| b.keywords.iter().map(|k| k.word.as_str()).collect())
            .collect();
        assert_eq!(
            keywords,
            vec![
                vec!["epsilon", "alpha"],
                vec!["epsilon", "gamma"],
                vec!["gamma"],
                vec!["gamma"],
            ]
        );
    }

    #[test]
    fn recommend_files_excludes_the_query_and_normalizes() {
        let v = vectorizer_with_idf(&[("alpha", 10.0), ("gamma", 20.0)]);
        {
            let mut data = v.vector_set.data.write().unwrap();
            data.insert(FileId(0), v.make_vector("alpha alpha gamma"));
            data.insert(FileId(1), v.make_vector("alpha gamma gamma"));
            data.insert(FileId(2), v.make_vector("alpha beta"));
            data.insert(FileId(3), v.make_vector("no shingles here match"));
        }

        let recs = v.recommend_files(FileId(0), "alpha gamma", 0).unwrap();
        assert!(recs.iter().all(|f| f.id != Some(FileId(0))));
        assert!(recs.len() >= 2);
        let total: f64 = recs.iter().map(|f| f.probability).sum();
        assert!(total < 1.0);
        for pair in recs.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
    }
}
