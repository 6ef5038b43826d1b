use crate::munge::MungedPattern;
use globset::{Glob, GlobMatcher};

/// One compiled path segment (`*`, `?`, and character classes allowed).
#[derive(Debug, Clone)]
pub(crate) struct Segment {
    matcher: GlobMatcher,
}

impl Segment {
    fn compile(source: &str) -> Option<Segment> {
        match Glob::new(source) {
            Ok(glob) => Some(Segment {
                matcher: glob.compile_matcher(),
            }),
            Err(err) => {
                log::debug!("skipping ignore pattern segment {source:?}: {err}");
                None
            }
        }
    }

    fn matches(&self, segment: &str) -> bool {
        self.matcher.is_match(segment)
    }
}

/// Pattern without `**`: either a base-name match or a root-anchored
/// segment sequence.
#[derive(Debug, Clone)]
pub(crate) struct SimplePattern {
    pub inverted: bool,
    pub dir_only: bool,
    pub base: bool,
    pub sequence: Vec<Segment>,
}

impl SimplePattern {
    fn matches(&self, segments: &[&str], is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.base {
            return segments
                .last()
                .is_some_and(|last| self.sequence[0].matches(last));
        }
        self.sequence.len() == segments.len()
            && self
                .sequence
                .iter()
                .zip(segments)
                .all(|(pattern, segment)| pattern.matches(segment))
    }
}

/// Pattern with one or more `**` separators: a left sequence anchored at
/// the root, a right sequence anchored at the end, and middle sequences
/// that must appear, in order, somewhere between them.
///
/// Middle windows are located by greedy leftmost search without
/// backtracking; this matches common real-world ignore patterns but is
/// best-effort on adversarial ones.
#[derive(Debug, Clone)]
pub(crate) struct DoubleStarPattern {
    pub inverted: bool,
    pub dir_only: bool,
    pub left: Vec<Segment>,
    pub middles: Vec<Vec<Segment>>,
    pub right: Vec<Segment>,
    pub total_len: usize,
}

impl DoubleStarPattern {
    fn matches(&self, segments: &[&str], is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if segments.len() < self.total_len {
            return false;
        }
        let right_start = segments.len() - self.right.len();
        if !sequence_matches(&self.left, &segments[..self.left.len()]) {
            return false;
        }
        if !sequence_matches(&self.right, &segments[right_start..]) {
            return false;
        }

        let mut cursor = self.left.len();
        for middle in &self.middles {
            match find_window(middle, &segments[..right_start], cursor) {
                Some(end) => cursor = end,
                None => return false,
            }
        }
        true
    }
}

fn sequence_matches(sequence: &[Segment], segments: &[&str]) -> bool {
    sequence
        .iter()
        .zip(segments)
        .all(|(pattern, segment)| pattern.matches(segment))
}

/// Leftmost contiguous window in `segments[from..]` matching `sequence`,
/// returning the index just past the window.
fn find_window(sequence: &[Segment], segments: &[&str], from: usize) -> Option<usize> {
    let width = sequence.len();
    if from + width > segments.len() {
        return None;
    }
    (from..=segments.len() - width)
        .find(|&start| sequence_matches(sequence, &segments[start..start + width]))
        .map(|start| start + width)
}

#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    Simple(SimplePattern),
    DoubleStar(DoubleStarPattern),
}

impl Pattern {
    fn inverted(&self) -> bool {
        match self {
            Pattern::Simple(p) => p.inverted,
            Pattern::DoubleStar(p) => p.inverted,
        }
    }

    fn matches(&self, segments: &[&str], is_dir: bool) -> bool {
        match self {
            Pattern::Simple(p) => p.matches(segments, is_dir),
            Pattern::DoubleStar(p) => p.matches(segments, is_dir),
        }
    }
}

/// Parse one munged line. `None` means the pattern is syntactically
/// invalid (e.g. an unbalanced character class) and must be skipped.
pub(crate) fn parse_pattern(munged: &MungedPattern) -> Option<Pattern> {
    let dir_only = munged.body.ends_with('/');
    let body = munged.body.trim_end_matches('/');

    if body.contains("**") {
        let parts: Vec<&str> = body.split("**").collect();
        let left = compile_sequence(parts[0])?;
        let right = compile_sequence(parts[parts.len() - 1])?;
        let mut middles = Vec::new();
        for part in &parts[1..parts.len() - 1] {
            let middle = compile_sequence(part)?;
            if !middle.is_empty() {
                middles.push(middle);
            }
        }
        let total_len =
            left.len() + right.len() + middles.iter().map(Vec::len).sum::<usize>();
        return Some(Pattern::DoubleStar(DoubleStarPattern {
            inverted: munged.inverted,
            dir_only,
            left,
            middles,
            right,
            total_len,
        }));
    }

    let base = !body.contains('/');
    let sequence = compile_sequence(body)?;
    if sequence.is_empty() {
        return None;
    }
    Some(Pattern::Simple(SimplePattern {
        inverted: munged.inverted,
        dir_only,
        base,
        sequence,
    }))
}

fn compile_sequence(part: &str) -> Option<Vec<Segment>> {
    part.trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(Segment::compile)
        .collect()
}

/// All valid patterns from one ignore source, in file order.
#[derive(Debug, Clone, Default)]
pub(crate) struct PatternSet {
    patterns: Vec<Pattern>,
}

pub(crate) fn parse_patterns(munged: &[MungedPattern]) -> PatternSet {
    PatternSet {
        patterns: munged.iter().filter_map(parse_pattern).collect(),
    }
}

impl PatternSet {
    /// Fold the patterns over one path.
    ///
    /// A pattern only applies while the accumulated decision matches its
    /// polarity: a normal pattern can start ignoring a path that is not
    /// yet ignored, an inverted pattern can rescue a path that currently
    /// is. Later patterns therefore override earlier ones.
    pub fn ignore(&self, segments: &[&str], is_dir: bool) -> bool {
        let mut ignored = false;
        for pattern in &self.patterns {
            if pattern.inverted() != ignored {
                continue;
            }
            if pattern.matches(segments, is_dir) {
                ignored = !pattern.inverted();
            }
        }
        ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::munge::Munger;
    use pretty_assertions::assert_eq;

    fn munged(body: &str) -> MungedPattern {
        MungedPattern {
            body: body.to_string(),
            inverted: false,
        }
    }

    fn split(path: &str) -> Vec<&str> {
        path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Ancestor-walking check used by callers: a path is blocked when it
    /// or any ancestor directory is ignored.
    fn blocked(patterns: &PatternSet, path: &str, is_dir: bool) -> bool {
        let segments = split(path);
        for end in (1..=segments.len()).rev() {
            let is_dir = is_dir || end < segments.len();
            if patterns.ignore(&segments[..end], is_dir) {
                return true;
            }
        }
        false
    }

    fn parse_source(source: &str) -> PatternSet {
        parse_patterns(&Munger::new().munge_patterns(source))
    }

    #[test]
    fn base_pattern_matches_any_directory() {
        let pattern = parse_pattern(&munged("*.beta")).unwrap();
        assert!(pattern.matches(&split("gamma/delta/alpha.beta"), false));
        assert!(!pattern.matches(&split("gamma/delta/alphabeta"), false));
        assert!(!pattern.matches(&split("gamma/alpha.beta/delta"), false));
    }

    #[test]
    fn dir_only_requires_directory() {
        let pattern = parse_pattern(&MungedPattern {
            body: "*.beta/".to_string(),
            inverted: false,
        })
        .unwrap();
        assert!(pattern.matches(&split("gamma/delta/alpha.beta"), true));
        assert!(!pattern.matches(&split("gamma/delta/alpha.beta"), false));
    }

    #[test]
    fn anchored_sequence_requires_exact_depth() {
        let pattern = parse_pattern(&munged("/*/beta/g?mm?")).unwrap();
        assert!(pattern.matches(&split("/alpha/beta/gamma"), false));
        assert!(!pattern.matches(&split("/alpha/beta"), false));
        assert!(!pattern.matches(&split("/alpha/beta/Gamma"), false));
        assert!(!pattern.matches(&split("/alpha/beta/gamma/delta"), false));
    }

    #[test]
    fn invalid_character_class_is_skipped() {
        assert!(parse_pattern(&munged("bet[a-")).is_none());
    }

    #[test]
    fn double_star_left_and_right_sequences() {
        let pattern = parse_pattern(&munged("/*/beta/g?mm?/**/delta/*/*.phi")).unwrap();
        assert!(pattern.matches(&split("/alpha/beta/gamma/delta/epsilon/eta.phi"), false));
        assert!(pattern.matches(
            &split("/alpha/beta/gamma/rho/sigma/tau/delta/epsilon/eta.phi"),
            false
        ));
        assert!(!pattern.matches(
            &split("/alpha/beta/gamma/rho/sigma/tau/epsilon/eta.phi"),
            false
        ));
    }

    #[test]
    fn double_star_middle_sequences_in_order() {
        let pattern =
            parse_pattern(&munged("alpha/**/beta/gamma/**/delta/epsilon/**/phi")).unwrap();
        assert!(pattern.matches(
            &split("/alpha/X/Y/beta/gamma/U/V/W/delta/epsilon/Z/phi"),
            false
        ));
        assert!(!pattern.matches(
            &split("/alpha/X/Y/beta/U/V/W/delta/epsilon/Z/phi"),
            false
        ));
    }

    #[test]
    fn parse_shapes() {
        match parse_pattern(&munged("*.alpha")).unwrap() {
            Pattern::Simple(p) => {
                assert!(p.base);
                assert!(!p.dir_only);
                assert_eq!(p.sequence.len(), 1);
            }
            Pattern::DoubleStar(_) => panic!("expected simple pattern"),
        }
        match parse_pattern(&munged("/alpha/beta/")).unwrap() {
            Pattern::Simple(p) => {
                assert!(!p.base);
                assert!(p.dir_only);
                assert_eq!(p.sequence.len(), 2);
            }
            Pattern::DoubleStar(_) => panic!("expected simple pattern"),
        }
        match parse_pattern(&munged("alpha/**/beta/gamma/**/delta/epsilon/")).unwrap() {
            Pattern::DoubleStar(p) => {
                assert!(p.dir_only);
                assert_eq!(p.left.len(), 1);
                assert_eq!(p.middles.len(), 1);
                assert_eq!(p.middles[0].len(), 2);
                assert_eq!(p.right.len(), 2);
                assert_eq!(p.total_len, 5);
            }
            Pattern::Simple(_) => panic!("expected double-star pattern"),
        }
    }

    #[test]
    fn escapes() {
        let patterns = parse_source("\\!alpha\n\\#beta\ngamma\\ \n");
        assert!(blocked(&patterns, "!alpha", false));
        assert!(blocked(&patterns, "#beta", false));
        assert!(blocked(&patterns, "gamma ", false));
    }

    #[test]
    fn multiple_double_stars() {
        let patterns = parse_source("a/b/**/c/d/**/e/f/**/g/h");
        assert!(blocked(&patterns, "a/b/c/d/e/f/g/h", false));
        assert!(blocked(&patterns, "a/b/x/y/z/c/d/x/y/z/e/f/x/y/z/g/h", false));
        assert!(blocked(&patterns, "a/b/x/y/z/c/d/x/y/z/e/f/g/h", false));
        assert!(!blocked(&patterns, "a/b/x/y/z/c/d/e/x/y/z/f/x/y/z/g/h", false));
        assert!(!blocked(&patterns, "x/y/z/a/b/x/y/z/c/d/x/y/z/e/f/x/y/z/g/h", false));
    }

    #[test]
    fn double_star_directory() {
        let patterns = parse_source("**/logs");
        assert!(blocked(&patterns, "logs/debug.log", false));
        assert!(blocked(&patterns, "logs/monday/foo.bar", false));
        assert!(blocked(&patterns, "build/logs/debug.log", false));
    }

    #[test]
    fn double_star_directory_and_name() {
        let patterns = parse_source("**/logs/debug.log");
        assert!(blocked(&patterns, "logs/debug.log", false));
        assert!(blocked(&patterns, "build/logs/debug.log", false));
        assert!(!blocked(&patterns, "logs/build/debug.log", false));
    }

    #[test]
    fn wildcard_star() {
        let patterns = parse_source("*.log");
        assert!(blocked(&patterns, "debug.log", false));
        assert!(blocked(&patterns, "foo.log", false));
        assert!(blocked(&patterns, ".log", false));
        assert!(blocked(&patterns, "logs/debug.log", false));
    }

    #[test]
    fn exclamation_point_negation() {
        let patterns = parse_source("*.log\n!important.log\n");
        assert!(blocked(&patterns, "debug.log", false));
        assert!(blocked(&patterns, "trace.log", false));
        assert!(!blocked(&patterns, "important.log", false));
        assert!(!blocked(&patterns, "logs/important.log", false));
    }

    #[test]
    fn reignore_after_exclamation_point() {
        let patterns = parse_source("*.log\n!important/*.log\ntrace.*\n");
        assert!(blocked(&patterns, "debug.log", false));
        assert!(blocked(&patterns, "important/trace.log", false));
        assert!(!blocked(&patterns, "important/debug.log", false));
    }

    #[test]
    fn prepended_slash_anchors() {
        let patterns = parse_source("/debug.log");
        assert!(blocked(&patterns, "debug.log", false));
        assert!(!blocked(&patterns, "logs/debug.log", false));
    }

    #[test]
    fn question_mark_matches_exactly_one_character() {
        let patterns = parse_source("debug?.log");
        assert!(blocked(&patterns, "debug0.log", false));
        assert!(blocked(&patterns, "debugg.log", false));
        assert!(!blocked(&patterns, "debug10.log", false));
    }

    #[test]
    fn character_ranges_and_sets() {
        let patterns = parse_source("debug[0-9].log");
        assert!(blocked(&patterns, "debug0.log", false));
        assert!(!blocked(&patterns, "debug10.log", false));

        let patterns = parse_source("debug[01].log");
        assert!(blocked(&patterns, "debug0.log", false));
        assert!(blocked(&patterns, "debug1.log", false));
        assert!(!blocked(&patterns, "debug2.log", false));
        assert!(!blocked(&patterns, "debug01.log", false));

        let patterns = parse_source("debug[!01].log");
        assert!(blocked(&patterns, "debug2.log", false));
        assert!(!blocked(&patterns, "debug0.log", false));
        assert!(!blocked(&patterns, "debug01.log", false));

        let patterns = parse_source("debug[a-z].log");
        assert!(blocked(&patterns, "debuga.log", false));
        assert!(!blocked(&patterns, "debug1.log", false));
    }

    #[test]
    fn directory_anywhere() {
        let patterns = parse_source("logs");
        assert!(blocked(&patterns, "logs", true));
        assert!(blocked(&patterns, "logs/debug.log", false));
        assert!(blocked(&patterns, "logs/latest/foo.bar", false));
        assert!(blocked(&patterns, "build/logs", true));
        assert!(blocked(&patterns, "build/logs/debug.log", false));
    }

    #[test]
    fn directory_only() {
        let patterns = parse_source("logs/");
        assert!(blocked(&patterns, "logs/debug.log", false));
        assert!(blocked(&patterns, "logs/latest/foo.bar", false));
        assert!(blocked(&patterns, "build/logs/foo.bar", false));
        assert!(blocked(&patterns, "build/logs/latest/debug.log", false));
    }

    #[test]
    fn cannot_negate_file_in_ignored_directory() {
        let patterns = parse_source("logs/\n!logs/important.log\n");
        assert!(blocked(&patterns, "logs/debug.log", false));
        assert!(blocked(&patterns, "logs/important.log", false));
    }

    #[test]
    fn middle_double_star() {
        let patterns = parse_source("logs/**/debug.log");
        assert!(blocked(&patterns, "logs/debug.log", false));
        assert!(blocked(&patterns, "logs/monday/debug.log", false));
        assert!(blocked(&patterns, "logs/monday/pm/debug.log", false));
    }

    #[test]
    fn wildcard_star_in_directory_name() {
        let patterns = parse_source("logs/*day/debug.log");
        assert!(blocked(&patterns, "logs/monday/debug.log", false));
        assert!(blocked(&patterns, "logs/tuesday/debug.log", false));
        assert!(!blocked(&patterns, "logs/latest/debug.log", false));
    }

    #[test]
    fn slash_in_middle_anchors_to_root() {
        let patterns = parse_source("logs/debug.log");
        assert!(blocked(&patterns, "logs/debug.log", false));
        assert!(!blocked(&patterns, "debug.log", false));
        assert!(!blocked(&patterns, "build/logs/debug.log", false));
    }

    #[test]
    fn bad_pattern_preserves_prior_decision() {
        let patterns = parse_source("*.log\nbet[a-\n");
        assert!(blocked(&patterns, "debug.log", false));
        assert!(!blocked(&patterns, "beta", false));
    }
}
