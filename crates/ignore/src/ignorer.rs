use crate::munge::Munger;
use crate::pattern::{parse_patterns, PatternSet};
use crate::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// At most this many ignore files are consulted under the root.
const MAX_IGNORE_FILES: usize = 2;

/// Options for [`Ignorer::new`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Project root the ignore files live under and paths are judged
    /// relative to.
    pub root: PathBuf,
    /// Ignore file names looked up directly under the root, in priority
    /// order. Only the first two are used.
    pub ignore_filenames: Vec<String>,
    /// Literal patterns used when none of the ignore files exist.
    pub fallback_patterns: Vec<String>,
}

#[derive(Debug, Clone)]
struct IgnoreFileState {
    path: PathBuf,
    exists: bool,
    modified: Option<SystemTime>,
}

/// Decides which project paths are excluded from indexing.
///
/// Built once per project; `ignore` is cheap and safe to call from many
/// threads. Staleness of the underlying ignore files is reported by
/// [`Ignorer::should_rebuild`], and the owner reacts by building a fresh
/// ignorer (and with it a fresh index).
#[derive(Debug)]
pub struct Ignorer {
    root: PathBuf,
    patterns: PatternSet,
    states: Vec<IgnoreFileState>,
}

impl Ignorer {
    pub fn new(opts: Options) -> Result<Ignorer> {
        let mut states = Vec::new();
        let mut text = String::new();
        let mut found_any = false;

        for name in opts.ignore_filenames.iter().take(MAX_IGNORE_FILES) {
            let path = opts.root.join(name);
            match fs::metadata(&path) {
                Ok(meta) => {
                    states.push(IgnoreFileState {
                        path: path.clone(),
                        exists: true,
                        modified: meta.modified().ok(),
                    });
                    text.push_str(&fs::read_to_string(&path)?);
                    text.push('\n');
                    found_any = true;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    states.push(IgnoreFileState {
                        path,
                        exists: false,
                        modified: None,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !found_any {
            for pattern in &opts.fallback_patterns {
                text.push_str(pattern);
                text.push('\n');
            }
        }

        let munged = Munger::new().munge_patterns(&text);
        let patterns = parse_patterns(&munged);
        log::debug!(
            "built ignorer for {} from {} file(s)",
            opts.root.display(),
            states.iter().filter(|s| s.exists).count()
        );

        Ok(Ignorer {
            root: opts.root,
            patterns,
            states,
        })
    }

    /// Report whether `path` is excluded.
    ///
    /// Judges this path only: ancestor directories are assumed to have
    /// been checked (and found usable) by the caller, which is how the
    /// corpus walker uses it while pruning directories.
    pub fn ignore(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return false;
        }
        self.patterns.ignore(&segments, is_dir)
    }

    /// Compare the cached (exists, modified-time) of each ignore file
    /// against disk; any difference means the ignorer (and every index
    /// built through it) is stale.
    pub fn should_rebuild(&self) -> Result<bool> {
        for state in &self.states {
            match fs::metadata(&state.path) {
                Ok(meta) => {
                    if !state.exists {
                        return Ok(true);
                    }
                    if meta.modified().ok() != state.modified {
                        return Ok(true);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    if state.exists {
                        return Ok(true);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(false)
    }

    /// The root paths are judged relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn write_ignore_file(root: &Path, name: &str, contents: &str) {
        fs::write(root.join(name), contents).unwrap();
    }

    #[test]
    fn patterns_from_file_apply_relative_to_root() {
        let temp = tempdir().unwrap();
        write_ignore_file(temp.path(), ".gitignore", "*.log\n!important.log\n");

        let ignorer = Ignorer::new(Options {
            root: temp.path().to_path_buf(),
            ignore_filenames: vec![".gitignore".to_string()],
            fallback_patterns: vec![],
        })
        .unwrap();

        assert!(ignorer.ignore(&temp.path().join("debug.log"), false));
        assert!(ignorer.ignore(&temp.path().join("logs").join("trace.log"), false));
        assert!(!ignorer.ignore(&temp.path().join("important.log"), false));
        assert!(!ignorer.ignore(&temp.path().join("main.py"), false));
    }

    #[test]
    fn root_itself_is_never_ignored() {
        let temp = tempdir().unwrap();
        let ignorer = Ignorer::new(Options {
            root: temp.path().to_path_buf(),
            ignore_filenames: vec![],
            fallback_patterns: vec!["*".to_string()],
        })
        .unwrap();
        assert!(!ignorer.ignore(temp.path(), true));
        assert!(ignorer.ignore(&temp.path().join("anything"), true));
    }

    #[test]
    fn paths_outside_root_are_not_ignored() {
        let temp = tempdir().unwrap();
        let ignorer = Ignorer::new(Options {
            root: temp.path().join("project"),
            ignore_filenames: vec![],
            fallback_patterns: vec!["*".to_string()],
        })
        .unwrap();
        assert!(!ignorer.ignore(&temp.path().join("elsewhere").join("x.py"), false));
    }

    #[test]
    fn fallback_patterns_used_only_when_no_file_exists() {
        let temp = tempdir().unwrap();
        write_ignore_file(temp.path(), ".gitignore", "alpha\n");

        let ignorer = Ignorer::new(Options {
            root: temp.path().to_path_buf(),
            ignore_filenames: vec![".gitignore".to_string()],
            fallback_patterns: vec!["beta".to_string()],
        })
        .unwrap();
        assert!(ignorer.ignore(&temp.path().join("alpha"), false));
        assert!(!ignorer.ignore(&temp.path().join("beta"), false));

        let ignorer = Ignorer::new(Options {
            root: temp.path().to_path_buf(),
            ignore_filenames: vec![".codenavignore".to_string()],
            fallback_patterns: vec!["beta".to_string()],
        })
        .unwrap();
        assert!(!ignorer.ignore(&temp.path().join("alpha"), false));
        assert!(ignorer.ignore(&temp.path().join("beta"), false));
    }

    #[test]
    fn second_ignore_file_overrides_first() {
        let temp = tempdir().unwrap();
        write_ignore_file(temp.path(), ".gitignore", "*.log\n");
        write_ignore_file(temp.path(), ".codenavignore", "!important.log\n");

        let ignorer = Ignorer::new(Options {
            root: temp.path().to_path_buf(),
            ignore_filenames: vec![".gitignore".to_string(), ".codenavignore".to_string()],
            fallback_patterns: vec![],
        })
        .unwrap();
        assert!(ignorer.ignore(&temp.path().join("debug.log"), false));
        assert!(!ignorer.ignore(&temp.path().join("important.log"), false));
    }

    #[test]
    fn should_rebuild_on_modification_and_appearance() {
        let temp = tempdir().unwrap();
        write_ignore_file(temp.path(), ".gitignore", "*.log\n");

        let ignorer = Ignorer::new(Options {
            root: temp.path().to_path_buf(),
            ignore_filenames: vec![".gitignore".to_string(), ".codenavignore".to_string()],
            fallback_patterns: vec![],
        })
        .unwrap();
        assert_eq!(ignorer.should_rebuild().unwrap(), false);

        // A tracked file that did not exist at build time appears.
        write_ignore_file(temp.path(), ".codenavignore", "beta\n");
        assert_eq!(ignorer.should_rebuild().unwrap(), true);
        fs::remove_file(temp.path().join(".codenavignore")).unwrap();
        assert_eq!(ignorer.should_rebuild().unwrap(), false);

        // The existing file vanishes.
        fs::remove_file(temp.path().join(".gitignore")).unwrap();
        assert_eq!(ignorer.should_rebuild().unwrap(), true);
    }

    #[test]
    fn bad_patterns_do_not_fail_construction() {
        let temp = tempdir().unwrap();
        write_ignore_file(temp.path(), ".gitignore", ".*\n[a\n");
        let ignorer = Ignorer::new(Options {
            root: temp.path().to_path_buf(),
            ignore_filenames: vec![".gitignore".to_string()],
            fallback_patterns: vec![],
        })
        .unwrap();
        assert!(ignorer.ignore(&temp.path().join(".hidden"), false));
    }
}
