use crate::{NavigateError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Normalize a raw request path for root discovery. On Windows the drive
/// letter is uppercased so equal paths hash to one project entry.
pub(crate) fn normalize(os: &str, path: &str) -> String {
    if os != "windows" {
        return path.to_string();
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_lowercase() {
        let mut out = String::with_capacity(path.len());
        out.push(bytes[0].to_ascii_uppercase() as char);
        out.push_str(&path[1..]);
        return out;
    }
    path.to_string()
}

/// Per-OS filter for directories the engine must not index or answer
/// queries about (system and application-private trees).
pub(crate) fn block_path(os: &str, path: &Path) -> Option<NavigateError> {
    let Some(parent) = path.parent() else {
        return None;
    };
    for component in parent.components() {
        let std::path::Component::Normal(name) = component else {
            continue;
        };
        let name = name.to_string_lossy();
        let blocked = match os {
            // Prefix match is overly broad ("LibraryIO" is caught too)
            // but errs on the private side.
            "macos" | "darwin" => name.starts_with("Library"),
            "linux" => name.starts_with('.'),
            "windows" => name.eq_ignore_ascii_case("appdata"),
            _ => false,
        };
        if blocked {
            return Some(NavigateError::FilteredDirectory);
        }
    }
    None
}

pub(crate) fn current_os() -> &'static str {
    std::env::consts::OS
}

/// Whether `path` is a project root: a directory containing a
/// version-control marker.
pub(crate) fn is_project_root(path: &Path) -> io::Result<bool> {
    let entries = fs::read_dir(path)?;
    for entry in entries {
        if entry?.file_name() == ".git" {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Nearest ancestor of `path` that is a project root. The queried path
/// itself is not a candidate.
pub(crate) fn find_project_root(
    path: &Path,
    is_root: &dyn Fn(&Path) -> io::Result<bool>,
) -> Result<PathBuf> {
    let mut dir = path.parent();
    while let Some(candidate) = dir {
        match is_root(candidate) {
            Ok(true) => return Ok(candidate.to_path_buf()),
            Ok(false) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        dir = candidate.parent();
    }
    Err(NavigateError::NotInProject)
}
