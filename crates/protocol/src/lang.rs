use std::path::Path;

/// Extensions the recommendation engine indexes and answers queries for.
///
/// This is the "language registry" collaborator: both the corpus scan and
/// the navigator's request validation consult it, so a file type is either
/// fully supported or fully invisible.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    // General purpose languages
    "c",
    "cc",
    "cpp",
    "cs",
    "go",
    "h",
    "hpp",
    "java",
    "js",
    "jsx",
    "kt",
    "m",
    "php",
    "py",
    "rb",
    "rs",
    "scala",
    "swift",
    "ts",
    "tsx",
    "vue",
    // Scripts
    "sh",
    // Web assets commonly co-edited with code
    "css",
    "html",
    "less",
    "scss",
    "sql",
];

/// Check whether an extension (without the leading dot) is supported.
pub fn supported_extension(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|candidate| candidate == &ext)
}

/// Check whether a path has a supported extension.
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(supported_extension)
}
