/// Dense per-process file identity issued by the path arena.
///
/// Ids are assigned on first observation of a path, append-only, and never
/// reused within one arena instance. They are process-local: caches persist
/// path strings, never ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file#{}", self.0)
    }
}
