use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cached diff results for one repository.
///
/// Paths are interned into `files` and commits store index lists, keeping
/// the serialized document compact. The inverted path→index table is
/// rebuilt after deserialization and never persisted (ids are process
/// bookkeeping, only path strings survive a run).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoCache {
    files: Vec<String>,
    commits: HashMap<String, Vec<u32>>,
    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl RepoCache {
    pub fn rebuild_index(&mut self) {
        self.index = self
            .files
            .iter()
            .enumerate()
            .map(|(i, path)| (path.clone(), i as u32))
            .collect();
    }

    pub fn contains(&self, commit_hash: &str) -> bool {
        self.commits.contains_key(commit_hash)
    }

    /// Resolve a cached commit back to its file paths.
    pub fn get(&self, commit_hash: &str) -> Option<Vec<String>> {
        let ids = self.commits.get(commit_hash)?;
        Some(
            ids.iter()
                .filter_map(|&id| self.files.get(id as usize).cloned())
                .collect(),
        )
    }

    pub fn insert(&mut self, commit_hash: &str, paths: &[String]) {
        let ids = paths.iter().map(|path| self.intern(path)).collect();
        self.commits.insert(commit_hash.to_string(), ids);
    }

    fn intern(&mut self, path: &str) -> u32 {
        if let Some(&id) = self.index.get(path) {
            return id;
        }
        let id = self.files.len() as u32;
        self.files.push(path.to_string());
        self.index.insert(path.to_string(), id);
        id
    }

    pub fn num_commits(&self) -> usize {
        self.commits.len()
    }
}

/// The persisted cache document: one entry per repository plus the
/// most-recently-used order backing eviction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
    repos: HashMap<String, RepoCache>,
    /// Repository keys ordered oldest-used first.
    recently_used: Vec<String>,
}

impl Bundle {
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Bundle> {
        let mut bundle: Bundle = serde_json::from_slice(bytes)?;
        for cache in bundle.repos.values_mut() {
            cache.rebuild_index();
        }
        Ok(bundle)
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn get(&self, key: &str) -> Option<&RepoCache> {
        self.repos.get(key)
    }

    /// Insert or replace one repository and mark it most recently used.
    pub fn put(&mut self, key: &str, cache: RepoCache) {
        self.repos.insert(key.to_string(), cache);
        self.touch(key);
    }

    pub fn touch(&mut self, key: &str) {
        self.recently_used.retain(|k| k != key);
        self.recently_used.push(key.to_string());
    }

    /// Drop the least-recently-used repository. Returns false once empty.
    pub fn evict_oldest(&mut self) -> bool {
        if self.recently_used.is_empty() {
            return false;
        }
        let key = self.recently_used.remove(0);
        self.repos.remove(&key);
        log::debug!("evicted commit cache for {key}");
        true
    }

    pub fn keys_by_recency(&self) -> &[String] {
        &self.recently_used
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn interning_reuses_ids() {
        let mut cache = RepoCache::default();
        cache.insert("aaa", &paths(&["x.py", "y.py"]));
        cache.insert("bbb", &paths(&["y.py", "z.py"]));
        assert_eq!(cache.files.len(), 3);
        assert_eq!(cache.get("bbb").unwrap(), paths(&["y.py", "z.py"]));
    }

    #[test]
    fn round_trip_preserves_commit_data() {
        let mut cache = RepoCache::default();
        cache.insert("aaa", &paths(&["x.py", "y.py"]));
        cache.insert("bbb", &paths(&["z.py"]));
        let mut bundle = Bundle::default();
        bundle.put("repo", cache.clone());

        let decoded = Bundle::decode(&bundle.encode().unwrap()).unwrap();
        let loaded = decoded.get("repo").unwrap();
        assert_eq!(loaded.get("aaa"), cache.get("aaa"));
        assert_eq!(loaded.get("bbb"), cache.get("bbb"));
        // The inverted index is rebuilt, so interning keeps working.
        let mut loaded = loaded.clone();
        loaded.insert("ccc", &paths(&["x.py"]));
        assert_eq!(loaded.files.len(), 3);
    }

    #[test]
    fn touch_moves_key_to_newest() {
        let mut bundle = Bundle::default();
        bundle.put("a", RepoCache::default());
        bundle.put("b", RepoCache::default());
        bundle.touch("a");
        assert_eq!(bundle.keys_by_recency(), ["b".to_string(), "a".to_string()]);
        assert!(bundle.evict_oldest());
        assert!(bundle.get("b").is_none());
        assert!(bundle.get("a").is_some());
    }
}
