//! Shard file naming
//!
//! Layout: `<root>/<main>/<sub>/<main>_<sub>_<index>.json`, with each
//! category name passed through `sanitize_component`. Shard indices start
//! at 1. The layout is derived from the pair alone so a restarted process
//! finds existing shards without any other state.

use crate::catalog::Pair;
use std::path::{Path, PathBuf};

/// Makes a category name safe to use as a path component
///
/// - Surrounding whitespace is trimmed
/// - `/` becomes `-`
/// - Runs of whitespace become a single `_`
/// - Characters other than alphanumerics and `_ - . & ,` are dropped
/// - A name that ends up empty (or only dots) becomes `unnamed`
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;

    for c in name.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push('_');
            pending_space = false;
        }
        match c {
            '/' => out.push('-'),
            c if c.is_alphanumeric() => out.push(c),
            '_' | '-' | '.' | '&' | ',' => out.push(c),
            _ => {}
        }
    }

    if out.chars().all(|c| c == '.') {
        return "unnamed".to_string();
    }
    out
}

/// Maps pairs to shard directories and files under a root directory
#[derive(Debug, Clone)]
pub struct ShardLayout {
    root: PathBuf,
}

impl ShardLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every shard of `pair`
    pub fn pair_dir(&self, pair: &Pair) -> PathBuf {
        self.root
            .join(sanitize_component(&pair.main_category))
            .join(sanitize_component(&pair.sub_category))
    }

    /// File name stem shared by every shard of `pair`
    pub fn shard_prefix(&self, pair: &Pair) -> String {
        format!(
            "{}_{}",
            sanitize_component(&pair.main_category),
            sanitize_component(&pair.sub_category)
        )
    }

    /// Path of shard `index` for `pair`
    pub fn shard_path(&self, pair: &Pair, index: usize) -> PathBuf {
        self.pair_dir(pair)
            .join(format!("{}_{}.json", self.shard_prefix(pair), index))
    }

    /// Lists the shard indices present on disk for `pair`, ascending
    ///
    /// A missing pair directory means no shards.
    pub fn list_indices(&self, pair: &Pair) -> std::io::Result<Vec<usize>> {
        let dir = self.pair_dir(pair);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let prefix = format!("{}_", self.shard_prefix(pair));
        let mut indices = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let index = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(index) = index.filter(|i| *i > 0) {
                indices.push(index);
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }
}
