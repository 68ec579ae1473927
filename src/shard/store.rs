//! Shard store
//!
//! Appends are serialized per pair: each pair has its own cursor behind its
//! own mutex, so different pairs write concurrently while check-then-append
//! for one pair is atomic. A cursor mirrors the pair's current shard in
//! memory and is only updated after the shard file has been replaced on
//! disk, so memory never runs ahead of what was persisted.

use crate::catalog::Pair;
use crate::shard::naming::ShardLayout;
use crate::shard::record::{ExtractedRecord, ShardFile};
use crate::shard::{ShardError, ShardResult};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Result of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// Written into shard `index`
    Written { index: usize },

    /// The url is already present somewhere in the pair's shards
    Duplicate,
}

/// Write cursor for one pair
#[derive(Debug)]
struct PairCursor {
    /// Highest shard index on disk, 0 if none
    index: usize,

    /// Records of shard `index`
    courses: Vec<ExtractedRecord>,

    /// Whether shard `index` is closed to further appends
    sealed: bool,

    /// Every url in every shard of the pair
    urls: HashSet<String>,
}

type CursorSlot = Arc<Mutex<Option<PairCursor>>>;

/// Borrowed view of a shard body, to avoid cloning records on every write
#[derive(Serialize)]
struct ShardFileRef<'a> {
    main_category: &'a str,
    sub_category: &'a str,
    courses: &'a [ExtractedRecord],
}

/// Append-only store of extracted records, sharded per pair
pub struct ShardStore {
    layout: ShardLayout,
    shard_size: usize,
    cursors: Mutex<HashMap<Pair, CursorSlot>>,
}

impl ShardStore {
    /// Creates a store rooted at `root` holding at most `shard_size` records
    /// per shard (a size of 0 is treated as 1)
    pub fn new(root: impl Into<std::path::PathBuf>, shard_size: usize) -> Self {
        Self {
            layout: ShardLayout::new(root),
            shard_size: shard_size.max(1),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    /// Highest shard index on disk for `pair`, 0 if none
    pub fn current_shard_index(&self, pair: &Pair) -> ShardResult<usize> {
        let dir = self.layout.pair_dir(pair);
        let indices = self
            .layout
            .list_indices(pair)
            .map_err(|source| ShardError::Io { path: dir, source })?;
        Ok(indices.last().copied().unwrap_or(0))
    }

    /// Reads shard `index` of `pair`; None if the file does not exist
    pub fn read_shard(&self, pair: &Pair, index: usize) -> ShardResult<Option<ShardFile>> {
        read_shard_file(&self.layout.shard_path(pair, index))
    }

    /// URLs held in shard `index` of `pair`
    pub fn urls_in_shard(&self, pair: &Pair, index: usize) -> ShardResult<HashSet<String>> {
        let urls = self
            .read_shard(pair, index)?
            .map(|shard| {
                shard
                    .courses
                    .iter()
                    .filter_map(|r| r.url().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(urls)
    }

    /// Every record in every shard of `pair`, reading each file once
    pub fn records_in_pair(&self, pair: &Pair) -> ShardResult<Vec<ExtractedRecord>> {
        let dir = self.layout.pair_dir(pair);
        let indices = self
            .layout
            .list_indices(pair)
            .map_err(|source| ShardError::Io { path: dir, source })?;

        let mut records = Vec::new();
        for index in indices {
            if let Some(shard) = self.read_shard(pair, index)? {
                records.extend(shard.courses);
            }
        }
        Ok(records)
    }

    /// Every url in every shard of `pair`
    pub fn urls_in_pair(&self, pair: &Pair) -> ShardResult<HashSet<String>> {
        Ok(self
            .records_in_pair(pair)?
            .iter()
            .filter_map(|r| r.url().map(str::to_string))
            .collect())
    }

    /// Appends `record` to the current shard of `pair`
    ///
    /// Opens the next shard first when the current one is closed or full.
    /// A url already present in the pair's shard history is not written
    /// again. The shard file is replaced atomically: after a crash it holds
    /// either the old or the new contents, never a partial record.
    pub fn append(&self, pair: &Pair, record: ExtractedRecord) -> ShardResult<Appended> {
        let url = record.url().ok_or(ShardError::MissingUrl)?.to_string();

        let slot = self.slot(pair)?;
        let mut guard = slot
            .lock()
            .map_err(|_| ShardError::LockPoisoned(pair.to_string()))?;

        let loaded = match guard.take() {
            Some(cursor) => cursor,
            None => self.load_cursor(pair)?,
        };
        let cursor = guard.insert(loaded);

        if cursor.urls.contains(&url) {
            tracing::debug!("Skipping duplicate {} for {}", url, pair);
            return Ok(Appended::Duplicate);
        }

        let roll_over =
            cursor.sealed || cursor.index == 0 || cursor.courses.len() >= self.shard_size;

        let index = if roll_over {
            let next = cursor.index + 1;
            let fresh = vec![record];
            self.write_shard(pair, next, &fresh)?;
            cursor.index = next;
            cursor.courses = fresh;
            cursor.sealed = false;
            tracing::debug!("Opened shard {} for {}", next, pair);
            next
        } else {
            cursor.courses.push(record);
            if let Err(e) = self.write_shard(pair, cursor.index, &cursor.courses) {
                cursor.courses.pop();
                return Err(e);
            }
            cursor.index
        };

        cursor.urls.insert(url);
        Ok(Appended::Written { index })
    }

    /// Closes the current shard of `pair` if it received records in this
    /// process, so the next append opens a new shard
    pub fn seal(&self, pair: &Pair) -> ShardResult<()> {
        let slot = self.slot(pair)?;
        let mut guard = slot
            .lock()
            .map_err(|_| ShardError::LockPoisoned(pair.to_string()))?;

        if let Some(cursor) = guard.as_mut() {
            if !cursor.courses.is_empty() && !cursor.sealed {
                cursor.sealed = true;
                tracing::debug!(
                    "Closed shard {} for {} with {} records",
                    cursor.index,
                    pair,
                    cursor.courses.len()
                );
            }
        }
        Ok(())
    }

    fn slot(&self, pair: &Pair) -> ShardResult<CursorSlot> {
        let mut cursors = self
            .cursors
            .lock()
            .map_err(|_| ShardError::LockPoisoned(pair.to_string()))?;
        Ok(cursors.entry(pair.clone()).or_default().clone())
    }

    /// Rebuilds the cursor of `pair` from disk
    ///
    /// Shards written by an earlier process are treated as closed.
    fn load_cursor(&self, pair: &Pair) -> ShardResult<PairCursor> {
        let dir = self.layout.pair_dir(pair);
        let indices = self
            .layout
            .list_indices(pair)
            .map_err(|source| ShardError::Io { path: dir, source })?;

        let mut urls = HashSet::new();
        let mut courses = Vec::new();
        let index = indices.last().copied().unwrap_or(0);

        for i in indices {
            if let Some(shard) = self.read_shard(pair, i)? {
                urls.extend(shard.courses.iter().filter_map(|r| r.url().map(str::to_string)));
                if i == index {
                    courses = shard.courses;
                }
            }
        }

        Ok(PairCursor {
            index,
            courses,
            sealed: index > 0,
            urls,
        })
    }

    fn write_shard(&self, pair: &Pair, index: usize, courses: &[ExtractedRecord]) -> ShardResult<()> {
        let dir = self.layout.pair_dir(pair);
        let path = self.layout.shard_path(pair, index);
        let io_err = |source| ShardError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let body = ShardFileRef {
            main_category: &pair.main_category,
            sub_category: &pair.sub_category,
            courses,
        };

        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut tmp, &body)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        Ok(())
    }
}

fn read_shard_file(path: &Path) -> ShardResult<Option<ShardFile>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ShardError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let shard = serde_json::from_str(&content).map_err(|source| ShardError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(shard))
}
