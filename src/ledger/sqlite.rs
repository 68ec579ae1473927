//! SQLite ledger implementation
//!
//! A single mutex around the connection is the ledger's global write lock:
//! every read-modify-write runs inside it, in its own transaction.

use crate::catalog::Pair;
use crate::ledger::schema::initialize_schema;
use crate::ledger::traits::{Ledger, LedgerError, LedgerResult, Recorded};
use crate::ledger::{CrossReference, LedgerRecord};
use crate::state::{LedgerStatus, Resolution};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite ledger backend
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Opens or creates the ledger database at `path`
    ///
    /// `synchronous = FULL` makes every committed write durable before the
    /// call returns.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory ledger (for testing and dry runs)
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LedgerError::LockPoisoned)
    }
}

fn query_owner(conn: &Connection, url: &str) -> LedgerResult<Option<Pair>> {
    let owner = conn
        .query_row(
            "SELECT main_category, sub_category FROM resolved_urls WHERE url = ?1",
            params![url],
            |row| Ok(Pair::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(owner)
}

fn parse_resolution(raw: String) -> LedgerResult<Resolution> {
    Resolution::from_db_string(&raw).ok_or(LedgerError::UnknownResolution(raw))
}

impl Ledger for SqliteLedger {
    fn status(&self, url: &str, pair: &Pair) -> LedgerResult<LedgerStatus> {
        let conn = self.lock()?;

        let Some(owner) = query_owner(&conn, url)? else {
            return Ok(LedgerStatus::New);
        };

        if &owner == pair {
            return Ok(LedgerStatus::SameCategory);
        }

        let cross_referenced: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cross_references
             WHERE url = ?1 AND main_category = ?2 AND sub_category = ?3)",
            params![url, pair.main_category, pair.sub_category],
            |row| row.get(0),
        )?;

        if cross_referenced {
            Ok(LedgerStatus::SameCategory)
        } else {
            Ok(LedgerStatus::CrossCategory { owner })
        }
    }

    fn record_resolved(
        &self,
        url: &str,
        pair: &Pair,
        resolution: Resolution,
        error_message: Option<&str>,
    ) -> LedgerResult<Recorded> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let recorded = match query_owner(&tx, url)? {
            None => {
                tx.execute(
                    "INSERT INTO resolved_urls
                     (url, main_category, sub_category, resolution, error_message, resolved_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        url,
                        pair.main_category,
                        pair.sub_category,
                        resolution.to_db_string(),
                        error_message,
                        now
                    ],
                )?;
                Recorded::Owner
            }
            Some(owner) if &owner == pair => Recorded::AlreadyPresent,
            // A cross-reference row means the pair's shard holds the URL
            Some(_) if resolution == Resolution::Failed => Recorded::Unresolved,
            Some(_) => {
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO cross_references
                     (url, main_category, sub_category, recorded_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![url, pair.main_category, pair.sub_category, now],
                )?;
                if inserted == 0 {
                    Recorded::AlreadyPresent
                } else {
                    Recorded::CrossReference
                }
            }
        };

        tx.commit()?;
        Ok(recorded)
    }

    fn owner_of(&self, url: &str) -> LedgerResult<Option<Pair>> {
        let conn = self.lock()?;
        query_owner(&conn, url)
    }

    fn urls_for_pair(&self, pair: &Pair) -> LedgerResult<HashSet<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT url FROM resolved_urls WHERE main_category = ?1 AND sub_category = ?2
             UNION
             SELECT url FROM cross_references WHERE main_category = ?1 AND sub_category = ?2",
        )?;

        let urls = stmt
            .query_map(params![pair.main_category, pair.sub_category], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(urls)
    }

    fn records(&self) -> LedgerResult<Vec<LedgerRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT url, main_category, sub_category, resolution, error_message, resolved_at
             FROM resolved_urls ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Pair::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(url, pair, resolution, error_message, resolved_at)| {
                Ok(LedgerRecord {
                    url,
                    pair,
                    resolution: parse_resolution(resolution)?,
                    error_message,
                    resolved_at,
                })
            })
            .collect()
    }

    fn cross_references(&self) -> LedgerResult<Vec<CrossReference>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT url, main_category, sub_category, recorded_at
             FROM cross_references ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CrossReference {
                    url: row.get(0)?,
                    pair: Pair::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn count(&self) -> LedgerResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM resolved_urls", [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    fn count_by_resolution(&self) -> LedgerResult<HashMap<Resolution, u64>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT resolution, COUNT(*) FROM resolved_urls GROUP BY resolution")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (resolution, count) in rows {
            counts.insert(parse_resolution(resolution)?, count as u64);
        }

        Ok(counts)
    }

    fn count_by_pair(&self) -> LedgerResult<Vec<(Pair, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT main_category, sub_category, COUNT(*) FROM resolved_urls
             GROUP BY main_category, sub_category
             ORDER BY main_category, sub_category",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    Pair::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                    row.get::<_, i64>(2)? as u64,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn start_run(&self, config_hash: &str) -> LedgerResult<Option<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let previous = tx
            .query_row(
                "SELECT config_hash FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        tx.execute(
            "INSERT INTO runs (started_at, config_hash) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), config_hash],
        )?;

        tx.commit()?;
        Ok(previous)
    }
}
