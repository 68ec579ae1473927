//! Ledger schema definitions

/// SQL schema for the ledger database
pub const SCHEMA_SQL: &str = r#"
-- One owner row per URL, first writer wins
CREATE TABLE IF NOT EXISTS resolved_urls (
    url TEXT PRIMARY KEY,
    main_category TEXT NOT NULL,
    sub_category TEXT NOT NULL,
    resolution TEXT NOT NULL,
    error_message TEXT,
    resolved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_resolved_pair ON resolved_urls(main_category, sub_category);

-- Pairs a URL was seen under after its owner
CREATE TABLE IF NOT EXISTS cross_references (
    url TEXT NOT NULL REFERENCES resolved_urls(url),
    main_category TEXT NOT NULL,
    sub_category TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (url, main_category, sub_category)
);

CREATE INDEX IF NOT EXISTS idx_cross_pair ON cross_references(main_category, sub_category);

-- One row per harvest run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    config_hash TEXT NOT NULL
);
"#;

/// Initializes the ledger schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
