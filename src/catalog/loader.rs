//! Catalog directory loader
//!
//! Reads every `*.json` file below the catalog directory. Each file holds
//! `{main_category, sub_category, courses: [{title, url}, ...]}`. Broken files
//! and entries are collected as `PlanningError`s instead of aborting the load.

use crate::catalog::{CatalogEntry, Pair, PlanningError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

/// On-disk shape of one catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub main_category: Option<String>,

    #[serde(default)]
    pub sub_category: Option<String>,

    #[serde(default)]
    pub courses: Vec<serde_json::Value>,
}

/// One listed course inside a catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct CourseLink {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

/// Result of loading a catalog directory
#[derive(Debug, Default)]
pub struct CatalogLoad {
    /// Valid entries, in file order then listing order
    pub entries: Vec<CatalogEntry>,

    /// Files and entries that were skipped
    pub skipped: Vec<PlanningError>,
}

/// Loads every catalog file below `dir`
///
/// Files are visited in sorted file-name order so that two loads of the same
/// directory always produce the same entry order. Symbolic links are not
/// followed.
///
/// # Arguments
///
/// * `dir` - Root of the catalog directory
///
/// # Returns
///
/// * `Ok(CatalogLoad)` - Entries plus whatever was skipped
/// * `Err(std::io::Error)` - The root directory itself could not be read
pub fn load_catalog(dir: &Path) -> Result<CatalogLoad, std::io::Error> {
    let mut load = CatalogLoad::default();
    let files = collect_json_files(dir, &mut load.skipped)?;

    for path in files {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(source) => {
                load.skipped.push(PlanningError::Unreadable { path, source });
                continue;
            }
        };

        let (entries, skipped) = parse_catalog_file(&path, &content);
        load.entries.extend(entries);
        load.skipped.extend(skipped);
    }

    tracing::debug!(
        "Loaded {} catalog entries ({} skipped) from {}",
        load.entries.len(),
        load.skipped.len(),
        dir.display()
    );

    Ok(load)
}

/// Parses the content of a single catalog file
///
/// Returns the valid entries and the problems found. A file with a missing
/// category name yields no entries at all.
pub fn parse_catalog_file(path: &Path, content: &str) -> (Vec<CatalogEntry>, Vec<PlanningError>) {
    let mut skipped = Vec::new();

    let file: CatalogFile = match serde_json::from_str(content) {
        Ok(f) => f,
        Err(e) => {
            skipped.push(PlanningError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
            return (Vec::new(), skipped);
        }
    };

    let main = match non_empty(file.main_category) {
        Some(m) => m,
        None => {
            skipped.push(PlanningError::MissingField {
                path: path.to_path_buf(),
                field: "main_category",
            });
            return (Vec::new(), skipped);
        }
    };
    let sub = match non_empty(file.sub_category) {
        Some(s) => s,
        None => {
            skipped.push(PlanningError::MissingField {
                path: path.to_path_buf(),
                field: "sub_category",
            });
            return (Vec::new(), skipped);
        }
    };

    let pair = Pair::new(main, sub);
    let mut entries = Vec::new();

    for value in file.courses {
        let link: CourseLink = match serde_json::from_value(value) {
            Ok(l) => l,
            Err(e) => {
                skipped.push(PlanningError::Malformed {
                    path: path.to_path_buf(),
                    message: format!("course entry: {}", e),
                });
                continue;
            }
        };

        let Some(raw_url) = non_empty(link.url) else {
            skipped.push(PlanningError::MissingField {
                path: path.to_path_buf(),
                field: "courses[].url",
            });
            continue;
        };

        if let Err(reason) = validate_item_url(&raw_url) {
            skipped.push(PlanningError::InvalidUrl {
                path: path.to_path_buf(),
                url: raw_url,
                reason,
            });
            continue;
        }

        entries.push(CatalogEntry {
            pair: pair.clone(),
            url: raw_url,
            title: link.title,
        });
    }

    (entries, skipped)
}

/// Item URLs must be absolute http(s) URLs
fn validate_item_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Walks `dir` for `*.json` files
///
/// Unreadable subdirectories are recorded in `skipped`; only a failure to
/// read the root itself is returned as an error.
fn collect_json_files(
    dir: &Path,
    skipped: &mut Vec<PlanningError>,
) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                skipped.push(PlanningError::Unreadable {
                    path,
                    source: e.into(),
                });
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}
