use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// One dataset tracked by the data center manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_zh: Option<String>,
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// The persisted manifest document: `{ "data": [ ... ] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub data: Vec<DatasetEntry>,
}

#[derive(Serialize)]
struct ManifestOut<'a> {
    data: &'a [DatasetEntry],
}

/// Fills in the `updated` timestamp when the caller did not supply one.
pub fn build(entry: DatasetEntry) -> DatasetEntry {
    DatasetEntry {
        updated: entry.updated.or_else(|| Some(Utc::now())),
        ..entry
    }
}

/// Reads the manifest from disk. A missing or corrupt file is treated as an
/// empty manifest so a first run bootstraps cleanly; collection must not stop
/// because the index is damaged.
pub fn load(path: &Path) -> Manifest {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("could not read manifest {}: {}", path.display(), e);
            return Manifest::default();
        }
    };
    match serde_json::from_str(&text) {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("could not parse manifest {}: {}", path.display(), e);
            Manifest::default()
        }
    }
}

/// Returns a new entry list with `entry` merged in by name: an unknown name is
/// appended, a known one is replaced in place with the new fields layered over
/// the old and a fresh `updated` timestamp. The input is not mutated.
pub fn upsert(existing: &[DatasetEntry], entry: DatasetEntry) -> Vec<DatasetEntry> {
    let mut out = existing.to_vec();
    match out.iter().position(|e| e.name == entry.name) {
        None => out.push(build(entry)),
        Some(index) => {
            let old = out[index].clone();
            out[index] = DatasetEntry {
                name: entry.name,
                description: entry.description.or(old.description),
                description_zh: entry.description_zh.or(old.description_zh),
                path: if entry.path.is_empty() { old.path } else { entry.path },
                updated: Some(Utc::now()),
            };
        }
    }
    out
}

/// Serializes the entries as formatted JSON and replaces the manifest file in
/// one rename so readers never observe a partial write. The manifest is the
/// only durable index, so failure here is an error for the caller.
pub fn save(path: &Path, entries: &[DatasetEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(&ManifestOut { data: entries })?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    info!("wrote manifest {}", path.display());
    Ok(())
}

/// The single entry point collectors call after a successful run:
/// load, upsert by name, save.
pub fn process_update(path: &Path, entry: DatasetEntry) -> Result<()> {
    let manifest = load(path);
    let updated = upsert(&manifest.data, entry);
    save(path, &updated)
}
