use std::fs;
use std::path::Path;

use tracing::warn;

/// Recursively lists every file under `dir`, sorted, with `/` separators,
/// ready to drop into a manifest `path` field. Unreadable entries are logged
/// and skipped rather than failing the listing.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut out = Vec::new();
    walk(dir, &mut out);
    out.sort();
    out
}

fn walk(dir: &Path, out: &mut Vec<String>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("could not read directory {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => walk(&path, out),
            Ok(ft) if ft.is_file() => out.push(manifest_path(&path)),
            Ok(_) => {} // symlinks and other special entries are ignored
            Err(e) => warn!("could not stat {}: {}", path.display(), e),
        }
    }
}

/// Normalizes a path for the manifest: forward slashes, no leading `./`.
pub fn manifest_path(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.strip_prefix("./").unwrap_or(&text).to_string()
}
