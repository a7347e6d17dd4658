use std::collections::BTreeSet;
use std::fs;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collectors::{Collector, RUNNER_IMAGES};
use crate::config::RunnerImagesConfig;
use crate::error::{CollectorError, Result};
use crate::fsutil;
use crate::github::GithubClient;
use crate::manifest::DatasetEntry;

const TABLE_HEADER: &str = "| Image | Architecture | YAML Label | Included Software |";

static SUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<sup>.*?</sup>").unwrap());
static MD_BADGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageEntry {
    pub image: String,
    #[serde(rename = "yamlLabels")]
    pub yaml_labels: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Categories {
    pub ubuntu: Vec<ImageEntry>,
    pub windows: Vec<ImageEntry>,
    pub macos: Vec<ImageEntry>,
    pub other: Vec<ImageEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunnerImagesDocument {
    pub sources: String,
    pub labels: Vec<String>,
    pub categories: Categories,
    pub updated: DateTime<Utc>,
}

pub struct RunnerImagesCollector {
    config: RunnerImagesConfig,
    client: GithubClient,
}

impl RunnerImagesCollector {
    pub fn new(config: RunnerImagesConfig) -> Self {
        let client = GithubClient::new(config.token.clone(), config.max_waits);
        Self { config, client }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(RunnerImagesConfig::from_env()?))
    }
}

/// A YAML label cell can name alternatives (`ubuntu-latest or ubuntu-24.04`)
/// and lists; split them all out and strip the backticks.
fn parse_yaml_labels(cell: &str) -> Vec<String> {
    cell.split(" or ")
        .flat_map(|part| part.split(','))
        .map(|label| label.trim().replace('`', ""))
        .filter(|label| !label.is_empty())
        .collect()
}

/// Strips the markup the README decorates image names with: `<sup>` notes,
/// `<br>` line breaks and beta badges.
fn clean_image_cell(raw: &str) -> String {
    let cell = SUP_TAG.replace_all(raw, "");
    let cell = cell.replace("<br>", " ");
    let cell = MD_BADGE.replace_all(&cell, "");
    cell.trim().to_string()
}

/// The contents API sometimes ignores the raw accept header and answers
/// with base64 instead of markdown. Markdown always carries table pipes,
/// so a pipe-free body gets a decode attempt; anything that does not
/// decode to UTF-8 markdown is passed through unchanged.
fn decode_readme(content: String) -> String {
    if content.contains('|') {
        return content;
    }
    let compact: String = content.split_whitespace().collect();
    match BASE64.decode(compact.as_bytes()) {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or(content),
        Err(_) => content,
    }
}

fn table_cells(line: &str) -> Vec<&str> {
    let mut cells: Vec<&str> = line.split('|').collect();
    // drop the empty fragments before the first and after the last pipe
    cells.remove(0);
    cells.pop();
    cells.iter().map(|c| c.trim()).collect()
}

/// Parses the "available images" table out of the runner-images README.
pub fn parse_os_versions(content: &str, source_repo: &str) -> Result<RunnerImagesDocument> {
    let start = content
        .find(TABLE_HEADER)
        .ok_or_else(|| CollectorError::MissingField("available images table not found".into()))?;
    let table = &content[start..];
    let table = match table.find("\n\n") {
        Some(end) => &table[..end],
        None => table,
    };

    let lines: Vec<&str> = table
        .lines()
        .filter(|line| line.trim_start().starts_with('|'))
        .collect();
    let headers = table_cells(lines[0]);
    let image_col = headers
        .iter()
        .position(|h| *h == "Image")
        .ok_or_else(|| CollectorError::MissingField("Image column not found".into()))?;
    let label_col = headers
        .iter()
        .position(|h| *h == "YAML Label")
        .ok_or_else(|| CollectorError::MissingField("YAML Label column not found".into()))?;

    let mut categories = Categories::default();
    let mut labels = BTreeSet::new();

    // lines[1] is the |---|---| separator row
    for line in lines.iter().skip(2) {
        let cells = table_cells(line);
        if cells.len() <= image_col.max(label_col) {
            continue;
        }
        let image = clean_image_cell(cells[image_col]);
        let yaml_labels = parse_yaml_labels(cells[label_col]);
        labels.extend(yaml_labels.iter().cloned());

        let entry = ImageEntry { image, yaml_labels };
        if entry.image.contains("Ubuntu") {
            categories.ubuntu.push(entry);
        } else if entry.image.contains("Windows") {
            categories.windows.push(entry);
        } else if entry.image.contains("macOS") {
            categories.macos.push(entry);
        } else {
            categories.other.push(entry);
        }
    }

    Ok(RunnerImagesDocument {
        sources: source_repo.to_string(),
        labels: labels.into_iter().collect(),
        categories,
        updated: Utc::now(),
    })
}

#[async_trait]
impl Collector for RunnerImagesCollector {
    fn name(&self) -> &'static str {
        RUNNER_IMAGES
    }

    async fn collect(&self) -> Result<DatasetEntry> {
        let url = format!(
            "https://api.github.com/repos/{}/contents/README.md",
            self.config.repo
        );
        info!("fetching README from {}", self.config.repo);
        let readme = decode_readme(self.client.get_raw(&url).await?);

        let document = parse_os_versions(&readme, &self.config.repo)?;

        if let Some(parent) = self.config.json_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(
            &self.config.json_file,
            serde_json::to_string_pretty(&document)?,
        )?;
        info!(
            "saved {} labels to {}",
            document.labels.len(),
            self.config.json_file.display()
        );

        Ok(DatasetEntry {
            name: self.config.dataset_name.clone(),
            description: Some("GitHub Actions Runner OS Versions".into()),
            description_zh: Some("GitHub Actions Runner 操作系统版本".into()),
            path: vec![fsutil::manifest_path(&self.config.json_file)],
            updated: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const README: &str = "\
# Runner Images

Some intro text.

## Available Images

| Image | Architecture | YAML Label | Included Software |
| --------------------|--------------- |--------------------|--------|
| Ubuntu 24.04 | x64 | `ubuntu-latest` or `ubuntu-24.04` | link |
| Windows Server 2022 | x64 | `windows-2022` | link |
| macOS 14 <sup>beta</sup><br>![beta](https://img.shields.io/badge/beta-blue) | arm64 | `macos-14` | link |
| Debian 12 | x64 | `debian-12` | link |

## Announcements
";

    #[test]
    fn parses_and_categorizes_the_image_table() {
        let doc = parse_os_versions(README, "actions/runner-images").unwrap();
        assert_eq!(doc.sources, "actions/runner-images");
        assert_eq!(
            doc.labels,
            vec!["debian-12", "macos-14", "ubuntu-24.04", "ubuntu-latest", "windows-2022"]
        );
        assert_eq!(doc.categories.ubuntu.len(), 1);
        assert_eq!(
            doc.categories.ubuntu[0].yaml_labels,
            vec!["ubuntu-latest", "ubuntu-24.04"]
        );
        assert_eq!(doc.categories.windows.len(), 1);
        assert_eq!(doc.categories.macos.len(), 1);
        assert_eq!(doc.categories.macos[0].image, "macOS 14");
        assert_eq!(doc.categories.other.len(), 1);
        assert_eq!(doc.categories.other[0].image, "Debian 12");
    }

    #[test]
    fn missing_table_is_an_error() {
        let err = parse_os_versions("no table here", "actions/runner-images").unwrap_err();
        assert!(matches!(err, CollectorError::MissingField(_)));
    }

    #[test]
    fn yaml_labels_split_on_or_and_commas() {
        assert_eq!(
            parse_yaml_labels("`ubuntu-latest` or `ubuntu-24.04`, `ubuntu-24`"),
            vec!["ubuntu-latest", "ubuntu-24.04", "ubuntu-24"]
        );
        assert!(parse_yaml_labels("").is_empty());
    }

    #[test]
    fn a_base64_contents_response_is_decoded_before_parsing() {
        let encoded = BASE64.encode(README.as_bytes());
        let doc = parse_os_versions(&decode_readme(encoded), "actions/runner-images").unwrap();
        assert_eq!(doc.categories.ubuntu.len(), 1);
    }

    #[test]
    fn plain_markdown_passes_through_undecoded() {
        assert_eq!(decode_readme(README.to_string()), README);
    }

    #[test]
    fn image_cell_markup_is_stripped() {
        assert_eq!(
            clean_image_cell("macOS 14 <sup>beta</sup><br>![beta](https://x/y.svg)"),
            "macOS 14"
        );
    }
}
