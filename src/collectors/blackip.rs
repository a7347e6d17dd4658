use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{error, info};

use crate::collectors::{Collector, BLACKIP};
use crate::config::BlackIpConfig;
use crate::error::Result;
use crate::fsutil;
use crate::manifest::DatasetEntry;

pub struct BlackIpCollector {
    config: BlackIpConfig,
    client: reqwest::Client,
}

impl BlackIpCollector {
    pub fn new(config: BlackIpConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(BlackIpConfig::from_env()?))
    }

    async fn fetch_list(&self, source: &str) -> Result<String> {
        let response = self.client.get(source).send().await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Writes one source's list as `blackip_{source}_{chunk}.txt` files,
    /// `line_limit` addresses per file.
    fn split_and_save(&self, body: &str, source_index: usize) -> Result<usize> {
        let chunks = chunk_lines(body, self.config.line_limit);
        if chunks.is_empty() {
            return Ok(0);
        }
        fs::create_dir_all(&self.config.output_path)?;
        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let file_name = format!("blackip_{}_{}.txt", source_index, chunk_index + 1);
            fs::write(Path::new(&self.config.output_path).join(file_name), chunk)?;
        }
        Ok(chunks.len())
    }
}

/// Splits a list into newline-joined chunks of at most `limit` non-empty
/// lines each.
pub fn chunk_lines(body: &str, limit: usize) -> Vec<String> {
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.chunks(limit).map(|chunk| chunk.join("\n")).collect()
}

#[async_trait]
impl Collector for BlackIpCollector {
    fn name(&self) -> &'static str {
        BLACKIP
    }

    async fn collect(&self) -> Result<DatasetEntry> {
        for (index, source) in self.config.sources.iter().enumerate() {
            info!("processing blacklist source {source}");
            match self.fetch_list(source).await {
                Ok(body) => {
                    let written = self.split_and_save(&body, index + 1)?;
                    info!("wrote {written} chunk file(s) for {source}");
                }
                // a dead mirror must not sink the other sources
                Err(e) => error!("error fetching {source}: {e}"),
            }
        }

        let files = fsutil::list_files(&self.config.output_path);
        Ok(DatasetEntry {
            name: self.config.dataset_name.clone(),
            description: Some(
                "Automatically subscribe to blacklisted IP addresses and split them into \
                 multiple files (1000 entries per file) for easy management and usage."
                    .into(),
            ),
            description_zh: Some(
                "自动订阅黑名单IP地址，并按每1000条分割为多个文件，便于管理和使用。".into(),
            ),
            path: files,
            updated: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_the_line_limit() {
        let body = "1.1.1.1\n2.2.2.2\n3.3.3.3\n4.4.4.4\n5.5.5.5\n";
        let chunks = chunk_lines(body, 2);
        assert_eq!(chunks, vec!["1.1.1.1\n2.2.2.2", "3.3.3.3\n4.4.4.4", "5.5.5.5"]);
    }

    #[test]
    fn blank_and_whitespace_lines_are_dropped() {
        let chunks = chunk_lines("1.1.1.1\n\n   \n2.2.2.2\n", 10);
        assert_eq!(chunks, vec!["1.1.1.1\n2.2.2.2"]);
    }

    #[test]
    fn empty_body_yields_no_chunks() {
        assert!(chunk_lines("", 10).is_empty());
        assert!(chunk_lines("\n\n", 10).is_empty());
    }
}
