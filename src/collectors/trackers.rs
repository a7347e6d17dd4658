use std::collections::BTreeSet;
use std::fs;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::collectors::{Collector, TRACKERS};
use crate::config::TrackersConfig;
use crate::error::{CollectorError, Result};
use crate::fsutil;
use crate::manifest::DatasetEntry;

// scheme://authority, path dropped; the scheme set matches the upstream lists
static TRACKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:udp|tcp|http|ws)://[^/\s]+").unwrap());

pub struct TrackersCollector {
    config: TrackersConfig,
    client: reqwest::Client,
}

impl TrackersCollector {
    pub fn new(config: TrackersConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(TrackersConfig::from_env()?))
    }

    async fn fetch_list(&self, source: &str) -> Result<String> {
        let response = self.client.get(source).send().await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Merges tracker list bodies into one deduplicated, sorted set of
/// `scheme://authority` announce endpoints.
pub fn merge_trackers<I, S>(bodies: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut trackers = BTreeSet::new();
    for body in bodies {
        for line in body.as_ref().lines() {
            if let Some(m) = TRACKER_RE.find(line.trim()) {
                trackers.insert(m.as_str().to_string());
            }
        }
    }
    trackers.into_iter().collect()
}

/// Renders the output file: one tracker per line followed by a comment
/// footer naming the sources, the timestamp and the count.
pub fn render_output(
    trackers: &[String],
    sources: &[String],
    updated: DateTime<Utc>,
) -> String {
    let mut content = trackers.join("\n");
    content.push_str("\n\n# Sources:\n");
    content.push_str(
        &sources
            .iter()
            .map(|s| format!("# - {s}"))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    content.push_str(&format!(
        "\n\n# Last updated: {}",
        updated.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    content.push_str(&format!("\n# Total trackers: {}", trackers.len()));
    content
}

#[async_trait]
impl Collector for TrackersCollector {
    fn name(&self) -> &'static str {
        TRACKERS
    }

    async fn collect(&self) -> Result<DatasetEntry> {
        info!("fetching {} tracker list(s)", self.config.sources.len());

        let mut bodies = Vec::new();
        for source in &self.config.sources {
            match self.fetch_list(source).await {
                Ok(body) => bodies.push(body),
                Err(e) => warn!("failed to download {source}: {e}"),
            }
        }

        let trackers = merge_trackers(&bodies);
        // an all-sources outage must not clobber the previous list with an
        // empty file; the run fails instead
        if trackers.is_empty() {
            return Err(CollectorError::Api {
                message: "no trackers could be extracted from any source".into(),
            });
        }
        let content = render_output(&trackers, &self.config.sources, Utc::now());

        if let Some(parent) = self.config.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.config.file_path, content)?;
        info!(
            "saved {} trackers to {}",
            trackers.len(),
            self.config.file_path.display()
        );

        Ok(DatasetEntry {
            name: self.config.dataset_name.clone(),
            description: Some("BitTorrent Trackers List".into()),
            description_zh: Some("BitTorrent 追踪器列表".into()),
            path: vec![fsutil::manifest_path(&self.config.file_path)],
            updated: None,
        })
    }
}
