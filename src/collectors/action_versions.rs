use std::fs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::collectors::{Collector, ACTION_VERSIONS};
use crate::config::ActionVersionsConfig;
use crate::error::{CollectorError, Result};
use crate::fsutil;
use crate::github::GithubClient;
use crate::manifest::DatasetEntry;

const NOT_AVAILABLE: &str = "N/A";

/// Latest-release summary for one GitHub Action repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionInfo {
    pub repo: String,
    pub latest: String,
    pub major: String,
    pub status: String,
    pub description: Option<String>,
    #[serde(rename = "releaseDate")]
    pub release_date: String,
    pub changelog: String,
    #[serde(rename = "docsUrl")]
    pub docs_url: String,
}

/// The dataset's output document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ActionsDocument {
    #[serde(default)]
    pub actions: Vec<ActionInfo>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

pub struct ActionVersionsCollector {
    config: ActionVersionsConfig,
    client: GithubClient,
}

impl ActionVersionsCollector {
    pub fn new(config: ActionVersionsConfig) -> Self {
        let client = GithubClient::new(config.token.clone(), config.max_waits);
        Self { config, client }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ActionVersionsConfig::from_env()?))
    }

    #[instrument(skip(self))]
    async fn fetch_latest(&self, repo: &str) -> Result<ActionInfo> {
        let url = format!("https://api.github.com/repos/{repo}");
        let repo_data = self.client.get_json(&url).await?;

        let description = repo_data["description"].as_str().map(str::to_string);
        let archived = repo_data["archived"].as_bool().unwrap_or(false);
        let status = if archived { "deprecated" } else { "active" };
        let docs_url = repo_data["html_url"].as_str().unwrap_or_default().to_string();
        let releases_url = repo_data["releases_url"]
            .as_str()
            .ok_or_else(|| CollectorError::MissingField("releases_url not found".into()))?
            .replace("{/id}", "");

        let releases = self.client.get_json(&releases_url).await?;
        let latest = match releases.as_array().and_then(|r| r.first()) {
            Some(release) => release.clone(),
            None => {
                return Ok(ActionInfo {
                    repo: repo.to_string(),
                    latest: NOT_AVAILABLE.into(),
                    major: NOT_AVAILABLE.into(),
                    status: status.into(),
                    description,
                    release_date: NOT_AVAILABLE.into(),
                    changelog: NOT_AVAILABLE.into(),
                    docs_url,
                });
            }
        };

        let tag = latest["tag_name"]
            .as_str()
            .ok_or_else(|| CollectorError::MissingField("tag_name not found".into()))?;
        let release_date = latest["published_at"].as_str().unwrap_or(NOT_AVAILABLE);
        let changelog = latest["body"].as_str().unwrap_or("No changelog provided");

        Ok(ActionInfo {
            repo: repo.to_string(),
            latest: tag.to_string(),
            major: major_of(tag),
            status: status.into(),
            description,
            release_date: release_date.to_string(),
            changelog: changelog.to_string(),
            docs_url,
        })
    }

    fn load_existing(&self) -> ActionsDocument {
        match fs::read_to_string(&self.config.json_file) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => ActionsDocument::default(),
        }
    }
}

/// Major version component of a tag, `v` prefix stripped: `v4.2.1` -> `4`.
fn major_of(tag: &str) -> String {
    tag.trim_start_matches('v')
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn upsert_action(actions: &mut Vec<ActionInfo>, info: ActionInfo) {
    match actions.iter().position(|a| a.repo == info.repo) {
        Some(index) => actions[index] = info,
        None => actions.push(info),
    }
}

#[async_trait]
impl Collector for ActionVersionsCollector {
    fn name(&self) -> &'static str {
        ACTION_VERSIONS
    }

    async fn collect(&self) -> Result<DatasetEntry> {
        let mut document = self.load_existing();

        for repo in &self.config.repos {
            info!("processing {repo}");
            match self.fetch_latest(repo).await {
                Ok(action) => upsert_action(&mut document.actions, action),
                // one repo failing must not sink the others
                Err(e) => error!("error fetching {repo}: {e}"),
            }
        }
        document.updated = Some(Utc::now());

        if let Some(parent) = self.config.json_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(
            &self.config.json_file,
            serde_json::to_string_pretty(&document)?,
        )?;
        info!("saved {} actions to {}", document.actions.len(), self.config.json_file.display());

        Ok(DatasetEntry {
            name: self.config.dataset_name.clone(),
            description: Some("GitHub Actions Versions".into()),
            description_zh: Some("GitHub Actions 版本信息".into()),
            path: vec![fsutil::manifest_path(&self.config.json_file)],
            updated: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_strips_v_prefix() {
        assert_eq!(major_of("v4.2.1"), "4");
        assert_eq!(major_of("2.0"), "2");
        assert_eq!(major_of("v10"), "10");
    }

    fn info(repo: &str, latest: &str) -> ActionInfo {
        ActionInfo {
            repo: repo.into(),
            latest: latest.into(),
            major: major_of(latest),
            status: "active".into(),
            description: None,
            release_date: NOT_AVAILABLE.into(),
            changelog: NOT_AVAILABLE.into(),
            docs_url: String::new(),
        }
    }

    #[test]
    fn upsert_action_replaces_by_repo() {
        let mut actions = vec![info("actions/checkout", "v4"), info("actions/cache", "v3")];
        upsert_action(&mut actions, info("actions/checkout", "v5"));
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].latest, "v5");

        upsert_action(&mut actions, info("actions/setup-node", "v4"));
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn document_round_trips_camel_case_fields() {
        let doc = ActionsDocument {
            actions: vec![info("actions/checkout", "v4")],
            updated: Some(Utc::now()),
        };
        let json = serde_json::to_string_pretty(&doc).unwrap();
        assert!(json.contains("\"releaseDate\""));
        assert!(json.contains("\"docsUrl\""));
        let back: ActionsDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.actions[0].repo, "actions/checkout");
    }
}
