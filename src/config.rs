//! Typed, environment-driven configuration. Every collector reads its
//! settings once at startup through a `from_env` constructor so bad values
//! (malformed JSON lists, non-numeric limits) fail before any fetching
//! starts, not halfway through a run.

use std::env;
use std::path::PathBuf;

use crate::error::{CollectorError, Result};

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Lists are passed as JSON-encoded array strings, e.g.
/// `GITHUB_REPOS='["actions/checkout"]'`.
fn json_list(name: &str, default: &[&str]) -> Result<Vec<String>> {
    match optional_var(name) {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            CollectorError::Config(format!("{name} must be a JSON array of strings: {e}"))
        }),
        None => Ok(default.iter().map(|s| s.to_string()).collect()),
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CollectorError::Config(format!("{name} must be a number: {e}"))),
        None => Ok(default),
    }
}

fn optional_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CollectorError::Config(format!("{name} must be a number: {e}"))),
        None => Ok(None),
    }
}

/// Location of the central manifest file shared by all collectors.
#[derive(Debug, Clone)]
pub struct ManifestConfig {
    pub file: PathBuf,
}

impl ManifestConfig {
    pub fn from_env() -> Self {
        Self {
            file: var_or("DATA_CENTER_FILE", "./data.json").into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionVersionsConfig {
    pub json_file: PathBuf,
    pub repos: Vec<String>,
    pub token: Option<String>,
    pub dataset_name: String,
    pub max_waits: Option<u32>,
}

impl ActionVersionsConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            json_file: var_or("JSON_FILE_PATH", "./data/actions-versions.json").into(),
            repos: json_list(
                "GITHUB_REPOS",
                &[
                    "actions/checkout",
                    "actions/setup-node",
                    "actions/setup-python",
                ],
            )?,
            token: optional_var("GITHUB_TOKEN"),
            dataset_name: var_or("DATA_CENTER_NAME", "actions-versions"),
            max_waits: optional_parsed("RATE_LIMIT_MAX_WAITS")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunnerImagesConfig {
    pub repo: String,
    pub json_file: PathBuf,
    pub token: Option<String>,
    pub dataset_name: String,
    pub max_waits: Option<u32>,
}

impl RunnerImagesConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            repo: var_or("GITHUB_REPO", "actions/runner-images"),
            json_file: var_or("JSON_FILE_PATH", "./data/runner-images.json").into(),
            token: optional_var("GITHUB_TOKEN"),
            dataset_name: var_or("DATA_CENTER_NAME", "runner-images"),
            max_waits: optional_parsed("RATE_LIMIT_MAX_WAITS")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BlackIpConfig {
    pub sources: Vec<String>,
    pub line_limit: usize,
    pub output_path: PathBuf,
    pub dataset_name: String,
}

impl BlackIpConfig {
    pub fn from_env() -> Result<Self> {
        let line_limit = parsed_var("LINE_LIMIT", 1000usize)?;
        if line_limit == 0 {
            return Err(CollectorError::Config(
                "LINE_LIMIT must be at least 1".into(),
            ));
        }
        Ok(Self {
            sources: json_list("SOURCES", &["https://blackip.ustc.edu.cn/list.php?txt"])?,
            line_limit,
            output_path: var_or("OUTPUT_PATH", "./data/blackip").into(),
            dataset_name: var_or("DATA_CENTER_NAME", "blackIPs"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TrackersConfig {
    pub file_path: PathBuf,
    pub sources: Vec<String>,
    pub dataset_name: String,
}

pub const DEFAULT_TRACKER_SOURCES: [&str; 5] = [
    "https://raw.githubusercontent.com/ngosang/trackerslist/master/trackers_all.txt",
    "https://raw.githubusercontent.com/XIU2/TrackersListCollection/refs/heads/master/all.txt",
    "https://newtrackon.com/api/all",
    "https://raw.githubusercontent.com/1265578519/OpenTracker/refs/heads/master/tracker.txt",
    "https://raw.githubusercontent.com/Tunglies/TrackersList/refs/heads/main/all.txt",
];

impl TrackersConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            file_path: var_or("FILE_PATH", "./data/trackers.txt").into(),
            sources: json_list("SOURCES", &DEFAULT_TRACKER_SOURCES)?,
            dataset_name: var_or("DATA_CENTER_NAME", "trackers"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HolidaysConfig {
    pub script: PathBuf,
    pub output_path: PathBuf,
    pub dataset_name: String,
}

impl HolidaysConfig {
    pub fn from_env() -> Self {
        Self {
            script: var_or("HOLIDAYS_SCRIPT", "./scripts/holidays/holidays.py").into(),
            output_path: var_or("OUTPUT_PATH", "./data/holidays").into(),
            dataset_name: var_or("DATA_CENTER_NAME", "holidays"),
        }
    }
}
