use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::process::Command;
use tracing::info;

use crate::collectors::{Collector, HOLIDAYS};
use crate::config::HolidaysConfig;
use crate::error::{CollectorError, Result};
use crate::fsutil;
use crate::manifest::DatasetEntry;

/// Generates holiday data for the current and next year by shelling out to
/// the bundled python script. The interpreter may be absent on a given
/// machine, so this collector is best-effort: a failure is logged and the
/// rest of the run continues.
pub struct HolidaysCollector {
    config: HolidaysConfig,
}

impl HolidaysCollector {
    pub fn new(config: HolidaysConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(HolidaysConfig::from_env())
    }
}

#[async_trait]
impl Collector for HolidaysCollector {
    fn name(&self) -> &'static str {
        HOLIDAYS
    }

    fn fatal_on_error(&self) -> bool {
        false
    }

    async fn collect(&self) -> Result<DatasetEntry> {
        let current_year = Utc::now().year();
        let next_year = current_year + 1;
        info!("fetching holidays for {current_year} and {next_year}");

        let status = Command::new("python")
            .arg(&self.config.script)
            .arg("-y")
            .arg(current_year.to_string())
            .arg(next_year.to_string())
            .arg("-o")
            .arg(&self.config.output_path)
            .status()
            .await?;
        if !status.success() {
            return Err(CollectorError::Api {
                message: format!("holidays script exited with {status}"),
            });
        }

        let files = fsutil::list_files(&self.config.output_path);
        Ok(DatasetEntry {
            name: self.config.dataset_name.clone(),
            description: Some("Chinese Holiday Information".into()),
            description_zh: Some("中国节假日信息".into()),
            path: files,
            updated: None,
        })
    }
}
