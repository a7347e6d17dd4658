use async_trait::async_trait;

use crate::error::{CollectorError, Result};
use crate::manifest::DatasetEntry;

pub mod action_versions;
pub mod blackip;
pub mod holidays;
pub mod runner_images;
pub mod trackers;

pub const ACTION_VERSIONS: &str = "action-versions";
pub const RUNNER_IMAGES: &str = "runner-images";
pub const BLACKIP: &str = "blackip";
pub const TRACKERS: &str = "trackers";
pub const HOLIDAYS: &str = "holidays";

pub const ALL: [&str; 5] = [ACTION_VERSIONS, RUNNER_IMAGES, BLACKIP, TRACKERS, HOLIDAYS];

/// One data source pipeline: fetch, transform, write the dataset's files,
/// and describe the result as a manifest entry. The caller is responsible
/// for folding that entry into the central manifest.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Identifier used on the command line and in logs.
    fn name(&self) -> &'static str;

    /// Runs the collection and returns the manifest entry describing the
    /// files written. Failures of a single source within the run are logged
    /// and skipped inside `collect`; an `Err` here means the whole dataset
    /// could not be produced.
    async fn collect(&self) -> Result<DatasetEntry>;

    /// Whether a failed run should fail the process. Best-effort collectors
    /// (e.g. ones shelling out to an optional interpreter) override this.
    fn fatal_on_error(&self) -> bool {
        true
    }
}

/// Builds a collector by CLI name, reading its configuration from the
/// environment.
pub fn create(name: &str) -> Result<Box<dyn Collector>> {
    match name {
        ACTION_VERSIONS => Ok(Box::new(action_versions::ActionVersionsCollector::from_env()?)),
        RUNNER_IMAGES => Ok(Box::new(runner_images::RunnerImagesCollector::from_env()?)),
        BLACKIP => Ok(Box::new(blackip::BlackIpCollector::from_env()?)),
        TRACKERS => Ok(Box::new(trackers::TrackersCollector::from_env()?)),
        HOLIDAYS => Ok(Box::new(holidays::HolidaysCollector::from_env())),
        _ => Err(CollectorError::Config(format!("unknown collector: {name}"))),
    }
}
