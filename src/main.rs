use clap::{Parser, Subcommand};
use tracing::{error, warn};

use datacenter::collectors::{self, Collector};
use datacenter::config::ManifestConfig;
use datacenter::{logging, manifest};

#[derive(Parser)]
#[command(name = "datacenter")]
#[command(about = "Scheduled data collectors that maintain a central dataset manifest")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect latest release info for a list of GitHub Actions repos
    ActionVersions,
    /// Parse the runner-images README into categorized image labels
    RunnerImages,
    /// Download blacklisted IP lists and split them into chunk files
    Blackip,
    /// Aggregate BitTorrent tracker lists into one deduplicated file
    Trackers,
    /// Generate holiday data via the bundled python script
    Holidays,
    /// Run every collector sequentially
    All,
}

/// Runs the named collectors one after another and folds each result into
/// the central manifest. Returns the number of fatal failures.
async fn run_collectors(names: &[&str], manifest_config: &ManifestConfig) -> usize {
    let mut failures = 0;

    for name in names {
        let span = tracing::info_span!("collector", source = %name);
        let _enter = span.enter();

        println!("🔄 Running collector: {name}");
        let collector: Box<dyn Collector> = match collectors::create(name) {
            Ok(collector) => collector,
            Err(e) => {
                error!("configuration error for {name}: {e}");
                println!("❌ {name} configuration error: {e}");
                failures += 1;
                continue;
            }
        };

        match collector.collect().await {
            Ok(entry) => match manifest::process_update(&manifest_config.file, entry) {
                Ok(()) => println!("✅ {name}: data collected, manifest updated"),
                Err(e) => {
                    error!("manifest update failed for {name}: {e}");
                    println!("❌ {name}: manifest update failed: {e}");
                    failures += 1;
                }
            },
            Err(e) if collector.fatal_on_error() => {
                error!("collector {name} failed: {e}");
                println!("❌ {name} failed: {e}");
                failures += 1;
            }
            Err(e) => {
                warn!("collector {name} failed (non-fatal): {e}");
                println!("⚠️  {name} skipped: {e}");
            }
        }
    }

    failures
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let manifest_config = ManifestConfig::from_env();

    let names: Vec<&str> = match cli.command {
        Commands::ActionVersions => vec![collectors::ACTION_VERSIONS],
        Commands::RunnerImages => vec![collectors::RUNNER_IMAGES],
        Commands::Blackip => vec![collectors::BLACKIP],
        Commands::Trackers => vec![collectors::TRACKERS],
        Commands::Holidays => vec![collectors::HOLIDAYS],
        Commands::All => collectors::ALL.to_vec(),
    };

    let failures = run_collectors(&names, &manifest_config).await;
    if failures > 0 {
        anyhow::bail!("{failures} collector(s) failed");
    }
    Ok(())
}
