use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use recipe_scan::pipelines::{run_batch, write_augmented, BatchInput};
use recipe_scan::{fetch_recipe, ReqwestTransport, ScanConfig, SiteScheduler};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch one page and print the extracted record as JSON
    Url {
        /// Page to fetch
        url: String,
    },
    /// Scrape every URL in a CSV file and write <file>.csv with a scraper column
    Batch {
        /// CSV file with a `url` column
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let config = ScanConfig::load()?;

    match cli.command {
        Commands::Url { url } => {
            let record = fetch_recipe(&url, &config).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Batch { file } => {
            let input = BatchInput::from_path(&file)?;
            let transport = Arc::new(ReqwestTransport::new(&config.http)?);
            let (scheduler, mut results) = SiteScheduler::new(&config, transport);

            let idle = Duration::from_secs(config.batch.idle_timeout_secs);
            let batch = run_batch(&scheduler, &mut results, &input, idle).await;

            match write_augmented(&input, &batch, &file) {
                Ok(path) => info!("wrote {}", path.display()),
                Err(e) => error!("could not write results: {}", e),
            }
            print!("{}", batch.summary);
        }
    }

    Ok(())
}
