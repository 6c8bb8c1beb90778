use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "chair-scout")]
#[command(about = "Watches classified ads for Herman Miller chairs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the ad database and the image download folder
    Init,
    /// Scrape, classify and alert for the configured number of cycles
    Hunt {
        /// Override the configured number of cycles
        #[arg(long)]
        repeat: Option<u32>,
        /// Override the configured delay between cycles, in seconds
        #[arg(long)]
        wait: Option<u64>,
    },
    /// List stored ads, one line per ad
    List {
        /// Only show ads whose best image reaches the probability threshold
        #[arg(long)]
        matches: bool,
    },
    /// Export every stored row to a CSV file
    Export {
        /// Destination CSV path
        path: PathBuf,
    },
    /// Print configuration values
    PrintConfig,
}
