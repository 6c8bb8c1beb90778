mod commands;
mod logging;
mod notifier;
mod progress;

use std::fs;
use std::path::Path;
use std::process;

use anyhow::{anyhow, Context, Result};
use chair_scout_core::classifier::CommandClassifier;
use chair_scout_core::source::FeedSource;
use chair_scout_core::storage::{AdStore, Database};
use chair_scout_core::{AppConfig, HuntEngine};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use notifier::TerminalNotifier;
use progress::CliReporter;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match chair_scout_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Init) => run_init(&config),
        Some(Commands::Hunt { repeat, wait }) => {
            if let Some(repeat) = repeat {
                config.repeat = repeat;
            }
            if let Some(wait) = wait {
                config.wait_secs = wait;
            }
            run_hunt(config)
        }
        Some(Commands::List { matches }) => run_list(&config, matches),
        Some(Commands::Export { path }) => run_export(&config, &path),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run_init(config: &AppConfig) -> Result<()> {
    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path))?;
    db.close()?;
    fs::create_dir_all(&config.download_folder)
        .with_context(|| format!("creating download folder {}", config.download_folder))?;
    info!(
        "Initialized {} and {}",
        config.db_path.cyan(),
        config.download_folder.cyan()
    );
    Ok(())
}

fn run_hunt(config: AppConfig) -> Result<()> {
    config.validate()?;

    let program = config.classifier_command.as_deref().ok_or_else(|| {
        anyhow!("classifier_command is not configured (set CHAIR_SCOUT_CLASSIFIER_COMMAND)")
    })?;
    let classifier = CommandClassifier::new(program, &config.model_path);
    let notifier = TerminalNotifier::new(&config.target_url);
    let mut source = FeedSource::new(&config.feed_path);
    let reporter = CliReporter::new();

    info!(
        "Hunting {} for {} cycles (threshold {}, ceiling ${})",
        config.target_url, config.repeat, config.prob_threshold, config.max_price
    );

    let mut engine = HuntEngine::new(config);
    let summary = engine.hunt(&mut source, &classifier, &notifier, &reporter)?;

    println!();
    info!(
        "{} cycles, {} ads seen, {} new ads, {} matches, {} alerts",
        format!("{}", summary.cycles).green(),
        format!("{}", summary.ads_seen).green(),
        format!("{}", summary.decided).cyan(),
        format!("{}", summary.matches).yellow(),
        format!("{}", summary.alerts).red(),
    );
    if summary.failed_cycles > 0 {
        error!(
            "{} cycles failed before finishing",
            format!("{}", summary.failed_cycles).red()
        );
    }
    if summary.storage_failures > 0 {
        error!(
            "{} rows could not be stored",
            format!("{}", summary.storage_failures).red()
        );
    }
    Ok(())
}

fn run_list(config: &AppConfig, matches_only: bool) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let min_probability = matches_only.then_some(config.prob_threshold);
    let summaries = db.ad_summaries(min_probability)?;

    for ad in &summaries {
        let prob = format!("{:.3}", ad.max_probability);
        let prob = if ad.max_probability >= config.prob_threshold {
            prob.yellow()
        } else {
            prob.normal()
        };
        println!(
            "{}  {:>12}  ${:>9.2}  p={}  {} images",
            ad.observed_at,
            ad.id,
            ad.price,
            prob,
            ad.image_count
        );
    }
    info!(
        "{} ads, {} rows",
        summaries.len(),
        db.count_rows()?
    );
    Ok(())
}

fn run_export(config: &AppConfig, path: &Path) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["id", "date", "prob", "price", "filename"])?;

    let records = db.all()?;
    for r in &records {
        writer.write_record(&[
            r.id.to_string(),
            r.observed_at.clone(),
            r.probability.to_string(),
            r.price.to_string(),
            r.image_ref.clone(),
        ])?;
    }
    writer.flush()?;
    info!("Exported {} rows to {}", records.len(), path.display());
    Ok(())
}
