use std::env;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Our own crates log at info; dependencies only surface warnings.
const DEFAULT_FILTER: &str = "warn,chair_scout_core=info,chair_scout=info";
const DEFAULT_LOG_FILE: &str = "./logs/chair-scout.log";

/// `TRACING_LEVEL` takes a full filter directive, e.g.
/// `chair_scout_core::evaluator=debug`.
fn filter_layer() -> EnvFilter {
    match env::var("TRACING_LEVEL") {
        Ok(directives) => EnvFilter::try_new(&directives).unwrap_or_else(|e| {
            eprintln!("Ignoring invalid TRACING_LEVEL {:?}: {}", directives, e);
            EnvFilter::new(DEFAULT_FILTER)
        }),
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    }
}

pub fn init_logger() -> WorkerGuard {
    let log_file_path =
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

    let file_appender = tracing_appender::rolling::never("./", &log_file_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .compact()
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer())
        .init();

    info!("Logging to stdout and {}", log_file_path);

    guard
}
