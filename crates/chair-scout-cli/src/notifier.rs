use chair_scout_core::error::NotificationError;
use chair_scout_core::notify::Notifier;
use colored::*;
use std::io::{self, Write};

/// Prints alerts to the terminal and rings the bell.
pub struct TerminalNotifier {
    listing_url: String,
}

impl TerminalNotifier {
    pub fn new(listing_url: &str) -> Self {
        Self {
            listing_url: listing_url.to_string(),
        }
    }
}

impl Notifier for TerminalNotifier {
    fn alert(&self, title: &str, description: &str) -> Result<(), NotificationError> {
        let mut stderr = io::stderr().lock();
        writeln!(
            stderr,
            "\x07  {} ad {} listed at {} ({})",
            "★ Possible Herman Miller:".bold().yellow(),
            title.bold(),
            description.green(),
            self.listing_url.dimmed(),
        )
        .map_err(|e| NotificationError(e.to_string()))?;
        stderr
            .flush()
            .map_err(|e| NotificationError(e.to_string()))
    }
}
