use chair_scout_core::{CycleSummary, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// CLI progress reporter using indicatif progress bars.
///
/// - Cycle: bar over the ads scraped this cycle
/// - Wait: spinner until the next cycle starts
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn style(template: &str) -> ProgressStyle {
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }
}

impl ProgressReporter for CliReporter {
    fn on_cycle_start(&self, cycle: u32, total_cycles: u32) {
        let pb = ProgressBar::new(0);
        pb.set_style(Self::style(
            "  {spinner:.cyan} {msg} [{bar:30.cyan/dim}] {pos}/{len} ads",
        ));
        pb.set_message(format!("Cycle {}/{}", cycle, total_cycles));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_ad_processed(&self, ads_seen: usize, max_ads: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                if pb.length() != Some(max_ads as u64) {
                    pb.set_length(max_ads as u64);
                }
                pb.set_position(ads_seen as u64);
            }
        }
    }

    fn on_cycle_complete(&self, cycle: u32, summary: &CycleSummary) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Cycle {} complete: {} ads, {} new, {} matches, {} alerts in {:.2}s",
            cycle,
            summary.ads_seen,
            summary.decided,
            summary.matches,
            summary.alerts,
            summary.duration.as_secs_f64()
        );
    }

    fn on_wait(&self, duration: Duration) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::style("{spinner:.cyan} {msg}"));
        pb.set_message(format!("Next cycle in {}s...", duration.as_secs()));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}
