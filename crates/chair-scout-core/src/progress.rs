use std::time::Duration;

use crate::engine::CycleSummary;

/// Trait for reporting hunt progress.
///
/// The CLI implements it with indicatif. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_cycle_start(&self, _cycle: u32, _total_cycles: u32) {}
    fn on_ad_processed(&self, _ads_seen: usize, _max_ads: usize) {}
    fn on_cycle_complete(&self, _cycle: u32, _summary: &CycleSummary) {}
    fn on_wait(&self, _duration: Duration) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
