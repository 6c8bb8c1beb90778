use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::archive::ImageArchive;
use crate::classifier::Classifier;
use crate::config::AppConfig;
use crate::error::Error;
use crate::evaluator::{AdEvaluator, Evaluation, SkipReason};
use crate::notify::{self, Notifier};
use crate::progress::ProgressReporter;
use crate::source::AdSource;
use crate::storage::{AdStore, Database};

/// Counts for one pass over the listing page.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleSummary {
    pub ads_seen: usize,
    pub lookup_failures: usize,
    pub already_stored: usize,
    pub skipped: usize,
    pub decided: usize,
    pub matches: usize,
    pub alerts: usize,
    pub storage_failures: usize,
    pub duration: Duration,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct HuntSummary {
    /// Cycles that ran to completion.
    pub cycles: u32,
    /// Cycles abandoned on a feed or store error.
    pub failed_cycles: u32,
    pub ads_seen: usize,
    pub decided: usize,
    pub matches: usize,
    pub alerts: usize,
    pub storage_failures: usize,
}

impl HuntSummary {
    fn absorb(&mut self, cycle: &CycleSummary) {
        self.cycles += 1;
        self.ads_seen += cycle.ads_seen;
        self.decided += cycle.decided;
        self.matches += cycle.matches;
        self.alerts += cycle.alerts;
        self.storage_failures += cycle.storage_failures;
    }
}

/// Repeatedly scrapes, evaluates and alerts, one cycle at a time.
///
/// The set of alerted ids lives as long as the engine; a new engine alerts
/// again for ads that an earlier process already announced.
pub struct HuntEngine {
    config: AppConfig,
    seen_ids: HashSet<i64>,
}

impl HuntEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            seen_ids: HashSet::new(),
        }
    }

    pub fn seen_ids(&self) -> &HashSet<i64> {
        &self.seen_ids
    }

    /// Run `config.repeat` cycles, sleeping `config.wait_secs` between them.
    ///
    /// Only an invalid configuration is fatal. A cycle that fails is logged
    /// and the next one starts after the usual wait.
    pub fn hunt(
        &mut self,
        source: &mut dyn AdSource,
        classifier: &dyn Classifier,
        notifier: &dyn Notifier,
        reporter: &dyn ProgressReporter,
    ) -> Result<HuntSummary, Error> {
        self.config.validate()?;
        let total = self.config.repeat;
        let mut summary = HuntSummary::default();

        for cycle in 1..=total {
            reporter.on_cycle_start(cycle, total);
            match self.run_cycle(source, classifier, notifier, reporter) {
                Ok(cycle_summary) => {
                    info!(
                        "Cycle {}/{}: {} ads seen, {} new, {} matches, {} alerts",
                        cycle,
                        total,
                        cycle_summary.ads_seen,
                        cycle_summary.decided,
                        cycle_summary.matches,
                        cycle_summary.alerts,
                    );
                    reporter.on_cycle_complete(cycle, &cycle_summary);
                    summary.absorb(&cycle_summary);
                }
                Err(e) => {
                    error!("Cycle {}/{} failed: {}", cycle, total, e);
                    summary.failed_cycles += 1;
                }
            }

            if cycle < total {
                let wait = self.config.wait();
                reporter.on_wait(wait);
                debug!("Waiting {}s before next cycle", wait.as_secs());
                thread::sleep(wait);
            }
        }

        Ok(summary)
    }

    /// One scrape cycle against the configured store. The store is opened
    /// for the cycle and closed before returning, so cycles never share a
    /// connection.
    pub fn run_cycle(
        &mut self,
        source: &mut dyn AdSource,
        classifier: &dyn Classifier,
        notifier: &dyn Notifier,
        reporter: &dyn ProgressReporter,
    ) -> Result<CycleSummary, Error> {
        let db = Database::open(&self.config.db_path)?;
        let result = self.run_cycle_with(&db, source, classifier, notifier, reporter);
        // Rows are already committed and alerts sent; a failed close loses nothing.
        if let Err(e) = db.close() {
            warn!("Could not close ad store {}: {}", self.config.db_path, e);
        }
        result
    }

    /// One scrape cycle against `store`: evaluate up to `max_ads` ads, then
    /// gate and deliver alerts for this cycle's decisions.
    pub fn run_cycle_with(
        &mut self,
        store: &dyn AdStore,
        source: &mut dyn AdSource,
        classifier: &dyn Classifier,
        notifier: &dyn Notifier,
        reporter: &dyn ProgressReporter,
    ) -> Result<CycleSummary, Error> {
        let start = Instant::now();
        let archive = ImageArchive::new(&self.config.download_folder);
        let evaluator =
            AdEvaluator::new(store, classifier, &archive).with_threshold(self.config.prob_threshold);

        source.start_cycle()?;

        let mut summary = CycleSummary::default();
        let mut decisions = Vec::new();

        while summary.ads_seen < self.config.max_ads {
            let scraped = match source.next_ad() {
                Some(scraped) => scraped,
                None => break,
            };
            summary.ads_seen += 1;
            reporter.on_ad_processed(summary.ads_seen, self.config.max_ads);

            let ad = match scraped {
                Ok(ad) => ad,
                Err(e) => {
                    warn!("Skipping unreadable ad: {}", e);
                    summary.lookup_failures += 1;
                    continue;
                }
            };

            match evaluator.evaluate(ad.id, ad.price, &ad.images) {
                Ok(Evaluation::Skipped(SkipReason::AlreadyStored)) => summary.already_stored += 1,
                Ok(Evaluation::Skipped(_)) => summary.skipped += 1,
                Ok(Evaluation::Decided {
                    decision,
                    storage_errors,
                }) => {
                    for e in &storage_errors {
                        error!("{}", e);
                    }
                    summary.storage_failures += storage_errors.len();
                    summary.decided += 1;
                    if decision.matches {
                        summary.matches += 1;
                    }
                    decisions.push(decision);
                }
                Err(e) => {
                    error!("Could not check ad {} against the store: {}", ad.id, e);
                    summary.storage_failures += 1;
                }
            }
        }

        let alerts = notify::process(&decisions, self.config.max_price, &mut self.seen_ids);
        summary.alerts = notify::deliver(&alerts, notifier, self.config.alert_pause());
        summary.duration = start.elapsed();
        Ok(summary)
    }
}
