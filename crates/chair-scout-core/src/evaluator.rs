use rayon::prelude::*;
use tracing::{debug, warn};

use crate::archive::ImageArchive;
use crate::classifier::{checked_probability, Classifier};
use crate::error::{ClassificationError, StorageError};
use crate::storage::{AdRecord, AdStore};

pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Timestamp format shared by every row of one ad.
pub const OBSERVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ad-level verdict: a match if any image reaches the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub id: i64,
    pub price: f64,
    pub matches: bool,
    pub max_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Rows for this id already exist; first observation wins.
    AlreadyStored,
    MissingPrice,
    NoImages,
    /// Every image failed to decode or classify.
    NoUsableImages,
}

#[derive(Debug)]
pub enum Evaluation {
    Skipped(SkipReason),
    Decided {
        decision: Decision,
        /// Rows that could not be written; the decision still stands.
        storage_errors: Vec<StorageError>,
    },
}

impl Evaluation {
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Evaluation::Decided { decision, .. } => Some(decision),
            Evaluation::Skipped(_) => None,
        }
    }
}

/// Turns one scraped ad into at most one stored, decided outcome.
pub struct AdEvaluator<'a> {
    store: &'a dyn AdStore,
    classifier: &'a dyn Classifier,
    archive: &'a ImageArchive,
    threshold: f64,
}

impl<'a> AdEvaluator<'a> {
    pub fn new(
        store: &'a dyn AdStore,
        classifier: &'a dyn Classifier,
        archive: &'a ImageArchive,
    ) -> Self {
        Self {
            store,
            classifier,
            archive,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Evaluate one ad with the current local time as its observation time.
    pub fn evaluate(
        &self,
        id: i64,
        price: Option<f64>,
        images: &[Vec<u8>],
    ) -> Result<Evaluation, rusqlite::Error> {
        self.evaluate_at(id, price, images, Self::now)
    }

    /// Same as [`evaluate`](Self::evaluate), with the clock supplied by the
    /// caller. `clock` is only consulted once the ad is known to be new.
    pub fn evaluate_at<F>(
        &self,
        id: i64,
        price: Option<f64>,
        images: &[Vec<u8>],
        clock: F,
    ) -> Result<Evaluation, rusqlite::Error>
    where
        F: FnOnce() -> String,
    {
        // The existence check must precede any classification work.
        if self.store.exists(id)? {
            debug!("Ad {} already stored, skipping", id);
            return Ok(Evaluation::Skipped(SkipReason::AlreadyStored));
        }

        let price = match price {
            Some(price) => price,
            None => {
                debug!("Ad {} has no readable price, skipping", id);
                return Ok(Evaluation::Skipped(SkipReason::MissingPrice));
            }
        };

        if images.is_empty() {
            debug!("Ad {} has no downloaded images, skipping", id);
            return Ok(Evaluation::Skipped(SkipReason::NoImages));
        }

        let observed_at = clock();

        // Images are independent, so scoring fans out; `collect` keeps gallery order.
        let classifier = self.classifier;
        let scores: Vec<Result<f64, ClassificationError>> = images
            .par_iter()
            .map(|image| classifier.classify(image).and_then(checked_probability))
            .collect();

        let mut probabilities = Vec::with_capacity(images.len());
        let mut storage_errors = Vec::new();

        for (index, (image, score)) in images.iter().zip(scores).enumerate() {
            let probability = match score {
                Ok(p) => p,
                Err(e) => {
                    warn!("Ad {}: image {} could not be classified: {}", id, index, e);
                    continue;
                }
            };

            let image_ref = match self.archive.store(image, id, &observed_at, index) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Ad {}: image {} could not be archived: {}", id, index, e);
                    continue;
                }
            };

            probabilities.push(probability);

            let record = AdRecord {
                id,
                observed_at: observed_at.clone(),
                probability,
                price,
                image_ref,
            };
            if let Err(source) = self.store.append(&record) {
                warn!("Ad {}: failed to store image {}: {}", id, index, source);
                storage_errors.push(StorageError {
                    ad_id: id,
                    image_ref: record.image_ref,
                    source,
                });
            }
        }

        let max_probability = match probabilities.iter().copied().reduce(f64::max) {
            Some(max) => max,
            None => {
                warn!("Ad {}: none of {} images were usable", id, images.len());
                return Ok(Evaluation::Skipped(SkipReason::NoUsableImages));
            }
        };

        let decision = Decision {
            id,
            price,
            matches: max_probability >= self.threshold,
            max_probability,
        };
        debug!(
            "Ad {} at ${:.2}: {} of {} images scored, max probability {:.3}, match = {}",
            id,
            price,
            probabilities.len(),
            images.len(),
            max_probability,
            decision.matches
        );

        Ok(Evaluation::Decided {
            decision,
            storage_errors,
        })
    }

    fn now() -> String {
        chrono::Local::now().format(OBSERVED_AT_FORMAT).to_string()
    }
}
