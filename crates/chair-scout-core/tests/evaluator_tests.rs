use std::cell::Cell;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use chair_scout_core::archive::ImageArchive;
use chair_scout_core::classifier::Classifier;
use chair_scout_core::error::ClassificationError;
use chair_scout_core::storage::{AdRecord, AdStore, Database};
use chair_scout_core::{AdEvaluator, Evaluation, SkipReason};
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::tempdir;

/// Distinct, decodable PNG per `seed`.
fn png(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(2, 2, Rgb([seed, 255 - seed, 7]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

/// Scores images by looking up their bytes; `None` means the model fails.
struct ScriptedClassifier {
    scores: Vec<(Vec<u8>, Option<f64>)>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn new(scores: Vec<(Vec<u8>, Option<f64>)>) -> Self {
        Self {
            scores,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, image: &[u8]) -> Result<f64, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scores.iter().find(|(bytes, _)| bytes.as_slice() == image) {
            Some((_, Some(p))) => Ok(*p),
            Some((_, None)) => Err(ClassificationError::Model("inference failed".to_string())),
            None => Err(ClassificationError::Model("unknown image".to_string())),
        }
    }
}

/// Gallery of PNGs with the given scores, plus a classifier that knows them.
fn gallery(scores: &[Option<f64>]) -> (Vec<Vec<u8>>, ScriptedClassifier) {
    let images: Vec<Vec<u8>> = (0..scores.len()).map(|i| png(i as u8 * 40)).collect();
    let classifier = ScriptedClassifier::new(
        images.iter().cloned().zip(scores.iter().copied()).collect(),
    );
    (images, classifier)
}

/// Store whose n-th append (1-based) fails.
struct FlakyStore {
    inner: Database,
    fail_on: usize,
    appends: Cell<usize>,
}

impl AdStore for FlakyStore {
    fn exists(&self, id: i64) -> rusqlite::Result<bool> {
        self.inner.exists(id)
    }

    fn append(&self, record: &AdRecord) -> rusqlite::Result<()> {
        let n = self.appends.get() + 1;
        self.appends.set(n);
        if n == self.fail_on {
            return Err(rusqlite::Error::QueryReturnedNoRows);
        }
        self.inner.append(record)
    }

    fn all(&self) -> rusqlite::Result<Vec<AdRecord>> {
        self.inner.all()
    }
}

#[test]
fn test_second_evaluation_of_same_id_is_skipped() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[Some(0.2), Some(0.4)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    let first = evaluator.evaluate(1001, Some(120.0), &images).unwrap();
    assert!(first.decision().is_some());
    assert_eq!(classifier.calls(), 2);
    assert_eq!(db.count_rows().unwrap(), 2);

    // Different price and images: id alone decides.
    let (other_images, _) = gallery(&[Some(0.9)]);
    let second = evaluator.evaluate(1001, Some(5.0), &other_images).unwrap();
    assert!(matches!(second, Evaluation::Skipped(SkipReason::AlreadyStored)));
    assert_eq!(classifier.calls(), 2);
    assert_eq!(db.count_rows().unwrap(), 2);
}

#[test]
fn test_any_image_over_threshold_matches() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();

    let (images, classifier) = gallery(&[Some(0.1), Some(0.9), Some(0.3)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive).with_threshold(0.7);
    let decision = evaluator
        .evaluate(1, Some(100.0), &images)
        .unwrap()
        .decision()
        .cloned()
        .unwrap();
    assert!(decision.matches);
    assert!((decision.max_probability - 0.9).abs() < 1e-9);

    let (images, classifier) = gallery(&[Some(0.1), Some(0.5), Some(0.3)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive).with_threshold(0.7);
    let decision = evaluator
        .evaluate(2, Some(100.0), &images)
        .unwrap()
        .decision()
        .cloned()
        .unwrap();
    assert!(!decision.matches);
    assert!((decision.max_probability - 0.5).abs() < 1e-9);
}

#[test]
fn test_threshold_is_inclusive() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[Some(0.7)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive).with_threshold(0.7);
    let evaluation = evaluator.evaluate(3, Some(10.0), &images).unwrap();
    assert!(evaluation.decision().unwrap().matches);
}

#[test]
fn test_empty_gallery_is_not_stored_and_can_retry() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[Some(0.95)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    let empty = evaluator.evaluate(55, Some(200.0), &[]).unwrap();
    assert!(matches!(empty, Evaluation::Skipped(SkipReason::NoImages)));
    assert_eq!(db.count_rows().unwrap(), 0);
    assert_eq!(classifier.calls(), 0);

    let retry = evaluator.evaluate(55, Some(200.0), &images).unwrap();
    assert!(retry.decision().unwrap().matches);
    assert!(db.exists(55).unwrap());
}

#[test]
fn test_missing_price_is_not_stored() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[Some(0.95)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    let evaluation = evaluator.evaluate(56, None, &images).unwrap();
    assert!(matches!(evaluation, Evaluation::Skipped(SkipReason::MissingPrice)));
    assert_eq!(classifier.calls(), 0);
    assert!(!db.exists(56).unwrap());
}

#[test]
fn test_rows_of_one_ad_share_date_and_price() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[Some(0.1), Some(0.2), Some(0.3)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    evaluator.evaluate(77, Some(325.0), &images).unwrap();

    let rows = db.all().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.id == 77));
    assert!(rows.iter().all(|r| r.observed_at == rows[0].observed_at));
    assert!(rows.iter().all(|r| r.price == 325.0));

    let probs: Vec<f64> = rows.iter().map(|r| r.probability).collect();
    assert_eq!(probs, vec![0.1, 0.2, 0.3]);
    let mut refs: Vec<&str> = rows.iter().map(|r| r.image_ref.as_str()).collect();
    refs.dedup();
    assert_eq!(refs.len(), 3);
}

#[test]
fn test_supplied_clock_stamps_every_row() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[Some(0.6), Some(0.8)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    evaluator
        .evaluate_at(5, Some(90.0), &images, || "2021-03-04 05:06:07".to_string())
        .unwrap();

    let rows = db.all().unwrap();
    assert!(rows.iter().all(|r| r.observed_at == "2021-03-04 05:06:07"));
    assert!(rows[1].image_ref.ends_with("5_2021-03-04_05-06-07_1.png"));
}

#[test]
fn test_failed_image_is_excluded_from_rows_and_max() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[Some(0.3), None, Some(0.6)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    let decision = evaluator
        .evaluate(8, Some(40.0), &images)
        .unwrap()
        .decision()
        .cloned()
        .unwrap();
    assert_eq!(db.count_rows().unwrap(), 2);
    assert!((decision.max_probability - 0.6).abs() < 1e-9);
    assert!(!decision.matches);
}

#[test]
fn test_out_of_range_score_counts_as_failure() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[Some(1.7), Some(0.2)]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    let decision = evaluator.evaluate(9, Some(40.0), &images).unwrap();
    assert!((decision.decision().unwrap().max_probability - 0.2).abs() < 1e-9);
    assert_eq!(db.count_rows().unwrap(), 1);
}

#[test]
fn test_ad_with_no_usable_images_is_not_stored() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let (images, classifier) = gallery(&[None, None]);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    let evaluation = evaluator.evaluate(10, Some(40.0), &images).unwrap();
    assert!(matches!(evaluation, Evaluation::Skipped(SkipReason::NoUsableImages)));
    assert!(!db.exists(10).unwrap());
}

#[test]
fn test_corrupt_image_is_skipped_but_siblings_stored() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let db = Database::open_in_memory().unwrap();
    let good = png(1);
    let bad = b"truncated download".to_vec();
    let classifier = |_: &[u8]| Ok::<f64, ClassificationError>(0.8);
    let evaluator = AdEvaluator::new(&db, &classifier, &archive);

    let evaluation = evaluator
        .evaluate(11, Some(40.0), &[bad, good])
        .unwrap();
    assert!(evaluation.decision().unwrap().matches);
    let rows = db.all().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].image_ref.ends_with("_1.png"));
}

#[test]
fn test_storage_failure_is_surfaced_and_siblings_written() {
    let dir = tempdir().unwrap();
    let archive = ImageArchive::new(dir.path());
    let store = FlakyStore {
        inner: Database::open_in_memory().unwrap(),
        fail_on: 2,
        appends: Cell::new(0),
    };
    let (images, classifier) = gallery(&[Some(0.2), Some(0.9), Some(0.4)]);
    let evaluator = AdEvaluator::new(&store, &classifier, &archive);

    match evaluator.evaluate(12, Some(75.0), &images).unwrap() {
        Evaluation::Decided {
            decision,
            storage_errors,
        } => {
            assert_eq!(storage_errors.len(), 1);
            assert_eq!(storage_errors[0].ad_id, 12);
            assert!(decision.matches);
        }
        other => panic!("expected a decision, got {:?}", other),
    }
    assert_eq!(store.inner.count_rows().unwrap(), 2);
}
