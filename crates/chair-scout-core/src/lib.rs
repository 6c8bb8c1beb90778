pub mod archive;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod notify;
pub mod progress;
pub mod source;
pub mod storage;

pub use config::AppConfig;
pub use engine::{CycleSummary, HuntEngine, HuntSummary};
pub use error::Error;
pub use evaluator::{AdEvaluator, Decision, Evaluation, SkipReason};
pub use progress::{ProgressReporter, SilentReporter};
