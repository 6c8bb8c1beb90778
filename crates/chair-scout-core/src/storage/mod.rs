pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::{AdRecord, AdSummary};
pub use sqlite::Database;

use rusqlite::Result;

/// Append-only record of every (ad id, image) observation.
pub trait AdStore {
    /// True iff at least one row with this id is stored.
    fn exists(&self, id: i64) -> Result<bool>;
    fn append(&self, record: &AdRecord) -> Result<()>;
    fn all(&self) -> Result<Vec<AdRecord>>;
}
