use super::models::*;
use super::sqlite::Database;
use super::AdStore;
use rusqlite::{params, Result, Row};

fn record_from_row(row: &Row<'_>) -> Result<AdRecord> {
    Ok(AdRecord {
        id: row.get(0)?,
        observed_at: row.get(1)?,
        probability: row.get(2)?,
        price: row.get(3)?,
        image_ref: row.get(4)?,
    })
}

impl AdStore for Database {
    fn exists(&self, id: i64) -> Result<bool> {
        self.connection().query_row(
            "SELECT EXISTS(SELECT 1 FROM chairs WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )
    }

    fn append(&self, record: &AdRecord) -> Result<()> {
        self.connection().execute(
            "INSERT INTO chairs (id, date, prob, price, filename) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.observed_at,
                record.probability,
                record.price,
                record.image_ref
            ],
        )?;
        Ok(())
    }

    fn all(&self) -> Result<Vec<AdRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, date, prob, price, filename FROM chairs ORDER BY rowid",
        )?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl Database {
    /// Number of distinct ads in the store.
    pub fn count_ads(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(DISTINCT id) FROM chairs", [], |row| row.get(0))
    }

    pub fn count_rows(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM chairs", [], |row| row.get(0))
    }

    /// One summary per ad, oldest first. With `min_probability`, only ads
    /// whose best image reaches it are returned.
    pub fn ad_summaries(&self, min_probability: Option<f64>) -> Result<Vec<AdSummary>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, MIN(date), MAX(price), MAX(prob), COUNT(*) \
             FROM chairs \
             GROUP BY id \
             HAVING MAX(prob) >= ?1 \
             ORDER BY MIN(date), id",
        )?;
        let summaries = stmt
            .query_map(params![min_probability.unwrap_or(0.0)], |row| {
                Ok(AdSummary {
                    id: row.get(0)?,
                    observed_at: row.get(1)?,
                    price: row.get(2)?,
                    max_probability: row.get(3)?,
                    image_count: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(summaries)
    }
}
