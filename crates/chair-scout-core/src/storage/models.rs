/// One stored row: a single gallery image of one ad.
///
/// Every row of the same ad shares `id`, `observed_at` and `price`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdRecord {
    pub id: i64,
    pub observed_at: String,
    pub probability: f64,
    pub price: f64,
    pub image_ref: String,
}

/// Per-ad rollup of stored rows, for offline review.
#[derive(Debug, Clone, PartialEq)]
pub struct AdSummary {
    pub id: i64,
    pub observed_at: String,
    pub price: f64,
    pub max_probability: f64,
    pub image_count: i64,
}
