use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, LookupFailure};

/// One ad as delivered by the scraper: id, listed price and the gallery
/// images that downloaded successfully, in gallery order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedAd {
    pub id: i64,
    pub price: Option<f64>,
    pub images: Vec<Vec<u8>>,
}

/// Yields scraped ads one at a time, in page order.
pub trait AdSource {
    /// Called before each scrape cycle. Sources that navigate a live page
    /// reload it here.
    fn start_cycle(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn next_ad(&mut self) -> Option<Result<ScrapedAd, LookupFailure>>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdField {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceField {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(default)]
    id: Option<IdField>,
    #[serde(default)]
    price: Option<PriceField>,
    #[serde(default)]
    images: Vec<String>,
}

/// Parse listing price text such as `"$1,250.00"`.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().and_then(valid_price)
}

fn valid_price(price: f64) -> Option<f64> {
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Reads ads from a JSON-lines file written by the browser automation.
///
/// Each line looks like `{"id": 1547561429, "price": "$450.00", "images": ["a.jpg"]}`.
/// Relative image paths are resolved against the feed's directory.
pub struct FeedSource {
    path: PathBuf,
    lines: Vec<String>,
    cursor: usize,
}

impl FeedSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lines: Vec::new(),
            cursor: 0,
        }
    }

    fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    fn parse_line(&self, line: &str) -> Result<ScrapedAd, LookupFailure> {
        let entry: FeedEntry =
            serde_json::from_str(line).map_err(|e| LookupFailure::Id(e.to_string()))?;

        let id = match entry.id {
            Some(IdField::Number(id)) => id,
            Some(IdField::Text(text)) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| LookupFailure::Id(text))?,
            None => return Err(LookupFailure::Id("no id field".to_string())),
        };

        // An absent or null price is left to the evaluator; a price that is
        // present but not a usable amount rejects the ad.
        let price = match entry.price {
            Some(PriceField::Number(price)) => match valid_price(price) {
                Some(price) => Some(price),
                None => return Err(LookupFailure::Price(id, price.to_string())),
            },
            Some(PriceField::Text(text)) => match parse_price(&text) {
                Some(price) => Some(price),
                None => return Err(LookupFailure::Price(id, text)),
            },
            None => None,
        };

        let base = self.base_dir();
        let images = entry
            .images
            .iter()
            .filter_map(|image| {
                let path = base.join(image);
                match fs::read(&path) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!("Ad {}: could not read image {}: {}", id, path.display(), e);
                        None
                    }
                }
            })
            .collect();

        Ok(ScrapedAd { id, price, images })
    }
}

impl AdSource for FeedSource {
    fn start_cycle(&mut self) -> Result<(), Error> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            Error::Feed(format!("cannot read feed {}: {}", self.path.display(), e))
        })?;
        self.lines = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        self.cursor = 0;
        debug!("Loaded {} feed entries from {}", self.lines.len(), self.path.display());
        Ok(())
    }

    fn next_ad(&mut self) -> Option<Result<ScrapedAd, LookupFailure>> {
        let line = self.lines.get(self.cursor)?;
        self.cursor += 1;
        Some(self.parse_line(line))
    }
}
