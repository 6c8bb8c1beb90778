use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::time::Duration;

use crate::error::Error;

/// Listing pages only render 46 ads before pagination.
pub const MAX_ADS_PER_PAGE: usize = 46;

const DEFAULT_TARGET_URL: &str =
    "https://www.kijiji.ca/b-chair-recliner/city-of-toronto/c245l1700273?ad=offering";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub target_url: String,
    pub download_folder: String,
    pub model_path: String,
    /// External scoring program; receives `model_path` as its first argument.
    #[serde(default)]
    pub classifier_command: Option<String>,
    pub feed_path: String,
    pub db_path: String,
    pub prob_threshold: f64,
    pub max_price: f64,
    pub max_ads: usize,
    pub repeat: u32,
    pub wait_secs: u64,
    pub alert_pause_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            download_folder: "scanner/data".to_string(),
            model_path: "detector/model.pt".to_string(),
            classifier_command: None,
            feed_path: "scraped_ads.jsonl".to_string(),
            db_path: "chairs.db".to_string(),
            prob_threshold: 0.7,
            max_price: 500.0,
            max_ads: 10,
            repeat: 5,
            wait_secs: 300,
            alert_pause_secs: 2,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.prob_threshold > 0.0 && self.prob_threshold < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "prob_threshold must be in (0, 1), got {}",
                self.prob_threshold
            )));
        }
        if !(self.max_price > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_price must be positive, got {}",
                self.max_price
            )));
        }
        if self.max_ads == 0 || self.max_ads > MAX_ADS_PER_PAGE {
            return Err(Error::InvalidConfig(format!(
                "max_ads must be between 1 and {}, got {}",
                MAX_ADS_PER_PAGE, self.max_ads
            )));
        }
        if self.repeat == 0 {
            return Err(Error::InvalidConfig("repeat must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn alert_pause(&self) -> Duration {
        Duration::from_secs(self.alert_pause_secs)
    }
}

/// Layer an optional `Config` file and `CHAIR_SCOUT_*` environment variables
/// over the built-in defaults.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let defaults = AppConfig::default();
    let builder = Config::builder()
        .set_default("target_url", defaults.target_url)?
        .set_default("download_folder", defaults.download_folder)?
        .set_default("model_path", defaults.model_path)?
        .set_default("feed_path", defaults.feed_path)?
        .set_default("db_path", defaults.db_path)?
        .set_default("prob_threshold", defaults.prob_threshold)?
        .set_default("max_price", defaults.max_price)?
        .set_default("max_ads", defaults.max_ads as i64)?
        .set_default("repeat", defaults.repeat as i64)?
        .set_default("wait_secs", defaults.wait_secs as i64)?
        .set_default("alert_pause_secs", defaults.alert_pause_secs as i64)?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("CHAIR_SCOUT").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
