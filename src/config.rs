use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::pipeline::{RunSettings, ScheduleSettings};
use crate::scrape::FetchSettings;

const APP_DIR: &str = "lianbo-archiver";

/// One week.
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub spider: SpiderConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `{date}` expands to `YYYYMMDD`.
    pub listing_urls: Vec<String>,
    pub user_agent: String,
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiderConfig {
    /// Seconds.
    pub request_timeout: f64,
    pub max_retries: u32,
    /// Seconds between retries and between item requests.
    pub request_delay: f64,
    pub detail_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub inter_date_delay: f64,
    pub default_start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_minutes: u64,
    pub trailing_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file written alongside stderr. An empty path logs to stderr only.
    pub file: Option<PathBuf>,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_db_path() -> String {
    data_dir().join("news.db").to_string_lossy().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source: SourceConfig::default(),
            spider: SpiderConfig::default(),
            batch: BatchConfig::default(),
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_urls: vec![
                "https://tv.cctv.com/lm/xwlb/day/{date}.shtml".to_string(),
                "https://tv.cctv.com/lm/xwlb/{date}.shtml".to_string(),
                "https://tv.cctv.com/lm/xwlb/{date}-1.shtml".to_string(),
                "https://tv.cctv.com/lm/xwlb/index.shtml?date={date}".to_string(),
            ],
            user_agent: format!("lianbo-archiver/{}", env!("CARGO_PKG_VERSION")),
            utc_offset_hours: 8,
        }
    }
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            request_timeout: 20.0,
            max_retries: 3,
            request_delay: 0.5,
            detail_workers: 4,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            inter_date_delay: 2.0,
            default_start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 120,
            trailing_days: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(data_dir().join("lianbo.log")),
        }
    }
}

impl Config {
    /// Loads `path`, or the default config file, writing the defaults there on first use.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::read(&default_path)?
                } else {
                    let config = Config::default();
                    config.save(&default_path)?;
                    config
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AppError::Config(msg));

        if self.source.listing_urls.is_empty() {
            return invalid("source.listing_urls must not be empty".into());
        }
        if let Some(url) = self.source.listing_urls.iter().find(|u| !u.contains("{date}")) {
            return invalid(format!("listing URL {url:?} has no {{date}} placeholder"));
        }
        if !(-23..=23).contains(&self.source.utc_offset_hours) {
            return invalid(format!(
                "source.utc_offset_hours {} is out of range",
                self.source.utc_offset_hours
            ));
        }
        if !(self.spider.request_timeout.is_finite() && self.spider.request_timeout > 0.0) {
            return invalid("spider.request_timeout must be a positive number of seconds".into());
        }
        for (name, value) in [
            ("spider.request_delay", self.spider.request_delay),
            ("batch.inter_date_delay", self.batch.inter_date_delay),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must be a non-negative number of seconds"));
            }
        }
        if self.spider.detail_workers == 0 {
            return invalid("spider.detail_workers must be at least 1".into());
        }
        if !(1..=MAX_INTERVAL_MINUTES).contains(&self.schedule.interval_minutes) {
            return invalid(format!(
                "schedule.interval_minutes must be between 1 and {MAX_INTERVAL_MINUTES}"
            ));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.source.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: seconds(self.spider.request_timeout),
            max_retries: self.spider.max_retries,
            retry_delay: seconds(self.spider.request_delay),
            user_agent: self.source.user_agent.clone(),
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            listing_urls: self.source.listing_urls.clone(),
            detail_workers: self.spider.detail_workers,
            request_delay: seconds(self.spider.request_delay),
        }
    }

    pub fn inter_date_delay(&self) -> Duration {
        seconds(self.batch.inter_date_delay)
    }

    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            interval: Duration::from_secs(self.schedule.interval_minutes.saturating_mul(60)),
            trailing_days: self.schedule.trailing_days,
            inter_date_delay: self.inter_date_delay(),
            utc_offset: self.utc_offset(),
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}
