//! Configuration for the scraper: pool size, store location, browser and pagination
//! tuning, and the seed task list.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::ScrapeTask;
use crate::Result;

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Chrome/Chromium binary; looked up on PATH when unset
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: default_headless(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

/// Timing of the scroll-pagination loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// How long to wait for the next container after a scroll
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,
    /// How often the container count is re-checked while waiting
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Stall attempt `n` waits `n` times this long
    #[serde(default = "default_stall_backoff_ms")]
    pub stall_backoff_ms: u64,
    /// Delay between scrolls inside a stall window
    #[serde(default = "default_scroll_interval_ms")]
    pub scroll_interval_ms: u64,
    #[serde(default = "default_max_stall_attempts")]
    pub max_stall_attempts: u32,
    /// Iteration faults in a row that end a session
    #[serde(default = "default_max_consecutive_faults")]
    pub max_consecutive_faults: u32,
}

fn default_render_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_stall_backoff_ms() -> u64 {
    10_000
}

fn default_scroll_interval_ms() -> u64 {
    1_000
}

fn default_max_stall_attempts() -> u32 {
    3
}

fn default_max_consecutive_faults() -> u32 {
    5
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            render_timeout_ms: default_render_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            stall_backoff_ms: default_stall_backoff_ms(),
            scroll_interval_ms: default_scroll_interval_ms(),
            max_stall_attempts: default_max_stall_attempts(),
            max_consecutive_faults: default_max_consecutive_faults(),
        }
    }
}

impl PaginationConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scroll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_interval_ms)
    }

    /// Window of the `attempt`-th stall retry, counting from 1.
    pub fn stall_window(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.stall_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Directory for the per-run debug log file
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub tasks: Vec<ScrapeTask>,
}

fn default_pool_size() -> usize {
    8
}

fn default_database_path() -> String {
    "data/raw_pitchfork.sqlite".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            database_path: default_database_path(),
            log_dir: default_log_dir(),
            browser: BrowserSettings::default(),
            pagination: PaginationConfig::default(),
            tasks: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `scrap.toml` and `SCRAP_*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from("scrap")
    }

    pub fn load_from(file_stem: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(file_stem).required(false))
            // SCRAP_POOL_SIZE, SCRAP_PAGINATION__RENDER_TIMEOUT_MS, ...
            .add_source(
                config::Environment::with_prefix("SCRAP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: AppConfig = config.try_deserialize()?;
        app.pool_size = app.pool_size.max(1);
        for task in &mut app.tasks {
            task.flush_interval = task.flush_interval.max(1);
        }
        Ok(app)
    }
}
