use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::ScrapeTask;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),
    #[error("No rendered element matches the selector: {0}")]
    ElementNotFound(String),

    #[error("Browser Error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
    #[error("Browser couldn't be configured: {0}")]
    BrowserConfig(String),
    #[error("Browser session is closed")]
    BrowserClosed,
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Store Error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("Store lock was poisoned by a panicking worker")]
    StorePoisoned,
    #[error("Serde Error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config Error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't send a continuation task through a channel.")]
    RuntimeSendError,
    #[error("Runtime Error: {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
}

impl From<mpsc::error::SendError<ScrapeTask>> for Error {
    fn from(_value: mpsc::error::SendError<ScrapeTask>) -> Self {
        Error::RuntimeSendError
    }
}
