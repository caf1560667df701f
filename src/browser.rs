//! Browser automation. The scraper only talks to the [`Browser`] trait; the
//! chromiumoxide-backed session is what runs in production.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as ChromeBrowser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::BrowserSettings;
use crate::{Error, Result};

/// Snapshot of a rendered element: its document-relative offset and its outer HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedElement {
    pub y: f64,
    pub html: String,
}

#[derive(Deserialize)]
struct ElementSnapshot {
    y: f64,
    html: Option<String>,
}

/// One live browser session (a single tab).
#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Location currently shown in the address bar. Infinite-scroll pages rewrite it as
    /// new reviews come into view.
    async fn current_location(&self) -> Result<String>;

    async fn execute_script(&self, script: &str) -> Result<()>;

    async fn count_elements(&self, selector: &str) -> Result<usize>;

    /// First element matching `selector`, or [`Error::ElementNotFound`].
    async fn find_element(&self, selector: &str) -> Result<RenderedElement>;

    /// Closes the session. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Opens a fresh [`Browser`] session for each scrape task.
#[async_trait]
pub trait BrowserLauncher: Send + Sync + 'static {
    type Session: Browser + 'static;

    async fn launch(&self) -> Result<Self::Session>;
}

pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        ChromiumLauncher { settings }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--mute-audio")
            .window_size(self.settings.window_width, self.settings.window_height);
        if let Some(path) = &self.settings.executable {
            builder = builder.chrome_executable(path);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(Error::BrowserConfig)?;

        let (browser, mut handler) = ChromeBrowser::launch(config).await?;

        // The handler has to be polled for the whole session or every CDP call stalls.
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let mut session = ChromiumSession {
                    browser,
                    page: None,
                    handle,
                    closed: false,
                };
                let _ = session.close().await;
                return Err(e.into());
            }
        };

        Ok(ChromiumSession {
            browser,
            page: Some(page),
            handle,
            closed: false,
        })
    }
}

pub struct ChromiumSession {
    browser: ChromeBrowser,
    page: Option<Page>,
    handle: JoinHandle<()>,
    closed: bool,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or(Error::BrowserClosed)
    }
}

#[async_trait]
impl Browser for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| Error::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn current_location(&self) -> Result<String> {
        self.page()?
            .url()
            .await?
            .ok_or_else(|| Error::Navigation("page reported no url".into()))
    }

    async fn execute_script(&self, script: &str) -> Result<()> {
        self.page()?.evaluate(script).await?;
        Ok(())
    }

    async fn count_elements(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            serde_json::to_string(selector)?
        );
        let count = self.page()?.evaluate(script).await?.into_value::<usize>()?;
        Ok(count)
    }

    async fn find_element(&self, selector: &str) -> Result<RenderedElement> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return {{ y: 0, html: null }};
                return {{ y: el.getBoundingClientRect().top + window.scrollY, html: el.outerHTML }};
            }})()"#,
            serde_json::to_string(selector)?
        );
        let snapshot = self
            .page()?
            .evaluate(script)
            .await?
            .into_value::<ElementSnapshot>()?;
        match snapshot.html {
            Some(html) => Ok(RenderedElement { y: snapshot.y, html }),
            None => Err(Error::ElementNotFound(selector.to_string())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("failed to close page: {e}");
            }
        }
        let res = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handle.abort();
        res?;
        Ok(())
    }
}
