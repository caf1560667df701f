//! Scroll-driven pagination over an infinitely scrolling review page.
//!
//! A session scrolls, waits for the next `.review-detail` container to render and hands
//! it out, one container per call to [`PaginationDriver::next_container`]. When the page
//! stops growing it keeps scrolling inside growing stall windows before giving up. A
//! session that gives up early reports where it got to so the caller can resume from
//! there.

use tracing::{debug, error, info, warn};

use crate::browser::{Browser, RenderedElement};
use crate::config::PaginationConfig;
use crate::model::ScrapeTask;
use crate::wait::poll_until;
use crate::{Error, Result};

pub const CONTAINER_SELECTOR: &str = ".review-detail";

/// Outcome of one finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub reached_count: usize,
    pub target_count: usize,
    pub start_url: String,
    pub final_location: String,
}

impl SessionReport {
    pub fn is_complete(&self) -> bool {
        self.reached_count >= self.target_count
    }

    /// The task that picks up where this session stopped. None when the target was met,
    /// or when the page never moved off `start_url` (retrying it would stall again).
    pub fn continuation(&self, flush_interval: usize) -> Option<ScrapeTask> {
        if self.is_complete() || self.final_location == self.start_url {
            return None;
        }
        // The container at the final location is the first one of the continuation.
        let remaining = self
            .target_count
            .saturating_sub(self.reached_count)
            .saturating_sub(1);
        if remaining == 0 {
            return None;
        }
        Some(ScrapeTask::new(
            self.final_location.clone(),
            remaining,
            flush_interval,
        ))
    }
}

pub struct PaginationDriver<B: Browser> {
    browser: B,
    config: PaginationConfig,
    start_url: String,
    target_count: usize,
    reached_count: usize,
    scroll_anchor: f64,
    location: String,
    consecutive_faults: u32,
    done: bool,
}

impl<B: Browser> PaginationDriver<B> {
    /// Navigates `browser` to `start_url`. A failed navigation is logged and leaves a
    /// session that yields nothing.
    pub async fn open(
        browser: B,
        config: PaginationConfig,
        start_url: &str,
        target_count: usize,
    ) -> Self {
        let mut driver = PaginationDriver {
            browser,
            config,
            start_url: start_url.to_string(),
            target_count,
            reached_count: 0,
            scroll_anchor: 0.0,
            location: start_url.to_string(),
            consecutive_faults: 0,
            done: target_count == 0,
        };
        if !driver.done {
            if let Err(e) = driver.browser.navigate(start_url).await {
                error!("Couldn't open '{start_url}': {e}");
                driver.done = true;
            }
        }
        driver
    }

    /// Next rendered container together with the browser location it was reached at.
    /// None once the target is met or the page stopped growing.
    pub async fn next_container(&mut self) -> Option<(String, RenderedElement)> {
        while !self.done {
            if self.reached_count >= self.target_count {
                self.done = true;
                break;
            }
            match self.step().await {
                Ok(Some(item)) => {
                    self.consecutive_faults = 0;
                    debug!("Automated review at {}", item.0);
                    return Some(item);
                }
                Ok(None) => self.done = true,
                Err(e) => {
                    self.consecutive_faults += 1;
                    error!(
                        "A problem occurred while automating review {} at '{}': {e}",
                        self.reached_count, self.location
                    );
                    if self.consecutive_faults >= self.config.max_consecutive_faults {
                        warn!(
                            "Giving up on '{}' after {} faults in a row",
                            self.start_url, self.consecutive_faults
                        );
                        self.done = true;
                    }
                }
            }
        }
        None
    }

    /// Closes the browser and reports how far the session got.
    pub async fn finish(mut self) -> SessionReport {
        if let Err(e) = self.browser.close().await {
            warn!("Couldn't close browser for '{}': {e}", self.start_url);
        }
        info!(
            "Automated {} reviews of {}. Started at url '{}'. Finished at url '{}'",
            self.reached_count, self.target_count, self.start_url, self.location
        );
        SessionReport {
            reached_count: self.reached_count,
            target_count: self.target_count,
            start_url: self.start_url,
            final_location: self.location,
        }
    }

    /// One scroll → wait → yield round. `Ok(None)` means the page is exhausted.
    async fn step(&mut self) -> Result<Option<(String, RenderedElement)>> {
        self.browser.execute_script(&self.scroll_script()).await?;

        if !self.wait_for_render().await? && !self.recover_stall().await? {
            return Ok(None);
        }

        // The position is claimed before the lookup so a broken container is skipped
        // instead of retried forever.
        self.reached_count += 1;
        let selector = format!("{CONTAINER_SELECTOR}:nth-child({})", self.reached_count);
        let element = self.browser.find_element(&selector).await?;
        self.location = self.browser.current_location().await?;
        self.scroll_anchor = element.y;

        Ok(Some((self.location.clone(), element)))
    }

    async fn wait_for_render(&self) -> Result<bool> {
        let browser = &self.browser;
        let reached = self.reached_count;
        poll_until(
            self.config.render_timeout(),
            self.config.poll_interval(),
            move || async move {
                Ok::<_, Error>(browser.count_elements(CONTAINER_SELECTOR).await? > reached)
            },
        )
        .await
    }

    /// Keeps scrolling for `stall_window(n)` on attempt `n`. False once every attempt ran
    /// out without a new container.
    async fn recover_stall(&self) -> Result<bool> {
        let browser = &self.browser;
        let reached = self.reached_count;
        let script = self.scroll_script();
        let script = script.as_str();

        for attempt in 1..=self.config.max_stall_attempts {
            let window = self.config.stall_window(attempt);
            warn!(
                "Page not loaded after {attempt} attempts. Timeout at url '{}' for {:?}",
                self.location, window
            );
            let grown = poll_until(window, self.config.scroll_interval(), move || async move {
                browser.execute_script(script).await?;
                Ok::<_, Error>(browser.count_elements(CONTAINER_SELECTOR).await? > reached)
            })
            .await?;
            if grown {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn scroll_script(&self) -> String {
        format!(
            "window.scrollTo(0, {}); window.scrollTo(0, document.body.scrollHeight + 50);",
            self.scroll_anchor
        )
    }
}
