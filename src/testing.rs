//! Fakes shared by the unit tests: a scripted infinite-scroll page and an in-memory store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{Browser, BrowserLauncher, RenderedElement};
use crate::model::{ReviewDocument, SENTINEL};
use crate::store::{BulkWriteResult, DocumentStore, StoreConnector, WriteOp};
use crate::{Error, Result};

pub fn document(url: &str, rating: &str) -> ReviewDocument {
    ReviewDocument {
        url: url.into(),
        article_id: SENTINEL.into(),
        artists: Vec::new(),
        album_name: SENTINEL.into(),
        album_artwork_url: SENTINEL.into(),
        labels: Vec::new(),
        year: SENTINEL.into(),
        rating: rating.into(),
        best_new: SENTINEL.into(),
        reviewers: Vec::new(),
        genres: Vec::new(),
        date_time: SENTINEL.into(),
        review_abstract: SENTINEL.into(),
        review_body: SENTINEL.into(),
        related_reviews: Vec::new(),
    }
}

/// How a fake infinite-scroll page behaves.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    /// Containers that ever render; each scroll reveals one more up to this.
    pub total: usize,
    /// After this many scrolls, `total` is raised to the second value.
    pub unlock: Option<(usize, usize)>,
    /// Location follows the last container looked up (`start#n`).
    pub follow_location: bool,
    pub fail_find: HashSet<usize>,
    pub fail_scroll: bool,
    pub fail_navigate: bool,
}

impl FakePage {
    pub fn growing(total: usize) -> Self {
        FakePage {
            total,
            ..Default::default()
        }
    }

    pub fn following_location(mut self) -> Self {
        self.follow_location = true;
        self
    }

    pub fn unlock_after_scrolls(mut self, scrolls: usize, total: usize) -> Self {
        self.unlock = Some((scrolls, total));
        self
    }

    pub fn failing_find_at(mut self, position: usize) -> Self {
        self.fail_find.insert(position);
        self
    }

    pub fn failing_scrolls(mut self) -> Self {
        self.fail_scroll = true;
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigate = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub page: FakePage,
    pub start_url: String,
    pub location: String,
    pub rendered: usize,
    pub scrolls: usize,
    pub closed: bool,
}

/// Browser session over a [`FakePage`], picked by the url of the first navigation.
pub struct FakeBrowser {
    default_page: FakePage,
    pages: HashMap<String, FakePage>,
    state: Arc<Mutex<FakeState>>,
    active: Option<Arc<AtomicUsize>>,
}

impl FakeBrowser {
    pub fn new(page: FakePage) -> (Self, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let browser = FakeBrowser {
            default_page: page,
            pages: HashMap::new(),
            state: state.clone(),
            active: None,
        };
        (browser, state)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_page.clone());
        if page.fail_navigate {
            return Err(Error::Navigation(format!("{url}: net::ERR_NAME_NOT_RESOLVED")));
        }
        let mut state = self.state();
        state.rendered = page.total.min(1);
        state.page = page;
        state.start_url = url.to_string();
        state.location = url.to_string();
        Ok(())
    }

    async fn current_location(&self) -> Result<String> {
        Ok(self.state().location.clone())
    }

    async fn execute_script(&self, script: &str) -> Result<()> {
        let mut state = self.state();
        if script.contains("scrollTo") {
            state.scrolls += 1;
            if state.page.fail_scroll {
                return Err(Error::BrowserClosed);
            }
            let total = match state.page.unlock {
                Some((after, unlocked)) if state.scrolls >= after => unlocked,
                _ => state.page.total,
            };
            state.rendered = (state.rendered + 1).min(total);
        }
        Ok(())
    }

    async fn count_elements(&self, _selector: &str) -> Result<usize> {
        Ok(self.state().rendered)
    }

    async fn find_element(&self, selector: &str) -> Result<RenderedElement> {
        let position: usize = selector
            .rsplit_once("nth-child(")
            .and_then(|(_, rest)| rest.trim_end_matches(')').parse().ok())
            .ok_or_else(|| Error::ElementNotFound(selector.to_string()))?;

        let mut state = self.state();
        if position > state.rendered || state.page.fail_find.contains(&position) {
            return Err(Error::ElementNotFound(selector.to_string()));
        }
        if state.page.follow_location {
            state.location = format!("{}#{position}", state.start_url);
        }
        Ok(RenderedElement {
            y: position as f64 * 1000.0,
            html: format!(
                r#"<div class="review-detail"><article id="article-{position}"><span class="score">{position}</span></article></div>"#
            ),
        })
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        if !state.closed {
            state.closed = true;
            if let Some(active) = &self.active {
                active.fetch_sub(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

/// Launches [`FakeBrowser`]s, tracking how many sessions are open at once.
pub struct FakeLauncher {
    default_page: FakePage,
    pages: HashMap<String, FakePage>,
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
    pub launched: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(default_page: FakePage) -> Self {
        FakeLauncher {
            default_page,
            pages: HashMap::new(),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            launched: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sessions navigating to `url` get `page` instead of the default.
    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Session = FakeBrowser;

    async fn launch(&self) -> Result<FakeBrowser> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        // Let the other workers of the wave start before this one runs.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (mut browser, _) = FakeBrowser::new(self.default_page.clone());
        browser.pages = self.pages.clone();
        browser.active = Some(self.active.clone());
        Ok(browser)
    }
}

/// In-memory [`DocumentStore`]. Clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<BTreeMap<String, ReviewDocument>>>,
    pub bulk_writes: Arc<Mutex<Vec<Vec<WriteOp>>>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn with_docs(docs: impl IntoIterator<Item = ReviewDocument>) -> Self {
        let store = MemoryStore::default();
        store
            .docs
            .lock()
            .unwrap()
            .extend(docs.into_iter().map(|d| (d.url.clone(), d)));
        store
    }

    /// Store whose every bulk write fails.
    pub fn failing() -> Self {
        MemoryStore {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn get(&self, url: &str) -> Option<ReviewDocument> {
        self.docs.lock().unwrap().get(url).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, ReviewDocument> {
        self.docs.lock().unwrap().clone()
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, urls: &[&str]) -> Result<Vec<ReviewDocument>> {
        let docs = self.docs.lock().unwrap();
        Ok(urls.iter().filter_map(|url| docs.get(*url).cloned()).collect())
    }

    fn bulk_write(&self, ops: Vec<WriteOp>) -> Result<BulkWriteResult> {
        if self.fail_writes {
            return Err(Error::Store(rusqlite::Error::QueryReturnedNoRows));
        }
        self.bulk_writes.lock().unwrap().push(ops.clone());

        let mut docs = self.docs.lock().unwrap();
        let mut staged = docs.clone();
        let mut result = BulkWriteResult::default();
        for op in ops {
            match op {
                WriteOp::InsertOne(doc) => {
                    staged.insert(doc.url.clone(), doc);
                    result.inserted += 1;
                }
                WriteOp::UpdateOne { url, document } => {
                    if let Some(slot) = staged.get_mut(&url) {
                        *slot = document;
                        result.updated += 1;
                    }
                }
            }
        }
        *docs = staged;
        Ok(result)
    }
}

impl StoreConnector for MemoryStore {
    type Store = MemoryStore;

    fn connect(&self) -> Result<MemoryStore> {
        Ok(self.clone())
    }
}
