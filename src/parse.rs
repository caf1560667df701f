//! Field extraction from a rendered review container.
//!
//! The browser hands over an HTML snapshot of one `.review-detail` container; every field
//! is looked up independently and anything missing becomes [`SENTINEL`] (or an empty list).
//! Links and image sources are resolved against the page url, the way the browser reports them.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::{Artist, RelatedReview, ReviewRecord, Reviewer, SENTINEL};
use crate::{Error, Result};

/// Compiled selectors for every field of a review container.
/// Built once per worker and reused for every container it reaches.
pub struct ReviewSelectors {
    article: Selector,
    artist_links: Selector,
    album_title: Selector,
    album_art: Selector,
    labels: Selector,
    year: Selector,
    score: Selector,
    best_new: Selector,
    authors: Selector,
    author_name: Selector,
    author_title: Selector,
    genres: Selector,
    pub_date: Selector,
    abstract_html: Selector,
    body_html: Selector,
    related: Selector,
    related_art: Selector,
    related_title: Selector,
    related_authors: Selector,
    related_abstract: Selector,
}

impl ReviewSelectors {
    pub fn new() -> Result<Self> {
        Ok(ReviewSelectors {
            article: create_selector("article")?,
            artist_links: create_selector(".single-album-tombstone__artist-links a")?,
            album_title: create_selector(".single-album-tombstone__review-title")?,
            album_art: create_selector(".single-album-tombstone__art img")?,
            labels: create_selector(".single-album-tombstone__meta-labels li")?,
            year: create_selector(".single-album-tombstone__meta-year")?,
            score: create_selector(".score")?,
            best_new: create_selector(".bnm-txt")?,
            authors: create_selector(".authors-detail li")?,
            author_name: create_selector(".authors-detail__display-name")?,
            author_title: create_selector(".authors-detail__title")?,
            genres: create_selector(".genre-list li a")?,
            pub_date: create_selector(".pub-date")?,
            abstract_html: create_selector(".review-detail__abstract")?,
            body_html: create_selector(".review-detail__text .contents")?,
            related: create_selector(".related-albums__list a")?,
            related_art: create_selector(".review-related__albums__list-item-artwork img")?,
            related_title: create_selector(".review-related__albums__list-item-title")?,
            related_authors: create_selector(".authors li span")?,
            related_abstract: create_selector(".review-related__albums__list-item-abstract")?,
        })
    }
}

/// Builds a [`ReviewRecord`] for the container snapshot `html` reached at page `url`.
/// Never fails: a missing field only degrades that field.
pub fn parse_review(url: &str, html: &str, sel: &ReviewSelectors) -> ReviewRecord {
    let doc = Html::parse_fragment(html);
    let root = doc.root_element();
    let base = Url::parse(url).ok();
    let base = base.as_ref();

    ReviewRecord {
        url: url.to_string(),
        article_id: or_sentinel(root, &sel.article, attr("id")),
        artists: root
            .select(&sel.artist_links)
            .map(|link| Artist {
                name: text(link).unwrap_or_else(sentinel),
                url: link_attr(base, "href")(link).unwrap_or_else(sentinel),
            })
            .collect(),
        album_name: or_sentinel(root, &sel.album_title, text),
        album_artwork_url: or_sentinel(root, &sel.album_art, link_attr(base, "src")),
        labels: texts(root, &sel.labels),
        year: or_sentinel(root, &sel.year, text),
        rating: or_sentinel(root, &sel.score, text),
        best_new: or_sentinel(root, &sel.best_new, text),
        reviewers: root
            .select(&sel.authors)
            .map(|author| Reviewer {
                name: or_sentinel(author, &sel.author_name, text),
                kind: or_sentinel(author, &sel.author_title, text),
                url: or_sentinel(author, &sel.author_name, link_attr(base, "href")),
            })
            .collect(),
        genres: texts(root, &sel.genres),
        date_time: or_sentinel(root, &sel.pub_date, attr("datetime")),
        review_abstract: or_sentinel(root, &sel.abstract_html, inner_html),
        review_body: or_sentinel(root, &sel.body_html, inner_html),
        related_reviews: root
            .select(&sel.related)
            .map(|related| RelatedReview {
                url: link_attr(base, "href")(related).unwrap_or_else(sentinel),
                album_artwork_url: or_sentinel(related, &sel.related_art, link_attr(base, "src")),
                album_name: or_sentinel(related, &sel.related_title, text),
                reviewers: texts(related, &sel.related_authors),
                date_time: or_sentinel(related, &sel.pub_date, attr("datetime")),
                abstract_html: or_sentinel(related, &sel.related_abstract, inner_html),
            })
            .collect(),
    }
}

/// Reads the first match of `selector` below `scope`, or [`SENTINEL`] when either the
/// element or the value read from it is missing.
fn or_sentinel<'a, F>(scope: ElementRef<'a>, selector: &Selector, read: F) -> String
where
    F: FnOnce(ElementRef<'a>) -> Option<String>,
{
    scope
        .select(selector)
        .next()
        .and_then(read)
        .unwrap_or_else(sentinel)
}

fn texts(scope: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    scope.select(selector).filter_map(text).collect()
}

fn sentinel() -> String {
    SENTINEL.to_string()
}

/// Rendered text: text nodes joined with whitespace collapsed.
fn text(el: ElementRef<'_>) -> Option<String> {
    Some(el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
}

fn inner_html(el: ElementRef<'_>) -> Option<String> {
    Some(el.inner_html())
}

fn attr(name: &'static str) -> impl Fn(ElementRef<'_>) -> Option<String> {
    move |el| el.value().attr(name).map(str::to_string)
}

/// Like [`attr`], joined onto `base`. Values that don't resolve are kept as written.
fn link_attr<'b>(
    base: Option<&'b Url>,
    name: &'static str,
) -> impl Fn(ElementRef<'_>) -> Option<String> + 'b {
    move |el| {
        let raw = el.value().attr(name)?;
        Some(match base.and_then(|base| base.join(raw).ok()) {
            Some(resolved) => resolved.to_string(),
            None => raw.to_string(),
        })
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
