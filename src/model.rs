//! Scraped review records, their persisted document shape and scrape tasks.

use serde::{Deserialize, Serialize};

/// Placeholder stored for any field that couldn't be located on the page.
pub const SENTINEL: &str = "NA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer {
    pub name: String,
    pub kind: String,
    pub url: String,
}

/// A review linked from the bottom of another review. Reviewers are kept as plain names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedReview {
    pub url: String,
    pub album_artwork_url: String,
    pub album_name: String,
    pub reviewers: Vec<String>,
    pub date_time: String,
    pub abstract_html: String,
}

/// One album review, identified by the page `url` it was reached at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    pub url: String,
    pub article_id: String,
    pub artists: Vec<Artist>,
    pub album_name: String,
    pub album_artwork_url: String,
    pub labels: Vec<String>,
    pub year: String,
    pub rating: String,
    pub best_new: String,
    pub reviewers: Vec<Reviewer>,
    pub genres: Vec<String>,
    pub date_time: String,
    pub review_abstract: String,
    pub review_body: String,
    pub related_reviews: Vec<RelatedReview>,
}

// Persisted shape. Scalar lists are wrapped in single-key objects.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistDoc {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDoc {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerDoc {
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreDoc {
    pub genre: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedReviewerDoc {
    pub reviewer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedReviewDoc {
    pub url: String,
    pub album_artwork_url: String,
    pub album_name: String,
    pub reviewers: Vec<RelatedReviewerDoc>,
    pub date_time: String,
    #[serde(rename = "abstract")]
    pub abstract_html: String,
}

/// Flat document written to the store, keyed by `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDocument {
    pub url: String,
    pub article_id: String,
    pub artists: Vec<ArtistDoc>,
    pub album_name: String,
    pub album_artwork_url: String,
    pub labels: Vec<LabelDoc>,
    pub year: String,
    pub rating: String,
    pub best_new: String,
    pub reviewers: Vec<ReviewerDoc>,
    pub genres: Vec<GenreDoc>,
    pub date_time: String,
    pub review_abstract: String,
    pub review_body: String,
    pub related_reviews: Vec<RelatedReviewDoc>,
}

impl From<&ReviewRecord> for ReviewDocument {
    fn from(review: &ReviewRecord) -> Self {
        ReviewDocument {
            url: review.url.clone(),
            article_id: review.article_id.clone(),
            artists: review
                .artists
                .iter()
                .map(|a| ArtistDoc {
                    url: a.url.clone(),
                    name: a.name.clone(),
                })
                .collect(),
            album_name: review.album_name.clone(),
            album_artwork_url: review.album_artwork_url.clone(),
            labels: review
                .labels
                .iter()
                .map(|label| LabelDoc {
                    label: label.clone(),
                })
                .collect(),
            year: review.year.clone(),
            rating: review.rating.clone(),
            best_new: review.best_new.clone(),
            reviewers: review
                .reviewers
                .iter()
                .map(|r| ReviewerDoc {
                    url: r.url.clone(),
                    name: r.name.clone(),
                    kind: r.kind.clone(),
                })
                .collect(),
            genres: review
                .genres
                .iter()
                .map(|genre| GenreDoc {
                    genre: genre.clone(),
                })
                .collect(),
            date_time: review.date_time.clone(),
            review_abstract: review.review_abstract.clone(),
            review_body: review.review_body.clone(),
            related_reviews: review
                .related_reviews
                .iter()
                .map(|related| RelatedReviewDoc {
                    url: related.url.clone(),
                    album_artwork_url: related.album_artwork_url.clone(),
                    album_name: related.album_name.clone(),
                    reviewers: related
                        .reviewers
                        .iter()
                        .map(|reviewer| RelatedReviewerDoc {
                            reviewer: reviewer.clone(),
                        })
                        .collect(),
                    date_time: related.date_time.clone(),
                    abstract_html: related.abstract_html.clone(),
                })
                .collect(),
        }
    }
}

/// A seed page plus how many reviews to reach from it and how often to flush them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTask {
    pub start_url: String,
    pub target_count: usize,
    pub flush_interval: usize,
}

impl ScrapeTask {
    pub fn new(start_url: impl Into<String>, target_count: usize, flush_interval: usize) -> Self {
        ScrapeTask {
            start_url: start_url.into(),
            target_count,
            flush_interval,
        }
    }
}
