use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::model::{ReviewDocument, ReviewRecord};
use crate::store::{BulkWriteResult, DocumentStore, WriteOp};
use crate::Result;

/// Upserts a batch of reviews keyed by url in a single bulk write.
///
/// Duplicate urls in `reviews` collapse to the last occurrence. Urls not yet in the store
/// are inserted, the rest replace the stored document; mixed batches do both in the same
/// write. A failed write is returned untouched.
pub fn write_reviews<S>(store: &S, reviews: &[ReviewRecord]) -> Result<BulkWriteResult>
where
    S: DocumentStore + ?Sized,
{
    let unique = dedup_by_url(reviews);
    if unique.is_empty() {
        warn!("No changes required in store");
        return Ok(BulkWriteResult::default());
    }

    let urls: Vec<&str> = unique.iter().map(|r| r.url.as_str()).collect();
    let existing: HashSet<String> = store.find(&urls)?.into_iter().map(|d| d.url).collect();

    let ops = unique
        .into_iter()
        .map(|review| {
            let document = ReviewDocument::from(review);
            if existing.contains(&review.url) {
                WriteOp::UpdateOne {
                    url: review.url.clone(),
                    document,
                }
            } else {
                WriteOp::InsertOne(document)
            }
        })
        .collect();

    let res = store.bulk_write(ops)?;
    debug!(
        "Inserted {} and updated {} reviews in store",
        res.inserted, res.updated
    );
    Ok(res)
}

/// Keeps first-seen order, last-seen value.
fn dedup_by_url(reviews: &[ReviewRecord]) -> Vec<&ReviewRecord> {
    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(reviews.len());
    let mut unique: Vec<&ReviewRecord> = Vec::with_capacity(reviews.len());
    for review in reviews {
        match slots.get(review.url.as_str()) {
            Some(&i) => unique[i] = review,
            None => {
                slots.insert(review.url.as_str(), unique.len());
                unique.push(review);
            }
        }
    }
    unique
}
