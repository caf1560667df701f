//! Document store for scraped reviews. Every review is one JSON document keyed by its url.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use rusqlite::{params, params_from_iter, Connection};

use crate::model::ReviewDocument;
use crate::{Error, Result};

/// One operation of a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Inserts a document the caller believed new. Another worker may have stored the
    /// same url since, in which case the document replaces it.
    InsertOne(ReviewDocument),
    /// Replaces the whole document stored under `url`.
    UpdateOne { url: String, document: ReviewDocument },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub inserted: usize,
    pub updated: usize,
}

pub trait DocumentStore: Send + Sync {
    /// Returns the stored documents whose url is one of `urls`.
    fn find(&self, urls: &[&str]) -> Result<Vec<ReviewDocument>>;

    /// Applies every op or none of them.
    fn bulk_write(&self, ops: Vec<WriteOp>) -> Result<BulkWriteResult>;
}

/// Hands every worker its own store connection.
pub trait StoreConnector: Send + Sync + 'static {
    type Store: DocumentStore + 'static;

    fn connect(&self) -> Result<Self::Store>;
}

const TABLE_ALBUM_REVIEWS: &str = "album_reviews";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS album_reviews (url TEXT NOT NULL PRIMARY KEY, document TEXT NOT NULL, scraped_at TEXT NOT NULL);",
];

pub struct SqliteReviewStore {
    conn: Mutex<Connection>,
}

impl SqliteReviewStore {
    pub fn open<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        // Several workers write to the same file.
        conn.busy_timeout(std::time::Duration::from_secs(30))?;
        for statement in SCHEMA {
            conn.execute(statement, [])?;
        }
        Ok(SqliteReviewStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::StorePoisoned)?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {TABLE_ALBUM_REVIEWS}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl DocumentStore for SqliteReviewStore {
    fn find(&self, urls: &[&str]) -> Result<Vec<ReviewDocument>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().map_err(|_| Error::StorePoisoned)?;
        let placeholders = vec!["?"; urls.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT document FROM {TABLE_ALBUM_REVIEWS} WHERE url IN ({placeholders})"
        ))?;
        let raw: Vec<String> = stmt
            .query_map(params_from_iter(urls.iter()), |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        raw.iter()
            .map(|doc| serde_json::from_str(doc).map_err(Error::from))
            .collect()
    }

    fn bulk_write(&self, ops: Vec<WriteOp>) -> Result<BulkWriteResult> {
        let mut conn = self.conn.lock().map_err(|_| Error::StorePoisoned)?;
        let scraped_at = Local::now().to_rfc3339();
        let tx = conn.transaction()?;
        let mut result = BulkWriteResult::default();

        for op in ops {
            match op {
                WriteOp::InsertOne(document) => {
                    tx.execute(
                        &format!(
                            "INSERT INTO {TABLE_ALBUM_REVIEWS} (url, document, scraped_at) VALUES (?1, ?2, ?3)
                             ON CONFLICT(url) DO UPDATE SET document = excluded.document, scraped_at = excluded.scraped_at"
                        ),
                        params![document.url, serde_json::to_string(&document)?, scraped_at],
                    )?;
                    result.inserted += 1;
                }
                WriteOp::UpdateOne { url, document } => {
                    result.updated += tx.execute(
                        &format!(
                            "UPDATE {TABLE_ALBUM_REVIEWS} SET document = ?2, scraped_at = ?3 WHERE url = ?1"
                        ),
                        params![url, serde_json::to_string(&document)?, scraped_at],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(result)
    }
}

pub struct SqliteConnector {
    db_path: PathBuf,
}

impl SqliteConnector {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        SqliteConnector {
            db_path: db_path.into(),
        }
    }
}

impl StoreConnector for SqliteConnector {
    type Store = SqliteReviewStore;

    fn connect(&self) -> Result<SqliteReviewStore> {
        SqliteReviewStore::open(&self.db_path)
    }
}
