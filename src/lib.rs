//! ALBUM REVIEW SCRAPER
//! Scrolls through infinitely loading review pages in a real browser, extracts every
//! review container it reaches and upserts the reviews into a document store keyed by url.

pub mod browser;
pub mod config;
mod error;
mod macros;
pub mod model;
pub mod paginate;
pub mod parse;
pub mod persist;
pub mod process;
pub mod store;
mod wait;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
