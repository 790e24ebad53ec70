//! # rustdblp
//!
//! Venue-scoped literature harvester for the DBLP publication index.
//!
//! ## Modules
//!
//! - [`crawler`] - Per-venue crawl loop over result pages
//! - [`parser`] - Result page and BibTeX detail page parsing
//! - [`fetcher`] - HTTP transport with bounded retry
//! - [`store`] - Incremental, durable CSV store
//! - [`enrich`] - Resumable BibTeX enrichment of a store
//! - [`scoring`] / [`venue`] - Relevance scoring and venue matching
//! - [`config`] - Run configuration and validation
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustdblp::config::HarvestConfig;
//! use rustdblp::crawler::Crawler;
//! use rustdblp::fetcher::HttpTransport;
//! use rustdblp::venue::VenueKind;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarvestConfig::for_kind(VenueKind::Conference)?;
//!     let report = Crawler::new(&config, HttpTransport::new()?).run().await?;
//!     println!("Stored {} records", report.total_accepted());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod enrich;
pub mod error;
pub mod fetcher;
pub mod parser;
pub mod retry;
pub mod scoring;
pub mod store;
pub mod venue;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{HarvestError, Result};
