//! Run configuration for the crawl and enrichment passes.
//!
//! Defaults mirror the conventions of the DBLP search interface: a 1000-hit
//! page, at most 50 pages per venue, a 3 second pause between pages.

use crate::error::{HarvestError, Result};
use crate::retry::RetryPolicy;
use crate::scoring::{KeywordTable, DEFAULT_CONFERENCE_KEYWORDS, DEFAULT_JOURNAL_KEYWORDS};
use crate::venue::{validate_identifier, MatchMode, VenueKind, VenueMatcher};
use chrono::{Datelike, Local};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// DBLP incremental search endpoint returning HTML fragments
pub const DEFAULT_ENDPOINT: &str = "https://dblp.org/search/publ/inc";

/// Hits per result page
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Safety valve on pages per venue
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Settings for one crawl run
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub kind: VenueKind,
    /// Records from years before this are never scored or stored
    pub start_year: i32,
    /// Minimum relevance score for a record to be stored
    pub threshold: f64,
    pub output: PathBuf,
    pub match_mode: MatchMode,
    /// Venues to crawl, in order
    pub venues: Vec<String>,
    pub keywords: KeywordTable,
    pub endpoint: Url,
    pub page_size: u32,
    pub max_pages: u32,
    pub retry: RetryPolicy,
    /// Per-request timeout
    pub timeout: Duration,
    /// Pause between consecutive result pages
    pub page_delay: Duration,
}

impl HarvestConfig {
    /// Defaults for the given venue kind
    pub fn for_kind(kind: VenueKind) -> Result<Self> {
        let (start_year, output, keywords) = match kind {
            VenueKind::Conference => (2015, "conference.csv", DEFAULT_CONFERENCE_KEYWORDS),
            VenueKind::Journal => (2020, "journal.csv", DEFAULT_JOURNAL_KEYWORDS),
        };

        Ok(Self {
            kind,
            start_year,
            threshold: 0.4,
            output: PathBuf::from(output),
            match_mode: MatchMode::Loose,
            venues: kind.default_venues().iter().map(|v| v.to_string()).collect(),
            keywords: KeywordTable::from_pairs(keywords.iter().copied())?,
            endpoint: Url::parse(DEFAULT_ENDPOINT)?,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
            page_delay: Duration::from_secs(3),
        })
    }

    /// Check the configuration once, before any network access.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.keywords.is_empty() {
            return Err(HarvestError::Config("Keyword table is empty".to_string()));
        }
        if !self.threshold.is_finite() {
            return Err(HarvestError::Config(format!(
                "Invalid score threshold: {}",
                self.threshold
            )));
        }
        let current_year = Local::now().year();
        if self.start_year > current_year {
            return Err(HarvestError::Config(format!(
                "Start year {} is in the future",
                self.start_year
            )));
        }
        if self.page_size == 0 || self.max_pages == 0 {
            return Err(HarvestError::Config(
                "Page size and page cap must be positive".to_string(),
            ));
        }
        // The hit range of one venue crawl must fit in u32
        if self.page_size.checked_mul(self.max_pages).is_none() {
            return Err(HarvestError::Config(format!(
                "Page size {} over {} pages exceeds the addressable hit range",
                self.page_size, self.max_pages
            )));
        }
        if self.venues.is_empty() {
            return Err(HarvestError::Config("No venues to crawl".to_string()));
        }
        for venue in &self.venues {
            validate_identifier(venue)?;
        }
        if self.output.as_os_str().is_empty() {
            return Err(HarvestError::Config("Output path is empty".to_string()));
        }
        Ok(())
    }

    /// One matcher per distinct venue, in configured order
    pub fn matchers(&self) -> Result<Vec<VenueMatcher>> {
        let mut seen = std::collections::HashSet::new();
        let mut matchers = Vec::new();
        for venue in &self.venues {
            let matcher = VenueMatcher::new(venue, self.match_mode)?;
            if seen.insert(matcher.identifier().to_string()) {
                matchers.push(matcher);
            }
        }
        Ok(matchers)
    }
}

/// Settings for one enrichment run
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub input: PathBuf,
    /// May equal `input`; replaced only once every row has been written
    pub output: PathBuf,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("conference.csv"),
            output: PathBuf::from("conference_with_bibtex.csv"),
            retry: RetryPolicy::none(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl EnrichConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.input.is_file() {
            return Err(HarvestError::Config(format!(
                "Input file {} does not exist",
                self.input.display()
            )));
        }
        if self.output.as_os_str().is_empty() {
            return Err(HarvestError::Config("Output path is empty".to_string()));
        }
        Ok(())
    }
}
