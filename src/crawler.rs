//! Venue crawl controller.
//!
//! Walks the publication index for one venue at a time, newest first, until
//! a year marker older than the start year appears, the index runs dry, the
//! page cap is hit or a fetch fails for good. Accepted records are written to
//! the store as soon as they are found.

use crate::config::HarvestConfig;
use crate::error::Result;
use crate::fetcher::{PageFetcher, Transport};
use crate::parser::{parse_result_page, RecordRow, Row};
use crate::store::{Record, RecordStore};
use crate::venue::{VenueKind, VenueMatcher};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Sort order: year descending, then venue, then score
const SORT_ORDER: &str = "ydvspc";

/// Why a venue crawl stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A year marker older than the start year was reached
    YearBoundary,
    /// A page came back with no rows
    Exhausted,
    /// The page cap was reached first
    PageCap,
    /// The fetcher gave up; records found so far are already stored
    FetchFailure,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::YearBoundary => "year boundary",
            Termination::Exhausted => "exhausted",
            Termination::PageCap => "page cap",
            Termination::FetchFailure => "fetch failure",
        };
        write!(f, "{}", s)
    }
}

/// Pagination state of one venue crawl. Dropped when the crawl ends.
#[derive(Debug, Clone)]
pub struct QueryCursor {
    venue: String,
    offset: u64,
    page_size: u32,
    pages: u32,
    /// Year of the most recent marker; carries across pages
    current_year: Option<i32>,
    boundary_reached: bool,
}

impl QueryCursor {
    pub fn new(venue: &str, page_size: u32) -> Self {
        Self {
            venue: venue.to_string(),
            offset: 0,
            page_size,
            pages: 0,
            current_year: None,
            boundary_reached: false,
        }
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    /// Hit offset of the next page; always a multiple of the page size
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Batch number sent as the `b` parameter
    pub fn batch(&self) -> u64 {
        self.offset / u64::from(self.page_size)
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn current_year(&self) -> Option<i32> {
        self.current_year
    }

    pub fn boundary_reached(&self) -> bool {
        self.boundary_reached
    }

    /// Record a successful fetch and move to the next page
    fn advance(&mut self) {
        self.offset += u64::from(self.page_size);
        self.pages += 1;
    }
}

/// Outcome of one venue crawl
#[derive(Debug, Clone)]
pub struct VenueSummary {
    pub venue: String,
    pub termination: Termination,
    pub pages: u32,
    pub accepted: Vec<Record>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub venues: Vec<VenueSummary>,
}

impl CrawlReport {
    pub fn total_accepted(&self) -> usize {
        self.venues.iter().map(|v| v.accepted.len()).sum()
    }

    pub fn failed_venues(&self) -> impl Iterator<Item = &str> {
        self.venues
            .iter()
            .filter(|v| v.termination == Termination::FetchFailure)
            .map(|v| v.venue.as_str())
    }
}

/// Free-text query for one venue: `kw1|kw2|... streamid:<prefix>/<venue>:`
pub fn build_query<'a>(
    keywords: impl IntoIterator<Item = &'a str>,
    kind: VenueKind,
    venue: &str,
) -> String {
    let terms: Vec<&str> = keywords.into_iter().collect();
    format!(
        "{} streamid:{}/{}:",
        terms.join("|"),
        kind.stream_prefix(),
        venue
    )
}

/// Drives fetch, parse, filter, score and store for each configured venue
pub struct Crawler<'a, T> {
    config: &'a HarvestConfig,
    fetcher: PageFetcher<T>,
}

impl<'a, T: Transport> Crawler<'a, T> {
    pub fn new(config: &'a HarvestConfig, transport: T) -> Self {
        let fetcher = PageFetcher::new(transport, config.retry, config.timeout);
        Self { config, fetcher }
    }

    /// Crawl every configured venue in order, appending to the configured store.
    ///
    /// # Errors
    ///
    /// Fails on configuration or store I/O errors. A venue whose fetches fail
    /// is logged and skipped.
    pub async fn run(&self) -> Result<CrawlReport> {
        self.config.validate()?;
        let matchers = self.config.matchers()?;
        let mut store = RecordStore::open(&self.config.output, self.config.kind)?;
        self.crawl_all(&matchers, &mut store).await
    }

    /// Crawl the given venues sequentially into `store`
    pub async fn crawl_all(
        &self,
        matchers: &[VenueMatcher],
        store: &mut RecordStore,
    ) -> Result<CrawlReport> {
        let mut report = CrawlReport::default();

        for matcher in matchers {
            info!(kind = %self.config.kind, venue = matcher.identifier(), "Starting search");
            let summary = self.crawl_venue(matcher, store).await?;
            info!(
                venue = %summary.venue,
                found = summary.accepted.len(),
                pages = summary.pages,
                reason = %summary.termination,
                "Completed search"
            );
            report.venues.push(summary);
        }

        info!(
            venues = report.venues.len(),
            total = report.total_accepted(),
            output = %store.path().display(),
            "Crawl complete"
        );
        Ok(report)
    }

    /// Crawl one venue until a termination condition is met
    pub async fn crawl_venue(
        &self,
        matcher: &VenueMatcher,
        store: &mut RecordStore,
    ) -> Result<VenueSummary> {
        let config = self.config;
        let mut cursor = QueryCursor::new(matcher.identifier(), config.page_size);
        let query = build_query(config.keywords.keywords(), config.kind, matcher.identifier());
        let mut accepted = Vec::new();

        let termination = loop {
            let params = [
                ("q", query.clone()),
                ("s", SORT_ORDER.to_string()),
                ("h", config.page_size.to_string()),
                ("b", cursor.batch().to_string()),
            ];

            debug!(venue = cursor.venue(), offset = cursor.offset(), "Fetching page");
            let page = match self.fetcher.fetch_with_params(&config.endpoint, &params).await {
                Ok(page) => page,
                Err(e) => {
                    error!(venue = cursor.venue(), offset = cursor.offset(), error = %e, "Giving up on venue");
                    break Termination::FetchFailure;
                }
            };
            let offset = cursor.offset();
            cursor.advance();

            let parsed = parse_result_page(&page.body, config.kind, &config.endpoint)?;
            if parsed.is_exhausted() {
                warn!(venue = cursor.venue(), offset = offset, "No more papers found");
                break Termination::Exhausted;
            }

            let row_count = parsed.rows.len();
            let before = accepted.len();
            for row in parsed.rows {
                match row {
                    Row::YearMarker(year) => {
                        if year < config.start_year {
                            debug!(venue = cursor.venue(), year = year, "Reached year boundary");
                            cursor.boundary_reached = true;
                            break;
                        }
                        if cursor.current_year.is_some_and(|current| year > current) {
                            warn!(venue = cursor.venue(), year = year, "Year markers out of order");
                        }
                        cursor.current_year = Some(year);
                    }
                    Row::Record(row) => {
                        if let Some(record) = self.evaluate(matcher, cursor.current_year, row) {
                            store.append(&record)?;
                            debug!(title = %record.title, score = record.score, "Accepted");
                            accepted.push(record);
                        }
                    }
                }
            }

            info!(
                venue = cursor.venue(),
                offset = offset,
                rows = row_count,
                accepted = accepted.len() - before,
                "Processed page"
            );

            if cursor.boundary_reached() {
                break Termination::YearBoundary;
            }
            if cursor.pages() >= config.max_pages {
                warn!(venue = cursor.venue(), pages = cursor.pages(), "Page cap reached");
                break Termination::PageCap;
            }

            tokio::time::sleep(config.page_delay).await;
        };

        Ok(VenueSummary {
            venue: cursor.venue().to_string(),
            termination,
            pages: cursor.pages(),
            accepted,
        })
    }

    /// Venue match and relevance filter for one record row
    fn evaluate(&self, matcher: &VenueMatcher, year: Option<i32>, row: RecordRow) -> Option<Record> {
        let Some(year) = year else {
            debug!(title = ?row.title, "Record before any year marker, skipping");
            return None;
        };
        if year < self.config.start_year {
            return None;
        }
        let (Some(title), Some(venue)) = (row.title, row.venue) else {
            debug!("Record without title or venue, skipping");
            return None;
        };
        if !matcher.matches(&venue) {
            debug!(venue = %venue, target = matcher.identifier(), "Venue mismatch");
            return None;
        }

        let score = self.config.keywords.score(&title);
        if score < self.config.threshold {
            return None;
        }

        Some(Record {
            title,
            venue,
            year,
            pagination: row.pagination,
            authors: row.authors,
            detail_link: row.detail_link,
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarvestError;
    use crate::mock::{query_param, MockResponse, MockTransport};
    use crate::retry::RetryPolicy;
    use crate::scoring::KeywordTable;
    use crate::store::Table;
    use crate::venue::MatchMode;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config(output: &Path) -> HarvestConfig {
        let mut config = HarvestConfig::for_kind(VenueKind::Conference).expect("defaults");
        config.start_year = 2015;
        config.threshold = 0.4;
        config.output = output.to_path_buf();
        config.venues = vec!["ccs".to_string()];
        config.keywords =
            KeywordTable::from_pairs([("attack", 0.2), ("detection", 0.2)]).expect("keywords");
        config.retry = RetryPolicy::new(1, Duration::from_secs(5));
        config
    }

    fn year(y: i32) -> String {
        format!(r#"<li class="year">{}</li>"#, y)
    }

    fn paper(title: &str, venue: &str) -> String {
        format!(
            r#"<li class="entry inproceedings"><a href="https://dblp.org/rec/{t}.html?view=bibtex">b</a>
               <cite><span itemprop="author"><span itemprop="name">Ann Author</span></span>:
               <span class="title">{t}</span>
               <span itemprop="isPartOf"><span itemprop="name">{v}</span></span>
               <span itemprop="pagination">1-10</span></cite></li>"#,
            t = title,
            v = venue
        )
    }

    fn page(items: &[String]) -> MockResponse {
        MockResponse::Page(format!("<ul class=\"publ-list\">{}</ul>", items.concat()))
    }

    fn batches(transport: &MockTransport) -> Vec<String> {
        transport
            .requests()
            .iter()
            .filter_map(|u| query_param(u, "b"))
            .collect()
    }

    async fn crawl_one(config: &HarvestConfig, transport: MockTransport) -> VenueSummary {
        let crawler = Crawler::new(config, transport);
        let matcher = VenueMatcher::new("ccs", config.match_mode).expect("matcher");
        let mut store = RecordStore::open(&config.output, config.kind).expect("store");
        crawler.crawl_venue(&matcher, &mut store).await.expect("crawl")
    }

    #[test]
    fn test_build_query() {
        let keywords = KeywordTable::from_pairs([("detection", 0.2), ("attack", 0.2)])
            .expect("keywords");
        assert_eq!(
            build_query(keywords.keywords(), VenueKind::Conference, "ccs"),
            "attack|detection streamid:conf/ccs:"
        );
        assert_eq!(
            build_query(keywords.keywords(), VenueKind::Journal, "tdsc"),
            "attack|detection streamid:journals/tdsc:"
        );
    }

    #[test]
    fn test_cursor_advances_by_page_size() {
        let mut cursor = QueryCursor::new("ccs", 1000);
        assert_eq!((cursor.offset(), cursor.batch()), (0, 0));
        cursor.advance();
        cursor.advance();
        assert_eq!((cursor.offset(), cursor.batch(), cursor.pages()), (2000, 2, 2));
    }

    #[test]
    fn test_cursor_offset_past_u32_range() {
        let mut cursor = QueryCursor::new("ccs", 3_000_000_000);
        for _ in 0..3 {
            cursor.advance();
        }
        assert_eq!(cursor.offset(), 9_000_000_000);
        assert_eq!(cursor.batch(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_rejects_oversized_page_span() {
        let dir = tempdir().expect("tempdir");
        let mut config = config(&dir.path().join("c.csv"));
        config.page_size = 3_000_000_000;
        config.max_pages = 3;
        let transport = MockTransport::always(page(&[year(2020)]));

        let result = Crawler::new(&config, transport.clone()).run().await;

        assert!(matches!(result, Err(HarvestError::Config(_))));
        assert_eq!(transport.call_count(), 0);
        assert!(!config.output.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_marker_first_persists_nothing() {
        let dir = tempdir().expect("tempdir");
        let config = config(&dir.path().join("c.csv"));
        let transport = MockTransport::always(page(&[
            year(2014),
            paper("Attack Detection Everywhere", "CCS"),
        ]));

        let summary = crawl_one(&config, transport.clone()).await;

        assert_eq!(summary.termination, Termination::YearBoundary);
        assert!(summary.accepted.is_empty());
        assert_eq!(transport.call_count(), 1);
        let table = Table::read(&config.output).expect("read");
        assert!(table.rows.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_filters_and_walks_pages_until_boundary() {
        let dir = tempdir().expect("tempdir");
        let config = config(&dir.path().join("c.csv"));
        let transport = MockTransport::from_fn(|url| {
            match query_param(url, "b").as_deref() {
                Some("0") => page(&[
                    year(2017),
                    paper("A New Attack on Attack Detection", "CCS"),
                    paper("Attack Surfaces", "CCS"),
                    paper("Attack Detection in the Wild", "AsiaCCS Workshop"),
                    paper("Detection of Attacks", "NDSS"),
                ]),
                Some("1") => page(&[
                    year(2015),
                    paper("Detecting Attacks: a Detection Study", "CCS"),
                    year(2014),
                    paper("Old Attack Detection", "CCS"),
                ]),
                _ => MockResponse::Status(500),
            }
        });

        let summary = crawl_one(&config, transport.clone()).await;

        assert_eq!(summary.termination, Termination::YearBoundary);
        assert_eq!(summary.pages, 2);
        assert_eq!(batches(&transport), vec!["0", "1"]);

        let titles: Vec<_> = summary.accepted.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "A New Attack on Attack Detection",
                "Attack Detection in the Wild",
                "Detecting Attacks: a Detection Study"
            ]
        );
        assert_eq!(summary.accepted[0].year, 2017);
        assert_eq!(summary.accepted[2].year, 2015);
        assert!(summary.accepted.iter().all(|r| r.year >= config.start_year));

        let table = Table::read(&config.output).expect("read");
        assert_eq!(table.rows.len(), 3);
        assert_eq!(Table::cell(&table.rows[0], table.column("authors")), "Ann Author");
        assert_eq!(Table::cell(&table.rows[0], table.column("pages")), "1-10");
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_mode_drops_workshops() {
        let dir = tempdir().expect("tempdir");
        let mut config = config(&dir.path().join("c.csv"));
        config.match_mode = MatchMode::Strict;
        let transport = MockTransport::with_sequence(vec![
            page(&[
                year(2020),
                paper("Attack Detection", "CCS"),
                paper("Attack Detection Again", "CCS Workshop"),
                paper("Attack Detection Elsewhere", "AsiaCCS"),
            ]),
            page(&[]),
        ]);

        let summary = crawl_one(&config, transport).await;

        assert_eq!(summary.termination, Termination::Exhausted);
        assert_eq!(summary.accepted.len(), 1);
        assert_eq!(summary.accepted[0].venue, "CCS");
    }

    #[tokio::test(start_paused = true)]
    async fn test_year_carries_across_pages() {
        let dir = tempdir().expect("tempdir");
        let config = config(&dir.path().join("c.csv"));
        let transport = MockTransport::with_sequence(vec![
            page(&[year(2018), paper("Attack Detection I", "CCS")]),
            page(&[paper("Attack Detection II", "CCS")]),
            page(&[]),
        ]);

        let summary = crawl_one(&config, transport).await;

        assert_eq!(summary.termination, Termination::Exhausted);
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.accepted.len(), 2);
        assert_eq!(summary.accepted[1].year, 2018);
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_before_any_year_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let config = config(&dir.path().join("c.csv"));
        let transport = MockTransport::with_sequence(vec![
            page(&[paper("Attack Detection", "CCS")]),
            page(&[]),
        ]);

        let summary = crawl_one(&config, transport).await;
        assert!(summary.accepted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_year_page_keeps_paging() {
        let dir = tempdir().expect("tempdir");
        let config = config(&dir.path().join("c.csv"));
        let transport = MockTransport::with_sequence(vec![
            page(&[year(2019)]),
            page(&[r#"<li class="year">pending</li>"#.to_string()]),
            page(&[paper("Attack Detection", "CCS")]),
            page(&[]),
        ]);

        let summary = crawl_one(&config, transport.clone()).await;

        assert_eq!(summary.termination, Termination::Exhausted);
        assert_eq!(transport.call_count(), 4);
        assert_eq!(summary.accepted.len(), 1);
        assert_eq!(summary.accepted[0].year, 2019);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_cap() {
        let dir = tempdir().expect("tempdir");
        let mut config = config(&dir.path().join("c.csv"));
        config.max_pages = 3;
        let transport = MockTransport::always(page(&[year(2020), paper("Attack Detection", "CCS")]));

        let summary = crawl_one(&config, transport.clone()).await;

        assert_eq!(summary.termination, Termination::PageCap);
        assert_eq!(batches(&transport), vec!["0", "1", "2"]);
        assert_eq!(summary.accepted.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polite_delay_between_pages() {
        let dir = tempdir().expect("tempdir");
        let config = config(&dir.path().join("c.csv"));
        let transport = MockTransport::with_sequence(vec![
            page(&[year(2020)]),
            page(&[year(2019)]),
            page(&[]),
        ]);
        let start = tokio::time::Instant::now();

        crawl_one(&config, transport).await;

        assert!(start.elapsed() >= config.page_delay * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_partial_results_and_moves_on() {
        let dir = tempdir().expect("tempdir");
        let mut config = config(&dir.path().join("c.csv"));
        config.venues = vec!["ccs".to_string(), "ndss".to_string()];
        let transport = MockTransport::from_fn(|url| {
            let q = query_param(url, "q").unwrap_or_default();
            let b = query_param(url, "b").unwrap_or_default();
            match (q.contains("conf/ccs:"), b.as_str()) {
                (true, "0") => page(&[year(2020), paper("Attack Detection", "CCS")]),
                (true, _) => MockResponse::Status(503),
                (false, _) => page(&[year(2014)]),
            }
        });

        let crawler = Crawler::new(&config, transport.clone());
        let report = crawler.run().await.expect("run");

        assert_eq!(report.venues.len(), 2);
        assert_eq!(report.venues[0].termination, Termination::FetchFailure);
        assert_eq!(report.venues[0].accepted.len(), 1);
        assert_eq!(report.venues[1].termination, Termination::YearBoundary);
        assert_eq!(report.failed_venues().collect::<Vec<_>>(), vec!["ccs"]);
        // ccs: page 0, then page 1 twice (one retry); ndss: page 0
        assert_eq!(transport.call_count(), 4);

        let table = Table::read(&config.output).expect("read");
        assert_eq!(table.rows.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_parameters() {
        let dir = tempdir().expect("tempdir");
        let config = config(&dir.path().join("c.csv"));
        let transport = MockTransport::always(page(&[]));

        crawl_one(&config, transport.clone()).await;

        let requests = transport.requests();
        let url = &requests[0];
        assert_eq!(url.path(), "/search/publ/inc");
        assert_eq!(
            query_param(url, "q").as_deref(),
            Some("attack|detection streamid:conf/ccs:")
        );
        assert_eq!(query_param(url, "s").as_deref(), Some("ydvspc"));
        assert_eq!(query_param(url, "h").as_deref(), Some("1000"));
    }
}
