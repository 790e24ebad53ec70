//! BibTeX enrichment of a record store.
//!
//! Every input row is written to the output with a citation column filled in.
//! Rows are written durably to a `.partial` sibling of the output, which
//! replaces the output only once every row is done. Citations already present
//! in a previous output or a leftover partial file (matched by title) are
//! carried forward without a request, so an interrupted run can simply be
//! restarted with the same arguments.

use crate::config::EnrichConfig;
use crate::error::{HarvestError, Result};
use crate::fetcher::{PageFetcher, Transport};
use crate::parser::parse_citation;
use crate::store::{Table, TableWriter, CITATION_COLUMN, LINK_COLUMN, TITLE_COLUMN};
use csv::StringRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

/// Citation value for a row whose detail page could not be fetched or parsed
pub const NOT_AVAILABLE: &str = "Not Available";

/// Citation value for a row without a detail link
pub const NO_URL: &str = "No URL";

/// True if `value` holds a real citation rather than a placeholder
pub fn has_citation(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != NOT_AVAILABLE && value != NO_URL
}

/// Counters for one enrichment run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub total: usize,
    /// Citations carried forward without fetching
    pub reused: usize,
    pub fetched: usize,
    pub not_available: usize,
    pub no_url: usize,
}

/// Progress of a store before enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatus {
    pub total_entries: usize,
    /// Output rows that already hold a real citation
    pub existing_citations: usize,
}

/// Count input rows and finished output rows without touching the network
pub fn inspect(input: &Path, output: &Path) -> Result<StoreStatus> {
    let total_entries = match Table::read_if_exists(input)? {
        Some(table) => table.rows.len(),
        None => {
            warn!(path = %input.display(), "Input file does not exist");
            0
        }
    };
    let existing_citations = match Table::read_if_exists(output)? {
        Some(table) => {
            let col = table.column(CITATION_COLUMN);
            table
                .rows
                .iter()
                .filter(|row| has_citation(Table::cell(row, col)))
                .count()
        }
        None => 0,
    };
    Ok(StoreStatus {
        total_entries,
        existing_citations,
    })
}

/// Sibling file an enrichment run writes to before replacing `output`
pub fn partial_path(output: &Path) -> Result<PathBuf> {
    let mut name = output
        .file_name()
        .ok_or_else(|| {
            HarvestError::Config(format!("Output path {} has no file name", output.display()))
        })?
        .to_os_string();
    name.push(".partial");
    Ok(output.with_file_name(name))
}

/// Title to citation map of rows that already hold a real citation
fn load_existing(table: &Table) -> HashMap<String, String> {
    let (Some(title_col), Some(citation_col)) =
        (table.column(TITLE_COLUMN), table.column(CITATION_COLUMN))
    else {
        return HashMap::new();
    };
    table
        .rows
        .iter()
        .filter_map(|row| {
            let title = Table::cell(row, Some(title_col));
            let citation = Table::cell(row, Some(citation_col));
            (!title.is_empty() && has_citation(citation))
                .then(|| (title.to_string(), citation.to_string()))
        })
        .collect()
}

/// Fills the citation column of a record store
pub struct Enricher<'a, T> {
    config: &'a EnrichConfig,
    fetcher: PageFetcher<T>,
}

impl<'a, T: Transport> Enricher<'a, T> {
    pub fn new(config: &'a EnrichConfig, transport: T) -> Self {
        let fetcher = PageFetcher::new(transport, config.retry, config.timeout);
        Self { config, fetcher }
    }

    /// Rewrite the output store from the input store, one durable row at a time.
    ///
    /// The output is only replaced after the last row, so input and output may
    /// be the same file and an interrupted run never shortens the store.
    pub async fn run(&self) -> Result<EnrichmentStats> {
        self.config.validate()?;

        let partial = partial_path(&self.config.output)?;
        let mut existing = HashMap::new();
        for source in [self.config.output.as_path(), partial.as_path()] {
            if let Some(table) = Table::read_if_exists(source)? {
                existing.extend(load_existing(&table));
            }
        }
        let input = Table::read(&self.config.input)?;

        let title_col = input.column(TITLE_COLUMN).ok_or_else(|| {
            HarvestError::Config(format!(
                "Input {} has no '{}' column",
                self.config.input.display(),
                TITLE_COLUMN
            ))
        })?;
        let link_col = input.column(LINK_COLUMN);
        let input_citation_col = input.column(CITATION_COLUMN);

        let mut headers = input.headers.clone();
        let citation_col = match input_citation_col {
            Some(col) => col,
            None => {
                headers.push_field(CITATION_COLUMN);
                headers.len() - 1
            }
        };

        info!(
            input = %self.config.input.display(),
            output = %self.config.output.display(),
            rows = input.rows.len(),
            reusable = existing.len(),
            "Starting enrichment"
        );

        let mut writer = TableWriter::create(&partial, &headers)?;
        let mut stats = EnrichmentStats::default();
        let total = input.rows.len();

        for (idx, row) in input.rows.iter().enumerate() {
            let title = Table::cell(row, Some(title_col));
            let own = Table::cell(row, input_citation_col);

            let citation = if let Some(previous) = existing.get(title) {
                stats.reused += 1;
                previous.clone()
            } else if has_citation(own) {
                stats.reused += 1;
                own.to_string()
            } else {
                let link = Table::cell(row, link_col);
                if link.is_empty() {
                    stats.no_url += 1;
                    NO_URL.to_string()
                } else {
                    match self.fetch_citation(link).await {
                        Some(citation) => {
                            stats.fetched += 1;
                            citation
                        }
                        None => {
                            stats.not_available += 1;
                            NOT_AVAILABLE.to_string()
                        }
                    }
                }
            };

            writer.write_row(&with_cell(row, headers.len(), citation_col, &citation))?;
            stats.total += 1;

            if (idx + 1) % 50 == 0 {
                info!("  Processed {}/{} papers...", idx + 1, total);
            }
        }

        info!(
            total = stats.total,
            reused = stats.reused,
            fetched = stats.fetched,
            not_available = stats.not_available,
            no_url = stats.no_url,
            "Enrichment complete"
        );

        drop(writer);
        std::fs::rename(&partial, &self.config.output)?;
        Ok(stats)
    }

    /// Fetch a detail page and pull out its citation block
    async fn fetch_citation(&self, link: &str) -> Option<String> {
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = link, error = %e, "Invalid detail link");
                return None;
            }
        };

        let page = match self.fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = link, error = %e, "Failed to fetch BibTeX page");
                return None;
            }
        };

        match parse_citation(&page.body) {
            Ok(Some(citation)) => {
                debug!(url = link, "Fetched BibTeX");
                Some(citation)
            }
            Ok(None) => {
                warn!(url = link, "No BibTeX section found");
                None
            }
            Err(e) => {
                warn!(url = link, error = %e, "Failed to parse BibTeX page");
                None
            }
        }
    }
}

/// Copy `row` padded to `width` fields with `value` at `col`
fn with_cell(row: &StringRecord, width: usize, col: usize, value: &str) -> StringRecord {
    let mut out = StringRecord::with_capacity(row.as_slice().len() + value.len(), width);
    for i in 0..width {
        if i == col {
            out.push_field(value);
        } else {
            out.push_field(row.get(i).unwrap_or(""));
        }
    }
    out
}
