//! Incremental CSV persistence.
//!
//! Every row is flushed and synced to disk before the writer returns, so an
//! interrupted run loses at most the row in flight.

use crate::error::{HarvestError, Result};
use crate::venue::VenueKind;
use csv::StringRecord;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Column holding the record title; also the key used by enrichment
pub const TITLE_COLUMN: &str = "title";

/// Column holding the detail page link
pub const LINK_COLUMN: &str = "bibtex_url";

/// Column added by the enrichment pass
pub const CITATION_COLUMN: &str = "bibtex_data";

/// Separator between author names inside the authors cell
pub const AUTHOR_SEPARATOR: &str = ", ";

/// Header row of a record store for the given venue kind
pub fn header(kind: VenueKind) -> [&'static str; 6] {
    [
        TITLE_COLUMN,
        kind.venue_column(),
        "year",
        "pages",
        "authors",
        LINK_COLUMN,
    ]
}

/// One accepted publication
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub title: String,
    pub venue: String,
    pub year: i32,
    pub pagination: Option<String>,
    pub authors: Vec<String>,
    pub detail_link: Option<String>,
    /// Relevance score; not persisted
    pub score: f64,
}

#[derive(Serialize)]
struct StoreRow<'a> {
    title: &'a str,
    venue: &'a str,
    year: i32,
    pages: Option<&'a str>,
    authors: String,
    bibtex_url: Option<&'a str>,
}

impl<'a> From<&'a Record> for StoreRow<'a> {
    fn from(r: &'a Record) -> Self {
        Self {
            title: &r.title,
            venue: &r.venue,
            year: r.year,
            pages: r.pagination.as_deref(),
            authors: r.authors.join(AUTHOR_SEPARATOR),
            bibtex_url: r.detail_link.as_deref(),
        }
    }
}

/// Append-only store of accepted records.
///
/// The header is written only when the file is created (or found empty);
/// opening an existing store appends after its last row.
pub struct RecordStore {
    path: PathBuf,
    writer: csv::Writer<File>,
    written: usize,
}

impl RecordStore {
    pub fn open(path: impl AsRef<Path>, kind: VenueKind) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(header(kind))?;
            sync(&mut writer)?;
            info!(path = %path.display(), "Created record store");
        } else {
            check_header(&path, kind)?;
            debug!(path = %path.display(), "Appending to existing record store");
        }

        Ok(Self {
            path,
            writer,
            written: 0,
        })
    }

    /// Write one record and force it to disk
    pub fn append(&mut self, record: &Record) -> Result<()> {
        self.writer.serialize(StoreRow::from(record))?;
        sync(&mut self.writer)?;
        self.written += 1;
        Ok(())
    }

    /// Records appended through this handle
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Refuse to append to a store whose header belongs to another layout
fn check_header(path: &Path, kind: VenueKind) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let found = reader.records().next().transpose()?.unwrap_or_default();
    let expected = header(kind);
    if !found.iter().map(str::trim).eq(expected.iter().copied()) {
        return Err(HarvestError::Config(format!(
            "Existing store {} has header [{}], expected [{}] for {} records",
            path.display(),
            found.iter().collect::<Vec<_>>().join(","),
            expected.join(","),
            kind
        )));
    }
    Ok(())
}

/// Truncating writer for whole-table rewrites, durable row by row
pub struct TableWriter {
    writer: csv::Writer<File>,
}

impl TableWriter {
    pub fn create(path: impl AsRef<Path>, headers: &StringRecord) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(headers)?;
        sync(&mut writer)?;
        Ok(Self { writer })
    }

    pub fn write_row(&mut self, row: &StringRecord) -> Result<()> {
        self.writer.write_record(row)?;
        sync(&mut self.writer)
    }
}

fn sync(writer: &mut csv::Writer<File>) -> Result<()> {
    writer.flush()?;
    writer.get_ref().sync_data()?;
    Ok(())
}

/// A CSV file loaded into memory
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl Table {
    /// Read a whole CSV file.
    ///
    /// Rows may be ragged; a truncated final row from an interrupted run is
    /// kept with whatever fields it has.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| {
                let missing = matches!(e.kind(), csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound);
                if missing {
                    HarvestError::Config(format!("File not found: {}", path.display()))
                } else {
                    HarvestError::Csv(e)
                }
            })?;
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    /// Read `path` if it exists, otherwise `None`
    pub fn read_if_exists(path: impl AsRef<Path>) -> Result<Option<Self>> {
        if path.as_ref().exists() {
            Self::read(path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Trimmed cell value; empty when the row is too short
    pub fn cell<'a>(row: &'a StringRecord, index: Option<usize>) -> &'a str {
        index.and_then(|i| row.get(i)).map(str::trim).unwrap_or("")
    }
}
