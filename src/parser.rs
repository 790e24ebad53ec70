//! Result page and detail page parsing.
//!
//! A result page of the publication index is a flat list of `li` elements in
//! reverse-chronological order: `li.year` markers followed by the record items
//! of that year (`li.inproceedings` or `li.article`). Bibliographic fields live
//! in the item's `cite` element, tagged with schema.org `itemprop` attributes.

use crate::error::{HarvestError, Result};
use crate::venue::VenueKind;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// One record item as it appears on a result page.
///
/// The year is not part of the item; it comes from the nearest preceding
/// year marker. Missing fields are `None` rather than errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordRow {
    pub title: Option<String>,
    pub venue: Option<String>,
    pub pagination: Option<String>,
    pub authors: Vec<String>,
    pub detail_link: Option<String>,
}

/// A typed row of a result page
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    YearMarker(i32),
    Record(RecordRow),
}

/// Rows of one result page, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub rows: Vec<Row>,
    /// List items matched on the page, including unreadable year markers
    pub items: usize,
}

impl ResultPage {
    /// No list items at all: the index has nothing more for this query
    pub fn is_exhausted(&self) -> bool {
        self.items == 0
    }

    pub fn record_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, Row::Record(_)))
            .count()
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::Parse(e.to_string()))
}

/// Collapse runs of whitespace and trim
fn clean_text<'a, I: Iterator<Item = &'a str>>(parts: I) -> String {
    parts
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parse one result page.
///
/// `base` is used to resolve relative detail links. Year markers whose text
/// is not a number are dropped; a malformed record degrades field by field.
pub fn parse_result_page(html: &str, kind: VenueKind, base: &Url) -> Result<ResultPage> {
    let document = Html::parse_document(html);

    let row_selector = selector(&format!("li.year, li.{}", kind.record_class()))?;
    let selectors = RecordSelectors::new()?;

    let mut rows = Vec::new();
    let mut items = 0;
    for item in document.select(&row_selector) {
        items += 1;
        if item.value().classes().any(|c| c == "year") {
            match clean_text(item.text()).parse::<i32>() {
                Ok(year) => rows.push(Row::YearMarker(year)),
                Err(_) => debug!(text = %clean_text(item.text()), "Skipping unreadable year marker"),
            }
        } else {
            rows.push(Row::Record(selectors.record(item, base)));
        }
    }

    Ok(ResultPage { rows, items })
}

struct RecordSelectors {
    cite: Selector,
    title: Selector,
    venue: Selector,
    pagination: Selector,
    author: Selector,
    bibtex_link: Selector,
}

impl RecordSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            cite: selector("cite")?,
            title: selector(".title")?,
            venue: selector("[itemprop=\"isPartOf\"]")?,
            pagination: selector("[itemprop=\"pagination\"]")?,
            author: selector("[itemprop=\"author\"]")?,
            bibtex_link: selector("a[href*=\"view=bibtex\"]")?,
        })
    }

    fn record(&self, item: ElementRef<'_>, base: &Url) -> RecordRow {
        let detail_link = item
            .select(&self.bibtex_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base.join(href.trim()).ok())
            .map(|u| u.to_string());

        let Some(cite) = item.select(&self.cite).next() else {
            return RecordRow {
                detail_link,
                ..Default::default()
            };
        };

        let field = |sel: &Selector| {
            cite.select(sel)
                .next()
                .and_then(|e| non_empty(clean_text(e.text())))
        };

        let authors = cite
            .select(&self.author)
            .map(|a| clean_text(a.text()))
            .filter(|a| !a.is_empty())
            .collect();

        RecordRow {
            title: field(&self.title),
            venue: field(&self.venue),
            pagination: field(&self.pagination),
            authors,
            detail_link,
        }
    }
}

/// Extract the preformatted citation block from a record's detail page
pub fn parse_citation(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let block = selector("div#bibtex-section pre")?;
    Ok(document
        .select(&block)
        .next()
        .map(|pre| pre.text().collect::<String>().trim().to_string())
        .and_then(non_empty))
}
