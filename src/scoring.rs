//! Keyword relevance scoring.
//!
//! A title's score is the sum of the weights of every keyword that occurs in
//! it as a case-insensitive substring. Each keyword counts at most once.

use crate::error::{HarvestError, Result};
use std::collections::BTreeMap;

/// Default keywords for conference crawls
pub const DEFAULT_CONFERENCE_KEYWORDS: &[(&str, f64)] = &[
    ("malicious", 0.2),
    ("user", 0.2),
    ("attack", 0.2),
    ("detection", 0.2),
    ("recognitio", 0.2),
];

/// Default keywords for journal crawls
pub const DEFAULT_JOURNAL_KEYWORDS: &[(&str, f64)] = &[("linear", 0.2), ("attention", 0.2)];

/// Keyword to weight mapping, fixed for the duration of a run.
///
/// Keywords are stored lowercased so scoring only has to lowercase the title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordTable {
    weights: BTreeMap<String, f64>,
}

impl KeywordTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(keyword, weight)` pairs.
    ///
    /// Later duplicates (compared case-insensitively) replace earlier ones.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (keyword, weight) in pairs {
            table.insert(keyword.as_ref(), weight)?;
        }
        Ok(table)
    }

    /// Add a keyword.
    ///
    /// # Errors
    ///
    /// Returns a config error for blank keywords and negative or non-finite weights.
    pub fn insert(&mut self, keyword: &str, weight: f64) -> Result<()> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Err(HarvestError::Config("Keyword must not be empty".to_string()));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(HarvestError::Config(format!(
                "Keyword '{}' has invalid weight {}",
                keyword, weight
            )));
        }
        self.weights.insert(keyword, weight);
        Ok(())
    }

    /// Parse a `keyword=weight` entry as given on the command line
    pub fn parse_entry(entry: &str) -> Result<(String, f64)> {
        let (keyword, weight) = entry.rsplit_once('=').ok_or_else(|| {
            HarvestError::Config(format!("Expected keyword=weight, got '{}'", entry))
        })?;
        let weight: f64 = weight.trim().parse().map_err(|_| {
            HarvestError::Config(format!("Invalid weight in '{}'", entry))
        })?;
        Ok((keyword.trim().to_string(), weight))
    }

    /// Iterate keywords in stable (sorted) order
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Score a title against this table
    pub fn score(&self, title: &str) -> f64 {
        score(title, self)
    }
}

/// Sum the weights of all keywords contained in `title`, ignoring case.
///
/// No normalization and no cap. An empty title scores 0.
pub fn score(title: &str, table: &KeywordTable) -> f64 {
    if title.is_empty() {
        return 0.0;
    }
    let title = title.to_lowercase();
    table
        .weights
        .iter()
        .filter(|(keyword, _)| title.contains(keyword.as_str()))
        .map(|(_, weight)| weight)
        .sum()
}
