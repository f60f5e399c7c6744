use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{AuditError, Result};

/// Column carrying the experiment identifier in XNAT listings.
pub const ID_COLUMN: &str = "ID";

/// Optional acquisition-date bounds for a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Value for XNAT's `date` query parameter.
    ///
    /// XNAT expects `MM/DD/YYYY`; a range is two dates joined by `-`.
    /// Returns `None` when neither bound is set.
    pub fn query_value(&self) -> Option<String> {
        let xnat = |date: NaiveDate| date.format("%m/%d/%Y").to_string();

        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(format!("{}-{}", xnat(start), xnat(end))),
            (Some(date), None) | (None, Some(date)) => Some(xnat(date)),
            (None, None) => None,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(start), Some(end)) => write!(f, "{start} to {end}"),
            (Some(start), None) => write!(f, "{start} onward"),
            (None, Some(end)) => write!(f, "through {end}"),
            (None, None) => write!(f, "all dates"),
        }
    }
}

/// Tabular result of an experiment listing.
///
/// Columns other than `ID` are carried through untouched and in their
/// original order.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    id_column: usize,
}

impl SessionTable {
    /// Parses a CSV listing body with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Parse`] if the body is empty, is not valid CSV,
    /// or has no `ID` column.
    pub fn from_csv(body: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(body.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| AuditError::parse("session listing", e))?
            .clone();

        if headers.is_empty() {
            return Err(AuditError::parse("session listing", "missing header row"));
        }

        let id_column = headers
            .iter()
            .position(|h| h == ID_COLUMN)
            .ok_or_else(|| {
                AuditError::parse("session listing", format!("no `{ID_COLUMN}` column"))
            })?;

        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AuditError::parse("session listing", e))?;

        Ok(Self {
            headers,
            rows,
            id_column,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Session identifiers in listing order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(|row| row.get(self.id_column).unwrap_or_default())
    }

    /// Returns a table holding only the rows whose `ID` is in `ids`.
    pub fn retain_ids(&self, ids: &HashSet<String>) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                row.get(self.id_column)
                    .is_some_and(|id| ids.contains(id))
            })
            .cloned()
            .collect();

        Self {
            headers: self.headers.clone(),
            rows,
            id_column: self.id_column,
        }
    }

    /// Rows as column-name → value maps, preserving column order.
    pub fn records(&self) -> Vec<IndexMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect()
            })
            .collect()
    }
}

/// A scan whose project label differs from its session's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchedScan {
    pub scan_id: Option<String>,
    pub project: String,
}

/// Outcome of checking one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    Contaminated {
        session_project: String,
        mismatched_scans: Vec<MismatchedScan>,
    },
    /// The session could not be evaluated (fetch failed, no project label).
    Undetermined { reason: String },
}

impl Verdict {
    pub fn is_contaminated(&self) -> bool {
        matches!(self, Self::Contaminated { .. })
    }
}
