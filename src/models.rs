// DDS data model
//
// Four reference entities classify every entry:
//   Status                      (planned, paid, ...)
//   FlowType → Category → Subcategory   (strict hierarchy scoped by type)
//
// Entries carry raw foreign keys; ResolvedEntry carries the joined rows.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// DATES
// ============================================================================

/// Parse a calendar date written exactly as `YYYY-MM-DD`.
///
/// Dates are stored as TEXT and compared as text, so only the fixed-width
/// four-digit-year form keeps text order equal to calendar order.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// True when `date` renders as a four-digit-year `YYYY-MM-DD`.
pub fn is_storable_date(date: NaiveDate) -> bool {
    (0..=9999).contains(&date.year())
}

fn deserialize_iso_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_iso_date(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("date must be a YYYY-MM-DD date, got {raw:?}"))
    })
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    pub name: String,
}

/// Top-level classification of money movement (income, expense, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub type_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
}

/// Everything the reference-management screen shows
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefCatalog {
    pub statuses: Vec<Status>,
    pub types: Vec<FlowType>,
    pub categories: Vec<Category>,
    pub subcategories: Vec<Subcategory>,
}

// ============================================================================
// ENTRIES
// ============================================================================

/// Payload for creating or overwriting an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInput {
    #[serde(deserialize_with = "deserialize_iso_date")]
    pub date: NaiveDate,
    pub status_id: i64,
    pub type_id: i64,
    pub category_id: i64,
    pub subcategory_id: i64,
    pub amount: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

impl EntryInput {
    /// Trim the comment; forms submit "" for an untouched textarea.
    pub fn normalized(mut self) -> Self {
        self.comment = self
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }
}

/// A stored entry as its raw row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub date: NaiveDate,
    pub status_id: i64,
    pub type_id: i64,
    pub category_id: i64,
    pub subcategory_id: i64,
    pub amount: f64,
    pub comment: Option<String>,
}

/// An entry with its four relations fetched and attached.
///
/// Relations are always complete: the constructor takes every row, so a
/// partially resolved entry cannot be built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    #[serde(flatten)]
    pub entry: Entry,
    pub status: Status,
    #[serde(rename = "type")]
    pub flow_type: FlowType,
    pub category: Category,
    pub subcategory: Subcategory,
}

impl ResolvedEntry {
    pub fn id(&self) -> i64 {
        self.entry.id
    }
}
