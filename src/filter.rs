// Entry list filtering
//
// EntryQuery is what arrives from a query string: every field optional,
// every field a string. EntryQuery::parse turns it into a typed EntryFilter
// plus an EntryOrder, rejecting malformed input with InvalidFilter.

use chrono::NaiveDate;
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

use crate::error::{DdsError, Result};
use crate::models::parse_iso_date;

/// Raw list parameters as received from a request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EntryQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub status_id: Option<String>,
    pub type_id: Option<String>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub order: Option<String>,
}

/// Typed filter. Every present field is an AND-ed predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryFilter {
    /// Inclusive lower bound
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound
    pub date_to: Option<NaiveDate>,
    pub status_id: Option<i64>,
    pub type_id: Option<i64>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryOrder {
    /// Newest first
    #[default]
    DateDesc,
    DateAsc,
    AmountDesc,
    AmountAsc,
}

// Empty strings come from untouched form fields and mean "no filter".
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: &Option<String>) -> Result<Option<NaiveDate>> {
    present(value)
        .map(|raw| {
            parse_iso_date(raw).ok_or_else(|| {
                DdsError::InvalidFilter(format!("{field} must be a YYYY-MM-DD date, got {raw:?}"))
            })
        })
        .transpose()
}

fn parse_id(field: &str, value: &Option<String>) -> Result<Option<i64>> {
    present(value)
        .map(|raw| {
            raw.parse::<i64>().map_err(|_| {
                DdsError::InvalidFilter(format!("{field} must be an integer id, got {raw:?}"))
            })
        })
        .transpose()
}

impl EntryQuery {
    pub fn parse(&self) -> Result<(EntryFilter, EntryOrder)> {
        let filter = EntryFilter {
            date_from: parse_date("date_from", &self.date_from)?,
            date_to: parse_date("date_to", &self.date_to)?,
            status_id: parse_id("status_id", &self.status_id)?,
            type_id: parse_id("type_id", &self.type_id)?,
            category_id: parse_id("category_id", &self.category_id)?,
            subcategory_id: parse_id("subcategory_id", &self.subcategory_id)?,
        };

        let order = match present(&self.order) {
            Some(raw) => raw.parse()?,
            None => EntryOrder::default(),
        };

        Ok((filter, order))
    }
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn status(mut self, id: i64) -> Self {
        self.status_id = Some(id);
        self
    }

    pub fn flow_type(mut self, id: i64) -> Self {
        self.type_id = Some(id);
        self
    }

    pub fn category(mut self, id: i64) -> Self {
        self.category_id = Some(id);
        self
    }

    pub fn subcategory(mut self, id: i64) -> Self {
        self.subcategory_id = Some(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// SQL conditions on the `e` (dds_entries) alias with their bound values.
    pub(crate) fn conditions(&self) -> (Vec<&'static str>, Vec<Box<dyn ToSql>>) {
        let mut conditions: Vec<&'static str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(date_from) = self.date_from {
            conditions.push("e.date >= ?");
            params.push(Box::new(date_from));
        }
        if let Some(date_to) = self.date_to {
            conditions.push("e.date <= ?");
            params.push(Box::new(date_to));
        }
        if let Some(status_id) = self.status_id {
            conditions.push("e.status_id = ?");
            params.push(Box::new(status_id));
        }
        if let Some(type_id) = self.type_id {
            conditions.push("e.type_id = ?");
            params.push(Box::new(type_id));
        }
        if let Some(category_id) = self.category_id {
            conditions.push("e.category_id = ?");
            params.push(Box::new(category_id));
        }
        if let Some(subcategory_id) = self.subcategory_id {
            conditions.push("e.subcategory_id = ?");
            params.push(Box::new(subcategory_id));
        }

        (conditions, params)
    }
}

impl EntryOrder {
    /// ORDER BY clause; ties always fall back to insertion order.
    pub(crate) fn sql(self) -> &'static str {
        match self {
            EntryOrder::DateDesc => "e.date DESC, e.id ASC",
            EntryOrder::DateAsc => "e.date ASC, e.id ASC",
            EntryOrder::AmountDesc => "e.amount DESC, e.id ASC",
            EntryOrder::AmountAsc => "e.amount ASC, e.id ASC",
        }
    }
}

impl std::str::FromStr for EntryOrder {
    type Err = DdsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "-date" => Ok(EntryOrder::DateDesc),
            "date" => Ok(EntryOrder::DateAsc),
            "-amount" => Ok(EntryOrder::AmountDesc),
            "amount" => Ok(EntryOrder::AmountAsc),
            other => Err(DdsError::InvalidFilter(format!(
                "unknown order {other:?} (expected date, -date, amount or -amount)"
            ))),
        }
    }
}
