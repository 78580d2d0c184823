use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

const MAX_TICKER_LEN: usize = 16;

/// A single value of a fetched table, before any typing decisions are made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Classify a raw text field the way a CSV reader would.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Cell::Number(value),
            Ok(_) => Cell::Missing,
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Cell::Number(v),
            _ => Cell::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric coercion: text that parses becomes a number, anything else is `None`.
    pub fn to_numeric(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Cell::Missing => None,
        }
    }
}

/// Table as returned by a price source: labelled columns, untyped cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from nested header levels (one inner vec per column).
    pub fn with_composite_columns(levels: &[Vec<String>]) -> Self {
        Self::new(levels.iter().map(|parts| flatten_label(parts)).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Missing);
        self.rows.push(row);
    }
}

/// Join the non-empty parts of a composite column label with `_`.
pub fn flatten_label(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Semantic columns of a daily price table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Date,
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Volume,
    ];

    /// Label fragment searched for in source column names.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Date => "Date",
            Field::Open => "Open",
            Field::High => "High",
            Field::Low => "Low",
            Field::Close => "Close",
            Field::Volume => "Volume",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("no column matching '{name}' (available: {available:?})")]
pub struct ColumnNotFoundError {
    pub name: String,
    pub available: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub date: Option<NaiveDate>,
    pub open: Cell,
    pub high: Cell,
    pub low: Cell,
    pub close: Cell,
    pub volume: Cell,
}

impl PriceBar {
    pub fn cell(&self, field: Field) -> Option<&Cell> {
        match field {
            Field::Date => None,
            Field::Open => Some(&self.open),
            Field::High => Some(&self.high),
            Field::Low => Some(&self.low),
            Field::Close => Some(&self.close),
            Field::Volume => Some(&self.volume),
        }
    }

    pub fn cell_mut(&mut self, field: Field) -> Option<&mut Cell> {
        match field {
            Field::Date => None,
            Field::Open => Some(&mut self.open),
            Field::High => Some(&mut self.high),
            Field::Low => Some(&mut self.low),
            Field::Close => Some(&mut self.close),
            Field::Volume => Some(&mut self.volume),
        }
    }

    pub fn is_missing(&self, field: Field) -> bool {
        match field {
            Field::Date => self.date.is_none(),
            other => self.cell(other).map_or(true, Cell::is_missing),
        }
    }
}

/// Daily price history of one ticker in its normalized shape.
#[derive(Debug, Clone, Serialize)]
pub struct PriceTable {
    pub ticker: Ticker,
    /// Column labels as delivered by the source.
    pub columns: Vec<String>,
    /// Source label chosen for every resolved field.
    pub resolved: BTreeMap<Field, String>,
    pub bars: Vec<PriceBar>,
    pub fetch_error: Option<String>,
}

impl PriceTable {
    pub fn empty(ticker: Ticker) -> Self {
        Self {
            ticker,
            columns: Vec::new(),
            resolved: BTreeMap::new(),
            bars: Vec::new(),
            fetch_error: None,
        }
    }

    pub fn failed(ticker: Ticker, error: impl Into<String>) -> Self {
        Self {
            fetch_error: Some(error.into()),
            ..Self::empty(ticker)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn column(&self, field: Field) -> Result<&str, ColumnNotFoundError> {
        self.resolved
            .get(&field)
            .map(String::as_str)
            .ok_or_else(|| ColumnNotFoundError {
                name: field.label().to_string(),
                available: self.columns.clone(),
            })
    }

    /// Fails with the first field that could not be resolved.
    pub fn require(&self, fields: &[Field]) -> Result<(), ColumnNotFoundError> {
        for field in fields {
            self.column(*field)?;
        }
        Ok(())
    }

    pub fn tail(&self, n: usize) -> &[PriceBar] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }
}

/// Upper-cased, validated ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("ticker is empty")]
    Empty,
    #[error("ticker '{0}' is longer than 16 characters")]
    TooLong(String),
    #[error("ticker '{0}' contains unsupported characters")]
    InvalidCharacters(String),
}

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self, TickerError> {
        let symbol = raw.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(TickerError::Empty);
        }
        if symbol.len() > MAX_TICKER_LEN {
            return Err(TickerError::TooLong(symbol));
        }
        let valid = symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if !valid {
            return Err(TickerError::InvalidCharacters(symbol));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ticker {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse the date formats daily exports use, keeping only the calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.date_naive());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(" 12.5 "), Cell::Number(12.5));
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse("NaN"), Cell::Missing);
        assert_eq!(Cell::parse("n/a"), Cell::Text("n/a".to_string()));
    }

    #[test]
    fn test_flatten_composite_columns() {
        let table = RawTable::with_composite_columns(&[
            vec!["Price".into(), "Ticker".into(), "Date".into()],
            vec!["Close".into(), "GOOG".into(), "".into()],
            vec![" Open ".into(), "".into()],
        ]);
        assert_eq!(table.columns, vec!["Price_Ticker_Date", "Close_GOOG", "Open"]);
    }

    #[test]
    fn test_ticker_parse() {
        assert_eq!(Ticker::parse(" goog ").unwrap().as_str(), "GOOG");
        assert_eq!(Ticker::parse("BRK-B").unwrap().as_str(), "BRK-B");
        assert_eq!(Ticker::parse("^GSPC").unwrap().as_str(), "^GSPC");
        assert_eq!(Ticker::parse("  "), Err(TickerError::Empty));
        assert!(matches!(
            Ticker::parse("GO OG"),
            Err(TickerError::InvalidCharacters(_))
        ));
        assert!(matches!(
            Ticker::parse("ABCDEFGHIJKLMNOPQ"),
            Err(TickerError::TooLong(_))
        ));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
        assert_eq!(parse_date("2015-01-02"), Some(expected));
        assert_eq!(parse_date("2015-01-02 00:00:00"), Some(expected));
        assert_eq!(parse_date("2015-01-02 00:00:00-05:00"), Some(expected));
        assert_eq!(parse_date("2015-01-02T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("Ticker"), None);
    }
}
