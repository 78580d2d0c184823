use super::types::{parse_date, Cell, RawTable, Ticker};
use super::{DateRange, MarketDataError, PriceSource};
use async_trait::async_trait;
use csv::ReaderBuilder;
use std::path::PathBuf;

/// Daily history from CSV snapshots, one `{TICKER}.csv` per symbol.
///
/// Accepts flat exports (`Date,Open,...`) as well as multi-level ones where
/// the ticker sits on its own header row. Leading rows whose first field is
/// not a date are treated as header levels.
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, ticker: &Ticker) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }
}

#[async_trait]
impl PriceSource for CsvSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn fetch(&self, ticker: &Ticker, range: DateRange) -> Result<RawTable, MarketDataError> {
        let path = self.path_for(ticker);
        tracing::debug!("Reading {}", path.display());

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| MarketDataError::Io {
                path: path.display().to_string(),
                source,
            })?;

        let table = parse_csv(&content)?;
        Ok(filter_range(table, range))
    }
}

pub fn parse_csv(content: &str) -> Result<RawTable, MarketDataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut header_rows: Vec<Vec<String>> = Vec::new();
    let mut data_rows: Vec<Vec<String>> = Vec::new();

    for record in reader.records() {
        let record = record?;
        let fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();
        let is_data = fields
            .first()
            .map(|first| parse_date(first).is_some())
            .unwrap_or(false);

        if data_rows.is_empty() && !is_data {
            header_rows.push(fields);
        } else {
            data_rows.push(fields);
        }
    }

    if header_rows.is_empty() {
        return Err(MarketDataError::Parse("csv has no header row".to_string()));
    }

    let width = header_rows.iter().map(Vec::len).max().unwrap_or(0);
    let levels: Vec<Vec<String>> = (0..width)
        .map(|col| {
            header_rows
                .iter()
                .map(|row| row.get(col).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    let mut table = RawTable::with_composite_columns(&levels);

    for fields in data_rows {
        let row = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                // The first column holds dates; keep it as text for the normalizer.
                if idx == 0 {
                    Cell::Text(field.trim().to_string())
                } else {
                    Cell::parse(field)
                }
            })
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

/// Drop rows outside `range`. Rows without a readable date are kept; the
/// normalizer deals with them.
fn filter_range(mut table: RawTable, range: DateRange) -> RawTable {
    table.rows.retain(|row| match row.first() {
        Some(Cell::Text(text)) => parse_date(text).map_or(true, |d| range.contains(d)),
        _ => true,
    });
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{normalize, Field};
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::TempDir;

    const MULTI_LEVEL: &str = "\
Price,Close,High,Low,Open,Volume
Ticker,GOOG,GOOG,GOOG,GOOG,GOOG
Date,,,,,
2015-01-02,26.17,26.49,26.13,26.38,28951268
2015-01-05,25.62,26.14,25.58,,41196796
2015-01-06,abc,25.74,24.98,25.68,57998800
";

    #[test]
    fn test_multi_level_headers_are_flattened() {
        let table = parse_csv(MULTI_LEVEL).unwrap();
        assert_eq!(
            table.columns,
            vec![
                "Price_Ticker_Date",
                "Close_GOOG",
                "High_GOOG",
                "Low_GOOG",
                "Open_GOOG",
                "Volume_GOOG"
            ]
        );
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1][4], Cell::Missing);
        assert_eq!(table.rows[2][1], Cell::Text("abc".into()));
    }

    #[test]
    fn test_flat_headers() {
        let content = "Date,Open,High,Low,Close,Adj Close,Volume\n2020-01-02,1,2,0.5,1.5,1.5,100\n";
        let table = parse_csv(content).unwrap();
        assert_eq!(table.columns[0], "Date");
        assert_eq!(table.rows[0][4], Cell::Number(1.5));
    }

    #[test]
    fn test_headerless_file_is_rejected() {
        assert!(parse_csv("2020-01-02,1,2,3\n").is_err());
    }

    #[tokio::test]
    async fn test_fetch_reads_ticker_file_within_range() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("GOOG.csv")).unwrap();
        file.write_all(MULTI_LEVEL.as_bytes()).unwrap();

        let source = CsvSource::new(dir.path());
        let ticker = Ticker::parse("goog").unwrap();
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2015, 1, 6).unwrap(),
        };

        let raw = source.fetch(&ticker, range).await.unwrap();
        assert_eq!(raw.rows.len(), 2);

        let table = normalize(ticker, raw);
        assert_eq!(table.column(Field::Close).unwrap(), "Close_GOOG");
        assert_eq!(table.column(Field::Date).unwrap(), "Price_Ticker_Date");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = CsvSource::new(dir.path());
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
        };
        let err = source
            .fetch(&Ticker::parse("MSFT").unwrap(), range)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::Io { .. }));
    }
}
