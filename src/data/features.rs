use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::model::{Dataset, Observation, RawCell, RawTable};
use crate::error::{EngineResult, SchemaError};

// ---------------------------------------------------------------------------
// Schema mapping: which columns hold the timestamp and the price
// ---------------------------------------------------------------------------

/// Resolved positions of the two columns the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaMapping {
    pub timestamp_index: usize,
    pub timestamp_column: String,
    pub price_index: usize,
    pub price_column: String,
}

impl SchemaMapping {
    /// Locate the columns by name.
    ///
    /// * price: first column whose name contains "price"
    /// * timestamp: first *other* column whose name contains "date" or "time"
    ///
    /// Matching is case-insensitive. Nothing is guessed beyond that.
    pub fn detect(columns: &[String]) -> Result<Self, SchemaError> {
        Self::resolve(columns, None, None)
    }

    /// Like [`SchemaMapping::detect`], but a `Some` name is looked up exactly
    /// instead of being detected.
    pub fn resolve(
        columns: &[String],
        timestamp: Option<&str>,
        price: Option<&str>,
    ) -> Result<Self, SchemaError> {
        let price_index = match price {
            Some(name) => exact_index(columns, name)?,
            None => columns
                .iter()
                .position(|c| c.to_lowercase().contains("price"))
                .ok_or_else(|| SchemaError::MissingPriceColumn {
                    columns: columns.to_vec(),
                })?,
        };

        let timestamp_index = match timestamp {
            Some(name) => exact_index(columns, name)?,
            None => columns
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != price_index)
                .find(|(_, c)| {
                    let c = c.to_lowercase();
                    c.contains("date") || c.contains("time")
                })
                .map(|(i, _)| i)
                .ok_or_else(|| SchemaError::MissingTimestampColumn {
                    columns: columns.to_vec(),
                })?,
        };

        let mapping = SchemaMapping {
            timestamp_index,
            timestamp_column: columns[timestamp_index].clone(),
            price_index,
            price_column: columns[price_index].clone(),
        };
        log::debug!(
            "Schema mapping: timestamp='{}', price='{}'",
            mapping.timestamp_column,
            mapping.price_column
        );
        Ok(mapping)
    }
}

fn exact_index(columns: &[String], name: &str) -> Result<usize, SchemaError> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| SchemaError::UnknownColumn {
            name: name.to_string(),
            columns: columns.to_vec(),
        })
}

// ---------------------------------------------------------------------------
// Timestamp / price parsing
// ---------------------------------------------------------------------------

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y/%H:%M",
    "%d.%m.%Y/%H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Parse a timestamp string.
///
/// Strings carrying an offset keep their local wall-clock time, so
/// `2024-01-01T00:00:00+01:00` lands in hour 0 like its CET spreadsheet cell.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(s, f).ok())
    {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// 1971-01-01T00:00:00Z in epoch milliseconds.
const EPOCH_MILLIS_FLOOR: f64 = 31_536_000_000.0;

/// Numeric timestamps are epoch milliseconds (the records-JSON convention).
///
/// Anything before 1971 is rejected: spreadsheet date serials (`45292`) and
/// epoch seconds would otherwise land silently in January 1970.
fn timestamp_from_millis(ms: f64) -> Option<NaiveDateTime> {
    if !ms.is_finite() {
        return None;
    }
    if ms < EPOCH_MILLIS_FLOOR {
        log::debug!("Numeric timestamp {ms} is not epoch milliseconds after 1970");
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64).map(|dt| dt.naive_utc())
}

/// Parse a price, accepting a decimal comma when there is no decimal point.
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    let value = match s.parse::<f64>() {
        Ok(v) => v,
        Err(_) if !s.contains('.') => s.replace(',', ".").parse::<f64>().ok()?,
        Err(_) => return None,
    };
    value.is_finite().then_some(value)
}

fn cell_timestamp(cell: &RawCell) -> Option<NaiveDateTime> {
    match cell {
        RawCell::DateTime(ts) => Some(*ts),
        RawCell::Text(s) => parse_timestamp(s),
        RawCell::Number(ms) => timestamp_from_millis(*ms),
        RawCell::Null => None,
    }
}

fn cell_price(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Number(v) => v.is_finite().then_some(*v),
        RawCell::Text(s) => parse_price(s),
        RawCell::DateTime(_) | RawCell::Null => None,
    }
}

// ---------------------------------------------------------------------------
// Derivation: RawTable → Dataset
// ---------------------------------------------------------------------------

/// Why a row was left out of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RowIssueKind {
    UnparseableTimestamp(String),
    InvalidPrice(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    /// Zero-based data row index (header excluded).
    pub row: usize,
    #[serde(flatten)]
    pub kind: RowIssueKind,
}

/// The derived dataset plus an account of the rows that were dropped.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub dataset: Dataset,
    pub mapping: SchemaMapping,
    pub total_rows: usize,
    pub issues: Vec<RowIssue>,
}

impl Derivation {
    pub fn unparseable_timestamps(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i.kind, RowIssueKind::UnparseableTimestamp(_)))
            .count()
    }

    pub fn invalid_prices(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i.kind, RowIssueKind::InvalidPrice(_)))
            .count()
    }
}

/// Detect the schema and derive the dataset in one go.
pub fn derive(table: &RawTable) -> EngineResult<Derivation> {
    let mapping = SchemaMapping::detect(&table.columns)?;
    derive_dataset(table, mapping)
}

/// Turn every parseable row into an [`Observation`].
///
/// A bad timestamp or price never fails the batch: the row is dropped and
/// recorded in [`Derivation::issues`].
pub fn derive_dataset(table: &RawTable, mapping: SchemaMapping) -> EngineResult<Derivation> {
    let mut observations = Vec::with_capacity(table.len());
    let mut issues = Vec::new();

    for (row_no, row) in table.rows.iter().enumerate() {
        let ts_cell = row.get(mapping.timestamp_index).unwrap_or(&RawCell::Null);
        let price_cell = row.get(mapping.price_index).unwrap_or(&RawCell::Null);

        let Some(timestamp) = cell_timestamp(ts_cell) else {
            issues.push(RowIssue {
                row: row_no,
                kind: RowIssueKind::UnparseableTimestamp(ts_cell.to_string()),
            });
            continue;
        };
        let Some(price) = cell_price(price_cell) else {
            issues.push(RowIssue {
                row: row_no,
                kind: RowIssueKind::InvalidPrice(price_cell.to_string()),
            });
            continue;
        };

        observations.push(Observation::new(timestamp, price)?);
    }

    if !issues.is_empty() {
        log::warn!(
            "Dropped {} of {} rows ({} unparseable timestamps)",
            issues.len(),
            table.len(),
            issues
                .iter()
                .filter(|i| matches!(i.kind, RowIssueKind::UnparseableTimestamp(_)))
                .count()
        );
    }

    Ok(Derivation {
        dataset: Dataset::from_observations(observations),
        mapping,
        total_rows: table.len(),
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    #[test]
    fn test_detect_spreadsheet_headers() {
        let columns = cols(&["Area", "Date/Time CET/CEST", "Energy Price [EUR/MWh]"]);
        let m = SchemaMapping::detect(&columns).unwrap();
        assert_eq!(m.timestamp_index, 1);
        assert_eq!(m.price_index, 2);
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        let m = SchemaMapping::detect(&cols(&["PRICE", "TIMESTAMP"])).unwrap();
        assert_eq!(m.timestamp_column, "TIMESTAMP");
        assert_eq!(m.price_column, "PRICE");
    }

    #[test]
    fn test_price_column_is_not_reused_as_timestamp() {
        let err = SchemaMapping::detect(&cols(&["price_time", "volume"])).unwrap_err();
        assert!(matches!(err, SchemaError::MissingTimestampColumn { .. }));
    }

    #[test]
    fn test_missing_columns() {
        let err = SchemaMapping::detect(&cols(&["when", "price"])).unwrap_err();
        assert!(matches!(err, SchemaError::MissingTimestampColumn { .. }));

        let err = SchemaMapping::detect(&cols(&["datetime", "value"])).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingPriceColumn {
                columns: cols(&["datetime", "value"])
            }
        );
    }

    #[test]
    fn test_resolve_with_override() {
        let columns = cols(&["start", "eur_mwh", "date"]);
        let m = SchemaMapping::resolve(&columns, Some("start"), Some("eur_mwh")).unwrap();
        assert_eq!((m.timestamp_index, m.price_index), (0, 1));

        let err = SchemaMapping::resolve(&columns, None, Some("cost")).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn { ref name, .. } if name == "cost"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        for s in [
            "2024-03-05 14:30:00",
            "2024-03-05T14:30:00",
            "2024-03-05T14:30",
            "2024-03-05 14:30:00.000",
            "05.03.2024/14:30",
            "05.03.2024 14:30",
            " 05.03.2024 14:30:00 ",
            "2024-03-05T14:30:00+01:00",
            "2024-03-05 14:30:00+02:00",
        ] {
            assert_eq!(parse_timestamp(s), Some(expected), "input {s:?}");
        }
        assert_eq!(
            parse_timestamp("2024-03-05").map(|t| t.hour()),
            Some(0)
        );
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("31.02.2024/10:00"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("42.5"), Some(42.5));
        assert_eq!(parse_price(" -3,25 "), Some(-3.25));
        assert_eq!(parse_price("1.234,5"), None);
        assert_eq!(parse_price("NaN"), None);
        assert_eq!(parse_price("n/a"), None);
    }

    #[test]
    fn test_derive_recovers_bad_rows() {
        let mut table = RawTable::new(cols(&["Date/Time", "Price"]));
        table.push_row(vec![text("2024-01-01 00:00"), RawCell::Number(50.0)]);
        table.push_row(vec![text("garbage"), RawCell::Number(60.0)]);
        table.push_row(vec![text("01.01.2024/02:00"), text("70")]);
        table.push_row(vec![text("2024-01-01 03:00"), RawCell::Null]);
        table.push_row(vec![RawCell::Null, RawCell::Number(80.0)]);

        let d = derive(&table).unwrap();
        assert_eq!(d.total_rows, 5);
        assert_eq!(d.dataset.len(), 2);
        assert_eq!(d.unparseable_timestamps(), 2);
        assert_eq!(d.invalid_prices(), 1);
        assert_eq!(
            d.issues[0],
            RowIssue {
                row: 1,
                kind: RowIssueKind::UnparseableTimestamp("garbage".into())
            }
        );
        let hours: Vec<u32> = d.dataset.iter().map(|o| o.features().hour).collect();
        assert_eq!(hours, vec![0, 2]);
    }

    #[test]
    fn test_derive_epoch_millis() {
        let mut table = RawTable::new(cols(&["time", "price"]));
        // 2024-01-01T00:00:00Z
        table.push_row(vec![RawCell::Number(1_704_067_200_000.0), RawCell::Number(1.0)]);
        let d = derive(&table).unwrap();
        let f = d.dataset.get(0).unwrap().features();
        assert_eq!((f.year, f.month, f.week), (2024, 1, 1));
    }

    #[test]
    fn test_derive_rejects_serials_and_epoch_seconds() {
        let mut table = RawTable::new(cols(&["time", "price"]));
        table.push_row(vec![RawCell::Number(45292.0), RawCell::Number(1.0)]);
        table.push_row(vec![RawCell::Number(1_704_067_200.0), RawCell::Number(2.0)]);
        table.push_row(vec![RawCell::Number(1_704_067_200_000.0), RawCell::Number(3.0)]);
        let d = derive(&table).unwrap();
        assert_eq!(d.dataset.len(), 1);
        assert_eq!(d.unparseable_timestamps(), 2);
        assert_eq!(d.issues[0].row, 0);
        assert_eq!(d.dataset.get(0).unwrap().price(), 3.0);
    }

    #[test]
    fn test_derive_schema_error_aborts() {
        let table = RawTable::new(cols(&["a", "b"]));
        assert!(derive(&table).is_err());
    }
}
