use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, TimeUnit, TimestampMicrosecondType};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::features::{Derivation, SchemaMapping, derive_dataset};
use super::model::{RawCell, RawTable};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a price table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – string, numeric or native timestamp columns
/// * `.json`    – `[{ "Date/Time": "...", "Price": 42.0, ... }, ...]`
/// * `.csv`     – header row required, `,` or `;` separated
/// * `.xlsx` / `.xls` – first worksheet, header in the first row
///
/// All columns are kept; picking the timestamp and price columns happens in
/// [`SchemaMapping`].
pub fn load_file(path: &Path) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        "xlsx" | "xlsm" | "xls" => load_workbook(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Load a file, map its columns and derive the dataset.
///
/// `timestamp_column` / `price_column` override detection when given. A
/// schema failure is returned as a [`crate::error::SchemaError`] inside the
/// `anyhow::Error`, so callers can downcast it.
pub fn load_dataset(
    path: &Path,
    timestamp_column: Option<&str>,
    price_column: Option<&str>,
) -> Result<Derivation> {
    let table = load_file(path).with_context(|| format!("loading {}", path.display()))?;
    let mapping = SchemaMapping::resolve(&table.columns, timestamp_column, price_column)?;
    let derivation = derive_dataset(&table, mapping)?;
    log::info!(
        "Loaded {} observations from {} ({} rows dropped)",
        derivation.dataset.len(),
        path.display(),
        derivation.issues.len()
    );
    Ok(derivation)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `to_json(orient='records')`):
///
/// ```json
/// [
///   { "Date/Time CET/CEST": "2024-01-01 00:00", "Energy Price [EUR/MWh]": 71.3 },
///   ...
/// ]
/// ```
///
/// Numeric timestamps are read as epoch milliseconds.
fn load_json(path: &Path) -> Result<RawTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    // Column order: first appearance across records.
    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = RawTable::new(columns);
    for rec in records {
        // Checked to be an object above.
        let Some(obj) = rec.as_object() else { continue };
        let row = table
            .columns
            .iter()
            .map(|col| obj.get(col).map(json_to_cell).unwrap_or(RawCell::Null))
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

fn json_to_cell(val: &JsonValue) -> RawCell {
    match val {
        JsonValue::String(s) => RawCell::Text(s.clone()),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) => RawCell::Number(f),
            None => RawCell::Text(n.to_string()),
        },
        JsonValue::Null => RawCell::Null,
        other => RawCell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one observation per row.
/// European exports separated by `;` are detected from the header line.
fn load_csv(path: &Path) -> Result<RawTable> {
    let text = std::fs::read_to_string(path).context("reading CSV file")?;
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = RawTable::new(headers);

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = record.iter().map(guess_cell_type).collect();
        table.push_row(row);
    }

    Ok(table)
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn guess_cell_type(s: &str) -> RawCell {
    let s = s.trim();
    if s.is_empty() {
        return RawCell::Null;
    }
    if let Ok(f) = s.parse::<f64>() {
        return RawCell::Number(f);
    }
    RawCell::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// Workbook loader
// ---------------------------------------------------------------------------

/// Read the first worksheet of an Excel workbook. Date-formatted cells come
/// through as [`RawCell::DateTime`], numbers as [`RawCell::Number`].
fn load_workbook(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .context("reading first worksheet")?;

    let mut rows = range.rows();
    let header = rows.next().context("first worksheet is empty")?;
    let columns = header.iter().map(|c| c.to_string().trim().to_string()).collect();

    let mut table = RawTable::new(columns);
    for row in rows {
        table.push_row(row.iter().map(workbook_cell).collect());
    }
    Ok(table)
}

fn workbook_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) => RawCell::Null,
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(RawCell::DateTime)
            .unwrap_or(RawCell::Null),
        Data::String(s) | Data::DateTimeIso(s) => guess_cell_type(s),
        other => RawCell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing a price table.
///
/// Column types:
/// - `Timestamp` / `Date32` / `Date64`: read natively. A fixed-offset
///   timezone (`+01:00`) or a named zone (`Europe/Berlin`, DST aware) is
///   converted to local wall-clock time.
/// - numeric: read as `f64`
/// - anything else: cast to text
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;

    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut table = RawTable::new(columns);

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;

        let column_cells: Vec<Vec<RawCell>> = batch
            .columns()
            .iter()
            .zip(table.columns.iter())
            .map(|(col, name)| {
                column_to_cells(col).with_context(|| format!("reading column '{name}'"))
            })
            .collect::<Result<_>>()?;

        for row in 0..batch.num_rows() {
            let cells = column_cells
                .iter()
                .map(|col| col.get(row).cloned().unwrap_or(RawCell::Null))
                .collect();
            table.push_row(cells);
        }
    }

    Ok(table)
}

// -- Parquet / Arrow helpers --

/// Convert one Arrow column into cells.
fn column_to_cells(col: &ArrayRef) -> Result<Vec<RawCell>> {
    match col.data_type() {
        DataType::Timestamp(_, tz) => {
            let zone = tz.as_deref().and_then(column_zone);
            timestamp_cells(col, zone)
        }
        DataType::Date32 | DataType::Date64 => timestamp_cells(col, None),
        dt if dt.is_numeric() => {
            let floats = cast(col, &DataType::Float64).context("casting to Float64")?;
            let arr = floats.as_primitive::<Float64Type>();
            Ok((0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        RawCell::Null
                    } else {
                        RawCell::Number(arr.value(i))
                    }
                })
                .collect())
        }
        _ => {
            let strings = cast(col, &DataType::Utf8).context("casting to Utf8")?;
            let arr = strings.as_string::<i32>();
            Ok((0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        RawCell::Null
                    } else {
                        RawCell::Text(arr.value(i).to_string())
                    }
                })
                .collect())
        }
    }
}

fn timestamp_cells(col: &ArrayRef, zone: Option<ColumnZone>) -> Result<Vec<RawCell>> {
    let micros = cast(col, &DataType::Timestamp(TimeUnit::Microsecond, None))
        .context("casting to Timestamp(us)")?;
    let arr = micros.as_primitive::<TimestampMicrosecondType>();
    Ok((0..arr.len())
        .map(|i| {
            if arr.is_null(i) {
                return RawCell::Null;
            }
            DateTime::from_timestamp_micros(arr.value(i))
                .map(|utc| local_wall_clock(utc.naive_utc(), zone))
                .map(RawCell::DateTime)
                .unwrap_or(RawCell::Null)
        })
        .collect())
}

/// Time zone attached to an Arrow timestamp column.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnZone {
    Fixed(FixedOffset),
    Named(Tz),
}

/// `+01:00` style offsets first, then IANA names such as `Europe/Berlin`.
fn column_zone(tz: &str) -> Option<ColumnZone> {
    if let Ok(offset) = tz.parse::<FixedOffset>() {
        return Some(ColumnZone::Fixed(offset));
    }
    match tz.parse::<Tz>() {
        Ok(zone) => Some(ColumnZone::Named(zone)),
        Err(_) => {
            log::warn!("Unknown timezone '{tz}'; reading timestamps as UTC");
            None
        }
    }
}

fn local_wall_clock(utc: NaiveDateTime, zone: Option<ColumnZone>) -> NaiveDateTime {
    match zone {
        Some(ColumnZone::Fixed(off)) => utc + off,
        Some(ColumnZone::Named(tz)) => tz.from_utc_datetime(&utc).naive_local(),
        None => utc,
    }
}
