use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use clap::Parser;
use parquet::arrow::ArrowWriter;

const TIMESTAMP_COLUMN: &str = "Date/Time CET/CEST";
const PRICE_COLUMN: &str = "Energy Price [EUR/MWh]";

/// Write a deterministic hourly price series as CSV and Parquet.
#[derive(Debug, Parser)]
struct Args {
    /// First day of the series (YYYY-MM-DD)
    #[arg(long, default_value = "2022-01-01")]
    start: NaiveDate,

    #[arg(long, default_value_t = 730)]
    days: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Base level by month, daily double peak, weekend dip, and a price shock
/// from March to September 2022.
fn price_at(ts: &NaiveDateTime, rng: &mut SimpleRng) -> f64 {
    let month = ts.month();
    let hour = ts.hour() as f64;

    let seasonal = match month {
        12 | 1 | 2 => 110.0,
        3..=5 => 80.0,
        6..=8 => 70.0,
        _ => 95.0,
    };
    let morning = 25.0 * (-(hour - 8.0).powi(2) / 4.0).exp();
    let evening = 35.0 * (-(hour - 19.0).powi(2) / 5.0).exp();
    let midday_solar = -20.0 * (-(hour - 13.0).powi(2) / 6.0).exp();
    let weekend = if ts.weekday().num_days_from_monday() >= 5 { 0.8 } else { 1.0 };
    let shock = if ts.year() == 2022 && (3..=9).contains(&month) { 2.5 } else { 1.0 };

    let base = (seasonal + morning + evening + midday_solar) * weekend * shock;
    base + rng.gauss(0.0, 0.08 * base)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    let start = args
        .start
        .and_hms_opt(0, 0, 0)
        .context("start date has no midnight")?;
    let hours = i64::from(args.days) * 24;

    let timestamps: Vec<NaiveDateTime> = (0..hours).map(|h| start + Duration::hours(h)).collect();
    let prices: Vec<f64> = timestamps
        .iter()
        .map(|ts| (price_at(ts, &mut rng) * 100.0).round() / 100.0)
        .collect();

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    // CSV in the spreadsheet export layout
    let csv_path = args.out_dir.join("sample_prices.csv");
    let mut csv_writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    csv_writer.write_record([TIMESTAMP_COLUMN, PRICE_COLUMN, "Zone"])?;
    for (ts, price) in timestamps.iter().zip(&prices) {
        csv_writer.write_record([
            ts.format("%d.%m.%Y/%H:%M").to_string(),
            price.to_string(),
            "DE-LU".to_string(),
        ])?;
    }
    csv_writer.flush().context("flushing CSV")?;

    // Parquet with a native timestamp column
    let schema = Arc::new(Schema::new(vec![
        Field::new(
            TIMESTAMP_COLUMN,
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new(PRICE_COLUMN, DataType::Float64, false),
        Field::new("Zone", DataType::Utf8, false),
    ]));
    let ts_array = TimestampMicrosecondArray::from(
        timestamps
            .iter()
            .map(|ts| ts.and_utc().timestamp_micros())
            .collect::<Vec<_>>(),
    );
    let price_array = Float64Array::from(prices.clone());
    let zone_array = StringArray::from(vec!["DE-LU"; prices.len()]);

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(ts_array), Arc::new(price_array), Arc::new(zone_array)],
    )
    .context("building record batch")?;
    log::debug!("\n{}", pretty_format_batches(&[batch.slice(0, batch.num_rows().min(5))])?);

    let parquet_path = args.out_dir.join("sample_prices.parquet");
    let file = std::fs::File::create(&parquet_path)
        .with_context(|| format!("creating {}", parquet_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    println!(
        "Wrote {} hourly prices to {} and {}",
        prices.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
