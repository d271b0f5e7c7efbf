use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;

use energy_explorer::data::cleaner::AnomalyWindow;
use energy_explorer::{
    DayPeriod, Dimension, ExplorerConfig, HourSelection, Season, Session, WeekPart,
};

/// Filter an energy price table by calendar features and print the
/// aggregated report as JSON.
#[derive(Debug, Parser)]
#[command(name = "energy-explorer", version)]
struct Args {
    /// Price table (.csv, .json, .parquet, .xlsx)
    input: PathBuf,

    /// JSON configuration; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    timestamp_column: Option<String>,

    #[arg(long)]
    price_column: Option<String>,

    /// Inclusive hour range, e.g. `8-19`
    #[arg(long, conflicts_with = "hours")]
    hour_range: Option<IntRange>,

    /// Exact hours, e.g. `7,8,17,18`
    #[arg(long, value_delimiter = ',')]
    hours: Option<Vec<u32>>,

    /// Months 1-12
    #[arg(long, value_delimiter = ',')]
    months: Option<Vec<u32>>,

    /// Weekdays 0-6, Monday = 0
    #[arg(long, value_delimiter = ',')]
    weekdays: Option<Vec<u32>>,

    /// ISO week numbers 1-53
    #[arg(long, value_delimiter = ',')]
    weeks: Option<Vec<u32>>,

    #[arg(long, value_delimiter = ',')]
    seasons: Option<Vec<Season>>,

    #[arg(long, value_delimiter = ',')]
    years: Option<Vec<i32>>,

    #[arg(long, value_delimiter = ',')]
    day_periods: Option<Vec<DayPeriod>>,

    #[arg(long, value_delimiter = ',')]
    week_parts: Option<Vec<WeekPart>>,

    /// Exclude `YEAR:FIRST-LAST` months, e.g. `2022:3-9`
    #[arg(long, value_parser = parse_window)]
    exclude: Option<AnomalyWindow>,

    /// Markup as a fraction (0.2 = +20 %)
    #[arg(long, allow_hyphen_values = true, conflicts_with = "markup_percent")]
    markup: Option<f64>,

    /// Markup in percent (20 = +20 %)
    #[arg(long, allow_hyphen_values = true)]
    markup_percent: Option<f64>,

    #[arg(long, value_delimiter = ',')]
    group_by: Option<Vec<Dimension>>,

    #[arg(long, value_delimiter = ',')]
    cross_group_by: Option<Vec<Dimension>>,

    #[arg(long)]
    high_price_quantile: Option<f64>,

    #[arg(long)]
    preview_rows: Option<usize>,

    /// Single-line JSON output
    #[arg(long)]
    compact: bool,
}

/// `MIN-MAX`, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IntRange(u32, u32);

impl FromStr for IntRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lo, hi) = s
            .split_once('-')
            .ok_or_else(|| format!("expected MIN-MAX, got '{s}'"))?;
        let lo = lo.trim().parse().map_err(|e| format!("bad bound '{lo}': {e}"))?;
        let hi = hi.trim().parse().map_err(|e| format!("bad bound '{hi}': {e}"))?;
        Ok(IntRange(lo, hi))
    }
}

fn parse_window(s: &str) -> Result<AnomalyWindow, String> {
    let (year, months) = s
        .split_once(':')
        .ok_or_else(|| format!("expected YEAR:FIRST-LAST, got '{s}'"))?;
    let IntRange(start, end) = months.parse()?;
    let year = year.trim().parse().map_err(|e| format!("bad year '{year}': {e}"))?;
    AnomalyWindow::new(year, start, end).map_err(|e| e.to_string())
}

fn override_set<T: Ord + Clone>(target: &mut Option<BTreeSet<T>>, values: &Option<Vec<T>>) {
    if let Some(values) = values {
        *target = Some(values.iter().cloned().collect());
    }
}

fn build_config(args: &Args) -> Result<ExplorerConfig> {
    let mut config = match &args.config {
        Some(path) => ExplorerConfig::from_json_file(path)?,
        None => ExplorerConfig::default(),
    };

    if args.timestamp_column.is_some() {
        config.timestamp_column = args.timestamp_column.clone();
    }
    if args.price_column.is_some() {
        config.price_column = args.price_column.clone();
    }
    if let Some(window) = args.exclude {
        config.anomaly_window = Some(window);
    }

    let filters = &mut config.filters;
    if let Some(IntRange(min, max)) = args.hour_range {
        filters.hours = Some(HourSelection::Range { min, max });
    }
    if let Some(hours) = &args.hours {
        filters.hours = Some(HourSelection::Exact(hours.iter().copied().collect()));
    }
    override_set(&mut filters.months, &args.months);
    override_set(&mut filters.weekdays, &args.weekdays);
    override_set(&mut filters.weeks, &args.weeks);
    override_set(&mut filters.seasons, &args.seasons);
    override_set(&mut filters.years, &args.years);
    override_set(&mut filters.day_periods, &args.day_periods);
    override_set(&mut filters.week_parts, &args.week_parts);

    if let Some(fraction) = args.markup {
        config.markup_fraction = fraction;
    }
    if let Some(percent) = args.markup_percent {
        config.markup_fraction = percent / 100.0;
    }
    if let Some(dims) = &args.group_by {
        config.group_by = dims.clone();
    }
    if let Some(dims) = &args.cross_group_by {
        config.cross_group_by = dims.clone();
    }
    if args.high_price_quantile.is_some() {
        config.high_price_quantile = args.high_price_quantile;
    }
    if let Some(n) = args.preview_rows {
        config.preview_rows = n;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let session = Session::load(&args.input, &config)?;
    let report = session.evaluate(&config)?;
    if report.is_empty() {
        log::warn!("No data found for the selected filters.");
    }

    let json = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window() {
        assert_eq!(
            parse_window("2022:3-9").unwrap(),
            AnomalyWindow::new(2022, 3, 9).unwrap()
        );
        assert!(parse_window("2022").is_err());
        assert!(parse_window("2022:9-3").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "energy-explorer",
            "prices.csv",
            "--hour-range",
            "8-10",
            "--months",
            "1,2",
            "--seasons",
            "winter",
            "--markup-percent",
            "-10",
            "--exclude",
            "2022:3-9",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.filters.hours, Some(HourSelection::Range { min: 8, max: 10 }));
        assert_eq!(config.filters.months, Some([1, 2].into_iter().collect()));
        assert_eq!(config.filters.seasons, Some([Season::Winter].into_iter().collect()));
        assert!((config.markup_fraction + 0.1).abs() < 1e-9);
        assert!(config.anomaly_window.is_some());
        assert_eq!(config.filters.weeks, None);
    }

    #[test]
    fn test_bad_hour_range_rejected() {
        let args = Args::parse_from(["energy-explorer", "p.csv", "--hour-range", "20-8"]);
        assert!(build_config(&args).is_err());
    }
}
