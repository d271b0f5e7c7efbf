use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::classify::{day_or_night_of, month_name, season_of, weekday_class_of, weekday_name};
use crate::error::DomainError;

// ---------------------------------------------------------------------------
// Calendar classes
// ---------------------------------------------------------------------------

/// Meteorological season. Variant order is the natural display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

/// Day is 08:00 up to (not including) 20:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayPeriod {
    Day,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeekPart {
    Weekday,
    Weekend,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
        };
        f.write_str(s)
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" | "fall" => Ok(Season::Autumn),
            other => Err(format!("unknown season '{other}'")),
        }
    }
}

impl fmt::Display for DayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DayPeriod::Day => "Day",
            DayPeriod::Night => "Night",
        })
    }
}

impl FromStr for DayPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(DayPeriod::Day),
            "night" => Ok(DayPeriod::Night),
            other => Err(format!("unknown day period '{other}'")),
        }
    }
}

impl fmt::Display for WeekPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WeekPart::Weekday => "Weekday",
            WeekPart::Weekend => "Weekend",
        })
    }
}

impl FromStr for WeekPart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekday" => Ok(WeekPart::Weekday),
            "weekend" => Ok(WeekPart::Weekend),
            other => Err(format!("unknown week part '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeFeatures – everything derived from one timestamp
// ---------------------------------------------------------------------------

/// Calendar attributes of a timestamp.
///
/// * `weekday` counts from Monday = 0.
/// * `week` is the ISO-8601 week number, so early January can belong to
///   week 52/53 of the previous year while `year` stays the calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeFeatures {
    pub hour: u32,
    pub weekday: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub season: Season,
    pub day_period: DayPeriod,
    pub week_part: WeekPart,
}

impl TimeFeatures {
    /// Derive all attributes from `ts`. Pure: same input, same output.
    pub fn from_timestamp(ts: &NaiveDateTime) -> Result<Self, DomainError> {
        let hour = ts.hour();
        let weekday = ts.weekday().num_days_from_monday();
        let month = ts.month();
        Ok(TimeFeatures {
            hour,
            weekday,
            week: ts.iso_week().week(),
            month,
            year: ts.year(),
            season: season_of(month)?,
            day_period: day_or_night_of(hour)?,
            week_part: weekday_class_of(weekday)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Observation – one row of the price table
// ---------------------------------------------------------------------------

/// A single price observation with its derived attributes.
///
/// Fields are private so the features can only ever come from the timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    timestamp: NaiveDateTime,
    /// EUR/MWh.
    price: f64,
    #[serde(flatten)]
    features: TimeFeatures,
}

impl Observation {
    pub fn new(timestamp: NaiveDateTime, price: f64) -> Result<Self, DomainError> {
        Ok(Observation {
            timestamp,
            price,
            features: TimeFeatures::from_timestamp(&timestamp)?,
        })
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn features(&self) -> &TimeFeatures {
        &self.features
    }

    /// The value of `dim` for this observation.
    pub fn value_of(&self, dim: Dimension) -> DimensionValue {
        let f = &self.features;
        match dim {
            Dimension::Hour => DimensionValue::Hour(f.hour),
            Dimension::Weekday => DimensionValue::Weekday(f.weekday),
            Dimension::Week => DimensionValue::Week(f.week),
            Dimension::Month => DimensionValue::Month(f.month),
            Dimension::Year => DimensionValue::Year(f.year),
            Dimension::Season => DimensionValue::Season(f.season),
            Dimension::DayPeriod => DimensionValue::DayPeriod(f.day_period),
            Dimension::WeekPart => DimensionValue::WeekPart(f.week_part),
        }
    }
}

// ---------------------------------------------------------------------------
// Dimensions – the axes a dataset can be filtered or grouped on
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Hour,
    Weekday,
    Week,
    Month,
    Year,
    Season,
    DayPeriod,
    WeekPart,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::Hour,
        Dimension::Weekday,
        Dimension::Week,
        Dimension::Month,
        Dimension::Year,
        Dimension::Season,
        Dimension::DayPeriod,
        Dimension::WeekPart,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Hour => "hour",
            Dimension::Weekday => "weekday",
            Dimension::Week => "week",
            Dimension::Month => "month",
            Dimension::Year => "year",
            Dimension::Season => "season",
            Dimension::DayPeriod => "day_period",
            Dimension::WeekPart => "week_part",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Dimension::ALL
            .into_iter()
            .find(|d| d.name() == wanted)
            .ok_or_else(|| format!("unknown dimension '{s}'"))
    }
}

/// The value of one dimension. Ordering within a variant is the natural
/// order of that dimension (hours ascending, Monday first, January first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Hour(u32),
    Weekday(u32),
    Week(u32),
    Month(u32),
    Year(i32),
    Season(Season),
    DayPeriod(DayPeriod),
    WeekPart(WeekPart),
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Hour(h) => write!(f, "{h:02}:00"),
            DimensionValue::Weekday(d) => match weekday_name(*d) {
                Ok(name) => f.write_str(name),
                Err(_) => write!(f, "weekday {d}"),
            },
            DimensionValue::Week(w) => write!(f, "W{w:02}"),
            DimensionValue::Month(m) => match month_name(*m) {
                Ok(name) => f.write_str(name),
                Err(_) => write!(f, "month {m}"),
            },
            DimensionValue::Year(y) => write!(f, "{y}"),
            DimensionValue::Season(s) => write!(f, "{s}"),
            DimensionValue::DayPeriod(p) => write!(f, "{p}"),
            DimensionValue::WeekPart(p) => write!(f, "{p}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded price series
// ---------------------------------------------------------------------------

/// For each dimension the sorted set of values present in a dataset.
pub type FilterOptions = BTreeMap<Dimension, BTreeSet<DimensionValue>>;

/// The loaded observations with a pre-computed index of available values.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    observations: Vec<Observation>,
    options: FilterOptions,
}

impl Dataset {
    /// Build the dimension index from the observations. Order is kept.
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        let mut options: FilterOptions = BTreeMap::new();
        for obs in &observations {
            for dim in Dimension::ALL {
                options.entry(dim).or_default().insert(obs.value_of(dim));
            }
        }
        Dataset {
            observations,
            options,
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    /// Distinct values per dimension, for building selection widgets.
    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// RawTable – an untyped table as read from a file
// ---------------------------------------------------------------------------

/// A single cell before schema mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Text(String),
    Number(f64),
    /// Native timestamp from a typed source (e.g. a Parquet timestamp column).
    DateTime(NaiveDateTime),
    Null,
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Text(s) => write!(f, "{s}"),
            RawCell::Number(v) => write!(f, "{v}"),
            RawCell::DateTime(ts) => write!(f, "{ts}"),
            RawCell::Null => write!(f, "<null>"),
        }
    }
}

/// Rows of cells under named columns. Every row has `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        RawTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding with `Null` or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<RawCell>) {
        row.resize(self.columns.len(), RawCell::Null);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_iso_week_at_year_boundary() {
        // 2024-01-01 is a Monday: ISO week 1.
        let f = TimeFeatures::from_timestamp(&at(2024, 1, 1, 0)).unwrap();
        assert_eq!(f.week, 1);
        assert_eq!(f.weekday, 0);
        assert_eq!(f.year, 2024);

        // 2023-01-01 is a Sunday: ISO week 52 of 2022, calendar year 2023.
        let f = TimeFeatures::from_timestamp(&at(2023, 1, 1, 0)).unwrap();
        assert_eq!(f.week, 52);
        assert_eq!(f.weekday, 6);
        assert_eq!(f.year, 2023);
        assert_eq!(f.week_part, WeekPart::Weekend);
    }

    #[test]
    fn test_features_are_idempotent() {
        let ts = at(2022, 7, 15, 19);
        let a = TimeFeatures::from_timestamp(&ts).unwrap();
        let b = TimeFeatures::from_timestamp(&ts).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.season, Season::Summer);
        assert_eq!(a.day_period, DayPeriod::Day);

        let obs1 = Observation::new(ts, 10.0).unwrap();
        let obs2 = Observation::new(ts, 99.0).unwrap();
        assert_eq!(obs1.features(), obs2.features());
    }

    #[test]
    fn test_dataset_options_are_sorted_naturally() {
        let ds = Dataset::from_observations(vec![
            Observation::new(at(2024, 3, 3, 5), 1.0).unwrap(),  // Sunday
            Observation::new(at(2024, 1, 1, 23), 1.0).unwrap(), // Monday
            Observation::new(at(2024, 12, 4, 0), 1.0).unwrap(), // Wednesday
        ]);
        let weekdays: Vec<_> = ds.options()[&Dimension::Weekday].iter().copied().collect();
        assert_eq!(
            weekdays,
            vec![
                DimensionValue::Weekday(0),
                DimensionValue::Weekday(2),
                DimensionValue::Weekday(6)
            ]
        );
        let seasons: Vec<_> = ds.options()[&Dimension::Season].iter().copied().collect();
        assert_eq!(
            seasons,
            vec![
                DimensionValue::Season(Season::Winter),
                DimensionValue::Season(Season::Spring)
            ]
        );
        // Input order is untouched.
        assert_eq!(ds.get(0).unwrap().features().month, 3);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("fall".parse::<Season>().unwrap(), Season::Autumn);
        assert_eq!("Day-Period".parse::<Dimension>().unwrap(), Dimension::DayPeriod);
        assert!("decade".parse::<Dimension>().is_err());
        assert_eq!(DimensionValue::Hour(7).to_string(), "07:00");
        assert_eq!(DimensionValue::Weekday(4).to_string(), "Fri");
        assert_eq!(DimensionValue::Month(3).to_string(), "Mar");
    }
}
