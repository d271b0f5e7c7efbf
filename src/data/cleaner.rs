use serde::{Deserialize, Serialize};

use super::model::{Dataset, Observation};
use crate::error::{EngineError, EngineResult};

/// A span of months in one calendar year to leave out of every aggregate,
/// e.g. `{ year: 2022, month_start: 3, month_end: 9 }` for a price shock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyWindow {
    pub year: i32,
    pub month_start: u32,
    pub month_end: u32,
}

impl AnomalyWindow {
    pub fn new(year: i32, month_start: u32, month_end: u32) -> EngineResult<Self> {
        let window = AnomalyWindow {
            year,
            month_start,
            month_end,
        };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> EngineResult<()> {
        for m in [self.month_start, self.month_end] {
            if !(1..=12).contains(&m) {
                return Err(EngineError::Config(format!(
                    "anomaly window month {m} outside 1..=12"
                )));
            }
        }
        if self.month_start > self.month_end {
            return Err(EngineError::Config(format!(
                "anomaly window starts after it ends ({}..{})",
                self.month_start, self.month_end
            )));
        }
        Ok(())
    }

    /// Both month bounds are inclusive.
    pub fn contains(&self, obs: &Observation) -> bool {
        let f = obs.features();
        f.year == self.year && (self.month_start..=self.month_end).contains(&f.month)
    }

    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        exclude_anomaly_window(dataset, self.year, self.month_start, self.month_end)
    }
}

/// Return a new dataset without the observations of `year` whose month lies
/// in `month_start..=month_end`. The input is left untouched and a second
/// application removes nothing. An inverted range removes nothing.
pub fn exclude_anomaly_window(
    dataset: &Dataset,
    year: i32,
    month_start: u32,
    month_end: u32,
) -> Dataset {
    let kept: Vec<Observation> = dataset
        .iter()
        .filter(|obs| {
            let f = obs.features();
            !(f.year == year && (month_start..=month_end).contains(&f.month))
        })
        .copied()
        .collect();

    let removed = dataset.len() - kept.len();
    if removed > 0 {
        log::info!("Excluded {removed} observations in {year}-{month_start:02}..{year}-{month_end:02}");
    }
    Dataset::from_observations(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(y: i32, m: u32, d: u32, price: f64) -> Observation {
        let ts = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Observation::new(ts, price).unwrap()
    }

    fn fixture() -> Dataset {
        Dataset::from_observations(vec![
            obs(2022, 2, 28, 1.0),
            obs(2022, 3, 1, 2.0),
            obs(2022, 9, 30, 3.0),
            obs(2022, 10, 1, 4.0),
            obs(2023, 5, 1, 5.0),
        ])
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let cleaned = exclude_anomaly_window(&fixture(), 2022, 3, 9);
        let prices: Vec<f64> = cleaned.iter().map(|o| o.price()).collect();
        assert_eq!(prices, vec![1.0, 4.0, 5.0]);
    }

    #[test]
    fn test_idempotent_and_non_destructive() {
        let ds = fixture();
        let once = exclude_anomaly_window(&ds, 2022, 3, 9);
        let twice = exclude_anomaly_window(&once, 2022, 3, 9);
        assert_eq!(once.observations(), twice.observations());
        assert_eq!(ds.len(), 5);
    }

    #[test]
    fn test_other_years_untouched() {
        let cleaned = exclude_anomaly_window(&fixture(), 2021, 1, 12);
        assert_eq!(cleaned.len(), 5);
    }

    #[test]
    fn test_window_validation() {
        assert!(AnomalyWindow::new(2022, 3, 9).is_ok());
        assert!(AnomalyWindow::new(2022, 0, 9).is_err());
        assert!(AnomalyWindow::new(2022, 3, 13).is_err());
        assert!(AnomalyWindow::new(2022, 9, 3).is_err());
    }

    #[test]
    fn test_window_apply_matches_contains() {
        let window = AnomalyWindow::new(2022, 3, 9).unwrap();
        let ds = fixture();
        let cleaned = window.apply(&ds);
        assert!(cleaned.iter().all(|o| !window.contains(o)));
        assert_eq!(ds.iter().filter(|o| window.contains(o)).count(), 2);
    }
}
