use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::model::{Dataset, DayPeriod, Observation, Season, WeekPart};
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Filter predicate: which values are allowed per dimension
// ---------------------------------------------------------------------------

/// Hour constraint: either an inclusive range or an explicit set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourSelection {
    Range { min: u32, max: u32 },
    Exact(BTreeSet<u32>),
}

impl HourSelection {
    pub fn matches(&self, hour: u32) -> bool {
        match self {
            HourSelection::Range { min, max } => (*min..=*max).contains(&hour),
            HourSelection::Exact(hours) => hours.contains(&hour),
        }
    }
}

/// Per-dimension selections, combined with AND.
///
/// For every dimension:
/// * `None` → no constraint, every row passes
/// * `Some(empty)` → nothing selected, every row fails
/// * `Some(set)` → the row's value must be in the set
///
/// In JSON an absent or `null` field is `None` and `[]` is `Some(empty)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredicateSet {
    pub hours: Option<HourSelection>,
    pub months: Option<BTreeSet<u32>>,
    pub weekdays: Option<BTreeSet<u32>>,
    pub weeks: Option<BTreeSet<u32>>,
    pub seasons: Option<BTreeSet<Season>>,
    pub years: Option<BTreeSet<i32>>,
    pub day_periods: Option<BTreeSet<DayPeriod>>,
    pub week_parts: Option<BTreeSet<WeekPart>>,
}

fn allows<T: Ord>(selected: &Option<BTreeSet<T>>, value: &T) -> bool {
    selected.as_ref().map_or(true, |set| set.contains(value))
}

fn check_range(name: &str, values: Option<&BTreeSet<u32>>, lo: u32, hi: u32) -> EngineResult<()> {
    if let Some(bad) = values.into_iter().flatten().find(|v| !(lo..=hi).contains(*v)) {
        return Err(EngineError::Config(format!(
            "{name} value {bad} outside {lo}..={hi}"
        )));
    }
    Ok(())
}

impl PredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hour_range(mut self, min: u32, max: u32) -> Self {
        self.hours = Some(HourSelection::Range { min, max });
        self
    }

    pub fn with_hours(mut self, hours: impl IntoIterator<Item = u32>) -> Self {
        self.hours = Some(HourSelection::Exact(hours.into_iter().collect()));
        self
    }

    pub fn with_months(mut self, months: impl IntoIterator<Item = u32>) -> Self {
        self.months = Some(months.into_iter().collect());
        self
    }

    pub fn with_weekdays(mut self, weekdays: impl IntoIterator<Item = u32>) -> Self {
        self.weekdays = Some(weekdays.into_iter().collect());
        self
    }

    pub fn with_weeks(mut self, weeks: impl IntoIterator<Item = u32>) -> Self {
        self.weeks = Some(weeks.into_iter().collect());
        self
    }

    pub fn with_seasons(mut self, seasons: impl IntoIterator<Item = Season>) -> Self {
        self.seasons = Some(seasons.into_iter().collect());
        self
    }

    pub fn with_years(mut self, years: impl IntoIterator<Item = i32>) -> Self {
        self.years = Some(years.into_iter().collect());
        self
    }

    pub fn with_day_periods(mut self, periods: impl IntoIterator<Item = DayPeriod>) -> Self {
        self.day_periods = Some(periods.into_iter().collect());
        self
    }

    pub fn with_week_parts(mut self, parts: impl IntoIterator<Item = WeekPart>) -> Self {
        self.week_parts = Some(parts.into_iter().collect());
        self
    }

    /// True when no dimension is constrained.
    pub fn is_unrestricted(&self) -> bool {
        self == &PredicateSet::default()
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        let f = obs.features();
        self.hours.as_ref().map_or(true, |h| h.matches(f.hour))
            && allows(&self.months, &f.month)
            && allows(&self.weekdays, &f.weekday)
            && allows(&self.weeks, &f.week)
            && allows(&self.seasons, &f.season)
            && allows(&self.years, &f.year)
            && allows(&self.day_periods, &f.day_period)
            && allows(&self.week_parts, &f.week_part)
    }

    /// Reject selections that can never match because they are out of range.
    pub fn validate(&self) -> EngineResult<()> {
        match &self.hours {
            Some(HourSelection::Range { min, max }) => {
                if *max > 23 || min > max {
                    return Err(EngineError::Config(format!(
                        "hour range {min}..={max} is not within 0..=23"
                    )));
                }
            }
            Some(HourSelection::Exact(hours)) => {
                check_range("hour", Some(hours), 0, 23)?;
            }
            None => {}
        }
        check_range("month", self.months.as_ref(), 1, 12)?;
        check_range("weekday", self.weekdays.as_ref(), 0, 6)?;
        check_range("week", self.weeks.as_ref(), 1, 53)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FilteredDataset – a read-only view into a Dataset
// ---------------------------------------------------------------------------

/// The rows of `parent` that passed a filter, in their original order.
#[derive(Debug, Clone)]
pub struct FilteredDataset<'a> {
    parent: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> FilteredDataset<'a> {
    /// A view containing every row of `parent`.
    pub fn all(parent: &'a Dataset) -> Self {
        FilteredDataset {
            parent,
            indices: (0..parent.len()).collect(),
        }
    }

    pub fn parent(&self) -> &'a Dataset {
        self.parent
    }

    /// Positions of the matching rows in the parent dataset.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Observation> + '_ {
        let parent = self.parent;
        self.indices
            .iter()
            .filter_map(move |&i| parent.get(i))
    }

    /// Narrow this view further; the parent stays the same.
    pub fn refine(&self, predicates: &PredicateSet) -> FilteredDataset<'a> {
        let parent = self.parent;
        FilteredDataset {
            parent,
            indices: self
                .indices
                .iter()
                .copied()
                .filter(|&i| parent.get(i).is_some_and(|obs| predicates.matches(obs)))
                .collect(),
        }
    }

    /// Copy the matching rows into a standalone dataset.
    pub fn to_dataset(&self) -> Dataset {
        Dataset::from_observations(self.iter().copied().collect())
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Return the view of `dataset` rows that pass all active predicates.
///
/// No match is a normal outcome: the view is simply empty.
pub fn apply<'a>(dataset: &'a Dataset, predicates: &PredicateSet) -> FilteredDataset<'a> {
    let view = FilteredDataset::all(dataset).refine(predicates);
    log::debug!("Filter kept {} of {} observations", view.len(), dataset.len());
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(y: i32, m: u32, d: u32, h: u32, price: f64) -> Observation {
        let ts = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap();
        Observation::new(ts, price).unwrap()
    }

    /// 2024-01-08 is a Monday in ISO week 2.
    fn five_rows() -> Dataset {
        Dataset::from_observations(vec![
            obs(2024, 1, 8, 7, 1.0),
            obs(2024, 1, 8, 8, 2.0),
            obs(2024, 2, 5, 9, 3.0),
            obs(2024, 1, 13, 10, 4.0),
            obs(2024, 1, 9, 11, 5.0),
        ])
    }

    fn prices(view: &FilteredDataset<'_>) -> Vec<f64> {
        view.iter().map(|o| o.price()).collect()
    }

    #[test]
    fn test_conjunction_hour_range_and_month() {
        let ds = five_rows();
        let p = PredicateSet::new().with_hour_range(8, 10).with_months([1]);
        let view = apply(&ds, &p);
        assert_eq!(prices(&view), vec![2.0, 4.0]);
        assert_eq!(view.indices(), &[1, 3]);
        assert!(view
            .iter()
            .all(|o| (8..=10).contains(&o.features().hour) && o.features().month == 1));
    }

    #[test]
    fn test_unrestricted_passes_everything() {
        let ds = five_rows();
        let p = PredicateSet::new();
        assert!(p.is_unrestricted());
        assert_eq!(apply(&ds, &p).len(), 5);
    }

    #[test]
    fn test_empty_selection_matches_nothing_for_every_dimension() {
        let ds = five_rows();
        let cases = [
            PredicateSet::new().with_hours([]),
            PredicateSet::new().with_months([]),
            PredicateSet::new().with_weekdays([]),
            PredicateSet::new().with_weeks([]),
            PredicateSet::new().with_seasons([]),
            PredicateSet::new().with_years([]),
            PredicateSet::new().with_day_periods([]),
            PredicateSet::new().with_week_parts([]),
        ];
        for p in cases {
            assert!(!p.is_unrestricted());
            assert!(apply(&ds, &p).is_empty(), "{p:?}");
        }
    }

    #[test]
    fn test_exact_hours_and_calendar_sets() {
        let ds = five_rows();
        let p = PredicateSet::new().with_hours([7, 11]);
        assert_eq!(prices(&apply(&ds, &p)), vec![1.0, 5.0]);

        let p = PredicateSet::new().with_weekdays([5]);
        assert_eq!(prices(&apply(&ds, &p)), vec![4.0]);

        let p = PredicateSet::new().with_weeks([6]);
        assert_eq!(prices(&apply(&ds, &p)), vec![3.0]);

        let p = PredicateSet::new()
            .with_seasons([Season::Winter])
            .with_day_periods([DayPeriod::Night]);
        assert_eq!(prices(&apply(&ds, &p)), vec![1.0]);

        let p = PredicateSet::new().with_week_parts([WeekPart::Weekend]);
        assert_eq!(prices(&apply(&ds, &p)), vec![4.0]);
    }

    #[test]
    fn test_refine_keeps_parent_and_order() {
        let ds = five_rows();
        let view = apply(&ds, &PredicateSet::new().with_months([1]));
        let narrowed = view.refine(&PredicateSet::new().with_hour_range(10, 23));
        assert_eq!(prices(&narrowed), vec![4.0, 5.0]);
        assert_eq!(ds.len(), 5);
        assert_eq!(narrowed.to_dataset().len(), 2);
    }

    #[test]
    fn test_json_convention() {
        let p: PredicateSet = serde_json::from_str(r#"{"months": [], "weeks": null}"#).unwrap();
        assert_eq!(p.months, Some(BTreeSet::new()));
        assert_eq!(p.weeks, None);
        assert_eq!(p.hours, None);

        let p: PredicateSet =
            serde_json::from_str(r#"{"hours": {"range": {"min": 8, "max": 10}}, "seasons": ["Winter"]}"#)
                .unwrap();
        assert_eq!(p.hours, Some(HourSelection::Range { min: 8, max: 10 }));

        let p: PredicateSet = serde_json::from_str(r#"{"hours": {"exact": [1, 2]}}"#).unwrap();
        assert!(p.hours.unwrap().matches(2));

        assert!(serde_json::from_str::<PredicateSet>(r#"{"month": [1]}"#).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(PredicateSet::new().with_hour_range(8, 10).validate().is_ok());
        assert!(PredicateSet::new().with_hour_range(10, 8).validate().is_err());
        assert!(PredicateSet::new().with_hour_range(0, 24).validate().is_err());
        assert!(PredicateSet::new().with_hours([24]).validate().is_err());
        assert!(PredicateSet::new().with_months([0]).validate().is_err());
        assert!(PredicateSet::new().with_weekdays([7]).validate().is_err());
        assert!(PredicateSet::new().with_weeks([54]).validate().is_err());
        assert!(PredicateSet::new().with_months([]).validate().is_ok());
    }
}
