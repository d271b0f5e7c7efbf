use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::cleaner::AnomalyWindow;
use crate::data::filter::PredicateSet;
use crate::data::model::Dimension;
use crate::error::{EngineError, EngineResult};

/// Markup applied when none is configured: 20 %.
pub const DEFAULT_MARKUP_FRACTION: f64 = 0.20;

pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// One evaluation request: what to exclude, what to keep, how to summarise.
///
/// Every field is optional in JSON:
///
/// ```json
/// {
///   "price_column": "Energy Price [EUR/MWh]",
///   "anomaly_window": { "year": 2022, "month_start": 3, "month_end": 9 },
///   "filters": { "hours": { "range": { "min": 8, "max": 19 } }, "seasons": ["Winter"] },
///   "markup_fraction": 0.2,
///   "group_by": ["hour", "month"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplorerConfig {
    /// Exact column names; detected from the header when absent.
    pub timestamp_column: Option<String>,
    pub price_column: Option<String>,

    pub anomaly_window: Option<AnomalyWindow>,
    pub filters: PredicateSet,

    /// Multiplicative markup, `0.2` = +20 %, `-0.1` = 10 % discount.
    pub markup_fraction: f64,

    /// One grouped-mean series per dimension.
    pub group_by: Vec<Dimension>,
    /// Optional combined grouping, e.g. `["season", "hour"]`.
    pub cross_group_by: Vec<Dimension>,

    pub preview_rows: usize,

    /// When set, the report includes the price at this quantile and the
    /// mean of the rows at or above it.
    pub high_price_quantile: Option<f64>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            timestamp_column: None,
            price_column: None,
            anomaly_window: None,
            filters: PredicateSet::default(),
            markup_fraction: DEFAULT_MARKUP_FRACTION,
            group_by: vec![
                Dimension::Hour,
                Dimension::Weekday,
                Dimension::Month,
                Dimension::Season,
            ],
            cross_group_by: Vec::new(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            high_price_quantile: None,
        }
    }
}

impl ExplorerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ExplorerConfig = serde_json::from_str(text).context("parsing config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in config {}", path.display()))
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.markup_fraction.is_finite() {
            return Err(EngineError::Config(format!(
                "markup fraction {} is not a finite number",
                self.markup_fraction
            )));
        }
        if let Some(q) = self.high_price_quantile {
            if !(0.0..=1.0).contains(&q) {
                return Err(EngineError::Config(format!(
                    "high price quantile {q} outside 0..=1"
                )));
            }
        }
        if let Some(window) = &self.anomaly_window {
            window.validate()?;
        }
        self.filters.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::HourSelection;
    use crate::data::model::Season;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = ExplorerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ExplorerConfig::default());
        assert_eq!(config.markup_fraction, 0.20);
        assert!(config.filters.is_unrestricted());
        assert!(config.anomaly_window.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = ExplorerConfig::from_json_str(
            r#"{
                "price_column": "Energy Price [EUR/MWh]",
                "anomaly_window": { "year": 2022, "month_start": 3, "month_end": 9 },
                "filters": {
                    "hours": { "range": { "min": 8, "max": 19 } },
                    "seasons": ["Winter", "Autumn"],
                    "months": []
                },
                "markup_fraction": -0.1,
                "group_by": ["hour", "day_period"],
                "cross_group_by": ["season", "hour"],
                "high_price_quantile": 0.75
            }"#,
        )
        .unwrap();
        assert_eq!(config.anomaly_window, Some(AnomalyWindow::new(2022, 3, 9).unwrap()));
        assert_eq!(
            config.filters.hours,
            Some(HourSelection::Range { min: 8, max: 19 })
        );
        assert!(config.filters.seasons.as_ref().unwrap().contains(&Season::Autumn));
        assert_eq!(config.filters.months.as_ref().map(|m| m.len()), Some(0));
        assert_eq!(config.group_by, vec![Dimension::Hour, Dimension::DayPeriod]);
        assert_eq!(config.cross_group_by.len(), 2);
        assert_eq!(config.markup_fraction, -0.1);
    }

    #[test]
    fn test_invalid_configs() {
        for text in [
            r#"{"high_price_quantile": 2.0}"#,
            r#"{"anomaly_window": {"year": 2022, "month_start": 9, "month_end": 3}}"#,
            r#"{"filters": {"months": [13]}}"#,
            r#"{"markup": 0.2}"#,
            r#"{"group_by": ["minute"]}"#,
        ] {
            assert!(ExplorerConfig::from_json_str(text).is_err(), "{text}");
        }
    }
}
