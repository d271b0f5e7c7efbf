use std::borrow::Cow;
use std::path::Path;

use anyhow::Result;

use crate::config::ExplorerConfig;
use crate::data::features::Derivation;
use crate::data::filter;
use crate::data::loader::load_dataset;
use crate::data::model::{Dataset, FilterOptions};
use crate::error::EngineResult;
use crate::report::{Report, RowCounts};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// One loaded price table, independent of any presentation layer.
///
/// The session never changes after loading. Each [`Session::evaluate`] call
/// builds its own cleaned dataset and view from the configuration it is
/// given, so a newer request simply supersedes an older one.
#[derive(Debug, Clone)]
pub struct Session {
    derivation: Derivation,
}

impl Session {
    pub fn new(derivation: Derivation) -> Self {
        Self { derivation }
    }

    /// Load `path` using the column overrides from `config`.
    pub fn load(path: &Path, config: &ExplorerConfig) -> Result<Self> {
        let derivation = load_dataset(
            path,
            config.timestamp_column.as_deref(),
            config.price_column.as_deref(),
        )?;
        Ok(Self::new(derivation))
    }

    /// The enriched dataset as loaded, before any exclusion.
    pub fn dataset(&self) -> &Dataset {
        &self.derivation.dataset
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derivation
    }

    /// Values present per dimension, for building selection widgets.
    pub fn options(&self) -> &FilterOptions {
        self.dataset().options()
    }

    /// Run clean → filter → aggregate for one configuration.
    pub fn evaluate(&self, config: &ExplorerConfig) -> EngineResult<Report> {
        config.validate()?;

        let dataset = self.dataset();
        let cleaned: Cow<'_, Dataset> = match &config.anomaly_window {
            Some(window) => Cow::Owned(window.apply(dataset)),
            None => Cow::Borrowed(dataset),
        };

        let view = filter::apply(&cleaned, &config.filters);
        if view.is_empty() {
            log::warn!("No observations match the selected filters");
        }

        let rows = RowCounts {
            loaded: self.derivation.total_rows,
            unparseable_timestamps: self.derivation.unparseable_timestamps(),
            invalid_prices: self.derivation.invalid_prices(),
            excluded_by_window: dataset.len() - cleaned.len(),
            matched: 0,
        };
        let report = Report::build(rows, &view, config)?;

        log::info!(
            "Evaluated {} of {} observations, mean price {:?}",
            report.rows.matched,
            cleaned.len(),
            report.mean_price
        );
        Ok(report)
    }
}
