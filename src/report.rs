use serde::Serialize;

use crate::config::ExplorerConfig;
use crate::data::aggregate::{
    GroupMean, PriceSummary, apply_markup, group_mean, group_mean_by, mean_price,
    mean_price_at_or_above, price_quantile, price_summary,
};
use crate::data::filter::FilteredDataset;
use crate::data::model::{Dimension, DimensionValue, FilterOptions, Observation};
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Report – everything a presentation layer needs from one evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowCounts {
    /// Data rows in the source table.
    pub loaded: usize,
    pub unparseable_timestamps: usize,
    pub invalid_prices: usize,
    pub excluded_by_window: usize,
    pub matched: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupEntry {
    pub label: String,
    pub key: DimensionValue,
    pub mean_price: f64,
    pub marked_up_price: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSeries {
    pub dimension: Dimension,
    pub entries: Vec<GroupEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossGroupEntry {
    pub labels: Vec<String>,
    pub keys: Vec<DimensionValue>,
    pub mean_price: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossGroupSeries {
    pub dimensions: Vec<Dimension>,
    pub entries: Vec<CrossGroupEntry>,
}

/// Mean of the rows at or above a price quantile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HighPriceStats {
    pub quantile: f64,
    pub threshold: f64,
    pub mean_price: f64,
    pub marked_up_price: f64,
    pub count: usize,
}

/// Serialisable result of one evaluation.
///
/// An empty selection is a regular report: `rows.matched == 0`, the price
/// fields are `None` and the group series are empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub rows: RowCounts,
    pub markup_fraction: f64,
    pub mean_price: Option<f64>,
    pub marked_up_price: Option<f64>,
    pub summary: Option<PriceSummary>,
    pub groups: Vec<GroupSeries>,
    pub cross_groups: Option<CrossGroupSeries>,
    pub high_price: Option<HighPriceStats>,
    pub preview: Vec<Observation>,
    /// Values available for selection after the anomaly window is applied.
    pub options: FilterOptions,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.rows.matched == 0
    }

    /// Aggregate `view` according to `config`. `rows` must already carry
    /// the load and exclusion counts; `matched` is filled in here.
    pub fn build(
        mut rows: RowCounts,
        view: &FilteredDataset<'_>,
        config: &ExplorerConfig,
    ) -> EngineResult<Report> {
        rows.matched = view.len();
        let markup = config.markup_fraction;

        let summary = empty_as_none(price_summary(view.iter()))?;
        let mean = empty_as_none(mean_price(view.iter()))?;

        let groups = config
            .group_by
            .iter()
            .map(|&dimension| GroupSeries {
                dimension,
                entries: group_mean(view.iter(), dimension)
                    .into_iter()
                    .map(|g| group_entry(g, markup))
                    .collect(),
            })
            .collect();

        let cross_groups = (!config.cross_group_by.is_empty()).then(|| CrossGroupSeries {
            dimensions: config.cross_group_by.clone(),
            entries: group_mean_by(view.iter(), &config.cross_group_by)
                .into_iter()
                .map(|g| CrossGroupEntry {
                    labels: g.keys.iter().map(|k| k.to_string()).collect(),
                    keys: g.keys,
                    mean_price: g.mean,
                    count: g.count,
                })
                .collect(),
        });

        let high_price = match config.high_price_quantile {
            Some(q) => high_price_stats(view, q, markup)?,
            None => None,
        };

        Ok(Report {
            rows,
            markup_fraction: markup,
            mean_price: mean,
            marked_up_price: mean.map(|m| apply_markup(m, markup)),
            summary,
            groups,
            cross_groups,
            high_price,
            preview: view.iter().take(config.preview_rows).copied().collect(),
            options: view.parent().options().clone(),
        })
    }
}

fn group_entry(g: GroupMean, markup: f64) -> GroupEntry {
    GroupEntry {
        label: g.key.to_string(),
        key: g.key,
        mean_price: g.mean,
        marked_up_price: apply_markup(g.mean, markup),
        count: g.count,
    }
}

fn high_price_stats(
    view: &FilteredDataset<'_>,
    quantile: f64,
    markup: f64,
) -> EngineResult<Option<HighPriceStats>> {
    let Some(threshold) = empty_as_none(price_quantile(view.iter(), quantile))? else {
        return Ok(None);
    };
    let mean = mean_price_at_or_above(view.iter(), threshold)?;
    Ok(Some(HighPriceStats {
        quantile,
        threshold,
        mean_price: mean,
        marked_up_price: apply_markup(mean, markup),
        count: view.iter().filter(|o| o.price() >= threshold).count(),
    }))
}

/// An empty selection is data, not a failure.
fn empty_as_none<T>(result: EngineResult<T>) -> EngineResult<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(EngineError::EmptyDataset) => Ok(None),
        Err(e) => Err(e),
    }
}
