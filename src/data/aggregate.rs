use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{Dimension, DimensionValue, Observation};
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Mean price of one group. Groups without rows are never produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupMean {
    pub key: DimensionValue,
    pub mean: f64,
    pub count: usize,
}

/// Mean price of one combination of several dimension values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMeanBy {
    pub keys: Vec<DimensionValue>,
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, price: f64) {
        self.sum += price;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

// ---------------------------------------------------------------------------
// Means
// ---------------------------------------------------------------------------

/// Arithmetic mean (sum / count) of the prices.
///
/// Returns [`EngineError::EmptyDataset`] instead of NaN for no rows.
pub fn mean_price<'a, I>(rows: I) -> EngineResult<f64>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut acc = Accumulator::default();
    for obs in rows {
        acc.push(obs.price());
    }
    acc.mean().ok_or(EngineError::EmptyDataset)
}

/// Mean price per value of `dim`, in the dimension's natural order.
pub fn group_mean<'a, I>(rows: I, dim: Dimension) -> Vec<GroupMean>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut groups: BTreeMap<DimensionValue, Accumulator> = BTreeMap::new();
    for obs in rows {
        groups.entry(obs.value_of(dim)).or_default().push(obs.price());
    }
    groups
        .into_iter()
        .filter_map(|(key, acc)| {
            acc.mean().map(|mean| GroupMean {
                key,
                mean,
                count: acc.count,
            })
        })
        .collect()
}

/// Mean price per combination of `dims`, ordered lexicographically by the
/// keys (first dimension varies slowest).
pub fn group_mean_by<'a, I>(rows: I, dims: &[Dimension]) -> Vec<GroupMeanBy>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut groups: BTreeMap<Vec<DimensionValue>, Accumulator> = BTreeMap::new();
    for obs in rows {
        let keys = dims.iter().map(|d| obs.value_of(*d)).collect();
        groups.entry(keys).or_default().push(obs.price());
    }
    groups
        .into_iter()
        .filter_map(|(keys, acc)| {
            acc.mean().map(|mean| GroupMeanBy {
                keys,
                mean,
                count: acc.count,
            })
        })
        .collect()
}

/// `mean * (1 + fraction)`. Negative fractions are discounts.
pub fn apply_markup(mean_price: f64, markup_fraction: f64) -> f64 {
    mean_price * (1.0 + markup_fraction)
}

pub fn price_summary<'a, I>(rows: I) -> EngineResult<PriceSummary>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut acc = Accumulator::default();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for obs in rows {
        let p = obs.price();
        acc.push(p);
        min = min.min(p);
        max = max.max(p);
    }
    let mean = acc.mean().ok_or(EngineError::EmptyDataset)?;
    Ok(PriceSummary {
        count: acc.count,
        mean,
        min,
        max,
    })
}

// ---------------------------------------------------------------------------
// High-price selection
// ---------------------------------------------------------------------------

/// Price at quantile `q` (0.0..=1.0) with linear interpolation between the
/// two nearest ranks.
pub fn price_quantile<'a, I>(rows: I, q: f64) -> EngineResult<f64>
where
    I: IntoIterator<Item = &'a Observation>,
{
    if !(0.0..=1.0).contains(&q) {
        return Err(EngineError::Config(format!("quantile {q} outside 0..=1")));
    }
    let mut prices: Vec<f64> = rows.into_iter().map(|o| o.price()).collect();
    if prices.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    prices.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (prices.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Ok(prices[lo] + (prices[hi] - prices[lo]) * (pos - lo as f64))
}

/// Mean over the rows priced at or above `threshold`.
pub fn mean_price_at_or_above<'a, I>(rows: I, threshold: f64) -> EngineResult<f64>
where
    I: IntoIterator<Item = &'a Observation>,
{
    mean_price(rows.into_iter().filter(|o| o.price() >= threshold))
}
