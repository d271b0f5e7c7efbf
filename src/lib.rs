//! Calendar-feature filtering and price aggregation for energy price tables.
//!
//! Load a table ([`data::loader`]), derive hour/weekday/week/month/season
//! attributes ([`data::features`]), drop an anomaly window
//! ([`data::cleaner`]), filter ([`data::filter`]) and aggregate
//! ([`data::aggregate`]). [`state::Session`] wires the steps together and
//! produces a serialisable [`report::Report`] for whatever draws the charts.

pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod state;

pub use config::ExplorerConfig;
pub use data::filter::{FilteredDataset, HourSelection, PredicateSet};
pub use data::model::{Dataset, DayPeriod, Dimension, DimensionValue, Observation, Season, WeekPart};
pub use error::{DomainError, EngineError, SchemaError};
pub use report::Report;
pub use state::Session;
