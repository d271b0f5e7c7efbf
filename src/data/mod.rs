//! Data layer: core types, loading, feature derivation, cleaning, filtering
//! and aggregation.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → RawTable
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ features  │  schema mapping, timestamps → Observation + TimeFeatures
//!   └──────────┘     (classify: season / day-night / weekend)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ cleaner   │  drop an anomaly window → Dataset
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  apply predicates → FilteredDataset (indices)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ aggregate │  mean, grouped means, markup
//!   └──────────┘
//! ```

pub mod aggregate;
pub mod classify;
pub mod cleaner;
pub mod features;
pub mod filter;
pub mod loader;
pub mod model;
