use thiserror::Error;

// ---------------------------------------------------------------------------
// Schema errors – required columns cannot be mapped
// ---------------------------------------------------------------------------

/// Raised when an input table cannot be mapped onto (timestamp, price).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("no timestamp column found (expected a name containing 'date' or 'time'); columns: {columns:?}")]
    MissingTimestampColumn { columns: Vec<String> },

    #[error("no price column found (expected a name containing 'price'); columns: {columns:?}")]
    MissingPriceColumn { columns: Vec<String> },

    #[error("column '{name}' not present; columns: {columns:?}")]
    UnknownColumn { name: String, columns: Vec<String> },
}

// ---------------------------------------------------------------------------
// Domain errors – a calendar value outside its range
// ---------------------------------------------------------------------------

/// A calendar value outside the range the classifiers accept.
///
/// Derived attributes always come from a valid timestamp, so seeing one of
/// these from the pipeline points at a bug upstream, not at bad user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("month {0} outside 1..=12")]
    Month(u32),

    #[error("hour {0} outside 0..=23")]
    Hour(u32),

    #[error("weekday {0} outside 0..=6")]
    Weekday(u32),
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Aggregating over zero observations.
    #[error("cannot aggregate an empty dataset")]
    EmptyDataset,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
