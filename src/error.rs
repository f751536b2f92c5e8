use thiserror::Error;

/// Configuration problems detected while loading or resolving a schema.
///
/// The matching, transforming, and reconciling functions never return these;
/// they only surface at the edges where schemas and flags are read.
#[derive(Debug, Error, PartialEq)]
pub enum ImportError {
    #[error("schema '{entity}' defines field '{field}' more than once")]
    DuplicateField { entity: String, field: String },
    #[error("schema '{entity}' contains a field with an empty name")]
    EmptyFieldName { entity: String },
    #[error("natural key '{key}' is not a field of schema '{entity}'")]
    UnknownNaturalKey { entity: String, key: String },
    #[error("schema '{0}' declares no natural key; pass --key explicitly")]
    MissingNaturalKey(String),
    #[error("match threshold {0} must lie between 0 and 1")]
    InvalidThreshold(f64),
    #[error("unknown built-in schema '{name}' (available: {available})")]
    UnknownBuiltin { name: String, available: String },
}

/// Reasons an [`ImportBatch`](crate::reconcile::ImportBatch) refuses to commit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitBlocked {
    #[error("{0} record(s) share a key with an earlier record")]
    DuplicateKeys(usize),
    #[error("{0} required value(s) are missing")]
    MissingValues(usize),
}
