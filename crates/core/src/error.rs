//! Validation errors raised by the data model.

/// A malformed goal, milestone, or enum label.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was missing or blank
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Target was zero, negative or not a number
    #[error("target must be a positive number, got {0}")]
    NonPositiveTarget(f64),

    /// Custom period without both dates
    #[error("custom period requires both start_date and due_date")]
    MissingCustomWindow,

    /// Due date not after start date
    #[error("due_date must be after start_date")]
    InvertedWindow,

    /// Anything else
    #[error("{0}")]
    Invalid(String),
}
