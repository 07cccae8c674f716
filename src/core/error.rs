use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweepError {
    #[error("Invalid {axis} range: {reason}")]
    InvalidRange { axis: &'static str, reason: String },

    #[error("Invalid selection: row {index} is outside 0..{row_count}")]
    InvalidSelection { index: i64, row_count: usize },

    #[error("Sweep too large: {scenarios} scenarios exceeds the limit of {limit}")]
    TooLarge { scenarios: usize, limit: usize },
}
