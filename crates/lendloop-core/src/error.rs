//! # Core Error Types
//!
//! The error hierarchy shared by the foundational types. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations and
//! carry enough context to diagnose a failure without inspecting logs.

use thiserror::Error;

/// Errors arising from the foundational types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid monetary amount string.
    #[error("invalid monetary amount: \"{0}\"")]
    InvalidAmount(String),

    /// Amount arithmetic requires whole minor units.
    #[error("amount \"{0}\" is not a whole number of minor units")]
    FractionalAmount(String),

    /// Timestamp parsing or construction failed.
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp {
        /// The offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Identifier parsing failed.
    #[error("invalid identifier {input:?}: {reason}")]
    InvalidIdentifier {
        /// The offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_amount_display() {
        let err = CoreError::InvalidAmount("NaN".to_string());
        assert!(format!("{err}").contains("NaN"));
    }

    #[test]
    fn invalid_timestamp_display() {
        let err = CoreError::InvalidTimestamp {
            input: "yesterday".to_string(),
            reason: "not RFC 3339".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("yesterday"));
        assert!(msg.contains("RFC 3339"));
    }
}
