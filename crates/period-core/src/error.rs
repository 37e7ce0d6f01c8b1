//! Error taxonomy shared by the layout resolver, the reconciler and
//! the `TimePeriod` transforms.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PeriodError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Format,
    Range,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    /// No known layout matched the input.
    #[error("{reason}: {input}")]
    Parse { input: String, reason: &'static str },

    /// Input parsed (or failed to) but is not in the canonical form the
    /// caller required.
    #[error("invalid {field}: {value}, should be format of {expected}")]
    Format {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Ordering or temporal bound violation.
    #[error("{0}")]
    Range(String),
}

impl PeriodError {
    pub(crate) fn unparsable(input: &str) -> Self {
        PeriodError::Parse {
            input: input.to_string(),
            reason: "no known layout matched",
        }
    }

    pub(crate) fn invalid_timestamp(input: &str) -> Self {
        PeriodError::Parse {
            input: input.to_string(),
            reason: "invalid timestamp format",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PeriodError::Parse { .. } => ErrorKind::Parse,
            PeriodError::Format { .. } => ErrorKind::Format,
            PeriodError::Range(_) => ErrorKind::Range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_the_input() {
        let err = PeriodError::unparsable("yesterday-ish");
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.to_string(), "no known layout matched: yesterday-ish");
    }

    #[test]
    fn invalid_timestamp_message() {
        let err = PeriodError::invalid_timestamp("abc");
        assert_eq!(err.to_string(), "invalid timestamp format: abc");
    }

    #[test]
    fn format_error_mentions_expected_layout() {
        let err = PeriodError::Format {
            field: "startTime",
            value: "2022/01/01".to_string(),
            expected: "YYYY-MM-DD",
        };
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(
            err.to_string(),
            "invalid startTime: 2022/01/01, should be format of YYYY-MM-DD"
        );
    }
}
