use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecurrenceParseError {
    #[error("recurrence rule is missing FREQ")]
    MissingFrequency,
    #[error("unsupported recurrence frequency `{0}`")]
    UnsupportedFrequency(String),
    #[error("unknown weekday `{0}` in BYDAY")]
    UnknownWeekday(String),
    #[error("invalid UNTIL date `{0}`")]
    InvalidUntil(String),
    #[error("unknown recurrence key `{0}`")]
    UnknownKey(String),
    #[error("malformed recurrence segment `{0}`")]
    MalformedPart(String),
}

/// Raised when an occurrence cannot be placed on a day grid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("occurrence of `{activity_id}` on {date} cannot be laid out: {reason}")]
    InvalidInput {
        activity_id: String,
        date: chrono::NaiveDate,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}
