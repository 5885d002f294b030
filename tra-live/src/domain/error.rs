//! Payload validation errors.
//!
//! Raised when an upstream body cannot be turned into domain types. They are
//! distinct from transport errors: the request succeeded, the data is bad.

/// A payload failed validation while being parsed into domain types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Body is not valid JSON or a required field is missing
    #[error("malformed {payload} payload: {message}")]
    Json {
        payload: &'static str,
        message: String,
    },

    /// A field is present but its value is unusable
    #[error("invalid {field} in {payload}: {value:?}")]
    InvalidField {
        payload: &'static str,
        field: &'static str,
        value: String,
    },

    /// Stop sequence numbers do not strictly increase along a route
    #[error("stop sequence of train {train} does not increase at {sequence}")]
    SequenceOrder { train: String, sequence: u32 },
}

impl ParseError {
    pub(crate) fn json(payload: &'static str, err: serde_json::Error) -> Self {
        ParseError::Json {
            payload,
            message: err.to_string(),
        }
    }

    pub(crate) fn field(payload: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        ParseError::InvalidField {
            payload,
            field,
            value: value.into(),
        }
    }
}

/// Parse one field with `parse`, reporting failures as [`ParseError::InvalidField`].
pub(crate) fn parse_field<T, E>(
    payload: &'static str,
    field: &'static str,
    value: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, ParseError> {
    parse(value).map_err(|_| ParseError::field(payload, field, value))
}
