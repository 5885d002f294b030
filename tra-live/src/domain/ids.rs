//! Identifier types for stations, trains and train types.

use std::fmt;

/// Error returned when an identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {reason}")]
pub struct InvalidId {
    kind: &'static str,
    reason: &'static str,
}

/// Validate an opaque feed identifier.
///
/// Identifiers are never empty and never contain whitespace; the feed pads
/// nothing, so anything else is a malformed payload.
fn validate(s: &str, kind: &'static str) -> Result<(), InvalidId> {
    if s.is_empty() {
        return Err(InvalidId {
            kind,
            reason: "cannot be empty",
        });
    }
    if s.chars().any(char::is_whitespace) {
        return Err(InvalidId {
            kind,
            reason: "cannot contain whitespace",
        });
    }
    Ok(())
}

macro_rules! feed_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting empty or whitespace-containing input.
            pub fn parse(s: &str) -> Result<Self, InvalidId> {
                validate(s, $kind)?;
                Ok(Self(s.to_string()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

feed_id!(
    /// A station identifier as used by the feed (e.g. `"1000"` for Taipei).
    ///
    /// # Examples
    ///
    /// ```
    /// use tra_live::domain::StationId;
    ///
    /// let taipei = StationId::parse("1000").unwrap();
    /// assert_eq!(taipei.as_str(), "1000");
    ///
    /// assert!(StationId::parse("").is_err());
    /// assert!(StationId::parse("10 00").is_err());
    /// ```
    StationId,
    "station id"
);

feed_id!(
    /// A train number (e.g. `"123"`). Unique within one service day.
    TrainNo,
    "train number"
);

feed_id!(
    /// A train type identifier (e.g. `"1131"` for a local train).
    TrainTypeId,
    "train type id"
);
