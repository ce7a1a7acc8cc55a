use alloc::string::String;
use core::fmt;

use facet_core::Shape;
use facet_reflect::ReflectError;

use crate::schema::FieldKind;

/// An error raised while compiling a record type or decoding pairs into it.
#[derive(Debug)]
pub struct DecodeError {
    /// The key of the pair being processed when the error occurred, if any.
    pub key: Option<String>,

    /// What went wrong.
    pub kind: DecodeErrorKind,
}

/// The specific error that occurred.
#[derive(Debug)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The decode target is not a struct.
    InvalidTarget {
        /// Shape of the rejected target.
        shape: &'static Shape,
    },

    /// A field's type cannot be decoded from path-keyed pairs.
    UnsupportedType {
        /// Resolved name of the offending field.
        field: String,
        /// Human-readable reason.
        reason: &'static str,
    },

    /// A raw value could not be parsed as the field's kind.
    ValueParse {
        /// Kind the value was parsed as.
        kind: FieldKind,
        /// The raw value, lossily converted to text.
        value: String,
        /// Why parsing failed.
        reason: String,
    },

    /// An embedded JSON document could not be decoded.
    BlobDecode {
        /// Message from the JSON decoder.
        message: String,
    },

    /// A field is wrapped in more indirection layers than a locator can count.
    CounterOverflow {
        /// Resolved name of the offending field.
        field: String,
    },

    /// A field received no value, its type has no zero value to fall back on and
    /// its record does not implement `Default`.
    MissingValue {
        /// Name of the field as declared on the struct.
        field: &'static str,
        /// Shape of the field.
        shape: &'static Shape,
    },

    /// A record already present behind an `Option` or pointer layer could not be
    /// copied into the rebuilt layer.
    Carry {
        /// Shape of the existing record.
        shape: &'static Shape,
        /// Message from the JSON round trip.
        message: String,
    },

    /// Building the decoded value failed.
    Reflect(ReflectError),
}

impl DecodeError {
    /// Creates a new decode error that is not tied to a particular key.
    pub fn new(kind: DecodeErrorKind) -> Self {
        Self { key: None, kind }
    }

    /// Attaches the key of the pair being processed, unless one is already set.
    pub fn with_key(mut self, key: &str) -> Self {
        if self.key.is_none() {
            self.key = Some(key.into());
        }
        self
    }

    pub(crate) fn unsupported(field: &str, reason: &'static str) -> Self {
        Self::new(DecodeErrorKind::UnsupportedType {
            field: field.into(),
            reason,
        })
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} (key `{key}`)", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl core::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match &self.kind {
            DecodeErrorKind::Reflect(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::InvalidTarget { shape } => {
                write!(f, "invalid decode target `{shape}`: must be a struct")
            }
            DecodeErrorKind::UnsupportedType { field, reason } => {
                write!(f, "unsupported type for field `{field}`: {reason}")
            }
            DecodeErrorKind::ValueParse {
                kind,
                value,
                reason,
            } => {
                write!(f, "cannot parse {value:?} as {kind}: {reason}")
            }
            DecodeErrorKind::BlobDecode { message } => {
                write!(f, "invalid embedded JSON: {message}")
            }
            DecodeErrorKind::CounterOverflow { field } => {
                write!(f, "indirection depth overflow for field `{field}`")
            }
            DecodeErrorKind::MissingValue { field, shape } => {
                write!(
                    f,
                    "field `{field}` of type `{shape}` received no value and has no default"
                )
            }
            DecodeErrorKind::Carry { shape, message } => {
                write!(f, "cannot carry over the existing `{shape}`: {message}")
            }
            DecodeErrorKind::Reflect(err) => {
                write!(f, "reflection error: {err}")
            }
        }
    }
}

impl From<DecodeErrorKind> for DecodeError {
    fn from(kind: DecodeErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<ReflectError> for DecodeError {
    fn from(error: ReflectError) -> Self {
        Self::new(DecodeErrorKind::Reflect(error))
    }
}
