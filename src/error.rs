//! Error handling for the binding.
//!
//! Native calls report failure through a status code; the human-readable
//! message is fetched afterwards, either from the owning context's last-error
//! slot or from an out-of-band error object for context-less calls.

use std::fmt;
use thiserror::Error;

use crate::sys;

/// Status codes returned by the native C API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Success
    Ok,
    /// Generic failure; details are in the error message
    Err,
    /// The engine ran out of memory
    Oom,
    /// A status code this binding does not know
    Unknown(i32),
}

impl ErrorCode {
    /// Map a raw `capi_return_t` to an error code.
    pub fn from_status(status: sys::capi_return_t) -> Self {
        match status {
            sys::TILEDB_OK => Self::Ok,
            sys::TILEDB_ERR => Self::Err,
            sys::TILEDB_OOM => Self::Oom,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Err => f.write_str("error"),
            Self::Oom => f.write_str("out of memory"),
            Self::Unknown(code) => write!(f, "unknown status {code}"),
        }
    }
}

/// Errors returned by every fallible operation in this crate.
///
/// Using a handle after it was freed is not represented here: it is a
/// contract violation and panics.
#[derive(Debug, Error)]
pub enum Error {
    /// A native allocation call failed and no handle was created.
    #[error("failed to allocate {kind}: {message}")]
    Allocation { kind: &'static str, message: String },

    /// A native call on a live handle failed.
    #[error("{operation}: {message} ({code})")]
    Operation {
        operation: String,
        code: ErrorCode,
        message: String,
    },

    /// A value of the wrong type was supplied; no native call was made.
    #[error("{operation}: expected {expected} value, got {actual}")]
    TypeMismatch {
        operation: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// An argument could not be marshalled for the native call.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The object is not in a state that allows the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// JSON produced by the engine could not be decoded.
    #[error("failed to decode engine JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The native status code, for errors that came from a native call.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Operation { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The engine's own message, when there is one.
    pub fn native_message(&self) -> Option<&str> {
        match self {
            Self::Allocation { message, .. } | Self::Operation { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::from_status(0), ErrorCode::Ok);
        assert_eq!(ErrorCode::from_status(-1), ErrorCode::Err);
        assert_eq!(ErrorCode::from_status(-2), ErrorCode::Oom);
        assert_eq!(ErrorCode::from_status(7), ErrorCode::Unknown(7));
    }

    #[test]
    fn test_operation_display_keeps_context() {
        let err = Error::Operation {
            operation: "get attribute 'temperature'".into(),
            code: ErrorCode::Err,
            message: "Attribute does not exist".into(),
        };
        let text = err.to_string();
        assert!(text.contains("temperature"));
        assert!(text.contains("Attribute does not exist"));
        assert_eq!(err.code(), Some(ErrorCode::Err));
    }

    #[test]
    fn test_type_mismatch_has_no_code() {
        let err = Error::TypeMismatch {
            operation: "set filter option".into(),
            expected: "i32",
            actual: "f64",
        };
        assert_eq!(err.code(), None);
        assert!(err.native_message().is_none());
        assert!(err.to_string().contains("expected i32"));
    }
}
