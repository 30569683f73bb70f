//! Error types for the entity store and its HTTP transport.

use std::fmt;

/// Coarse classification of a failed fetch, carried by error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Network-level failure (connect, DNS, timeout, body read)
  Transport,
  /// A well-formed response with a non-success status
  HttpStatus,
  /// The response body was not a valid Siren entity
  Parse,
  /// The request descriptor could not be turned into a wire request
  InvalidRequest,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ErrorKind::Transport => "transport",
      ErrorKind::HttpStatus => "http-status",
      ErrorKind::Parse => "parse",
      ErrorKind::InvalidRequest => "invalid-request",
    };
    f.write_str(name)
  }
}

/// Errors produced while fetching or submitting an action.
///
/// `Clone` so that callers coalesced onto one in-flight read all observe
/// the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
  #[error("Request failed: {message}")]
  Transport { message: String },

  #[error("Request failed, status: {status} ({status_text})")]
  HttpStatus { status: u16, status_text: String },

  #[error("Invalid entity: {message}")]
  Parse { message: String },

  #[error("Invalid request: {message}")]
  InvalidRequest { message: String },
}

impl StoreError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      StoreError::Transport { .. } => ErrorKind::Transport,
      StoreError::HttpStatus { .. } => ErrorKind::HttpStatus,
      StoreError::Parse { .. } => ErrorKind::Parse,
      StoreError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
    }
  }

  pub(crate) fn transport(err: impl fmt::Display) -> Self {
    StoreError::Transport {
      message: err.to_string(),
    }
  }

  pub(crate) fn parse(err: impl fmt::Display) -> Self {
    StoreError::Parse {
      message: err.to_string(),
    }
  }

  pub(crate) fn invalid_request(err: impl fmt::Display) -> Self {
    StoreError::InvalidRequest {
      message: err.to_string(),
    }
  }
}

pub type StoreResult<T> = Result<T, StoreError>;
