//! Protocol error types.

use thiserror::Error;

/// Errors raised while framing the inbound byte stream.
///
/// Every variant is fatal for the connection that produced it: the caller
/// sends an `ERROR` line and closes rather than resynchronizing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line too long ({actual} bytes, ceiling {limit})")]
    LineTooLong { actual: usize, limit: usize },

    #[error("invalid UTF-8 at byte {byte_pos}")]
    InvalidUtf8 { byte_pos: usize },
}

impl ProtocolError {
    /// Short reason suitable for the closing `ERROR` line.
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::Io(_) => "Read error",
            Self::LineTooLong { .. } => "Line too long",
            Self::InvalidUtf8 { .. } => "Invalid UTF-8",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
