use std::fmt;
use std::io;
use std::sync::Arc;

use crate::Kind;

/// Errors produced while encoding or decoding.
///
/// `End` and `Shadow` are control signals rather than failures: `End` tells a
/// traversal loop that a producer or a stream frame is exhausted, `Shadow`
/// tells a one-shot parse that bytes were left over after the value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("objconv: cannot convert from {from} to {to}")]
    TypeConversion { from: Kind, to: Kind },

    #[error("objconv: the encoder doesn't support values of type {0}")]
    Unsupported(String),

    #[error("objconv: {0}")]
    Protocol(Arc<dyn std::error::Error + Send + Sync>),

    #[error("objconv: too many values sent to a stream encoder exceed the configured limit of {0}")]
    Capacity(usize),

    #[error("objconv: the stream is closed")]
    Closed,

    #[error("objconv: {0}")]
    Io(Arc<io::Error>),

    #[error("{0}")]
    Custom(String),

    #[error("end")]
    End,

    #[error("shadow")]
    Shadow,
}

impl Error {
    pub fn conversion(from: Kind, to: Kind) -> Self {
        Error::TypeConversion { from, to }
    }

    /// Wraps a format-specific framing error.
    pub fn protocol<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Protocol(Arc::new(err))
    }

    pub fn custom(msg: impl fmt::Display) -> Self {
        Error::Custom(msg.to_string())
    }

    pub fn unexpected_eof() -> Self {
        io::Error::from(io::ErrorKind::UnexpectedEof).into()
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Error::End)
    }

    pub fn is_shadow(&self) -> bool {
        matches!(self, Error::Shadow)
    }

    /// Returns the wrapped protocol error when it is of type `E`.
    pub fn protocol_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Protocol(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns the kind of the underlying I/O error, if any.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("bad frame")]
    struct BadFrame;

    #[test]
    fn messages() {
        assert_eq!(
            Error::conversion(Kind::Nil, Kind::Int).to_string(),
            "objconv: cannot convert from nil to int"
        );
        assert_eq!(
            Error::Capacity(3).to_string(),
            "objconv: too many values sent to a stream encoder exceed the configured limit of 3"
        );
        assert_eq!(Error::End.to_string(), "end");
    }

    #[test]
    fn protocol_downcast() {
        let err = Error::protocol(BadFrame);
        assert!(err.protocol_error::<BadFrame>().is_some());
        assert_eq!(err.to_string(), "objconv: bad frame");
        assert!(Error::End.protocol_error::<BadFrame>().is_none());
    }

    #[test]
    fn io_passthrough() {
        let err = Error::unexpected_eof();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::UnexpectedEof));
        assert!(!err.is_end());
    }
}
