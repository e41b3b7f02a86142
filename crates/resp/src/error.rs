use std::fmt;

use objconv::{Decode, Decoder, Encode, Encoder, Error};

/// Framing errors of the RESP codec.
///
/// They reach callers wrapped in [`objconv::Error::Protocol`] and can be
/// recovered with [`objconv::Error::protocol_error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RespError {
    #[error("resp: unexpected end of input")]
    EndOfInput,
    #[error("resp: unknown type prefix 0x{0:02x}")]
    UnknownType(u8),
    #[error("resp: expected a message starting with {expected:?} but found {found:?}")]
    UnexpectedType { expected: char, found: char },
    #[error("resp: invalid length {0:?}")]
    InvalidLength(String),
    #[error("resp: invalid number {0:?}")]
    InvalidNumber(String),
    #[error("resp: bulk string is not terminated by CRLF")]
    MissingCrlf,
    #[error("resp: invalid UTF-8 in error message")]
    InvalidUtf8,
    #[error("resp: length {len} exceeds the configured limit of {limit}")]
    TooLarge { len: usize, limit: usize },
    #[error("resp: line exceeds the configured limit of {0} bytes")]
    LineTooLong(usize),
    #[error("resp: maps are not part of the protocol, this is likely a bug in the decoder code")]
    NoMap,
    #[error("resp: container end without a matching begin")]
    Unbalanced,
}

impl From<RespError> for Error {
    fn from(err: RespError) -> Self {
        Error::protocol(err)
    }
}

/// An error reply, the `-` message of the protocol.
///
/// Encodes as an error message on any format and decodes from error messages
/// as well as plain strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReply(pub String);

impl ErrorReply {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ErrorReply {}

impl Encode for ErrorReply {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_error(self)
    }

    fn is_empty_value(&self) -> bool {
        self.0.is_empty()
    }
}

impl Decode for ErrorReply {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        self.0 = d.decode_error()?;
        Ok(())
    }
}
