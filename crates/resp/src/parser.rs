//! RESP parser.

use std::io::{self, Read};

use chrono::{DateTime, TimeDelta, Utc};
use objconv::{Error, Kind};
use objconv_buffers::StreamReader;

use crate::constants::{Wire, DEFAULT_MAX_ARRAY_LEN, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_LINE_LEN};
use crate::error::RespError;

/// Reads RESP messages from a byte source.
///
/// The parser only pulls from the source what the current token needs, and
/// keeps any bytes read past it for the next call, so back-to-back messages
/// on one connection are parsed in order.
pub struct Parser<R> {
    r: StreamReader<R>,
    max_bulk_len: usize,
    max_array_len: usize,
    max_line_len: usize,
    one_shot: bool,
}

impl<R: Read> Parser<R> {
    pub fn new(r: R) -> Self {
        Self {
            r: StreamReader::new(r),
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            one_shot: false,
        }
    }

    /// Creates a parser for request pipelines: a stream decoder reads every
    /// top-level message as one element of the stream.
    pub fn pipeline(r: R) -> Self {
        Self {
            one_shot: true,
            ..Self::new(r)
        }
    }

    pub fn with_max_bulk_len(mut self, n: usize) -> Self {
        self.max_bulk_len = n;
        self
    }

    pub fn with_max_array_len(mut self, n: usize) -> Self {
        self.max_array_len = n;
        self
    }

    /// Caps the length of every line: length headers, integers, simple
    /// strings and errors.
    pub fn with_max_line_len(mut self, n: usize) -> Self {
        self.max_line_len = n;
        self
    }

    /// Switches to a new source, discarding buffered bytes.
    pub fn reset(&mut self, r: R) {
        self.r.reset(r);
    }

    /// Queues `data` to be parsed before anything from the source.
    pub fn load(&mut self, data: &[u8]) {
        self.r.load(data);
    }

    /// Number of bytes read from the source and not parsed yet.
    pub fn buffered(&self) -> usize {
        self.r.size()
    }

    /// Gives back buffer memory above `max` bytes, as left behind by a
    /// large bulk string.
    pub fn shrink_to(&mut self, max: usize) {
        self.r.shrink_to(max);
    }

    pub(crate) fn capacity(&self) -> usize {
        self.r.capacity()
    }

    pub fn get_ref(&self) -> &R {
        self.r.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.r.into_inner()
    }

    /// Returns the length of the next line, or `None` at a clean end of
    /// input.
    fn peek_line(&mut self) -> Result<Option<usize>, Error> {
        let limit = self.max_line_len;
        self.r.peek_line(limit).map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData => RespError::LineTooLong(limit).into(),
            _ => framing(err),
        })
    }

    /// Consumes the next line and returns its body, prefix excluded.
    fn line(&mut self, prefix: u8) -> Result<Vec<u8>, Error> {
        let n = self.peek_line()?.ok_or(RespError::EndOfInput)?;
        let line = &self.r.buffer()[..n];
        match line.first() {
            Some(&b) if b == prefix => {}
            Some(&b) => {
                return Err(RespError::UnexpectedType {
                    expected: prefix as char,
                    found: b as char,
                }
                .into())
            }
            None => return Err(RespError::UnknownType(Wire::R).into()),
        }
        let body = line[1..].to_vec();
        self.r.consume(n + 2);
        Ok(body)
    }

    fn number<T: std::str::FromStr>(body: &[u8]) -> Result<T, Error> {
        std::str::from_utf8(body)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RespError::InvalidNumber(String::from_utf8_lossy(body).into_owned()).into())
    }

    fn length(&mut self, prefix: u8, limit: usize) -> Result<usize, Error> {
        let body = self.line(prefix)?;
        let n: usize = std::str::from_utf8(&body)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RespError::InvalidLength(String::from_utf8_lossy(&body).into_owned()))?;
        if n > limit {
            return Err(RespError::TooLarge { len: n, limit }.into());
        }
        Ok(n)
    }

    /// Reads an integer or a simple string, the two forms numbers travel in.
    fn numeric_text(&mut self) -> Result<Vec<u8>, Error> {
        match self.r.peek().map_err(framing)? {
            Some(Wire::INT) => self.line(Wire::INT),
            _ => self.line(Wire::STR_SIMPLE),
        }
    }
}

/// Integers above `i64::MAX` only fit the unsigned kind.
fn is_big_uint(body: &[u8]) -> bool {
    match std::str::from_utf8(body) {
        Ok(s) => s.parse::<i64>().is_err() && s.parse::<u64>().is_ok(),
        Err(_) => false,
    }
}

fn framing(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => RespError::EndOfInput.into(),
        _ => err.into(),
    }
}

impl<R: Read> objconv::Parser for Parser<R> {
    fn parse_type(&mut self) -> Result<Kind, Error> {
        let n = match self.peek_line()? {
            Some(n) => n,
            None => return Err(Error::End),
        };
        let line = &self.r.buffer()[..n];
        let Some(&prefix) = line.first() else {
            return Err(RespError::UnknownType(Wire::R).into());
        };
        let nil = &line[1..] == Wire::NIL_LEN;
        match prefix {
            Wire::STR_SIMPLE => Ok(Kind::String),
            Wire::ERR_SIMPLE => Ok(Kind::Error),
            Wire::INT if is_big_uint(&line[1..]) => Ok(Kind::Uint),
            Wire::INT => Ok(Kind::Int),
            Wire::STR_BULK if nil => Ok(Kind::Nil),
            Wire::STR_BULK => Ok(Kind::Bytes),
            Wire::ARR if nil => Ok(Kind::Nil),
            Wire::ARR => Ok(Kind::Array),
            b => Err(RespError::UnknownType(b).into()),
        }
    }

    fn parse_nil(&mut self) -> Result<(), Error> {
        let prefix = match self.r.peek().map_err(framing)? {
            Some(Wire::ARR) => Wire::ARR,
            _ => Wire::STR_BULK,
        };
        let body = self.line(prefix)?;
        if body != Wire::NIL_LEN {
            return Err(RespError::InvalidLength(String::from_utf8_lossy(&body).into_owned()).into());
        }
        Ok(())
    }

    fn parse_bool(&mut self) -> Result<bool, Error> {
        Ok(self.parse_int()? != 0)
    }

    fn parse_int(&mut self) -> Result<i64, Error> {
        let body = self.line(Wire::INT)?;
        Self::number(&body)
    }

    fn parse_uint(&mut self) -> Result<u64, Error> {
        let body = self.line(Wire::INT)?;
        Self::number(&body)
    }

    fn parse_float(&mut self) -> Result<f64, Error> {
        let body = self.numeric_text()?;
        Self::number(&body)
    }

    fn parse_string(&mut self) -> Result<Vec<u8>, Error> {
        self.line(Wire::STR_SIMPLE)
    }

    fn parse_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let n = self.length(Wire::STR_BULK, self.max_bulk_len)?;
        if !self.r.fill(n + 2).map_err(framing)? {
            return Err(RespError::EndOfInput.into());
        }
        let data = self.r.buffer();
        if data[n..n + 2] != [Wire::R, Wire::N] {
            return Err(RespError::MissingCrlf.into());
        }
        let b = data[..n].to_vec();
        self.r.consume(n + 2);
        Ok(b)
    }

    fn parse_time(&mut self) -> Result<DateTime<Utc>, Error> {
        let body = self.line(Wire::STR_SIMPLE)?;
        std::str::from_utf8(&body)
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| Error::conversion(Kind::String, Kind::Time))
    }

    fn parse_duration(&mut self) -> Result<TimeDelta, Error> {
        Ok(TimeDelta::nanoseconds(self.parse_int()?))
    }

    fn parse_error(&mut self) -> Result<String, Error> {
        let body = self.line(Wire::ERR_SIMPLE)?;
        String::from_utf8(body).map_err(|_| RespError::InvalidUtf8.into())
    }

    fn parse_array_begin(&mut self) -> Result<isize, Error> {
        let n = self.length(Wire::ARR, self.max_array_len)?;
        Ok(n as isize)
    }

    fn parse_array_end(&mut self, _n: usize) -> Result<(), Error> {
        Ok(())
    }

    fn parse_array_next(&mut self, _n: usize) -> Result<(), Error> {
        Ok(())
    }

    fn parse_map_begin(&mut self) -> Result<isize, Error> {
        Err(RespError::NoMap.into())
    }

    fn parse_map_end(&mut self, _n: usize) -> Result<(), Error> {
        Err(RespError::NoMap.into())
    }

    fn parse_map_value(&mut self, _n: usize) -> Result<(), Error> {
        Err(RespError::NoMap.into())
    }

    fn parse_map_next(&mut self, _n: usize) -> Result<(), Error> {
        Err(RespError::NoMap.into())
    }

    fn finish(&mut self) -> Result<(), Error> {
        if self.r.size() > 0 {
            return Err(Error::Shadow);
        }
        Ok(())
    }

    fn one_shot(&self) -> bool {
        self.one_shot
    }
}
