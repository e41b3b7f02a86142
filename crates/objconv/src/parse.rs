//! The source side of a wire format.

use chrono::{DateTime, TimeDelta, Utc};

use crate::{Error, Kind};

/// Yields one primitive token per call.
///
/// [`Parser::parse_type`] peeks at the kind of the next token without
/// consuming it and reports [`Error::End`] once the source is cleanly
/// exhausted. Every other method consumes exactly one token.
///
/// Container lengths returned by `*_begin` may be negative when the format
/// does not announce them. For those, `*_next` is called before every element,
/// the first included, and returns [`Error::End`] when no element is left. For
/// containers of known length, `*_next` is only called between elements.
pub trait Parser {
    fn parse_type(&mut self) -> Result<Kind, Error>;

    fn parse_nil(&mut self) -> Result<(), Error>;

    fn parse_bool(&mut self) -> Result<bool, Error>;

    fn parse_int(&mut self) -> Result<i64, Error>;

    fn parse_uint(&mut self) -> Result<u64, Error>;

    fn parse_float(&mut self) -> Result<f64, Error>;

    /// Returns the raw octets of a string token.
    fn parse_string(&mut self) -> Result<Vec<u8>, Error>;

    fn parse_bytes(&mut self) -> Result<Vec<u8>, Error>;

    fn parse_time(&mut self) -> Result<DateTime<Utc>, Error>;

    fn parse_duration(&mut self) -> Result<TimeDelta, Error>;

    fn parse_error(&mut self) -> Result<String, Error>;

    fn parse_array_begin(&mut self) -> Result<isize, Error>;

    fn parse_array_end(&mut self, n: usize) -> Result<(), Error>;

    fn parse_array_next(&mut self, n: usize) -> Result<(), Error>;

    fn parse_map_begin(&mut self) -> Result<isize, Error>;

    fn parse_map_end(&mut self, n: usize) -> Result<(), Error>;

    fn parse_map_value(&mut self, n: usize) -> Result<(), Error>;

    fn parse_map_next(&mut self, n: usize) -> Result<(), Error>;

    /// Called once a one-shot decode has read its value. Formats that can
    /// tell there are bytes left return [`Error::Shadow`].
    fn finish(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn text(&self) -> bool {
        false
    }

    fn one_shot(&self) -> bool {
        false
    }
}

macro_rules! forward_parser {
    ($($ptr:ty),+) => {$(
        impl<P: Parser + ?Sized> Parser for $ptr {
            fn parse_type(&mut self) -> Result<Kind, Error> {
                (**self).parse_type()
            }
            fn parse_nil(&mut self) -> Result<(), Error> {
                (**self).parse_nil()
            }
            fn parse_bool(&mut self) -> Result<bool, Error> {
                (**self).parse_bool()
            }
            fn parse_int(&mut self) -> Result<i64, Error> {
                (**self).parse_int()
            }
            fn parse_uint(&mut self) -> Result<u64, Error> {
                (**self).parse_uint()
            }
            fn parse_float(&mut self) -> Result<f64, Error> {
                (**self).parse_float()
            }
            fn parse_string(&mut self) -> Result<Vec<u8>, Error> {
                (**self).parse_string()
            }
            fn parse_bytes(&mut self) -> Result<Vec<u8>, Error> {
                (**self).parse_bytes()
            }
            fn parse_time(&mut self) -> Result<DateTime<Utc>, Error> {
                (**self).parse_time()
            }
            fn parse_duration(&mut self) -> Result<TimeDelta, Error> {
                (**self).parse_duration()
            }
            fn parse_error(&mut self) -> Result<String, Error> {
                (**self).parse_error()
            }
            fn parse_array_begin(&mut self) -> Result<isize, Error> {
                (**self).parse_array_begin()
            }
            fn parse_array_end(&mut self, n: usize) -> Result<(), Error> {
                (**self).parse_array_end(n)
            }
            fn parse_array_next(&mut self, n: usize) -> Result<(), Error> {
                (**self).parse_array_next(n)
            }
            fn parse_map_begin(&mut self) -> Result<isize, Error> {
                (**self).parse_map_begin()
            }
            fn parse_map_end(&mut self, n: usize) -> Result<(), Error> {
                (**self).parse_map_end(n)
            }
            fn parse_map_value(&mut self, n: usize) -> Result<(), Error> {
                (**self).parse_map_value(n)
            }
            fn parse_map_next(&mut self, n: usize) -> Result<(), Error> {
                (**self).parse_map_next(n)
            }
            fn finish(&mut self) -> Result<(), Error> {
                (**self).finish()
            }
            fn text(&self) -> bool {
                (**self).text()
            }
            fn one_shot(&self) -> bool {
                (**self).one_shot()
            }
        }
    )+};
}

forward_parser!(&mut P, Box<P>);
