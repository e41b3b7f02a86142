//! The sink side of a wire format.

use chrono::{DateTime, TimeDelta, Utc};

use crate::Error;

/// Receives one call per primitive token of output.
///
/// Containers are framed with `*_begin`, `*_next` and `*_end`. The length
/// passed to a `*_begin` call is negative when the producer does not know how
/// many elements will follow. `emit_array_next` and `emit_map_next` are called
/// between elements, never before the first one. `emit_map_value` is called
/// after every key, before its value.
///
/// The `bits` argument of numeric calls is the width of the source type, so
/// formats with sized encodings can pick the narrowest representation.
pub trait Emitter {
    fn emit_nil(&mut self) -> Result<(), Error>;

    fn emit_bool(&mut self, v: bool) -> Result<(), Error>;

    fn emit_int(&mut self, v: i64, bits: u8) -> Result<(), Error>;

    fn emit_uint(&mut self, v: u64, bits: u8) -> Result<(), Error>;

    fn emit_float(&mut self, v: f64, bits: u8) -> Result<(), Error>;

    fn emit_string(&mut self, v: &str) -> Result<(), Error>;

    fn emit_bytes(&mut self, v: &[u8]) -> Result<(), Error>;

    fn emit_time(&mut self, v: &DateTime<Utc>) -> Result<(), Error>;

    fn emit_duration(&mut self, v: TimeDelta) -> Result<(), Error>;

    fn emit_error(&mut self, v: &str) -> Result<(), Error>;

    fn emit_array_begin(&mut self, n: isize) -> Result<(), Error>;

    fn emit_array_end(&mut self) -> Result<(), Error>;

    fn emit_array_next(&mut self) -> Result<(), Error>;

    fn emit_map_begin(&mut self, n: isize) -> Result<(), Error>;

    fn emit_map_end(&mut self) -> Result<(), Error>;

    fn emit_map_value(&mut self) -> Result<(), Error>;

    fn emit_map_next(&mut self) -> Result<(), Error>;

    /// Whether the format is human-readable. Text-marshaling types emit a
    /// string on text formats and bytes otherwise.
    fn text(&self) -> bool {
        false
    }

    /// Whether the format lacks top-level array framing, in which case a
    /// stream encoder writes every element as its own message.
    fn one_shot(&self) -> bool {
        false
    }

    /// Drops the partial output of a top-level value that failed to encode,
    /// leaving the emitter ready for the next value.
    fn discard(&mut self) {}
}

macro_rules! forward_emitter {
    ($($ptr:ty),+) => {$(
        impl<E: Emitter + ?Sized> Emitter for $ptr {
            fn emit_nil(&mut self) -> Result<(), Error> {
                (**self).emit_nil()
            }
            fn emit_bool(&mut self, v: bool) -> Result<(), Error> {
                (**self).emit_bool(v)
            }
            fn emit_int(&mut self, v: i64, bits: u8) -> Result<(), Error> {
                (**self).emit_int(v, bits)
            }
            fn emit_uint(&mut self, v: u64, bits: u8) -> Result<(), Error> {
                (**self).emit_uint(v, bits)
            }
            fn emit_float(&mut self, v: f64, bits: u8) -> Result<(), Error> {
                (**self).emit_float(v, bits)
            }
            fn emit_string(&mut self, v: &str) -> Result<(), Error> {
                (**self).emit_string(v)
            }
            fn emit_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
                (**self).emit_bytes(v)
            }
            fn emit_time(&mut self, v: &DateTime<Utc>) -> Result<(), Error> {
                (**self).emit_time(v)
            }
            fn emit_duration(&mut self, v: TimeDelta) -> Result<(), Error> {
                (**self).emit_duration(v)
            }
            fn emit_error(&mut self, v: &str) -> Result<(), Error> {
                (**self).emit_error(v)
            }
            fn emit_array_begin(&mut self, n: isize) -> Result<(), Error> {
                (**self).emit_array_begin(n)
            }
            fn emit_array_end(&mut self) -> Result<(), Error> {
                (**self).emit_array_end()
            }
            fn emit_array_next(&mut self) -> Result<(), Error> {
                (**self).emit_array_next()
            }
            fn emit_map_begin(&mut self, n: isize) -> Result<(), Error> {
                (**self).emit_map_begin(n)
            }
            fn emit_map_end(&mut self) -> Result<(), Error> {
                (**self).emit_map_end()
            }
            fn emit_map_value(&mut self) -> Result<(), Error> {
                (**self).emit_map_value()
            }
            fn emit_map_next(&mut self) -> Result<(), Error> {
                (**self).emit_map_next()
            }
            fn text(&self) -> bool {
                (**self).text()
            }
            fn one_shot(&self) -> bool {
                (**self).one_shot()
            }
            fn discard(&mut self) {
                (**self).discard()
            }
        }
    )+};
}

forward_emitter!(&mut E, Box<E>);
