//! RESP emitter.

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use objconv::Error;
use objconv_buffers::Writer;

use crate::constants::Wire;
use crate::error::RespError;

/// A container whose element count was not known when it began. Its content
/// is staged until the end, when the exact count can be written.
struct Staged {
    out: Writer,
    items: usize,
}

enum Frame {
    Counted,
    Staged(Staged),
}

/// Writes values in RESP form to a byte sink.
///
/// Kinds missing from the protocol are mapped onto the ones it has: booleans
/// become integers 0 and 1, floats and timestamps simple strings, durations
/// integer nanoseconds, and maps flat arrays of alternating keys and values.
/// Strings with a CR or LF in them are written as bulk strings.
///
/// Output is handed to the sink each time a top-level message is complete.
pub struct Emitter<W> {
    w: W,
    out: Writer,
    frames: Vec<Frame>,
    one_shot: bool,
}

impl<W: Write> Emitter<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            out: Writer::new(),
            frames: Vec::new(),
            one_shot: false,
        }
    }

    /// Creates an emitter for request pipelines: a stream encoder writes
    /// each value as a top-level message instead of wrapping the stream in
    /// an array.
    pub fn pipeline(w: W) -> Self {
        Self {
            one_shot: true,
            ..Self::new(w)
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.w
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.w
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }

    fn sink(&mut self) -> &mut Writer {
        for frame in self.frames.iter_mut().rev() {
            if let Frame::Staged(staged) = frame {
                return &mut staged.out;
            }
        }
        &mut self.out
    }

    /// Accounts for one complete value and commits the output when it was a
    /// top-level message.
    fn done(&mut self) -> Result<(), Error> {
        match self.frames.last_mut() {
            Some(Frame::Staged(staged)) => {
                staged.items += 1;
                Ok(())
            }
            Some(Frame::Counted) => Ok(()),
            None => {
                let res = self.w.write_all(self.out.pending());
                self.out.clear();
                Ok(res?)
            }
        }
    }

    fn write_rn(&mut self) {
        self.sink().u16(Wire::RN);
    }

    fn write_simple(&mut self, prefix: u8, s: &str) -> Result<(), Error> {
        let out = self.sink();
        out.u8(prefix);
        out.utf8(s);
        out.u16(Wire::RN);
        self.done()
    }

    fn write_integer(&mut self, n: i64) -> Result<(), Error> {
        let out = self.sink();
        out.u8(Wire::INT);
        out.int(n);
        out.u16(Wire::RN);
        self.done()
    }

    fn write_bulk(&mut self, b: &[u8]) -> Result<(), Error> {
        let out = self.sink();
        out.u8(Wire::STR_BULK);
        out.uint(b.len() as u64);
        out.u16(Wire::RN);
        out.buf(b);
        out.u16(Wire::RN);
        self.done()
    }

    fn begin(&mut self, n: isize) {
        if n < 0 {
            self.frames.push(Frame::Staged(Staged {
                out: Writer::with_alloc_size(256),
                items: 0,
            }));
            return;
        }
        let out = self.sink();
        out.u8(Wire::ARR);
        out.uint(n as u64);
        self.write_rn();
        self.frames.push(Frame::Counted);
    }

    fn end(&mut self) -> Result<(), Error> {
        match self.frames.pop() {
            None => Err(RespError::Unbalanced.into()),
            Some(Frame::Counted) => self.done(),
            Some(Frame::Staged(mut staged)) => {
                let body = staged.out.flush();
                let out = self.sink();
                out.u8(Wire::ARR);
                out.uint(staged.items as u64);
                out.u16(Wire::RN);
                out.buf(&body);
                self.done()
            }
        }
    }
}

impl<W: Write> objconv::Emitter for Emitter<W> {
    fn emit_nil(&mut self) -> Result<(), Error> {
        let out = self.sink();
        out.u8(Wire::STR_BULK);
        out.buf(Wire::NIL_LEN);
        out.u16(Wire::RN);
        self.done()
    }

    fn emit_bool(&mut self, v: bool) -> Result<(), Error> {
        self.write_integer(v as i64)
    }

    fn emit_int(&mut self, v: i64, _bits: u8) -> Result<(), Error> {
        self.write_integer(v)
    }

    fn emit_uint(&mut self, v: u64, _bits: u8) -> Result<(), Error> {
        let out = self.sink();
        out.u8(Wire::INT);
        out.uint(v);
        out.u16(Wire::RN);
        self.done()
    }

    fn emit_float(&mut self, v: f64, bits: u8) -> Result<(), Error> {
        let s = if bits == 32 {
            (v as f32).to_string()
        } else {
            v.to_string()
        };
        self.write_simple(Wire::STR_SIMPLE, &s)
    }

    fn emit_string(&mut self, v: &str) -> Result<(), Error> {
        if v.bytes().any(|b| b == Wire::R || b == Wire::N) {
            self.write_bulk(v.as_bytes())
        } else {
            self.write_simple(Wire::STR_SIMPLE, v)
        }
    }

    fn emit_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
        self.write_bulk(v)
    }

    fn emit_time(&mut self, v: &DateTime<Utc>) -> Result<(), Error> {
        let s = v.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        self.write_simple(Wire::STR_SIMPLE, &s)
    }

    fn emit_duration(&mut self, v: TimeDelta) -> Result<(), Error> {
        match v.num_nanoseconds() {
            Some(ns) => self.write_integer(ns),
            None => Err(Error::custom(format!(
                "resp: duration of {v} does not fit in integer nanoseconds"
            ))),
        }
    }

    fn emit_error(&mut self, v: &str) -> Result<(), Error> {
        if v.bytes().any(|b| b == Wire::R || b == Wire::N) {
            let line = v.replace(['\r', '\n'], " ");
            self.write_simple(Wire::ERR_SIMPLE, &line)
        } else {
            self.write_simple(Wire::ERR_SIMPLE, v)
        }
    }

    fn emit_array_begin(&mut self, n: isize) -> Result<(), Error> {
        self.begin(n);
        Ok(())
    }

    fn emit_array_end(&mut self) -> Result<(), Error> {
        self.end()
    }

    fn emit_array_next(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn emit_map_begin(&mut self, n: isize) -> Result<(), Error> {
        self.begin(if n < 0 { n } else { 2 * n });
        Ok(())
    }

    fn emit_map_end(&mut self) -> Result<(), Error> {
        self.end()
    }

    fn emit_map_value(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn emit_map_next(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn one_shot(&self) -> bool {
        self.one_shot
    }

    fn discard(&mut self) {
        self.frames.clear();
        self.out.clear();
    }
}
