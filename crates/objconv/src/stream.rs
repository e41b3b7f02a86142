//! Sessions that read or write a sequence of independent values.
//!
//! On formats with array framing the sequence is one top-level array. On
//! one-shot formats every element is a message of its own.

use crate::{Context, Decode, Decoder, Emitter, Encode, Encoder, Error, Kind, Parser};

/// Writes a stream of values to an [`Emitter`].
///
/// The stream opens on the first write, either explicitly through
/// [`StreamEncoder::open`] or implicitly with an unknown length, and closes
/// once the declared number of values was written or [`StreamEncoder::close`]
/// is called. An emitter error makes every later call fail with that error.
pub struct StreamEncoder<E> {
    emitter: E,
    cx: Context,
    sort_map_keys: bool,
    err: Option<Error>,
    max: isize,
    cnt: usize,
    opened: bool,
    closed: bool,
    one_shot: bool,
}

impl<E: Emitter> StreamEncoder<E> {
    pub fn new(emitter: E, cx: Context) -> Self {
        let one_shot = emitter.one_shot();
        Self {
            emitter,
            cx,
            sort_map_keys: false,
            err: None,
            max: -1,
            cnt: 0,
            opened: false,
            closed: false,
            one_shot,
        }
    }

    pub fn with_sort_map_keys(mut self, sort: bool) -> Self {
        self.sort_map_keys = sort;
        self
    }

    fn check(&mut self, res: Result<(), Error>) -> Result<(), Error> {
        if let Err(err) = &res {
            self.err = Some(err.clone());
        }
        res
    }

    /// Starts the stream with `n` values, or an unknown number when `n` is
    /// negative. Does nothing when the stream is already open.
    pub fn open(&mut self, n: isize) -> Result<(), Error> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if self.closed {
            return Err(Error::Closed);
        }
        if !self.opened {
            self.max = n;
            self.opened = true;
            if !self.one_shot {
                let res = self.emitter.emit_array_begin(n);
                return self.check(res);
            }
        }
        Ok(())
    }

    /// Writes one value. Fails with [`Error::Capacity`] once the declared
    /// number of values was reached.
    pub fn encode<T: Encode + ?Sized>(&mut self, v: &T) -> Result<(), Error> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        // A stream closed by reaching its count reports the overflow.
        if self.max >= 0 && self.cnt as isize >= self.max && (self.cnt > 0 || !self.closed) {
            return Err(Error::Capacity(self.max as usize));
        }
        self.open(-1)?;

        if !self.one_shot && self.cnt != 0 {
            let res = self.emitter.emit_array_next();
            self.check(res)?;
        }
        let res = Encoder::new(&mut self.emitter, &self.cx)
            .with_sort_map_keys(self.sort_map_keys)
            .encode(v);
        self.check(res)?;

        self.cnt += 1;
        if self.max >= 0 && self.cnt as isize >= self.max {
            self.close()?;
        }
        Ok(())
    }

    /// Ends the stream. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if self.closed {
            return Ok(());
        }
        self.open(0)?;
        self.closed = true;
        if !self.one_shot {
            let res = self.emitter.emit_array_end();
            self.check(res)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &E {
        &self.emitter
    }

    pub fn get_mut(&mut self) -> &mut E {
        &mut self.emitter
    }

    pub fn into_inner(self) -> E {
        self.emitter
    }
}

/// Reads a stream of values from a [`Parser`].
///
/// Each frame is a top-level array whose elements are handed out one by one;
/// a frame that is not an array counts as a single element. Once a frame is
/// exhausted [`StreamDecoder::decode`] returns [`Error::End`], and
/// [`StreamDecoder::next_frame`] moves on to the next pipelined frame.
pub struct StreamDecoder<P> {
    parser: P,
    cx: Context,
    err: Option<Error>,
    max: isize,
    cnt: usize,
    opened: bool,
    closed: bool,
    framed: bool,
    one_shot: bool,
}

impl<P: Parser> StreamDecoder<P> {
    pub fn new(parser: P, cx: Context) -> Self {
        let one_shot = parser.one_shot();
        Self {
            parser,
            cx,
            err: None,
            max: 0,
            cnt: 0,
            opened: false,
            closed: false,
            framed: false,
            one_shot,
        }
    }

    fn check<T>(&mut self, res: Result<T, Error>) -> Result<T, Error> {
        match &res {
            Err(Error::End) | Ok(_) => {}
            Err(err) => self.err = Some(err.clone()),
        }
        res
    }

    fn open(&mut self) -> Result<(), Error> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if self.opened {
            return Ok(());
        }
        if self.one_shot {
            self.max = -1;
            self.opened = true;
            return Ok(());
        }
        let kind = self.parser.parse_type();
        match self.check(kind)? {
            Kind::Nil => {
                let res = self.parser.parse_nil();
                self.check(res)?;
                self.max = 0;
            }
            Kind::Array => {
                let res = self.parser.parse_array_begin();
                self.max = self.check(res)?;
                self.framed = true;
            }
            _ => self.max = 1,
        }
        self.opened = true;
        Ok(())
    }

    /// Reads the next element into `v`, or returns `Ok(false)` when the
    /// frame has no element left.
    fn next_value<T: Decode + ?Sized>(&mut self, v: &mut T) -> Result<bool, Error> {
        if self.closed || (self.max >= 0 && self.cnt as isize >= self.max) {
            return Ok(false);
        }
        if self.one_shot {
            match self.parser.parse_type() {
                Err(Error::End) => return Ok(false),
                res => {
                    self.check(res)?;
                }
            }
        } else if self.framed && (self.max < 0 || self.cnt != 0) {
            match self.parser.parse_array_next(self.cnt) {
                Err(Error::End) if self.max < 0 => return Ok(false),
                res => self.check(res)?,
            }
        }
        let res = Decoder::new(&mut self.parser, &self.cx).decode(v);
        self.check(res)?;
        self.cnt += 1;
        Ok(true)
    }

    /// Reads one element of the current frame into `v`.
    ///
    /// Returns [`Error::End`] once the frame is exhausted, which is the
    /// normal way for iteration to stop.
    pub fn decode<T: Decode + ?Sized>(&mut self, v: &mut T) -> Result<(), Error> {
        self.open()?;
        if self.next_value(v)? {
            return Ok(());
        }
        self.close()?;
        Err(Error::End)
    }

    /// Number of elements left in the current frame, `-1` when unknown. Zero
    /// is returned when no frame is left or the stream failed.
    pub fn len(&mut self) -> isize {
        match self.open() {
            Ok(()) if self.max < 0 => -1,
            Ok(()) if self.closed => 0,
            Ok(()) => self.max - self.cnt as isize,
            Err(_) => 0,
        }
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Finishes the current frame, reading and discarding what is left of it.
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if self.closed {
            return Ok(());
        }
        match self.open() {
            Ok(()) => {}
            Err(Error::End) => {
                self.closed = true;
                return Ok(());
            }
            Err(err) => return Err(err),
        }
        if !self.one_shot {
            let mut scratch = crate::Value::Nil;
            while self.next_value(&mut scratch)? {}
            if self.framed {
                let res = self.parser.parse_array_end(self.cnt);
                self.check(res)?;
            }
        }
        self.closed = true;
        Ok(())
    }

    /// Moves past the current frame so the next call reads the following
    /// pipelined frame. Also known as `next` in other stream APIs.
    pub fn next_frame(&mut self) -> Result<(), Error> {
        self.close()?;
        tracing::trace!(elements = self.cnt, "stream decoder advancing to the next frame");
        self.max = 0;
        self.cnt = 0;
        self.opened = false;
        self.closed = false;
        self.framed = false;
        Ok(())
    }

    pub fn get_ref(&self) -> &P {
        &self.parser
    }

    pub fn get_mut(&mut self) -> &mut P {
        &mut self.parser
    }

    pub fn into_inner(self) -> P {
        self.parser
    }
}
