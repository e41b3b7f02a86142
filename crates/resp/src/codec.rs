//! One-shot and streaming entry points.

use std::io::{self, Read, Write};
use std::sync::OnceLock;

use objconv::{
    Codec, Context, Decode, Decoder, Encode, Encoder, Error, Parser as _, Pool, Registry,
    StreamDecoder, StreamEncoder,
};

use crate::constants::POOLED_BUFFER_LEN;
use crate::{Emitter, Parser};

/// Names the codec is registered under.
pub const NAMES: [&str; 2] = ["resp", "application/x-resp"];

/// A RESP session factory sharing one [`Context`] and a pool of parsers for
/// one-shot decoding.
pub struct Resp {
    cx: Context,
    sort_map_keys: bool,
    parsers: Pool<Parser<io::Empty>>,
}

impl Default for Resp {
    fn default() -> Self {
        Self::new(Context::new())
    }
}

impl Resp {
    pub fn new(cx: Context) -> Self {
        Self {
            cx,
            sort_map_keys: false,
            parsers: Pool::new(
                || Parser::new(io::empty()),
                |p: &mut Parser<io::Empty>| {
                    p.load(&[]);
                    p.shrink_to(POOLED_BUFFER_LEN);
                },
            ),
        }
    }

    pub fn with_sort_map_keys(mut self, sort: bool) -> Self {
        self.sort_map_keys = sort;
        self
    }

    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// Encodes `v` into a single RESP message.
    pub fn marshal<T: Encode + ?Sized>(&self, v: &T) -> Result<Vec<u8>, Error> {
        let mut e = Emitter::new(Vec::new());
        Encoder::new(&mut e, &self.cx)
            .with_sort_map_keys(self.sort_map_keys)
            .encode(v)?;
        Ok(e.into_inner())
    }

    /// Decodes the first RESP message of `b` into `v`. Bytes after the
    /// message are ignored.
    pub fn unmarshal<T: Decode + ?Sized>(&self, b: &[u8], v: &mut T) -> Result<(), Error> {
        let mut p = self.parsers.get();
        p.load(b);
        Decoder::new(&mut *p, &self.cx).decode(v)?;
        match p.finish() {
            Err(Error::Shadow) => {
                tracing::trace!(residual = p.buffered(), "resp: discarding bytes after the message");
                Ok(())
            }
            res => res,
        }
    }

    pub fn stream_encoder<W: Write>(&self, w: W) -> StreamEncoder<Emitter<W>> {
        StreamEncoder::new(Emitter::new(w), self.cx.clone()).with_sort_map_keys(self.sort_map_keys)
    }

    pub fn stream_decoder<R: Read>(&self, r: R) -> StreamDecoder<Parser<R>> {
        StreamDecoder::new(Parser::new(r), self.cx.clone())
    }

    /// A stream encoder writing every value as its own top-level message.
    pub fn pipeline_encoder<W: Write>(&self, w: W) -> StreamEncoder<Emitter<W>> {
        StreamEncoder::new(Emitter::pipeline(w), self.cx.clone())
            .with_sort_map_keys(self.sort_map_keys)
    }

    /// A stream decoder reading every top-level message as one value.
    pub fn pipeline_decoder<R: Read>(&self, r: R) -> StreamDecoder<Parser<R>> {
        StreamDecoder::new(Parser::pipeline(r), self.cx.clone())
    }
}

fn shared() -> &'static Resp {
    static SHARED: OnceLock<Resp> = OnceLock::new();
    SHARED.get_or_init(Resp::default)
}

/// Encodes `v` into a single RESP message.
pub fn marshal<T: Encode + ?Sized>(v: &T) -> Result<Vec<u8>, Error> {
    shared().marshal(v)
}

/// Decodes the first RESP message of `b` into `v`.
pub fn unmarshal<T: Decode + ?Sized>(b: &[u8], v: &mut T) -> Result<(), Error> {
    shared().unmarshal(b, v)
}

pub fn new_stream_encoder<W: Write>(w: W) -> StreamEncoder<Emitter<W>> {
    shared().stream_encoder(w)
}

pub fn new_stream_decoder<R: Read>(r: R) -> StreamDecoder<Parser<R>> {
    shared().stream_decoder(r)
}

fn new_emitter(w: Box<dyn Write + Send>) -> Box<dyn objconv::Emitter + Send> {
    Box::new(Emitter::new(w))
}

fn new_parser(r: Box<dyn Read + Send>) -> Box<dyn objconv::Parser + Send> {
    Box::new(Parser::new(r))
}

/// The emitter and parser constructors of the format.
pub fn codec() -> Codec {
    Codec {
        new_emitter,
        new_parser,
    }
}

/// Installs the codec in `registry` under every name in [`NAMES`].
pub fn register(registry: &Registry) {
    for name in NAMES {
        registry.register(name, codec());
    }
}
