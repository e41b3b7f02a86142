//! A format-agnostic object serialization engine.
//!
//! Values are walked by an [`Encoder`] that turns them into a sequence of
//! calls on an [`Emitter`], and rebuilt by a [`Decoder`] that pulls tokens
//! from a [`Parser`]. Wire formats only implement those two traits; the
//! traversal, type conversions, record field handling and stream framing
//! live here.
//!
//! ```
//! use objconv::{Context, Value};
//!
//! let cx = Context::new();
//! let v = cx.to_value(&vec![1i64, 2, 3]).unwrap();
//! assert_eq!(v, Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
//!
//! let mut back: Vec<i64> = Vec::new();
//! cx.from_value(&v, &mut back).unwrap();
//! assert_eq!(back, [1, 2, 3]);
//! ```

mod adapter;
mod codec;
mod context;
mod decode;
mod emit;
mod encode;
mod error;
mod kind;
mod parse;
mod pool;
mod record;
mod stream;
mod value;

pub use adapter::{Adapter, Adapters};
pub use codec::{Codec, NewEmitter, NewParser, Registry};
pub use context::Context;
pub use decode::{Decode, Decoder, TextUnmarshal};
pub use emit::Emitter;
pub use encode::{Encode, Encoder, TextMarshal};
pub use error::Error;
pub use kind::{classify, Kind};
pub use parse::Parser;
pub use pool::{Pool, Pooled};
pub use record::{Field, FieldDesc, Fields, Record, StructCache};
pub use stream::{StreamDecoder, StreamEncoder};
pub use value::{Value, ValueEmitter, ValueParser};

/// Implements [`Encode`] and [`Decode`] for types implementing [`Record`],
/// serializing them as maps of their declared fields.
#[macro_export]
macro_rules! record_codec {
    ($($t:ty),+ $(,)?) => {$(
        impl $crate::Encode for $t {
            fn encode(&self, e: &mut $crate::Encoder<'_>) -> ::std::result::Result<(), $crate::Error> {
                e.encode_struct(self)
            }
        }

        impl $crate::Decode for $t {
            fn decode(&mut self, d: &mut $crate::Decoder<'_>) -> ::std::result::Result<(), $crate::Error> {
                d.decode_struct(self)
            }
        }
    )+};
}

/// Implements [`Encode`] and [`Decode`] for types implementing
/// [`TextMarshal`] and [`TextUnmarshal`].
#[macro_export]
macro_rules! text_codec {
    ($($t:ty),+ $(,)?) => {$(
        impl $crate::Encode for $t {
            fn encode(&self, e: &mut $crate::Encoder<'_>) -> ::std::result::Result<(), $crate::Error> {
                e.encode_text(self)
            }
        }

        impl $crate::Decode for $t {
            fn decode(&mut self, d: &mut $crate::Decoder<'_>) -> ::std::result::Result<(), $crate::Error> {
                d.decode_text(self)
            }
        }
    )+};
}
