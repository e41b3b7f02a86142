//! Byte buffers shared by the objconv wire codecs.
//!
//! - [`Writer`] accumulates encoded tokens before they are committed to a sink.
//! - [`StreamReader`] pulls bytes from an [`std::io::Read`] source on demand and
//!   keeps whatever it read past the current token, so back-to-back messages on
//!   one stream are never lost between parses.

mod reader;
mod writer;

pub use reader::StreamReader;
pub use writer::Writer;
