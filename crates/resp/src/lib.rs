//! RESP, the REdis Serialization Protocol, for objconv.
//!
//! | Prefix | Message |
//! |---|---|
//! | `+` | simple string |
//! | `-` | error |
//! | `:` | integer |
//! | `$n` | bulk string of `n` bytes, `$-1` is nil |
//! | `*n` | array of `n` messages, `*-1` is nil |
//!
//! ```
//! let b = objconv_resp::marshal(&vec!["GET", "key"]).unwrap();
//! assert_eq!(b, b"*2\r\n+GET\r\n+key\r\n");
//!
//! let mut cmd: Vec<String> = Vec::new();
//! objconv_resp::unmarshal(&b, &mut cmd).unwrap();
//! assert_eq!(cmd, ["GET", "key"]);
//! ```

mod codec;
mod constants;
mod emitter;
mod error;
mod parser;

pub use codec::{
    codec, marshal, new_stream_decoder, new_stream_encoder, register, unmarshal, Resp, NAMES,
};
pub use constants::{DEFAULT_MAX_ARRAY_LEN, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_LINE_LEN};
pub use emitter::Emitter;
pub use error::{ErrorReply, RespError};
pub use parser::Parser;
