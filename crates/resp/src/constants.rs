//! RESP wire constants.

/// Type prefixes and terminators of the RESP grammar.
pub struct Wire;

impl Wire {
    pub const R: u8 = 0x0d; // \r
    pub const N: u8 = 0x0a; // \n
    pub const RN: u16 = 0x0d0a; // \r\n

    pub const STR_SIMPLE: u8 = b'+';
    pub const ERR_SIMPLE: u8 = b'-';
    pub const INT: u8 = b':';
    pub const STR_BULK: u8 = b'$';
    pub const ARR: u8 = b'*';

    /// Length announced by the nil spellings `$-1` and `*-1`.
    pub const NIL_LEN: &'static [u8] = b"-1";
}

/// Default upper bound of a bulk string length, matching the limit of Redis.
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Default upper bound of an array length.
pub const DEFAULT_MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Default upper bound of a header, integer or simple string line, the
/// inline limit of Redis.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Buffer capacity a pooled parser keeps between one-shot calls.
pub(crate) const POOLED_BUFFER_LEN: usize = 64 * 1024;
