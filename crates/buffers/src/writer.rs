//! Growable output buffer for wire tokens.

/// Accumulates encoded bytes until a codec decides they are complete.
///
/// Everything written since the last [`Writer::flush`] or [`Writer::clear`]
/// is pending. A codec usually stages one message here and commits it to its
/// sink in a single write, so a failing value never leaves half a message on
/// the wire.
///
/// # Example
///
/// ```
/// use objconv_buffers::Writer;
///
/// let mut writer = Writer::new();
/// writer.u8(b':');
/// writer.int(-42);
/// writer.u16(0x0d0a);
/// assert_eq!(writer.flush(), b":-42\r\n");
/// ```
#[derive(Debug, Clone)]
pub struct Writer {
    bytes: Vec<u8>,
    start: usize,
    chunk: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// A writer that grows in 4 KiB steps.
    pub fn new() -> Self {
        Self::with_alloc_size(4 * 1024)
    }

    pub fn with_alloc_size(chunk: usize) -> Self {
        let chunk = chunk.max(1);
        Self {
            bytes: Vec::with_capacity(chunk),
            start: 0,
            chunk,
        }
    }

    /// Makes room for `n` more bytes, dropping already flushed ones first.
    fn reserve(&mut self, n: usize) {
        if self.bytes.capacity() - self.bytes.len() >= n {
            return;
        }
        if self.start > 0 {
            self.bytes.drain(..self.start);
            self.start = 0;
        }
        let need = n.saturating_sub(self.bytes.capacity() - self.bytes.len());
        if need > 0 {
            self.bytes.reserve(need.max(self.chunk).max(self.bytes.len()));
        }
    }

    /// Number of pending bytes.
    pub fn len(&self) -> usize {
        self.bytes.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> &[u8] {
        &self.bytes[self.start..]
    }

    /// Drops the pending bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.start = 0;
    }

    /// Takes the pending bytes.
    pub fn flush(&mut self) -> Vec<u8> {
        let out = self.bytes[self.start..].to_vec();
        self.start = self.bytes.len();
        out
    }

    #[inline]
    pub fn u8(&mut self, b: u8) {
        self.reserve(1);
        self.bytes.push(b);
    }

    /// Big-endian, so `0x0d0a` writes CR LF.
    #[inline]
    pub fn u16(&mut self, v: u16) {
        self.buf(&v.to_be_bytes());
    }

    pub fn buf(&mut self, b: &[u8]) {
        self.reserve(b.len());
        self.bytes.extend_from_slice(b);
    }

    /// Returns the number of bytes written.
    pub fn utf8(&mut self, s: &str) -> usize {
        self.buf(s.as_bytes());
        s.len()
    }

    /// ASCII decimal digits of `n`.
    pub fn uint(&mut self, mut n: u64) {
        let mut digits = [0u8; 20];
        let mut i = digits.len();
        loop {
            i -= 1;
            digits[i] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        self.buf(&digits[i..]);
    }

    /// ASCII decimal digits of `n`, with a leading `-` when negative.
    pub fn int(&mut self, n: i64) {
        if n < 0 {
            self.u8(b'-');
        }
        self.uint(n.unsigned_abs());
    }
}
