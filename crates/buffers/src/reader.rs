//! Pull-based reader over an [`io::Read`] source with cursor tracking.

use std::io::{self, Read};

const DEFAULT_CHUNK: usize = 4 * 1024;

/// A buffered reader that exposes its unread bytes for peeking.
///
/// Reads from the source happen only when a caller needs more bytes than are
/// buffered. Bytes read past the current token stay in the buffer, so the
/// cursor always sits exactly at the start of the next token, including when
/// several messages arrive back-to-back in one read.
///
/// # Example
///
/// ```
/// use objconv_buffers::StreamReader;
///
/// let mut reader = StreamReader::new(&b"+OK\r\n:1\r\n"[..]);
/// let n = reader.peek_line(64).unwrap().unwrap();
/// assert_eq!(&reader.buffer()[..n], b"+OK");
/// reader.consume(n + 2);
/// assert_eq!(reader.peek().unwrap(), Some(b':'));
/// ```
pub struct StreamReader<R> {
    inner: R,
    /// The underlying byte buffer.
    buf: Vec<u8>,
    /// Current cursor position.
    x: usize,
    /// End of valid data (exclusive).
    end: usize,
    /// Set once the source reported end of file.
    eof: bool,
    chunk: usize,
}

impl<R: Read> StreamReader<R> {
    /// Creates a new reader pulling from `inner`.
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK, inner)
    }

    /// Creates a new reader that requests `chunk` bytes per read.
    pub fn with_chunk_size(chunk: usize, inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            x: 0,
            end: 0,
            eof: false,
            chunk: chunk.max(1),
        }
    }

    /// Replaces the source and discards buffered bytes. The allocation is kept.
    pub fn reset(&mut self, inner: R) {
        self.inner = inner;
        self.x = 0;
        self.end = 0;
        self.eof = false;
    }

    /// Replaces the buffered bytes with a copy of `data`, reusing the
    /// allocation. The source is left untouched and is read once `data` is
    /// exhausted.
    pub fn load(&mut self, data: &[u8]) {
        self.buf.clear();
        self.buf.extend_from_slice(data);
        self.x = 0;
        self.end = data.len();
        self.eof = false;
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Returns the number of buffered, unread bytes.
    pub fn size(&self) -> usize {
        self.end - self.x
    }

    /// Bytes allocated for buffering.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Returns the buffered, unread bytes.
    pub fn buffer(&self) -> &[u8] {
        &self.buf[self.x..self.end]
    }

    /// Advances the cursor by `n` buffered bytes.
    pub fn consume(&mut self, n: usize) {
        self.x = (self.x + n).min(self.end);
        if self.x == self.end {
            self.x = 0;
            self.end = 0;
        }
    }

    /// Makes sure at least `n` bytes are buffered. Returns `false` when the
    /// source ends first.
    ///
    /// The buffer grows one chunk per read, so its size follows the bytes
    /// that actually arrived rather than `n`.
    pub fn fill(&mut self, n: usize) -> io::Result<bool> {
        while self.size() < n {
            if self.eof || !self.read_more()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Peeks at the next byte without advancing the cursor. `None` means the
    /// source is exhausted and nothing is buffered.
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        if !self.fill(1)? {
            return Ok(None);
        }
        Ok(Some(self.buf[self.x]))
    }

    /// Finds the next CRLF-terminated line and returns its length, CRLF
    /// excluded. The line stays buffered.
    ///
    /// Returns `None` at a clean end of input and an `UnexpectedEof` error when
    /// the input stops in the middle of a line. Lines longer than `limit` fail
    /// with `InvalidData`.
    pub fn peek_line(&mut self, limit: usize) -> io::Result<Option<usize>> {
        let mut scanned = 0;
        loop {
            let data = self.buffer();
            if let Some(i) = find_crlf(&data[scanned..]) {
                return Ok(Some(scanned + i));
            }
            // The last byte may be a CR whose LF has not arrived yet.
            scanned = data.len().saturating_sub(1);
            if scanned > limit {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "line exceeds the configured limit",
                ));
            }
            if self.eof || !self.read_more()? {
                return if self.size() == 0 {
                    Ok(None)
                } else {
                    Err(io::ErrorKind::UnexpectedEof.into())
                };
            }
        }
    }

    /// Releases the allocation when it grew past `max` bytes, keeping the
    /// buffered bytes.
    pub fn shrink_to(&mut self, max: usize) {
        if self.buf.capacity() <= max {
            return;
        }
        self.compact();
        self.buf.truncate(self.end);
        self.buf.shrink_to(max.max(self.end));
    }

    fn compact(&mut self) {
        if self.x > 0 {
            self.buf.copy_within(self.x..self.end, 0);
            self.end -= self.x;
            self.x = 0;
        }
    }

    fn read_more(&mut self) -> io::Result<bool> {
        self.compact();
        let want = self.end + self.chunk;
        if self.buf.len() < want {
            self.buf.resize(want, 0);
        }
        loop {
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(false);
                }
                Ok(n) => {
                    self.end += n;
                    return Ok(true);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `step` bytes per read call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(self.data.len()).min(out.len());
            out[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_peek_line_across_reads() {
        let src = Trickle {
            data: b"$5\r\nhello\r\n",
            step: 1,
        };
        let mut reader = StreamReader::with_chunk_size(1, src);
        let n = reader.peek_line(1024).unwrap().unwrap();
        assert_eq!(&reader.buffer()[..n], b"$5");
        reader.consume(n + 2);
        assert!(reader.fill(7).unwrap());
        assert_eq!(&reader.buffer()[..7], b"hello\r\n");
        reader.consume(7);
        assert_eq!(reader.peek().unwrap(), None);
    }

    #[test]
    fn test_bare_lf_is_not_a_terminator() {
        let mut reader = StreamReader::new(&b"+a\nb\r\n"[..]);
        let n = reader.peek_line(1024).unwrap().unwrap();
        assert_eq!(&reader.buffer()[..n], b"+a\nb");
    }

    #[test]
    fn test_truncated_line() {
        let mut reader = StreamReader::new(&b"+partial"[..]);
        let err = reader.peek_line(1024).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_line_limit() {
        let mut reader = StreamReader::with_chunk_size(4, &b"+aaaaaaaaaaaaaaaa\r\n"[..]);
        let err = reader.peek_line(8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_residual_bytes_survive() {
        let mut reader = StreamReader::new(&b":1\r\n:2\r\n"[..]);
        let n = reader.peek_line(64).unwrap().unwrap();
        reader.consume(n + 2);
        assert_eq!(reader.buffer(), b":2\r\n");
    }

    #[test]
    fn test_load_reuses_buffer() {
        let mut reader = StreamReader::new(io::empty());
        reader.load(b"+first\r\n");
        assert_eq!(reader.size(), 8);
        reader.load(b"+x\r\n");
        assert_eq!(reader.buffer(), b"+x\r\n");
        reader.consume(4);
        assert_eq!(reader.peek().unwrap(), None);
    }

    /// Records the largest slice a read call was handed.
    struct Spy<'a> {
        data: &'a [u8],
        largest: usize,
    }

    impl Read for Spy<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            self.largest = self.largest.max(out.len());
            let n = self.data.len().min(out.len());
            out[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_fill_grows_with_the_data() {
        let src = Spy {
            data: b"ab",
            largest: 0,
        };
        let mut reader = StreamReader::with_chunk_size(16, src);
        assert!(!reader.fill(1 << 29).unwrap());
        assert_eq!(reader.size(), 2);
        assert!(reader.get_ref().largest <= 16);
    }

    #[test]
    fn test_shrink_keeps_buffered_bytes() {
        let data = vec![b'x'; 64];
        let mut reader = StreamReader::with_chunk_size(64, &data[..]);
        assert!(reader.fill(64).unwrap());
        reader.consume(60);
        reader.shrink_to(8);
        assert!(reader.capacity() <= 8);
        assert_eq!(reader.buffer(), b"xxxx");
        assert!(reader.fill(4).unwrap());
    }
}
