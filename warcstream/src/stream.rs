// Copyright 2025 Janek Bevendorff
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::{self, BufRead, Read};

/// Buffered input stream that keeps track of how many bytes have been consumed.
///
/// The offset is the position of the shared read cursor in the uncompressed
/// WARC stream. Record boundaries are expressed in terms of this offset.
#[derive(Debug)]
pub struct StreamCursor<R> {
    inner: R,
    offset: u64,
}

impl<R: BufRead> StreamCursor<R> {
    pub fn new(inner: R) -> Self {
        StreamCursor { inner, offset: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Consume any run of `\r` and `\n` bytes at the cursor.
    ///
    /// Returns the number of bytes skipped.
    pub fn skip_line_breaks(&mut self) -> io::Result<u64> {
        let mut skipped = 0u64;
        loop {
            let buf = self.fill_buf()?;
            let n = buf.iter().take_while(|&&b| b == b'\r' || b == b'\n').count();
            if n == 0 {
                return Ok(skipped);
            }
            self.consume(n);
            skipped += n as u64;
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> Read for StreamCursor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for StreamCursor<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.offset += amt as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_reads_and_consumes() {
        let mut cursor = StreamCursor::new(&b"abc\r\n\r\ndef"[..]);
        let mut buf = [0u8; 3];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(cursor.offset(), 3);

        assert_eq!(cursor.skip_line_breaks().unwrap(), 4);
        assert_eq!(cursor.offset(), 7);

        let mut rest = String::new();
        cursor.read_line(&mut rest).unwrap();
        assert_eq!(rest, "def");
        assert_eq!(cursor.offset(), 10);
        assert_eq!(cursor.skip_line_breaks().unwrap(), 0);
    }
}
