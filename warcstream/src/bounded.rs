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

use crate::error::{Result, WarcError};

/// Stream view that yields at most `limit` bytes of an underlying stream.
///
/// Once the limit is reached, the reader reports end-of-stream even if the
/// underlying stream has more data. If the underlying stream ends first,
/// reads fail with [`WarcError::TruncatedStream`] (wrapped in an
/// [`io::Error`] of kind `UnexpectedEof`).
///
/// `bytes_yielded() + remaining_bytes() == limit()` holds at all times.
#[derive(Debug)]
pub struct BoundedReader<R> {
    inner: R,
    limit: u64,
    remaining: u64,
}

impl<R: BufRead> BoundedReader<R> {
    /// Open a view over `inner` limited to `limit` bytes.
    ///
    /// # Arguments
    ///
    /// * `inner` - Underlying stream, read from its current position
    /// * `limit` - Maximum number of bytes to yield
    pub fn new(inner: R, limit: u64) -> Self {
        BoundedReader {
            inner,
            limit,
            remaining: limit,
        }
    }

    /// Reopen a view whose first `yielded` bytes were already consumed
    /// through an earlier view over the same stream.
    pub(crate) fn resume(inner: R, limit: u64, yielded: u64) -> Self {
        BoundedReader {
            inner,
            limit,
            remaining: limit.saturating_sub(yielded),
        }
    }

    /// Total number of bytes this view may yield.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Bytes not yet yielded.
    pub fn remaining_bytes(&self) -> u64 {
        self.remaining
    }

    /// Bytes yielded so far.
    pub fn bytes_yielded(&self) -> u64 {
        self.limit - self.remaining
    }

    /// Whether the limit has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Consume and discard all remaining bytes.
    ///
    /// Returns the number of bytes discarded. Fails with
    /// [`WarcError::TruncatedStream`] if the underlying stream ends first.
    pub fn drain(&mut self) -> Result<u64> {
        let mut drained = 0u64;
        loop {
            let n = self.fill_buf()?.len();
            if n == 0 {
                return Ok(drained);
            }
            self.consume(n);
            drained += n as u64;
        }
    }

    /// Shared reference to the underlying stream.
    ///
    /// The view never hands out the stream itself, so bytes past the limit
    /// cannot be read through it.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    fn truncated(&self) -> io::Error {
        WarcError::TruncatedStream {
            expected: self.limit,
            actual: self.bytes_yielded(),
        }
        .into()
    }
}

impl<R: BufRead> Read for BoundedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for BoundedReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.remaining == 0 {
            return Ok(&[]);
        }
        if self.inner.fill_buf()?.is_empty() {
            return Err(self.truncated());
        }
        let max = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        let buf = self.inner.fill_buf()?;
        Ok(&buf[..buf.len().min(max)])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        self.inner.consume(amt);
        self.remaining -= amt as u64;
    }
}
