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

//! Decoding of HTTP responses embedded in `response` record content blocks.
//!
//! Only the subset of HTTP/1.x needed to read archived responses is
//! supported: a status line, a header block and a body framed by
//! `Content-Length`, `Transfer-Encoding: chunked`, or the end of the
//! content block. The WARC content block bound always wins: a body never
//! reads past it, whatever the HTTP headers claim.

use std::fmt;
use std::io::{self, BufRead, Read};

use tracing::{debug, warn};

use crate::bounded::BoundedReader;
use crate::error::{Result, WarcError};
use crate::header::{read_header_block, read_line, trim_line_end, HeaderEncoding, HeaderMap};

/// HTTP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// Status line and headers of an embedded HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: HttpVersion,
    pub status_code: u16,
    pub reason_phrase: String,
    pub headers: HeaderMap,
}

fn cannot_parse(detail: impl fmt::Display) -> WarcError {
    WarcError::format(format!("cannot parse embedded response: {detail}"))
}

/// Parse `<digits>.<digits>` into a version pair.
pub(crate) fn parse_version_pair(s: &[u8]) -> Option<(u8, u8)> {
    let dot = s.iter().position(|&b| b == b'.')?;
    let (major, minor) = (&s[..dot], &s[dot + 1..]);
    if major.is_empty() || minor.is_empty() {
        return None;
    }
    if !major.iter().chain(minor).all(u8::is_ascii_digit) {
        return None;
    }
    let major = std::str::from_utf8(major).ok()?.parse().ok()?;
    let minor = std::str::from_utf8(minor).ok()?.parse().ok()?;
    Some((major, minor))
}

fn parse_status_line(line: &[u8]) -> Option<(HttpVersion, u16, String)> {
    let mut parts = line.splitn(3, |&b| b == b' ');
    let (major, minor) = parse_version_pair(parts.next()?.strip_prefix(b"HTTP/")?)?;
    let code = parts.next()?;
    if code.len() != 3 || !code.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let status_code = std::str::from_utf8(code).ok()?.parse().ok()?;
    let reason = HeaderEncoding::Latin1.decode(parts.next().unwrap_or_default().trim_ascii());
    Some((HttpVersion { major, minor }, status_code, reason))
}

impl ResponseHead {
    /// Read the status line and header block from `reader`.
    ///
    /// With `strict` set, a malformed header line fails the whole response;
    /// otherwise it is skipped.
    pub fn parse<R: BufRead>(reader: &mut R, strict: bool) -> Result<Self> {
        let mut line = Vec::new();
        read_line(reader, &mut line)?;
        let (version, status_code, reason_phrase) = parse_status_line(trim_line_end(&line))
            .ok_or_else(|| {
                cannot_parse(format!(
                    "bad status line {:?}",
                    String::from_utf8_lossy(trim_line_end(&line))
                ))
            })?;

        let mut headers = HeaderMap::new(HeaderEncoding::Latin1);
        read_header_block(reader, &mut headers, |err| {
            if strict {
                Err(cannot_parse(err))
            } else {
                debug!("skipping malformed HTTP header: {err}");
                Ok(())
            }
        })?;

        Ok(ResponseHead {
            version,
            status_code,
            reason_phrase,
            headers,
        })
    }

    /// Plain `Content-Type` without parameters such as `charset=`.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get_first("Content-Type")?
            .split(';')
            .next()
            .map(|s| s.trim().to_string())
    }

    /// Whether the final transfer coding is `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get("Transfer-Encoding")
            .and_then(|te| {
                te.rsplit(',')
                    .next()
                    .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
            })
            .unwrap_or(false)
    }

    /// Declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers.get_first("Content-Length")?.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(u64),
    DataEnd,
    Trailer,
    Done,
}

/// Lazily decodes a `Transfer-Encoding: chunked` body.
///
/// If the source ends before the terminating zero-size chunk, the body ends
/// there. Trailer fields are consumed and discarded.
#[derive(Debug)]
pub struct ChunkedReader<R> {
    inner: R,
    state: ChunkState,
    line: Vec<u8>,
}

impl<R: BufRead> ChunkedReader<R> {
    pub fn new(inner: R) -> Self {
        ChunkedReader {
            inner,
            state: ChunkState::Size,
            line: Vec::new(),
        }
    }

    /// Read the next control line; `None` once the source is exhausted.
    fn next_line(&mut self) -> Result<Option<&[u8]>> {
        if read_line(&mut self.inner, &mut self.line)? == 0 {
            return Ok(None);
        }
        Ok(Some(trim_line_end(&self.line)))
    }

    fn parse_chunk_size(line: &[u8]) -> Result<u64> {
        let size = line
            .split(|&b| b == b';')
            .next()
            .unwrap_or_default()
            .trim_ascii();
        std::str::from_utf8(size)
            .ok()
            .and_then(|s| u64::from_str_radix(s, 16).ok())
            .ok_or_else(|| {
                WarcError::format(format!(
                    "invalid chunk size {:?}",
                    String::from_utf8_lossy(line)
                ))
            })
    }

    /// Advance through control lines until data is available or the body ends.
    fn advance(&mut self) -> Result<()> {
        loop {
            match self.state {
                ChunkState::Data(_) | ChunkState::Done => return Ok(()),
                ChunkState::Size => {
                    let size = match self.next_line()? {
                        None => {
                            debug!("chunked body ended before last chunk");
                            self.state = ChunkState::Done;
                            continue;
                        }
                        Some(line) if line.is_empty() => continue,
                        Some(line) => Self::parse_chunk_size(line)?,
                    };
                    self.state = if size == 0 {
                        ChunkState::Trailer
                    } else {
                        ChunkState::Data(size)
                    };
                }
                ChunkState::DataEnd => {
                    self.next_line()?;
                    self.state = ChunkState::Size;
                }
                ChunkState::Trailer => {
                    self.state = match self.next_line()? {
                        Some(line) if !line.is_empty() => ChunkState::Trailer,
                        _ => ChunkState::Done,
                    };
                }
            }
        }
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.advance()?;
        let ChunkState::Data(remaining) = self.state else {
            return Ok(0);
        };
        let max = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            debug!("chunked body ended inside a chunk");
            self.state = ChunkState::Done;
            return Ok(0);
        }
        let remaining = remaining - n as u64;
        self.state = if remaining == 0 {
            ChunkState::DataEnd
        } else {
            ChunkState::Data(remaining)
        };
        Ok(n)
    }
}

/// Entity body of an embedded response.
///
/// The source `B` is the record's content block stream. Every variant reads
/// through the content block bound.
#[derive(Debug)]
pub enum HttpBody<B> {
    /// Body bounded by the HTTP `Content-Length` (capped at the content block).
    Sized(BoundedReader<BoundedReader<B>>),
    /// Chunked transfer coding, decoded on the fly.
    Chunked(ChunkedReader<BoundedReader<B>>),
    /// Everything up to the end of the content block.
    Identity(BoundedReader<B>),
}

impl<B: BufRead> HttpBody<B> {
    /// Choose the body framing from the response headers.
    pub fn new(head: &ResponseHead, source: BoundedReader<B>) -> Self {
        if head.is_chunked() {
            return HttpBody::Chunked(ChunkedReader::new(source));
        }
        match head.content_length() {
            Some(declared) => {
                let available = source.remaining_bytes();
                if declared != available {
                    warn!(
                        declared,
                        available,
                        "HTTP Content-Length disagrees with WARC content block, capping"
                    );
                }
                HttpBody::Sized(BoundedReader::new(source, declared.min(available)))
            }
            None => HttpBody::Identity(source),
        }
    }

    /// Content block stream underneath the body decoder.
    pub fn source(&self) -> &BoundedReader<B> {
        match self {
            HttpBody::Sized(reader) => reader.get_ref(),
            HttpBody::Chunked(reader) => &reader.inner,
            HttpBody::Identity(reader) => reader,
        }
    }
}

impl<B: BufRead> Read for HttpBody<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            HttpBody::Sized(reader) => reader.read(buf),
            HttpBody::Chunked(reader) => reader.read(buf),
            HttpBody::Identity(reader) => reader.read(buf),
        }
    }
}

/// Content block of a `response` record decoded as HTTP.
#[derive(Debug)]
pub struct ResponseBlock<B> {
    head: ResponseHead,
    body: HttpBody<B>,
}

impl<B: BufRead> ResponseBlock<B> {
    /// Decode status line and headers from a content block and set up the body.
    pub fn decode(mut source: BoundedReader<B>, strict: bool) -> Result<Self> {
        let head = ResponseHead::parse(&mut source, strict)?;
        Ok(Self::from_head(head, source))
    }

    /// Assemble a block from an already parsed head and the rest of the content block.
    pub fn from_head(head: ResponseHead, source: BoundedReader<B>) -> Self {
        let body = HttpBody::new(&head, source);
        ResponseBlock { head, body }
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn status_code(&self) -> u16 {
        self.head.status_code
    }

    pub fn reason_phrase(&self) -> &str {
        &self.head.reason_phrase
    }

    pub fn protocol_version(&self) -> HttpVersion {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn body(&mut self) -> &mut HttpBody<B> {
        &mut self.body
    }

    pub fn into_parts(self) -> (ResponseHead, HttpBody<B>) {
        (self.head, self.body)
    }
}
