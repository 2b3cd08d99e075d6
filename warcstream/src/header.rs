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

//! Header blocks: `Name: Value` lines terminated by a blank line.

use std::collections::HashMap;
use std::io::{self, BufRead, Read};

use encoding::all::WINDOWS_1252;
use encoding::{DecoderTrap, Encoding};

use crate::error::{Result, WarcError};

/// Upper bound for a single header or status line.
pub const MAX_LINE_LENGTH: u64 = 64 * 1024;

/// Read one line including its terminator into `buf` (cleared first).
///
/// Returns the number of bytes consumed, `0` at end of stream.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize> {
    buf.clear();
    let n = reader.by_ref().take(MAX_LINE_LENGTH).read_until(b'\n', buf)?;
    if n as u64 == MAX_LINE_LENGTH && buf.last() != Some(&b'\n') {
        return Err(WarcError::format(format!(
            "line exceeds {MAX_LINE_LENGTH} bytes"
        )));
    }
    Ok(n)
}

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Case-insensitive string key for headers
#[derive(Debug, Eq, Clone)]
pub struct CaseInsensitiveKey(String);

impl CaseInsensitiveKey {
    pub fn new(s: impl Into<String>) -> Self {
        CaseInsensitiveKey(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for CaseInsensitiveKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl std::hash::Hash for CaseInsensitiveKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl From<&str> for CaseInsensitiveKey {
    fn from(s: &str) -> Self {
        CaseInsensitiveKey::new(s)
    }
}

/// Text encoding used to decode header bytes.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum HeaderEncoding {
    /// UTF-8, invalid sequences replaced (WARC headers).
    Utf8,
    /// ISO-8859-1 / Windows-1252 (HTTP headers).
    Latin1,
}

impl HeaderEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            HeaderEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            HeaderEncoding::Latin1 => WINDOWS_1252
                .decode(bytes, DecoderTrap::Replace)
                .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Ordered WARC or HTTP header block.
///
/// Keys and values are kept as raw bytes and decoded on access. Insertion
/// order and duplicate keys (e.g. `Set-Cookie`) are preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    encoding: HeaderEncoding,
    headers: Vec<(Vec<u8>, Vec<u8>)>,
}

impl HeaderMap {
    /// Create a new header map with the specified encoding.
    ///
    /// # Arguments
    ///
    /// * `encoding` - Header source encoding
    pub fn new(encoding: HeaderEncoding) -> Self {
        HeaderMap {
            encoding,
            headers: Vec::new(),
        }
    }

    /// Get the header encoding.
    pub fn encoding(&self) -> HeaderEncoding {
        self.encoding
    }

    /// Get value for (case-insensitive) header key as a string.
    /// Duplicate headers are returned as a single value joined with `","`.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get(&self, key: &str) -> Option<String> {
        Some(self.encoding.decode(&self.get_bytes(key.as_bytes())?))
    }

    /// Get value for (case-insensitive) header key as bytes.
    /// Duplicate headers are returned as a single value joined with `","`.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get_bytes(&self, key: &[u8]) -> Option<Vec<u8>> {
        let values: Vec<&[u8]> = self.values_for(key).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(&b","[..]))
        }
    }

    /// Get the first value for (case-insensitive) header key, ignoring
    /// any duplicates.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get_first(&self, key: &str) -> Option<String> {
        self.values_for(key.as_bytes())
            .next()
            .map(|v| self.encoding.decode(v))
    }

    /// Get all values for (case-insensitive) header key in block order.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.values_for(key.as_bytes())
            .map(|v| self.encoding.decode(v))
            .collect()
    }

    fn values_for<'a>(&'a self, key: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
    }

    /// Check if a (case-insensitive) header key exists.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn contains_key(&self, key: &str) -> bool {
        self.values_for(key.as_bytes()).next().is_some()
    }

    /// Append header without checking for existing keys.
    ///
    /// Key and value are trimmed of surrounding whitespace.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    /// * `value` - Header value
    pub fn append(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.append_bytes(key.as_ref().as_bytes(), value.as_ref().as_bytes());
    }

    /// Append raw header bytes without checking for existing keys.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    /// * `value` - Header value
    pub fn append_bytes(&mut self, key: &[u8], value: &[u8]) {
        self.headers
            .push((key.trim_ascii().to_vec(), value.trim_ascii().to_vec()));
    }

    /// Insert new header and overwrite existing header(s) if the key already exists.
    ///
    /// Insertion causes a full traversal of all headers. If a header already
    /// exists, its first occurrence will be updated and all following
    /// occurrences will be dropped.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    /// * `value` - Header value
    pub fn set(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        let key = key.as_ref().trim().as_bytes();
        let value = value.as_ref().trim().as_bytes();
        let mut found = false;
        self.headers.retain_mut(|(k, v)| {
            if !k.eq_ignore_ascii_case(key) {
                true
            } else if !found {
                *v = value.to_vec();
                found = true;
                true
            } else {
                false
            }
        });
        if !found {
            self.headers.push((key.to_vec(), value.to_vec()));
        }
    }

    /// Iterator over decoded `(key, value)` pairs in order, duplicates kept.
    pub fn items(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.headers
            .iter()
            .map(|(k, v)| (self.encoding.decode(k), self.encoding.decode(v)))
    }

    /// Iterator over raw `(key, value)` byte pairs in order.
    pub fn raw_items(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.headers.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Iterator over decoded header keys (may contain duplicates).
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.headers.iter().map(|(k, _)| self.encoding.decode(k))
    }

    /// Header block as a list of decoded `(key, value)` tuples.
    pub fn to_tuples(&self) -> Vec<(String, String)> {
        self.items().collect()
    }

    /// Header block as a map with case-insensitive keys.
    /// Values of duplicate keys are joined with `","`.
    pub fn to_map(&self) -> HashMap<CaseInsensitiveKey, String> {
        let mut map: HashMap<CaseInsensitiveKey, String> = HashMap::new();
        for (k, v) in self.items() {
            map.entry(CaseInsensitiveKey::new(k))
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(&v);
                })
                .or_insert(v);
        }
        map
    }

    /// Number of header lines, counting duplicates separately.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the header block has no lines.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Write header lines in wire format (without the terminating blank line).
    ///
    /// Returns the number of bytes written.
    ///
    /// # Arguments
    ///
    /// * `writer` - Output stream
    pub fn write<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        let mut bytes_written = 0usize;
        for (key, value) in &self.headers {
            writer.write_all(key)?;
            writer.write_all(b": ")?;
            writer.write_all(value)?;
            writer.write_all(b"\r\n")?;
            bytes_written += key.len() + value.len() + 4;
        }
        Ok(bytes_written)
    }

    /// Fold a continuation line into the previous value.
    fn add_continuation(&mut self, value: &[u8]) -> bool {
        match self.headers.last_mut() {
            Some((_, last)) => {
                if !last.is_empty() {
                    last.push(b' ');
                }
                last.extend_from_slice(value);
                true
            }
            None => false,
        }
    }

    fn push_parsed(&mut self, key: &[u8], value: &[u8]) {
        self.headers
            .push((key.trim_ascii().to_vec(), value.trim_ascii_start().to_vec()));
    }
}

/// One parsed line of a header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLine {
    /// A `Name: Value` field, key trimmed, value with leading whitespace removed.
    Field(Vec<u8>, Vec<u8>),
    /// An obsolete folded line (starts with SP or HT) continuing the previous value.
    Continuation(Vec<u8>),
}

/// Iterator over the lines of a header block.
///
/// Ends after the blank line terminating the block (which is consumed) or
/// at end of stream. A line without `:` yields [`WarcError::HeaderSyntax`];
/// the line is consumed, so iteration can continue with the next line.
pub struct HeaderLines<'r, R> {
    reader: &'r mut R,
    buf: Vec<u8>,
    bytes_read: u64,
    done: bool,
}

impl<'r, R: BufRead> HeaderLines<'r, R> {
    pub fn new(reader: &'r mut R) -> Self {
        HeaderLines {
            reader,
            buf: Vec::new(),
            bytes_read: 0,
            done: false,
        }
    }

    /// Bytes consumed so far, including line terminators.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn next_line(&mut self) -> Result<Option<HeaderLine>> {
        let n = read_line(self.reader, &mut self.buf)?;
        self.bytes_read += n as u64;
        let line = trim_line_end(&self.buf);
        if line.is_empty() {
            self.done = true;
            return Ok(None);
        }
        if line[0] == b' ' || line[0] == b'\t' {
            return Ok(Some(HeaderLine::Continuation(line.trim_ascii().to_vec())));
        }
        match line.iter().position(|&b| b == b':') {
            Some(colon) => Ok(Some(HeaderLine::Field(
                line[..colon].trim_ascii().to_vec(),
                line[colon + 1..].trim_ascii_start().to_vec(),
            ))),
            None => Err(WarcError::header_syntax(line)),
        }
    }
}

impl<R: BufRead> Iterator for HeaderLines<'_, R> {
    type Item = Result<HeaderLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_line() {
            Ok(line) => line.map(Ok),
            Err(err @ WarcError::HeaderSyntax { .. }) => Some(Err(err)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Parse a header block into `target`.
///
/// Malformed lines are handed to `on_malformed`, which decides whether to
/// skip them (`Ok(())`) or abort (`Err`). Returns the number of bytes consumed.
pub fn read_header_block<R, F>(
    reader: &mut R,
    target: &mut HeaderMap,
    mut on_malformed: F,
) -> Result<u64>
where
    R: BufRead,
    F: FnMut(WarcError) -> Result<()>,
{
    let mut lines = HeaderLines::new(reader);
    for line in lines.by_ref() {
        match line {
            Ok(HeaderLine::Field(key, value)) => target.push_parsed(&key, &value),
            Ok(HeaderLine::Continuation(value)) => {
                if !target.add_continuation(&value) {
                    on_malformed(WarcError::header_syntax(&value))?;
                }
            }
            Err(err @ WarcError::HeaderSyntax { .. }) => on_malformed(err)?,
            Err(err) => return Err(err),
        }
    }
    Ok(lines.bytes_read())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> (HeaderMap, Vec<String>, u64) {
        let mut reader = input;
        let mut headers = HeaderMap::new(HeaderEncoding::Latin1);
        let mut malformed = Vec::new();
        let n = read_header_block(&mut reader, &mut headers, |err| {
            malformed.push(err.to_string());
            Ok(())
        })
        .unwrap();
        (headers, malformed, n)
    }

    #[test]
    fn parses_block_and_stops_at_blank_line() {
        let input = b"Content-Type: text/html\r\nContent-Length:  42\r\n\r\nbody";
        let (headers, malformed, n) = parse(input);
        assert!(malformed.is_empty());
        assert_eq!(n as usize, input.len() - 4);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("content-length").as_deref(), Some("42"));
        assert_eq!(headers.get("CONTENT-TYPE").as_deref(), Some("text/html"));
    }

    #[test]
    fn keeps_duplicates_in_order() {
        let (headers, _, _) = parse(b"Set-Cookie: a=1\r\nX: y\r\nSet-Cookie: b=2\r\n\r\n");
        assert_eq!(headers.get_all("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(headers.get("Set-Cookie").as_deref(), Some("a=1,b=2"));
        assert_eq!(headers.get_first("Set-Cookie").as_deref(), Some("a=1"));
        let keys: Vec<String> = headers.keys().collect();
        assert_eq!(keys, vec!["Set-Cookie", "X", "Set-Cookie"]);
    }

    #[test]
    fn value_splits_at_first_colon() {
        let (headers, _, _) = parse(b"WARC-Target-URI: http://example.com:8080/\n\n");
        assert_eq!(
            headers.get("WARC-Target-URI").as_deref(),
            Some("http://example.com:8080/")
        );
    }

    #[test]
    fn malformed_line_can_be_skipped() {
        let (headers, malformed, _) = parse(b"A: 1\r\nthis is garbage\r\nB: 2\r\n\r\n");
        assert_eq!(malformed.len(), 1);
        assert!(malformed[0].contains("this is garbage"));
        assert_eq!(headers.to_tuples(), vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ]);
    }

    #[test]
    fn malformed_line_can_abort() {
        let mut reader = &b"A: 1\r\nbroken\r\n\r\n"[..];
        let mut headers = HeaderMap::new(HeaderEncoding::Utf8);
        let result = read_header_block(&mut reader, &mut headers, Err);
        assert!(matches!(result, Err(WarcError::HeaderSyntax { .. })));
    }

    #[test]
    fn folds_continuation_lines() {
        let (headers, _, _) = parse(b"X-Long: part one\r\n\tpart two\r\n\r\n");
        assert_eq!(headers.get("X-Long").as_deref(), Some("part one part two"));
    }

    #[test]
    fn end_of_stream_ends_block() {
        let (headers, malformed, n) = parse(b"A: 1\r\nB: 2");
        assert!(malformed.is_empty());
        assert_eq!(headers.len(), 2);
        assert_eq!(n, 10);
    }

    #[test]
    fn latin1_values_decode() {
        let (headers, _, _) = parse(b"X-Name: caf\xe9\r\n\r\n");
        assert_eq!(headers.get("X-Name").as_deref(), Some("café"));
    }

    #[test]
    fn set_replaces_and_dedups() {
        let mut headers = HeaderMap::new(HeaderEncoding::Utf8);
        headers.append("A", "1");
        headers.append("B", "2");
        headers.append("a", "3");
        headers.set("A", "4");
        assert_eq!(headers.to_tuples(), vec![
            ("A".to_string(), "4".to_string()),
            ("B".to_string(), "2".to_string()),
        ]);

        let map = headers.to_map();
        assert_eq!(map.get(&CaseInsensitiveKey::from("b")).map(String::as_str), Some("2"));
    }

    #[test]
    fn write_emits_crlf_lines() {
        let mut headers = HeaderMap::new(HeaderEncoding::Utf8);
        headers.append("WARC-Type", "response");
        headers.append("Content-Length", "0");
        let mut out = Vec::new();
        let n = headers.write(&mut out).unwrap();
        assert_eq!(out, b"WARC-Type: response\r\nContent-Length: 0\r\n");
        assert_eq!(n, out.len());
    }

    #[test]
    fn overlong_line_is_rejected() {
        let mut input = vec![b'a'; MAX_LINE_LENGTH as usize + 10];
        input.extend_from_slice(b": x\r\n\r\n");
        let mut reader = &input[..];
        let mut buf = Vec::new();
        assert!(matches!(
            read_line(&mut reader, &mut buf),
            Err(WarcError::Format { .. })
        ));
    }
}
