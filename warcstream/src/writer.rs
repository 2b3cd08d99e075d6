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

use std::io::{self, Write};

use uuid::Uuid;

use crate::header::{HeaderEncoding, HeaderMap};
use crate::record::{WarcRecordType, WarcVersion};

/// Builder for the version line and header block of a new record.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    version: WarcVersion,
    record_type: WarcRecordType,
    record_urn: Option<String>,
    date: Option<String>,
    extra: HeaderMap,
}

impl RecordBuilder {
    /// Create a builder for a record of the given type (WARC/1.1 by default).
    ///
    /// # Arguments
    ///
    /// * `record_type` - Value of the `WARC-Type` header
    pub fn new(record_type: WarcRecordType) -> Self {
        RecordBuilder {
            version: WarcVersion::V1_1,
            record_type,
            record_urn: None,
            date: None,
            extra: HeaderMap::new(HeaderEncoding::Utf8),
        }
    }

    /// Set the WARC version written to the version line.
    pub fn version(mut self, version: WarcVersion) -> Self {
        self.version = version;
        self
    }

    /// WARC-Record-ID as URN without `'<'`, `'>'` (random `urn:uuid:` if unset).
    pub fn record_urn(mut self, urn: impl Into<String>) -> Self {
        self.record_urn = Some(urn.into());
        self
    }

    /// Fixed WARC-Date (current UTC time if unset).
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Add a header, written after the mandatory ones.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    /// * `value` - Header value
    pub fn header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.extra.append(key, value);
        self
    }

    /// Build the header block for a content block of `content_length` bytes.
    ///
    /// Headers are ordered `WARC-Type`, `WARC-Date`, `WARC-Record-ID`, any
    /// extra headers and finally `Content-Length`. A random record ID and
    /// the current time are generated on every call unless set explicitly.
    pub fn headers(&self, content_length: u64) -> HeaderMap {
        let urn = self
            .record_urn
            .clone()
            .unwrap_or_else(|| format!("urn:uuid:{}", Uuid::new_v4()));
        let date = self
            .date
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());

        let mut headers = HeaderMap::new(HeaderEncoding::Utf8);
        headers.append("WARC-Type", self.record_type.as_str());
        headers.append("WARC-Date", date);
        headers.append("WARC-Record-ID", format!("<{urn}>"));
        for (key, value) in self.extra.raw_items() {
            headers.append_bytes(key, value);
        }
        headers.set("Content-Length", content_length.to_string());
        headers
    }
}

/// Writes records in WARC wire format.
#[derive(Debug)]
pub struct WarcWriter<W> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> WarcWriter<W> {
    /// Create a writer on top of an output stream.
    ///
    /// # Arguments
    ///
    /// * `writer` - Output stream, not buffered by the writer
    pub fn new(writer: W) -> Self {
        WarcWriter {
            writer,
            bytes_written: 0,
        }
    }

    /// Total bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write one record with the given content block.
    ///
    /// Returns the number of bytes written for this record, including the
    /// trailing record separator.
    ///
    /// # Arguments
    ///
    /// * `builder` - Record type, version and headers
    /// * `content` - Content block bytes
    pub fn write_record(&mut self, builder: &RecordBuilder, content: &[u8]) -> io::Result<u64> {
        let headers = builder.headers(content.len() as u64);
        self.write_raw(builder.version, &headers, content)
    }

    /// Write a record with a caller-supplied header block.
    ///
    /// `Content-Length` in `headers` is replaced with the length of `content`.
    ///
    /// # Arguments
    ///
    /// * `version` - Version line to write
    /// * `headers` - WARC header block
    /// * `content` - Content block bytes
    pub fn write_raw(
        &mut self,
        version: WarcVersion,
        headers: &HeaderMap,
        content: &[u8],
    ) -> io::Result<u64> {
        let mut headers = headers.clone();
        headers.set("Content-Length", content.len().to_string());

        let version_line = format!("{version}\r\n");
        self.writer.write_all(version_line.as_bytes())?;
        let mut n = version_line.len() as u64;
        n += headers.write(&mut self.writer)? as u64;
        self.writer.write_all(b"\r\n")?;
        self.writer.write_all(content)?;
        self.writer.write_all(b"\r\n\r\n")?;
        n += 2 + content.len() as u64 + 4;

        self.bytes_written += n;
        Ok(n)
    }

    /// Flush the underlying output stream.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Unwrap the writer and return the output stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
