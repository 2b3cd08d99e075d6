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

use std::fmt;
use std::io::{self, BufRead, Read};

use crate::bounded::BoundedReader;
use crate::error::{RecordPosition, Result};
use crate::header::HeaderMap;
use crate::http::{ResponseBlock, ResponseHead};

/// WARC record type enum
///
/// Discriminants are bit flags so that sets of types can be expressed as a
/// `u16` mask (see [`WarcRecordType::matches_bitmask`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarcRecordType {
    WarcInfo = 2,
    Response = 4,
    Resource = 8,
    Request = 16,
    Metadata = 32,
    Revisit = 64,
    Conversion = 128,
    Continuation = 256,
    Unknown = 512,
}

impl WarcRecordType {
    /// Mask matching every record type.
    pub const ANY: u16 = 0xFFFF;

    pub const ALL: [WarcRecordType; 9] = [
        WarcRecordType::WarcInfo,
        WarcRecordType::Response,
        WarcRecordType::Resource,
        WarcRecordType::Request,
        WarcRecordType::Metadata,
        WarcRecordType::Revisit,
        WarcRecordType::Conversion,
        WarcRecordType::Continuation,
        WarcRecordType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WarcRecordType::WarcInfo => "warcinfo",
            WarcRecordType::Response => "response",
            WarcRecordType::Resource => "resource",
            WarcRecordType::Request => "request",
            WarcRecordType::Metadata => "metadata",
            WarcRecordType::Revisit => "revisit",
            WarcRecordType::Conversion => "conversion",
            WarcRecordType::Continuation => "continuation",
            WarcRecordType::Unknown => "unknown",
        }
    }

    /// Parse a `WARC-Type` value. Unrecognised names map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        WarcRecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(WarcRecordType::Unknown)
    }

    pub fn matches_bitmask(&self, bitmask: u16) -> bool {
        (*self as u16) & bitmask != 0
    }
}

impl fmt::Display for WarcRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WARC format version from the record's version line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WarcVersion {
    pub major: u8,
    pub minor: u8,
}

impl WarcVersion {
    pub const V1_0: WarcVersion = WarcVersion { major: 1, minor: 0 };
    pub const V1_1: WarcVersion = WarcVersion { major: 1, minor: 1 };
}

impl fmt::Display for WarcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WARC/{}.{}", self.major, self.minor)
    }
}

/// Version line and header block of a framed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHead {
    pub version: WarcVersion,
    pub record_type: WarcRecordType,
    pub headers: HeaderMap,
    /// Authoritative byte count of the content block.
    pub content_length: u64,
    pub position: RecordPosition,
}

impl RecordHead {
    /// Whether the content block is declared as an HTTP message.
    pub fn is_http(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/http"))
    }

    pub fn content_type(&self) -> Option<String> {
        self.headers.get_first("Content-Type")
    }

    pub fn record_id(&self) -> Option<String> {
        self.headers.get_first("WARC-Record-ID")
    }

    pub fn target_uri(&self) -> Option<String> {
        self.headers.get_first("WARC-Target-URI")
    }

    pub fn date(&self) -> Option<String> {
        self.headers.get_first("WARC-Date")
    }
}

/// Content block of a record, dispatched once by record type.
#[derive(Debug)]
pub enum ContentBlock<B> {
    /// Raw bytes, exactly `Content-Length` of them.
    Opaque(BoundedReader<B>),
    /// A `response` record's block decoded as HTTP.
    Response(ResponseBlock<B>),
}

impl<B: BufRead> Read for ContentBlock<B> {
    /// Reads raw block bytes, or the entity body for decoded responses.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ContentBlock::Opaque(reader) => reader.read(buf),
            ContentBlock::Response(block) => block.body().read(buf),
        }
    }
}

/// A WARC record framed from a stream.
///
/// The content block borrows the stream it was read from. The iterator it
/// came from cannot advance until the record is dropped; any unread content
/// is skipped automatically at that point.
#[derive(Debug)]
pub struct WarcRecord<B> {
    head: RecordHead,
    block: ContentBlock<B>,
}

impl<B: BufRead> WarcRecord<B> {
    pub fn new(head: RecordHead, block: ContentBlock<B>) -> Self {
        WarcRecord { head, block }
    }

    pub fn head(&self) -> &RecordHead {
        &self.head
    }

    pub fn record_type(&self) -> WarcRecordType {
        self.head.record_type
    }

    pub fn version(&self) -> WarcVersion {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn content_length(&self) -> u64 {
        self.head.content_length
    }

    pub fn position(&self) -> RecordPosition {
        self.head.position
    }

    pub fn record_id(&self) -> Option<String> {
        self.head.record_id()
    }

    pub fn target_uri(&self) -> Option<String> {
        self.head.target_uri()
    }

    pub fn date(&self) -> Option<String> {
        self.head.date()
    }

    pub fn content_type(&self) -> Option<String> {
        self.head.content_type()
    }

    pub fn is_http(&self) -> bool {
        self.head.is_http()
    }

    pub fn block(&mut self) -> &mut ContentBlock<B> {
        &mut self.block
    }

    /// Decoded HTTP response, if this is a response record that was parsed.
    pub fn response(&self) -> Option<&ResponseBlock<B>> {
        match &self.block {
            ContentBlock::Response(block) => Some(block),
            ContentBlock::Opaque(_) => None,
        }
    }

    pub fn response_mut(&mut self) -> Option<&mut ResponseBlock<B>> {
        match &mut self.block {
            ContentBlock::Response(block) => Some(block),
            ContentBlock::Opaque(_) => None,
        }
    }

    pub fn into_parts(self) -> (RecordHead, ContentBlock<B>) {
        (self.head, self.block)
    }

    /// Detach the record from the stream by reading the rest of its body.
    pub fn freeze(self) -> Result<FrozenRecord> {
        let content = match self.block {
            ContentBlock::Opaque(mut reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                FrozenContent::Opaque(data)
            }
            ContentBlock::Response(block) => {
                let (head, mut body) = block.into_parts();
                let mut data = Vec::new();
                body.read_to_end(&mut data)?;
                FrozenContent::Response { head, body: data }
            }
        };
        Ok(FrozenRecord {
            head: self.head,
            content,
        })
    }
}

impl<B: BufRead> Read for WarcRecord<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.block.read(buf)
    }
}

/// In-memory content of a [`FrozenRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrozenContent {
    Opaque(Vec<u8>),
    Response { head: ResponseHead, body: Vec<u8> },
}

/// A record detached from its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenRecord {
    pub head: RecordHead,
    pub content: FrozenContent,
}

impl FrozenRecord {
    pub fn record_type(&self) -> WarcRecordType {
        self.head.record_type
    }

    pub fn response(&self) -> Option<&ResponseHead> {
        match &self.content {
            FrozenContent::Response { head, .. } => Some(head),
            FrozenContent::Opaque(_) => None,
        }
    }

    /// Raw block bytes, or the entity body for decoded responses.
    pub fn body(&self) -> &[u8] {
        match &self.content {
            FrozenContent::Opaque(data) => data,
            FrozenContent::Response { body, .. } => body,
        }
    }
}
