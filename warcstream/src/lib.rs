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

//! # warcstream
//!
//! Forward-only reader for Web Archive (WARC) files.
//!
//! The reader splits a byte stream into WARC records whose content blocks
//! are exposed as streams bounded to exactly `Content-Length` bytes.
//! Content blocks of `response` records are decoded as HTTP responses
//! (status line, headers and a lazily read body) without ever reading past
//! the record boundary. Payloads are streamed, not buffered.
//!
//! ## Layout
//!
//! - [`BoundedReader`]: a view of at most N bytes of another stream
//! - [`header`]: header block parsing and [`HeaderMap`]
//! - [`http`]: decoding of embedded HTTP responses
//! - [`ArchiveIterator`]: record framing and iteration
//! - [`WarcWriter`]: writing records
//! - [`transport`]: opening plain or gzip-compressed files
//!
//! ## Example
//!
//! ```no_run
//! use warcstream::{transport, ArchiveIteratorConfig, ErrorPolicy};
//!
//! # fn main() -> warcstream::Result<()> {
//! let config = ArchiveIteratorConfig {
//!     error_policy: ErrorPolicy::SkipAndLog,
//!     ..Default::default()
//! };
//! let mut archive = transport::open_archive("crawl.warc.gz", config)?;
//! while let Some(record) = archive.read_next()? {
//!     if let Some(response) = record.response() {
//!         println!("{} {:?}", response.status_code(), record.target_uri());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod archive;
mod bounded;
mod config;
mod error;
mod framer;
pub mod header;
pub mod http;
mod record;
mod stream;
pub mod transport;
mod writer;

pub use archive::{ArchiveIterator, BlockSource, FrozenRecords};
pub use bounded::BoundedReader;
pub use config::{ArchiveIteratorConfig, ErrorPolicy};
pub use error::{RecordPosition, Result, WarcError};
pub use header::{HeaderEncoding, HeaderMap};
pub use http::{HttpBody, HttpVersion, ResponseBlock, ResponseHead};
pub use record::{
    ContentBlock, FrozenContent, FrozenRecord, RecordHead, WarcRecord, WarcRecordType,
    WarcVersion,
};
pub use stream::StreamCursor;
pub use writer::{RecordBuilder, WarcWriter};
