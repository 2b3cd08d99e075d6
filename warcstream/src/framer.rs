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

//! Framing of a single WARC record head.
//!
//! A record starts with a `WARC/<major>.<minor>` version line followed by a
//! header block. The content block that follows is exactly `Content-Length`
//! bytes long and is terminated by a blank-line separator.

use std::io::BufRead;

use tracing::{debug, warn};

use crate::error::{RecordPosition, Result, WarcError};
use crate::header::{read_header_block, read_line, trim_line_end, HeaderEncoding, HeaderMap};
use crate::http::parse_version_pair;
use crate::record::{RecordHead, WarcRecordType, WarcVersion};
use crate::stream::StreamCursor;

/// Outcome of framing one record head.
#[derive(Debug)]
pub(crate) enum Framed {
    /// A well-formed record head.
    Record(RecordHead),
    /// A record whose length is known but whose header block had a bad line.
    Malformed { head: RecordHead, error: WarcError },
    /// Clean end of stream before a version line.
    End,
}

pub(crate) fn parse_version_line(line: &[u8]) -> Option<WarcVersion> {
    let (major, minor) = parse_version_pair(line.trim_ascii().strip_prefix(b"WARC/")?)?;
    Some(WarcVersion { major, minor })
}

fn parse_content_length(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get_first("Content-Length")?;
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Read the version line and header block of the record at the cursor.
///
/// Leading line breaks are skipped. In non-strict mode, any other lines
/// before the next version line are skipped as well.
pub(crate) fn read_head<R: BufRead>(
    cursor: &mut StreamCursor<R>,
    index: u64,
    strict: bool,
) -> Result<Framed> {
    let mut line = Vec::new();
    let mut garbage = 0u64;
    let (offset, version) = loop {
        cursor.skip_line_breaks()?;
        let offset = cursor.offset();
        if read_line(cursor, &mut line)? == 0 {
            if garbage > 0 {
                warn!(garbage, "skipped trailing bytes without a WARC version line");
            }
            return Ok(Framed::End);
        }
        match parse_version_line(trim_line_end(&line)) {
            Some(version) => break (offset, version),
            None if !strict => garbage += line.len() as u64,
            None => {
                let position = RecordPosition {
                    index,
                    offset,
                    block_offset: offset,
                };
                return Err(WarcError::format(format!(
                    "bad version line {:?}",
                    String::from_utf8_lossy(trim_line_end(&line))
                ))
                .at(position));
            }
        }
    };
    if garbage > 0 {
        warn!(garbage, offset, "skipped garbage before WARC version line");
    }

    let mut headers = HeaderMap::new(HeaderEncoding::Utf8);
    let mut header_error = None;
    read_header_block(cursor, &mut headers, |err| {
        if strict {
            header_error.get_or_insert(err);
        } else {
            debug!(offset, "skipping malformed WARC header: {err}");
        }
        Ok(())
    })?;

    let position = RecordPosition {
        index,
        offset,
        block_offset: cursor.offset(),
    };
    let content_length = parse_content_length(&headers)
        .ok_or_else(|| WarcError::format("missing or invalid Content-Length").at(position))?;
    let record_type = headers
        .get_first("WARC-Type")
        .map(|name| WarcRecordType::from_name(&name))
        .unwrap_or(WarcRecordType::Unknown);

    let head = RecordHead {
        version,
        record_type,
        headers,
        content_length,
        position,
    };
    Ok(match header_error {
        Some(error) => Framed::Malformed {
            head,
            error: error.at(position),
        },
        None => Framed::Record(head),
    })
}
