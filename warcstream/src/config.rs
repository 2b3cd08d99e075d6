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

use crate::record::{RecordHead, WarcRecordType};

/// What the iterator does when a record cannot be framed or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Return the error and stop iterating.
    #[default]
    FailFast,
    /// Return the error, then continue with the next record on the next call.
    Yield,
    /// Log the error, skip the record and continue.
    SkipAndLog,
}

/// Archive iterator configuration.
#[derive(Debug, Clone)]
pub struct ArchiveIteratorConfig {
    /// Handling of malformed records
    pub error_policy: ErrorPolicy,
    /// Whether to decode `response` records as HTTP
    pub parse_http: bool,
    /// Treat malformed header lines as errors and require a version line
    /// at every record start. If `false`, bad header lines are dropped and
    /// garbage before a version line is skipped.
    pub strict: bool,
    /// Bitmask of record types to return (others will be skipped)
    pub record_types: u16,
    /// Skip records with Content-Length less than this
    pub min_content_length: Option<u64>,
    /// Skip records with Content-Length larger than this
    pub max_content_length: Option<u64>,
}

impl Default for ArchiveIteratorConfig {
    fn default() -> Self {
        ArchiveIteratorConfig {
            error_policy: ErrorPolicy::FailFast,
            parse_http: true,
            strict: true,
            record_types: WarcRecordType::ANY,
            min_content_length: None,
            max_content_length: None,
        }
    }
}

impl ArchiveIteratorConfig {
    /// Whether a framed record passes the type and length filters.
    pub fn accepts(&self, head: &RecordHead) -> bool {
        head.record_type.matches_bitmask(self.record_types)
            && self
                .min_content_length
                .map_or(true, |min| head.content_length >= min)
            && self
                .max_content_length
                .map_or(true, |max| head.content_length <= max)
    }

    /// Whether a record's content block should be decoded as an HTTP response.
    ///
    /// `response` records are decoded unless their `Content-Type` names
    /// something other than `application/http` (e.g. `text/dns`). Empty
    /// content blocks have nothing to decode and stay opaque.
    pub fn decodes_http(&self, head: &RecordHead) -> bool {
        self.parse_http
            && head.record_type == WarcRecordType::Response
            && head.content_length > 0
            && (head.is_http() || !head.headers.contains_key("Content-Type"))
    }
}
