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

//! Error types for WARC framing and HTTP decoding.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type for WARC operations.
pub type Result<T> = std::result::Result<T, WarcError>;

/// Location of a record in the (uncompressed) input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecordPosition {
    /// Zero-based sequence number of the record in the stream.
    pub index: u64,
    /// Byte offset of the record's version line.
    pub offset: u64,
    /// Byte offset of the first content block byte.
    pub block_offset: u64,
}

impl fmt::Display for RecordPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record #{} at offset {}", self.index, self.offset)
    }
}

fn describe_position(position: &Option<RecordPosition>) -> String {
    position.map(|p| format!(" ({p})")).unwrap_or_default()
}

/// Errors raised while reading a WARC stream.
#[derive(Error, Debug)]
pub enum WarcError {
    /// The underlying stream ended before a declared byte count was satisfied.
    #[error("truncated stream: expected {expected} bytes, got {actual}")]
    TruncatedStream {
        /// Number of bytes the length field promised.
        expected: u64,
        /// Number of bytes actually available.
        actual: u64,
    },

    /// Structural violation of the WARC or embedded HTTP framing.
    #[error("{message}{}", describe_position(.position))]
    Format {
        /// What went wrong.
        message: String,
        /// Record the violation belongs to, if known.
        position: Option<RecordPosition>,
    },

    /// A header line without a `:` separator.
    #[error("malformed header line {line:?}{}", describe_position(.position))]
    HeaderSyntax {
        /// The offending line, lossily decoded.
        line: String,
        /// Record the line belongs to, if known.
        position: Option<RecordPosition>,
    },

    /// Any other I/O failure of the underlying stream.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl WarcError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        WarcError::Format {
            message: message.into(),
            position: None,
        }
    }

    pub(crate) fn header_syntax(line: &[u8]) -> Self {
        WarcError::HeaderSyntax {
            line: String::from_utf8_lossy(line).into_owned(),
            position: None,
        }
    }

    /// Attach a record position unless one is already set.
    pub fn at(mut self, at: RecordPosition) -> Self {
        match &mut self {
            WarcError::Format { position, .. } | WarcError::HeaderSyntax { position, .. } => {
                position.get_or_insert(at);
            }
            _ => {}
        }
        self
    }

    /// Record position carried by this error, if any.
    pub fn position(&self) -> Option<RecordPosition> {
        match self {
            WarcError::Format { position, .. } | WarcError::HeaderSyntax { position, .. } => {
                *position
            }
            _ => None,
        }
    }

    /// Whether the stream cannot be resynchronised after this error.
    ///
    /// Truncation and I/O failures leave nothing to advance to. Format and
    /// header errors are recoverable only if the record's length is known,
    /// which the iterator tracks separately.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WarcError::TruncatedStream { .. } | WarcError::Io(_))
    }
}

impl From<WarcError> for io::Error {
    fn from(err: WarcError) -> Self {
        match err {
            WarcError::Io(err) => err,
            WarcError::TruncatedStream { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            _ => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

impl From<io::Error> for WarcError {
    fn from(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<WarcError>()) {
            return WarcError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<WarcError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => WarcError::Io(io::Error::new(kind, other)),
            None => WarcError::Io(io::Error::from(kind)),
        }
    }
}
