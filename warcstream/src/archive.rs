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

use std::io::{BufRead, BufReader, Read};

use tracing::{debug, trace, warn};

use crate::bounded::BoundedReader;
use crate::config::{ArchiveIteratorConfig, ErrorPolicy};
use crate::error::{Result, WarcError};
use crate::framer::{read_head, Framed};
use crate::http::{ResponseBlock, ResponseHead};
use crate::record::{ContentBlock, FrozenRecord, RecordHead, WarcRecord};
use crate::stream::StreamCursor;

/// Content block stream type of records returned by [`ArchiveIterator`].
pub type BlockSource<'a, R> = &'a mut StreamCursor<R>;

/// Extent of the current record's content block in the stream.
#[derive(Debug, Clone, Copy)]
struct BlockBounds {
    offset: u64,
    length: u64,
}

/// Record head plus, for decoded responses, the HTTP head read from its block.
struct Pending {
    head: RecordHead,
    response: Option<ResponseHead>,
}

/// WARC record stream iterator.
///
/// Records are returned strictly in stream order. Each record borrows the
/// iterator's stream, so it has to be dropped before the next one can be
/// read. Content the caller did not read is skipped when advancing.
///
/// ```no_run
/// use std::io::Read;
/// use warcstream::ArchiveIterator;
///
/// # fn main() -> warcstream::Result<()> {
/// let file = std::fs::File::open("example.warc")?;
/// let mut archive = ArchiveIterator::from_reader(file);
/// while let Some(mut record) = archive.read_next()? {
///     if let Some(response) = record.response_mut() {
///         let mut body = Vec::new();
///         response.body().read_to_end(&mut body)?;
///         println!("{} {} bytes", response.status_code(), body.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ArchiveIterator<R> {
    cursor: StreamCursor<R>,
    config: ArchiveIteratorConfig,
    next_index: u64,
    block: Option<BlockBounds>,
    finished: bool,
}

impl<T: Read> ArchiveIterator<BufReader<T>> {
    /// Create an iterator over an unbuffered stream with default configuration.
    pub fn from_reader(reader: T) -> Self {
        ArchiveIterator::new(BufReader::new(reader))
    }
}

impl<R: BufRead> ArchiveIterator<R> {
    /// Create a new archive iterator with default configuration.
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ArchiveIteratorConfig::default())
    }

    pub fn with_config(reader: R, config: ArchiveIteratorConfig) -> Self {
        ArchiveIterator {
            cursor: StreamCursor::new(reader),
            config,
            next_index: 0,
            block: None,
            finished: false,
        }
    }

    pub fn config(&self) -> &ArchiveIteratorConfig {
        &self.config
    }

    /// Current byte offset in the uncompressed stream.
    pub fn stream_offset(&self) -> u64 {
        self.cursor.offset()
    }

    /// Whether iteration has ended (cleanly or after a fatal error).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read the next WARC record from the stream.
    ///
    /// Returns `Ok(None)` at the end of the stream. Errors are handled
    /// according to the configured [`ErrorPolicy`].
    pub fn read_next(&mut self) -> Result<Option<WarcRecord<BlockSource<'_, R>>>> {
        if self.finished {
            return Ok(None);
        }
        let pending = loop {
            match self.next_pending() {
                Ok(Some(pending)) => break pending,
                Ok(None) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(err) => self.handle_error(err)?,
            }
        };

        let head = pending.head;
        trace!(
            index = head.position.index,
            offset = head.position.offset,
            record_type = head.record_type.as_str(),
            content_length = head.content_length,
            "framed record"
        );
        let yielded = self.cursor.offset() - head.position.block_offset;
        let source = BoundedReader::resume(&mut self.cursor, head.content_length, yielded);
        let block = match pending.response {
            Some(response) => ContentBlock::Response(ResponseBlock::from_head(response, source)),
            None => ContentBlock::Opaque(source),
        };
        Ok(Some(WarcRecord::new(head, block)))
    }

    /// Adapt into a standard iterator of records detached from the stream.
    pub fn frozen(self) -> FrozenRecords<R> {
        FrozenRecords {
            inner: self,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.cursor.into_inner()
    }

    /// Skip whatever is left of the previous content block and its separator.
    fn finish_block(&mut self) -> Result<()> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };
        let yielded = self.cursor.offset() - block.offset;
        BoundedReader::resume(&mut self.cursor, block.length, yielded).drain()?;
        self.cursor.skip_line_breaks()?;
        Ok(())
    }

    fn next_pending(&mut self) -> Result<Option<Pending>> {
        loop {
            self.finish_block()?;
            let index = self.next_index;
            let framed = read_head(&mut self.cursor, index, self.config.strict);
            if let Some(position) = framed.as_ref().err().and_then(WarcError::position) {
                self.next_index = position.index + 1;
            }
            let head = match framed? {
                Framed::End => return Ok(None),
                Framed::Record(head) => head,
                Framed::Malformed { head, error } => {
                    self.open_block(&head);
                    return Err(error);
                }
            };
            self.open_block(&head);

            if !self.config.accepts(&head) {
                debug!(
                    index,
                    record_type = head.record_type.as_str(),
                    content_length = head.content_length,
                    "skipping filtered record"
                );
                continue;
            }

            let response = if self.config.decodes_http(&head) {
                let mut source = BoundedReader::new(&mut self.cursor, head.content_length);
                let parsed = ResponseHead::parse(&mut source, self.config.strict)
                    .map_err(|err| err.at(head.position))?;
                Some(parsed)
            } else {
                None
            };
            return Ok(Some(Pending { head, response }));
        }
    }

    fn open_block(&mut self, head: &RecordHead) {
        self.next_index = head.position.index + 1;
        self.block = Some(BlockBounds {
            offset: head.position.block_offset,
            length: head.content_length,
        });
    }

    /// Apply the error policy. `Ok(())` means skip the record and go on.
    fn handle_error(&mut self, err: WarcError) -> Result<()> {
        let resumable = !err.is_terminal()
            && (self.block.is_some() || (!self.config.strict && matches!(err, WarcError::Format { .. })));
        if !resumable {
            self.finished = true;
            return Err(err);
        }
        match self.config.error_policy {
            ErrorPolicy::FailFast => {
                self.finished = true;
                Err(err)
            }
            ErrorPolicy::Yield => Err(err),
            ErrorPolicy::SkipAndLog => {
                warn!("skipping malformed record: {err}");
                Ok(())
            }
        }
    }
}

/// Iterator of [`FrozenRecord`]s, see [`ArchiveIterator::frozen`].
pub struct FrozenRecords<R> {
    inner: ArchiveIterator<R>,
    done: bool,
}

impl<R: BufRead> Iterator for FrozenRecords<R> {
    type Item = Result<FrozenRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.inner.read_next() {
            Ok(Some(record)) => record.freeze(),
            Ok(None) => return None,
            Err(err) => Err(err),
        };
        if let Err(err) = &item {
            self.done = err.is_terminal() || self.inner.is_finished();
        }
        Some(item)
    }
}
