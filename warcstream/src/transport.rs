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

//! Opening WARC files, plain or gzip-compressed.
//!
//! Compressed WARCs usually consist of one gzip member per record. The
//! multi-member decoder turns them back into one continuous WARC stream.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::bufread::MultiGzDecoder;
use tracing::debug;

use crate::archive::ArchiveIterator;
use crate::config::ArchiveIteratorConfig;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression detected on an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

/// Detect gzip compression by peeking at the stream's first bytes.
pub fn detect<R: BufRead>(reader: &mut R) -> io::Result<Compression> {
    let buf = reader.fill_buf()?;
    if buf.starts_with(&GZIP_MAGIC) {
        Ok(Compression::Gzip)
    } else {
        Ok(Compression::None)
    }
}

/// Wrap a buffered stream in a decompressor if it is gzip-compressed.
pub fn wrap<'a, R: BufRead + 'a>(mut reader: R) -> io::Result<Box<dyn BufRead + 'a>> {
    Ok(match detect(&mut reader)? {
        Compression::Gzip => {
            debug!("detected gzip-compressed input");
            Box::new(BufReader::new(MultiGzDecoder::new(reader)))
        }
        Compression::None => Box::new(reader),
    })
}

/// Open a WARC file for reading, decompressing it if necessary.
pub fn open(path: impl AsRef<Path>) -> io::Result<Box<dyn BufRead>> {
    wrap(BufReader::new(File::open(path)?))
}

/// Open a WARC file and iterate over its records.
pub fn open_archive(
    path: impl AsRef<Path>,
    config: ArchiveIteratorConfig,
) -> io::Result<ArchiveIterator<Box<dyn BufRead>>> {
    Ok(ArchiveIterator::with_config(open(path)?, config))
}

/// Wrap any stream (e.g. stdin), decompressing if necessary.
pub fn from_reader<'a, R: Read + 'a>(reader: R) -> io::Result<Box<dyn BufRead + 'a>> {
    wrap(BufReader::new(reader))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::write::GzEncoder;

    fn gzip_member(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn plain_input_passes_through() {
        let mut reader = wrap(&b"WARC/1.0\r\n"[..]).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "WARC/1.0\r\n");
    }

    #[test]
    fn concatenated_members_form_one_stream() {
        let mut data = gzip_member(b"first ");
        data.extend(gzip_member(b"second"));
        assert_eq!(detect(&mut &data[..]).unwrap(), Compression::Gzip);

        let mut reader = wrap(&data[..]).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "first second");
    }

    #[test]
    fn opens_compressed_file() {
        let record = b"WARC/1.0\r\nWARC-Type: resource\r\nContent-Length: 3\r\n\r\nabc\r\n\r\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&gzip_member(record)).unwrap();
        file.flush().unwrap();

        let records: Vec<_> = open_archive(file.path(), ArchiveIteratorConfig::default())
            .unwrap()
            .frozen()
            .collect::<crate::Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body(), b"abc");
    }
}
