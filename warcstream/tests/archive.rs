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

use std::io::Read;

use proptest::prelude::*;
use warcstream::{
    ArchiveIterator, ArchiveIteratorConfig, BoundedReader, ContentBlock, ErrorPolicy, HeaderMap,
    RecordBuilder, WarcError, WarcRecordType, WarcVersion, WarcWriter,
};

fn write_record(out: &mut WarcWriter<Vec<u8>>, record_type: WarcRecordType, block: &[u8]) {
    let builder = RecordBuilder::new(record_type).version(WarcVersion::V1_0);
    out.write_record(&builder, block).unwrap();
}

fn three_record_stream() -> Vec<u8> {
    let mut out = WarcWriter::new(Vec::new());
    write_record(&mut out, WarcRecordType::WarcInfo, b"software: warcstream");
    write_record(
        &mut out,
        WarcRecordType::Response,
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello",
    );
    write_record(
        &mut out,
        WarcRecordType::Response,
        b"HTTP/1.1 404 Not Found\r\n\r\n",
    );
    out.into_inner()
}

#[test]
fn three_record_scenario() {
    let data = three_record_stream();
    let mut archive = ArchiveIterator::new(&data[..]);

    let mut types = Vec::new();
    let mut statuses = Vec::new();
    let mut bodies = Vec::new();
    while let Some(mut record) = archive.read_next().unwrap() {
        types.push(record.record_type());
        statuses.push(record.response().map(|r| r.status_code()));
        if let Some(response) = record.response() {
            let header_count = response.headers().len();
            bodies.push((header_count, Vec::new()));
        } else {
            assert_eq!(record.content_length(), 20);
            bodies.push((0, Vec::new()));
        }
        let last = bodies.last_mut().unwrap();
        record.read_to_end(&mut last.1).unwrap();
    }

    assert_eq!(
        types,
        vec![
            WarcRecordType::WarcInfo,
            WarcRecordType::Response,
            WarcRecordType::Response
        ]
    );
    assert_eq!(statuses, vec![None, Some(200), Some(404)]);
    assert_eq!(bodies[0].1, b"software: warcstream");
    assert_eq!(bodies[1], (2, b"hello".to_vec()));
    assert_eq!(bodies[2], (0, Vec::new()));
}

#[test]
fn offsets_advance_by_block_and_separator() {
    let data = three_record_stream();
    let mut archive = ArchiveIterator::new(&data[..]);
    let mut previous_end = None;
    while let Some(record) = archive.read_next().unwrap() {
        let position = record.position();
        if let Some(end) = previous_end {
            assert_eq!(position.offset, end + 4);
        }
        assert_eq!(&data[position.offset as usize..][..8], b"WARC/1.0");
        previous_end = Some(position.block_offset + record.content_length());
    }
    assert_eq!(archive.stream_offset(), data.len() as u64);
}

#[test]
fn partial_reads_stay_inside_the_block() {
    let data = three_record_stream();
    let mut archive = ArchiveIterator::new(&data[..]);
    while let Some(mut record) = archive.read_next().unwrap() {
        let mut one = [0u8; 1];
        let n = record.read(&mut one).unwrap();
        assert!(n <= 1);
        let content_length = record.content_length();
        let consumed = match record.block() {
            ContentBlock::Opaque(reader) => reader.bytes_yielded(),
            ContentBlock::Response(response) => response.body().source().bytes_yielded(),
        };
        assert!(consumed <= content_length);
    }
}

#[test]
fn truncated_block_reports_expected_and_actual() {
    let mut data = b"WARC/1.0\r\nWARC-Type: resource\r\nContent-Length: 100\r\n\r\n".to_vec();
    data.extend(std::iter::repeat(b'x').take(90));

    let mut archive = ArchiveIterator::new(&data[..]);
    let mut record = archive.read_next().unwrap().unwrap();
    let mut body = Vec::new();
    let err = record.read_to_end(&mut body).unwrap_err();
    assert_eq!(body.len(), 90);
    match WarcError::from(err) {
        WarcError::TruncatedStream { expected, actual } => {
            assert_eq!((expected, actual), (100, 90));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn truncation_surfaces_when_advancing_without_reading() {
    let mut data = b"WARC/1.0\r\nContent-Length: 100\r\n\r\n".to_vec();
    data.extend(std::iter::repeat(b'x').take(90));

    let config = ArchiveIteratorConfig {
        error_policy: ErrorPolicy::SkipAndLog,
        ..Default::default()
    };
    let mut archive = ArchiveIterator::with_config(&data[..], config);
    drop(archive.read_next().unwrap().unwrap());
    match archive.read_next() {
        Err(WarcError::TruncatedStream { expected, actual }) => {
            assert_eq!((expected, actual), (100, 90));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(archive.read_next().unwrap().is_none());
}

#[test]
fn garbage_status_line_leaves_stream_resumable() {
    let mut out = WarcWriter::new(Vec::new());
    write_record(&mut out, WarcRecordType::Response, b"GARBAGE\r\nmore bytes here");
    write_record(&mut out, WarcRecordType::Metadata, b"after");
    let data = out.into_inner();

    let config = ArchiveIteratorConfig {
        error_policy: ErrorPolicy::Yield,
        ..Default::default()
    };
    let mut archive = ArchiveIterator::with_config(&data[..], config);
    match archive.read_next() {
        Err(WarcError::Format { message, position }) => {
            assert!(message.starts_with("cannot parse embedded response"));
            assert_eq!(position.map(|p| p.index), Some(0));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let mut next = archive.read_next().unwrap().unwrap();
    assert_eq!(next.record_type(), WarcRecordType::Metadata);
    let mut body = String::new();
    next.read_to_string(&mut body).unwrap();
    assert_eq!(body, "after");
}

#[test]
fn response_with_empty_inner_body() {
    let mut out = WarcWriter::new(Vec::new());
    write_record(
        &mut out,
        WarcRecordType::Response,
        b"HTTP/1.1 302 Found\r\nLocation: /x\r\nContent-Length: 0\r\n\r\n",
    );
    let data = out.into_inner();

    let mut records = ArchiveIterator::new(&data[..]).frozen();
    let record = records.next().unwrap().unwrap();
    let head = record.response().unwrap();
    assert_eq!(head.status_code, 302);
    assert_eq!(head.headers.get("Location").as_deref(), Some("/x"));
    assert!(record.body().is_empty());
    assert!(records.next().is_none());
}

#[test]
fn detached_content_block_stays_within_its_record() {
    let mut out = WarcWriter::new(Vec::new());
    write_record(&mut out, WarcRecordType::Resource, b"abc");
    write_record(&mut out, WarcRecordType::Metadata, b"next");
    let data = out.into_inner();

    let mut archive = ArchiveIterator::new(&data[..]);
    let (head, block) = archive.read_next().unwrap().unwrap().into_parts();
    assert_eq!(head.content_length, 3);
    let ContentBlock::Opaque(mut reader) = block else {
        panic!("resource block should be opaque");
    };
    let mut body = Vec::new();
    reader.read_to_end(&mut body).unwrap();
    assert_eq!(body, b"abc");
    assert_eq!(reader.read(&mut [0u8; 20]).unwrap(), 0);
    assert_eq!(reader.get_ref().offset(), head.position.block_offset + 3);
    drop(reader);

    let mut next = archive.read_next().unwrap().unwrap();
    assert_eq!(next.record_type(), WarcRecordType::Metadata);
    assert_eq!(next.position().index, 1);
    let mut body = String::new();
    next.read_to_string(&mut body).unwrap();
    assert_eq!(body, "next");
}

#[test]
fn empty_response_record_is_yielded_and_iteration_continues() {
    let mut out = WarcWriter::new(Vec::new());
    write_record(&mut out, WarcRecordType::Response, b"");
    write_record(&mut out, WarcRecordType::Metadata, b"m");
    let data = out.into_inner();

    let mut archive = ArchiveIterator::new(&data[..]);
    let mut first = archive.read_next().unwrap().unwrap();
    assert_eq!(first.record_type(), WarcRecordType::Response);
    assert_eq!(first.content_length(), 0);
    assert!(first.response().is_none());
    let mut body = Vec::new();
    first.read_to_end(&mut body).unwrap();
    assert!(body.is_empty());
    drop(first);

    let mut second = archive.read_next().unwrap().unwrap();
    assert_eq!(second.record_type(), WarcRecordType::Metadata);
    let mut body = String::new();
    second.read_to_string(&mut body).unwrap();
    assert_eq!(body, "m");
    drop(second);
    assert!(archive.read_next().unwrap().is_none());
}

#[test]
fn partly_read_chunked_body_is_skipped_on_advance() {
    let mut out = WarcWriter::new(Vec::new());
    write_record(
        &mut out,
        WarcRecordType::Response,
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
          5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    );
    write_record(&mut out, WarcRecordType::Metadata, b"after");
    let data = out.into_inner();

    let mut archive = ArchiveIterator::new(&data[..]);
    let mut first = archive.read_next().unwrap().unwrap();
    let block_end = first.position().block_offset + first.content_length();
    let response = first.response_mut().unwrap();
    assert!(response.headers().contains_key("Transfer-Encoding"));
    let mut three = [0u8; 3];
    response.body().read_exact(&mut three).unwrap();
    assert_eq!(&three, b"hel");
    drop(first);

    let mut second = archive.read_next().unwrap().unwrap();
    let offset = second.position().offset;
    assert_eq!(offset, block_end + 4);
    assert_eq!(&data[offset as usize..][..8], b"WARC/1.0");
    let mut body = String::new();
    second.read_to_string(&mut body).unwrap();
    assert_eq!(body, "after");
    drop(second);
    assert!(archive.read_next().unwrap().is_none());
    assert_eq!(archive.stream_offset(), data.len() as u64);
}

fn record_type_strategy() -> impl Strategy<Value = WarcRecordType> {
    prop::sample::select(vec![
        WarcRecordType::WarcInfo,
        WarcRecordType::Resource,
        WarcRecordType::Request,
        WarcRecordType::Metadata,
        WarcRecordType::Revisit,
        WarcRecordType::Conversion,
    ])
}

proptest! {
    #[test]
    fn framed_records_round_trip(
        records in prop::collection::vec(
            (record_type_strategy(), prop::collection::vec(any::<u8>(), 0..256)),
            0..8,
        )
    ) {
        let mut writer = WarcWriter::new(Vec::new());
        let mut expected: Vec<(HeaderMap, Vec<u8>)> = Vec::new();
        for (record_type, block) in &records {
            let headers = RecordBuilder::new(*record_type).headers(block.len() as u64);
            writer.write_raw(WarcVersion::V1_1, &headers, block).unwrap();
            expected.push((headers, block.clone()));
        }
        let data = writer.into_inner();

        let frozen: Vec<_> = ArchiveIterator::new(&data[..])
            .frozen()
            .collect::<warcstream::Result<_>>()
            .unwrap();
        prop_assert_eq!(frozen.len(), expected.len());
        for (record, (headers, block)) in frozen.iter().zip(&expected) {
            prop_assert_eq!(&record.head.headers, headers);
            prop_assert_eq!(record.body(), &block[..]);
            prop_assert_eq!(record.head.version, WarcVersion::V1_1);
        }
    }

    #[test]
    fn bounded_reader_accounting(
        data in prop::collection::vec(any::<u8>(), 0..512),
        limit in 0u64..512,
        chunk in 1usize..64,
    ) {
        let mut reader = BoundedReader::new(&data[..], limit);
        let mut buf = vec![0u8; chunk];
        let mut total = 0u64;
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => total += n as u64,
                Err(err) => {
                    prop_assert!(limit > data.len() as u64);
                    let truncated =
                        matches!(WarcError::from(err), WarcError::TruncatedStream { .. });
                    prop_assert!(truncated);
                    break;
                }
            }
            prop_assert_eq!(reader.bytes_yielded() + reader.remaining_bytes(), limit);
        }
        prop_assert_eq!(total, limit.min(data.len() as u64));
    }
}
