//! Tests for the block codec
//!
//! These tests verify:
//! - V2 framing: varint key length, key, 8-byte big-endian size, payload
//! - V1 framing: varint size, verbatim payload, exact size hint
//! - Sequential decode of consecutive blocks and clean end of data
//! - Skipping payloads without a sink
//! - Truncated and corrupt blocks are reported, never returned short
//! - Oversized sources are detected without draining them

use std::io::{self, Cursor, Seek, SeekFrom};

use stackfile::block::{BlockCodec, Node};
use stackfile::compress::{Compressor, GzipCompressor, NoneCompressor, ZlibCompressor};
use stackfile::error::StackError;
use stackfile::format::FormatVersion;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_blocks(
    codec: &BlockCodec,
    compressor: &dyn Compressor,
    blocks: &[(&str, &[u8])],
) -> (Cursor<Vec<u8>>, Vec<Node>) {
    let mut resource = Cursor::new(Vec::new());
    let mut nodes = Vec::new();
    let mut pos = 0;
    for (key, payload) in blocks {
        let node = codec
            .write_block(
                &mut resource,
                pos,
                key,
                Some(payload.len() as u64),
                &mut &payload[..],
                compressor,
            )
            .unwrap();
        pos = node.end();
        nodes.push(node);
    }
    (resource, nodes)
}

fn read_all(
    codec: &BlockCodec,
    compressor: &dyn Compressor,
    resource: &mut Cursor<Vec<u8>>,
) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    let mut pos = 0;
    resource.seek(SeekFrom::Start(0)).unwrap();
    loop {
        let mut payload = Vec::new();
        match codec
            .read_block(resource, pos, Some(&mut payload), compressor)
            .unwrap()
        {
            Some((node, _)) => {
                pos = node.end();
                out.push((node.key, payload));
            }
            None => return out,
        }
    }
}

// =============================================================================
// V2 Tests
// =============================================================================

#[test]
fn test_v2_layout() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let (resource, nodes) = write_blocks(&codec, &NoneCompressor::new(), &[("ab", b"xyz")]);
    let bytes = resource.into_inner();

    assert_eq!(bytes, vec![2, b'a', b'b', 0, 0, 0, 0, 0, 0, 0, 3, b'x', b'y', b'z']);
    assert_eq!(nodes[0].offset, 11);
    assert_eq!(nodes[0].size, 3);
    assert_eq!(nodes[0].origin_size, Some(3));
    assert_eq!(nodes[0].end(), 14);
}

#[test]
fn test_v2_size_is_backfilled_compressed_size() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let payload = vec![b'z'; 10_000];
    let (resource, nodes) = write_blocks(&codec, &GzipCompressor::new(), &[("k", &payload)]);
    let bytes = resource.into_inner();

    let size = u64::from_be_bytes(bytes[2..10].try_into().unwrap());
    assert_eq!(size, nodes[0].size);
    assert!(size < payload.len() as u64);
    assert_eq!(bytes.len() as u64, nodes[0].end());
    assert_eq!(nodes[0].origin_size, Some(10_000));
}

#[test]
fn test_v2_sequence_roundtrip_all_compressors() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let blocks: Vec<(&str, &[u8])> = vec![
        ("a.txt", b"hello"),
        ("empty", b""),
        ("dir/nested/ü.bin", &[0u8, 1, 2, 255, 254]),
    ];
    let compressors: Vec<Box<dyn Compressor>> = vec![
        Box::new(NoneCompressor::new()),
        Box::new(GzipCompressor::new()),
        Box::new(ZlibCompressor::new()),
    ];

    for compressor in compressors {
        let (mut resource, _) = write_blocks(&codec, compressor.as_ref(), &blocks);
        let read = read_all(&codec, compressor.as_ref(), &mut resource);
        let expected: Vec<(String, Vec<u8>)> = blocks
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect();
        assert_eq!(read, expected, "{:?}", compressor);
    }
}

#[test]
fn test_skip_without_sink() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let compressor = GzipCompressor::new();
    let (mut resource, nodes) = write_blocks(&codec, &compressor, &[("a", b"aaaa"), ("b", b"bbbb")]);

    resource.seek(SeekFrom::Start(0)).unwrap();
    let (first, transfer) = codec
        .read_block(&mut resource, 0, None, &compressor)
        .unwrap()
        .unwrap();
    assert_eq!(first.key, "a");
    assert_eq!(first.origin_size, None);
    assert_eq!(transfer.written, 0);
    assert_eq!(resource.position(), nodes[0].end());

    let (second, _) = codec
        .read_block(&mut resource, first.end(), None, &compressor)
        .unwrap()
        .unwrap();
    assert_eq!(second, Node { origin_size: None, ..nodes[1].clone() });
}

#[test]
fn test_read_payload_by_node() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let compressor = ZlibCompressor::new();
    let (mut resource, nodes) =
        write_blocks(&codec, &compressor, &[("a", b"first"), ("b", b"second")]);

    let node = &nodes[1];
    resource.seek(SeekFrom::Start(node.offset)).unwrap();
    let mut out = Vec::new();
    let transfer = codec
        .read_payload(&mut resource, node, Some(&mut out), &compressor)
        .unwrap();
    assert_eq!(out, b"second");
    assert_eq!(transfer.read, node.size);
    assert_eq!(transfer.written, 6);
}

// =============================================================================
// V1 Tests
// =============================================================================

#[test]
fn test_v1_layout() {
    let codec = BlockCodec::new(FormatVersion::V1);
    let (resource, nodes) = write_blocks(&codec, &NoneCompressor::new(), &[("ab", b"xyz")]);
    assert_eq!(resource.into_inner(), vec![2, b'a', b'b', 3, b'x', b'y', b'z']);
    assert_eq!(nodes[0].offset, 4);
    assert_eq!(nodes[0].size, 3);
}

#[test]
fn test_v1_roundtrip() {
    let codec = BlockCodec::new(FormatVersion::V1);
    let big = vec![7u8; 300];
    let blocks: Vec<(&str, &[u8])> = vec![("x", b"one"), ("y", b""), ("z", &big)];
    let (mut resource, _) = write_blocks(&codec, &NoneCompressor::new(), &blocks);

    let read = read_all(&codec, &NoneCompressor::new(), &mut resource);
    assert_eq!(read.len(), 3);
    assert_eq!(read[2].1, big);
    assert!(read[1].1.is_empty());
}

#[test]
fn test_v1_requires_size_hint() {
    let codec = BlockCodec::new(FormatVersion::V1);
    let mut resource = Cursor::new(Vec::new());
    let result = codec.write_block(&mut resource, 0, "k", None, &mut &b"abc"[..], &NoneCompressor::new());
    assert!(matches!(result, Err(StackError::SizeHintRequired(_))));
}

#[test]
fn test_v1_size_hint_mismatch() {
    let codec = BlockCodec::new(FormatVersion::V1);

    let mut resource = Cursor::new(Vec::new());
    let result = codec.write_block(&mut resource, 0, "k", Some(5), &mut &b"abc"[..], &NoneCompressor::new());
    assert!(matches!(
        result,
        Err(StackError::WriteSizeMismatch { expected: 5, actual: 3 })
    ));

    // Only one byte past the hint is read, so `actual` is a lower bound
    let mut resource = Cursor::new(Vec::new());
    let result = codec.write_block(&mut resource, 0, "k", Some(2), &mut &b"abcd"[..], &NoneCompressor::new());
    assert!(matches!(
        result,
        Err(StackError::WriteSizeMismatch { expected: 2, actual: 3 })
    ));
}

#[test]
fn test_v1_oversized_source_is_not_drained() {
    let codec = BlockCodec::new(FormatVersion::V1);
    let mut resource = Cursor::new(Vec::new());

    // An endless source must still fail promptly
    let mut endless = io::repeat(b'x');
    let result = codec.write_block(&mut resource, 0, "k", Some(4), &mut endless, &NoneCompressor::new());
    assert!(matches!(
        result,
        Err(StackError::WriteSizeMismatch { expected: 4, actual: 5 })
    ));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_truncated_payload_is_size_mismatch() {
    for version in [FormatVersion::V1, FormatVersion::V2] {
        let codec = BlockCodec::new(version);
        let (resource, nodes) =
            write_blocks(&codec, &NoneCompressor::new(), &[("k", b"0123456789")]);
        let mut bytes = resource.into_inner();
        bytes.truncate(bytes.len() - 4);
        let mut resource = Cursor::new(bytes);

        let node = &nodes[0];
        resource.seek(SeekFrom::Start(node.offset)).unwrap();
        let mut out = Vec::new();
        let result = codec.read_payload(&mut resource, node, Some(&mut out), &NoneCompressor::new());
        assert!(
            matches!(result, Err(StackError::SizeMismatch { expected: 10, actual: 6 })),
            "{:?}: {:?}",
            version,
            result
        );
    }
}

#[test]
fn test_truncated_gzip_payload_is_size_mismatch() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let compressor = GzipCompressor::new();
    let payload: Vec<u8> = (0..5_000u32).flat_map(|i| i.to_be_bytes()).collect();
    let (resource, nodes) = write_blocks(&codec, &compressor, &[("k", &payload)]);
    let mut bytes = resource.into_inner();
    bytes.truncate(bytes.len() - 10);
    let mut resource = Cursor::new(bytes);

    let node = &nodes[0];
    resource.seek(SeekFrom::Start(node.offset)).unwrap();
    let mut out = Vec::new();
    let result = codec.read_payload(&mut resource, node, Some(&mut out), &compressor);
    assert!(matches!(result, Err(StackError::SizeMismatch { .. })), "{:?}", result);
}

#[test]
fn test_truncated_key() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let mut resource = Cursor::new(vec![5, b'a', b'b']);
    let result = codec.read_frame(&mut resource, 0);
    assert!(matches!(
        result,
        Err(StackError::KeyLengthMismatch { expected: 5, actual: 2 })
    ));
}

#[test]
fn test_truncated_size_field() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let mut resource = Cursor::new(vec![1, b'a', 0, 0, 0]);
    assert!(matches!(
        codec.read_frame(&mut resource, 0),
        Err(StackError::TruncatedRecord)
    ));

    let codec = BlockCodec::new(FormatVersion::V1);
    let mut resource = Cursor::new(vec![1, b'a', 0x80]);
    assert!(matches!(
        codec.read_frame(&mut resource, 0),
        Err(StackError::IncompleteVarint)
    ));
}

#[test]
fn test_size_field_past_addressable_range() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let mut bytes = vec![1, b'k'];
    bytes.extend_from_slice(&u64::MAX.to_be_bytes());
    let mut resource = Cursor::new(bytes);

    let result = codec.read_frame(&mut resource, 10);
    assert!(
        matches!(result, Err(StackError::SizeOverflow { offset: 20, size: u64::MAX })),
        "{:?}",
        result
    );

    resource.seek(SeekFrom::Start(0)).unwrap();
    let result = codec.read_block(&mut resource, 10, None, &NoneCompressor::new());
    assert!(matches!(result, Err(StackError::SizeOverflow { .. })));
}

#[test]
fn test_non_utf8_key() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let mut bytes = vec![2, 0xff, 0xfe];
    bytes.extend_from_slice(&0u64.to_be_bytes());
    let mut resource = Cursor::new(bytes);
    assert!(matches!(
        codec.read_frame(&mut resource, 0),
        Err(StackError::InvalidKey)
    ));
}

#[test]
fn test_end_of_data_is_none() {
    let codec = BlockCodec::new(FormatVersion::V2);
    let mut resource = Cursor::new(Vec::new());
    assert!(codec
        .read_block(&mut resource, 0, None, &NoneCompressor::new())
        .unwrap()
        .is_none());
}
