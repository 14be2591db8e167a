//! Integration tests for tracy-lz4

use std::fs;
use std::io::Write;
use std::path::Path;

use proptest::prelude::*;
use tracy_lz4::{
    BlockCodec, BlockWriter, CodecKind, FrameReader, Lz4Codec, WriterConfig, WriterError,
    DEFAULT_BLOCK_SIZE,
};

const B: usize = 4096;

fn config() -> WriterConfig {
    WriterConfig::default().with_block_size(B)
}

fn read_frames(path: &Path) -> Vec<Vec<u8>> {
    let bytes = fs::read(path).unwrap();
    FrameReader::new(&bytes[..])
        .collect::<tracy_lz4::Result<Vec<_>>>()
        .unwrap()
}

fn decompress_all(frames: &[Vec<u8>], block_size: usize) -> Vec<u8> {
    frames
        .iter()
        .flat_map(|f| lz4::block::decompress(f, Some(block_size as i32)).unwrap())
        .collect()
}

#[test]
fn test_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.lz4");
    let data = b"the quick brown fox jumps over the lazy dog".repeat(500);

    let mut writer = BlockWriter::open_with_config(Some(path.as_path()), &config()).unwrap();
    writer.write(&data, false).unwrap();
    writer.close().unwrap();

    let frames = read_frames(&path);
    assert_eq!(frames.len(), (data.len() + B - 1) / B);
    assert_eq!(decompress_all(&frames, B), data);
}

#[test]
fn test_teardown_flush_writes_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drop.lz4");
    let data = vec![0x5Au8; B * 3 / 10];
    {
        let mut writer = BlockWriter::open_with_config(Some(path.as_path()), &config()).unwrap();
        writer.write(&data, false).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }
    let frames = read_frames(&path);
    assert_eq!(frames.len(), 1);
    assert_eq!(decompress_all(&frames, B), data);
}

#[test]
fn test_exact_splitting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("split.lz4");
    let data: Vec<u8> = (0..B * 5 / 2).map(|i| (i * 7 % 256) as u8).collect();

    let mut writer = BlockWriter::open_with_config(Some(path.as_path()), &config()).unwrap();
    writer.write(&data, false).unwrap();
    assert_eq!(writer.pending(), B / 2);
    writer.flush().unwrap();

    let frames = read_frames(&path);
    assert_eq!(frames.len(), 3);
    let sizes: Vec<usize> = frames
        .iter()
        .map(|f| lz4::block::decompress(f, Some(B as i32)).unwrap().len())
        .collect();
    assert_eq!(sizes, vec![B, B, B / 2]);
    drop(writer);
    assert_eq!(read_frames(&path).len(), 3);
}

#[test]
fn test_real_data_roundtrip() {
    let data = b"ABCD".repeat(250);
    assert_eq!(data.len(), 1000);
    let mut writer = BlockWriter::buffer_only(&WriterConfig::default()).unwrap();
    writer.write(&data, true).unwrap();
    let block = writer.dump();
    assert!(!block.is_empty());
    let decompressed = lz4::block::decompress(&block, Some(1000)).unwrap();
    assert_eq!(decompressed, data);
}

#[test]
fn test_dump_reflects_last_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.lz4");
    let mut writer = BlockWriter::open_with_config(Some(path.as_path()), &config()).unwrap();
    assert!(writer.dump().is_empty());

    for i in 0..5u8 {
        writer.write(&vec![i; B / 3], i % 2 == 0).unwrap();
    }
    writer.flush().unwrap();
    let last = writer.dump();
    assert_eq!(read_frames(&path).last().unwrap(), &last);
}

#[test]
fn test_append_preserves_existing_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("append.lz4");

    let mut first = BlockWriter::open(Some(path.as_path()), false).unwrap();
    first.write(b"first session", true).unwrap();
    first.close().unwrap();

    let mut second = BlockWriter::open(Some(path.as_path()), true).unwrap();
    second.write(b"second session", true).unwrap();
    second.close().unwrap();

    let frames = read_frames(&path);
    assert_eq!(frames.len(), 2);
    assert_eq!(decompress_all(&frames, DEFAULT_BLOCK_SIZE), b"first sessionsecond session");
}

#[test]
fn test_truncate_discards_existing_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncate.lz4");
    fs::write(&path, b"stale bytes that are not frames").unwrap();

    let mut writer = BlockWriter::open(Some(path.as_path()), false).unwrap();
    writer.write(b"fresh", true).unwrap();
    writer.close().unwrap();

    let frames = read_frames(&path);
    assert_eq!(decompress_all(&frames, DEFAULT_BLOCK_SIZE), b"fresh");
}

#[test]
fn test_empty_path_is_buffer_only() {
    let mut writer = BlockWriter::open(Some(Path::new("")), false).unwrap();
    assert!(!writer.has_sink());
    writer.write(b"only in memory", true).unwrap();
    assert!(!writer.dump().is_empty());
    assert_eq!(writer.stats().bytes_out, 0);
    assert_eq!(writer.stats().blocks, 1);
}

#[test]
fn test_unopenable_sink_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("capture.lz4");
    let result = BlockWriter::open(Some(path.as_path()), false);
    assert!(matches!(result, Err(WriterError::IoError(_))));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.lz4");
    let config = WriterConfig::default().with_block_size(0);
    let result = BlockWriter::open_with_config(Some(path.as_path()), &config);
    assert!(matches!(result, Err(WriterError::Configuration(_))));
    assert!(!path.exists());
}

#[test]
fn test_deflate_codec_frames() {
    use std::io::Read;
    let config = config().with_codec(CodecKind::Deflate { level: 6 });
    let data = b"deflate framed blocks ".repeat(400);
    let mut writer = BlockWriter::with_sink(Vec::new(), &config).unwrap();
    writer.write(&data, false).unwrap();
    assert_eq!(writer.codec_name(), "deflate");
    let sink = writer.finish().unwrap().unwrap();

    let mut out = Vec::new();
    for frame in FrameReader::new(&sink[..]) {
        let frame = frame.unwrap();
        flate2::read::DeflateDecoder::new(&frame[..])
            .read_to_end(&mut out)
            .unwrap();
    }
    assert_eq!(out, data);
}

/// Rejects every block after the first `ok` calls.
struct FailingCodec {
    inner: Lz4Codec,
    ok: std::sync::atomic::AtomicUsize,
}

impl BlockCodec for FailingCodec {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn compress_bound(&self, src_len: usize) -> tracy_lz4::Result<usize> {
        self.inner.compress_bound(src_len)
    }

    fn compress_into(&self, src: &[u8], dst: &mut [u8]) -> tracy_lz4::Result<usize> {
        use std::sync::atomic::Ordering;
        let remaining = self.ok.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(0);
        }
        self.ok.store(remaining - 1, Ordering::SeqCst);
        self.inner.compress_into(src, dst)
    }
}

#[test]
fn test_compression_failure_is_reported_not_dropped() {
    let codec = FailingCodec {
        inner: Lz4Codec::default(),
        ok: 1.into(),
    };
    let mut writer = BlockWriter::with_codec(Some(Vec::new()), B, Box::new(codec)).unwrap();

    let data = vec![1u8; B * 3];
    let err = writer.write(&data, false).unwrap_err();
    match err {
        WriterError::CompressionFailed {
            codec,
            block_len,
            accepted,
            ..
        } => {
            assert_eq!(codec, "failing");
            assert_eq!(block_len, B);
            assert_eq!(accepted, 2 * B);
        }
        other => panic!("unexpected error {other:?}"),
    }
    // The failed block is still buffered and nothing partial hit the sink.
    assert_eq!(writer.pending(), B);
    assert!(writer.dump().is_empty());
    assert_eq!(writer.stats().blocks, 1);
    assert_eq!(writer.stats().compression_failures, 1);
    assert_eq!(read_frames_from(writer.sink_ref().unwrap()).len(), 1);

    assert!(writer.close().is_err());
    assert!(!writer.is_closed());
}

fn read_frames_from(buf: &[u8]) -> Vec<Vec<u8>> {
    FrameReader::new(buf)
        .collect::<tracy_lz4::Result<Vec<_>>>()
        .unwrap()
}

#[test]
fn test_io_write_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("io.lz4");
    let data = b"0123456789".repeat(1000);
    {
        let mut writer = BlockWriter::open_with_config(Some(path.as_path()), &config()).unwrap();
        write!(writer, "header:").unwrap();
        writer.write_all(&data).unwrap();
    }
    let mut expected = b"header:".to_vec();
    expected.extend_from_slice(&data);
    assert_eq!(decompress_all(&read_frames(&path), B), expected);
}

/// Vec sink that fails its `fail_on`-th write call (from zero) once.
struct FlakySink {
    out: Vec<u8>,
    calls: usize,
    fail_on: usize,
}

impl Write for FlakySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let call = self.calls;
        self.calls += 1;
        if call == self.fail_on {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        }
        self.out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_write_all_survives_sink_failure_mid_frame() {
    let data: Vec<u8> = (0..B * 3).map(|i| (i * 13 % 256) as u8).collect();
    // Each frame takes two sink writes; call 3 is the payload of frame two.
    let sink = FlakySink {
        out: Vec::new(),
        calls: 0,
        fail_on: 3,
    };
    let mut writer = BlockWriter::with_sink(sink, &config()).unwrap();
    writer.write_all(&data).unwrap();
    let sink = writer.finish().unwrap().unwrap();

    assert_eq!(sink.calls, 7);
    let frames = read_frames_from(&sink.out);
    assert_eq!(frames.len(), 3);
    assert_eq!(decompress_all(&frames, B), data);
}

#[test]
fn test_sink_error_reports_accepted_bytes() {
    let sink = FlakySink {
        out: Vec::new(),
        calls: 0,
        fail_on: 0,
    };
    let mut writer = BlockWriter::with_sink(sink, &config()).unwrap();
    let err = writer.write(&vec![4u8; B + 100], false).unwrap_err();
    assert!(matches!(err, WriterError::Sink { accepted, .. } if accepted == B));
    assert_eq!(err.accepted(), Some(B));

    // Only the first block was taken; the caller resends the rest.
    writer.write(&vec![4u8; 100], false).unwrap();
    writer.flush().unwrap();
    let sink = writer.finish().unwrap().unwrap();
    assert_eq!(decompress_all(&read_frames_from(&sink.out), B), vec![4u8; B + 100]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_order_preserved(
        writes in prop::collection::vec(
            (prop::collection::vec(any::<u8>(), 0..700), any::<bool>()),
            0..24,
        )
    ) {
        let block = 512;
        let config = WriterConfig::default().with_block_size(block);
        let mut writer = BlockWriter::with_sink(Vec::new(), &config).unwrap();
        let mut expected = Vec::new();
        for (payload, flush) in &writes {
            writer.write(payload, *flush).unwrap();
            prop_assert!(writer.pending() < block);
            if *flush {
                prop_assert_eq!(writer.pending(), 0);
            }
            expected.extend_from_slice(payload);
        }
        let sink = writer.finish().unwrap().unwrap();
        let frames = read_frames_from(&sink);
        for frame in &frames {
            let len = lz4::block::decompress(frame, Some(block as i32)).unwrap().len();
            prop_assert!(len > 0 && len <= block);
        }
        prop_assert_eq!(decompress_all(&frames, block), expected);
    }
}
