//! Block codecs: the compression primitive each buffered block is handed to.
//!
//! A codec compresses one whole block into a caller-provided buffer whose
//! capacity is at least [`BlockCodec::compress_bound`] of the block length.
//! Every call is independent; no dictionary or state is carried between
//! blocks, so each frame can be decoded on its own.

use flate2::{Compress, Compression, FlushCompress, Status};
use lz4::block::{self, CompressionMode};

use crate::config::CodecKind;
use crate::error::{Result, WriterError};

pub trait BlockCodec: Send {
    fn name(&self) -> &'static str;

    /// Worst-case compressed size for `src_len` input bytes.
    fn compress_bound(&self, src_len: usize) -> Result<usize>;

    /// Compress `src` into `dst`, returning the number of bytes written.
    /// A zero-length result is treated as a failure by the writer.
    fn compress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

impl CodecKind {
    pub fn build(self) -> Box<dyn BlockCodec> {
        match self {
            CodecKind::Lz4 => Box::new(Lz4Codec::default()),
            CodecKind::Lz4Fast { acceleration } => Box::new(Lz4Codec::fast(acceleration)),
            CodecKind::Lz4High { level } => Box::new(Lz4Codec::high(level)),
            CodecKind::Deflate { level } => Box::new(DeflateCodec::new(level)),
        }
    }
}

/// Raw LZ4 block compression (no frame header, no prepended size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lz4Codec {
    mode: Lz4Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lz4Mode {
    Default,
    Fast(i32),
    High(i32),
}

impl Default for Lz4Codec {
    fn default() -> Self {
        Self {
            mode: Lz4Mode::Default,
        }
    }
}

impl Lz4Codec {
    pub fn fast(acceleration: i32) -> Self {
        Self {
            mode: Lz4Mode::Fast(acceleration),
        }
    }

    /// LZ4HC. Output is decoded by the same block decoder as the fast modes.
    pub fn high(level: i32) -> Self {
        Self {
            mode: Lz4Mode::High(level),
        }
    }

    fn compression_mode(&self) -> CompressionMode {
        match self.mode {
            Lz4Mode::Default => CompressionMode::DEFAULT,
            Lz4Mode::Fast(acceleration) => CompressionMode::FAST(acceleration),
            Lz4Mode::High(level) => CompressionMode::HIGHCOMPRESSION(level),
        }
    }
}

impl BlockCodec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress_bound(&self, src_len: usize) -> Result<usize> {
        block::compress_bound(src_len).map_err(|e| WriterError::Lz4Error(e.to_string()))
    }

    fn compress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        block::compress_to_buffer(src, Some(self.compression_mode()), false, dst)
            .map_err(|e| WriterError::Lz4Error(e.to_string()))
    }
}

/// Raw deflate per block, via flate2.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: u32,
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self { level }
    }
}

impl BlockCodec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress_bound(&self, src_len: usize) -> Result<usize> {
        // Stored blocks cost 5 bytes per 64 KiB; this leaves ample headroom.
        src_len
            .checked_add(src_len / 8 + 64)
            .ok_or_else(|| WriterError::DeflateError(format!("no bound for {src_len} bytes")))
    }

    fn compress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let mut encoder = Compress::new(Compression::new(self.level), false);
        let status = encoder
            .compress(src, dst, FlushCompress::Finish)
            .map_err(|e| WriterError::DeflateError(e.to_string()))?;
        match status {
            Status::StreamEnd => Ok(encoder.total_out() as usize),
            _ => Err(WriterError::DeflateError(format!(
                "output buffer of {} bytes too small for {} input bytes",
                dst.len(),
                src.len()
            ))),
        }
    }
}
