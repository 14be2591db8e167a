//! tracy-lz4: block-buffered compression writer for trace capture files.
//!
//! Input is accumulated into fixed-size blocks (64 KiB by default). Every
//! full block, or a partial block when the caller flushes, is compressed in a
//! single call and appended to the output as a length-prefixed frame:
//! - a 4-byte little-endian `i32` holding the compressed length
//! - the compressed bytes
//!
//! With the default LZ4 codec the output matches the block layout of Tracy's
//! compressed capture files, so a reader can decode one block at a time.
//!
//! ```no_run
//! use std::path::Path;
//! use tracy_lz4::BlockWriter;
//!
//! let mut writer = BlockWriter::open(Some(Path::new("capture.lz4")), false)?;
//! writer.write(b"zone begin", false)?;
//! writer.write(b"zone end", true)?;
//! writer.close()?;
//! # Ok::<(), tracy_lz4::WriterError>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod framing;
pub mod writer;

pub use crate::codec::{BlockCodec, DeflateCodec, Lz4Codec};
pub use crate::config::{CodecKind, WriterConfig, DEFAULT_BLOCK_SIZE};
pub use crate::error::{Result, WriterError};
pub use crate::framing::FrameReader;
pub use crate::writer::{BlockStats, BlockWriter};

/// Compress a single buffer as one raw LZ4 block, no framing.
pub fn compress_block(data: &[u8]) -> Result<Vec<u8>> {
    let codec = Lz4Codec::default();
    let mut dst = vec![0u8; codec.compress_bound(data.len())?];
    let len = codec.compress_into(data, &mut dst)?;
    dst.truncate(len);
    Ok(dst)
}
