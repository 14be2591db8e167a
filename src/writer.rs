//! Buffering block writer.
//!
//! [`BlockWriter`] accumulates input into a fixed-size block. Each time the
//! block fills (or the caller asks for a flush) the buffered bytes are
//! compressed in one codec call and appended to the sink as a frame (see
//! [`crate::framing`]). Frames appear in the order their bytes were written.
//!
//! Without a sink the writer still compresses every block, which makes the
//! framing logic testable through [`BlockWriter::dump`] alone.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::codec::BlockCodec;
use crate::config::WriterConfig;
use crate::error::{Result, WriterError};
use crate::framing;

/// Counters over the life of a writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    /// Blocks successfully compressed.
    pub blocks: u64,
    /// Uncompressed bytes that went into those blocks.
    pub bytes_in: u64,
    /// Frame bytes (headers included) written to the sink.
    pub bytes_out: u64,
    pub compression_failures: u64,
}

pub struct BlockWriter<W: Write = File> {
    sink: Option<W>,
    codec: Box<dyn BlockCodec>,
    // input block
    src: Box<[u8]>,
    offset: usize,
    // last compressed block
    dst: Box<[u8]>,
    dst_len: usize,
    // bytes of the frame for `dst` already on the sink, while it is unfinished
    frame_written: Option<usize>,
    stats: BlockStats,
    closed: bool,
}

impl BlockWriter<File> {
    /// Open a writer with the default configuration.
    ///
    /// A `None` or empty path gives a buffer-only writer. `append` keeps any
    /// existing file content; otherwise the file is truncated.
    pub fn open(path: Option<&Path>, append: bool) -> Result<Self> {
        let config = WriterConfig::default().with_append(append);
        Self::open_with_config(path, &config)
    }

    /// Open a writer on `path` using `config`. The config is validated before
    /// the file is touched.
    pub fn open_with_config(path: Option<&Path>, config: &WriterConfig) -> Result<Self> {
        config.validate()?;
        let sink = match path {
            Some(path) if !path.as_os_str().is_empty() => {
                let mut options = OpenOptions::new();
                if config.append {
                    options.append(true).create(true);
                } else {
                    options.write(true).create(true).truncate(true);
                }
                let file = options.open(path)?;
                debug!(path = %path.display(), append = config.append, "opened block sink");
                Some(file)
            }
            _ => None,
        };
        Self::with_codec(sink, config.block_size, config.codec.build())
    }

    /// A writer with no sink; blocks are only visible through [`Self::dump`].
    pub fn buffer_only(config: &WriterConfig) -> Result<Self> {
        Self::open_with_config(None, config)
    }
}

impl<W: Write> BlockWriter<W> {
    /// Wrap an existing sink, such as a `Vec<u8>` or a socket.
    pub fn with_sink(sink: W, config: &WriterConfig) -> Result<Self> {
        config.validate()?;
        Self::with_codec(Some(sink), config.block_size, config.codec.build())
    }

    /// Build a writer around an arbitrary codec. The output buffer is sized
    /// by the codec's own bound for `block_size`.
    pub fn with_codec(
        sink: Option<W>,
        block_size: usize,
        codec: Box<dyn BlockCodec>,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(WriterError::Configuration(
                "block_size must be positive".into(),
            ));
        }
        let bound = codec.compress_bound(block_size)?;
        Ok(Self {
            sink,
            codec,
            src: vec![0u8; block_size].into_boxed_slice(),
            offset: 0,
            dst: vec![0u8; bound].into_boxed_slice(),
            dst_len: 0,
            frame_written: None,
            stats: BlockStats::default(),
            closed: false,
        })
    }

    /// Append `data`, compressing every block it fills. With `flush`, any
    /// bytes still buffered afterwards are compressed as a short block.
    ///
    /// On a compression error the failing block stays buffered and is retried
    /// by the next call. When the sink fails mid-frame, the rest of that frame
    /// is written by the next call before any new input is buffered. Either
    /// way, bytes of `data` past the failing block are not taken; the error's
    /// `accepted` field says how many were.
    pub fn write(&mut self, data: &[u8], flush: bool) -> Result<()> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        if self.frame_written.is_some() {
            self.emit_block()?;
        }

        let capacity = self.src.len();
        let mut input = data;
        while input.len() >= capacity - self.offset {
            let room = capacity - self.offset;
            let (head, rest) = input.split_at(room);
            self.src[self.offset..].copy_from_slice(head);
            self.offset = capacity;
            input = rest;
            self.emit_block()
                .map_err(|e| e.with_accepted(data.len() - input.len()))?;
        }

        self.src[self.offset..self.offset + input.len()].copy_from_slice(input);
        self.offset += input.len();

        if flush && self.offset > 0 {
            self.emit_block().map_err(|e| e.with_accepted(data.len()))?;
        }
        Ok(())
    }

    /// Compress whatever is buffered, then flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.write(&[], true)?;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Copy of the most recently compressed block. Empty before the first
    /// block and after a failed compression.
    pub fn dump(&self) -> Vec<u8> {
        self.last_block().to_vec()
    }

    /// Borrowing form of [`Self::dump`].
    pub fn last_block(&self) -> &[u8] {
        if self.dst_len == 0 || self.dst_len > self.dst.len() {
            return &[];
        }
        &self.dst[..self.dst_len]
    }

    /// Bytes buffered and not yet compressed.
    pub fn pending(&self) -> usize {
        self.offset
    }

    /// Uncompressed bytes per block.
    pub fn block_size(&self) -> usize {
        self.src.len()
    }

    /// Size of the compressed-block buffer, the codec's bound for one block.
    pub fn output_capacity(&self) -> usize {
        self.dst.len()
    }

    /// Name of the codec compressing each block.
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Counters since the writer was created.
    pub fn stats(&self) -> &BlockStats {
        &self.stats
    }

    /// `false` for buffer-only writers and after [`Self::close`].
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// The sink, if the writer has one.
    pub fn sink_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    /// Whether [`Self::close`] or [`Self::finish`] has completed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Compress any pending bytes and release the sink. Calling it again is
    /// a no-op. If the final block cannot be written the writer stays open so
    /// the caller may retry.
    pub fn close(&mut self) -> Result<()> {
        self.finalize()?;
        self.sink = None;
        Ok(())
    }

    /// Close the writer and hand back the sink, if it had one.
    pub fn finish(mut self) -> Result<Option<W>> {
        self.finalize()?;
        Ok(self.sink.take())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.offset > 0 {
            self.emit_block()?;
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        self.closed = true;
        debug!(
            blocks = self.stats.blocks,
            bytes_in = self.stats.bytes_in,
            bytes_out = self.stats.bytes_out,
            "block writer closed"
        );
        Ok(())
    }

    /// Compress `src[..offset]` and persist it as one frame. If an earlier
    /// attempt already compressed the block but the sink failed, only the
    /// unwritten tail of that frame is sent.
    fn emit_block(&mut self) -> Result<()> {
        let len = self.offset;
        let resume_at = match self.frame_written {
            Some(written) => written,
            None => {
                let compressed = match self.codec.compress_into(&self.src[..len], &mut self.dst) {
                    Ok(n) if n > 0 && n <= self.dst.len() => n,
                    Ok(n) => {
                        return Err(self.compression_failed(len, format!("codec returned length {n}")))
                    }
                    Err(e) => return Err(self.compression_failed(len, e.to_string())),
                };
                self.dst_len = compressed;
                0
            }
        };
        let compressed = self.dst_len;

        if let Some(sink) = self.sink.as_mut() {
            let mut written = resume_at;
            let result = framing::resume_frame(sink, &self.dst[..compressed], &mut written);
            self.stats.bytes_out += (written - resume_at) as u64;
            if let Err(e) = result {
                self.frame_written = Some(written);
                warn!(block_len = len, frame_written = written, error = %e, "sink write failed mid-frame");
                return Err(match e {
                    WriterError::IoError(source) => WriterError::Sink {
                        accepted: 0,
                        source,
                    },
                    other => other,
                });
            }
        }

        self.frame_written = None;
        self.stats.blocks += 1;
        self.stats.bytes_in += len as u64;
        self.offset = 0;
        trace!(
            codec = self.codec.name(),
            block_len = len,
            compressed_len = compressed,
            "emitted block"
        );
        Ok(())
    }

    fn compression_failed(&mut self, block_len: usize, reason: String) -> WriterError {
        self.dst_len = 0;
        self.stats.compression_failures += 1;
        warn!(codec = self.codec.name(), block_len, %reason, "block compression failed");
        WriterError::CompressionFailed {
            codec: self.codec.name(),
            block_len,
            accepted: 0,
            reason,
        }
    }
}

impl<W: Write> Drop for BlockWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            warn!(error = %e, pending = self.offset, "failed to finalize block writer on drop");
        }
    }
}

impl<W: Write> Write for BlockWriter<W> {
    /// Reports a short write when a block fails after part of `buf` was
    /// taken; the error surfaces on the next call.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match BlockWriter::write(self, buf, false) {
            Ok(()) => Ok(buf.len()),
            Err(e) => match e.accepted() {
                Some(accepted) if accepted > 0 => Ok(accepted),
                _ => Err(e.into()),
            },
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        BlockWriter::flush(self)?;
        Ok(())
    }
}
