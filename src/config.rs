//! Configuration for tracy-lz4

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WriterError};

/// Tracy's input block size (`TracyFileMeta.hpp`).
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Largest block LZ4 accepts as a single input (`LZ4_MAX_INPUT_SIZE`).
pub const MAX_BLOCK_SIZE: usize = 0x7E00_0000;

/// Compression primitive used for each block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodecKind {
    /// `LZ4_compress_default`, the mode Tracy itself writes.
    #[default]
    Lz4,
    Lz4Fast { acceleration: i32 },
    Lz4High { level: i32 },
    /// Raw deflate. Not readable by Tracy.
    Deflate { level: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub block_size: usize,
    pub append: bool,
    pub codec: CodecKind,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            append: true,
            codec: CodecKind::default(),
        }
    }
}

impl WriterConfig {
    /// Uncompressed bytes per frame.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Keep existing sink content (`true`) or truncate it on open.
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Select the block codec.
    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check the block size bounds and the codec's level range.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(WriterError::Configuration(
                "block_size must be positive".into(),
            ));
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(WriterError::Configuration(format!(
                "block_size {} exceeds maximum {}",
                self.block_size, MAX_BLOCK_SIZE
            )));
        }
        match self.codec {
            CodecKind::Lz4 => {}
            CodecKind::Lz4Fast { acceleration } if acceleration < 1 => {
                return Err(WriterError::Configuration(format!(
                    "lz4 acceleration must be at least 1, got {acceleration}"
                )));
            }
            CodecKind::Lz4High { level } if !(1..=12).contains(&level) => {
                return Err(WriterError::Configuration(format!(
                    "lz4 high compression level must be in 1..=12, got {level}"
                )));
            }
            CodecKind::Deflate { level } if level > 9 => {
                return Err(WriterError::Configuration(format!(
                    "deflate level must be in 0..=9, got {level}"
                )));
            }
            _ => {}
        }
        Ok(())
    }
}
