//! Error types for tracy-lz4

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WriterError>;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The codec could not compress a block. The block stays buffered and is
    /// retried by the next write, flush or close.
    #[error("{codec} failed to compress a {block_len} byte block ({accepted} bytes of this write accepted): {reason}")]
    CompressionFailed {
        codec: &'static str,
        block_len: usize,
        accepted: usize,
        reason: String,
    },

    /// Writing a frame to the sink failed. The unfinished frame is resumed
    /// by the next write, flush or close.
    #[error("sink write failed ({accepted} bytes of this write accepted): {source}")]
    Sink {
        accepted: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("lz4 error: {0}")]
    Lz4Error(String),

    #[error("deflate error: {0}")]
    DeflateError(String),

    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("writer is closed")]
    Closed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl WriterError {
    /// Bytes of the failing `write` call the writer kept, for errors raised
    /// after part of the input was taken.
    pub fn accepted(&self) -> Option<usize> {
        match self {
            WriterError::CompressionFailed { accepted, .. } | WriterError::Sink { accepted, .. } => {
                Some(*accepted)
            }
            _ => None,
        }
    }

    pub(crate) fn with_accepted(self, count: usize) -> Self {
        match self {
            WriterError::CompressionFailed {
                codec,
                block_len,
                reason,
                ..
            } => WriterError::CompressionFailed {
                codec,
                block_len,
                accepted: count,
                reason,
            },
            WriterError::Sink { source, .. } => WriterError::Sink {
                accepted: count,
                source,
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for WriterError {
    fn from(err: serde_json::Error) -> Self {
        WriterError::SerializationError(err.to_string())
    }
}

impl From<WriterError> for std::io::Error {
    fn from(err: WriterError) -> Self {
        match err {
            WriterError::IoError(e) | WriterError::Sink { source: e, .. } => e,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
