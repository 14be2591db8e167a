//! Length-prefixed block framing.
//!
//! ```text
//! file  := frame*
//! frame := length:i32 (little-endian) payload:[u8; length]
//! ```
//!
//! This is the layout Tracy uses for its compressed trace blocks: no magic,
//! no separators, no trailer.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, WriterError};

pub const FRAME_HEADER_LEN: usize = 4;

pub fn encode_header(payload_len: usize) -> Result<[u8; FRAME_HEADER_LEN]> {
    match i32::try_from(payload_len) {
        Ok(len) if len > 0 => Ok(len.to_le_bytes()),
        _ => Err(WriterError::CorruptFrame(format!(
            "payload length {payload_len} not representable as a positive i32"
        ))),
    }
}

pub fn decode_header(header: [u8; FRAME_HEADER_LEN]) -> Result<usize> {
    let len = i32::from_le_bytes(header);
    if len <= 0 {
        return Err(WriterError::CorruptFrame(format!(
            "non-positive frame length {len}"
        )));
    }
    Ok(len as usize)
}

/// Write one frame, returning the number of bytes written.
pub fn write_frame<W: Write + ?Sized>(sink: &mut W, payload: &[u8]) -> Result<usize> {
    let mut written = 0;
    resume_frame(sink, payload, &mut written)?;
    Ok(written)
}

/// Write the frame for `payload`, skipping the first `*written` bytes of it.
///
/// `*written` is advanced after every successful sink write, so when this
/// returns an error it holds exactly how much of the frame reached the sink
/// and a later call picks up from there.
pub fn resume_frame<W: Write + ?Sized>(
    sink: &mut W,
    payload: &[u8],
    written: &mut usize,
) -> Result<()> {
    let header = encode_header(payload.len())?;
    let total = FRAME_HEADER_LEN + payload.len();
    while *written < total {
        let chunk = if *written < FRAME_HEADER_LEN {
            &header[*written..]
        } else {
            &payload[*written - FRAME_HEADER_LEN..]
        };
        match sink.write(chunk) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    ErrorKind::WriteZero,
                    "sink accepted no bytes of a frame",
                )
                .into())
            }
            Ok(n) => *written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Iterates over the raw (still compressed) payloads of a framed stream.
pub struct FrameReader<R> {
    inner: R,
    offset: u64,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
        }
    }

    /// Byte offset of the next frame header.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        let mut filled = 0;
        while filled < FRAME_HEADER_LEN {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(WriterError::CorruptFrame(format!(
                        "truncated header at offset {}",
                        self.offset
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        let len = decode_header(header)?;
        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                WriterError::CorruptFrame(format!(
                    "truncated payload at offset {}: expected {len} bytes",
                    self.offset
                ))
            } else {
                e.into()
            }
        })?;
        self.offset += (FRAME_HEADER_LEN + len) as u64;
        Ok(Some(payload))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
