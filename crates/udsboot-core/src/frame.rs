//! Length-prefixed wire framing
//!
//! # Wire format
//!
//! ```text
//! ┌────────────────────────┬──────────────────────────────┐
//! │ length (u32, BE)       │ payload (length bytes)       │
//! └────────────────────────┴──────────────────────────────┘
//! ```
//!
//! The codec never looks inside the payload. A declared length of zero is a
//! framing error, and so is a declared length above the codec capacity.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame declares zero length")]
    ZeroLength,

    #[error("Frame too large: declared {declared} bytes (capacity {capacity})")]
    TooLarge { declared: usize, capacity: usize },

    #[error("Truncated frame: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    #[error("Channel closed")]
    Closed,

    #[error("Channel I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Whether the stream can no longer be read frame by frame.
    ///
    /// Zero-length and oversized frames are consumed entirely, so the next
    /// frame boundary is still known.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ZeroLength | Self::TooLarge { .. })
    }
}

/// Frame reader/writer with a fixed payload capacity
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    capacity: usize,
}

impl FrameCodec {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read one frame payload from `reader`.
    pub fn read_frame<R: Read + ?Sized>(&self, reader: &mut R) -> Result<Vec<u8>, FrameError> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        match fill(reader, &mut prefix)? {
            0 => return Err(FrameError::Closed),
            LENGTH_PREFIX_SIZE => {}
            received => {
                return Err(FrameError::Truncated {
                    expected: LENGTH_PREFIX_SIZE,
                    received,
                })
            }
        }

        let declared = u32::from_be_bytes(prefix) as usize;
        if declared == 0 {
            return Err(FrameError::ZeroLength);
        }

        if declared > self.capacity {
            let drained = io::copy(&mut (&mut *reader).take(declared as u64), &mut io::sink())?;
            if (drained as usize) < declared {
                return Err(FrameError::Truncated {
                    expected: declared,
                    received: drained as usize,
                });
            }
            return Err(FrameError::TooLarge {
                declared,
                capacity: self.capacity,
            });
        }

        let mut payload = vec![0u8; declared];
        let received = fill(reader, &mut payload)?;
        if received < declared {
            return Err(FrameError::Truncated {
                expected: declared,
                received,
            });
        }

        Ok(payload)
    }

    /// Write `payload` to `writer` behind its length prefix.
    pub fn write_frame<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        payload: &[u8],
    ) -> Result<(), FrameError> {
        if payload.is_empty() {
            return Err(FrameError::ZeroLength);
        }
        if payload.len() > self.capacity {
            return Err(FrameError::TooLarge {
                declared: payload.len(),
                capacity: self.capacity,
            });
        }

        let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);

        writer.write_all(&frame)?;
        writer.flush()?;
        Ok(())
    }
}

/// Read until `buf` is full or the reader reports end of stream.
/// Returns the number of bytes read.
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_read_frame() {
        let codec = FrameCodec::new(16);
        let mut input = Cursor::new(vec![0, 0, 0, 3, 0x22, 0xF0, 0x00]);
        let payload = codec.read_frame(&mut input).unwrap();
        assert_eq!(payload, vec![0x22, 0xF0, 0x00]);
    }

    #[test]
    fn test_zero_length_is_rejected() {
        let codec = FrameCodec::new(16);
        let mut input = Cursor::new(vec![0, 0, 0, 0]);
        let err = codec.read_frame(&mut input).unwrap_err();
        assert!(matches!(err, FrameError::ZeroLength));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_empty_channel_is_closed() {
        let codec = FrameCodec::new(16);
        let mut input = Cursor::new(Vec::new());
        assert!(matches!(
            codec.read_frame(&mut input),
            Err(FrameError::Closed)
        ));
    }

    #[test]
    fn test_truncated_prefix() {
        let codec = FrameCodec::new(16);
        let mut input = Cursor::new(vec![0, 0]);
        assert!(matches!(
            codec.read_frame(&mut input),
            Err(FrameError::Truncated {
                expected: 4,
                received: 2
            })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let codec = FrameCodec::new(16);
        let mut input = Cursor::new(vec![0, 0, 0, 5, 0x34, 0x00]);
        let err = codec.read_frame(&mut input).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 5,
                received: 2
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_oversized_frame_is_drained() {
        let codec = FrameCodec::new(2);
        let mut input = Cursor::new(vec![0, 0, 0, 3, 0xAA, 0xBB, 0xCC, 0, 0, 0, 1, 0x37]);

        let err = codec.read_frame(&mut input).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TooLarge {
                declared: 3,
                capacity: 2
            }
        ));

        // The next frame is still readable
        assert_eq!(codec.read_frame(&mut input).unwrap(), vec![0x37]);
    }

    #[test]
    fn test_write_frame() {
        let codec = FrameCodec::new(16);
        let mut output = Vec::new();
        codec.write_frame(&mut output, &[0x74, 0x40]).unwrap();
        assert_eq!(output, vec![0, 0, 0, 2, 0x74, 0x40]);
    }

    #[test]
    fn test_write_frame_respects_capacity() {
        let codec = FrameCodec::new(1);
        let mut output = Vec::new();
        assert!(matches!(
            codec.write_frame(&mut output, &[0x62, 0xF0]),
            Err(FrameError::TooLarge { .. })
        ));
        assert!(output.is_empty());
    }
}
