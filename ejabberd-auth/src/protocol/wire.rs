//! Frame format of the ejabberd extauth protocol.
//!
//! Requests are length-prefixed: [2 bytes big-endian u16][payload].
//! Responses are always 4 bytes: [0x00 0x02][0x00 0x00 | 0x00 0x01].

use std::io::{ErrorKind, Read, Write};

use thiserror::Error;

/// Length marker carried by every response frame.
pub const RESPONSE_LENGTH: u16 = 2;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("stream closed inside the length prefix ({received} of 2 bytes)")]
    TruncatedPrefix { received: usize },
    #[error("frame declared {expected} bytes but the stream closed after {received}")]
    TruncatedPayload { expected: usize, received: usize },
    #[error("payload of {0} bytes does not fit a 2-byte length prefix")]
    Oversized(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fills `buf` as far as the stream allows and returns how many bytes were read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, FramingError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FramingError::Io(e)),
        }
    }
    Ok(filled)
}

/// Read one request frame.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary. Any
/// other short read is a [`FramingError`]: the next frame offset is lost.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, FramingError> {
    let mut len_buf = [0u8; 2];
    match read_full(reader, &mut len_buf)? {
        0 => return Ok(None),
        2 => {}
        received => return Err(FramingError::TruncatedPrefix { received }),
    }

    let len = u16::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    let received = read_full(reader, &mut payload)?;
    if received < len {
        return Err(FramingError::TruncatedPayload {
            expected: len,
            received,
        });
    }

    Ok(Some(payload))
}

/// Length-prefix a request payload.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    let len = u16::try_from(payload.len()).map_err(|_| FramingError::Oversized(payload.len()))?;
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

pub fn encode_decision(accepted: bool) -> [u8; 4] {
    let [l0, l1] = RESPONSE_LENGTH.to_be_bytes();
    let [v0, v1] = u16::from(accepted).to_be_bytes();
    [l0, l1, v0, v1]
}

/// Write a response frame and flush it so the host sees it immediately.
pub fn write_decision<W: Write>(writer: &mut W, accepted: bool) -> Result<(), FramingError> {
    writer.write_all(&encode_decision(accepted))?;
    writer.flush()?;
    Ok(())
}
