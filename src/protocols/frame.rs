//! Multiplexed log frame codec.
//!
//! Attached container log streams interleave stdin, stdout and stderr over
//! one connection using an 8-byte header: byte 0 names the stream, bytes 4-7
//! carry a big-endian payload length, payload follows. This decoder keys off
//! byte 0 alone and takes everything past the header as payload, so a network
//! chunk containing several frames, or a frame split across chunks, is
//! decoded lossily. Chunks that do not start with a recognized stream byte
//! (TTY-attached containers have no headers at all) pass through whole with
//! no stream label.

use serde::Serialize;

const HEADER_LEN: usize = 8;

/// Stream a multiplexed frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    fn from_header_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// A decoded log frame: the source stream, if the chunk carried a header, and
/// the payload as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogFrame {
    pub stream: Option<StreamKind>,
    pub data: String,
}

/// Decode one network chunk into a log frame.
pub fn decode(chunk: &[u8]) -> LogFrame {
    if let Some(stream) = chunk.first().copied().and_then(StreamKind::from_header_byte) {
        let payload = chunk.get(HEADER_LEN..).unwrap_or_default();
        LogFrame {
            stream: Some(stream),
            data: String::from_utf8_lossy(payload).into_owned(),
        }
    } else {
        LogFrame {
            stream: None,
            data: String::from_utf8_lossy(chunk).into_owned(),
        }
    }
}
