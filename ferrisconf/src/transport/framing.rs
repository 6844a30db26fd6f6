//! NETCONF message framing (RFC 6242).
//!
//! NETCONF 1.0 terminates each message with `]]>]]>`. NETCONF 1.1 uses
//! chunked framing: one or more `\n#<len>\n<data>` chunks followed by
//! `\n##\n`. Both sides start in 1.0 framing for the hello exchange and
//! switch to chunked framing when both advertise `base:1.1`.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::TransportError;

/// NETCONF 1.0 end-of-message delimiter.
pub const EOM_DELIMITER: &[u8] = b"]]>]]>";

/// NETCONF 1.1 end-of-chunks marker.
const END_OF_CHUNKS: &[u8] = b"\n##\n";

/// Largest chunk size allowed by RFC 6242.
const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

/// Framing mechanism in use on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// NETCONF 1.0 `]]>]]>` delimiter.
    EndOfMessage,
    /// NETCONF 1.1 chunked framing.
    Chunked,
}

impl Framing {
    /// Frame one message for the wire.
    pub fn encode(&self, message: &str) -> Bytes {
        let mut buf = BytesMut::with_capacity(message.len() + 16);
        match self {
            Framing::EndOfMessage => {
                buf.extend_from_slice(message.as_bytes());
                buf.extend_from_slice(EOM_DELIMITER);
            }
            Framing::Chunked => {
                if !message.is_empty() {
                    buf.extend_from_slice(format!("\n#{}\n", message.len()).as_bytes());
                    buf.extend_from_slice(message.as_bytes());
                }
                buf.extend_from_slice(END_OF_CHUNKS);
            }
        }
        buf.freeze()
    }
}

/// Incremental decoder turning channel data into complete messages.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buffer: BytesMut,
    /// Chunks of the message currently being assembled (1.1 only).
    pending: BytesMut,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: BytesMut::with_capacity(8192),
            pending: BytesMut::new(),
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Switch framing; bytes already buffered are decoded with the new mode.
    pub fn set_framing(&mut self, framing: Framing) {
        self.framing = framing;
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len() + self.pending.len()
    }

    /// Pop the next complete message, if one is buffered.
    pub fn next_message(&mut self) -> Result<Option<String>, TransportError> {
        match self.framing {
            Framing::EndOfMessage => Ok(self.next_eom()),
            Framing::Chunked => self.next_chunked(),
        }
    }

    fn next_eom(&mut self) -> Option<String> {
        let pos = memchr::memmem::find(&self.buffer, EOM_DELIMITER)?;
        let message = self.buffer.split_to(pos);
        self.buffer.advance(EOM_DELIMITER.len());
        Some(String::from_utf8_lossy(&message).trim().to_string())
    }

    fn next_chunked(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            // Tolerate whitespace some servers leave after the hello delimiter
            while self.pending.is_empty()
                && self.buffer.len() >= 2
                && self.buffer[0].is_ascii_whitespace()
                && self.buffer[1] != b'#'
            {
                self.buffer.advance(1);
            }

            if self.buffer.len() < 4 {
                return Ok(None);
            }
            if &self.buffer[..2] != b"\n#" {
                return Err(TransportError::Framing(format!(
                    "expected chunk header, got {:?}",
                    String::from_utf8_lossy(&self.buffer[..self.buffer.len().min(16)])
                )));
            }

            if self.buffer[2] == b'#' {
                if self.buffer[3] != b'\n' {
                    return Err(TransportError::Framing(
                        "malformed end-of-chunks marker".to_string(),
                    ));
                }
                self.buffer.advance(END_OF_CHUNKS.len());
                let message = self.pending.split();
                return Ok(Some(String::from_utf8_lossy(&message).trim().to_string()));
            }

            let Some(len_end) = memchr::memchr(b'\n', &self.buffer[2..]) else {
                if self.buffer.len() > 2 + 10 + 1 {
                    return Err(TransportError::Framing("chunk header too long".to_string()));
                }
                return Ok(None);
            };

            let digits = &self.buffer[2..2 + len_end];
            let size = parse_chunk_size(digits)?;
            let header_len = 2 + len_end + 1;
            if self.buffer.len() < header_len + size {
                return Ok(None);
            }

            self.buffer.advance(header_len);
            let chunk = self.buffer.split_to(size);
            self.pending.extend_from_slice(&chunk);
        }
    }
}

fn parse_chunk_size(digits: &[u8]) -> Result<usize, TransportError> {
    let invalid = || {
        TransportError::Framing(format!(
            "invalid chunk size {:?}",
            String::from_utf8_lossy(digits)
        ))
    };

    if digits.is_empty() || digits[0] == b'0' || !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let size: u64 = std::str::from_utf8(digits)
        .map_err(|_| invalid())?
        .parse()
        .map_err(|_| invalid())?;
    if size > MAX_CHUNK_SIZE {
        return Err(invalid());
    }
    usize::try_from(size).map_err(|_| invalid())
}
