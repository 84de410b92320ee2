//! Length-prefixed message buffer.
//!
//! A [`Message`] owns a single contiguous byte buffer holding one unit of wire traffic:
//!
//! ```text
//! [0 .. 8)              body length, ASCII decimal, right-justified, space padded
//! [8 .. 8 + len)        body bytes
//! [8 + len]             sentinel (0), local only, never sent
//! ```
//!
//! The buffer is either absent (capacity 0) or exactly [`allocation_size`] bytes for some body
//! length, which always leaves room for the trailing sentinel. Every mutation that changes the
//! body length goes through one capacity check, so the layout above holds after construction,
//! copy, fill, decode and resize alike.
//!
//! The correlation id is local metadata for matching responses to requests. It is copied along
//! with the message but never written into the buffer.
//!
//! # Example
//! ```rust
//! use msgbuf::Message;
//!
//! let mut msg = Message::new();
//! msg.fill(b"PING").unwrap();
//!
//! assert_eq!(msg.length(), 12);
//! assert_eq!(msg.wire_bytes(), b"       4PING");
//! ```
use log::trace;
use thiserror::Error;

/// Width of the textual length field at the start of every message.
pub const HEADER_LENGTH: usize = 8;
/// Granularity, in bytes, of the body region allocation.
pub const ALIGNMENT: usize = 8;
/// Largest body a message may carry or announce in its header.
pub const MAX_BODY_LENGTH: usize = 512;

const SENTINEL: u8 = 0;

/// Buffer size reserved for a body of `n` bytes.
///
/// Always reserves at least one extra byte past the body for the sentinel; when `n` is already
/// a multiple of [`ALIGNMENT`] a whole extra block is added.
pub const fn allocation_size(n: usize) -> usize {
    HEADER_LENGTH + ALIGNMENT * (n / ALIGNMENT + 1)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("cannot fill a message with an empty payload")]
    EmptyPayload,

    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("malformed header {0:?}")]
    MalformedHeader(String),

    #[error("resize requires a non-zero length")]
    InvalidResizeLength,

    #[error("release called on a message without a buffer")]
    ReleaseOfEmptyBuffer,
}

/// One header + body message backed by an owned buffer.
#[derive(Debug, Default)]
pub struct Message {
    buffer: Vec<u8>,
    body_length: usize,
    correlation_id: u64,
}

impl Clone for Message {
    fn clone(&self) -> Self {
        let mut copy = Message::new();
        copy.clone_from(self);
        copy
    }

    /// Copy assignment. Reuses the existing buffer when it can hold the source's wire bytes.
    /// Assigning from a message without a buffer leaves `self` without one as well.
    fn clone_from(&mut self, source: &Self) {
        self.correlation_id = source.correlation_id;

        if source.is_empty() {
            self.release();
            return;
        }

        self.ensure_capacity(source.body_length);
        let len = source.length();
        self.buffer[..len].copy_from_slice(&source.buffer[..len]);
        self.body_length = source.body_length;
        self.buffer[len] = SENTINEL;
    }
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the body with `payload` and encode the matching header.
    ///
    /// The buffer is only reallocated when it cannot hold the new body plus its sentinel; on
    /// error the message is left untouched.
    pub fn fill(&mut self, payload: &[u8]) -> Result<(), MessageError> {
        let len = payload.len();
        if len == 0 {
            return Err(MessageError::EmptyPayload);
        }
        if len > MAX_BODY_LENGTH {
            return Err(MessageError::PayloadTooLarge {
                len,
                max: MAX_BODY_LENGTH,
            });
        }

        self.ensure_capacity(len);
        self.body_length = len;
        self.encode_header();
        self.buffer[HEADER_LENGTH..HEADER_LENGTH + len].copy_from_slice(payload);
        self.buffer[HEADER_LENGTH + len] = SENTINEL;
        Ok(())
    }

    /// Fill from NUL-terminated text; anything after the first NUL is ignored.
    pub fn fill_text(&mut self, text: &str) -> Result<(), MessageError> {
        let bytes = text.as_bytes();
        let end = bytes
            .iter()
            .position(|&b| b == SENTINEL)
            .unwrap_or(bytes.len());
        self.fill(&bytes[..end])
    }

    /// Write the current body length into the header region. Does nothing without a buffer.
    pub fn encode_header(&mut self) {
        if self.is_empty() {
            return;
        }

        let header = format!("{:>width$}", self.body_length, width = HEADER_LENGTH);
        self.buffer[..HEADER_LENGTH].copy_from_slice(header.as_bytes());
    }

    /// Parse the header region and adopt it as the body length.
    ///
    /// Leading and trailing whitespace is ignored and the text ends at the first NUL byte.
    /// A negative value is reported as [`MessageError::MalformedHeader`], not as oversize.
    /// On failure the body length is reset to 0.
    ///
    /// On success the header is rewritten in canonical form (right-justified, space padded),
    /// so a copied message never carries the sender's padding back onto the wire. When the
    /// decoded length does not fit the current buffer a fresh one is allocated first, so the
    /// body region is always ready to receive `body_length` bytes.
    pub fn decode_header(&mut self) -> Result<usize, MessageError> {
        match self.parse_header() {
            Ok(len) => {
                self.ensure_capacity(len);
                self.body_length = len;
                self.encode_header();
                self.buffer[HEADER_LENGTH + len] = SENTINEL;
                Ok(len)
            }
            Err(e) => {
                self.body_length = 0;
                Err(e)
            }
        }
    }

    fn parse_header(&self) -> Result<usize, MessageError> {
        let raw = self.header();
        if raw.is_empty() {
            return Err(MessageError::MalformedHeader(String::new()));
        }

        let end = raw
            .iter()
            .position(|&b| b == SENTINEL)
            .unwrap_or(raw.len());
        let malformed = || MessageError::MalformedHeader(String::from_utf8_lossy(raw).into_owned());

        let text = std::str::from_utf8(raw[..end].trim_ascii()).map_err(|_| malformed())?;
        let len = text.parse::<usize>().map_err(|_| malformed())?;

        if len > MAX_BODY_LENGTH {
            return Err(MessageError::PayloadTooLarge {
                len,
                max: MAX_BODY_LENGTH,
            });
        }
        Ok(len)
    }

    /// Place a sentinel at body offset `pos`. Offsets past the body, or a missing buffer,
    /// leave the message unchanged.
    pub fn fill_end(&mut self, pos: usize) {
        if self.is_empty() || pos > self.body_length {
            return;
        }
        self.buffer[HEADER_LENGTH + pos] = SENTINEL;
    }

    /// Drop the current buffer and allocate a zeroed one sized for a `len` byte body.
    ///
    /// Old content is not preserved. The new message has an empty body and a header of `0`.
    pub fn resize(&mut self, len: usize) -> Result<(), MessageError> {
        if len == 0 {
            return Err(MessageError::InvalidResizeLength);
        }

        let size = allocation_size(len);
        trace!("resizing message buffer from {} to {size} bytes", self.capacity());
        self.buffer = vec![0; size];
        self.body_length = 0;
        self.encode_header();
        Ok(())
    }

    /// Set the body length without touching the body bytes, e.g. after writing them in place
    /// through [`Message::body_mut`] on a message prepared with [`Message::resize`]. The header
    /// is not re-encoded.
    pub fn set_body_length(&mut self, len: usize) -> Result<(), MessageError> {
        if len > MAX_BODY_LENGTH {
            return Err(MessageError::PayloadTooLarge {
                len,
                max: MAX_BODY_LENGTH,
            });
        }
        if self.capacity() < HEADER_LENGTH + len + 1 {
            return Err(MessageError::PayloadTooLarge {
                len,
                max: self.capacity().saturating_sub(HEADER_LENGTH + 1),
            });
        }

        self.body_length = len;
        self.buffer[HEADER_LENGTH + len] = SENTINEL;
        Ok(())
    }

    /// Free the buffer. Safe to call on a message that holds none.
    pub fn release(&mut self) {
        self.buffer = Vec::new();
        self.body_length = 0;
    }

    /// Like [`Message::release`], but reports a message that had nothing to free.
    pub fn try_release(&mut self) -> Result<(), MessageError> {
        if self.is_empty() {
            return Err(MessageError::ReleaseOfEmptyBuffer);
        }
        self.release();
        Ok(())
    }

    /// Whole allocated buffer, including slack past the sentinel.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn header(&self) -> &[u8] {
        self.buffer.get(..HEADER_LENGTH).unwrap_or_default()
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        self.buffer.get_mut(..HEADER_LENGTH).unwrap_or_default()
    }

    pub fn body(&self) -> &[u8] {
        self.buffer
            .get(HEADER_LENGTH..HEADER_LENGTH + self.body_length)
            .unwrap_or_default()
    }

    pub fn body_mut(&mut self) -> &mut [u8] {
        let end = HEADER_LENGTH + self.body_length;
        self.buffer
            .get_mut(HEADER_LENGTH..end)
            .unwrap_or_default()
    }

    /// Body up to the first sentinel, if it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        let body = self.body();
        let end = body
            .iter()
            .position(|&b| b == SENTINEL)
            .unwrap_or(body.len());
        std::str::from_utf8(&body[..end]).ok()
    }

    /// Exactly the bytes a transport sends: header followed by body.
    pub fn wire_bytes(&self) -> &[u8] {
        self.buffer.get(..self.length()).unwrap_or_default()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn body_length(&self) -> usize {
        self.body_length
    }

    pub fn length(&self) -> usize {
        HEADER_LENGTH + self.body_length
    }

    /// `true` when no buffer is allocated.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    pub fn set_correlation_id(&mut self, id: u64) {
        self.correlation_id = id;
    }

    /// Make room for a body of `body_length` bytes plus sentinel. Returns `true` when a new
    /// buffer had to be allocated, in which case previous content is gone.
    fn ensure_capacity(&mut self, body_length: usize) -> bool {
        if self.capacity() >= HEADER_LENGTH + body_length + 1 {
            return false;
        }

        let size = allocation_size(body_length);
        trace!("growing message buffer from {} to {size} bytes", self.capacity());
        self.buffer = vec![0; size];
        true
    }
}
