use std::io::{self, Read, Write};

use log::trace;
use thiserror::Error;

use crate::message::{MAX_BODY_LENGTH, Message, MessageError};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid message: {0}")]
    Message(#[from] MessageError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by peer")]
    Closed,
}

/// Moves whole [`Message`]s over a byte stream: exactly `length()` bytes out, and a header
/// followed by the body it announces in.
pub struct MessageTransport<T: Read + Write> {
    stream: T,
}

impl<T: Read + Write> MessageTransport<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> T {
        self.stream
    }

    /// Send the header and body of `message`. The sentinel byte stays local.
    pub fn write_message(&mut self, message: &Message) -> Result<(), TransportError> {
        if message.is_empty() {
            return Err(MessageError::EmptyPayload.into());
        }

        self.stream.write_all(message.wire_bytes())?;
        self.stream.flush()?;
        trace!("wrote message of {} bytes", message.length());
        Ok(())
    }

    /// Receive the next message into `message`, reusing its buffer when possible.
    ///
    /// Returns [`TransportError::Closed`] when the peer hangs up between messages. A header
    /// that fails to decode is returned as [`TransportError::Message`]; the stream is then
    /// out of sync and should be dropped.
    pub fn read_message(&mut self, message: &mut Message) -> Result<(), TransportError> {
        if message.is_empty() {
            message.resize(MAX_BODY_LENGTH)?;
        }

        self.read_header(message.header_mut())?;
        let len = message.decode_header()?;
        self.stream.read_exact(message.body_mut())?;
        message.fill_end(len);

        trace!("read message with {len} byte body");
        Ok(())
    }

    fn read_header(&mut self, header: &mut [u8]) -> Result<(), TransportError> {
        let mut filled = 0;
        while filled < header.len() {
            match self.stream.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Err(TransportError::Closed),
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek};

    use crate::message::HEADER_LENGTH;

    use super::*;

    #[test]
    fn read_write_message() {
        let stream = Cursor::new(Vec::new());
        let mut transport = MessageTransport::new(stream);

        let mut msg = Message::new();
        msg.fill(b"PING").unwrap();
        transport.write_message(&msg).unwrap();

        assert_eq!(transport.stream.get_ref().as_slice(), b"       4PING");

        transport.stream.seek(std::io::SeekFrom::Start(0)).unwrap();
        let mut received = Message::new();
        transport.read_message(&mut received).unwrap();

        assert_eq!(received.body_length(), 4);
        assert_eq!(received.body(), b"PING");
        assert_eq!(received.data()[received.length()], 0);
    }

    #[test]
    fn read_consecutive_messages_into_one_buffer() {
        let stream = Cursor::new(b"       5hello       2hi       0".to_vec());
        let mut transport = MessageTransport::new(stream);
        let mut msg = Message::new();

        transport.read_message(&mut msg).unwrap();
        assert_eq!(msg.body_text(), Some("hello"));

        transport.read_message(&mut msg).unwrap();
        assert_eq!(msg.body_text(), Some("hi"));
        assert_eq!(msg.data()[HEADER_LENGTH + 2], 0);

        transport.read_message(&mut msg).unwrap();
        assert_eq!(msg.body_length(), 0);

        assert!(matches!(
            transport.read_message(&mut msg),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn read_grows_small_message() {
        let mut wire = b"     100".to_vec();
        wire.extend_from_slice(&[b'x'; 100]);
        let mut transport = MessageTransport::new(Cursor::new(wire));

        let mut msg = Message::new();
        msg.fill(b"a").unwrap();
        transport.read_message(&mut msg).unwrap();

        assert_eq!(msg.body(), &[b'x'; 100][..]);
    }

    #[test]
    fn read_malformed_header() {
        let stream = Cursor::new(b"garbage!body".to_vec());
        let mut transport = MessageTransport::new(stream);
        let mut msg = Message::new();

        assert!(matches!(
            transport.read_message(&mut msg),
            Err(TransportError::Message(MessageError::MalformedHeader(_)))
        ));
        assert_eq!(msg.body_length(), 0);
    }

    #[test]
    fn read_oversize_header() {
        let stream = Cursor::new(b"    9999".to_vec());
        let mut transport = MessageTransport::new(stream);
        let mut msg = Message::new();

        assert!(matches!(
            transport.read_message(&mut msg),
            Err(TransportError::Message(MessageError::PayloadTooLarge {
                len: 9999,
                ..
            }))
        ));
    }

    #[test]
    fn read_truncated_message() {
        let mut transport = MessageTransport::new(Cursor::new(b"      10short".to_vec()));
        let mut msg = Message::new();
        match transport.read_message(&mut msg) {
            Err(TransportError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut transport = MessageTransport::new(Cursor::new(b"   ".to_vec()));
        match transport.read_message(&mut msg) {
            Err(TransportError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "EmptyPayload")]
    fn write_empty_message() {
        let mut transport = MessageTransport::new(Cursor::new(Vec::new()));

        transport.write_message(&Message::new()).unwrap();
    }
}
