use std::{
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use log::debug;

use crate::message::Message;

use super::{
    server::PING,
    transport::{MessageTransport, TransportError},
};

/// Request/response client. Each request is tagged with the next correlation id and the
/// matching response carries the same id back to the caller.
pub struct Client<T: Read + Write> {
    transport: MessageTransport<T>,
    next_id: u64,
}

impl Client<TcpStream> {
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address)?;
        Ok(Self::new(stream))
    }
}

impl<T: Read + Write> Client<T> {
    pub fn new(stream: T) -> Self {
        Self {
            transport: MessageTransport::new(stream),
            next_id: 1,
        }
    }

    pub fn request(&mut self, payload: &[u8]) -> Result<Message, TransportError> {
        let mut request = Message::new();
        request.fill(payload)?;
        request.set_correlation_id(self.next_id);
        self.next_id += 1;

        self.transport.write_message(&request)?;

        let mut response = Message::new();
        self.transport.read_message(&mut response)?;
        response.set_correlation_id(request.correlation_id());

        debug!(
            "request #{} answered with {} bytes",
            response.correlation_id(),
            response.body_length()
        );
        Ok(response)
    }

    pub fn ping(&mut self) -> Result<Message, TransportError> {
        self.request(PING)
    }

    pub fn into_inner(self) -> T {
        self.transport.into_inner()
    }
}
