use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener},
    num::NonZeroUsize,
    sync::Arc,
};

use log::{debug, info, warn};

use crate::message::{Message, MessageError};

use super::{
    ThreadPool,
    transport::{MessageTransport, TransportError},
};

pub const PING: &[u8] = b"PING";
pub const PONG: &[u8] = b"PONG";

/// Produces one response per request.
pub trait Service: Send + Sync + 'static {
    fn call(&self, request: &Message, response: &mut Message) -> Result<(), MessageError>;
}

/// Answers `PING` with `PONG` and echoes anything else back unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

impl Service for Echo {
    fn call(&self, request: &Message, response: &mut Message) -> Result<(), MessageError> {
        if request.body() == PING {
            response.fill(PONG)
        } else {
            response.clone_from(request);
            Ok(())
        }
    }
}

pub struct MessageServer {
    listener: TcpListener,
    service: Arc<dyn Service>,
    pool: ThreadPool,
}

impl MessageServer {
    pub fn bind(
        address: SocketAddr,
        workers: NonZeroUsize,
        service: Arc<dyn Service>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address)?;
        Ok(Self {
            listener,
            service,
            pool: ThreadPool::new(workers.get()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn listen(self) -> Result<(), TransportError> {
        info!(
            "listening at {} with {} workers",
            self.local_addr()?,
            self.pool.size()
        );

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer = stream
                        .peer_addr()
                        .map_or_else(|_| "unknown peer".to_string(), |a| a.to_string());
                    let service = Arc::clone(&self.service);
                    self.pool.execute(move || {
                        info!("accepted connection from {peer}");
                        if let Err(e) = handle_connection(stream, service.as_ref()) {
                            warn!("dropping connection from {peer}: {e}");
                        }
                    });
                }
                Err(e) => warn!("broken connection: {e:?}"),
            }
        }
        Ok(())
    }
}

fn handle_connection<T: Read + Write>(
    stream: T,
    service: &dyn Service,
) -> Result<(), TransportError> {
    let mut transport = MessageTransport::new(stream);
    let mut request = Message::new();
    let mut response = Message::new();
    let mut sequence = 0;

    loop {
        match transport.read_message(&mut request) {
            Ok(()) => {}
            Err(TransportError::Closed) => {
                debug!("peer closed connection after {sequence} requests");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        sequence += 1;
        request.set_correlation_id(sequence);
        debug!(
            "received request #{sequence} with {} byte body",
            request.body_length()
        );

        service.call(&request, &mut response)?;
        response.set_correlation_id(request.correlation_id());
        transport.write_message(&response)?;
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::test_util::Duplex;

    use super::*;

    fn serve(input: &[u8]) -> (Result<(), TransportError>, Vec<u8>) {
        let mut stream = Duplex::new(input);
        let res = handle_connection(&mut stream, &Echo);
        (res, stream.output)
    }

    #[test]
    fn echo_answers_ping() {
        let mut request = Message::new();
        request.fill(PING).unwrap();
        let mut response = Message::new();

        Echo.call(&request, &mut response).unwrap();

        assert_eq!(response.body(), PONG);
    }

    #[test]
    fn echo_copies_request() {
        let mut request = Message::new();
        request.fill(b"hello").unwrap();
        request.set_correlation_id(5);
        let mut response = Message::new();
        response.fill(&[b'-'; 40]).unwrap();

        Echo.call(&request, &mut response).unwrap();

        assert_eq!(response.wire_bytes(), request.wire_bytes());
        assert_eq!(response.correlation_id(), 5);
    }

    #[test]
    fn connection_serves_until_close() {
        let (res, output) = serve(b"       4PING       5hello       0");

        assert!(res.is_ok());
        assert_eq!(output, b"       4PONG       5hello       0");
    }

    #[test]
    fn connection_echoes_canonical_header() {
        let (res, output) = serve(b"2       hi00000003abc");

        assert!(res.is_ok());
        assert_eq!(output, b"       2hi       3abc");
    }

    #[test]
    fn connection_dropped_on_bad_header() {
        let (res, output) = serve(b"       4PINGnot-a-len");

        assert!(matches!(
            res,
            Err(TransportError::Message(MessageError::MalformedHeader(_)))
        ));
        assert_eq!(output, b"       4PONG");
    }

    #[test]
    fn connection_dropped_on_oversize_header() {
        let (res, output) = serve(b"    1024");

        assert!(matches!(
            res,
            Err(TransportError::Message(MessageError::PayloadTooLarge { .. }))
        ));
        assert!(output.is_empty());
    }
}
