//! Request/response plumbing around [`Message`](crate::Message).
//!
//! This module carries messages over byte streams and serves them over TCP. The message type
//! itself knows nothing about sockets; everything here is built on its header/body split.
//!
//! # Wire Format
//!
//! Every message on the wire is:
//!
//! - An 8 byte header holding the body length as right-justified decimal text (`"       4"`).
//! - Exactly that many body bytes (`"PING"`).
//!
//! Nothing else is sent. In particular the correlation id used to pair requests with responses
//! stays on each side of the connection; a connection answers requests strictly in order.
//!
//! # Reading
//!
//! A reader pulls exactly 8 header bytes, decodes them, and then pulls exactly the announced
//! number of body bytes. A header that is not a decimal number, or announces more than
//! [`MAX_BODY_LENGTH`](crate::message::MAX_BODY_LENGTH) bytes, leaves the stream out of sync and
//! the connection is dropped.
//!
//! # Key Components
//!
//! - [`MessageTransport`]: Reads and writes whole messages over any `Read + Write` stream.
//! - [`MessageServer`]: Thread-pooled TCP server dispatching each request to a [`Service`].
//! - [`Client`]: Sends requests and pairs each response with its correlation id.
//!
//! # See Also
//!
//! - [`message`](crate::message): The buffer and header codec.
mod client;
mod server;
mod thread;
mod transport;

#[cfg(test)]
pub(crate) mod test_util;

use thread::ThreadPool;

pub use client::Client;
pub use server::{Echo, MessageServer, PING, PONG, Service};
pub use transport::{MessageTransport, TransportError};
