pub mod cli;
pub mod message;
pub mod protocol;

pub use cli::{Command, prompt};
pub use message::{Message, MessageError};
