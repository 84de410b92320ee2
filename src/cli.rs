//! CLI utilities for msgbuf.
//!
//! The utilities present in this module can be used to build an interactive client.
use std::io::{self, BufRead, Write};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("no command provided")]
    Empty,

    #[error("failed to read command: {0}")]
    Io(#[from] io::Error),
}

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Exit command `.exit`, also produced at end of input
    Exit,
    /// Ping command `.ping`
    Ping,
    /// Any other line, sent as a message body
    Send(String),
}

/// Prompt user for a command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CommandError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }

    match s.trim_end_matches(['\r', '\n']) {
        "" => Err(CommandError::Empty),
        ".exit" => Ok(Command::Exit),
        ".ping" => Ok(Command::Ping),
        s if s.starts_with('.') => Err(CommandError::UnrecognizedCommand(s.to_string())),
        s => Ok(Command::Send(s.to_string())),
    }
}
