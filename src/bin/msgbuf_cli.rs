use std::{error::Error, io, net::SocketAddr};

use clap::Parser;
use msgbuf::{
    Command,
    cli::CommandError,
    prompt,
    protocol::{Client, TransportError},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address of a running msgbuf server
    address: SocketAddr,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let mut client = Client::connect(cli.address)?;

    let stdio = io::stdin();
    let stdout = io::stdout();

    loop {
        let cmd = match prompt(stdio.lock(), stdout.lock()) {
            Ok(c) => c,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let res = match cmd {
            Command::Exit => break,
            Command::Ping => client.ping(),
            Command::Send(line) => client.request(line.as_bytes()),
        };

        match res {
            Ok(resp) => match resp.body_text() {
                Some(text) => println!("[{}] {text}", resp.correlation_id()),
                None => println!("[{}] {:?}", resp.correlation_id(), resp.body()),
            },
            Err(e @ TransportError::Message(_)) => eprintln!("request error: {e}"),
            Err(e) => {
                eprintln!("connection error: {e}");
                break;
            }
        }
    }

    Ok(())
}
