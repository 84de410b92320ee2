use std::{error::Error, net::SocketAddr, num::NonZeroUsize, process, sync::Arc};

use clap::Parser;
use log::info;
use msgbuf::protocol::{Echo, MessageServer};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen for new connection at address
    address: SocketAddr,
    /// Number of worker threads serving connections
    #[arg(short, long, default_value = "15")]
    workers: NonZeroUsize,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    ctrlc::set_handler(|| {
        info!("interrupted, shutting down");
        process::exit(0);
    })?;

    let server = MessageServer::bind(cli.address, cli.workers, Arc::new(Echo))?;
    server.listen()?;
    Ok(())
}
