use std::process;

use clap::Parser;
use tracing::error;

use pistreamer_cli::{commands, init_logging, Cli};

fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = commands::execute(cli) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
