//! etl-config - resolve and inspect ETL pipeline configuration.
//!
//! Commands:
//! - `etl-config resolve <FILE>`: list sections with enabled and disabled actions
//! - `etl-config action <FILE> <NAME>`: print the resolved options of an action
//! - `etl-config endpoints <FILE>`: list data endpoints and global aliases
//! - `etl-config dump <FILE>`: print the resolved document
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error

use std::io::{self, Write};

use clap::Parser;

use etl_config_cli::{commands, logging, Cli};

const ERROR_EXIT_CODE: i32 = 1;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let exit_code = match commands::run(&cli.command, &mut out) {
        Ok(()) => 0,
        Err(e) => {
            tracing::debug!("{:?}", e);
            eprintln!("Error: {:#}", e);
            ERROR_EXIT_CODE
        }
    };
    let _ = out.flush();
    std::process::exit(exit_code);
}
