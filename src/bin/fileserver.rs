use std::process::exit;

use nastyxfer::logging::Logger;
use nastyxfer::server::{self, ServerError};
use nastyxfer::cli;

#[tokio::main]
async fn main() {
    let config = cli::parse_server_args();
    let logger = Logger::stdout_only();

    if let Err(e) = server::run(config, &logger).await {
        eprintln!("fileserver: {e}");
        match e {
            ServerError::StorageOpen(_) => exit(12),
            ServerError::StorageWrite(_) => exit(16),
            // Not in the spec's exit-code table; a network-layer failure
            // this severe (e.g. the bound socket itself erroring) has no
            // assigned code, so it gets a code of its own rather than
            // colliding with 1/4/12/16.
            ServerError::Network(_) => exit(2),
        }
    }
}
