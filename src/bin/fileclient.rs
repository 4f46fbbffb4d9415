use std::process::exit;

use nastyxfer::{cli, client, logging::Logger};

#[tokio::main]
async fn main() {
    let config = cli::parse_client_args();
    let logger = Logger::stdout_only();

    if let Err(e) = client::run(config, &logger).await {
        eprintln!("fileclient: {e}");
        exit(1);
    }
}
