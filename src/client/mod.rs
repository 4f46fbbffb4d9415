//! The sender: walk the source directory and, for each regular file,
//! stream it and drive the end-to-end check to commit, retrying the whole
//! cycle up to `MAX_FILE_SEND_RETRIES` times before moving on.

mod check;
mod transfer;

use std::net::SocketAddr;

use anyhow::{Result, anyhow};

use crate::cli::ClientConfig;
use crate::dirwalk::list_regular_files;
use crate::logging::Logger;
use crate::nasty::{NastyFile, NastyUdpSocket};
use crate::server::DEFAULT_PORT;

/// Effectively-infinite-for-correctness, bounded-for-liveness retry cap for
/// a single packet or control message. At the ~2s read timeout this is
/// several hours of continuous retrying — well past any network nastiness
/// level this crate simulates, short of an outright partition.
pub(crate) const MAX_ATTEMPTS: u32 = 10_000;

/// How many times the whole send-and-check cycle is retried for one file
/// before giving up on it and moving to the next.
const MAX_FILE_SEND_RETRIES: u32 = 15;

/// Everything a file transfer needs: the session-wide packet counter, the
/// connected socket, and the file interface used to read source bytes.
pub(crate) struct ClientSession {
    pub(crate) sock: NastyUdpSocket,
    pub(crate) nasty_file: NastyFile,
    pub(crate) packet_count: u32,
}

pub async fn run(config: ClientConfig, logger: &Logger) -> Result<()> {
    run_on_port(config, logger, DEFAULT_PORT).await
}

/// Same as `run`, but against an explicit server port (used by tests that
/// bind the server to an OS-assigned port instead of the well-known one).
pub async fn run_on_port(config: ClientConfig, logger: &Logger, port: u16) -> Result<()> {
    let addr = resolve_server(&config.server_host, port).await?;
    let sock = NastyUdpSocket::connect(addr, config.network_nastiness).await?;
    let nasty_file = NastyFile::new(config.file_nastiness);
    let mut session = ClientSession {
        sock,
        nasty_file,
        packet_count: 0,
    };

    for path in list_regular_files(&config.source_dir)? {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("source entry has no file name: {}", path.display()))?
            .to_string_lossy()
            .into_owned();
        process_file(&mut session, &path, &file_name, logger).await?;
    }

    send_finished(&session).await?;
    println!();
    println!("Successfully finished sending all files to server.");
    Ok(())
}

async fn resolve_server(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| anyhow!("could not resolve server host {host}"))
}

/// Send the file, then retry the send-and-check cycle up to
/// `MAX_FILE_SEND_RETRIES` times until the end-to-end check succeeds.
async fn process_file(
    session: &mut ClientSession,
    path: &std::path::Path,
    file_name: &str,
    logger: &Logger,
) -> Result<()> {
    let mut attempt = 1u32;
    transfer::send_file(session, path, file_name, attempt, logger).await?;

    for _ in 0..MAX_FILE_SEND_RETRIES {
        if check::check_file(session, path, file_name, attempt, logger).await? {
            break;
        }
        attempt += 1;
        transfer::send_file(session, path, file_name, attempt, logger).await?;
    }

    Ok(())
}

async fn send_finished(session: &ClientSession) -> Result<()> {
    let response = check::send_message_with_response(session, "FINISHED:", "FINISHED", "").await?;
    if response.is_none() {
        return Err(anyhow!(
            "failed to receive FINISHED acknowledgment after maximum attempts"
        ));
    }
    Ok(())
}
