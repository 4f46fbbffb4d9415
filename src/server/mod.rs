//! The receiver: a single event loop over `readPacket`, dispatching each
//! datagram by its discriminator and mutating a small `ReceiverState`
//! machine (`state.rs`).

pub mod state;

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::cli::ServerConfig;
use crate::hash::majority_hash;
use crate::logging::Logger;
use crate::nasty::{NastyFile, NastyUdpSocket, Recv};
use crate::packet::{Packet, parse_control_message};
use state::{FileTransferState, ReceiverState};

/// The well-known port both sides bind to; the spec's CLI carries no port
/// argument, so one must be fixed in code for the two binaries to agree.
pub const DEFAULT_PORT: u16 = 9999;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to open staging file: {0}")]
    StorageOpen(anyhow::Error),
    #[error("failed to write or close staging file: {0}")]
    StorageWrite(anyhow::Error),
    #[error("unrecoverable network error: {0}")]
    Network(anyhow::Error),
}

/// Run the receiver event loop. Returns only on an unrecoverable storage or
/// network error — there is no graceful shutdown path (see DESIGN.md).
pub async fn run(config: ServerConfig, logger: &Logger) -> Result<(), ServerError> {
    run_on_port(config, logger, DEFAULT_PORT, None).await
}

/// Same as `run`, but bound to an explicit port. Pass `0` to have the OS
/// assign an ephemeral port (used by tests that run client and server in
/// the same process); `ready`, if given, is fired with the bound address
/// once the socket is up, before the loop blocks on its first receive.
pub async fn run_on_port(
    config: ServerConfig,
    logger: &Logger,
    port: u16,
    ready: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse().unwrap();
    let sock = NastyUdpSocket::bind(addr, config.network_nastiness)
        .await
        .map_err(ServerError::Network)?;
    if let Some(tx) = ready {
        let _ = tx.send(sock.local_addr().map_err(ServerError::Network)?);
    }
    let nasty_file = NastyFile::new(config.file_nastiness);
    let target_dir = config.target_dir;
    let mut state = ReceiverState::new();

    loop {
        match sock.recv_from().await.map_err(ServerError::Network)? {
            Recv::Timeout => continue,
            Recv::Datagram(bytes, peer) => {
                let pkt = match Packet::decode(&bytes) {
                    Ok(p) => p,
                    Err(_) => continue, // MalformedPacket: drop and continue.
                };
                if pkt.is_file {
                    handle_data_packet(
                        &sock,
                        peer,
                        pkt,
                        &mut state,
                        &target_dir,
                        &nasty_file,
                        logger,
                    )
                    .await?;
                } else {
                    handle_message_packet(
                        &sock,
                        peer,
                        pkt,
                        &mut state,
                        &nasty_file,
                        logger,
                    )
                    .await?;
                }
            }
        }
    }
}

async fn handle_data_packet(
    sock: &NastyUdpSocket,
    peer: SocketAddr,
    pkt: Packet,
    state: &mut ReceiverState,
    target_dir: &Path,
    nasty_file: &NastyFile,
    logger: &Logger,
) -> Result<(), ServerError> {
    let seq = pkt.seq;
    let expected = state.expected_seq();

    if seq == expected {
        if state.expects_filename_packet(seq) {
            let file_name = String::from_utf8_lossy(&pkt.payload).into_owned();
            let new_state = FileTransferState::new(target_dir, file_name.clone(), seq, pkt.total);
            logger.event(format!("File: {file_name} starting to receive file"));

            nasty_file
                .write_all(new_state.staging_path(), b"")
                .await
                .map_err(ServerError::StorageOpen)?;

            *state = ReceiverState::Receiving(new_state);
        } else if let ReceiverState::Receiving(fs) = state {
            nasty_file
                .append(fs.staging_path(), &pkt.payload)
                .await
                .map_err(ServerError::StorageWrite)?;
            fs.written_packets += 1;
        }

        sock.send_to(&Packet::ack(seq).encode(), peer)
            .await
            .map_err(ServerError::Network)?;

        match state {
            ReceiverState::Idle { expected_seq } => *expected_seq += 1,
            ReceiverState::Receiving(fs) => fs.expected_seq += 1,
        }
    } else if expected.checked_sub(1) == Some(seq) {
        // The ACK for the previous packet was presumably lost: re-ACK
        // without touching any state.
        sock.send_to(&Packet::ack(seq).encode(), peer)
            .await
            .map_err(ServerError::Network)?;
    }
    // Otherwise: out-of-order future or ancient packet. Stop-and-wait
    // guarantees these are not legitimate; ignore.

    Ok(())
}

async fn handle_message_packet(
    sock: &NastyUdpSocket,
    peer: SocketAddr,
    pkt: Packet,
    state: &mut ReceiverState,
    nasty_file: &NastyFile,
    logger: &Logger,
) -> Result<(), ServerError> {
    let msg = pkt.as_message();
    let Some((command, name, rest)) = parse_control_message(&msg) else {
        return Ok(()); // Malformed control message: drop and continue.
    };

    if command == "FINISHED" {
        state.reset();
        let reply = Packet::message("FINISHED:").map_err(|e| ServerError::Network(e.into()))?;
        sock.send_to(&reply.encode(), peer)
            .await
            .map_err(ServerError::Network)?;
        return Ok(());
    }

    let ReceiverState::Receiving(fs) = state else {
        return Ok(()); // CHECK/RESULT with nothing in flight: invalid transition, drop.
    };
    if name != fs.file_name {
        return Ok(());
    }

    match command {
        "CHECK" => {
            if !fs.check_logged {
                logger.event(format!(
                    "File: {} received, beginning end-to-end check",
                    fs.file_name
                ));
                fs.check_logged = true;
            }

            let digest = majority_hash(fs.active_path(), nasty_file)
                .await
                .map_err(ServerError::StorageOpen)?;
            let reply = Packet::message(&format!("HASH:{name},{digest}"))
                .map_err(|e| ServerError::Network(e.into()))?;
            sock.send_to(&reply.encode(), peer)
                .await
                .map_err(ServerError::Network)?;
        }
        "RESULT" => {
            let result = rest;
            if result == "PASS" && !fs.is_committed() {
                match tokio::fs::rename(fs.staging_path(), fs.final_path()).await {
                    Ok(()) => fs.mark_committed(),
                    // Matches the original: a rename failure here is logged,
                    // not treated as a fatal StorageWriteFailure.
                    Err(e) => logger.event(format!("ERROR with RENAME: {e}")),
                }
            }

            if !fs.result_logged {
                let verb = if result == "PASS" { "succeeded" } else { "failed" };
                logger.event(format!("File: {name} end-to-end check {verb}"));
                fs.result_logged = true;
            }

            let reply = Packet::message(&format!("LOG:{name},{result}"))
                .map_err(|e| ServerError::Network(e.into()))?;
            sock.send_to(&reply.encode(), peer)
                .await
                .map_err(ServerError::Network)?;
        }
        _ => {} // Unrecognized command for the file in flight: drop.
    }

    Ok(())
}
