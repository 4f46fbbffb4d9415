//! Stop-and-wait streaming of one file: a filename packet followed by the
//! file's content in `MAX_DATA_SIZE`-byte chunks, each sent-and-resent until
//! acknowledged before the next is attempted.

use std::path::Path;

use anyhow::{Result, anyhow};

use super::{ClientSession, MAX_ATTEMPTS};
use crate::logging::Logger;
use crate::nasty::Recv;
use crate::packet::{MAX_DATA_SIZE, Packet};

/// Send `packet`, retrying on timeout or a reply that doesn't ack this
/// sequence number, up to `MAX_ATTEMPTS` times.
async fn send_packet_with_ack(session: &ClientSession, packet: &Packet) -> Result<bool> {
    let encoded = packet.encode();
    for _ in 0..MAX_ATTEMPTS {
        session.sock.send(&encoded).await?;
        match session.sock.recv().await? {
            Recv::Datagram(bytes, _peer) => {
                if let Ok(reply) = Packet::decode(&bytes) {
                    if reply.is_file && reply.seq == packet.seq {
                        return Ok(true);
                    }
                }
                // Malformed, or an ack for a different sequence (a duplicate
                // of some earlier ack arriving late): ignore and retry.
            }
            Recv::Timeout => {}
        }
    }
    Ok(false)
}

/// Stream `path` as one group: a filename packet carrying the group's total
/// packet count, followed by the file's bytes in `MAX_DATA_SIZE` chunks.
/// Every packet in the group, filename included, carries the same `total`
/// so the receiver can compute the next group's starting sequence number
/// from whichever packet turns out to be the filename packet.
pub(super) async fn send_file(
    session: &mut ClientSession,
    path: &Path,
    file_name: &str,
    attempt: u32,
    logger: &Logger,
) -> Result<()> {
    logger.event(format!(
        "File: {file_name}, beginning transmission, attempt {attempt}"
    ));

    let buffer = session.nasty_file.read_entire(path).await?;
    let body_packets = buffer.len().div_ceil(MAX_DATA_SIZE);
    let num_packets = (body_packets + 1) as u16;

    let filename_packet = Packet::data(session.packet_count, num_packets, file_name.as_bytes())?;
    if !send_packet_with_ack(session, &filename_packet).await? {
        return Err(anyhow!(
            "no ack for filename packet of {file_name} after maximum attempts"
        ));
    }
    session.packet_count += 1;

    let mut offset = 0;
    while offset < buffer.len() {
        let end = (offset + MAX_DATA_SIZE).min(buffer.len());
        let chunk = Packet::data(session.packet_count, num_packets, &buffer[offset..end])?;
        if !send_packet_with_ack(session, &chunk).await? {
            return Err(anyhow!(
                "no ack for a body packet of {file_name} after maximum attempts"
            ));
        }
        session.packet_count += 1;
        offset = end;
    }

    logger.event(format!(
        "File: {file_name} transmission complete, waiting for end-to-end check, attempt {attempt}"
    ));
    Ok(())
}
