//! The end-to-end check dialogue: CHECK, HASH, compare, RESULT, LOG.

use std::path::Path;

use anyhow::{Result, anyhow};

use super::{ClientSession, MAX_ATTEMPTS};
use crate::hash::majority_hash;
use crate::logging::Logger;
use crate::nasty::Recv;
use crate::packet::{Packet, parse_control_message};

/// Send a control message, retrying on timeout or a reply that doesn't
/// match `expected_command`/`expected_file_name`, until a matching reply
/// arrives or `MAX_ATTEMPTS` is exhausted. Returns the reply's trailing
/// field (the part after the file name) on success.
pub(super) async fn send_message_with_response(
    session: &ClientSession,
    message: &str,
    expected_command: &str,
    expected_file_name: &str,
) -> Result<Option<String>> {
    let packet = Packet::message(message)?;
    let encoded = packet.encode();

    for _ in 0..MAX_ATTEMPTS {
        session.sock.send(&encoded).await?;
        match session.sock.recv().await? {
            Recv::Datagram(bytes, _peer) => {
                let Ok(reply) = Packet::decode(&bytes) else {
                    continue;
                };
                if reply.is_file {
                    continue;
                }
                let text = reply.as_message();
                if let Some((command, name, rest)) = parse_control_message(&text) {
                    if command == expected_command && name == expected_file_name {
                        return Ok(Some(rest.to_string()));
                    }
                }
            }
            Recv::Timeout => {}
        }
    }
    Ok(None)
}

/// Run one CHECK/HASH/RESULT/LOG round for `file_name`. Returns `true` if
/// the hashes matched (the file committed on the server side), `false` if
/// they diverged and the caller should resend and try again.
pub(super) async fn check_file(
    session: &ClientSession,
    source_path: &Path,
    file_name: &str,
    attempt: u32,
    logger: &Logger,
) -> Result<bool> {
    let check_msg = format!("CHECK:{file_name},");
    let server_hash = send_message_with_response(session, &check_msg, "HASH", file_name)
        .await?
        .ok_or_else(|| anyhow!("no HASH reply for {file_name} after maximum attempts"))?;

    let client_hash = majority_hash(source_path, &session.nasty_file).await?;
    let files_match = server_hash == client_hash;
    let verdict = if files_match { "PASS" } else { "FAIL" };

    let result_msg = format!("RESULT:{file_name},{verdict}");
    send_message_with_response(session, &result_msg, "LOG", file_name)
        .await?
        .ok_or_else(|| anyhow!("no LOG reply for {file_name} after maximum attempts"))?;

    logger.event(format!(
        "File: {file_name} end-to-end check {}, attempt {attempt}",
        if files_match { "succeeded" } else { "failed" }
    ));

    Ok(files_match)
}
