//! The receiver's per-session state, reshaped from the original's loose
//! mutable variables into an explicit state machine (`ReceiverState`) owned
//! by the event loop, per the Design Notes' recommended re-architecture.

use std::path::{Path, PathBuf};

/// Everything the receiver knows about the file currently in flight.
pub struct FileTransferState {
    pub file_name: String,
    staging_path: PathBuf,
    final_path: PathBuf,
    pub expected_seq: u32,
    pub next_group_start: u32,
    pub written_packets: u32,
    /// Guards the CHECK handler's "received, beginning end-to-end check" line.
    pub check_logged: bool,
    /// Guards the RESULT handler's "end-to-end check succeeded/failed" line.
    pub result_logged: bool,
    committed: bool,
}

impl FileTransferState {
    pub fn new(target_dir: &Path, file_name: String, seq: u32, total: u16) -> Self {
        let staging_path = target_dir.join(format!("{file_name}.TMP"));
        let final_path = target_dir.join(&file_name);
        Self {
            file_name,
            staging_path,
            final_path,
            expected_seq: seq,
            next_group_start: seq + total as u32,
            written_packets: 0,
            check_logged: false,
            result_logged: false,
            committed: false,
        }
    }

    /// The path a CHECK or a body-write should target right now: the
    /// staging file until commit, the final path afterwards (a duplicate
    /// RESULT:PASS retried by the client lands here, harmlessly).
    pub fn active_path(&self) -> &Path {
        if self.committed {
            &self.final_path
        } else {
            &self.staging_path
        }
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn mark_committed(&mut self) {
        self.committed = true;
    }
}

/// The receiver's top-level state: either idle (no transfer in flight, or
/// between a FINISHED reset and the next filename packet) or mid-transfer.
pub enum ReceiverState {
    Idle { expected_seq: u32 },
    Receiving(FileTransferState),
}

impl ReceiverState {
    pub fn new() -> Self {
        ReceiverState::Idle { expected_seq: 0 }
    }

    pub fn expected_seq(&self) -> u32 {
        match self {
            ReceiverState::Idle { expected_seq } => *expected_seq,
            ReceiverState::Receiving(s) => s.expected_seq,
        }
    }

    /// `true` iff `seq` is exactly where the next filename packet is due:
    /// session start, right after a FINISHED reset, or the group boundary
    /// of the file currently in flight.
    pub fn expects_filename_packet(&self, seq: u32) -> bool {
        match self {
            ReceiverState::Idle { expected_seq } => seq == *expected_seq,
            ReceiverState::Receiving(s) => seq == s.next_group_start,
        }
    }

    /// Reset to the post-FINISHED idle state.
    pub fn reset(&mut self) {
        *self = ReceiverState::Idle { expected_seq: 0 };
    }
}

impl Default for ReceiverState {
    fn default() -> Self {
        Self::new()
    }
}
