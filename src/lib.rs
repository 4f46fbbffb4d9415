//! A reliable directory-transfer protocol layered over an adversarially
//! lossy datagram channel and a storage medium that can silently corrupt
//! bytes. See `fileclient` and `fileserver` for the two sides.

pub mod cli;
pub mod client;
pub mod dirwalk;
pub mod hash;
pub mod logging;
pub mod nasty;
pub mod packet;
pub mod server;
