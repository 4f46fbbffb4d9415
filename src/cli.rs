//! Command-line surfaces for the client and server binaries.
//!
//! The spec pins exact exit codes to exact failure classes (wrong arity vs.
//! non-numeric nastiness vs. missing source directory), which predates and
//! doesn't line up with clap's own `exit(2)` convention for parse errors.
//! Arity is checked by hand before handing off to clap; nastiness strings
//! are parsed as plain `String`s and validated ourselves so a bad value can
//! exit(4) instead of clap's default.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use crate::nasty::Nastiness;

#[derive(Parser, Debug)]
#[command(name = "fileclient", disable_help_flag = true, disable_version_flag = true)]
pub struct ClientArgs {
    pub server_host: String,
    pub network_nastiness: String,
    pub file_nastiness: String,
    pub source_dir: PathBuf,
}

#[derive(Parser, Debug)]
#[command(name = "fileserver", disable_help_flag = true, disable_version_flag = true)]
pub struct ServerArgs {
    pub network_nastiness: String,
    pub file_nastiness: String,
    pub target_dir: PathBuf,
}

/// Parsed and validated client invocation.
pub struct ClientConfig {
    pub server_host: String,
    pub network_nastiness: Nastiness,
    pub file_nastiness: Nastiness,
    pub source_dir: PathBuf,
}

/// Parsed and validated server invocation.
pub struct ServerConfig {
    pub network_nastiness: Nastiness,
    pub file_nastiness: Nastiness,
    pub target_dir: PathBuf,
}

/// `true` iff `s` is non-empty and consists entirely of ASCII digits.
fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_nastiness(s: &str, usage: &str) -> Nastiness {
    if !is_numeric(s) {
        eprintln!("Nastiness {s} is not numeric");
        eprintln!("Correct syntax is: {usage}");
        exit(4);
    }
    // A nastiness string this program accepts is all-digit, but may exceed
    // u8 range (e.g. "99999999999"); clamp rather than panic.
    let level: u64 = s.parse().unwrap_or(u64::MAX);
    Nastiness::new(level.min(255) as u8)
}

pub fn parse_client_args() -> ClientConfig {
    const USAGE: &str = "fileclient <server> <networknastiness> <filenastiness> <srcdir>";

    let raw: Vec<String> = std::env::args().collect();
    if raw.len() != 5 {
        eprintln!("Correct syntax is: {USAGE}");
        exit(1);
    }

    let args = ClientArgs::parse();
    let network_nastiness = parse_nastiness(&args.network_nastiness, USAGE);
    let file_nastiness = parse_nastiness(&args.file_nastiness, USAGE);

    if crate::dirwalk::check_directory(&args.source_dir).is_err() {
        eprintln!("Error opening source directory {}", args.source_dir.display());
        exit(8);
    }

    ClientConfig {
        server_host: args.server_host,
        network_nastiness,
        file_nastiness,
        source_dir: args.source_dir,
    }
}

pub fn parse_server_args() -> ServerConfig {
    const USAGE: &str = "fileserver <networknastiness> <filenastiness> <targetdir>";

    let raw: Vec<String> = std::env::args().collect();
    if raw.len() != 4 {
        eprintln!("Correct syntax is: {USAGE}");
        exit(1);
    }

    let args = ServerArgs::parse();
    let network_nastiness = parse_nastiness(&args.network_nastiness, USAGE);
    let file_nastiness = parse_nastiness(&args.file_nastiness, USAGE);

    ServerConfig {
        network_nastiness,
        file_nastiness,
        target_dir: args.target_dir,
    }
}
