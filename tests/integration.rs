//! End-to-end scenarios driving the client and server library entry points
//! directly against real loopback sockets, the way the teacher crate's own
//! `tests/integration.rs` drives its TFTP client/server pair.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nastyxfer::cli::{ClientConfig, ServerConfig};
use nastyxfer::logging::Logger;
use nastyxfer::nasty::{Nastiness, NastyUdpSocket, Recv};
use nastyxfer::packet::{parse_control_message, Packet};
use nastyxfer::{client, server};
use tempfile::tempdir;

/// Start a server on an OS-assigned port inside `target_dir`, returning the
/// port once the socket is bound. The server task runs until the test ends.
async fn spawn_server(target_dir: PathBuf, nastiness: u8, grading_log: Option<&Path>) -> u16 {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let config = ServerConfig {
        network_nastiness: Nastiness::new(nastiness),
        file_nastiness: Nastiness::new(nastiness),
        target_dir,
    };
    let grading_log = grading_log.map(Path::to_path_buf);
    tokio::spawn(async move {
        let logger = match &grading_log {
            Some(path) => Logger::with_grading_log(path).unwrap(),
            None => Logger::stdout_only(),
        };
        let _ = server::run_on_port(config, &logger, 0, Some(tx)).await;
    });
    let addr = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("server did not come up in time")
        .expect("server dropped its ready channel");
    addr.port()
}

async fn run_client(
    source_dir: PathBuf,
    port: u16,
    nastiness: u8,
    grading_log: Option<&Path>,
) -> anyhow::Result<()> {
    let config = ClientConfig {
        server_host: "127.0.0.1".to_string(),
        network_nastiness: Nastiness::new(nastiness),
        file_nastiness: Nastiness::new(0),
        source_dir,
    };
    let logger = match grading_log {
        Some(path) => Logger::with_grading_log(path)?,
        None => Logger::stdout_only(),
    };
    client::run_on_port(config, &logger, port).await
}

fn log_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn s1_happy_path_transfers_file_byte_identical() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    let logs = tempdir().unwrap();
    let client_log = logs.path().join("client.log");
    let server_log = logs.path().join("server.log");
    std::fs::write(src.path().join("hello.txt"), vec![0x41u8; 1000]).unwrap();

    let port = spawn_server(dst.path().to_path_buf(), 0, Some(server_log.as_path())).await;
    run_client(src.path().to_path_buf(), port, 0, Some(client_log.as_path()))
        .await
        .unwrap();

    let committed = dst.path().join("hello.txt");
    assert_eq!(std::fs::read(&committed).unwrap(), vec![0x41u8; 1000]);
    assert!(!dst.path().join("hello.txt.TMP").exists());

    // SPEC_FULL.md §6.4: the six required log lines, each side in order.
    assert_eq!(
        log_lines(&client_log),
        vec![
            "File: hello.txt, beginning transmission, attempt 1",
            "File: hello.txt transmission complete, waiting for end-to-end check, attempt 1",
            "File: hello.txt end-to-end check succeeded, attempt 1",
        ]
    );
    assert_eq!(
        log_lines(&server_log),
        vec![
            "File: hello.txt starting to receive file",
            "File: hello.txt received, beginning end-to-end check",
            "File: hello.txt end-to-end check succeeded",
        ]
    );
}

#[tokio::test]
async fn s2_empty_file_commits_as_zero_bytes() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    std::fs::write(src.path().join("empty.bin"), b"").unwrap();

    let port = spawn_server(dst.path().to_path_buf(), 0, None).await;
    run_client(src.path().to_path_buf(), port, 0, None).await.unwrap();

    let committed = dst.path().join("empty.bin");
    assert_eq!(std::fs::read(&committed).unwrap().len(), 0);
    assert!(!dst.path().join("empty.bin.TMP").exists());
}

#[tokio::test]
async fn s3_boundary_sizes_commit_correctly() {
    for size in [498usize, 499usize] {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let content = vec![0x5au8; size];
        std::fs::write(src.path().join("boundary.bin"), &content).unwrap();

        let port = spawn_server(dst.path().to_path_buf(), 0, None).await;
        run_client(src.path().to_path_buf(), port, 0, None).await.unwrap();

        let committed = dst.path().join("boundary.bin");
        assert_eq!(std::fs::read(&committed).unwrap(), content, "size {size}");
    }
}

#[tokio::test]
async fn s4_ack_loss_still_completes_without_duplication() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    std::fs::write(src.path().join("lossy.bin"), vec![0x7fu8; 2500]).unwrap();

    // Nastiness 2 drops/reorders/duplicates on the server's ACK path
    // (server nastiness affects its outbound sends, i.e. ACKs and replies).
    let port = spawn_server(dst.path().to_path_buf(), 2, None).await;
    run_client(src.path().to_path_buf(), port, 0, None).await.unwrap();

    let committed = dst.path().join("lossy.bin");
    assert_eq!(std::fs::read(&committed).unwrap(), vec![0x7fu8; 2500]);
}

#[tokio::test]
async fn s5_mild_storage_corruption_still_converges() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    std::fs::write(src.path().join("noisy.bin"), vec![0x33u8; 4096]).unwrap();

    let port = spawn_server(dst.path().to_path_buf(), 1, None).await;
    run_client(src.path().to_path_buf(), port, 0, None).await.unwrap();

    let committed = dst.path().join("noisy.bin");
    assert_eq!(std::fs::read(&committed).unwrap(), vec![0x33u8; 4096]);
    assert!(!dst.path().join("noisy.bin.TMP").exists());
}

/// A minimal hand-rolled sender used only by [`s6_fail_then_pass`], so the
/// test can choose exactly when the end-to-end check disagrees instead of
/// racing the real client against an injected corruption.
struct FakeClient {
    sock: NastyUdpSocket,
    packet_count: u32,
}

impl FakeClient {
    async fn connect(port: u16) -> Self {
        let addr = format!("127.0.0.1:{port}").parse().unwrap();
        let sock = NastyUdpSocket::connect(addr, Nastiness::new(0)).await.unwrap();
        Self { sock, packet_count: 0 }
    }

    async fn send_and_ack(&mut self, total: u16, payload: &[u8]) {
        let packet = Packet::data(self.packet_count, total, payload).unwrap();
        self.sock.send(&packet.encode()).await.unwrap();
        match self.sock.recv().await.unwrap() {
            Recv::Datagram(bytes, _) => {
                let ack = Packet::decode(&bytes).unwrap();
                assert_eq!(ack.seq, self.packet_count);
            }
            Recv::Timeout => panic!("expected an ack for seq {}", self.packet_count),
        }
        self.packet_count += 1;
    }

    async fn send_group(&mut self, file_name: &str, content: &[u8]) {
        let total = 2u16;
        self.send_and_ack(total, file_name.as_bytes()).await;
        self.send_and_ack(total, content).await;
    }

    /// Send a control message and return its `(command, name, rest)` reply.
    async fn send_message(&self, message: &str) -> (String, String, String) {
        let packet = Packet::message(message).unwrap();
        self.sock.send(&packet.encode()).await.unwrap();
        match self.sock.recv().await.unwrap() {
            Recv::Datagram(bytes, _) => {
                let reply = Packet::decode(&bytes).unwrap();
                let text = reply.as_message();
                let (command, name, rest) = parse_control_message(&text).unwrap();
                (command.to_string(), name.to_string(), rest.to_string())
            }
            Recv::Timeout => panic!("expected a reply to {message}"),
        }
    }
}

#[tokio::test]
async fn s6_fail_then_pass() {
    let dst = tempdir().unwrap();
    let logs = tempdir().unwrap();
    let server_log = logs.path().join("server.log");
    let port = spawn_server(dst.path().to_path_buf(), 0, Some(server_log.as_path())).await;

    let content: &[u8] = b"content the two sides will first disagree about";
    let staging = dst.path().join("retry.bin.TMP");
    let committed = dst.path().join("retry.bin");

    let mut fake = FakeClient::connect(port).await;

    // Attempt 1: stream the file, then deliberately disagree at the check.
    fake.send_group("retry.bin", content).await;
    assert_eq!(std::fs::read(&staging).unwrap(), content);

    let (command, name, server_hash) = fake.send_message("CHECK:retry.bin,").await;
    assert_eq!((command.as_str(), name.as_str()), ("HASH", "retry.bin"));
    assert_eq!(server_hash.len(), 40, "a real sha1 hex digest came back");
    // A duplicate CHECK (as a real client would send on a lost HASH reply)
    // must not cause a second "beginning end-to-end check" log line.
    fake.send_message("CHECK:retry.bin,").await;

    // A real client would now hash its own source file and find it doesn't
    // match `server_hash`; this test plays that role directly and just
    // reports the disagreement.
    let (command, name, result) = fake.send_message("RESULT:retry.bin,FAIL").await;
    assert_eq!((command.as_str(), name.as_str(), result.as_str()), ("LOG", "retry.bin", "FAIL"));

    // FAIL must leave the staging file in place and commit nothing.
    assert_eq!(std::fs::read(&staging).unwrap(), content);
    assert!(!committed.exists());

    // Attempt 2: resend the same file as a new group; this time the local
    // hash will agree, so the check passes and the file commits.
    fake.send_group("retry.bin", content).await;
    let (command, name, server_hash) = fake.send_message("CHECK:retry.bin,").await;
    assert_eq!((command.as_str(), name.as_str()), ("HASH", "retry.bin"));
    assert_eq!(server_hash.len(), 40);

    // This time the (simulated) local hash agrees.
    let (command, name, result) = fake.send_message("RESULT:retry.bin,PASS").await;
    assert_eq!((command.as_str(), name.as_str(), result.as_str()), ("LOG", "retry.bin", "PASS"));

    assert_eq!(std::fs::read(&committed).unwrap(), content);
    assert!(!staging.exists());

    fake.send_message("FINISHED:").await;

    // Exactly one CHECK-received and one RESULT line per attempt, despite
    // the duplicate CHECK sent during attempt 1.
    let lines = log_lines(&server_log);
    assert_eq!(
        lines.iter().filter(|l| l.contains("starting to receive file")).count(),
        2,
        "one per attempt, unconditionally logged on every filename packet"
    );
    assert_eq!(
        lines
            .iter()
            .filter(|l| l.contains("received, beginning end-to-end check"))
            .count(),
        2,
        "one per attempt, not once per retried CHECK"
    );
    assert!(lines.contains(&"File: retry.bin end-to-end check failed".to_string()));
    assert!(lines.contains(&"File: retry.bin end-to-end check succeeded".to_string()));
}
