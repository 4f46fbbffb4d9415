use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::Nastiness;

/// Largest datagram this crate ever sends: one fully-packed data packet.
const MAX_DATAGRAM: usize = crate::packet::MAX_FRAME_LEN;

/// Outcome of a bounded-timeout receive, expressed as data instead of an
/// exception so the event loop's retry logic never has to unwind a caught
/// error (see Design Notes on "exceptions for control flow").
pub enum Recv {
    Datagram(Vec<u8>, SocketAddr),
    Timeout,
}

/// A UDP socket that applies network nastiness to every outbound datagram.
///
/// Reads are never tampered with here — corruption that happens "in flight"
/// is indistinguishable from corruption injected on send, so all four
/// effects (drop, duplicate, corrupt, reorder) are applied at `send`.
pub struct NastyUdpSocket {
    inner: UdpSocket,
    nastiness: Nastiness,
    read_timeout: Duration,
}

impl NastyUdpSocket {
    pub async fn bind(addr: SocketAddr, nastiness: Nastiness) -> Result<Self> {
        let inner = UdpSocket::bind(addr).await?;
        Ok(Self {
            inner,
            nastiness,
            read_timeout: Duration::from_millis(2000),
        })
    }

    pub async fn connect(addr: SocketAddr, nastiness: Nastiness) -> Result<Self> {
        let inner = UdpSocket::bind("0.0.0.0:0").await?;
        inner.connect(addr).await?;
        Ok(Self {
            inner,
            nastiness,
            read_timeout: Duration::from_millis(2000),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Send a datagram to a connected peer, subject to nastiness.
    pub async fn send(&self, buf: &[u8]) -> Result<()> {
        self.send_nasty(buf, None).await
    }

    /// Send a datagram to an explicit peer, subject to nastiness.
    pub async fn send_to(&self, buf: &[u8], peer: SocketAddr) -> Result<()> {
        self.send_nasty(buf, Some(peer)).await
    }

    async fn send_nasty(&self, buf: &[u8], peer: Option<SocketAddr>) -> Result<()> {
        let mut rng = rand::thread_rng();

        if self.nastiness.roll(&mut rng) {
            // Dropped on the floor.
            return Ok(());
        }

        let mut payload = buf.to_vec();
        if self.nastiness.roll(&mut rng) {
            corrupt_one_byte(&mut payload, &mut rng);
        }

        let duplicate = self.nastiness.roll(&mut rng);
        let reorder = self.nastiness.roll(&mut rng);

        if reorder {
            // Delay this send behind a small random jitter so a datagram
            // sent immediately afterwards can arrive first.
            let jitter = Duration::from_millis(rng.gen_range(5..40));
            tokio::time::sleep(jitter).await;
        }

        self.raw_send(&payload, peer).await?;
        if duplicate {
            self.raw_send(&payload, peer).await?;
        }

        Ok(())
    }

    async fn raw_send(&self, buf: &[u8], peer: Option<SocketAddr>) -> Result<()> {
        match peer {
            Some(addr) => {
                self.inner.send_to(buf, addr).await?;
            }
            None => {
                self.inner.send(buf).await?;
            }
        }
        Ok(())
    }

    /// Receive one datagram with the bounded read timeout.
    pub async fn recv(&self) -> Result<Recv> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match timeout(self.read_timeout, self.inner.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                let peer = self.inner.peer_addr()?;
                buf.truncate(n);
                Ok(Recv::Datagram(buf, peer))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(Recv::Timeout),
        }
    }

    /// Receive one datagram from any peer, with the bounded read timeout.
    pub async fn recv_from(&self) -> Result<Recv> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match timeout(self.read_timeout, self.inner.recv_from(&mut buf)).await {
            Ok(Ok((n, peer))) => {
                buf.truncate(n);
                Ok(Recv::Datagram(buf, peer))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(Recv::Timeout),
        }
    }
}

fn corrupt_one_byte(buf: &mut [u8], rng: &mut impl Rng) {
    if buf.is_empty() {
        return;
    }
    let idx = rng.gen_range(0..buf.len());
    let bit = 1u8 << rng.gen_range(0..8);
    buf[idx] ^= bit;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[tokio::test]
    async fn well_behaved_socket_delivers_every_datagram() {
        let a = NastyUdpSocket::bind("127.0.0.1:0".parse().unwrap(), Nastiness::new(0))
            .await
            .unwrap();
        let a_addr = a.local_addr().unwrap();
        let b = NastyUdpSocket::bind("127.0.0.1:0".parse().unwrap(), Nastiness::new(0))
            .await
            .unwrap();
        let b_addr = b.local_addr().unwrap();

        let pkt = Packet::ack(5).encode();
        b.send_to(&pkt, a_addr).await.unwrap();

        match a.recv_from().await.unwrap() {
            Recv::Datagram(bytes, peer) => {
                assert_eq!(bytes, pkt);
                assert_eq!(peer, b_addr);
            }
            Recv::Timeout => panic!("expected a datagram"),
        }
    }

    #[test]
    fn corrupt_flips_exactly_one_bit() {
        let mut rng = rand::thread_rng();
        let original = vec![0u8; 16];
        let mut corrupted = original.clone();
        corrupt_one_byte(&mut corrupted, &mut rng);
        let diff_bytes = original
            .iter()
            .zip(corrupted.iter())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(diff_bytes, 1);
    }
}
