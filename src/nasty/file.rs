use std::path::Path;

use anyhow::{Result, anyhow};
use rand::Rng;
use tokio::fs;

use super::Nastiness;

/// A file interface that may corrupt a single byte per call, simulating a
/// flaky storage medium. Every read and write goes through here so that the
/// majority-vote hasher (`crate::hash`) has something non-trivial to do.
pub struct NastyFile {
    nastiness: Nastiness,
}

impl NastyFile {
    pub fn new(nastiness: Nastiness) -> Self {
        Self { nastiness }
    }

    /// Read an entire file, possibly flipping one bit of the result.
    /// A short read (fewer bytes than `stat` reported) is a storage-layer
    /// failure, not corruption, and is reported as an error.
    pub async fn read_entire(&self, path: &Path) -> Result<Vec<u8>> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| anyhow!("cannot stat {}: {e}", path.display()))?;
        let expected_len = metadata.len() as usize;

        let mut buf = fs::read(path)
            .await
            .map_err(|e| anyhow!("cannot read {}: {e}", path.display()))?;

        if buf.len() != expected_len {
            return Err(anyhow!(
                "short read on {}: expected {expected_len} bytes, got {}",
                path.display(),
                buf.len()
            ));
        }

        let mut rng = rand::thread_rng();
        if self.nastiness.roll(&mut rng) {
            corrupt_one_byte(&mut buf, &mut rng);
        }

        Ok(buf)
    }

    /// Write `data` to `path`, possibly flipping one bit before it hits disk.
    pub async fn write_all(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut buf = data.to_vec();
        let mut rng = rand::thread_rng();
        if self.nastiness.roll(&mut rng) {
            corrupt_one_byte(&mut buf, &mut rng);
        }
        fs::write(path, &buf)
            .await
            .map_err(|e| anyhow!("cannot write {}: {e}", path.display()))?;
        Ok(())
    }

    /// Append `data` to an already-open staging file on disk, possibly
    /// flipping one bit before it hits disk.
    pub async fn append(&self, path: &Path, data: &[u8]) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut buf = data.to_vec();
        let mut rng = rand::thread_rng();
        if self.nastiness.roll(&mut rng) {
            corrupt_one_byte(&mut buf, &mut rng);
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| anyhow!("cannot open {} for append: {e}", path.display()))?;
        file.write_all(&buf)
            .await
            .map_err(|e| anyhow!("cannot write {}: {e}", path.display()))?;
        Ok(())
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
