//! Adversarial collaborators: a datagram socket that drops/duplicates/
//! corrupts/reorders outbound traffic, and a file interface that corrupts
//! bytes on read and write. Both are driven by a single `Nastiness` knob
//! (0 = well-behaved passthrough), mirroring the reference implementation's
//! "nastiness level" command-line arguments.

mod file;
mod socket;

pub use file::NastyFile;
pub use socket::{NastyUdpSocket, Recv};

/// A nastiness level in 0..=5. Each unit of nastiness adds a fixed increment
/// to the probability of each adversarial effect; level 0 never misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nastiness(u8);

impl Nastiness {
    /// Probability added to each adversarial effect per nastiness level.
    const STEP: f64 = 0.12;

    pub fn new(level: u8) -> Self {
        Nastiness(level.min(5))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    fn probability(self) -> f64 {
        self.0 as f64 * Self::STEP
    }

    fn roll(self, rng: &mut impl rand::Rng) -> bool {
        self.0 != 0 && rng.gen_bool(self.probability())
    }
}
