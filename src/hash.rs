//! Majority-vote content hashing: a single read of a corrupting storage
//! medium can't be trusted, so the digest is computed from `ATTEMPTS`
//! independent full re-reads and the modal result is returned.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use sha1::{Digest, Sha1};

use crate::nasty::NastyFile;

/// Number of independent re-reads to tally per `majority_hash` call.
pub const ATTEMPTS: usize = 50;

/// Compute the SHA-1 hex digest of one read of `path` via `file`.
fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Re-read `path` `ATTEMPTS` times through `file` and return the digest that
/// occurred most often. Ties are broken by first-seen order: `HashMap`
/// iteration order is unspecified, so first-seen is tracked explicitly
/// rather than relying on insertion order falling out of the map.
///
/// No confidence threshold is enforced on the winning count — if storage
/// corruption is severe enough that no digest has a true majority, the
/// modal (possibly minority-of-one) digest is still returned. This mirrors
/// the original implementation and can, in principle, produce a spurious
/// PASS; see SPEC_FULL.md §4.5 and DESIGN.md for the rationale.
pub async fn majority_hash(path: &Path, file: &NastyFile) -> Result<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen_order: Vec<String> = Vec::new();

    for _ in 0..ATTEMPTS {
        let bytes = file.read_entire(path).await?;
        let digest = sha1_hex(&bytes);
        if !counts.contains_key(&digest) {
            first_seen_order.push(digest.clone());
        }
        *counts.entry(digest).or_insert(0) += 1;
    }

    Ok(pick_winner(&first_seen_order, &counts))
}

/// Pick the digest with the highest count in `counts`, breaking ties by
/// earliest position in `first_seen_order`.
///
/// `Iterator::max_by_key` keeps the *last* maximal element on a tie, which
/// would hand the win to the most-recently-first-seen digest instead of the
/// first. Folding by hand and replacing only on a strict `>` makes the
/// earliest digest in `first_seen_order` win every tie instead.
fn pick_winner(first_seen_order: &[String], counts: &HashMap<String, usize>) -> String {
    let mut winner: Option<(&str, usize)> = None;
    for digest in first_seen_order {
        let count = counts[digest];
        let better = match winner {
            Some((_, best_count)) => count > best_count,
            None => true,
        };
        if better {
            winner = Some((digest, count));
        }
    }
    winner
        .expect("first_seen_order is non-empty whenever counts is")
        .0
        .to_string()
}
