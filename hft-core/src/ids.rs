//! Stable string identifiers for orders, positions, strategies, signals and
//! risk events.
//!
//! Ids are monotonic-timestamp-prefixed so they sort lexicographically in
//! rough creation order, with a random suffix to keep them unique across
//! concurrent generation on multiple tasks. This mirrors the spirit of the
//! teacher's `core::OrderId::generate()` (timestamp/random/counter packed
//! into a u128) but renders to a stable string, per the capability set
//! required of Order/Position/Strategy/Signal/RiskEvent ids.

use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generates a new id with the given short prefix (e.g. "ord", "pos").
pub fn generate(prefix: &str) -> String {
    let ts_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let rand_suffix: u32 = rand::thread_rng().gen();
    format!("{prefix}_{ts_ns:016x}{counter:04x}{rand_suffix:08x}")
}

/// Monotonic nanosecond timestamp, as required throughout the data model.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = generate("ord");
        let b = generate("ord");
        assert_ne!(a, b);
        assert!(a.starts_with("ord_"));
    }

    #[test]
    fn now_ns_is_nonzero() {
        assert!(now_ns() > 0);
    }
}
