//! Shared host-key fixtures.
//!
//! RSA key generation is slow in debug builds, so tests draw from a small
//! process-wide pool of 2048-bit keys indexed by slot.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::HostKey;

/// Modulus size used for fixtures.
pub const TEST_KEY_BITS: usize = 2048;

static POOL: OnceLock<Mutex<HashMap<usize, HostKey>>> = OnceLock::new();

/// Host key for `slot`; the same slot always yields the same key within a process.
pub fn test_host_key(slot: usize) -> HostKey {
    let pool = POOL.get_or_init(|| Mutex::new(HashMap::new()));
    let mut keys = pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    keys.entry(slot)
        .or_insert_with(|| {
            HostKey::generate_with_bits(TEST_KEY_BITS).expect("test key generation")
        })
        .clone()
}
