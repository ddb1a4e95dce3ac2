//! Key store operations under injected file store failures.
//!
//! With a chaotic backend every store call may fail, but only with an I/O
//! code, and a failed write never leaves a file behind. Whatever did get
//! persisted must read back intact.

use std::collections::BTreeMap;

use cryptex_core::{CryptoApi, KeyStoreApi};
use cryptex_harness::{FixtureConfig, LocalTarget, RemoteTarget, Target};
use cryptex_proto::{ErrorCode, KeyFlags, KeyType};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const NAMES: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

fn chaotic(seed: u64, rate: f64) -> FixtureConfig {
    FixtureConfig { failure_rate: Some(rate), ..FixtureConfig::seeded(seed) }
}

/// Random store traffic against `target`; returns how many calls failed.
fn run_chaos<T: Target>(target: &mut T, seed: u64, rounds: usize) -> usize {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    // Entries whose import reported success and whose delete has not.
    let mut stored: BTreeMap<&str, [u8; 16]> = BTreeMap::new();
    let mut failures = 0;
    let flags = KeyFlags::IS_ALGO_CIPHER | KeyFlags::EXPORTABLE_RAW;

    for round in 0..rounds {
        let name = NAMES[rng.gen_range(0..NAMES.len())];
        let api = target.api();
        let outcome = match rng.gen_range(0..4) {
            0 => {
                let bytes: [u8; 16] = rng.r#gen();
                match api.import_key(name, &bytes, KeyType::Aes, flags, 128) {
                    Ok(key) => {
                        assert!(!stored.contains_key(name), "round {round}: duplicate import of {name} succeeded");
                        stored.insert(name, bytes);
                        api.key_close(key).expect("close");
                        Ok(())
                    },
                    Err(ErrorCode::InsufficientSpace) if stored.contains_key(name) => Ok(()),
                    Err(code) => Err(code),
                }
            },
            1 => match api.get_key(name) {
                Ok(key) => {
                    let mut out = [0u8; 16];
                    assert_eq!(api.key_export(key, None, &mut out), Ok(16));
                    assert_eq!(stored.get(name), Some(&out), "round {round}: {name} read back altered");
                    api.key_close(key).expect("close");
                    Ok(())
                },
                Err(ErrorCode::NotFound) if !stored.contains_key(name) => Ok(()),
                Err(code) => Err(code),
            },
            2 => match api.delete_key(name, None) {
                Ok(()) => {
                    assert!(stored.remove(name).is_some(), "round {round}: deleted {name} that was never stored");
                    Ok(())
                },
                Err(ErrorCode::NotFound) if !stored.contains_key(name) => Ok(()),
                Err(code) => Err(code),
            },
            _ => match api.key_exists(name) {
                Ok(exists) => {
                    assert_eq!(exists, stored.contains_key(name), "round {round}: exists({name})");
                    Ok(())
                },
                Err(code) => Err(code),
            },
        };

        if let Err(code) = outcome {
            assert_eq!(code, ErrorCode::Generic, "round {round}: injected failures surface as I/O errors");
            failures += 1;
        }
        assert_eq!(target.live_handles(), 0, "round {round}: handle leaked");
    }

    let mut on_disk = target.files().file_names();
    on_disk.sort_unstable();
    let expected: Vec<String> = stored.keys().map(ToString::to_string).collect();
    assert_eq!(on_disk, expected, "files on disk match successful imports");
    failures
}

#[test]
fn local_store_fails_clean() {
    for seed in 0..8 {
        let mut target = LocalTarget::new(&chaotic(seed, 0.2)).expect("fixture");
        run_chaos(&mut target, seed, 200);
    }
}

#[test]
fn remote_store_fails_clean() {
    for seed in 0..8 {
        let mut target = RemoteTarget::new(&chaotic(seed, 0.2)).expect("fixture");
        run_chaos(&mut target, seed, 200);
    }
}

#[test]
fn failures_are_actually_injected() {
    let mut target = LocalTarget::new(&chaotic(9, 0.5)).expect("fixture");
    assert!(run_chaos(&mut target, 9, 100) > 0);
}

#[test]
fn zero_rate_never_fails() {
    let mut target = RemoteTarget::new(&chaotic(4, 0.0)).expect("fixture");
    assert_eq!(run_chaos(&mut target, 4, 200), 0);
}
