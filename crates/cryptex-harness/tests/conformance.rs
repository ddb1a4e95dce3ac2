//! The conformance suite against both targets.

use cryptex_core::{CryptoApi, KeyStoreApi};
use cryptex_harness::{FixtureConfig, LocalTarget, RemoteTarget, Suite, Target};
use cryptex_proto::{CipherAlgorithm, CipherMode, DigestAlgorithm, DigestHandle, ErrorCode, KeyFlags, KeyType};

#[test]
fn local_target_conforms() {
    let mut target = LocalTarget::new(&FixtureConfig::seeded(1)).expect("fixture");
    Suite::standard().assert_all(&mut target);
}

#[test]
fn remote_target_conforms() {
    let mut target = RemoteTarget::new(&FixtureConfig::seeded(1)).expect("fixture");
    Suite::standard().assert_all(&mut target);
}

#[test]
fn targets_describe_themselves() {
    let local = LocalTarget::new(&FixtureConfig::seeded(1)).expect("fixture");
    let remote = RemoteTarget::new(&FixtureConfig::seeded(1)).expect("fixture");
    assert!(format!("{local:?}").contains("MemoryFileStore"));
    assert!(format!("{remote:?}").contains("MemoryFileStore"));
}

#[test]
fn suite_runs_every_check_once() {
    let names = Suite::<LocalTarget>::standard().names();
    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
    assert!(names.contains(&"key_store_lifecycle"));
}

#[test]
fn leaked_handles_are_reported() {
    fn leaky(target: &mut LocalTarget) -> cryptex_harness::CheckResult {
        target.api().digest_init(DigestAlgorithm::Sha256).map(|_| ()).map_err(|code| {
            cryptex_harness::Violation::new("leaky", format!("{code:?}"))
        })
    }

    let mut suite = Suite::new();
    suite.add("leaky", leaky);
    let mut target = LocalTarget::new(&FixtureConfig::default()).expect("fixture");
    let violations = suite.run_all(&mut target).expect_err("leak detected");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].check, "leaky");
}

/// Error probes whose codes must be identical in and out of process.
fn probes<T: Target>(target: &mut T) -> Vec<Result<(), ErrorCode>> {
    let api = target.api();
    let key = api.key_init(KeyType::Aes, KeyFlags::IS_ALGO_CIPHER, 128).expect("key init");
    let stale = api.digest_init(DigestAlgorithm::Md5).expect("digest init");
    api.digest_close(stale).expect("close");

    let results = vec![
        api.key_init(KeyType::Aes, KeyFlags::NONE, 100).map(|_| ()),
        api.key_init(KeyType::Secp256r1Prv, KeyFlags::NONE, 384).map(|_| ()),
        api.key_export(key, None, &mut [0u8; 16]).map(|_| ()),
        api.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]).map(|_| ()),
        api.key_import(key, Some(key), &[0u8; 16]),
        api.digest_update(stale, b"late"),
        api.digest_close(DigestHandle::from_handle(key.handle())),
        api.get_random_data(&[], &mut []),
        api.key_exists("bad/name").map(|_| ()),
        api.get_key("missing").map(|_| ()),
        api.import_key("wide", &[0u8; 16], KeyType::RsaPrv, KeyFlags::NONE, 512).map(|_| ()),
        api.delete_key("missing", None),
    ];

    api.key_close(key).expect("close");
    results
}

#[test]
fn error_codes_match_across_the_boundary() {
    let mut local = LocalTarget::new(&FixtureConfig::seeded(2)).expect("fixture");
    let mut remote = RemoteTarget::new(&FixtureConfig::seeded(2)).expect("fixture");

    let local_codes = probes(&mut local);
    let remote_codes = probes(&mut remote);
    assert_eq!(local_codes, remote_codes);
    assert!(local_codes.iter().all(Result::is_err), "every probe fails: {local_codes:?}");
    assert_eq!(local.live_handles(), 0);
    assert_eq!(remote.live_handles(), 0);
}

#[test]
fn same_seed_same_random_stream() {
    let mut local = LocalTarget::new(&FixtureConfig::seeded(3)).expect("fixture");
    let mut remote = RemoteTarget::new(&FixtureConfig::seeded(3)).expect("fixture");

    let mut a = [0u8; 48];
    let mut b = [0u8; 48];
    local.api().get_random_data(b"salt", &mut a).expect("random");
    remote.api().get_random_data(b"salt", &mut b).expect("random");
    assert_eq!(a, b);
}
