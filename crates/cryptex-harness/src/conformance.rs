//! Conformance checks for any [`Target`].
//!
//! Every check drives the facade the way a client would and compares the
//! outcome, success value or error code, against the expected behavior of
//! the service. The same [`Suite`] runs unchanged against a local and a
//! remote target; a difference between the two is a bug in the RPC layer.
//!
//! The runner also enforces one cross-cutting invariant: a check must close
//! every handle it opens, so the live handle count after a check equals the
//! count before it.

use cryptex_core::{ApiResult, CryptoApi, KeyStoreApi};
use cryptex_crypto::{NONCE_LEN, TAG_LEN};
use cryptex_proto::{
    AgreementAlgorithm, CipherAlgorithm, CipherMode, DigestAlgorithm, DigestHandle, ErrorCode, KeyFlags,
    KeyHandle, KeyType, SignatureAlgorithm,
};
use tracing::debug;

use crate::{Target, vectors};

/// Check result.
pub type CheckResult = Result<(), Violation>;

/// A failed expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the failing check
    pub check: &'static str,
    /// What went wrong
    pub message: String,
}

impl Violation {
    /// Violation of `check`.
    pub fn new(check: &'static str, message: impl Into<String>) -> Self {
        Self { check, message: message.into() }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.check, self.message)
    }
}

impl std::error::Error for Violation {}

/// Unwrap a call that must succeed.
pub fn ok<T>(check: &'static str, what: &str, result: ApiResult<T>) -> Result<T, Violation> {
    result.map_err(|code| Violation::new(check, format!("{what}: unexpected {code:?}")))
}

/// Require a call to fail with `expected`.
pub fn fails<T: std::fmt::Debug>(
    check: &'static str,
    what: &str,
    result: ApiResult<T>,
    expected: ErrorCode,
) -> CheckResult {
    match result {
        Err(code) if code == expected => Ok(()),
        other => Err(Violation::new(check, format!("{what}: expected {expected:?}, got {other:?}"))),
    }
}

/// Require `condition`.
pub fn ensure(check: &'static str, condition: bool, message: &str) -> CheckResult {
    if condition { Ok(()) } else { Err(Violation::new(check, message)) }
}

type CheckFn<T> = fn(&mut T) -> CheckResult;

/// Ordered set of named checks.
pub struct Suite<T: Target> {
    checks: Vec<(&'static str, CheckFn<T>)>,
}

impl<T: Target> Default for Suite<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Target> Suite<T> {
    /// Empty suite.
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Every check in this module.
    pub fn standard() -> Self {
        let mut suite = Self::new();
        suite.add("random", random);
        suite.add("digest_vectors", digest_vectors);
        suite.add("digest_lifecycle", digest_lifecycle);
        suite.add("cipher_ecb", cipher_ecb);
        suite.add("cipher_cbc", cipher_cbc);
        suite.add("cipher_gcm", cipher_gcm);
        suite.add("cipher_rejects", cipher_rejects);
        suite.add("signature_rsa", signature_rsa);
        suite.add("agreement_vectors", agreement_vectors);
        suite.add("agreement_generated", agreement_generated);
        suite.add("key_init", key_init);
        suite.add("key_import", key_import);
        suite.add("key_export", key_export);
        suite.add("key_store_lifecycle", key_store_lifecycle);
        suite.add("key_store_rejects", key_store_rejects);
        suite
    }

    /// Append a check.
    pub fn add(&mut self, name: &'static str, check: CheckFn<T>) {
        self.checks.push((name, check));
    }

    /// Names in run order.
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|(name, _)| *name).collect()
    }

    /// Run every check, collecting all violations.
    pub fn run_all(&self, target: &mut T) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        for &(name, check) in &self.checks {
            let before = target.live_handles();
            if let Err(violation) = check(target) {
                violations.push(violation);
                continue;
            }
            let after = target.live_handles();
            if after != before {
                violations.push(Violation::new(name, format!("leaked {} handles", after.abs_diff(before))));
            }
            debug!(fixture = target.name(), check = name, "passed");
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check, panicking with all violations.
    #[allow(clippy::panic, reason = "Assertion helper for tests")]
    pub fn assert_all(&self, target: &mut T) {
        if let Err(violations) = self.run_all(target) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("{} violations on {}:\n  {}", messages.len(), target.name(), messages.join("\n  "));
        }
    }
}

fn aes_key<A: CryptoApi>(check: &'static str, api: &mut A, flags: KeyFlags) -> Result<KeyHandle, Violation> {
    let key = ok(check, "key init", api.key_init(KeyType::Aes, flags, 128))?;
    ok(check, "key import", api.key_import(key, None, &vectors::bytes(vectors::AES128_KEY)?))?;
    Ok(key)
}

fn imported<A: CryptoApi>(
    check: &'static str,
    api: &mut A,
    key_type: KeyType,
    len_bits: u32,
    data: &[u8],
) -> Result<KeyHandle, Violation> {
    let key = ok(check, "key init", api.key_init(key_type, KeyFlags::EXPORTABLE_RAW, len_bits))?;
    ok(check, "key import", api.key_import(key, None, data))?;
    Ok(key)
}

/// Random output fills the buffer, varies, and rejects an empty buffer.
pub fn random<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "random";
    let api = target.api();
    let mut a = [0u8; 64];
    let mut b = [0u8; 64];
    ok(CHECK, "random", api.get_random_data(&[], &mut a))?;
    ok(CHECK, "salted random", api.get_random_data(b"salt", &mut b))?;
    ensure(CHECK, a != [0u8; 64], "output left zeroed")?;
    ensure(CHECK, a != b, "consecutive outputs repeat")?;
    fails(CHECK, "empty output", api.get_random_data(&[], &mut []), ErrorCode::InvalidParameter)
}

/// SHA-256 and MD5 match their vectors, whether fed in one call or split.
pub fn digest_vectors<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "digest_vectors";
    let api = target.api();
    for (algorithm, expected) in
        [(DigestAlgorithm::Sha256, vectors::SHA256_DIGEST), (DigestAlgorithm::Md5, vectors::MD5_DIGEST)]
    {
        let (head, tail) = vectors::DIGEST_INPUT.split_at(4);
        for (update, last) in [(&[][..], vectors::DIGEST_INPUT), (head, tail)] {
            let digest = ok(CHECK, "init", api.digest_init(algorithm))?;
            if !update.is_empty() {
                ok(CHECK, "update", api.digest_update(digest, update))?;
            }
            let mut out = [0u8; 32];
            let len = ok(CHECK, "finalize", api.digest_finalize(digest, last, &mut out))?;
            ok(CHECK, "close", api.digest_close(digest))?;
            ensure(CHECK, hex::encode(&out[..len]) == expected, "digest mismatch")?;
        }
    }
    Ok(())
}

/// Digest sessions refuse use after finalize and after close.
pub fn digest_lifecycle<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "digest_lifecycle";
    let api = target.api();
    fails(CHECK, "digest none", api.digest_init(DigestAlgorithm::None), ErrorCode::NotSupported)?;

    let digest = ok(CHECK, "init", api.digest_init(DigestAlgorithm::Sha256))?;
    let mut short = [0u8; 31];
    fails(CHECK, "short output", api.digest_finalize(digest, b"x", &mut short), ErrorCode::BufferTooSmall)?;
    let mut out = [0u8; 32];
    ok(CHECK, "finalize", api.digest_finalize(digest, b"x", &mut out))?;
    fails(CHECK, "update after finalize", api.digest_update(digest, b"y"), ErrorCode::Aborted)?;
    ok(CHECK, "close", api.digest_close(digest))?;
    fails(CHECK, "update after close", api.digest_update(digest, b"y"), ErrorCode::InvalidHandle)?;
    fails(CHECK, "double close", api.digest_close(digest), ErrorCode::InvalidHandle)
}

/// ECB encrypts the FIPS-197 block, decrypts it back, and the handle dies on
/// close.
pub fn cipher_ecb<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "cipher_ecb";
    let api = target.api();
    let key = aes_key(CHECK, api, KeyFlags::IS_ALGO_CIPHER)?;
    let plain = vectors::bytes(vectors::AES128_PLAIN)?;

    let enc = ok(CHECK, "init", api.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]))?;
    let mut sealed = [0u8; 16];
    ok(CHECK, "encrypt", api.cipher_update(enc, &plain, &mut sealed))?;
    ensure(CHECK, hex::encode(sealed) == vectors::AES128_CIPHER, "ciphertext mismatch")?;
    ok(CHECK, "finalize", api.cipher_finalize(enc, &mut []))?;
    ok(CHECK, "close", api.cipher_close(enc))?;
    fails(CHECK, "update after close", api.cipher_update(enc, &plain, &mut sealed), ErrorCode::InvalidHandle)?;

    let dec = ok(CHECK, "init", api.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Decrypt, &[]))?;
    let mut opened = [0u8; 16];
    ok(CHECK, "decrypt", api.cipher_update(dec, &sealed, &mut opened))?;
    ok(CHECK, "close", api.cipher_close(dec))?;
    ok(CHECK, "key close", api.key_close(key))?;
    ensure(CHECK, opened[..] == plain[..], "round trip mismatch")
}

/// CBC round trip over several blocks in several calls.
pub fn cipher_cbc<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "cipher_cbc";
    let api = target.api();
    let key = aes_key(CHECK, api, KeyFlags::IS_ALGO_CIPHER)?;
    let iv = [0x24u8; 16];
    let plain: Vec<u8> = (0u8..64).collect();

    let enc = ok(CHECK, "init", api.cipher_init(key, CipherAlgorithm::AesCbc, CipherMode::Encrypt, &iv))?;
    let mut sealed = [0u8; 64];
    ok(CHECK, "encrypt", api.cipher_update(enc, &plain[..32], &mut sealed[..32]))?;
    ok(CHECK, "encrypt", api.cipher_update(enc, &plain[32..], &mut sealed[32..]))?;
    ok(CHECK, "close", api.cipher_close(enc))?;

    let dec = ok(CHECK, "init", api.cipher_init(key, CipherAlgorithm::AesCbc, CipherMode::Decrypt, &iv))?;
    let mut opened = [0u8; 64];
    ok(CHECK, "decrypt", api.cipher_update(dec, &sealed, &mut opened))?;
    ok(CHECK, "close", api.cipher_close(dec))?;
    ok(CHECK, "key close", api.key_close(key))?;

    ensure(CHECK, sealed[..16] != sealed[16..32], "CBC did not chain")?;
    ensure(CHECK, opened[..] == plain[..], "round trip mismatch")
}

/// GCM round trip with associated data; a flipped tag bit is rejected.
pub fn cipher_gcm<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "cipher_gcm";
    let api = target.api();
    let key = aes_key(CHECK, api, KeyFlags::IS_ALGO_CIPHER)?;
    let nonce = [0x11u8; NONCE_LEN];
    // Not a multiple of the block size
    let plain = [0x3cu8; 41];

    let enc = ok(CHECK, "init", api.cipher_init(key, CipherAlgorithm::AesGcm, CipherMode::Encrypt, &nonce))?;
    ok(CHECK, "ad", api.cipher_update_ad(enc, b"associated"))?;
    let mut sealed = [0u8; 41];
    ok(CHECK, "encrypt", api.cipher_update(enc, &plain, &mut sealed))?;
    let mut tag = [0u8; TAG_LEN];
    let tag_len = ok(CHECK, "finalize", api.cipher_finalize(enc, &mut tag))?;
    ensure(CHECK, tag_len == TAG_LEN, "tag length")?;
    fails(CHECK, "ad after finalize", api.cipher_update_ad(enc, b"late"), ErrorCode::Aborted)?;
    ok(CHECK, "close", api.cipher_close(enc))?;

    for tamper in [false, true] {
        let dec =
            ok(CHECK, "init", api.cipher_init(key, CipherAlgorithm::AesGcm, CipherMode::Decrypt, &nonce))?;
        ok(CHECK, "ad", api.cipher_update_ad(dec, b"associated"))?;
        let mut opened = [0u8; 41];
        ok(CHECK, "decrypt", api.cipher_update(dec, &sealed, &mut opened))?;
        let mut presented = tag;
        if tamper {
            presented[0] ^= 0x80;
            fails(CHECK, "tampered tag", api.cipher_verify_tag(dec, &presented), ErrorCode::Aborted)?;
        } else {
            ok(CHECK, "verify", api.cipher_verify_tag(dec, &presented))?;
            ensure(CHECK, opened == plain, "round trip mismatch")?;
        }
        ok(CHECK, "close", api.cipher_close(dec))?;
    }
    ok(CHECK, "key close", api.key_close(key))?;
    Ok(())
}

/// Cipher init and update reject bad keys, IVs, and partial blocks.
pub fn cipher_rejects<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "cipher_rejects";
    let api = target.api();
    let plain_key = aes_key(CHECK, api, KeyFlags::NONE)?;
    fails(
        CHECK,
        "key without cipher flag",
        api.cipher_init(plain_key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]),
        ErrorCode::AccessDenied,
    )?;
    ok(CHECK, "key close", api.key_close(plain_key))?;

    let empty = ok(CHECK, "key init", api.key_init(KeyType::Aes, KeyFlags::IS_ALGO_CIPHER, 128))?;
    fails(
        CHECK,
        "empty key",
        api.cipher_init(empty, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]),
        ErrorCode::NotFound,
    )?;
    ok(CHECK, "key close", api.key_close(empty))?;

    let key = aes_key(CHECK, api, KeyFlags::IS_ALGO_CIPHER)?;
    fails(
        CHECK,
        "ECB with IV",
        api.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[0u8; 16]),
        ErrorCode::InvalidParameter,
    )?;
    fails(
        CHECK,
        "short CBC IV",
        api.cipher_init(key, CipherAlgorithm::AesCbc, CipherMode::Encrypt, &[0u8; 8]),
        ErrorCode::InvalidParameter,
    )?;

    let enc = ok(CHECK, "init", api.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]))?;
    let mut out = [0u8; 32];
    fails(CHECK, "partial block", api.cipher_update(enc, &[0u8; 15], &mut out), ErrorCode::InvalidParameter)?;
    fails(CHECK, "short output", api.cipher_update(enc, &[0u8; 32], &mut out[..16]), ErrorCode::BufferTooSmall)?;
    fails(CHECK, "ECB with AD", api.cipher_update_ad(enc, b"ad"), ErrorCode::NotSupported)?;
    let as_digest = DigestHandle::from_handle(enc.handle());
    fails(CHECK, "wrong kind of handle", api.digest_close(as_digest), ErrorCode::InvalidHandle)?;
    ok(CHECK, "close", api.cipher_close(enc))?;
    ok(CHECK, "key close", api.key_close(key))?;
    Ok(())
}

/// RSA PKCS#1 v1.5 signs the vector message exactly and rejects tampering.
pub fn signature_rsa<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "signature_rsa";
    let api = target.api();
    let private = imported(CHECK, api, KeyType::RsaPrv, 1024, &vectors::rsa_private()?)?;
    let public = imported(CHECK, api, KeyType::RsaPub, 1024, &vectors::rsa_public()?)?;
    let expected = vectors::bytes(vectors::RSA_SIGNATURE)?;

    fails(
        CHECK,
        "no keys",
        api.signature_init(None, None, SignatureAlgorithm::RsaPkcs1),
        ErrorCode::InvalidParameter,
    )?;

    let signer = ok(CHECK, "init", api.signature_init(Some(private), None, SignatureAlgorithm::RsaPkcs1))?;
    let mut short = [0u8; 127];
    fails(
        CHECK,
        "short output",
        api.signature_sign(signer, DigestAlgorithm::None, vectors::RSA_MESSAGE, &mut short),
        ErrorCode::BufferTooSmall,
    )?;
    let mut sig = [0u8; 128];
    let len =
        ok(CHECK, "sign", api.signature_sign(signer, DigestAlgorithm::None, vectors::RSA_MESSAGE, &mut sig))?;
    ensure(CHECK, sig[..len] == expected[..], "signature mismatch")?;
    ok(CHECK, "close", api.signature_close(signer))?;

    let verifier = ok(CHECK, "init", api.signature_init(None, Some(public), SignatureAlgorithm::RsaPkcs1))?;
    ok(CHECK, "verify", api.signature_verify(verifier, DigestAlgorithm::None, vectors::RSA_MESSAGE, &sig))?;
    let mut tampered = sig;
    tampered[64] ^= 0x01;
    fails(
        CHECK,
        "tampered signature",
        api.signature_verify(verifier, DigestAlgorithm::None, vectors::RSA_MESSAGE, &tampered),
        ErrorCode::Aborted,
    )?;
    fails(
        CHECK,
        "sign without private key",
        api.signature_sign(verifier, DigestAlgorithm::None, vectors::RSA_MESSAGE, &mut sig),
        ErrorCode::InvalidParameter,
    )?;
    ok(CHECK, "close", api.signature_close(verifier))?;

    ok(CHECK, "key close", api.key_close(private))?;
    ok(CHECK, "key close", api.key_close(public))?;
    Ok(())
}

/// DH and ECDH reproduce their shared-secret vectors.
pub fn agreement_vectors<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "agreement_vectors";
    let api = target.api();
    let cases = [
        (
            AgreementAlgorithm::Dh,
            (KeyType::DhPrv, KeyType::DhPub, vectors::DH_BITS),
            (vectors::dh_private()?, vectors::dh_peer()?),
            vectors::DH_SHARED,
        ),
        (
            AgreementAlgorithm::Ecdh,
            (KeyType::Secp256r1Prv, KeyType::Secp256r1Pub, 256),
            (vectors::ec_private()?, vectors::ec_peer()?),
            vectors::EC_SHARED,
        ),
    ];

    for (algorithm, (prv_type, pub_type, bits), (prv_data, peer_data), shared) in cases {
        let private = imported(CHECK, api, prv_type, bits, &prv_data)?;
        let peer = imported(CHECK, api, pub_type, bits, &peer_data)?;

        fails(CHECK, "peer as local key", api.agreement_init(peer, algorithm), ErrorCode::InvalidParameter)?;
        let session = ok(CHECK, "init", api.agreement_init(private, algorithm))?;
        let mut out = [0u8; 64];
        let len = ok(CHECK, "compute", api.agreement_compute_shared(session, peer, &mut out))?;
        ensure(CHECK, hex::encode(&out[..len]) == shared, "shared secret mismatch")?;

        ok(CHECK, "close", api.agreement_close(session))?;
        ok(CHECK, "key close", api.key_close(private))?;
        ok(CHECK, "key close", api.key_close(peer))?;
    }
    Ok(())
}

/// Two generated secp256r1 pairs derive the same secret from either side.
pub fn agreement_generated<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "agreement_generated";
    let api = target.api();
    let mut keys = Vec::new();
    for _ in 0..2 {
        let private = ok(CHECK, "init", api.key_init(KeyType::Secp256r1Prv, KeyFlags::NONE, 256))?;
        let public = ok(CHECK, "init", api.key_init(KeyType::Secp256r1Pub, KeyFlags::NONE, 256))?;
        ok(CHECK, "generate pair", api.key_generate_pair(private, public))?;
        fails(CHECK, "generate twice", api.key_generate_pair(private, public), ErrorCode::InsufficientSpace)?;
        keys.push((private, public));
    }

    let mut secrets = Vec::new();
    for (local, remote) in [(keys[0].0, keys[1].1), (keys[1].0, keys[0].1)] {
        let session = ok(CHECK, "init", api.agreement_init(local, AgreementAlgorithm::Ecdh))?;
        let mut out = [0u8; 32];
        ok(CHECK, "compute", api.agreement_compute_shared(session, remote, &mut out))?;
        ok(CHECK, "close", api.agreement_close(session))?;
        secrets.push(out);
    }

    for (private, public) in keys {
        ok(CHECK, "key close", api.key_close(private))?;
        ok(CHECK, "key close", api.key_close(public))?;
    }
    ensure(CHECK, secrets[0] == secrets[1], "sides disagree")
}

/// Key sizes outside the supported range are rejected at init.
pub fn key_init<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "key_init";
    let api = target.api();
    for (key_type, bits) in
        [(KeyType::Aes, 666), (KeyType::RsaPrv, 11), (KeyType::RsaPub, 9999), (KeyType::Secp256r1Prv, 255)]
    {
        let result = api.key_init(key_type, KeyFlags::NONE, bits);
        fails(CHECK, "unsupported size", result, ErrorCode::InvalidParameter)?;
    }
    let key = ok(CHECK, "init", api.key_init(KeyType::Aes, KeyFlags::NONE, 256))?;
    ok(CHECK, "generate", api.key_generate(key))?;
    fails(CHECK, "generate twice", api.key_generate(key), ErrorCode::InsufficientSpace)?;
    ok(CHECK, "close", api.key_close(key))?;
    fails(CHECK, "close twice", api.key_close(key), ErrorCode::InvalidHandle)
}

/// Import attaches material exactly once and checks it against the slot.
pub fn key_import<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "key_import";
    let api = target.api();
    let key_bytes = vectors::bytes(vectors::AES128_KEY)?;

    let wrap = aes_key(CHECK, api, KeyFlags::IS_ALGO_CIPHER)?;
    let key = ok(CHECK, "init", api.key_init(KeyType::Aes, KeyFlags::NONE, 128))?;
    fails(CHECK, "wrapped import", api.key_import(key, Some(wrap), &key_bytes), ErrorCode::NotSupported)?;
    fails(CHECK, "wrong length", api.key_import(key, None, &key_bytes[..8]), ErrorCode::InvalidParameter)?;
    ok(CHECK, "import", api.key_import(key, None, &key_bytes))?;
    fails(CHECK, "import twice", api.key_import(key, None, &key_bytes), ErrorCode::InsufficientSpace)?;
    ok(CHECK, "close", api.key_close(key))?;
    ok(CHECK, "close", api.key_close(wrap))?;

    let big = ok(CHECK, "init", api.key_init(KeyType::RsaPub, KeyFlags::NONE, 2048))?;
    let result = api.key_import(big, None, &vectors::rsa_public()?);
    fails(CHECK, "1024-bit key into 2048", result, ErrorCode::InvalidParameter)?;
    ok(CHECK, "close", api.key_close(big))?;
    Ok(())
}

/// Export needs the raw-export flag, material, and a large enough buffer.
pub fn key_export<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "key_export";
    let api = target.api();
    let key_bytes = vectors::bytes(vectors::AES128_KEY)?;
    let mut out = [0u8; 16];

    let locked = aes_key(CHECK, api, KeyFlags::NONE)?;
    fails(CHECK, "no export flag", api.key_export(locked, None, &mut out), ErrorCode::AccessDenied)?;
    ok(CHECK, "close", api.key_close(locked))?;

    let key = ok(CHECK, "init", api.key_init(KeyType::Aes, KeyFlags::EXPORTABLE_RAW, 128))?;
    fails(CHECK, "empty key", api.key_export(key, None, &mut out), ErrorCode::NotFound)?;
    ok(CHECK, "import", api.key_import(key, None, &key_bytes))?;
    fails(CHECK, "short output", api.key_export(key, None, &mut out[..15]), ErrorCode::BufferTooSmall)?;
    fails(CHECK, "wrapped export", api.key_export(key, Some(key), &mut out), ErrorCode::NotSupported)?;
    let len = ok(CHECK, "export", api.key_export(key, None, &mut out))?;
    ok(CHECK, "close", api.key_close(key))?;
    ensure(CHECK, out[..len] == key_bytes[..], "exported bytes differ")?;

    let private = imported(CHECK, api, KeyType::RsaPrv, 1024, &vectors::rsa_private()?)?;
    let mut encoded = vec![0u8; 1024];
    let len = ok(CHECK, "export", api.key_export(private, None, &mut encoded))?;
    ok(CHECK, "close", api.key_close(private))?;
    ensure(CHECK, encoded[..len] == vectors::rsa_private()?[..], "RSA export differs from import")
}

/// Store, look up, reload, and delete an entry.
pub fn key_store_lifecycle<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "key_store_lifecycle";
    let name = "lifecycle";
    let key_bytes = vectors::bytes(vectors::AES128_KEY)?;
    let flags = KeyFlags::IS_ALGO_CIPHER | KeyFlags::EXPORTABLE_RAW;
    let api = target.api();

    ensure(CHECK, !ok(CHECK, "exists", api.key_exists(name))?, "entry present before import")?;
    let stored = ok(CHECK, "import", api.import_key(name, &key_bytes, KeyType::Aes, flags, 128))?;
    ensure(CHECK, ok(CHECK, "exists", api.key_exists(name))?, "entry missing after import")?;
    ensure(CHECK, ok(CHECK, "size", api.get_key_size_bytes(name))? == 16, "wrong size")?;
    fails(
        CHECK,
        "duplicate import",
        api.import_key(name, &key_bytes, KeyType::Aes, flags, 128),
        ErrorCode::InsufficientSpace,
    )?;

    // Each get yields an independent copy.
    let copy = ok(CHECK, "get", api.get_key(name))?;
    ensure(CHECK, copy != stored, "get reused the import handle")?;
    let mut out = [0u8; 16];
    ok(CHECK, "export copy", api.key_export(copy, None, &mut out))?;
    ensure(CHECK, out[..] == key_bytes[..], "reloaded bytes differ")?;
    ok(CHECK, "close copy", api.key_close(copy))?;
    ok(CHECK, "export original", api.key_export(stored, None, &mut out))?;

    let cipher = ok(
        CHECK,
        "cipher on stored key",
        api.cipher_init(stored, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]),
    )?;
    ok(CHECK, "cipher close", api.cipher_close(cipher))?;

    ok(CHECK, "delete", api.delete_key(name, Some(stored)))?;
    fails(CHECK, "handle after delete", api.key_close(stored), ErrorCode::InvalidHandle)?;
    fails(CHECK, "get after delete", api.get_key(name), ErrorCode::NotFound)?;
    fails(CHECK, "size after delete", api.get_key_size_bytes(name), ErrorCode::NotFound)?;
    fails(CHECK, "delete twice", api.delete_key(name, None), ErrorCode::NotFound)?;
    ensure(CHECK, !ok(CHECK, "exists", api.key_exists(name))?, "entry present after delete")?;

    let again = ok(CHECK, "re-import", api.import_key(name, &key_bytes, KeyType::Aes, flags, 128))?;
    ok(CHECK, "delete", api.delete_key(name, Some(again)))?;

    let generated = ok(CHECK, "generate", api.generate_key(name, KeyType::Aes, flags, 256))?;
    ensure(CHECK, ok(CHECK, "size", api.get_key_size_bytes(name))? == 32, "wrong generated size")?;
    ok(CHECK, "delete", api.delete_key(name, Some(generated)))?;
    ensure(CHECK, target.files().file_names().is_empty(), "files left behind")
}

/// Bad names, non-AES types, and stale delete handles are refused without
/// touching storage.
pub fn key_store_rejects<T: Target>(target: &mut T) -> CheckResult {
    const CHECK: &str = "key_store_rejects";
    let key_bytes = vectors::bytes(vectors::AES128_KEY)?;
    let api = target.api();

    for name in ["", "name-far-too-long", "a/b", "..", "spa ce"] {
        let result = api.import_key(name, &key_bytes, KeyType::Aes, KeyFlags::NONE, 128);
        fails(CHECK, "bad name", result, ErrorCode::InvalidParameter)?;
    }
    fails(
        CHECK,
        "non-AES type",
        api.generate_key("rsa", KeyType::RsaPrv, KeyFlags::NONE, 1024),
        ErrorCode::NotSupported,
    )?;
    fails(
        CHECK,
        "bytes do not match size",
        api.import_key("short", &key_bytes[..8], KeyType::Aes, KeyFlags::NONE, 128),
        ErrorCode::InvalidParameter,
    )?;
    fails(CHECK, "missing entry", api.get_key("absent"), ErrorCode::NotFound)?;

    let stored = ok(CHECK, "import", api.import_key("kept", &key_bytes, KeyType::Aes, KeyFlags::NONE, 128))?;
    ok(CHECK, "close", api.key_close(stored))?;
    fails(CHECK, "delete with stale handle", api.delete_key("kept", Some(stored)), ErrorCode::InvalidHandle)?;
    ensure(CHECK, ok(CHECK, "exists", api.key_exists("kept"))?, "failed delete removed the entry")?;
    ok(CHECK, "delete", api.delete_key("kept", None))?;
    ensure(CHECK, target.files().file_names().is_empty(), "files left behind")
}
