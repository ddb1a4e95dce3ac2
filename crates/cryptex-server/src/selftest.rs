//! Startup self-test.
//!
//! Exercises the service end to end through the facade traits, so the same
//! checks run against an in-process context or over a channel.

use cryptex_core::{CryptoApi, KeyStoreApi};
use cryptex_crypto::{NONCE_LEN, TAG_LEN};
use cryptex_proto::{CipherAlgorithm, CipherMode, DigestAlgorithm, ErrorCode, KeyFlags, KeyHandle, KeyType};
use tracing::{debug, info};

use crate::ServerError;

/// SHA-256 of `"0123456789"`.
const DIGEST_VECTOR: &str = "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882";

/// Entry name used by the key store check.
pub const SELF_TEST_ENTRY: &str = "selftest";

type Result<T> = std::result::Result<T, ServerError>;

fn check<T>(check: &'static str, result: std::result::Result<T, ErrorCode>) -> Result<T> {
    result.map_err(|code| ServerError::SelfTest { check, code })
}

fn ensure(check: &'static str, condition: bool) -> Result<()> {
    if condition { Ok(()) } else { Err(ServerError::SelfTest { check, code: ErrorCode::Aborted }) }
}

/// Run every check. The key store check runs only when `with_key_store`.
pub fn run<A: CryptoApi + KeyStoreApi>(api: &mut A, with_key_store: bool) -> Result<()> {
    random(api)?;
    digest(api)?;

    let key = check("key setup", api.key_init(KeyType::Aes, KeyFlags::IS_ALGO_CIPHER, 256))?;
    let result = ecb(api, key).and_then(|()| gcm(api, key));
    check("key close", api.key_close(key))?;
    result?;

    if with_key_store {
        key_store(api)?;
    }

    info!(key_store = with_key_store, "self-test passed");
    Ok(())
}

fn random<A: CryptoApi>(api: &mut A) -> Result<()> {
    let mut a = [0u8; 32];
    let mut b = [0u8; 32];
    check("random", api.get_random_data(&[], &mut a))?;
    check("random", api.get_random_data(b"self-test", &mut b))?;
    ensure("random", a != [0u8; 32] && a != b)?;
    debug!("random ok");
    Ok(())
}

fn digest<A: CryptoApi>(api: &mut A) -> Result<()> {
    let handle = check("digest", api.digest_init(DigestAlgorithm::Sha256))?;
    check("digest", api.digest_update(handle, b"01234"))?;
    let mut out = [0u8; 32];
    let len = check("digest", api.digest_finalize(handle, b"56789", &mut out))?;
    check("digest", api.digest_close(handle))?;
    ensure("digest", hex::encode(&out[..len]) == DIGEST_VECTOR)?;
    debug!("digest ok");
    Ok(())
}

fn ecb<A: CryptoApi>(api: &mut A, key: KeyHandle) -> Result<()> {
    check("ecb", api.key_generate(key))?;
    let plain = [0x5au8; 32];

    let enc = check("ecb", api.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]))?;
    let mut sealed = [0u8; 32];
    check("ecb", api.cipher_update(enc, &plain, &mut sealed))?;
    check("ecb", api.cipher_finalize(enc, &mut []))?;
    check("ecb", api.cipher_close(enc))?;

    let dec = check("ecb", api.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Decrypt, &[]))?;
    let mut opened = [0u8; 32];
    check("ecb", api.cipher_update(dec, &sealed, &mut opened))?;
    check("ecb", api.cipher_close(dec))?;

    ensure("ecb", sealed != plain && opened == plain)?;
    debug!("ecb ok");
    Ok(())
}

fn gcm<A: CryptoApi>(api: &mut A, key: KeyHandle) -> Result<()> {
    let mut nonce = [0u8; NONCE_LEN];
    check("gcm", api.get_random_data(&[], &mut nonce))?;
    let plain = b"cryptex self-test payload";

    let enc = check("gcm", api.cipher_init(key, CipherAlgorithm::AesGcm, CipherMode::Encrypt, &nonce))?;
    check("gcm", api.cipher_update_ad(enc, b"header"))?;
    let mut sealed = [0u8; 25];
    check("gcm", api.cipher_update(enc, plain, &mut sealed))?;
    let mut tag = [0u8; TAG_LEN];
    check("gcm", api.cipher_finalize(enc, &mut tag))?;
    check("gcm", api.cipher_close(enc))?;

    let dec = check("gcm", api.cipher_init(key, CipherAlgorithm::AesGcm, CipherMode::Decrypt, &nonce))?;
    check("gcm", api.cipher_update_ad(dec, b"header"))?;
    let mut opened = [0u8; 25];
    check("gcm", api.cipher_update(dec, &sealed, &mut opened))?;
    check("gcm", api.cipher_verify_tag(dec, &tag))?;
    check("gcm", api.cipher_close(dec))?;

    ensure("gcm", &opened == plain)?;
    debug!("gcm ok");
    Ok(())
}

fn key_store<A: CryptoApi + KeyStoreApi>(api: &mut A) -> Result<()> {
    // Left over from an interrupted run.
    if check("key store", api.key_exists(SELF_TEST_ENTRY))? {
        check("key store", api.delete_key(SELF_TEST_ENTRY, None))?;
    }

    let flags = KeyFlags::IS_ALGO_CIPHER | KeyFlags::EXPORTABLE_RAW;
    let stored = check("key store", api.generate_key(SELF_TEST_ENTRY, KeyType::Aes, flags, 128))?;
    ensure("key store", check("key store", api.key_exists(SELF_TEST_ENTRY))?)?;
    ensure("key store", check("key store", api.get_key_size_bytes(SELF_TEST_ENTRY))? == 16)?;

    let loaded = check("key store", api.get_key(SELF_TEST_ENTRY))?;
    let mut a = [0u8; 16];
    let mut b = [0u8; 16];
    check("key store", api.key_export(stored, None, &mut a))?;
    check("key store", api.key_export(loaded, None, &mut b))?;
    check("key store", api.key_close(loaded))?;
    ensure("key store", a == b)?;

    check("key store", api.delete_key(SELF_TEST_ENTRY, Some(stored)))?;
    ensure("key store", !check("key store", api.key_exists(SELF_TEST_ENTRY))?)?;
    debug!("key store ok");
    Ok(())
}
