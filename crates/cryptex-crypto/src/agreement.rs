//! Key agreement sessions: finite-field DH and ECDH on secp256r1.

use cryptex_proto::AgreementAlgorithm;
use zeroize::Zeroizing;

use crate::{
    CryptoError, Key, Result,
    key::{DhPrivate, KeyMaterial},
};

/// secp256r1 shared secret length
const ECDH_SECRET_LEN: usize = 32;

enum LocalKey {
    Dh(DhPrivate),
    Ec(p256::SecretKey),
}

/// An agreement session bound to a copy of one private key.
pub struct AgreementSession {
    algorithm: AgreementAlgorithm,
    local: LocalKey,
    open: bool,
}

impl std::fmt::Debug for AgreementSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgreementSession")
            .field("algorithm", &self.algorithm)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl AgreementSession {
    /// Bind the local private key.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidParameter` if the key is not the private type for
    ///   `algorithm`
    /// - `CryptoError::NoKeyMaterial` if the key is empty
    pub fn init(algorithm: AgreementAlgorithm, key: &Key) -> Result<Self> {
        if key.key_type() != algorithm.private_key_type() {
            return Err(CryptoError::invalid("key type does not match agreement algorithm"));
        }
        let local = match key.material()? {
            KeyMaterial::DhPrv(dh) => LocalKey::Dh(dh.clone()),
            KeyMaterial::EcPrv(secret) => LocalKey::Ec(secret.clone()),
            _ => return Err(CryptoError::invalid("key type does not match agreement algorithm")),
        };
        Ok(Self { algorithm, local, open: true })
    }

    /// Algorithm fixed at init.
    pub fn algorithm(&self) -> AgreementAlgorithm {
        self.algorithm
    }

    /// Shared secret length in bytes.
    pub fn shared_len(&self) -> usize {
        match &self.local {
            LocalKey::Dh(dh) => dh.params.p.to_bytes_be().len(),
            LocalKey::Ec(_) => ECDH_SECRET_LEN,
        }
    }

    /// Derive the shared secret with `peer` into `out`.
    ///
    /// DH secrets are left-padded to the byte length of `p`; ECDH secrets are
    /// the 32-byte x-coordinate.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidState` after close
    /// - `CryptoError::InvalidParameter` if `peer` is not the matching public
    ///   type or uses different DH parameters
    /// - `CryptoError::NoKeyMaterial` if `peer` is empty
    /// - `CryptoError::BufferTooSmall` if `out` cannot hold the secret
    pub fn compute_shared(&self, peer: &Key, out: &mut [u8]) -> Result<usize> {
        if !self.open {
            return Err(CryptoError::InvalidState { state: "Closed", operation: "compute_shared" });
        }
        if peer.key_type() != self.algorithm.public_key_type() {
            return Err(CryptoError::invalid("peer key type does not match agreement algorithm"));
        }

        let len = self.shared_len();
        match (&self.local, peer.material()?) {
            (LocalKey::Dh(local), KeyMaterial::DhPub(remote)) => {
                if local.params != remote.params {
                    return Err(CryptoError::invalid("peer uses different DH parameters"));
                }
                CryptoError::check_output(len, out.len())?;
                let shared = Zeroizing::new(remote.gx.modpow(&local.x, &local.params.p).to_bytes_be());
                let pad = len - shared.len();
                out[..pad].fill(0);
                out[pad..len].copy_from_slice(&shared);
            },
            (LocalKey::Ec(secret), KeyMaterial::EcPub(point)) => {
                CryptoError::check_output(len, out.len())?;
                let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), point.as_affine());
                out[..len].copy_from_slice(shared.raw_secret_bytes());
            },
            _ => return Err(CryptoError::invalid("peer key type does not match agreement algorithm")),
        }
        Ok(len)
    }

    /// Release the session.
    pub fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use cryptex_proto::{KeyFlags, KeyType};

    use super::*;
    use crate::Drbg;

    fn pair(private: KeyType, public: KeyType, bits: u32, seed: u8) -> (Key, Key) {
        let mut prv = Key::init(private, KeyFlags::NONE, bits).expect("size");
        let mut publ = Key::init(public, KeyFlags::NONE, bits).expect("size");
        Key::generate_pair(&mut prv, &mut publ, &mut Drbg::from_seed([seed; 32])).expect("keygen");
        (prv, publ)
    }

    #[test]
    fn ecdh_is_symmetric() {
        let (a_prv, a_pub) = pair(KeyType::Secp256r1Prv, KeyType::Secp256r1Pub, 256, 1);
        let (b_prv, b_pub) = pair(KeyType::Secp256r1Prv, KeyType::Secp256r1Pub, 256, 2);

        let a = AgreementSession::init(AgreementAlgorithm::Ecdh, &a_prv).expect("init");
        let b = AgreementSession::init(AgreementAlgorithm::Ecdh, &b_prv).expect("init");
        let (mut ab, mut ba) = ([0u8; 32], [0u8; 32]);
        assert_eq!(a.compute_shared(&b_pub, &mut ab), Ok(32));
        assert_eq!(b.compute_shared(&a_pub, &mut ba), Ok(32));
        assert_eq!(ab, ba);
    }

    #[test]
    fn dh_rejects_foreign_parameters() {
        let (a_prv, a_pub) = pair(KeyType::DhPrv, KeyType::DhPub, 96, 1);
        let (_, b_pub) = pair(KeyType::DhPrv, KeyType::DhPub, 96, 2);

        let session = AgreementSession::init(AgreementAlgorithm::Dh, &a_prv).expect("init");
        let mut out = [0u8; 12];
        assert!(matches!(
            session.compute_shared(&b_pub, &mut out),
            Err(CryptoError::InvalidParameter { .. })
        ));
        assert_eq!(session.compute_shared(&a_pub, &mut out), Ok(12));
    }

    #[test]
    fn type_checks() {
        let (ec_prv, ec_pub) = pair(KeyType::Secp256r1Prv, KeyType::Secp256r1Pub, 256, 3);
        assert!(matches!(
            AgreementSession::init(AgreementAlgorithm::Dh, &ec_prv),
            Err(CryptoError::InvalidParameter { .. })
        ));
        assert!(matches!(
            AgreementSession::init(AgreementAlgorithm::Ecdh, &ec_pub),
            Err(CryptoError::InvalidParameter { .. })
        ));

        let session = AgreementSession::init(AgreementAlgorithm::Ecdh, &ec_prv).expect("init");
        let mut out = [0u8; 32];
        assert!(matches!(
            session.compute_shared(&ec_prv, &mut out),
            Err(CryptoError::InvalidParameter { .. })
        ));

        let empty = Key::init(KeyType::Secp256r1Pub, KeyFlags::NONE, 256).expect("size");
        assert_eq!(session.compute_shared(&empty, &mut out), Err(CryptoError::NoKeyMaterial));
    }

    #[test]
    fn short_output_writes_nothing() {
        let (prv, publ) = pair(KeyType::Secp256r1Prv, KeyType::Secp256r1Pub, 256, 4);
        let mut session = AgreementSession::init(AgreementAlgorithm::Ecdh, &prv).expect("init");
        let mut short = [0x55u8; 31];
        assert!(matches!(
            session.compute_shared(&publ, &mut short),
            Err(CryptoError::BufferTooSmall { needed: 32, available: 31 })
        ));
        assert_eq!(short, [0x55u8; 31]);

        session.close();
        let mut out = [0u8; 32];
        assert!(matches!(session.compute_shared(&publ, &mut out), Err(CryptoError::InvalidState { .. })));
    }
}
