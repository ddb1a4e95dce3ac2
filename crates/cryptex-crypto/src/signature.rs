//! RSA PKCS#1 v1.5 signature sessions.
//!
//! A session binds a private key (sign), a public key (verify), or both. A
//! session with only the private key verifies against the public half derived
//! from it. Messages are hashed by the caller; `DigestAlgorithm::None` signs
//! the input as-is without a DigestInfo prefix.

use cryptex_proto::{DigestAlgorithm, KeyType, SignatureAlgorithm};
use md5::Md5;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey, traits::PublicKeyParts};
use sha2::Sha256;

use crate::{CryptoError, Drbg, Key, Result, key::KeyMaterial};

/// A signature session bound to copies of its keys.
pub struct SignatureSession {
    algorithm: SignatureAlgorithm,
    private: Option<RsaPrivateKey>,
    public: RsaPublicKey,
    open: bool,
}

impl std::fmt::Debug for SignatureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureSession")
            .field("algorithm", &self.algorithm)
            .field("can_sign", &self.private.is_some())
            .field("modulus_bytes", &self.public.size())
            .field("open", &self.open)
            .finish()
    }
}

impl SignatureSession {
    /// Bind keys for signing and/or verification.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidParameter` if neither key is given, or a key has
    ///   the wrong type
    /// - `CryptoError::NoKeyMaterial` if a given key is empty
    pub fn init(
        algorithm: SignatureAlgorithm,
        private: Option<&Key>,
        public: Option<&Key>,
    ) -> Result<Self> {
        let private = match private {
            Some(key) => {
                if key.key_type() != KeyType::RsaPrv {
                    return Err(CryptoError::invalid("signing key must be an RSA private key"));
                }
                let KeyMaterial::RsaPrv(rsa) = key.material()? else {
                    return Err(CryptoError::invalid("signing key must be an RSA private key"));
                };
                Some(rsa.clone())
            },
            None => None,
        };

        let public = match (public, &private) {
            (Some(key), _) => {
                if key.key_type() != KeyType::RsaPub {
                    return Err(CryptoError::invalid("verification key must be an RSA public key"));
                }
                let KeyMaterial::RsaPub(rsa) = key.material()? else {
                    return Err(CryptoError::invalid("verification key must be an RSA public key"));
                };
                rsa.clone()
            },
            (None, Some(private)) => private.to_public_key(),
            (None, None) => return Err(CryptoError::invalid("signature session needs a key")),
        };

        Ok(Self { algorithm, private, public, open: true })
    }

    /// Algorithm fixed at init.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signature size in bytes (the modulus size).
    pub fn signature_len(&self) -> usize {
        self.public.size()
    }

    /// Sign `hash` into `out`, returning the signature length.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidState` after close
    /// - `CryptoError::InvalidParameter` without a private key, or if `hash`
    ///   does not match `digest` (or is too long to sign)
    /// - `CryptoError::BufferTooSmall` if `out` is shorter than the modulus
    pub fn sign(
        &mut self,
        digest: DigestAlgorithm,
        hash: &[u8],
        out: &mut [u8],
        rng: &mut Drbg,
    ) -> Result<usize> {
        self.ensure_open("sign")?;
        let Some(private) = &self.private else {
            return Err(CryptoError::invalid("session has no private key"));
        };
        let scheme = scheme(digest, hash)?;
        let len = private.size();
        CryptoError::check_output(len, out.len())?;

        let signature = private.sign_with_rng(rng, scheme, hash).map_err(map_rsa_error)?;
        out[..signature.len()].copy_from_slice(&signature);
        Ok(signature.len())
    }

    /// Check `signature` over `hash`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidState` after close
    /// - `CryptoError::InvalidParameter` if `hash` does not match `digest`
    /// - `CryptoError::VerificationFailed` if the signature does not verify
    pub fn verify(&mut self, digest: DigestAlgorithm, hash: &[u8], signature: &[u8]) -> Result<()> {
        self.ensure_open("verify")?;
        let scheme = scheme(digest, hash)?;
        self.public
            .verify(scheme, hash, signature)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    /// Release the session.
    pub fn close(&mut self) {
        self.open = false;
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(CryptoError::InvalidState { state: "Closed", operation })
        }
    }
}

fn scheme(digest: DigestAlgorithm, hash: &[u8]) -> Result<Pkcs1v15Sign> {
    if hash.is_empty() {
        return Err(CryptoError::invalid("empty message"));
    }
    if digest != DigestAlgorithm::None && hash.len() != digest.output_len() {
        return Err(CryptoError::invalid("hash length does not match digest algorithm"));
    }
    Ok(match digest {
        DigestAlgorithm::None => Pkcs1v15Sign::new_unprefixed(),
        DigestAlgorithm::Md5 => Pkcs1v15Sign::new::<Md5>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
    })
}

fn map_rsa_error(err: rsa::Error) -> CryptoError {
    match err {
        rsa::Error::MessageTooLong => CryptoError::invalid("message too long for modulus"),
        other => CryptoError::Backend(other.to_string()),
    }
}
