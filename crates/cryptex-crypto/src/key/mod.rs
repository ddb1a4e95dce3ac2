//! Key objects.
//!
//! A [`Key`] is created empty by [`Key::init`] with a type, flags, and size.
//! Material is attached exactly once, by [`Key::import`], [`Key::generate`],
//! or [`Key::generate_pair`]. Attaching twice fails with
//! [`CryptoError::MaterialAttached`]; using a key before anything is attached
//! fails with [`CryptoError::NoKeyMaterial`].

pub mod data;

use cryptex_proto::{KeyFamily, KeyFlags, KeyType};
use num_bigint_dig::{BigUint, RandPrime};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    traits::{PrivateKeyParts, PublicKeyParts},
};
use zeroize::{Zeroize, Zeroizing};

use crate::{CryptoError, Drbg, Result};

/// Largest RSA or DH modulus accepted, in bits
pub const MAX_MODULUS_BITS: u32 = 4096;

/// Smallest RSA modulus accepted, in bits
pub const MIN_RSA_BITS: u32 = 512;

/// Smallest DH modulus accepted, in bits
pub const MIN_DH_BITS: u32 = 64;

/// DH domain parameters.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct DhParams {
    pub(crate) p: BigUint,
    pub(crate) g: BigUint,
}

/// DH private value with its domain.
#[derive(Clone)]
pub(crate) struct DhPrivate {
    pub(crate) params: DhParams,
    pub(crate) x: BigUint,
}

impl Drop for DhPrivate {
    fn drop(&mut self) {
        self.x.zeroize();
    }
}

/// DH public value with its domain.
#[derive(Clone)]
pub(crate) struct DhPublic {
    pub(crate) params: DhParams,
    pub(crate) gx: BigUint,
}

/// Parsed key material.
#[derive(Clone)]
pub(crate) enum KeyMaterial {
    Aes(Zeroizing<Vec<u8>>),
    RsaPrv(RsaPrivateKey),
    RsaPub(RsaPublicKey),
    DhPrv(DhPrivate),
    DhPub(DhPublic),
    EcPrv(p256::SecretKey),
    EcPub(p256::PublicKey),
}

/// A typed key slot, possibly holding material.
#[derive(Clone)]
pub struct Key {
    key_type: KeyType,
    flags: KeyFlags,
    len_bits: u32,
    material: Option<KeyMaterial>,
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("key_type", &self.key_type)
            .field("flags", &self.flags)
            .field("len_bits", &self.len_bits)
            .field("has_material", &self.material.is_some())
            .finish()
    }
}

impl Key {
    /// Allocate an empty key slot.
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidParameter` if `len_bits` is outside the range
    /// supported for `key_type`.
    pub fn init(key_type: KeyType, flags: KeyFlags, len_bits: u32) -> Result<Self> {
        let supported = match key_type.family() {
            KeyFamily::Aes => matches!(len_bits, 128 | 192 | 256),
            KeyFamily::Rsa => (MIN_RSA_BITS..=MAX_MODULUS_BITS).contains(&len_bits),
            KeyFamily::Dh => (MIN_DH_BITS..=MAX_MODULUS_BITS).contains(&len_bits),
            KeyFamily::Secp256r1 => len_bits == 256,
        };
        if !supported {
            return Err(CryptoError::invalid("key size outside supported range"));
        }
        Ok(Self { key_type, flags, len_bits, material: None })
    }

    /// Key type fixed at init.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Flags fixed at init.
    pub fn flags(&self) -> KeyFlags {
        self.flags
    }

    /// Size in bits fixed at init.
    pub fn len_bits(&self) -> u32 {
        self.len_bits
    }

    /// Whether material has been attached.
    pub fn has_material(&self) -> bool {
        self.material.is_some()
    }

    pub(crate) fn material(&self) -> Result<&KeyMaterial> {
        self.material.as_ref().ok_or(CryptoError::NoKeyMaterial)
    }

    /// Attach material from its encoded form (see [`data`]).
    ///
    /// # Errors
    ///
    /// - `CryptoError::MaterialAttached` if material is already present
    /// - `CryptoError::InvalidParameter` if the data is empty, malformed, or
    ///   does not match the slot's size
    pub fn import(&mut self, encoded: &[u8]) -> Result<()> {
        if self.material.is_some() {
            return Err(CryptoError::MaterialAttached);
        }
        if encoded.is_empty() {
            return Err(CryptoError::invalid("empty key data"));
        }

        let material = match self.key_type {
            KeyType::Aes => {
                if encoded.len() * 8 != self.len_bits as usize {
                    return Err(CryptoError::invalid("AES key length does not match size"));
                }
                KeyMaterial::Aes(Zeroizing::new(encoded.to_vec()))
            },
            KeyType::RsaPub => {
                let parts = data::decode(encoded, 2)?;
                let n = self.modulus(&parts[0])?;
                let key = RsaPublicKey::new(n, BigUint::from_bytes_be(&parts[1]))
                    .map_err(|_| CryptoError::invalid("malformed RSA public key"))?;
                KeyMaterial::RsaPub(key)
            },
            KeyType::RsaPrv => {
                let parts = data::decode(encoded, 5)?;
                let n = self.modulus(&parts[0])?;
                let [e, d, p, q] =
                    [&parts[1], &parts[2], &parts[3], &parts[4]].map(|c| BigUint::from_bytes_be(c));
                let key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
                    .map_err(|_| CryptoError::invalid("malformed RSA private key"))?;
                key.validate().map_err(|_| CryptoError::invalid("inconsistent RSA private key"))?;
                KeyMaterial::RsaPrv(key)
            },
            KeyType::DhPub => {
                let parts = data::decode(encoded, 3)?;
                let params = self.dh_params(&parts[0], &parts[1])?;
                let gx = BigUint::from_bytes_be(&parts[2]);
                if !in_open_range(&gx, &params.p) {
                    return Err(CryptoError::invalid("DH public value out of range"));
                }
                KeyMaterial::DhPub(DhPublic { params, gx })
            },
            KeyType::DhPrv => {
                let parts = data::decode(encoded, 3)?;
                let params = self.dh_params(&parts[0], &parts[1])?;
                let x = BigUint::from_bytes_be(&parts[2]);
                if !in_open_range(&x, &params.p) {
                    return Err(CryptoError::invalid("DH private value out of range"));
                }
                KeyMaterial::DhPrv(DhPrivate { params, x })
            },
            KeyType::Secp256r1Pub => {
                let parts = data::decode(encoded, 2)?;
                let mut sec1 = Vec::with_capacity(65);
                sec1.push(0x04);
                sec1.extend_from_slice(&left_pad::<32>(&parts[0])?);
                sec1.extend_from_slice(&left_pad::<32>(&parts[1])?);
                let point = p256::PublicKey::from_sec1_bytes(&sec1)
                    .map_err(|_| CryptoError::invalid("point not on secp256r1"))?;
                KeyMaterial::EcPub(point)
            },
            KeyType::Secp256r1Prv => {
                let parts = data::decode(encoded, 1)?;
                let scalar = Zeroizing::new(left_pad::<32>(&parts[0])?);
                let secret = p256::SecretKey::from_slice(scalar.as_slice())
                    .map_err(|_| CryptoError::invalid("invalid secp256r1 scalar"))?;
                KeyMaterial::EcPrv(secret)
            },
        };

        self.material = Some(material);
        Ok(())
    }

    /// Attach freshly generated symmetric material.
    ///
    /// # Errors
    ///
    /// - `CryptoError::NotSupported` for asymmetric types (use
    ///   [`Key::generate_pair`])
    /// - `CryptoError::MaterialAttached` if material is already present
    pub fn generate(&mut self, rng: &mut Drbg) -> Result<()> {
        if !self.key_type.is_symmetric() {
            return Err(CryptoError::NotSupported { what: "generate for asymmetric key types" });
        }
        if self.material.is_some() {
            return Err(CryptoError::MaterialAttached);
        }
        let mut bytes = Zeroizing::new(vec![0u8; self.len_bits as usize / 8]);
        rng.fill_bytes(&mut bytes);
        self.material = Some(KeyMaterial::Aes(bytes));
        Ok(())
    }

    /// Attach a freshly generated key pair to two empty slots.
    ///
    /// # Errors
    ///
    /// - `CryptoError::NotSupported` unless `private` has a private type and
    ///   `public` a public type
    /// - `CryptoError::InvalidParameter` if the families or sizes differ
    /// - `CryptoError::MaterialAttached` if either slot already has material
    pub fn generate_pair(private: &mut Self, public: &mut Self, rng: &mut Drbg) -> Result<()> {
        if !private.key_type.is_private() || !public.key_type.is_public() {
            return Err(CryptoError::NotSupported { what: "key pair roles" });
        }
        if private.key_type.family() != public.key_type.family() {
            return Err(CryptoError::invalid("key pair families differ"));
        }
        if private.len_bits != public.len_bits {
            return Err(CryptoError::invalid("key pair sizes differ"));
        }
        if private.material.is_some() || public.material.is_some() {
            return Err(CryptoError::MaterialAttached);
        }

        let bits = private.len_bits as usize;
        let (prv, publ) = match private.key_type.family() {
            KeyFamily::Rsa => {
                let key = RsaPrivateKey::new(rng, bits)
                    .map_err(|e| CryptoError::Backend(e.to_string()))?;
                let public_key = key.to_public_key();
                (KeyMaterial::RsaPrv(key), KeyMaterial::RsaPub(public_key))
            },
            KeyFamily::Dh => {
                let p = rng.gen_prime(bits);
                let g = BigUint::from(2u32);
                let x = random_below(rng, &p);
                let gx = g.modpow(&x, &p);
                let params = DhParams { p, g };
                (
                    KeyMaterial::DhPrv(DhPrivate { params: params.clone(), x }),
                    KeyMaterial::DhPub(DhPublic { params, gx }),
                )
            },
            KeyFamily::Secp256r1 => {
                let secret = p256::SecretKey::random(rng);
                let point = secret.public_key();
                (KeyMaterial::EcPrv(secret), KeyMaterial::EcPub(point))
            },
            KeyFamily::Aes => return Err(CryptoError::NotSupported { what: "key pair roles" }),
        };

        private.material = Some(prv);
        public.material = Some(publ);
        Ok(())
    }

    /// Encoded size of the material, as [`Key::export`] would write it.
    ///
    /// # Errors
    ///
    /// Same gating as [`Key::export`], minus the buffer check.
    pub fn export_len(&self) -> Result<usize> {
        Ok(self.encoded()?.len())
    }

    /// Write the encoded material into `out`, returning the length written.
    ///
    /// # Errors
    ///
    /// - `CryptoError::AccessDenied` unless the key is raw-exportable
    /// - `CryptoError::NoKeyMaterial` if nothing is attached
    /// - `CryptoError::BufferTooSmall` if `out` is too short (nothing is
    ///   written)
    pub fn export(&self, out: &mut [u8]) -> Result<usize> {
        let encoded = self.encoded()?;
        CryptoError::check_output(encoded.len(), out.len())?;
        out[..encoded.len()].copy_from_slice(&encoded);
        Ok(encoded.len())
    }

    /// Raw symmetric key bytes, bypassing export flags. Used by the key store,
    /// which persists keys on behalf of the owner.
    pub fn symmetric_bytes(&self) -> Result<&[u8]> {
        match self.material()? {
            KeyMaterial::Aes(bytes) => Ok(bytes.as_slice()),
            _ => Err(CryptoError::invalid("not a symmetric key")),
        }
    }

    fn encoded(&self) -> Result<Zeroizing<Vec<u8>>> {
        if !self.flags.contains(KeyFlags::EXPORTABLE_RAW) {
            return Err(CryptoError::AccessDenied { reason: "key is not exportable" });
        }

        match self.material()? {
            KeyMaterial::Aes(bytes) => Ok(bytes.clone()),
            KeyMaterial::RsaPub(key) => data::rsa_public(&key.n().to_bytes_be(), &key.e().to_bytes_be()),
            KeyMaterial::RsaPrv(key) => {
                let primes = key.primes();
                if primes.len() != 2 {
                    return Err(CryptoError::NotSupported { what: "multi-prime RSA export" });
                }
                let d = Zeroizing::new(key.d().to_bytes_be());
                let p = Zeroizing::new(primes[0].to_bytes_be());
                let q = Zeroizing::new(primes[1].to_bytes_be());
                data::rsa_private(&key.n().to_bytes_be(), &key.e().to_bytes_be(), &d, &p, &q)
            },
            KeyMaterial::DhPub(key) => data::dh_public(
                &key.params.p.to_bytes_be(),
                &key.params.g.to_bytes_be(),
                &key.gx.to_bytes_be(),
            ),
            KeyMaterial::DhPrv(key) => {
                let x = Zeroizing::new(key.x.to_bytes_be());
                data::dh_private(&key.params.p.to_bytes_be(), &key.params.g.to_bytes_be(), &x)
            },
            KeyMaterial::EcPub(point) => {
                let encoded = point.to_encoded_point(false);
                match (encoded.x(), encoded.y()) {
                    (Some(x), Some(y)) => data::secp256r1_public(x, y),
                    _ => Err(CryptoError::Backend("identity point".to_string())),
                }
            },
            KeyMaterial::EcPrv(secret) => {
                let scalar = Zeroizing::new(secret.to_bytes().to_vec());
                data::secp256r1_private(&scalar)
            },
        }
    }

    fn modulus(&self, bytes: &[u8]) -> Result<BigUint> {
        let n = BigUint::from_bytes_be(bytes);
        if n.bits() != self.len_bits as usize {
            return Err(CryptoError::invalid("modulus size does not match key size"));
        }
        Ok(n)
    }

    fn dh_params(&self, p: &[u8], g: &[u8]) -> Result<DhParams> {
        let p = self.modulus(p)?;
        let g = BigUint::from_bytes_be(g);
        if !in_open_range(&g, &p) {
            return Err(CryptoError::invalid("DH generator out of range"));
        }
        Ok(DhParams { p, g })
    }
}

/// `1 < value < p - 1`
fn in_open_range(value: &BigUint, p: &BigUint) -> bool {
    let one = BigUint::from(1u32);
    let upper = p - &one;
    *value > one && *value < upper
}

/// Uniform-ish value in `[2, p - 2]`.
fn random_below(rng: &mut Drbg, p: &BigUint) -> BigUint {
    let mut bytes = Zeroizing::new(vec![0u8; p.to_bytes_be().len() + 8]);
    rng.fill_bytes(&mut bytes);
    let span = p - &BigUint::from(3u32);
    (BigUint::from_bytes_be(&bytes) % &span) + BigUint::from(2u32)
}

fn left_pad<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    if bytes.len() > N {
        return Err(CryptoError::invalid("coordinate too long"));
    }
    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> Drbg {
        Drbg::from_seed([9; 32])
    }

    #[test]
    fn init_rejects_sizes_outside_range() {
        let flags = KeyFlags::NONE;
        assert!(Key::init(KeyType::Aes, flags, 128).is_ok());
        assert!(Key::init(KeyType::Aes, flags, 192).is_ok());
        assert!(Key::init(KeyType::Aes, flags, 256).is_ok());
        assert!(matches!(
            Key::init(KeyType::Aes, flags, 666),
            Err(CryptoError::InvalidParameter { .. })
        ));
        assert!(Key::init(KeyType::RsaPrv, flags, 11).is_err());
        assert!(Key::init(KeyType::RsaPrv, flags, 9999).is_err());
        assert!(Key::init(KeyType::Secp256r1Prv, flags, 255).is_err());
        assert!(Key::init(KeyType::DhPrv, flags, 101).is_ok());
    }

    #[test]
    fn aes_import_checks_length_and_attaches_once() {
        let mut key = Key::init(KeyType::Aes, KeyFlags::EXPORTABLE_RAW, 128).unwrap_or_else(|_| unreachable!());
        assert!(matches!(key.import(&[0u8; 15]), Err(CryptoError::InvalidParameter { .. })));
        assert!(matches!(key.import(&[]), Err(CryptoError::InvalidParameter { .. })));
        assert!(key.import(&[7u8; 16]).is_ok());
        assert_eq!(key.import(&[7u8; 16]), Err(CryptoError::MaterialAttached));

        let mut out = [0u8; 16];
        assert_eq!(key.export(&mut out), Ok(16));
        assert_eq!(out, [7u8; 16]);
    }

    #[test]
    fn export_gating_order() {
        let empty_locked = Key::init(KeyType::Aes, KeyFlags::NONE, 128).unwrap_or_else(|_| unreachable!());
        assert!(matches!(empty_locked.export(&mut [0; 16]), Err(CryptoError::AccessDenied { .. })));

        let empty_open = Key::init(KeyType::Aes, KeyFlags::EXPORTABLE_RAW, 128).unwrap_or_else(|_| unreachable!());
        assert_eq!(empty_open.export(&mut [0; 16]), Err(CryptoError::NoKeyMaterial));

        let mut key = empty_open;
        key.generate(&mut rng()).unwrap_or_else(|_| unreachable!());
        let mut short = [0xaa; 15];
        assert!(matches!(key.export(&mut short), Err(CryptoError::BufferTooSmall { .. })));
        assert_eq!(short, [0xaa; 15]);
    }

    #[test]
    fn generate_is_symmetric_only() {
        let mut key = Key::init(KeyType::RsaPrv, KeyFlags::NONE, 1024).unwrap_or_else(|_| unreachable!());
        assert!(matches!(key.generate(&mut rng()), Err(CryptoError::NotSupported { .. })));

        let mut aes = Key::init(KeyType::Aes, KeyFlags::NONE, 256).unwrap_or_else(|_| unreachable!());
        assert!(aes.generate(&mut rng()).is_ok());
        assert_eq!(aes.generate(&mut rng()), Err(CryptoError::MaterialAttached));
    }

    #[test]
    fn generate_pair_role_checks() {
        let init = |t, bits| Key::init(t, KeyFlags::NONE, bits).unwrap_or_else(|_| unreachable!());
        let mut rng = rng();

        let (mut prv, mut publ) = (init(KeyType::RsaPrv, 1024), init(KeyType::DhPub, 1024));
        assert!(matches!(
            Key::generate_pair(&mut prv, &mut publ, &mut rng),
            Err(CryptoError::InvalidParameter { .. })
        ));

        let (mut a, mut b) = (init(KeyType::Secp256r1Pub, 256), init(KeyType::Secp256r1Prv, 256));
        assert!(matches!(
            Key::generate_pair(&mut a, &mut b, &mut rng),
            Err(CryptoError::NotSupported { .. })
        ));

        let (mut a, mut b) = (init(KeyType::DhPub, 256), init(KeyType::DhPub, 256));
        assert!(matches!(
            Key::generate_pair(&mut a, &mut b, &mut rng),
            Err(CryptoError::NotSupported { .. })
        ));

        let (mut prv, mut publ) = (init(KeyType::Secp256r1Prv, 256), init(KeyType::Secp256r1Pub, 256));
        assert!(Key::generate_pair(&mut prv, &mut publ, &mut rng).is_ok());
        assert!(prv.has_material() && publ.has_material());
        assert_eq!(
            Key::generate_pair(&mut prv, &mut publ, &mut rng),
            Err(CryptoError::MaterialAttached)
        );
    }

    #[test]
    fn generated_dh_pair_is_consistent() {
        let flags = KeyFlags::EXPORTABLE_RAW;
        let mut prv = Key::init(KeyType::DhPrv, flags, 128).unwrap_or_else(|_| unreachable!());
        let mut publ = Key::init(KeyType::DhPub, flags, 128).unwrap_or_else(|_| unreachable!());
        Key::generate_pair(&mut prv, &mut publ, &mut rng()).unwrap_or_else(|_| unreachable!());

        let (Ok(KeyMaterial::DhPrv(x)), Ok(KeyMaterial::DhPub(y))) = (prv.material(), publ.material())
        else {
            unreachable!("pair generated above")
        };
        assert_eq!(x.params.p.bits(), 128);
        assert!(x.params == y.params);
        assert!(x.params.g.modpow(&x.x, &x.params.p) == y.gx);
    }

    #[test]
    fn ec_round_trip_through_export() {
        let flags = KeyFlags::EXPORTABLE_RAW;
        let mut prv = Key::init(KeyType::Secp256r1Prv, flags, 256).unwrap_or_else(|_| unreachable!());
        let mut publ = Key::init(KeyType::Secp256r1Pub, flags, 256).unwrap_or_else(|_| unreachable!());
        Key::generate_pair(&mut prv, &mut publ, &mut rng()).unwrap_or_else(|_| unreachable!());

        let mut buf = [0u8; 128];
        let len = publ.export(&mut buf).unwrap_or_else(|_| unreachable!());
        let mut copy = Key::init(KeyType::Secp256r1Pub, flags, 256).unwrap_or_else(|_| unreachable!());
        assert!(copy.import(&buf[..len]).is_ok());
    }

    #[test]
    fn invalid_curve_point_rejected() {
        let mut key = Key::init(KeyType::Secp256r1Pub, KeyFlags::NONE, 256).unwrap_or_else(|_| unreachable!());
        let data = data::secp256r1_public(&[1; 32], &[2; 32]).unwrap_or_else(|_| unreachable!());
        assert!(matches!(key.import(&data), Err(CryptoError::InvalidParameter { .. })));
    }
}
