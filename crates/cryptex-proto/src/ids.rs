//! Numeric identifiers for algorithms, key types, and key flags.
//!
//! Every identifier that travels in a call header has a `from_id` parser.
//! Unknown algorithm or key-type IDs fail with [`ErrorCode::NotSupported`];
//! unknown flag bits fail with [`ErrorCode::InvalidParameter`].

use std::ops::BitOr;

use crate::ErrorCode;

/// Message digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// No digest. Only meaningful as a signature tag for pre-hashed input.
    None,
    /// MD5 (16-byte output)
    Md5,
    /// SHA-256 (32-byte output)
    Sha256,
}

impl DigestAlgorithm {
    /// Wire identifier.
    pub fn id(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Md5 => 1,
            Self::Sha256 => 2,
        }
    }

    /// Parse a wire identifier.
    pub fn from_id(id: u32) -> Result<Self, ErrorCode> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Md5),
            2 => Ok(Self::Sha256),
            _ => Err(ErrorCode::NotSupported),
        }
    }

    /// Output size in bytes (0 for [`DigestAlgorithm::None`]).
    pub fn output_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Md5 => 16,
            Self::Sha256 => 32,
        }
    }
}

/// Symmetric cipher algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    /// AES in electronic codebook mode, no padding
    AesEcb,
    /// AES in cipher block chaining mode, no padding
    AesCbc,
    /// AES in Galois/counter mode (AEAD)
    AesGcm,
}

impl CipherAlgorithm {
    /// Wire identifier.
    pub fn id(self) -> u32 {
        match self {
            Self::AesEcb => 1,
            Self::AesCbc => 2,
            Self::AesGcm => 3,
        }
    }

    /// Parse a wire identifier.
    pub fn from_id(id: u32) -> Result<Self, ErrorCode> {
        match id {
            1 => Ok(Self::AesEcb),
            2 => Ok(Self::AesCbc),
            3 => Ok(Self::AesGcm),
            _ => Err(ErrorCode::NotSupported),
        }
    }

    /// Whether this is an authenticated mode.
    pub fn is_aead(self) -> bool {
        self == Self::AesGcm
    }
}

/// Direction of a cipher session, fixed at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    /// Plaintext in, ciphertext out
    Encrypt,
    /// Ciphertext in, plaintext out
    Decrypt,
}

impl CipherMode {
    /// Wire identifier.
    pub fn id(self) -> u32 {
        match self {
            Self::Encrypt => 1,
            Self::Decrypt => 2,
        }
    }

    /// Parse a wire identifier.
    pub fn from_id(id: u32) -> Result<Self, ErrorCode> {
        match id {
            1 => Ok(Self::Encrypt),
            2 => Ok(Self::Decrypt),
            _ => Err(ErrorCode::InvalidParameter),
        }
    }
}

/// Signature schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5
    RsaPkcs1,
}

impl SignatureAlgorithm {
    /// Wire identifier.
    pub fn id(self) -> u32 {
        match self {
            Self::RsaPkcs1 => 1,
        }
    }

    /// Parse a wire identifier.
    pub fn from_id(id: u32) -> Result<Self, ErrorCode> {
        match id {
            1 => Ok(Self::RsaPkcs1),
            _ => Err(ErrorCode::NotSupported),
        }
    }
}

/// Key agreement schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgreementAlgorithm {
    /// Finite-field Diffie-Hellman
    Dh,
    /// Elliptic-curve Diffie-Hellman over secp256r1
    Ecdh,
}

impl AgreementAlgorithm {
    /// Wire identifier.
    pub fn id(self) -> u32 {
        match self {
            Self::Dh => 1,
            Self::Ecdh => 2,
        }
    }

    /// Parse a wire identifier.
    pub fn from_id(id: u32) -> Result<Self, ErrorCode> {
        match id {
            1 => Ok(Self::Dh),
            2 => Ok(Self::Ecdh),
            _ => Err(ErrorCode::NotSupported),
        }
    }

    /// Private key type this algorithm binds at init.
    pub fn private_key_type(self) -> KeyType {
        match self {
            Self::Dh => KeyType::DhPrv,
            Self::Ecdh => KeyType::Secp256r1Prv,
        }
    }

    /// Public key type expected from the peer.
    pub fn public_key_type(self) -> KeyType {
        match self {
            Self::Dh => KeyType::DhPub,
            Self::Ecdh => KeyType::Secp256r1Pub,
        }
    }
}

/// Algorithm family a key type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// Symmetric AES keys
    Aes,
    /// RSA key pairs
    Rsa,
    /// Finite-field DH key pairs
    Dh,
    /// secp256r1 key pairs
    Secp256r1,
}

/// Key object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// AES secret key
    Aes,
    /// RSA private key
    RsaPrv,
    /// RSA public key
    RsaPub,
    /// DH private key
    DhPrv,
    /// DH public key
    DhPub,
    /// secp256r1 private key
    Secp256r1Prv,
    /// secp256r1 public key
    Secp256r1Pub,
}

impl KeyType {
    /// Wire identifier.
    pub fn id(self) -> u32 {
        match self {
            Self::Aes => 1,
            Self::RsaPrv => 2,
            Self::RsaPub => 3,
            Self::DhPrv => 4,
            Self::DhPub => 5,
            Self::Secp256r1Prv => 6,
            Self::Secp256r1Pub => 7,
        }
    }

    /// Parse a wire identifier.
    pub fn from_id(id: u32) -> Result<Self, ErrorCode> {
        match id {
            1 => Ok(Self::Aes),
            2 => Ok(Self::RsaPrv),
            3 => Ok(Self::RsaPub),
            4 => Ok(Self::DhPrv),
            5 => Ok(Self::DhPub),
            6 => Ok(Self::Secp256r1Prv),
            7 => Ok(Self::Secp256r1Pub),
            _ => Err(ErrorCode::NotSupported),
        }
    }

    /// Family this type belongs to.
    pub fn family(self) -> KeyFamily {
        match self {
            Self::Aes => KeyFamily::Aes,
            Self::RsaPrv | Self::RsaPub => KeyFamily::Rsa,
            Self::DhPrv | Self::DhPub => KeyFamily::Dh,
            Self::Secp256r1Prv | Self::Secp256r1Pub => KeyFamily::Secp256r1,
        }
    }

    /// Private half of an asymmetric pair.
    pub fn is_private(self) -> bool {
        matches!(self, Self::RsaPrv | Self::DhPrv | Self::Secp256r1Prv)
    }

    /// Public half of an asymmetric pair.
    pub fn is_public(self) -> bool {
        matches!(self, Self::RsaPub | Self::DhPub | Self::Secp256r1Pub)
    }

    /// Symmetric secret key.
    pub fn is_symmetric(self) -> bool {
        self == Self::Aes
    }
}

/// Key usage and export flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyFlags(u32);

impl KeyFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Key may be bound to a cipher session
    pub const IS_ALGO_CIPHER: Self = Self(0x1);
    /// Key material may be exported in the clear
    pub const EXPORTABLE_RAW: Self = Self(0x2);
    /// Key material may be exported wrapped under another key
    pub const EXPORTABLE_WRAPPED: Self = Self(0x4);

    const ALL: u32 = 0x7;

    /// Parse a wire bitmask, rejecting unknown bits.
    pub fn from_bits(bits: u32) -> Result<Self, ErrorCode> {
        if bits & !Self::ALL != 0 {
            return Err(ErrorCode::InvalidParameter);
        }
        Ok(Self(bits))
    }

    /// Raw bitmask.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for KeyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
