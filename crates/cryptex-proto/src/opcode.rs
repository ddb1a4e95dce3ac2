//! Operation codes for the cross-boundary entrypoint.
//!
//! Register conventions: `hN` are the three handle registers of a
//! [`CallHeader`](crate::CallHeader), `aN` the six argument registers, and
//! `lenN` the reply length registers. Inputs listed under "in" are staged back
//! to back in the dataport in the order given.

/// RPC operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// a0 salt len, a1 output capacity; in: salt; out: random bytes
    RandomGetData,

    /// a0 digest algorithm; reply handle
    DigestInit,
    /// h0 session, a0 data len; in: data
    DigestUpdate,
    /// h0 session, a0 data len, a1 output capacity; in: data; out: digest
    DigestFinalize,
    /// h0 session
    DigestClose,

    /// h0 key, a0 cipher algorithm, a1 mode, a2 iv len; in: iv; reply handle
    CipherInit,
    /// h0 session, a0 input len, a1 output capacity; in: input; out: output
    CipherUpdate,
    /// h0 session, a0 ad len; in: associated data
    CipherUpdateAd,
    /// h0 session, a1 output capacity; out: tag or trailing output
    CipherFinalize,
    /// h0 session, a0 tag len; in: tag
    CipherVerifyTag,
    /// h0 session
    CipherClose,

    /// h0 private key (or null), h1 public key (or null), a0 algorithm; reply
    /// handle
    SignatureInit,
    /// h0 session, a0 digest tag, a1 hash len, a2 output capacity; in: hash;
    /// out: signature
    SignatureSign,
    /// h0 session, a0 digest tag, a1 hash len, a2 signature len; in: hash,
    /// signature
    SignatureVerify,
    /// h0 session
    SignatureClose,

    /// h0 private key, a0 algorithm; reply handle
    AgreementInit,
    /// h0 session, h1 peer public key, a0 output capacity; out: shared secret
    AgreementComputeShared,
    /// h0 session
    AgreementClose,

    /// a0 key type, a1 flags, a2 size in bits; reply handle
    KeyInit,
    /// h0 key, h1 wrapping key (or null), a0 data len; in: key data
    KeyImport,
    /// h0 key, h1 wrapping key (or null), a0 output capacity; out: key data
    KeyExport,
    /// h0 key
    KeyGenerate,
    /// h0 private key, h1 public key
    KeyGeneratePair,
    /// h0 key
    KeyClose,

    /// a0 name len, a1 data len, a2 key type, a3 flags, a4 size in bits; in:
    /// name, key bytes; reply handle
    KeyStoreImport,
    /// a0 name len; in: name; reply handle
    KeyStoreGet,
    /// a0 name len; in: name; reply len0 = key size in bytes
    KeyStoreGetSize,
    /// h0 key to close (or null), a0 name len; in: name
    KeyStoreDelete,
    /// a0 name len, a1 key type, a2 flags, a3 size in bits; in: name; reply
    /// handle
    KeyStoreGenerate,
    /// a0 name len; in: name; reply len0 = 1 if present, 0 otherwise
    KeyStoreExists,
}

impl Opcode {
    /// Convert to wire value.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::RandomGetData => 0x0001,
            Self::DigestInit => 0x0010,
            Self::DigestUpdate => 0x0011,
            Self::DigestFinalize => 0x0012,
            Self::DigestClose => 0x0013,
            Self::CipherInit => 0x0020,
            Self::CipherUpdate => 0x0021,
            Self::CipherUpdateAd => 0x0022,
            Self::CipherFinalize => 0x0023,
            Self::CipherVerifyTag => 0x0024,
            Self::CipherClose => 0x0025,
            Self::SignatureInit => 0x0030,
            Self::SignatureSign => 0x0031,
            Self::SignatureVerify => 0x0032,
            Self::SignatureClose => 0x0033,
            Self::AgreementInit => 0x0040,
            Self::AgreementComputeShared => 0x0041,
            Self::AgreementClose => 0x0042,
            Self::KeyInit => 0x0050,
            Self::KeyImport => 0x0051,
            Self::KeyExport => 0x0052,
            Self::KeyGenerate => 0x0053,
            Self::KeyGeneratePair => 0x0054,
            Self::KeyClose => 0x0055,
            Self::KeyStoreImport => 0x0060,
            Self::KeyStoreGet => 0x0061,
            Self::KeyStoreGetSize => 0x0062,
            Self::KeyStoreDelete => 0x0063,
            Self::KeyStoreGenerate => 0x0064,
            Self::KeyStoreExists => 0x0065,
        }
    }

    /// Parse from wire value. `None` if unrecognized.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.to_u16() == value)
    }

    /// Whether the call runs against the key store rather than Crypto Core.
    pub fn is_key_store(self) -> bool {
        matches!(
            self,
            Self::KeyStoreImport
                | Self::KeyStoreGet
                | Self::KeyStoreGetSize
                | Self::KeyStoreDelete
                | Self::KeyStoreGenerate
                | Self::KeyStoreExists
        )
    }

    /// Every opcode, in wire order.
    pub const ALL: [Self; 30] = [
        Self::RandomGetData,
        Self::DigestInit,
        Self::DigestUpdate,
        Self::DigestFinalize,
        Self::DigestClose,
        Self::CipherInit,
        Self::CipherUpdate,
        Self::CipherUpdateAd,
        Self::CipherFinalize,
        Self::CipherVerifyTag,
        Self::CipherClose,
        Self::SignatureInit,
        Self::SignatureSign,
        Self::SignatureVerify,
        Self::SignatureClose,
        Self::AgreementInit,
        Self::AgreementComputeShared,
        Self::AgreementClose,
        Self::KeyInit,
        Self::KeyImport,
        Self::KeyExport,
        Self::KeyGenerate,
        Self::KeyGeneratePair,
        Self::KeyClose,
        Self::KeyStoreImport,
        Self::KeyStoreGet,
        Self::KeyStoreGetSize,
        Self::KeyStoreDelete,
        Self::KeyStoreGenerate,
        Self::KeyStoreExists,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_u16(op.to_u16()), Some(op));
        }
    }

    #[test]
    fn unknown_opcode() {
        assert_eq!(Opcode::from_u16(0xffff), None);
        assert_eq!(Opcode::from_u16(0x0000), None);
    }

    #[test]
    fn key_store_domain() {
        assert!(Opcode::KeyStoreGet.is_key_store());
        assert!(!Opcode::KeyInit.is_key_store());
    }
}
