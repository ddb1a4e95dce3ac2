//! AES block primitive over the three key sizes.

use aes::{
    Aes128, Aes192, Aes256,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};

use crate::{CryptoError, Result};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Expanded AES key schedule.
#[derive(Clone)]
pub(crate) enum AesBlock {
    A128(Aes128),
    A192(Aes192),
    A256(Aes256),
}

impl AesBlock {
    pub(crate) fn new(key: &[u8]) -> Result<Self> {
        let invalid = |_| CryptoError::invalid("AES key must be 16, 24 or 32 bytes");
        match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::A128).map_err(invalid),
            24 => Aes192::new_from_slice(key).map(Self::A192).map_err(invalid),
            32 => Aes256::new_from_slice(key).map(Self::A256).map_err(invalid),
            _ => Err(CryptoError::invalid("AES key must be 16, 24 or 32 bytes")),
        }
    }

    pub(crate) fn encrypt(&self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::A128(c) => c.encrypt_block(block),
            Self::A192(c) => c.encrypt_block(block),
            Self::A256(c) => c.encrypt_block(block),
        }
    }

    pub(crate) fn decrypt(&self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::A128(c) => c.decrypt_block(block),
            Self::A192(c) => c.decrypt_block(block),
            Self::A256(c) => c.decrypt_block(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fips197_aes128_vector() {
        let key = hex::decode("000102030405060708090a0b0c0d0e0f").expect("hex");
        let cipher = AesBlock::new(&key).expect("128-bit key");
        let mut block = [0u8; 16];
        block.copy_from_slice(&hex::decode("00112233445566778899aabbccddeeff").expect("hex"));
        cipher.encrypt(&mut block);
        assert_eq!(hex::encode(block), "69c4e0d86a7b0430d8cdb78070b4c55a");
        cipher.decrypt(&mut block);
        assert_eq!(hex::encode(block), "00112233445566778899aabbccddeeff");
    }

    #[test]
    fn odd_key_lengths_rejected() {
        assert!(AesBlock::new(&[0; 17]).is_err());
        assert!(AesBlock::new(&[]).is_err());
    }
}
