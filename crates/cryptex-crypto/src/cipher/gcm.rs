//! Streaming AES-GCM.
//!
//! CTR keystream and GHASH are driven incrementally so `update` can return
//! output for every call. GHASH only ever sees whole blocks until the final
//! flush; partial blocks wait in `pending`.

use ghash::{
    GHash,
    universal_hash::{KeyInit, UniversalHash},
};
use zeroize::Zeroize;

use super::block::{AesBlock, BLOCK_SIZE};
use crate::{CryptoError, Result};

/// GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// GCM tag length in bytes
pub const TAG_LEN: usize = 16;

pub(crate) struct Gcm {
    block: AesBlock,
    ghash: GHash,
    j0: [u8; BLOCK_SIZE],
    counter: [u8; BLOCK_SIZE],
    keystream: [u8; BLOCK_SIZE],
    keystream_used: usize,
    pending: Vec<u8>,
    ad_len: u64,
    text_len: u64,
    ad_done: bool,
}

impl Gcm {
    pub(crate) fn new(block: AesBlock, nonce: &[u8]) -> Result<Self> {
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::invalid("GCM nonce must be 12 bytes"));
        }

        let mut h = [0u8; BLOCK_SIZE];
        block.encrypt(&mut h);
        let ghash = GHash::new(ghash::Key::from_slice(&h));
        h.zeroize();

        let mut j0 = [0u8; BLOCK_SIZE];
        j0[..NONCE_LEN].copy_from_slice(nonce);
        j0[BLOCK_SIZE - 1] = 1;
        let mut counter = j0;
        inc32(&mut counter);

        Ok(Self {
            block,
            ghash,
            j0,
            counter,
            keystream: [0; BLOCK_SIZE],
            keystream_used: BLOCK_SIZE,
            pending: Vec::with_capacity(BLOCK_SIZE),
            ad_len: 0,
            text_len: 0,
            ad_done: false,
        })
    }

    pub(crate) fn update_ad(&mut self, ad: &[u8]) {
        self.absorb(ad);
        self.ad_len += ad.len() as u64;
    }

    /// Encrypt or decrypt `input` into `out[..input.len()]`.
    pub(crate) fn apply(&mut self, encrypt: bool, input: &[u8], out: &mut [u8]) {
        if !self.ad_done {
            self.flush();
            self.ad_done = true;
        }

        if !encrypt {
            self.absorb(input);
        }
        for (dst, src) in out.iter_mut().zip(input) {
            if self.keystream_used == BLOCK_SIZE {
                self.keystream = self.counter;
                self.block.encrypt(&mut self.keystream);
                inc32(&mut self.counter);
                self.keystream_used = 0;
            }
            *dst = src ^ self.keystream[self.keystream_used];
            self.keystream_used += 1;
        }
        if encrypt {
            self.absorb(&out[..input.len()]);
        }
        self.text_len += input.len() as u64;
    }

    /// Authentication tag over everything absorbed so far.
    pub(crate) fn tag(&mut self) -> [u8; TAG_LEN] {
        self.flush();
        let mut lengths = [0u8; BLOCK_SIZE];
        lengths[..8].copy_from_slice(&(self.ad_len * 8).to_be_bytes());
        lengths[8..].copy_from_slice(&(self.text_len * 8).to_be_bytes());
        self.ghash.update_padded(&lengths);

        let mut tag: [u8; TAG_LEN] = self.ghash.clone().finalize().into();
        let mut mask = self.j0;
        self.block.encrypt(&mut mask);
        for (t, m) in tag.iter_mut().zip(mask) {
            *t ^= m;
        }
        mask.zeroize();
        tag
    }

    fn absorb(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        let whole = self.pending.len() / BLOCK_SIZE * BLOCK_SIZE;
        if whole > 0 {
            self.ghash.update_padded(&self.pending[..whole]);
            self.pending.drain(..whole);
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.ghash.update_padded(&self.pending);
            self.pending.clear();
        }
    }
}

impl Drop for Gcm {
    fn drop(&mut self) {
        self.keystream.zeroize();
        self.pending.zeroize();
    }
}

fn inc32(block: &mut [u8; BLOCK_SIZE]) {
    let mut word = [0u8; 4];
    word.copy_from_slice(&block[12..]);
    let next = u32::from_be_bytes(word).wrapping_add(1);
    block[12..].copy_from_slice(&next.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc32_wraps_low_word_only() {
        let mut block = [0xffu8; 16];
        inc32(&mut block);
        assert_eq!(&block[..12], &[0xff; 12]);
        assert_eq!(&block[12..], &[0, 0, 0, 0]);
    }

    #[test]
    fn empty_message_tag_matches_reference() {
        let block = AesBlock::new(b"0123456789ABCDEF").expect("128-bit key");
        let nonce: Vec<u8> = (0..12).collect();
        let mut gcm = Gcm::new(block, &nonce).expect("12-byte nonce");
        assert_eq!(hex::encode(gcm.tag()), "8776dfa52d09eb4a743fd1ea65fbf60f");
    }

    #[test]
    fn nonce_length_enforced() {
        let block = AesBlock::new(&[0; 16]).expect("128-bit key");
        assert!(Gcm::new(block, &[0; 16]).is_err());
    }
}
