//! Symmetric cipher sessions.
//!
//! ```text
//! GCM:      AwaitingAd --update_ad--> AwaitingAd
//!           AwaitingAd --update--> Streaming --update--> Streaming
//!           {AwaitingAd, Streaming} --finalize (enc) / verify_tag (dec)--> Finalized
//! ECB, CBC: Streaming --update--> Streaming --finalize--> Finalized
//! any       --close--> Closed
//! ```
//!
//! Block modes take whole blocks only and never pad. GCM takes arbitrary
//! lengths. Output buffers must be at least as long as the input; on any error
//! nothing is written and the session state is unchanged, except that a failed
//! tag verification still finalizes the session.

mod block;
mod gcm;

pub use block::BLOCK_SIZE;
pub use gcm::{NONCE_LEN, TAG_LEN};

use cryptex_proto::{CipherAlgorithm, CipherMode, KeyFlags, KeyType};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use self::{block::AesBlock, gcm::Gcm};
use crate::{CryptoError, Key, Result};

enum Engine {
    Ecb(AesBlock),
    Cbc { block: AesBlock, chain: [u8; BLOCK_SIZE] },
    Gcm(Box<Gcm>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CipherState {
    AwaitingAd,
    Streaming,
    Finalized,
    Closed,
}

impl CipherState {
    fn name(self) -> &'static str {
        match self {
            Self::AwaitingAd => "AwaitingAd",
            Self::Streaming => "Streaming",
            Self::Finalized => "Finalized",
            Self::Closed => "Closed",
        }
    }

    fn is_active(self) -> bool {
        matches!(self, Self::AwaitingAd | Self::Streaming)
    }
}

/// A running cipher computation bound to a copy of one AES key.
pub struct CipherSession {
    algorithm: CipherAlgorithm,
    mode: CipherMode,
    state: CipherState,
    engine: Engine,
}

impl std::fmt::Debug for CipherSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherSession")
            .field("algorithm", &self.algorithm)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl CipherSession {
    /// Bind `key` and start a session.
    ///
    /// `iv` must be empty for ECB, 16 bytes for CBC, and a 12-byte nonce for
    /// GCM.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidParameter` for a non-AES key or a wrong IV length
    /// - `CryptoError::NoKeyMaterial` if the key is empty
    /// - `CryptoError::AccessDenied` if the key lacks the cipher flag
    pub fn init(algorithm: CipherAlgorithm, mode: CipherMode, key: &Key, iv: &[u8]) -> Result<Self> {
        if key.key_type() != KeyType::Aes {
            return Err(CryptoError::invalid("cipher requires an AES key"));
        }
        let key_bytes = key.symmetric_bytes()?;
        if !key.flags().contains(KeyFlags::IS_ALGO_CIPHER) {
            return Err(CryptoError::AccessDenied { reason: "key is not a cipher key" });
        }

        let block = AesBlock::new(key_bytes)?;
        let (engine, state) = match algorithm {
            CipherAlgorithm::AesEcb => {
                if !iv.is_empty() {
                    return Err(CryptoError::invalid("ECB takes no IV"));
                }
                (Engine::Ecb(block), CipherState::Streaming)
            },
            CipherAlgorithm::AesCbc => {
                let chain: [u8; BLOCK_SIZE] =
                    iv.try_into().map_err(|_| CryptoError::invalid("CBC IV must be 16 bytes"))?;
                (Engine::Cbc { block, chain }, CipherState::Streaming)
            },
            CipherAlgorithm::AesGcm => {
                (Engine::Gcm(Box::new(Gcm::new(block, iv)?)), CipherState::AwaitingAd)
            },
        };

        Ok(Self { algorithm, mode, state, engine })
    }

    /// Algorithm fixed at init.
    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }

    /// Direction fixed at init.
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Absorb associated data. GCM only, before the first [`Self::update`].
    ///
    /// # Errors
    ///
    /// - `CryptoError::NotSupported` for non-AEAD algorithms
    /// - `CryptoError::InvalidState` once data has been processed
    pub fn update_ad(&mut self, ad: &[u8]) -> Result<()> {
        let Engine::Gcm(gcm) = &mut self.engine else {
            return Err(CryptoError::NotSupported { what: "associated data without AEAD" });
        };
        if self.state != CipherState::AwaitingAd {
            return Err(CryptoError::InvalidState {
                state: self.state.name(),
                operation: "update_ad",
            });
        }
        gcm.update_ad(ad);
        Ok(())
    }

    /// Process `input` into `out`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidState` after finalize or close
    /// - `CryptoError::InvalidParameter` for partial blocks in ECB/CBC
    /// - `CryptoError::BufferTooSmall` if `out` is shorter than `input`
    pub fn update(&mut self, input: &[u8], out: &mut [u8]) -> Result<usize> {
        if !self.state.is_active() {
            return Err(CryptoError::InvalidState { state: self.state.name(), operation: "update" });
        }
        if !self.algorithm.is_aead() && input.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::invalid("input must be a multiple of the block size"));
        }
        CryptoError::check_output(input.len(), out.len())?;

        let encrypt = self.mode == CipherMode::Encrypt;
        match &mut self.engine {
            Engine::Ecb(block) => {
                for (src, dst) in input.chunks_exact(BLOCK_SIZE).zip(out.chunks_exact_mut(BLOCK_SIZE)) {
                    let mut buf = [0u8; BLOCK_SIZE];
                    buf.copy_from_slice(src);
                    if encrypt {
                        block.encrypt(&mut buf);
                    } else {
                        block.decrypt(&mut buf);
                    }
                    dst.copy_from_slice(&buf);
                    buf.zeroize();
                }
            },
            Engine::Cbc { block, chain } => {
                for (src, dst) in input.chunks_exact(BLOCK_SIZE).zip(out.chunks_exact_mut(BLOCK_SIZE)) {
                    let mut buf = [0u8; BLOCK_SIZE];
                    buf.copy_from_slice(src);
                    if encrypt {
                        xor_in_place(&mut buf, chain);
                        block.encrypt(&mut buf);
                        *chain = buf;
                    } else {
                        block.decrypt(&mut buf);
                        xor_in_place(&mut buf, chain);
                        chain.copy_from_slice(src);
                    }
                    dst.copy_from_slice(&buf);
                    buf.zeroize();
                }
            },
            Engine::Gcm(gcm) => gcm.apply(encrypt, input, out),
        }

        self.state = CipherState::Streaming;
        Ok(input.len())
    }

    /// Finish the stream.
    ///
    /// For GCM encryption this writes the 16-byte tag into `out`. Block modes
    /// write nothing. GCM decryption must finish with [`Self::verify_tag`]
    /// instead.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidState` after finalize or close, or on a GCM
    ///   decrypt session
    /// - `CryptoError::BufferTooSmall` if `out` cannot hold the tag
    pub fn finalize(&mut self, out: &mut [u8]) -> Result<usize> {
        if !self.state.is_active() {
            return Err(CryptoError::InvalidState {
                state: self.state.name(),
                operation: "finalize",
            });
        }

        let written = match &mut self.engine {
            Engine::Gcm(gcm) => {
                if self.mode == CipherMode::Decrypt {
                    return Err(CryptoError::InvalidState {
                        state: self.state.name(),
                        operation: "finalize a GCM decryption (use verify_tag)",
                    });
                }
                CryptoError::check_output(TAG_LEN, out.len())?;
                out[..TAG_LEN].copy_from_slice(&gcm.tag());
                TAG_LEN
            },
            Engine::Ecb(_) | Engine::Cbc { .. } => 0,
        };

        self.state = CipherState::Finalized;
        Ok(written)
    }

    /// Check the tag of a GCM decryption. The session is finalized whatever
    /// the outcome.
    ///
    /// # Errors
    ///
    /// - `CryptoError::NotSupported` for non-AEAD algorithms
    /// - `CryptoError::InvalidState` on an encrypt session, or after finalize
    ///   or close
    /// - `CryptoError::InvalidParameter` if `tag` is not 16 bytes
    /// - `CryptoError::AuthenticationFailed` on mismatch
    pub fn verify_tag(&mut self, tag: &[u8]) -> Result<()> {
        let Engine::Gcm(gcm) = &mut self.engine else {
            return Err(CryptoError::NotSupported { what: "tag verification without AEAD" });
        };
        if self.mode != CipherMode::Decrypt || !self.state.is_active() {
            return Err(CryptoError::InvalidState {
                state: self.state.name(),
                operation: "verify_tag",
            });
        }
        if tag.len() != TAG_LEN {
            return Err(CryptoError::invalid("GCM tag must be 16 bytes"));
        }

        let expected = gcm.tag();
        self.state = CipherState::Finalized;
        if bool::from(expected.ct_eq(tag)) {
            Ok(())
        } else {
            Err(CryptoError::AuthenticationFailed)
        }
    }

    /// Release the session.
    pub fn close(&mut self) {
        self.state = CipherState::Closed;
    }
}

fn xor_in_place(dst: &mut [u8; BLOCK_SIZE], src: &[u8; BLOCK_SIZE]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}
