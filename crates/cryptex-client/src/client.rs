//! Remote binding of [`CryptoApi`] and [`KeyStoreApi`].
//!
//! Each call follows the same four steps:
//!
//! 1. Check what can be checked locally: mandatory inputs are non-empty and
//!    all inputs fit the dataport together. Failures never reach the server.
//! 2. Stage inputs back to back in the dataport from offset 0.
//! 3. Invoke the channel with scalar registers only. Output capacities are
//!    clamped to the dataport.
//! 4. Copy back exactly the lengths the reply reports.

use cryptex_core::{
    ApiResult, CryptoApi, KeyStoreApi,
    validate::{require_input, require_name, require_output},
};
use cryptex_proto::{
    AgreementAlgorithm, AgreementHandle, CallHeader, Channel, CipherAlgorithm, CipherHandle, CipherMode,
    DigestAlgorithm, DigestHandle, ErrorCode, Handle, KeyFlags, KeyHandle, KeyType, Opcode, ReplyHeader,
    SignatureAlgorithm, SignatureHandle,
};
use tracing::debug;

/// Facade binding that forwards every call over a [`Channel`].
#[derive(Debug)]
pub struct RpcClient<C: Channel> {
    channel: C,
}

fn required(data: &[u8], reason: &'static str) -> ApiResult<()> {
    Ok(require_input(data, reason)?)
}

fn optional(key: Option<KeyHandle>) -> Handle {
    key.map_or(Handle::NULL, KeyHandle::handle)
}

fn len_arg(len: usize) -> ApiResult<u32> {
    u32::try_from(len).map_err(|_| ErrorCode::InvalidParameter)
}

impl<C: Channel> RpcClient<C> {
    /// Bind to `channel`.
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Unbind, returning the channel.
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Largest payload one call can carry.
    pub fn capacity(&self) -> usize {
        self.channel.dataport().capacity()
    }

    fn stage(&self, inputs: &[&[u8]]) -> ApiResult<()> {
        let total: usize = inputs.iter().map(|input| input.len()).sum();
        if total > self.capacity() {
            debug!(total, capacity = self.capacity(), "inputs do not fit the dataport");
            return Err(ErrorCode::InvalidParameter);
        }
        self.channel.dataport().write_segments(inputs)
    }

    fn offer(&self, out: &[u8]) -> u32 {
        out.len().min(self.capacity()) as u32
    }

    fn invoke(&mut self, request: &CallHeader) -> ApiResult<ReplyHeader> {
        let reply = self.channel.call(request)?;
        if let Err(code) = reply.code().into_result() {
            debug!(opcode = ?request.opcode(), ?code, "call failed");
            return Err(code);
        }
        Ok(reply)
    }

    fn collect(&self, reply: &ReplyHeader, out: &mut [u8]) -> ApiResult<usize> {
        let len = reply.length(0) as usize;
        if len > out.len() {
            // Server reported more than was offered
            return Err(ErrorCode::Generic);
        }
        let data = self.channel.dataport().read(0, len)?;
        out[..len].copy_from_slice(&data);
        Ok(len)
    }

    fn close(&mut self, opcode: Opcode, handle: Handle) -> ApiResult<()> {
        self.invoke(&CallHeader::new(opcode).with_handle(0, handle))?;
        Ok(())
    }
}

impl<C: Channel> CryptoApi for RpcClient<C> {
    fn get_random_data(&mut self, salt: &[u8], out: &mut [u8]) -> ApiResult<()> {
        require_output(out, "empty random output")?;
        if out.len() > self.capacity() {
            return Err(ErrorCode::InvalidParameter);
        }
        self.stage(&[salt])?;
        let request = CallHeader::new(Opcode::RandomGetData)
            .with_arg(0, len_arg(salt.len())?)
            .with_arg(1, self.offer(out));
        let reply = self.invoke(&request)?;
        if self.collect(&reply, out)? != out.len() {
            return Err(ErrorCode::Generic);
        }
        Ok(())
    }

    fn digest_init(&mut self, algorithm: DigestAlgorithm) -> ApiResult<DigestHandle> {
        let reply = self.invoke(&CallHeader::new(Opcode::DigestInit).with_arg(0, algorithm.id()))?;
        Ok(DigestHandle::from_handle(reply.handle()))
    }

    fn digest_update(&mut self, digest: DigestHandle, data: &[u8]) -> ApiResult<()> {
        required(data, "empty digest input")?;
        self.stage(&[data])?;
        let request = CallHeader::new(Opcode::DigestUpdate)
            .with_handle(0, digest.handle())
            .with_arg(0, len_arg(data.len())?);
        self.invoke(&request)?;
        Ok(())
    }

    fn digest_finalize(&mut self, digest: DigestHandle, data: &[u8], out: &mut [u8]) -> ApiResult<usize> {
        self.stage(&[data])?;
        let request = CallHeader::new(Opcode::DigestFinalize)
            .with_handle(0, digest.handle())
            .with_arg(0, len_arg(data.len())?)
            .with_arg(1, self.offer(out));
        let reply = self.invoke(&request)?;
        self.collect(&reply, out)
    }

    fn digest_close(&mut self, digest: DigestHandle) -> ApiResult<()> {
        self.close(Opcode::DigestClose, digest.handle())
    }

    fn cipher_init(
        &mut self,
        key: KeyHandle,
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        iv: &[u8],
    ) -> ApiResult<CipherHandle> {
        self.stage(&[iv])?;
        let request = CallHeader::new(Opcode::CipherInit)
            .with_handle(0, key.handle())
            .with_arg(0, algorithm.id())
            .with_arg(1, mode.id())
            .with_arg(2, len_arg(iv.len())?);
        let reply = self.invoke(&request)?;
        Ok(CipherHandle::from_handle(reply.handle()))
    }

    fn cipher_update(&mut self, cipher: CipherHandle, input: &[u8], out: &mut [u8]) -> ApiResult<usize> {
        required(input, "empty cipher input")?;
        self.stage(&[input])?;
        let request = CallHeader::new(Opcode::CipherUpdate)
            .with_handle(0, cipher.handle())
            .with_arg(0, len_arg(input.len())?)
            .with_arg(1, self.offer(out));
        let reply = self.invoke(&request)?;
        self.collect(&reply, out)
    }

    fn cipher_update_ad(&mut self, cipher: CipherHandle, ad: &[u8]) -> ApiResult<()> {
        required(ad, "empty associated data")?;
        self.stage(&[ad])?;
        let request = CallHeader::new(Opcode::CipherUpdateAd)
            .with_handle(0, cipher.handle())
            .with_arg(0, len_arg(ad.len())?);
        self.invoke(&request)?;
        Ok(())
    }

    fn cipher_finalize(&mut self, cipher: CipherHandle, out: &mut [u8]) -> ApiResult<usize> {
        let request = CallHeader::new(Opcode::CipherFinalize)
            .with_handle(0, cipher.handle())
            .with_arg(1, self.offer(out));
        let reply = self.invoke(&request)?;
        self.collect(&reply, out)
    }

    fn cipher_verify_tag(&mut self, cipher: CipherHandle, tag: &[u8]) -> ApiResult<()> {
        required(tag, "empty tag")?;
        self.stage(&[tag])?;
        let request = CallHeader::new(Opcode::CipherVerifyTag)
            .with_handle(0, cipher.handle())
            .with_arg(0, len_arg(tag.len())?);
        self.invoke(&request)?;
        Ok(())
    }

    fn cipher_close(&mut self, cipher: CipherHandle) -> ApiResult<()> {
        self.close(Opcode::CipherClose, cipher.handle())
    }

    fn signature_init(
        &mut self,
        private: Option<KeyHandle>,
        public: Option<KeyHandle>,
        algorithm: SignatureAlgorithm,
    ) -> ApiResult<SignatureHandle> {
        let request = CallHeader::new(Opcode::SignatureInit)
            .with_handle(0, optional(private))
            .with_handle(1, optional(public))
            .with_arg(0, algorithm.id());
        let reply = self.invoke(&request)?;
        Ok(SignatureHandle::from_handle(reply.handle()))
    }

    fn signature_sign(
        &mut self,
        signature: SignatureHandle,
        digest: DigestAlgorithm,
        hash: &[u8],
        out: &mut [u8],
    ) -> ApiResult<usize> {
        required(hash, "empty hash")?;
        self.stage(&[hash])?;
        let request = CallHeader::new(Opcode::SignatureSign)
            .with_handle(0, signature.handle())
            .with_arg(0, digest.id())
            .with_arg(1, len_arg(hash.len())?)
            .with_arg(2, self.offer(out));
        let reply = self.invoke(&request)?;
        self.collect(&reply, out)
    }

    fn signature_verify(
        &mut self,
        signature: SignatureHandle,
        digest: DigestAlgorithm,
        hash: &[u8],
        sig: &[u8],
    ) -> ApiResult<()> {
        required(hash, "empty hash")?;
        required(sig, "empty signature")?;
        self.stage(&[hash, sig])?;
        let request = CallHeader::new(Opcode::SignatureVerify)
            .with_handle(0, signature.handle())
            .with_arg(0, digest.id())
            .with_arg(1, len_arg(hash.len())?)
            .with_arg(2, len_arg(sig.len())?);
        self.invoke(&request)?;
        Ok(())
    }

    fn signature_close(&mut self, signature: SignatureHandle) -> ApiResult<()> {
        self.close(Opcode::SignatureClose, signature.handle())
    }

    fn agreement_init(&mut self, private: KeyHandle, algorithm: AgreementAlgorithm) -> ApiResult<AgreementHandle> {
        let request = CallHeader::new(Opcode::AgreementInit)
            .with_handle(0, private.handle())
            .with_arg(0, algorithm.id());
        let reply = self.invoke(&request)?;
        Ok(AgreementHandle::from_handle(reply.handle()))
    }

    fn agreement_compute_shared(
        &mut self,
        agreement: AgreementHandle,
        peer: KeyHandle,
        out: &mut [u8],
    ) -> ApiResult<usize> {
        let request = CallHeader::new(Opcode::AgreementComputeShared)
            .with_handle(0, agreement.handle())
            .with_handle(1, peer.handle())
            .with_arg(0, self.offer(out));
        let reply = self.invoke(&request)?;
        self.collect(&reply, out)
    }

    fn agreement_close(&mut self, agreement: AgreementHandle) -> ApiResult<()> {
        self.close(Opcode::AgreementClose, agreement.handle())
    }

    fn key_init(&mut self, key_type: KeyType, flags: KeyFlags, len_bits: u32) -> ApiResult<KeyHandle> {
        let request = CallHeader::new(Opcode::KeyInit)
            .with_arg(0, key_type.id())
            .with_arg(1, flags.bits())
            .with_arg(2, len_bits);
        let reply = self.invoke(&request)?;
        Ok(KeyHandle::from_handle(reply.handle()))
    }

    fn key_import(&mut self, key: KeyHandle, wrap: Option<KeyHandle>, data: &[u8]) -> ApiResult<()> {
        required(data, "empty key data")?;
        self.stage(&[data])?;
        let request = CallHeader::new(Opcode::KeyImport)
            .with_handle(0, key.handle())
            .with_handle(1, optional(wrap))
            .with_arg(0, len_arg(data.len())?);
        self.invoke(&request)?;
        Ok(())
    }

    fn key_export(&mut self, key: KeyHandle, wrap: Option<KeyHandle>, out: &mut [u8]) -> ApiResult<usize> {
        let request = CallHeader::new(Opcode::KeyExport)
            .with_handle(0, key.handle())
            .with_handle(1, optional(wrap))
            .with_arg(0, self.offer(out));
        let reply = self.invoke(&request)?;
        self.collect(&reply, out)
    }

    fn key_generate(&mut self, key: KeyHandle) -> ApiResult<()> {
        self.invoke(&CallHeader::new(Opcode::KeyGenerate).with_handle(0, key.handle()))?;
        Ok(())
    }

    fn key_generate_pair(&mut self, private: KeyHandle, public: KeyHandle) -> ApiResult<()> {
        let request = CallHeader::new(Opcode::KeyGeneratePair)
            .with_handle(0, private.handle())
            .with_handle(1, public.handle());
        self.invoke(&request)?;
        Ok(())
    }

    fn key_close(&mut self, key: KeyHandle) -> ApiResult<()> {
        self.close(Opcode::KeyClose, key.handle())
    }
}

impl<C: Channel> KeyStoreApi for RpcClient<C> {
    fn import_key(
        &mut self,
        name: &str,
        bytes: &[u8],
        key_type: KeyType,
        flags: KeyFlags,
        len_bits: u32,
    ) -> ApiResult<KeyHandle> {
        require_name(name)?;
        required(bytes, "empty key bytes")?;
        self.stage(&[name.as_bytes(), bytes])?;
        let request = CallHeader::new(Opcode::KeyStoreImport)
            .with_arg(0, len_arg(name.len())?)
            .with_arg(1, len_arg(bytes.len())?)
            .with_arg(2, key_type.id())
            .with_arg(3, flags.bits())
            .with_arg(4, len_bits);
        let reply = self.invoke(&request)?;
        Ok(KeyHandle::from_handle(reply.handle()))
    }

    fn get_key(&mut self, name: &str) -> ApiResult<KeyHandle> {
        require_name(name)?;
        self.stage(&[name.as_bytes()])?;
        let reply = self.invoke(&CallHeader::new(Opcode::KeyStoreGet).with_arg(0, len_arg(name.len())?))?;
        Ok(KeyHandle::from_handle(reply.handle()))
    }

    fn get_key_size_bytes(&mut self, name: &str) -> ApiResult<usize> {
        require_name(name)?;
        self.stage(&[name.as_bytes()])?;
        let reply =
            self.invoke(&CallHeader::new(Opcode::KeyStoreGetSize).with_arg(0, len_arg(name.len())?))?;
        Ok(reply.length(0) as usize)
    }

    fn delete_key(&mut self, name: &str, key: Option<KeyHandle>) -> ApiResult<()> {
        require_name(name)?;
        self.stage(&[name.as_bytes()])?;
        let request = CallHeader::new(Opcode::KeyStoreDelete)
            .with_handle(0, optional(key))
            .with_arg(0, len_arg(name.len())?);
        self.invoke(&request)?;
        Ok(())
    }

    fn generate_key(&mut self, name: &str, key_type: KeyType, flags: KeyFlags, len_bits: u32) -> ApiResult<KeyHandle> {
        require_name(name)?;
        self.stage(&[name.as_bytes()])?;
        let request = CallHeader::new(Opcode::KeyStoreGenerate)
            .with_arg(0, len_arg(name.len())?)
            .with_arg(1, key_type.id())
            .with_arg(2, flags.bits())
            .with_arg(3, len_bits);
        let reply = self.invoke(&request)?;
        Ok(KeyHandle::from_handle(reply.handle()))
    }

    fn key_exists(&mut self, name: &str) -> ApiResult<bool> {
        require_name(name)?;
        self.stage(&[name.as_bytes()])?;
        let reply =
            self.invoke(&CallHeader::new(Opcode::KeyStoreExists).with_arg(0, len_arg(name.len())?))?;
        Ok(reply.length(0) != 0)
    }
}
