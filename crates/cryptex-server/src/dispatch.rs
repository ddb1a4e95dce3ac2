//! Opcode dispatch: registers and dataport in, Vault call, dataport out.
//!
//! Inputs are copied out of the dataport before the Vault runs, and outputs
//! are written back only on success, so a failed call leaves nothing for the
//! client to read.

use cryptex_core::{OwnerId, Vault};
use cryptex_proto::{
    AgreementAlgorithm, AgreementHandle, CallHeader, CipherAlgorithm, CipherHandle, CipherMode, Dataport,
    DigestAlgorithm, DigestHandle, ErrorCode, Handle, KeyFlags, KeyHandle, KeyType, Opcode, ReplyHeader,
    SignatureAlgorithm, SignatureHandle,
};
use zeroize::Zeroizing;

use crate::ServerError;

type Result<T> = std::result::Result<T, ServerError>;

fn field<T>(result: std::result::Result<T, ErrorCode>, field: &'static str) -> Result<T> {
    result.map_err(|code| ServerError::Request { field, code })
}

/// Copy `N` back-to-back inputs of the given lengths out of the dataport.
fn inputs<const N: usize>(dataport: &Dataport, lens: [u32; N]) -> Result<[Zeroizing<Vec<u8>>; N]> {
    let lens = lens.map(|len| len as usize);
    let segments = field(dataport.read_segments(&lens), "input lengths")?;
    let segments: Vec<_> = segments.into_iter().map(Zeroizing::new).collect();
    segments
        .try_into()
        .map_err(|_| ServerError::Request { field: "input lengths", code: ErrorCode::Generic })
}

/// Output buffer for an offered capacity, clamped to the dataport.
fn output(dataport: &Dataport, capacity: u32) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(vec![0u8; (capacity as usize).min(dataport.capacity())])
}

fn written(dataport: &Dataport, out: &[u8], len: usize) -> Result<ReplyHeader> {
    field(dataport.write(0, &out[..len]), "output")?;
    Ok(ReplyHeader::new(ErrorCode::Success).with_len(0, len as u32))
}

fn name(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|_| ServerError::Request { field: "key name", code: ErrorCode::InvalidParameter })
}

fn optional_key(handle: Handle) -> Option<KeyHandle> {
    (!handle.is_null()).then_some(KeyHandle::from_handle(handle))
}

fn issued(handle: Handle) -> ReplyHeader {
    ReplyHeader::new(ErrorCode::Success).with_handle(handle)
}

fn key_params(request: &CallHeader, first: usize) -> Result<(KeyType, KeyFlags, u32)> {
    let key_type = field(KeyType::from_id(request.arg(first)), "key type")?;
    let flags = field(KeyFlags::from_bits(request.arg(first + 1)), "key flags")?;
    Ok((key_type, flags, request.arg(first + 2)))
}

/// Execute one call for `owner`.
pub(crate) fn dispatch(
    vault: &mut Vault,
    owner: OwnerId,
    dataport: &Dataport,
    opcode: Opcode,
    request: &CallHeader,
) -> Result<ReplyHeader> {
    let ok = ReplyHeader::new(ErrorCode::Success);
    let h0 = request.handle(0);
    let h1 = request.handle(1);

    match opcode {
        Opcode::RandomGetData => {
            let [salt] = inputs(dataport, [request.arg(0)])?;
            let mut out = output(dataport, request.arg(1));
            vault.random(&salt, &mut out)?;
            written(dataport, &out, out.len())
        },

        Opcode::DigestInit => {
            let algorithm = field(DigestAlgorithm::from_id(request.arg(0)), "digest algorithm")?;
            Ok(issued(vault.digest_init(owner, algorithm)?.handle()))
        },
        Opcode::DigestUpdate => {
            let [data] = inputs(dataport, [request.arg(0)])?;
            vault.digest_update(owner, DigestHandle::from_handle(h0), &data)?;
            Ok(ok)
        },
        Opcode::DigestFinalize => {
            let [data] = inputs(dataport, [request.arg(0)])?;
            let mut out = output(dataport, request.arg(1));
            let len = vault.digest_finalize(owner, DigestHandle::from_handle(h0), &data, &mut out)?;
            written(dataport, &out, len)
        },
        Opcode::DigestClose => {
            vault.digest_close(owner, DigestHandle::from_handle(h0))?;
            Ok(ok)
        },

        Opcode::CipherInit => {
            let algorithm = field(CipherAlgorithm::from_id(request.arg(0)), "cipher algorithm")?;
            let mode = field(CipherMode::from_id(request.arg(1)), "cipher mode")?;
            let [iv] = inputs(dataport, [request.arg(2)])?;
            let cipher = vault.cipher_init(owner, KeyHandle::from_handle(h0), algorithm, mode, &iv)?;
            Ok(issued(cipher.handle()))
        },
        Opcode::CipherUpdate => {
            let [input] = inputs(dataport, [request.arg(0)])?;
            let mut out = output(dataport, request.arg(1));
            let len = vault.cipher_update(owner, CipherHandle::from_handle(h0), &input, &mut out)?;
            written(dataport, &out, len)
        },
        Opcode::CipherUpdateAd => {
            let [ad] = inputs(dataport, [request.arg(0)])?;
            vault.cipher_update_ad(owner, CipherHandle::from_handle(h0), &ad)?;
            Ok(ok)
        },
        Opcode::CipherFinalize => {
            let mut out = output(dataport, request.arg(1));
            let len = vault.cipher_finalize(owner, CipherHandle::from_handle(h0), &mut out)?;
            written(dataport, &out, len)
        },
        Opcode::CipherVerifyTag => {
            let [tag] = inputs(dataport, [request.arg(0)])?;
            vault.cipher_verify_tag(owner, CipherHandle::from_handle(h0), &tag)?;
            Ok(ok)
        },
        Opcode::CipherClose => {
            vault.cipher_close(owner, CipherHandle::from_handle(h0))?;
            Ok(ok)
        },

        Opcode::SignatureInit => {
            let algorithm = field(SignatureAlgorithm::from_id(request.arg(0)), "signature algorithm")?;
            let signature = vault.signature_init(owner, optional_key(h0), optional_key(h1), algorithm)?;
            Ok(issued(signature.handle()))
        },
        Opcode::SignatureSign => {
            let digest = field(DigestAlgorithm::from_id(request.arg(0)), "digest algorithm")?;
            let [hash] = inputs(dataport, [request.arg(1)])?;
            let mut out = output(dataport, request.arg(2));
            let len =
                vault.signature_sign(owner, SignatureHandle::from_handle(h0), digest, &hash, &mut out)?;
            written(dataport, &out, len)
        },
        Opcode::SignatureVerify => {
            let digest = field(DigestAlgorithm::from_id(request.arg(0)), "digest algorithm")?;
            let [hash, sig] = inputs(dataport, [request.arg(1), request.arg(2)])?;
            vault.signature_verify(owner, SignatureHandle::from_handle(h0), digest, &hash, &sig)?;
            Ok(ok)
        },
        Opcode::SignatureClose => {
            vault.signature_close(owner, SignatureHandle::from_handle(h0))?;
            Ok(ok)
        },

        Opcode::AgreementInit => {
            let algorithm = field(AgreementAlgorithm::from_id(request.arg(0)), "agreement algorithm")?;
            let agreement = vault.agreement_init(owner, KeyHandle::from_handle(h0), algorithm)?;
            Ok(issued(agreement.handle()))
        },
        Opcode::AgreementComputeShared => {
            let mut out = output(dataport, request.arg(0));
            let len = vault.agreement_compute_shared(
                owner,
                AgreementHandle::from_handle(h0),
                KeyHandle::from_handle(h1),
                &mut out,
            )?;
            written(dataport, &out, len)
        },
        Opcode::AgreementClose => {
            vault.agreement_close(owner, AgreementHandle::from_handle(h0))?;
            Ok(ok)
        },

        Opcode::KeyInit => {
            let (key_type, flags, len_bits) = key_params(request, 0)?;
            Ok(issued(vault.key_init(owner, key_type, flags, len_bits)?.handle()))
        },
        Opcode::KeyImport => {
            let [data] = inputs(dataport, [request.arg(0)])?;
            vault.key_import(owner, KeyHandle::from_handle(h0), optional_key(h1), &data)?;
            Ok(ok)
        },
        Opcode::KeyExport => {
            let mut out = output(dataport, request.arg(0));
            let len = vault.key_export(owner, KeyHandle::from_handle(h0), optional_key(h1), &mut out)?;
            written(dataport, &out, len)
        },
        Opcode::KeyGenerate => {
            vault.key_generate(owner, KeyHandle::from_handle(h0))?;
            Ok(ok)
        },
        Opcode::KeyGeneratePair => {
            vault.key_generate_pair(owner, KeyHandle::from_handle(h0), KeyHandle::from_handle(h1))?;
            Ok(ok)
        },
        Opcode::KeyClose => {
            vault.key_close(owner, KeyHandle::from_handle(h0))?;
            Ok(ok)
        },

        Opcode::KeyStoreImport => {
            let [raw_name, bytes] = inputs(dataport, [request.arg(0), request.arg(1)])?;
            let (key_type, flags, len_bits) = key_params(request, 2)?;
            let key = vault.key_store_import(owner, name(&raw_name)?, &bytes, key_type, flags, len_bits)?;
            Ok(issued(key.handle()))
        },
        Opcode::KeyStoreGet => {
            let [raw_name] = inputs(dataport, [request.arg(0)])?;
            Ok(issued(vault.key_store_get(owner, name(&raw_name)?)?.handle()))
        },
        Opcode::KeyStoreGetSize => {
            let [raw_name] = inputs(dataport, [request.arg(0)])?;
            let size = vault.key_store_size(name(&raw_name)?)?;
            Ok(ok.with_len(0, size as u32))
        },
        Opcode::KeyStoreDelete => {
            let [raw_name] = inputs(dataport, [request.arg(0)])?;
            vault.key_store_delete(owner, name(&raw_name)?, optional_key(h0))?;
            Ok(ok)
        },
        Opcode::KeyStoreGenerate => {
            let [raw_name] = inputs(dataport, [request.arg(0)])?;
            let (key_type, flags, len_bits) = key_params(request, 1)?;
            let key = vault.key_store_generate(owner, name(&raw_name)?, key_type, flags, len_bits)?;
            Ok(issued(key.handle()))
        },
        Opcode::KeyStoreExists => {
            let [raw_name] = inputs(dataport, [request.arg(0)])?;
            let exists = vault.key_store_exists(name(&raw_name)?)?;
            Ok(ok.with_len(0, u32::from(exists)))
        },
    }
}
