//! Objects that live behind handles.

use cryptex_crypto::{AgreementSession, CipherSession, DigestSession, Key, SignatureSession};

/// One handle-table entry.
#[derive(Debug)]
pub enum Object {
    /// Key slot, possibly holding material
    Key(Key),
    /// Digest session
    Digest(DigestSession),
    /// Cipher session
    Cipher(CipherSession),
    /// Signature session
    Signature(SignatureSession),
    /// Agreement session
    Agreement(AgreementSession),
}

impl Object {
    /// Kind name, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Key(_) => Key::KIND,
            Self::Digest(_) => DigestSession::KIND,
            Self::Cipher(_) => CipherSession::KIND,
            Self::Signature(_) => SignatureSession::KIND,
            Self::Agreement(_) => AgreementSession::KIND,
        }
    }
}

/// A concrete type stored as one [`Object`] variant.
///
/// Typed lookups go through this so that presenting, say, a digest handle
/// where a key is expected is caught before any work happens.
pub trait ObjectKind: Sized {
    /// Kind name.
    const KIND: &'static str;

    /// Borrow the payload if `object` is this kind.
    fn from_object(object: &Object) -> Option<&Self>;

    /// Mutably borrow the payload if `object` is this kind.
    fn from_object_mut(object: &mut Object) -> Option<&mut Self>;

    /// Wrap into an [`Object`].
    fn into_object(self) -> Object;
}

macro_rules! object_kind {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl ObjectKind for $ty {
            const KIND: &'static str = $kind;

            fn from_object(object: &Object) -> Option<&Self> {
                match object {
                    Object::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_object_mut(object: &mut Object) -> Option<&mut Self> {
                match object {
                    Object::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_object(self) -> Object {
                Object::$variant(self)
            }
        }
    };
}

object_kind!(Key, Key, "key");
object_kind!(DigestSession, Digest, "digest");
object_kind!(CipherSession, Cipher, "cipher");
object_kind!(SignatureSession, Signature, "signature");
object_kind!(AgreementSession, Agreement, "agreement");
