//! Opaque references to server-owned objects.
//!
//! A [`Handle`] is an `(index, generation)` pair packed into one `u64` token.
//! The index names a slot in the server's handle table; the generation is
//! bumped every time that slot is freed, so a token kept after `close` can
//! never alias whatever object later reuses the slot.
//!
//! Token `0` is the null handle. Generations start at 1, so it is never issued.

/// Untyped handle token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// The null handle, never issued by a table.
    pub const NULL: Self = Self { index: 0, generation: 0 };

    /// Build a handle from its parts.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was issued.
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Whether this is the null handle.
    pub const fn is_null(self) -> bool {
        self.index == 0 && self.generation == 0
    }

    /// Pack into a wire token (generation in the high word).
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Unpack a wire token.
    pub fn from_raw(raw: u64) -> Self {
        Self { index: raw as u32, generation: (raw >> 32) as u32 }
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Handle);

        impl $name {
            /// Wrap an untyped handle.
            pub const fn from_handle(handle: Handle) -> Self {
                Self(handle)
            }

            /// The untyped handle.
            pub const fn handle(self) -> Handle {
                self.0
            }

            /// Wire token.
            pub fn to_raw(self) -> u64 {
                self.0.to_raw()
            }

            /// Rebuild from a wire token.
            pub fn from_raw(raw: u64) -> Self {
                Self(Handle::from_raw(raw))
            }
        }
    };
}

typed_handle!(
    /// Handle to a key object.
    KeyHandle
);
typed_handle!(
    /// Handle to a digest session.
    DigestHandle
);
typed_handle!(
    /// Handle to a cipher session.
    CipherHandle
);
typed_handle!(
    /// Handle to a signature session.
    SignatureHandle
);
typed_handle!(
    /// Handle to a key agreement session.
    AgreementHandle
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_is_raw_zero() {
        assert_eq!(Handle::NULL.to_raw(), 0);
        assert!(Handle::from_raw(0).is_null());
        assert!(!Handle::new(0, 1).is_null());
    }

    #[test]
    fn raw_packing_keeps_both_halves() {
        let handle = Handle::new(0xdead_beef, 0x0102_0304);
        assert_eq!(handle.to_raw(), 0x0102_0304_dead_beef);
        assert_eq!(Handle::from_raw(handle.to_raw()), handle);
    }

    #[test]
    fn typed_handles_wrap_the_same_token() {
        let handle = Handle::new(7, 3);
        let key = KeyHandle::from_handle(handle);
        assert_eq!(KeyHandle::from_raw(key.to_raw()), key);
        assert_eq!(DigestHandle::from_raw(key.to_raw()).handle(), handle);
    }
}
