//! Fixed-size call and reply headers with zero-copy parsing.
//!
//! The cross-boundary entrypoint carries only small scalars: an opcode, up to
//! three handle tokens, and six 32-bit arguments. Headers are raw big-endian
//! byte arrays so they can be cast from untrusted bytes without alignment or
//! validity concerns; all bit patterns are valid and semantic checks happen in
//! [`CallHeader::from_bytes`] / [`ReplyHeader::from_bytes`].

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{ErrorCode, Handle, Opcode, ProtocolError};

const MAGIC: u32 = 0x4358_5250;
const VERSION: u8 = 0x01;

/// Request header (64 bytes, big endian).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CallHeader {
    magic: [u8; 4],         // 0x43585250 ("CXRP")
    version: u8,            // 0x01
    reserved: u8,           // zero
    opcode: [u8; 2],        // u16 operation code
    handles: [[u8; 8]; 3],  // handle tokens h0..h2
    args: [[u8; 4]; 6],     // scalar arguments a0..a5
    padding: [u8; 8],       // zero
}

impl CallHeader {
    /// Serialized size in bytes
    pub const SIZE: usize = 64;

    /// Magic number: "CXRP" in ASCII
    pub const MAGIC: u32 = MAGIC;

    /// Current protocol version
    pub const VERSION: u8 = VERSION;

    /// Number of handle registers
    pub const HANDLES: usize = 3;

    /// Number of argument registers
    pub const ARGS: usize = 6;

    /// Create an empty request for `opcode`.
    pub fn new(opcode: Opcode) -> Self {
        let mut header = Self::new_zeroed();
        header.magic = MAGIC.to_be_bytes();
        header.version = VERSION;
        header.opcode = opcode.to_u16().to_be_bytes();
        header
    }

    /// Parse a request from raw bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::TooShort` if fewer than [`Self::SIZE`] bytes
    /// - `ProtocolError::InvalidMagic` on magic mismatch
    /// - `ProtocolError::UnsupportedVersion` on version mismatch
    /// - `ProtocolError::UnknownOpcode` if the opcode is not recognized
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self, ProtocolError> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::TooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if u32::from_be_bytes(header.magic) != MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let opcode = header.opcode_raw();
        if Opcode::from_u16(opcode).is_none() {
            return Err(ProtocolError::UnknownOpcode(opcode));
        }

        Ok(header)
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Raw opcode value.
    pub fn opcode_raw(&self) -> u16 {
        u16::from_be_bytes(self.opcode)
    }

    /// Opcode as enum. `None` if unrecognized.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode_raw())
    }

    /// Handle register `index`.
    pub fn handle(&self, index: usize) -> Handle {
        Handle::from_raw(u64::from_be_bytes(self.handles[index]))
    }

    /// Set handle register `index`.
    pub fn set_handle(&mut self, index: usize, handle: Handle) {
        self.handles[index] = handle.to_raw().to_be_bytes();
    }

    /// Argument register `index`.
    pub fn arg(&self, index: usize) -> u32 {
        u32::from_be_bytes(self.args[index])
    }

    /// Set argument register `index`.
    pub fn set_arg(&mut self, index: usize, value: u32) {
        self.args[index] = value.to_be_bytes();
    }

    /// Builder form of [`Self::set_handle`].
    #[must_use]
    pub fn with_handle(mut self, index: usize, handle: Handle) -> Self {
        self.set_handle(index, handle);
        self
    }

    /// Builder form of [`Self::set_arg`].
    #[must_use]
    pub fn with_arg(mut self, index: usize, value: u32) -> Self {
        self.set_arg(index, value);
        self
    }
}

/// Reply header (32 bytes, big endian).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ReplyHeader {
    magic: [u8; 4],
    version: u8,
    reserved: [u8; 3],
    code: [u8; 4],        // ErrorCode wire value
    handle: [u8; 8],      // handle minted by init-class calls
    lens: [[u8; 4]; 3],   // output lengths
}

impl ReplyHeader {
    /// Serialized size in bytes
    pub const SIZE: usize = 32;

    /// Number of length registers
    pub const LENS: usize = 3;

    /// Create a reply carrying `code`.
    pub fn new(code: ErrorCode) -> Self {
        let mut header = Self::new_zeroed();
        header.magic = MAGIC.to_be_bytes();
        header.version = VERSION;
        header.code = code.to_u32().to_be_bytes();
        header
    }

    /// Parse a reply from raw bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::TooShort` if fewer than [`Self::SIZE`] bytes
    /// - `ProtocolError::InvalidMagic` on magic mismatch
    /// - `ProtocolError::UnsupportedVersion` on version mismatch
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self, ProtocolError> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::TooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if u32::from_be_bytes(header.magic) != MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        Ok(header)
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Status of the call.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_u32(u32::from_be_bytes(self.code))
    }

    /// Handle minted by the call (null if none).
    pub fn handle(&self) -> Handle {
        Handle::from_raw(u64::from_be_bytes(self.handle))
    }

    /// Output length register `index`.
    pub fn length(&self, index: usize) -> u32 {
        u32::from_be_bytes(self.lens[index])
    }

    /// Builder: attach a minted handle.
    #[must_use]
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = handle.to_raw().to_be_bytes();
        self
    }

    /// Builder: set output length register `index`.
    #[must_use]
    pub fn with_len(mut self, index: usize, len: u32) -> Self {
        self.lens[index] = len.to_be_bytes();
        self
    }
}
