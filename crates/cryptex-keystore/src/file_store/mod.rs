//! File store collaborator.
//!
//! The key store persists one file per entry through this narrow stream
//! interface. The trait is synchronous and takes `&self`; implementations
//! share internal state behind a lock so a clone (or a second reference) sees
//! the same files.

mod chaotic;
mod dir;
mod memory;

pub use std::io::SeekFrom;

pub use chaotic::ChaoticFileStore;
use cryptex_proto::ErrorCode;
pub use dir::DirFileStore;
pub use memory::MemoryFileStore;
use thiserror::Error;

/// Descriptor for an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// How a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read from the start
    Read,
    /// New file; fails if the name is taken
    CreateNew,
}

/// Errors raised by file stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileStoreError {
    /// No file with this name
    #[error("file not found: {name}")]
    NotFound {
        /// Requested name
        name: String,
    },

    /// A file with this name exists already
    #[error("file already exists: {name}")]
    AlreadyExists {
        /// Requested name
        name: String,
    },

    /// Descriptor is not open
    #[error("bad file descriptor {0:?}")]
    BadDescriptor(FileId),

    /// Descriptor was opened in the other mode
    #[error("descriptor {0:?} not opened for this operation")]
    WrongMode(FileId),

    /// Medium is full
    #[error("no space: need {needed} bytes, have {available}")]
    NoSpace {
        /// Bytes requested
        needed: usize,
        /// Bytes left
        available: usize,
    },

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl FileStoreError {
    /// Boundary code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } | Self::NoSpace { .. } => ErrorCode::InsufficientSpace,
            Self::BadDescriptor(_) | Self::WrongMode(_) | Self::Io(_) => ErrorCode::Generic,
        }
    }
}

/// Result type for file store operations.
pub type Result<T> = std::result::Result<T, FileStoreError>;

/// Named byte streams.
///
/// # Invariants
///
/// - A stream opened with [`OpenMode::CreateNew`] is visible to
///   [`FileStore::exists`] immediately, even before anything is written
/// - Bytes written are readable by a later [`OpenMode::Read`] stream once
///   `write` has returned them as written
/// - `delete` of an open file is allowed; open descriptors become stale
pub trait FileStore: Send + Sync + 'static {
    /// Open `name`.
    fn open(&self, name: &str, mode: OpenMode) -> Result<FileId>;

    /// Read into `buf` at the stream position, returning bytes read (0 at end).
    fn read(&self, file: FileId, buf: &mut [u8]) -> Result<usize>;

    /// Write `data` at the stream position, returning bytes written.
    ///
    /// May write fewer bytes than offered when the medium fills up.
    fn write(&self, file: FileId, data: &[u8]) -> Result<usize>;

    /// Move the stream position, returning the new offset from the start.
    ///
    /// Positions before the start of the file are rejected; positions past
    /// the end are allowed and read as end of file.
    fn seek(&self, file: FileId, pos: SeekFrom) -> Result<u64>;

    /// Release a descriptor.
    fn close(&self, file: FileId) -> Result<()>;

    /// Remove `name`.
    fn delete(&self, name: &str) -> Result<()>;

    /// Whether `name` exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Bytes between the stream position and the end of the file.
    fn available(&self, file: FileId) -> Result<u64>;
}

impl<F: FileStore + ?Sized> FileStore for Box<F> {
    fn open(&self, name: &str, mode: OpenMode) -> Result<FileId> {
        (**self).open(name, mode)
    }

    fn read(&self, file: FileId, buf: &mut [u8]) -> Result<usize> {
        (**self).read(file, buf)
    }

    fn write(&self, file: FileId, data: &[u8]) -> Result<usize> {
        (**self).write(file, data)
    }

    fn seek(&self, file: FileId, pos: SeekFrom) -> Result<u64> {
        (**self).seek(file, pos)
    }

    fn close(&self, file: FileId) -> Result<()> {
        (**self).close(file)
    }

    fn delete(&self, name: &str) -> Result<()> {
        (**self).delete(name)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        (**self).exists(name)
    }

    fn available(&self, file: FileId) -> Result<u64> {
        (**self).available(file)
    }
}
