//! Directory-backed file store.
//!
//! Each stream is a host file under one root directory. Descriptors are kept
//! in a table behind a lock, so clones of the store share open streams.

#![allow(clippy::disallowed_types, reason = "Descriptor table behind a synchronous lock")]

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use super::{FileId, FileStore, FileStoreError, OpenMode, Result};

/// File store backed by a directory on the host filesystem.
///
/// One host file per stream, named exactly as requested. Names are not
/// sanitized here; the key store validates entry names before they reach a
/// file store.
#[derive(Clone)]
pub struct DirFileStore {
    root: PathBuf,
    open: Arc<Mutex<Descriptors>>,
}

#[derive(Default)]
struct Descriptors {
    files: HashMap<u32, (File, OpenMode)>,
    next_id: u32,
}

impl DirFileStore {
    /// Store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| FileStoreError::Io(e.to_string()))?;
        Ok(Self { root, open: Arc::new(Mutex::new(Descriptors::default())) })
    }

    /// Directory holding the files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Descriptors>> {
        self.open.lock().map_err(|_| FileStoreError::Io("descriptor lock poisoned".to_string()))
    }

    fn with_file<T>(
        &self,
        file: FileId,
        mode: Option<OpenMode>,
        op: impl FnOnce(&mut File) -> io::Result<T>,
    ) -> Result<T> {
        let mut open = self.lock()?;
        let (handle, opened) = open.files.get_mut(&file.0).ok_or(FileStoreError::BadDescriptor(file))?;
        if mode.is_some_and(|m| m != *opened) {
            return Err(FileStoreError::WrongMode(file));
        }
        op(handle).map_err(|e| map_io(e, ""))
    }
}

fn map_io(err: io::Error, name: &str) -> FileStoreError {
    match err.kind() {
        io::ErrorKind::NotFound => FileStoreError::NotFound { name: name.to_string() },
        io::ErrorKind::AlreadyExists => FileStoreError::AlreadyExists { name: name.to_string() },
        io::ErrorKind::StorageFull => FileStoreError::NoSpace { needed: 0, available: 0 },
        _ => FileStoreError::Io(err.to_string()),
    }
}

impl FileStore for DirFileStore {
    fn open(&self, name: &str, mode: OpenMode) -> Result<FileId> {
        let path = self.path(name);
        let handle = match mode {
            OpenMode::Read => File::open(&path),
            OpenMode::CreateNew => OpenOptions::new().write(true).create_new(true).open(&path),
        }
        .map_err(|e| map_io(e, name))?;

        let mut open = self.lock()?;
        open.next_id = open.next_id.wrapping_add(1);
        let id = open.next_id;
        open.files.insert(id, (handle, mode));
        Ok(FileId(id))
    }

    fn read(&self, file: FileId, buf: &mut [u8]) -> Result<usize> {
        self.with_file(file, Some(OpenMode::Read), |f| f.read(buf))
    }

    fn write(&self, file: FileId, data: &[u8]) -> Result<usize> {
        self.with_file(file, Some(OpenMode::CreateNew), |f| f.write(data))
    }

    fn seek(&self, file: FileId, pos: SeekFrom) -> Result<u64> {
        self.with_file(file, None, |f| f.seek(pos))
    }

    fn close(&self, file: FileId) -> Result<()> {
        let (mut handle, mode) =
            self.lock()?.files.remove(&file.0).ok_or(FileStoreError::BadDescriptor(file))?;
        if mode == OpenMode::CreateNew {
            handle.flush().map_err(|e| map_io(e, ""))?;
            handle.sync_all().map_err(|e| map_io(e, ""))?;
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.path(name)).map_err(|e| map_io(e, name))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        self.path(name).try_exists().map_err(|e| map_io(e, name))
    }

    fn available(&self, file: FileId) -> Result<u64> {
        self.with_file(file, None, |f| {
            let len = f.metadata()?.len();
            Ok(len.saturating_sub(f.stream_position()?))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DirFileStore::new(dir.path().join("keys")).expect("store");

        let fd = store.open("entry", OpenMode::CreateNew).expect("create");
        assert_eq!(store.write(fd, b"abc"), Ok(3));
        store.close(fd).expect("close");
        assert!(store.root().join("entry").is_file());

        let fd = store.open("entry", OpenMode::Read).expect("open");
        assert_eq!(store.available(fd), Ok(3));
        let mut buf = [0u8; 8];
        assert_eq!(store.read(fd, &mut buf), Ok(3));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(store.available(fd), Ok(0));
        assert_eq!(store.seek(fd, SeekFrom::End(-2)), Ok(1));
        assert_eq!(store.available(fd), Ok(2));
        assert_eq!(store.read(fd, &mut buf), Ok(2));
        assert_eq!(&buf[..2], b"bc");
        store.close(fd).expect("close");

        assert!(matches!(
            store.open("entry", OpenMode::CreateNew),
            Err(FileStoreError::AlreadyExists { .. })
        ));
        store.delete("entry").expect("delete");
        assert_eq!(store.exists("entry"), Ok(false));
        assert!(matches!(store.delete("entry"), Err(FileStoreError::NotFound { .. })));
    }

    #[test]
    fn reopen_sees_previous_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = DirFileStore::new(dir.path()).expect("store");
            let fd = store.open("persisted", OpenMode::CreateNew).expect("create");
            store.write(fd, b"x").expect("write");
            store.close(fd).expect("close");
        }
        let store = DirFileStore::new(dir.path()).expect("store");
        assert_eq!(store.exists("persisted"), Ok(true));
    }
}
