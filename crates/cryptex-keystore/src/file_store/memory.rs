#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{FileId, FileStore, FileStoreError, OpenMode, Result, SeekFrom};

/// In-memory file store for testing and simulation
///
/// Files live in a `HashMap`. All state is wrapped in `Arc<Mutex<>>`, so clones
/// share the same files; tests keep a clone to inspect what the key store
/// left behind. An optional capacity models a full medium: writes past it are
/// truncated and the next write fails with `NoSpace`.
#[derive(Clone, Default)]
pub struct MemoryFileStore {
    inner: Arc<Mutex<MemoryFileStoreInner>>,
}

#[derive(Default)]
struct MemoryFileStoreInner {
    files: HashMap<String, Vec<u8>>,
    open: HashMap<u32, OpenFile>,
    next_id: u32,
    capacity: Option<usize>,
}

struct OpenFile {
    name: String,
    mode: OpenMode,
    pos: usize,
}

impl std::fmt::Debug for MemoryFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("MemoryFileStore");
        if let Ok(inner) = self.inner.lock() {
            out.field("files", &inner.files.len())
                .field("open", &inner.open.len())
                .field("capacity", &inner.capacity);
        }
        out.finish_non_exhaustive()
    }
}

impl MemoryFileStoreInner {
    fn used(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    fn stream(&mut self, file: FileId, mode: OpenMode) -> Result<(&mut OpenFile, &mut Vec<u8>)> {
        let stream = self.open.get_mut(&file.0).ok_or(FileStoreError::BadDescriptor(file))?;
        if stream.mode != mode {
            return Err(FileStoreError::WrongMode(file));
        }
        let data = self
            .files
            .get_mut(&stream.name)
            .ok_or_else(|| FileStoreError::NotFound { name: stream.name.clone() })?;
        Ok((stream, data))
    }

    /// Open stream in either mode, with the current length of its file.
    fn stream_any(&mut self, file: FileId) -> Result<(usize, &mut OpenFile)> {
        let stream = self.open.get_mut(&file.0).ok_or(FileStoreError::BadDescriptor(file))?;
        let len = self
            .files
            .get(&stream.name)
            .map(Vec::len)
            .ok_or_else(|| FileStoreError::NotFound { name: stream.name.clone() })?;
        Ok((len, stream))
    }
}

impl MemoryFileStore {
    /// Create a new empty store without a size limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding at most `capacity` bytes across all files
    pub fn with_capacity(capacity: usize) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.capacity = Some(capacity);
        }
        store
    }

    /// Names of all files, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a thread panicked while
    /// holding the lock). This is acceptable for test/simulation code.
    #[allow(clippy::expect_used)]
    pub fn file_names(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut names: Vec<String> = inner.files.keys().cloned().collect();
        names.sort();
        names
    }

    /// Raw contents of `name`, if present.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().expect("Mutex poisoned").files.get(name).cloned()
    }

    /// Overwrite the contents of `name`, for corruption tests.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn replace_contents(&self, name: &str, data: Vec<u8>) {
        self.inner.lock().expect("Mutex poisoned").files.insert(name.to_string(), data);
    }

    /// Number of descriptors currently open.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn open_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").open.len()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryFileStoreInner>> {
        self.inner.lock().map_err(|_| FileStoreError::Io("file store lock poisoned".to_string()))
    }
}

impl FileStore for MemoryFileStore {
    fn open(&self, name: &str, mode: OpenMode) -> Result<FileId> {
        let mut inner = self.lock()?;
        match mode {
            OpenMode::Read => {
                if !inner.files.contains_key(name) {
                    return Err(FileStoreError::NotFound { name: name.to_string() });
                }
            },
            OpenMode::CreateNew => {
                if inner.files.contains_key(name) {
                    return Err(FileStoreError::AlreadyExists { name: name.to_string() });
                }
                inner.files.insert(name.to_string(), Vec::new());
            },
        }

        inner.next_id = inner.next_id.wrapping_add(1);
        let id = inner.next_id;
        inner.open.insert(id, OpenFile { name: name.to_string(), mode, pos: 0 });
        Ok(FileId(id))
    }

    fn read(&self, file: FileId, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock()?;
        let (stream, data) = inner.stream(file, OpenMode::Read)?;
        let start = stream.pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        stream.pos = start + n;
        Ok(n)
    }

    fn write(&self, file: FileId, data: &[u8]) -> Result<usize> {
        let mut inner = self.lock()?;
        let free = inner.capacity.map_or(usize::MAX, |cap| cap.saturating_sub(inner.used()));
        if free == 0 && !data.is_empty() {
            return Err(FileStoreError::NoSpace { needed: data.len(), available: 0 });
        }

        let (stream, contents) = inner.stream(file, OpenMode::CreateNew)?;
        let n = data.len().min(free);
        let end = stream.pos + n;
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[stream.pos..end].copy_from_slice(&data[..n]);
        stream.pos = end;
        Ok(n)
    }

    fn seek(&self, file: FileId, pos: SeekFrom) -> Result<u64> {
        let mut inner = self.lock()?;
        let (len, stream) = inner.stream_any(file)?;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => (stream.pos as u64).checked_add_signed(delta),
            SeekFrom::End(delta) => (len as u64).checked_add_signed(delta),
        }
        .ok_or_else(|| FileStoreError::Io(format!("seek before start of {}", stream.name)))?;
        stream.pos = usize::try_from(target).map_err(|_| FileStoreError::Io("seek out of range".to_string()))?;
        Ok(target)
    }

    fn close(&self, file: FileId) -> Result<()> {
        let mut inner = self.lock()?;
        inner.open.remove(&file.0).map(|_| ()).ok_or(FileStoreError::BadDescriptor(file))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| FileStoreError::NotFound { name: name.to_string() })
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.files.contains_key(name))
    }

    fn available(&self, file: FileId) -> Result<u64> {
        let mut inner = self.lock()?;
        let (len, stream) = inner.stream_any(file)?;
        Ok(len.saturating_sub(stream.pos) as u64)
    }
}
