//! Shared-memory payload buffer for one channel.
//!
//! A [`Dataport`] is a fixed number of page-aligned pages shared between one
//! client and the server. It carries the variable-length inputs and outputs of
//! a single call and nothing else: its contents are meaningless once the call
//! returns. Clones share the same memory, which is how the client side and the
//! server side of a channel see one buffer.

#![allow(clippy::disallowed_types, reason = "Synchronous page access only")]

use std::sync::{Arc, Mutex};

use crate::ErrorCode;

/// Size of one dataport page in bytes.
pub const PAGE_SIZE: usize = 4096;

#[repr(C, align(4096))]
#[derive(Clone, Copy)]
struct Page([u8; PAGE_SIZE]);

/// Fixed-size, page-aligned payload buffer.
#[derive(Clone)]
pub struct Dataport {
    pages: Arc<Mutex<Box<[Page]>>>,
    capacity: usize,
}

impl std::fmt::Debug for Dataport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataport").field("capacity", &self.capacity).finish_non_exhaustive()
    }
}

impl Default for Dataport {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Dataport {
    /// Allocate a zeroed dataport of `pages` pages (at least one).
    pub fn new(pages: usize) -> Self {
        let pages = pages.max(1);
        Self {
            pages: Arc::new(Mutex::new(vec![Page([0; PAGE_SIZE]); pages].into_boxed_slice())),
            capacity: pages * PAGE_SIZE,
        }
    }

    /// Total capacity in bytes. This is the hard bound on one call's payload.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy `data` into the buffer at `offset`.
    ///
    /// # Errors
    ///
    /// - `ErrorCode::InvalidParameter` if the range exceeds the capacity
    /// - `ErrorCode::Generic` if the buffer lock is poisoned
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<(), ErrorCode> {
        self.check_range(offset, data.len())?;
        let mut pages = self.pages.lock().map_err(|_| ErrorCode::Generic)?;

        let mut offset = offset;
        let mut data = data;
        while !data.is_empty() {
            let page = &mut pages[offset / PAGE_SIZE].0;
            let start = offset % PAGE_SIZE;
            let n = (PAGE_SIZE - start).min(data.len());
            page[start..start + n].copy_from_slice(&data[..n]);
            data = &data[n..];
            offset += n;
        }
        Ok(())
    }

    /// Copy `len` bytes out of the buffer starting at `offset`.
    ///
    /// # Errors
    ///
    /// - `ErrorCode::InvalidParameter` if the range exceeds the capacity
    /// - `ErrorCode::Generic` if the buffer lock is poisoned
    pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>, ErrorCode> {
        self.check_range(offset, len)?;
        let pages = self.pages.lock().map_err(|_| ErrorCode::Generic)?;

        let mut out = Vec::with_capacity(len);
        let mut offset = offset;
        while out.len() < len {
            let page = &pages[offset / PAGE_SIZE].0;
            let start = offset % PAGE_SIZE;
            let n = (PAGE_SIZE - start).min(len - out.len());
            out.extend_from_slice(&page[start..start + n]);
            offset += n;
        }
        Ok(out)
    }

    /// Stage `segments` back to back from offset 0.
    ///
    /// # Errors
    ///
    /// `ErrorCode::InvalidParameter` if the segments do not fit together.
    pub fn write_segments(&self, segments: &[&[u8]]) -> Result<(), ErrorCode> {
        let total = segments
            .iter()
            .try_fold(0usize, |acc, s| acc.checked_add(s.len()))
            .ok_or(ErrorCode::InvalidParameter)?;
        self.check_range(0, total)?;

        let mut offset = 0;
        for segment in segments {
            self.write(offset, segment)?;
            offset += segment.len();
        }
        Ok(())
    }

    /// Read back-to-back segments of the given lengths from offset 0.
    ///
    /// # Errors
    ///
    /// `ErrorCode::InvalidParameter` if the lengths exceed the capacity.
    pub fn read_segments(&self, lens: &[usize]) -> Result<Vec<Vec<u8>>, ErrorCode> {
        let total = lens
            .iter()
            .try_fold(0usize, |acc, l| acc.checked_add(*l))
            .ok_or(ErrorCode::InvalidParameter)?;
        self.check_range(0, total)?;

        let mut offset = 0;
        let mut out = Vec::with_capacity(lens.len());
        for len in lens {
            out.push(self.read(offset, *len)?);
            offset += len;
        }
        Ok(out)
    }

    /// Zero the whole buffer.
    ///
    /// # Errors
    ///
    /// `ErrorCode::Generic` if the buffer lock is poisoned.
    pub fn clear(&self) -> Result<(), ErrorCode> {
        let mut pages = self.pages.lock().map_err(|_| ErrorCode::Generic)?;
        for page in pages.iter_mut() {
            page.0.fill(0);
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), ErrorCode> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(ErrorCode::InvalidParameter),
        }
    }
}
