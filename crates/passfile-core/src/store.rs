//! Record file access and in-place splice editing.
//!
//! The store is a flat sequence of newline-separated records edited
//! through a memory mapping:
//! - Equal-length replacements are written straight into the mapping
//! - Growing replacements extend the file first, then shift the tail
//!   forward before writing the record
//! - Shrinking replacements shift the tail back, write the record, then
//!   truncate
//!
//! A shrink that dies between the sync and the truncate leaves stale
//! bytes past the logical end; rerunning the edit repairs the file.
//! Single-writer access is assumed, no locks are taken.

use std::fs::{File, OpenOptions};
use std::ops::{Deref, Range};
use std::path::Path;

use memmap2::{Mmap, MmapMut};

use crate::error::{StoreError, StoreResult};

/// How a store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create or truncate, read-write
    Create,
    /// Existing file, read-write
    ReadWrite,
    /// Existing file, read-only
    ReadOnly,
}

/// An open record store.
#[derive(Debug)]
pub struct StoreFile {
    file: File,
    len: usize,
    writable: bool,
}

/// Read-only view of the whole store. Empty stores carry no mapping.
pub struct StoreView {
    map: Option<Mmap>,
}

impl Deref for StoreView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.map {
            Some(map) => map,
            None => &[],
        }
    }
}

impl StoreFile {
    /// Open `path` as a record store. The path must name a regular file.
    pub fn open(path: &Path, mode: OpenMode) -> StoreResult<Self> {
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Create => {
                options.read(true).write(true).create(true).truncate(true);
            }
            OpenMode::ReadWrite => {
                options.read(true).write(true);
            }
            OpenMode::ReadOnly => {
                options.read(true);
            }
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options.open(path).map_err(StoreError::Open)?;
        let metadata = file.metadata().map_err(StoreError::Open)?;
        if !metadata.is_file() {
            return Err(StoreError::NotAFile(path.display().to_string()));
        }
        Ok(Self {
            file,
            len: metadata.len() as usize,
            writable: mode != OpenMode::ReadOnly,
        })
    }

    /// Current store length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Map the store read-only for scanning.
    pub fn view(&self) -> StoreResult<StoreView> {
        if self.len == 0 {
            return Ok(StoreView { map: None });
        }
        let map = unsafe { Mmap::map(&self.file) }.map_err(StoreError::Map)?;
        Ok(StoreView { map: Some(map) })
    }

    /// Replace the byte range `old` with `record`, resizing as needed.
    ///
    /// An empty `record` deletes: the range is widened by one adjacent
    /// newline, preferring the one before the record, so no blank line is
    /// left behind. A record longer than the range shifts the tail
    /// forward after extending the file; a shorter one shifts the tail
    /// back and truncates. A failed splice leaves the file contents
    /// either untouched or fully edited, never partially shifted.
    pub fn splice(&mut self, old: Range<usize>, record: &[u8]) -> StoreResult<()> {
        debug_assert!(self.writable);
        debug_assert!(old.start <= old.end && old.end <= self.len);
        let span = old.end - old.start;
        if record.len() > span {
            self.grow(old, record)
        } else if record.len() < span {
            self.shrink(old, record)
        } else if !record.is_empty() {
            self.rewrite(old.start, record)
        } else {
            Ok(())
        }
    }

    /// Finish an editing session, forcing the contents to disk.
    pub fn close(self) -> StoreResult<()> {
        if self.writable {
            self.file.sync_all().map_err(StoreError::Sync)?;
        }
        Ok(())
    }

    fn grow(&mut self, old: Range<usize>, record: &[u8]) -> StoreResult<()> {
        let old_len = self.len;
        let mut line = Vec::with_capacity(record.len() + 1);
        if old.start > 0 {
            // a separating newline when the preceding record is unterminated
            let map = unsafe { Mmap::map(&self.file) }.map_err(StoreError::Map)?;
            if map[old.start - 1] != b'\n' {
                line.push(b'\n');
            }
        }
        line.extend_from_slice(record);

        let delta = line.len() - (old.end - old.start);
        let new_len = old_len + delta;
        self.file
            .set_len(new_len as u64)
            .map_err(StoreError::Allocate)?;
        let mut map = unsafe { MmapMut::map_mut(&self.file) }.map_err(StoreError::Map)?;
        map.copy_within(old.end..old_len, old.end + delta);
        map[old.start..old.start + line.len()].copy_from_slice(&line);
        map.flush().map_err(StoreError::Sync)?;
        self.len = new_len;
        Ok(())
    }

    fn shrink(&mut self, old: Range<usize>, record: &[u8]) -> StoreResult<()> {
        let old_len = self.len;
        let mut start = old.start;
        let mut end = old.end;
        let mut map = unsafe { MmapMut::map_mut(&self.file) }.map_err(StoreError::Map)?;
        if record.is_empty() {
            // take one separating newline with the deleted record
            if start > 0 && map[start - 1] == b'\n' {
                start -= 1;
            } else if end < old_len && map[end] == b'\n' {
                end += 1;
            }
        }
        let new_len = old_len - (end - start) + record.len();
        map.copy_within(end..old_len, start + record.len());
        map[start..start + record.len()].copy_from_slice(record);
        map.flush().map_err(StoreError::Sync)?;
        drop(map);
        self.file
            .set_len(new_len as u64)
            .map_err(StoreError::Truncate)?;
        self.len = new_len;
        Ok(())
    }

    fn rewrite(&mut self, start: usize, record: &[u8]) -> StoreResult<()> {
        let mut map = unsafe { MmapMut::map_mut(&self.file) }.map_err(StoreError::Map)?;
        map[start..start + record.len()].copy_from_slice(record);
        map.flush().map_err(StoreError::Sync)?;
        Ok(())
    }
}
