//! Live process memory through `/proc/<pid>/mem`.
//!
//! The pseudo-file is a seekable stream over the whole virtual address space
//! of the target. Every read and write seeks to the requested address, and the
//! previous cursor position is restored afterwards (also on error) by a
//! [`CursorGuard`].
//!
//! Writes through `/proc/<pid>/mem` bypass page protections. Nothing here
//! checks that an address holds what the caller thinks it holds.

use crate::error::{OverlayError, OverlayResult};
use crate::store::BackingStore;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Address space of a live process.
///
/// # Example
///
/// ```rust,ignore
/// let memory = ProcessMemory::open_self(true)?;
/// let bytes = memory.read(address, 8)?;
/// ```
pub struct ProcessMemory {
    name: String,
    path: PathBuf,
    writable: bool,
    file: Mutex<File>,
}

impl ProcessMemory {
    /// The calling process.
    pub fn open_self(writable: bool) -> OverlayResult<Self> {
        Self::open("self", "/proc/self/mem", writable)
    }

    /// Another process. Requires ptrace access to it.
    pub fn open_pid(pid: u32, writable: bool) -> OverlayResult<Self> {
        Self::open(format!("pid {}", pid), format!("/proc/{}/mem", pid), writable)
    }

    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        writable: bool,
    ) -> OverlayResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(writable).open(&path)?;
        let name = name.into();
        debug!("Opened process memory {} ({})", name, path.display());

        Ok(ProcessMemory {
            name,
            path,
            writable,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn violation(&self, address: u64, length: usize, err: impl ToString) -> OverlayError {
        OverlayError::access_violation(&self.name, address, length, err.to_string())
    }
}

impl BackingStore for ProcessMemory {
    fn read(&self, address: u64, length: usize) -> OverlayResult<Vec<u8>> {
        trace!("read {:#x} (+{}) from {}", address, length, self.name);
        let mut file = self.file.lock();
        let mut cursor = CursorGuard::new(&mut *file)?;

        cursor
            .seek(SeekFrom::Start(address))
            .map_err(|e| self.violation(address, length, e))?;
        let mut buf = vec![0u8; length];
        cursor
            .read_exact(&mut buf)
            .map_err(|e| self.violation(address, length, e))?;
        Ok(buf)
    }

    fn write(&self, address: u64, bytes: &[u8]) -> OverlayResult<()> {
        if !self.writable {
            return Err(self.violation(address, bytes.len(), "store opened read-only"));
        }
        trace!("write {:#x} (+{}) to {}", address, bytes.len(), self.name);
        let mut file = self.file.lock();
        let mut cursor = CursorGuard::new(&mut *file)?;

        cursor
            .seek(SeekFrom::Start(address))
            .map_err(|e| self.violation(address, bytes.len(), e))?;
        cursor
            .write_all(bytes)
            .map_err(|e| self.violation(address, bytes.len(), e))?;
        cursor
            .flush()
            .map_err(|e| self.violation(address, bytes.len(), e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Restores a file's stream position when dropped.
struct CursorGuard<'f> {
    file: &'f mut File,
    saved: u64,
}

impl<'f> CursorGuard<'f> {
    fn new(file: &'f mut File) -> OverlayResult<Self> {
        let saved = file.stream_position()?;
        Ok(CursorGuard { file, saved })
    }
}

impl Deref for CursorGuard<'_> {
    type Target = File;

    fn deref(&self) -> &File {
        &*self.file
    }
}

impl DerefMut for CursorGuard<'_> {
    fn deref_mut(&mut self) -> &mut File {
        &mut *self.file
    }
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.seek(SeekFrom::Start(self.saved)) {
            debug!("Failed to restore cursor to {:#x}: {}", self.saved, e);
        }
    }
}
