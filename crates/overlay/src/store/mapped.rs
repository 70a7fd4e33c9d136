//! Memory-mapped dump file store.
//!
//! Overlays a raw dump of an address range (for instance a region copied out
//! of a process) at the address it was taken from, so layouts can be explored
//! offline with the same schemas used on live memory.

use crate::error::{OverlayError, OverlayResult};
use crate::store::BackingStore;
use memmap2::{Mmap, MmapMut, MmapOptions};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Internal state for the mapped file.
enum MapState {
    ReadOnly(Mmap),
    Writable(MmapMut),
    /// Zero-length files cannot be mapped.
    Empty,
}

impl MapState {
    fn as_slice(&self) -> &[u8] {
        match self {
            MapState::ReadOnly(map) => map.as_ref(),
            MapState::Writable(map) => map.as_ref(),
            MapState::Empty => &[],
        }
    }
}

/// A dump file mapped at a base address.
///
/// # Thread Safety
///
/// The mapping sits behind a `parking_lot::RwLock`: reads share it, writes
/// take it exclusively.
///
/// # Example
///
/// ```rust,ignore
/// let store = MappedFileStore::open("heap", "/tmp/heap.bin", 0x5555_0000_0000, false)?;
/// let bytes = store.read(0x5555_0000_0010, 8)?;
/// ```
pub struct MappedFileStore {
    name: String,
    path: PathBuf,
    base: u64,
    size: u64,
    state: RwLock<MapState>,
}

impl MappedFileStore {
    /// Map `path` so that its first byte appears at `base`.
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        base: u64,
        writable: bool,
    ) -> OverlayResult<Self> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        let file = if writable {
            OpenOptions::new().read(true).write(true).open(&path)?
        } else {
            File::open(&path)?
        };
        let size = file.metadata()?.len();

        let state = if size == 0 {
            MapState::Empty
        } else if writable {
            MapState::Writable(unsafe { MmapOptions::new().map_mut(&file)? })
        } else {
            MapState::ReadOnly(unsafe { MmapOptions::new().map(&file)? })
        };

        debug!(
            "Mapped {} ({} bytes) at {:#x} as store '{}'",
            path.display(),
            size,
            base,
            name
        );

        Ok(MappedFileStore {
            name,
            path,
            base,
            size,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Flush pending writes back to the file.
    pub fn flush(&self) -> OverlayResult<()> {
        if let MapState::Writable(map) = &*self.state.read() {
            map.flush()?;
        }
        Ok(())
    }

    fn offset_of(&self, address: u64, length: usize) -> OverlayResult<usize> {
        let in_range = address >= self.base
            && address
                .checked_add(length as u64)
                .is_some_and(|end| end <= self.base + self.size);
        if !in_range {
            return Err(OverlayError::access_violation(
                &self.name,
                address,
                length,
                "outside of the mapped file",
            ));
        }
        Ok((address - self.base) as usize)
    }
}

impl BackingStore for MappedFileStore {
    fn read(&self, address: u64, length: usize) -> OverlayResult<Vec<u8>> {
        let start = self.offset_of(address, length)?;
        let state = self.state.read();
        Ok(state.as_slice()[start..start + length].to_vec())
    }

    fn write(&self, address: u64, bytes: &[u8]) -> OverlayResult<()> {
        let start = self.offset_of(address, bytes.len())?;
        match &mut *self.state.write() {
            MapState::Writable(map) => {
                map[start..start + bytes.len()].copy_from_slice(bytes);
                Ok(())
            }
            MapState::ReadOnly(_) | MapState::Empty => Err(OverlayError::access_violation(
                &self.name,
                address,
                bytes.len(),
                "store mapped read-only",
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
