//! Backing stores: random-access byte channels over an address space.
//!
//! The [`BackingStore`] trait is the only thing the overlay engine needs from
//! the memory it inspects. Implementations:
//!
//! - [`BufferStore`]: an owned buffer mapped at a chosen base address
//! - [`MappedFileStore`]: a memory dump file, memory-mapped
//! - [`ProcessMemory`]: the live address space of a process (Linux `/proc/<pid>/mem`)

pub mod buffer;
pub mod mapped;
#[cfg(target_os = "linux")]
pub mod process;

pub use buffer::BufferStore;
pub use mapped::MappedFileStore;
#[cfg(target_os = "linux")]
pub use process::ProcessMemory;

use crate::error::OverlayResult;

/// Trait for reading and writing raw bytes at absolute addresses.
///
/// Both operations fail with
/// [`AccessViolation`](crate::error::OverlayError::AccessViolation) when the
/// range is unmapped or not writable. Neither is retried.
pub trait BackingStore: Send + Sync {
    /// Read `length` bytes starting at `address`.
    fn read(&self, address: u64, length: usize) -> OverlayResult<Vec<u8>>;

    /// Write `bytes` starting at `address`.
    fn write(&self, address: u64, bytes: &[u8]) -> OverlayResult<()>;

    /// The name of this store, used in error messages.
    fn name(&self) -> &str;

    /// Check if the range `[address, address+length)` can be read.
    fn is_valid(&self, address: u64, length: u64) -> bool {
        usize::try_from(length)
            .map(|length| length > 0 && self.read(address, length).is_ok())
            .unwrap_or(false)
    }
}
