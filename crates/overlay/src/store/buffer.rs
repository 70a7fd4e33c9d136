//! In-memory backing store.

use crate::error::{OverlayError, OverlayResult};
use crate::store::BackingStore;
use parking_lot::RwLock;

/// An owned byte buffer that pretends to live at `base`.
///
/// Useful for building object graphs at known addresses without touching a
/// real address space.
pub struct BufferStore {
    name: String,
    base: u64,
    data: RwLock<Vec<u8>>,
}

impl BufferStore {
    pub fn new(base: u64, data: impl Into<Vec<u8>>) -> Self {
        BufferStore {
            name: "buffer".to_string(),
            base,
            data: RwLock::new(data.into()),
        }
    }

    /// A buffer of `length` zero bytes.
    pub fn zeroed(base: u64, length: usize) -> Self {
        Self::new(base, vec![0u8; length])
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the whole buffer.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Translate an absolute range into buffer indices.
    fn range(&self, address: u64, length: usize) -> OverlayResult<std::ops::Range<usize>> {
        let size = self.data.read().len() as u64;
        let end = address.checked_add(length as u64);
        match end {
            Some(end) if address >= self.base && end <= self.base + size => {
                let start = (address - self.base) as usize;
                Ok(start..start + length)
            }
            _ => Err(OverlayError::access_violation(
                &self.name,
                address,
                length,
                format!(
                    "outside of buffer [{:#x}, {:#x})",
                    self.base,
                    self.base + size
                ),
            )),
        }
    }
}

impl BackingStore for BufferStore {
    fn read(&self, address: u64, length: usize) -> OverlayResult<Vec<u8>> {
        let range = self.range(address, length)?;
        Ok(self.data.read()[range].to_vec())
    }

    fn write(&self, address: u64, bytes: &[u8]) -> OverlayResult<()> {
        let range = self.range(address, bytes.len())?;
        self.data.write()[range].copy_from_slice(bytes);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_at_base() {
        let store = BufferStore::new(0x1000, b"Hello, World!".to_vec());
        assert_eq!(store.read(0x1000, 5).unwrap(), b"Hello");
        assert_eq!(store.read(0x1007, 5).unwrap(), b"World");

        store.write(0x1007, b"Rusty").unwrap();
        assert_eq!(store.snapshot(), b"Hello, Rusty!");
    }

    #[test]
    fn test_out_of_range() {
        let store = BufferStore::zeroed(0x1000, 16);
        assert!(store.read(0xfff, 1).unwrap_err().is_access_violation());
        assert!(store.read(0x1008, 9).unwrap_err().is_access_violation());
        assert!(store.write(0x1010, &[1]).unwrap_err().is_access_violation());
        assert!(store.read(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_is_valid() {
        let store = BufferStore::zeroed(0x2000, 10);
        assert!(store.is_valid(0x2000, 10));
        assert!(store.is_valid(0x2009, 1));
        assert!(!store.is_valid(0x200a, 1));
        assert!(!store.is_valid(0x2000, 0));
    }

    #[test]
    fn test_name() {
        let store = BufferStore::zeroed(0, 1).with_name("scratch");
        assert_eq!(store.name(), "scratch");
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }
}
