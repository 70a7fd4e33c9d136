//! Null-terminated byte strings.

use crate::element::Element;
use crate::error::{OverlayError, OverlayResult};
use crate::value::Value;
use memchr::memchr;
use tracing::warn;

/// Scan granularity. Reads never cross a page boundary, so a string ending
/// just before an unmapped page is still found.
const PAGE_SIZE: usize = 4096;

/// A zero-terminated byte run, rescanned on every access.
#[derive(Debug, Clone, Copy)]
pub struct StringView<'a> {
    element: Element<'a>,
}

impl<'a> StringView<'a> {
    pub(crate) fn new(element: Element<'a>) -> Self {
        StringView { element }
    }

    pub fn element(&self) -> Element<'a> {
        self.element
    }

    /// The bytes before the terminator.
    pub fn bytes(&self) -> OverlayResult<Vec<u8>> {
        let overlay = self.element.overlay();
        let start = self.element.address();
        let limit = overlay.config().max_scan;

        let mut out = Vec::new();
        let mut address = start;
        while out.len() < limit {
            let to_boundary = PAGE_SIZE - (address % PAGE_SIZE as u64) as usize;
            let want = to_boundary.min(limit - out.len());
            // Stores backed by buffers can end mid-page; fall back to one byte.
            let chunk = match overlay.read(address, want) {
                Ok(chunk) => chunk,
                Err(_) if want > 1 => overlay.read(address, 1)?,
                Err(e) => return Err(e),
            };
            if let Some(end) = memchr(0, &chunk) {
                out.extend_from_slice(&chunk[..end]);
                return Ok(out);
            }
            address = overlay.offset(address, chunk.len())?;
            out.extend_from_slice(&chunk);
        }

        warn!("No terminator within {} bytes of {:#x}", limit, start);
        Err(OverlayError::UnboundedScan {
            address: start,
            limit,
        })
    }

    /// Decoded text. Invalid UTF-8 is replaced, not rejected.
    pub fn get(&self) -> OverlayResult<String> {
        Ok(String::from_utf8_lossy(&self.bytes()?).into_owned())
    }

    /// Text when the bytes are valid UTF-8, the bytes themselves otherwise,
    /// so the result can always be written back unchanged.
    pub fn value(&self) -> OverlayResult<Value> {
        Ok(match String::from_utf8(self.bytes()?) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        })
    }

    /// Length in bytes, without the terminator.
    pub fn len(&self) -> OverlayResult<usize> {
        Ok(self.bytes()?.len())
    }

    pub fn is_empty(&self) -> OverlayResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Length in bytes, with the terminator.
    pub fn byte_len(&self) -> OverlayResult<usize> {
        Ok(self.len()? + 1)
    }

    /// Overwrite the text in place. The new text must have exactly the current
    /// byte length and contain no NUL; the terminator is left untouched.
    pub fn set(&self, text: &str) -> OverlayResult<()> {
        self.set_bytes(text.as_bytes())
    }

    /// [`set`](Self::set) for contents that need not be UTF-8.
    pub fn set_bytes(&self, bytes: &[u8]) -> OverlayResult<()> {
        if memchr(0, bytes).is_some() {
            return Err(OverlayError::type_mismatch(
                "bytes without NUL",
                String::from_utf8_lossy(bytes),
            ));
        }
        let current = self.len()?;
        if bytes.len() != current {
            return Err(OverlayError::size_mismatch(
                "string bytes",
                current,
                bytes.len(),
            ));
        }
        self.element.overlay().write(self.element.address(), bytes)
    }
}
