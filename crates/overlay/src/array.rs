//! Array elements: fixed, property-length and null-terminated.
//!
//! Item `i` lives at the array address rounded up to the item alignment, plus
//! `i` strides (item size rounded up to its alignment). Lengths are evaluated
//! on every call; nothing is memoized between accesses.

use crate::element::Element;
use crate::error::{OverlayError, OverlayResult};
use crate::structure::StructView;
use crate::types::{align_address, align_up, ArrayLength, ElementType};
use crate::value::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct ArrayView<'a> {
    element: Element<'a>,
    item: &'a ElementType,
    length: &'a ArrayLength,
}

impl<'a> ArrayView<'a> {
    pub(crate) fn new(element: Element<'a>, item: &'a ElementType, length: &'a ArrayLength) -> Self {
        ArrayView {
            element,
            item,
            length,
        }
    }

    pub fn element(&self) -> Element<'a> {
        self.element
    }

    pub fn item_type(&self) -> &'a ElementType {
        self.item
    }

    pub fn length(&self) -> &'a ArrayLength {
        self.length
    }

    /// The struct instance a property length is evaluated against.
    pub fn owner(&self) -> OverlayResult<StructView<'a>> {
        self.element.owner().ok_or_else(|| {
            OverlayError::unresolved(format!(
                "{} at {:#x} has no owning struct",
                self.element.type_name(),
                self.element.address()
            ))
        })
    }

    /// Current item count. Null-terminated arrays are scanned, property
    /// lengths are evaluated against the owner.
    pub fn len(&self) -> OverlayResult<usize> {
        match self.length {
            ArrayLength::Fixed(len) => Ok(*len),
            ArrayLength::Property(length) => length.eval(&self.owner()?),
            ArrayLength::NullTerminated => self.scan(),
        }
    }

    pub fn is_empty(&self) -> OverlayResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Bytes covered by the current items. For null-terminated arrays the
    /// sentinel item is included.
    pub fn byte_len(&self) -> OverlayResult<usize> {
        let mut count = self.len()?;
        if matches!(self.length, ArrayLength::NullTerminated) {
            count += 1;
        }
        if count == 0 {
            return Ok(0);
        }
        let (size, stride) = self.geometry()?;
        stride
            .checked_mul(count - 1)
            .and_then(|body| body.checked_add(size))
            .ok_or_else(|| {
                self.element
                    .overlay()
                    .overflow(self.element.address(), usize::MAX)
            })
    }

    /// Item size and stride.
    fn geometry(&self) -> OverlayResult<(usize, usize)> {
        let schema = self.element.overlay().schema();
        let size = self.item.size(schema)?;
        let stride = align_up(size, self.item.alignment(schema)?).ok_or_else(|| {
            OverlayError::Schema(format!("{} has no valid stride", self.item.type_name()))
        })?;
        Ok((size, stride))
    }

    fn item_address(&self, index: usize, stride: usize) -> OverlayResult<u64> {
        let overlay = self.element.overlay();
        let address = self.element.address();
        let alignment = self.item.alignment(overlay.schema())?;
        let start =
            align_address(address, alignment).ok_or_else(|| overlay.overflow(address, alignment))?;
        let offset = index
            .checked_mul(stride)
            .ok_or_else(|| overlay.overflow(start, usize::MAX))?;
        overlay.offset(start, offset)
    }

    fn item_unchecked(&self, index: usize, stride: usize) -> OverlayResult<Element<'a>> {
        Ok(Element::new(
            self.element.overlay(),
            self.item,
            self.item_address(index, stride)?,
            self.element.owner(),
        ))
    }

    /// Count items up to the first all-zero one.
    fn scan(&self) -> OverlayResult<usize> {
        let overlay = self.element.overlay();
        let limit = overlay.config().max_scan;
        let (size, stride) = self.geometry()?;

        for index in 0..limit {
            let bytes = overlay.read(self.item_address(index, stride)?, size)?;
            if bytes.iter().all(|&b| b == 0) {
                debug!(
                    "Null-terminated {} at {:#x}: {} items",
                    self.element.type_name(),
                    self.element.address(),
                    index
                );
                return Ok(index);
            }
        }

        warn!(
            "No sentinel within {} items of {} at {:#x}",
            limit,
            self.element.type_name(),
            self.element.address()
        );
        Err(OverlayError::UnboundedScan {
            address: self.element.address(),
            limit,
        })
    }

    /// All current items, without reading them.
    pub fn items(&self) -> OverlayResult<Vec<Element<'a>>> {
        let len = self.len()?;
        let (_, stride) = self.geometry()?;
        (0..len).map(|i| self.item_unchecked(i, stride)).collect()
    }

    pub fn item(&self, index: usize) -> OverlayResult<Element<'a>> {
        let len = self.len()?;
        if index >= len {
            return Err(OverlayError::IndexOutOfBounds { index, len });
        }
        let (_, stride) = self.geometry()?;
        self.item_unchecked(index, stride)
    }

    pub fn get(&self) -> OverlayResult<Vec<Value>> {
        self.items()?.iter().map(Element::get).collect()
    }

    /// Overwrite every item. The count must equal the current length; items
    /// are written in order and a failure leaves earlier items written.
    pub fn set(&self, values: &[Value]) -> OverlayResult<()> {
        let items = self.items()?;
        if items.len() != values.len() {
            return Err(OverlayError::size_mismatch(
                format!("{} items", self.element.type_name()),
                items.len(),
                values.len(),
            ));
        }
        for (item, value) in items.iter().zip(values) {
            item.set(value)?;
        }
        Ok(())
    }

    pub fn set_item(&self, index: usize, value: &Value) -> OverlayResult<()> {
        self.item(index)?.set(value)
    }
}
