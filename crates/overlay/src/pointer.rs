//! Pointer elements.

use crate::element::{Element, OPAQUE};
use crate::error::{OverlayError, OverlayResult};
use crate::scalar::{Scalar, ScalarKind, POINTER_SIZE};
use crate::types::ElementType;
use tracing::debug;

static RAW_POINTER: ElementType = ElementType::Scalar(ScalarKind::RawPointer);

/// A pointer-sized address in memory, optionally typed.
///
/// Dereferencing builds a fresh element at the stored address every time; the
/// target is never cached, so repointing is observed immediately.
#[derive(Debug, Clone, Copy)]
pub struct PointerView<'a> {
    element: Element<'a>,
    target: Option<&'a ElementType>,
}

impl<'a> PointerView<'a> {
    pub(crate) fn new(element: Element<'a>, target: Option<&'a ElementType>) -> Self {
        PointerView { element, target }
    }

    pub fn element(&self) -> Element<'a> {
        self.element
    }

    /// Declared target type, `None` for `void*`.
    pub fn target_type(&self) -> Option<&'a ElementType> {
        self.target
    }

    /// The stored address.
    pub fn read(&self) -> OverlayResult<u64> {
        let bytes = self
            .element
            .overlay()
            .read(self.element.address(), POINTER_SIZE)?;
        match ScalarKind::RawPointer.decode(&bytes)? {
            Scalar::RawPointer(address) => Ok(address),
            other => Err(OverlayError::type_mismatch("address", other.to_string())),
        }
    }

    pub fn is_null(&self) -> OverlayResult<bool> {
        Ok(self.read()? == 0)
    }

    /// The stored address as a `void*` scalar element at the pointer's own
    /// location.
    pub fn raw(&self) -> Element<'a> {
        Element::new(
            self.element.overlay(),
            &RAW_POINTER,
            self.element.address(),
            self.element.owner(),
        )
    }

    /// The element the pointer refers to, or `None` for NULL. The target is
    /// not read; for `void*` it is opaque.
    pub fn dereference(&self) -> OverlayResult<Option<Element<'a>>> {
        let address = self.read()?;
        if address == 0 {
            return Ok(None);
        }
        let ty = self.target.unwrap_or(&OPAQUE);
        debug!(
            "Dereference {:#x} -> {} at {:#x}",
            self.element.address(),
            ty.type_name(),
            address
        );
        Ok(Some(Element::new(
            self.element.overlay(),
            ty,
            address,
            self.element.owner(),
        )))
    }

    /// Like [`dereference`](Self::dereference), but NULL is an error.
    pub fn target(&self) -> OverlayResult<Element<'a>> {
        self.dereference()?.ok_or_else(|| {
            OverlayError::access_violation(
                self.element.overlay().store().name(),
                0,
                0,
                format!("NULL pointer stored at {:#x}", self.element.address()),
            )
        })
    }

    pub fn write(&self, address: u64) -> OverlayResult<()> {
        let bytes = ScalarKind::RawPointer.encode(Scalar::RawPointer(address))?;
        self.element.overlay().write(self.element.address(), &bytes)
    }

    /// Store the address of `target`.
    pub fn point_to(&self, target: &Element<'_>) -> OverlayResult<()> {
        self.write(target.address())
    }
}
