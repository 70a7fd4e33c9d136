//! Struct instances: a layout bound to an address.

use crate::element::{Element, Overlay};
use crate::error::{OverlayError, OverlayResult};
use crate::types::{FieldDescriptor, StructLayout};
use crate::value::Value;

/// A struct type bound to one address.
///
/// Field elements are built on access from the shared offset table; binding
/// never reads memory. Every field element carries this instance as its
/// owner, which is what property-length arrays evaluate their length against.
#[derive(Debug, Clone, Copy)]
pub struct StructView<'a> {
    overlay: Overlay<'a>,
    layout: &'a StructLayout,
    address: u64,
}

impl<'a> StructView<'a> {
    pub(crate) fn new(overlay: Overlay<'a>, layout: &'a StructLayout, address: u64) -> Self {
        StructView {
            overlay,
            layout,
            address,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn layout(&self) -> &'a StructLayout {
        self.layout
    }

    pub fn name(&self) -> &'a str {
        self.layout.name()
    }

    pub fn overlay(&self) -> Overlay<'a> {
        self.overlay
    }

    /// This instance as a plain element.
    pub fn as_element(&self) -> Element<'a> {
        Element::new(self.overlay, self.layout.element_type(), self.address, None)
    }

    pub fn offset_of(&self, field: &str) -> OverlayResult<usize> {
        self.layout.offset_of(field)
    }

    fn bind(&self, descriptor: &'a FieldDescriptor) -> OverlayResult<Element<'a>> {
        Ok(Element::new(
            self.overlay,
            &descriptor.ty,
            self.overlay.offset(self.address, descriptor.offset)?,
            Some(*self),
        ))
    }

    pub fn field(&self, name: &str) -> OverlayResult<Element<'a>> {
        let descriptor = self
            .layout
            .field(name)
            .ok_or_else(|| OverlayError::field_not_found(self.layout.name(), name))?;
        self.bind(descriptor)
    }

    /// Every field in layout order.
    pub fn fields(&self) -> impl Iterator<Item = OverlayResult<(&'a str, Element<'a>)>> + '_ {
        self.layout.fields().iter().map(move |descriptor| {
            self.bind(descriptor)
                .map(|element| (descriptor.name.as_str(), element))
        })
    }

    pub fn get(&self, name: &str) -> OverlayResult<Value> {
        self.field(name)?.get()
    }

    pub fn set(&self, name: &str, value: &Value) -> OverlayResult<()> {
        self.field(name)?.set(value)
    }

    /// Read an integer field, widened.
    pub fn read_int(&self, name: &str) -> OverlayResult<i128> {
        let scalar = self.field(name)?.as_scalar()?.get()?;
        scalar
            .as_i128()
            .ok_or_else(|| OverlayError::type_mismatch("integer", scalar.describe()))
    }

    /// Current values of all fields.
    pub fn record(&self) -> OverlayResult<Vec<(String, Value)>> {
        self.fields()
            .map(|field| {
                let (name, element) = field?;
                Ok((name.to_string(), element.get()?))
            })
            .collect()
    }

    /// Write a record back field by field. Every field must be present exactly
    /// once; names are checked before anything is written.
    pub fn set_record(&self, record: &[(String, Value)]) -> OverlayResult<()> {
        let descriptors = self.layout.fields();
        if record.len() != descriptors.len() {
            return Err(OverlayError::size_mismatch(
                format!("{} fields", self.layout.name()),
                descriptors.len(),
                record.len(),
            ));
        }

        let assignments = descriptors
            .iter()
            .map(|descriptor| -> OverlayResult<_> {
                let (_, value) = record
                    .iter()
                    .find(|(name, _)| *name == descriptor.name)
                    .ok_or_else(|| {
                        OverlayError::type_mismatch(
                            format!("value for {}.{}", self.layout.name(), descriptor.name),
                            "missing field",
                        )
                    })?;
                Ok((self.bind(descriptor)?, value))
            })
            .collect::<OverlayResult<Vec<_>>>()?;

        for (element, value) in assignments {
            element.set(value)?;
        }
        Ok(())
    }
}
