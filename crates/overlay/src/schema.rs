//! Registry of named struct layouts.

use crate::error::{OverlayError, OverlayResult};
use crate::types::{StructBuilder, StructLayout};
use std::collections::HashMap;
use tracing::debug;

/// All struct types known to an overlay.
///
/// Layouts are computed once, when a type is defined, and never change
/// afterwards. Pointers may name types that are defined later, which is how
/// cyclic object graphs (an object pointing at its type, the type pointing
/// back at objects) are declared. Embedded struct fields must name a type that
/// is already defined, since its size is needed for the offset table.
#[derive(Debug, Default)]
pub struct Schema {
    types: HashMap<String, StructLayout>,
    /// Definition order, for stable listings.
    order: Vec<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay out and register a struct type.
    pub fn define(&mut self, builder: StructBuilder) -> OverlayResult<&StructLayout> {
        if self.types.contains_key(builder.name()) {
            return Err(OverlayError::DuplicateType(builder.name().to_string()));
        }
        let layout = builder.build(self)?;
        let name = layout.name().to_string();

        debug!(
            "Defined struct {} ({} fields, size {}, align {})",
            name,
            layout.fields().len(),
            layout.size(),
            layout.alignment()
        );

        self.order.push(name.clone());
        Ok(self.types.entry(name).or_insert(layout))
    }

    pub fn get(&self, name: &str) -> Option<&StructLayout> {
        self.types.get(name)
    }

    /// Like [`get`](Self::get), but a missing type is an error.
    pub fn resolve(&self, name: &str) -> OverlayResult<&StructLayout> {
        self.types
            .get(name)
            .ok_or_else(|| OverlayError::unresolved(format!("struct {} is not defined", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Type names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
