//! Element types and struct layouts.
//!
//! A [`StructLayout`] is the immutable offset table of one struct type. It is
//! computed once by [`StructBuilder`] when the type is registered in a
//! [`Schema`](crate::schema::Schema) and shared by every instance.

use crate::error::{OverlayError, OverlayResult};
use crate::scalar::{ScalarKind, POINTER_SIZE};
use crate::schema::Schema;
use crate::structure::StructView;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type LengthFn = dyn Fn(&StructView<'_>) -> OverlayResult<usize> + Send + Sync;

/// A length computed from the owning struct instance on every access.
#[derive(Clone)]
pub struct Length {
    func: Arc<LengthFn>,
    description: String,
}

impl Length {
    /// Wrap an arbitrary length function.
    pub fn new<F>(description: impl Into<String>, func: F) -> Self
    where
        F: Fn(&StructView<'_>) -> OverlayResult<usize> + Send + Sync + 'static,
    {
        Length {
            func: Arc::new(func),
            description: description.into(),
        }
    }

    /// Length read from a sibling integer field.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = name.clone();
        Length::new(description, move |owner| {
            let value = owner.read_int(&name)?;
            usize::try_from(value)
                .map_err(|_| OverlayError::type_mismatch("non-negative length", value.to_string()))
        })
    }

    /// Absolute value of a sibling integer field, for sign-encoded sizes.
    pub fn abs_field(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = format!("abs({})", name);
        Length::new(description, move |owner| {
            let value = owner.read_int(&name)?;
            usize::try_from(value.unsigned_abs())
                .map_err(|_| OverlayError::type_mismatch("addressable length", value.to_string()))
        })
    }

    pub fn eval(&self, owner: &StructView<'_>) -> OverlayResult<usize> {
        (self.func)(owner)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Length({})", self.description)
    }
}

/// How many items an array holds.
#[derive(Debug, Clone)]
pub enum ArrayLength {
    /// Schema constant.
    Fixed(usize),
    /// Evaluated against the owning struct on every access.
    Property(Length),
    /// Ends before the first all-zero item.
    NullTerminated,
}

/// The declared type of an element.
#[derive(Debug, Clone)]
pub enum ElementType {
    Scalar(ScalarKind),
    /// An address, optionally typed. `None` is `void*`.
    Pointer(Option<Box<ElementType>>),
    Array {
        item: Box<ElementType>,
        length: ArrayLength,
    },
    /// Zero-terminated byte string.
    CString,
    /// A struct registered in the schema under this name.
    Struct(String),
    /// Untyped memory; only its address is known.
    Opaque,
}

impl ElementType {
    pub fn scalar(kind: ScalarKind) -> Self {
        ElementType::Scalar(kind)
    }

    pub fn pointer_to(target: ElementType) -> Self {
        ElementType::Pointer(Some(Box::new(target)))
    }

    pub fn void_pointer() -> Self {
        ElementType::Pointer(None)
    }

    pub fn array(item: ElementType, len: usize) -> Self {
        ElementType::Array {
            item: Box::new(item),
            length: ArrayLength::Fixed(len),
        }
    }

    pub fn property_array(item: ElementType, length: Length) -> Self {
        ElementType::Array {
            item: Box::new(item),
            length: ArrayLength::Property(length),
        }
    }

    pub fn null_terminated(item: ElementType) -> Self {
        ElementType::Array {
            item: Box::new(item),
            length: ArrayLength::NullTerminated,
        }
    }

    pub fn structure(name: impl Into<String>) -> Self {
        ElementType::Struct(name.into())
    }

    /// Static size in bytes. Dynamically sized elements (property and
    /// null-terminated arrays, strings) contribute nothing to their parent's
    /// layout and report 0.
    pub fn size(&self, schema: &Schema) -> OverlayResult<usize> {
        match self {
            ElementType::Scalar(kind) => Ok(kind.size()),
            ElementType::Pointer(_) => Ok(POINTER_SIZE),
            ElementType::Array {
                item,
                length: ArrayLength::Fixed(len),
            } => {
                if *len == 0 {
                    return Ok(0);
                }
                let size = item.size(schema)?;
                align_up(size, item.alignment(schema)?)
                    .and_then(|stride| stride.checked_mul(len - 1))
                    .and_then(|body| body.checked_add(size))
                    .ok_or_else(|| too_large(&self.type_name()))
            }
            ElementType::Array { .. } | ElementType::CString | ElementType::Opaque => Ok(0),
            ElementType::Struct(name) => Ok(schema.resolve(name)?.size()),
        }
    }

    /// Required alignment in bytes.
    pub fn alignment(&self, schema: &Schema) -> OverlayResult<usize> {
        match self {
            ElementType::Scalar(kind) => Ok(kind.alignment()),
            ElementType::Pointer(_) => Ok(POINTER_SIZE),
            ElementType::Array { item, .. } => item.alignment(schema),
            ElementType::CString | ElementType::Opaque => Ok(1),
            ElementType::Struct(name) => Ok(schema.resolve(name)?.alignment()),
        }
    }

    /// C-like spelling, e.g. `int`, `PyObject*`, `char[16]`, `void*[]`.
    pub fn type_name(&self) -> String {
        match self {
            ElementType::Scalar(kind) => kind.c_name().to_string(),
            ElementType::Pointer(None) => "void*".to_string(),
            ElementType::Pointer(Some(target)) => format!("{}*", target.type_name()),
            ElementType::Array {
                item,
                length: ArrayLength::Fixed(len),
            } => format!("{}[{}]", item.type_name(), len),
            ElementType::Array { item, .. } => format!("{}[]", item.type_name()),
            ElementType::CString => "char[]".to_string(),
            ElementType::Struct(name) => name.clone(),
            ElementType::Opaque => "void".to_string(),
        }
    }

    /// Check that the type can be laid out: embedded structs must already be
    /// registered and array items must have a non-zero static size.
    pub(crate) fn validate(&self, schema: &Schema) -> OverlayResult<()> {
        match self {
            ElementType::Array { item, .. } => {
                item.validate(schema)?;
                if item.size(schema)? == 0 {
                    return Err(OverlayError::Schema(format!(
                        "array item type {} has no static size",
                        item.type_name()
                    )));
                }
                Ok(())
            }
            ElementType::Struct(name) => schema.resolve(name).map(|_| ()),
            // Pointer targets may be declared later.
            _ => Ok(()),
        }
    }
}

impl From<ScalarKind> for ElementType {
    fn from(kind: ScalarKind) -> Self {
        ElementType::Scalar(kind)
    }
}

/// Round `value` up to the next multiple of `alignment`, or `None` on
/// overflow.
pub fn align_up(value: usize, alignment: usize) -> Option<usize> {
    if alignment <= 1 {
        return Some(value);
    }
    value.checked_next_multiple_of(alignment)
}

/// Address form of [`align_up`].
pub fn align_address(address: u64, alignment: usize) -> Option<u64> {
    if alignment <= 1 {
        return Some(address);
    }
    address.checked_next_multiple_of(alignment as u64)
}

fn too_large(what: &str) -> OverlayError {
    OverlayError::Schema(format!("{} is too large for the address space", what))
}

/// One member of a struct layout.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: ElementType,
    pub offset: usize,
    pub size: usize,
    pub alignment: usize,
}

impl FieldDescriptor {
    /// Offset of the first byte past this field.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// The immutable offset table of a struct type.
#[derive(Debug, Clone)]
pub struct StructLayout {
    name: String,
    parent: Option<String>,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    size: usize,
    alignment: usize,
    /// `ElementType::Struct(name)`, so instances can be handed out as elements.
    self_type: ElementType,
}

impl StructLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// All fields in layout order, inherited ones first.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Total size, padded to the struct's alignment.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Largest alignment among the fields (1 for an empty struct).
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn offset_of(&self, field: &str) -> OverlayResult<usize> {
        self.field(field)
            .map(|f| f.offset)
            .ok_or_else(|| OverlayError::field_not_found(&self.name, field))
    }

    pub fn offset_after(&self, field: &str) -> OverlayResult<usize> {
        self.field(field)
            .map(FieldDescriptor::end)
            .ok_or_else(|| OverlayError::field_not_found(&self.name, field))
    }

    /// End of the last field, before trailing padding. Derived types continue
    /// laying out from here.
    pub fn data_end(&self) -> usize {
        self.fields.last().map(FieldDescriptor::end).unwrap_or(0)
    }

    pub fn element_type(&self) -> &ElementType {
        &self.self_type
    }

    /// Render the layout as a C declaration.
    pub fn declaration(&self) -> String {
        let entries: Vec<(String, &str)> = self
            .fields
            .iter()
            .map(|f| (f.ty.type_name(), f.name.as_str()))
            .collect();
        let longest = entries.iter().map(|(t, _)| t.len()).max().unwrap_or(0);

        let mut out = format!("struct {} {{\n", self.name);
        for (type_name, name) in &entries {
            out.push_str(&format!("    {:<width$} {};\n", type_name, name, width = longest));
        }
        out.push('}');
        out
    }
}

/// Declares a struct type field by field.
///
/// ```rust,ignore
/// let mut schema = Schema::new();
/// schema.define(
///     StructBuilder::new("Pair")
///         .field("a", ScalarKind::I32)
///         .field("b", ScalarKind::I32),
/// )?;
/// ```
#[derive(Debug, Clone)]
pub struct StructBuilder {
    name: String,
    parent: Option<String>,
    fields: Vec<(String, ElementType)>,
}

impl StructBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        StructBuilder {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Inherit every field of `parent`; own fields follow them.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: impl Into<ElementType>) -> Self {
        self.fields.push((name.into(), ty.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compute the offset table against the types already in `schema`.
    pub fn build(self, schema: &Schema) -> OverlayResult<StructLayout> {
        let (mut fields, mut offset, mut alignment) = match &self.parent {
            Some(parent) => {
                let parent = schema.resolve(parent)?;
                (parent.fields.clone(), parent.data_end(), parent.alignment)
            }
            None => (Vec::new(), 0, 1),
        };

        let mut index: HashMap<String, usize> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        for (name, ty) in self.fields {
            if index.contains_key(&name) {
                return Err(OverlayError::DuplicateField {
                    type_name: self.name,
                    field: name,
                });
            }
            ty.validate(schema)?;

            let field_alignment = ty.alignment(schema)?;
            let size = ty.size(schema)?;
            let (start, end) = align_up(offset, field_alignment)
                .and_then(|start| Some((start, start.checked_add(size)?)))
                .ok_or_else(|| too_large(&format!("{}.{}", self.name, name)))?;
            alignment = alignment.max(field_alignment);

            index.insert(name.clone(), fields.len());
            fields.push(FieldDescriptor {
                name,
                ty,
                offset: start,
                size,
                alignment: field_alignment,
            });
            offset = end;
        }

        let size = align_up(offset, alignment).ok_or_else(|| too_large(&self.name))?;
        Ok(StructLayout {
            self_type: ElementType::Struct(self.name.clone()),
            size,
            name: self.name,
            parent: self.parent,
            fields,
            index,
            alignment,
        })
    }
}
