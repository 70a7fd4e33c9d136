//! Elements: typed, lazily evaluated handles onto memory.
//!
//! An [`Element`] is a `Copy` pair of a type and an absolute address, plus the
//! [`Overlay`] it reads through. Creating one never touches memory; every
//! `get`/`set` goes to the backing store at the time of the call, so values
//! changed behind the overlay's back are always observed.
//!
//! # Safety of the model
//!
//! Elements borrow raw addresses without owning or tracking them. Nothing
//! checks that the memory at an address has the declared shape, or that it is
//! still alive. When the store is the live address space of the current
//! process, writing through an element with the wrong schema corrupts that
//! process. This is the one place where the type system cannot help: keeping
//! schema and address in agreement is entirely the caller's job.

use crate::array::ArrayView;
use crate::config::{OverlayConfig, ReprOptions, DEFAULT_CONFIG};
use crate::error::{OverlayError, OverlayResult};
use crate::pointer::PointerView;
use crate::repr;
use crate::scalar::{Scalar, ScalarKind, POINTER_SIZE};
use crate::schema::Schema;
use crate::store::BackingStore;
use crate::string::StringView;
use crate::structure::StructView;
use crate::types::ElementType;
use crate::value::Value;
use std::fmt;
use tracing::trace;

/// Type of the target of an untyped pointer.
pub(crate) static OPAQUE: ElementType = ElementType::Opaque;

/// Schema, store and configuration shared by every element of one overlay.
#[derive(Clone, Copy)]
pub struct Overlay<'a> {
    schema: &'a Schema,
    store: &'a dyn BackingStore,
    config: &'a OverlayConfig,
}

impl<'a> Overlay<'a> {
    pub fn new(schema: &'a Schema, store: &'a dyn BackingStore) -> Self {
        Overlay {
            schema,
            store,
            config: &DEFAULT_CONFIG,
        }
    }

    pub fn with_config(mut self, config: &'a OverlayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn store(&self) -> &'a dyn BackingStore {
        self.store
    }

    pub fn config(&self) -> &'a OverlayConfig {
        self.config
    }

    /// An element of type `ty` at `address`.
    pub fn element(&self, ty: &'a ElementType, address: u64) -> Element<'a> {
        Element::new(*self, ty, address, None)
    }

    /// An instance of the named struct at `address`.
    pub fn structure(&self, name: &str, address: u64) -> OverlayResult<StructView<'a>> {
        let layout = self.schema.resolve(name)?;
        Ok(StructView::new(*self, layout, address))
    }

    /// `address + offset`. Ranges that wrap past the top of the address
    /// space are reported as access violations.
    pub(crate) fn offset(&self, address: u64, offset: usize) -> OverlayResult<u64> {
        address
            .checked_add(offset as u64)
            .ok_or_else(|| self.overflow(address, offset))
    }

    pub(crate) fn overflow(&self, address: u64, length: usize) -> OverlayError {
        OverlayError::access_violation(
            self.store.name(),
            address,
            length,
            "range wraps past the end of the address space",
        )
    }

    pub(crate) fn read(&self, address: u64, length: usize) -> OverlayResult<Vec<u8>> {
        trace!("read {:#x} (+{})", address, length);
        self.store.read(address, length)
    }

    pub(crate) fn write(&self, address: u64, bytes: &[u8]) -> OverlayResult<()> {
        trace!("write {:#x} (+{})", address, bytes.len());
        self.store.write(address, bytes)
    }
}

impl fmt::Debug for Overlay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("store", &self.store.name())
            .field("types", &self.schema.len())
            .finish()
    }
}

/// A typed handle onto memory at one address.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    overlay: Overlay<'a>,
    ty: &'a ElementType,
    address: u64,
    /// The struct instance this element belongs to, if any. Property-length
    /// arrays evaluate their length against it.
    owner: Option<StructView<'a>>,
}

/// An element resolved to its kind.
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    Scalar(ScalarView<'a>),
    Pointer(PointerView<'a>),
    Array(ArrayView<'a>),
    String(StringView<'a>),
    Struct(StructView<'a>),
    /// Untyped memory at this address.
    Opaque(u64),
}

impl<'a> Element<'a> {
    pub(crate) fn new(
        overlay: Overlay<'a>,
        ty: &'a ElementType,
        address: u64,
        owner: Option<StructView<'a>>,
    ) -> Self {
        Element {
            overlay,
            ty,
            address,
            owner,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn ty(&self) -> &'a ElementType {
        self.ty
    }

    pub fn type_name(&self) -> String {
        self.ty.type_name()
    }

    pub fn overlay(&self) -> Overlay<'a> {
        self.overlay
    }

    pub fn owner(&self) -> Option<StructView<'a>> {
        self.owner
    }

    pub fn alignment(&self) -> OverlayResult<usize> {
        self.ty.alignment(self.overlay.schema())
    }

    /// Size of this instance in bytes. For dynamically sized elements this
    /// reads memory (array length, string terminator).
    pub fn size(&self) -> OverlayResult<usize> {
        match self.view()? {
            View::Scalar(s) => Ok(s.kind().size()),
            View::Pointer(_) => Ok(POINTER_SIZE),
            View::Array(a) => a.byte_len(),
            View::String(s) => s.byte_len(),
            View::Struct(s) => Ok(s.layout().size()),
            View::Opaque(_) => Ok(0),
        }
    }

    /// Resolve the element to its kind. Never reads memory.
    pub fn view(&self) -> OverlayResult<View<'a>> {
        let view = match self.ty {
            ElementType::Scalar(kind) => View::Scalar(ScalarView {
                element: *self,
                kind: *kind,
            }),
            ElementType::Pointer(target) => {
                View::Pointer(PointerView::new(*self, target.as_deref()))
            }
            ElementType::Array { item, length } => View::Array(ArrayView::new(*self, item, length)),
            ElementType::CString => View::String(StringView::new(*self)),
            ElementType::Struct(name) => {
                let layout = self.overlay.schema().resolve(name)?;
                View::Struct(StructView::new(self.overlay, layout, self.address))
            }
            ElementType::Opaque => View::Opaque(self.address),
        };
        Ok(view)
    }

    pub fn as_scalar(&self) -> OverlayResult<ScalarView<'a>> {
        match self.view()? {
            View::Scalar(s) => Ok(s),
            _ => Err(self.wrong_kind("scalar")),
        }
    }

    pub fn as_pointer(&self) -> OverlayResult<PointerView<'a>> {
        match self.view()? {
            View::Pointer(p) => Ok(p),
            _ => Err(self.wrong_kind("pointer")),
        }
    }

    pub fn as_array(&self) -> OverlayResult<ArrayView<'a>> {
        match self.view()? {
            View::Array(a) => Ok(a),
            _ => Err(self.wrong_kind("array")),
        }
    }

    pub fn as_string(&self) -> OverlayResult<StringView<'a>> {
        match self.view()? {
            View::String(s) => Ok(s),
            _ => Err(self.wrong_kind("string")),
        }
    }

    pub fn as_struct(&self) -> OverlayResult<StructView<'a>> {
        match self.view()? {
            View::Struct(s) => Ok(s),
            View::Opaque(_) => Err(self.untyped()),
            _ => Err(self.wrong_kind("struct")),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> OverlayResult<Value> {
        match self.view()? {
            View::Scalar(s) => s.get().map(Value::Scalar),
            View::Pointer(p) => p.read().map(Value::Address),
            View::Array(a) => a.get().map(Value::List),
            View::String(s) => s.value(),
            View::Struct(s) => s.record().map(Value::Record),
            View::Opaque(_) => Err(self.untyped()),
        }
    }

    /// Overwrite the current value.
    pub fn set(&self, value: &Value) -> OverlayResult<()> {
        match (self.view()?, value) {
            (View::Scalar(s), Value::Scalar(v)) => s.set(*v),
            (View::Scalar(s), Value::Address(a)) => s.set(Scalar::RawPointer(*a)),
            (View::Pointer(p), v) => match v.as_address() {
                Some(address) => p.write(address),
                None => Err(self.wrong_value("address", v)),
            },
            (View::Array(a), Value::List(items)) => a.set(items),
            (View::String(s), Value::Text(text)) => s.set(text),
            (View::String(s), Value::Bytes(bytes)) => s.set_bytes(bytes),
            (View::Struct(s), Value::Record(fields)) => s.set_record(fields),
            (View::Opaque(_), _) => Err(self.untyped()),
            (_, v) => Err(self.wrong_value(&self.type_name(), v)),
        }
    }

    /// Copy the current value of `other` into this element.
    pub fn assign_from(&self, other: &Element<'_>) -> OverlayResult<()> {
        self.set(&other.get()?)
    }

    /// Follow a dotted path of struct fields, array indices and pointer
    /// dereferences, e.g. `ob_type.tp_name` or `items.3.key`.
    pub fn path(&self, path: &str) -> OverlayResult<Element<'a>> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(*self, |current, segment| current.step(segment))
    }

    fn step(&self, segment: &str) -> OverlayResult<Element<'a>> {
        match self.view()? {
            View::Struct(s) => s.field(segment),
            View::Pointer(p) => p.target()?.step(segment),
            View::Array(a) => {
                let index = segment
                    .parse::<usize>()
                    .map_err(|_| OverlayError::type_mismatch("array index", segment))?;
                a.item(index)
            }
            View::Opaque(_) => Err(self.untyped()),
            _ => Err(self.wrong_kind("struct, pointer or array")),
        }
    }

    /// Render the current value. See [`repr::render`].
    pub fn render(&self, options: &ReprOptions) -> OverlayResult<String> {
        repr::render(self, options)
    }

    fn wrong_kind(&self, expected: &str) -> OverlayError {
        OverlayError::type_mismatch(
            expected,
            format!("{} at {:#x}", self.type_name(), self.address),
        )
    }

    fn wrong_value(&self, expected: &str, value: &Value) -> OverlayError {
        OverlayError::type_mismatch(expected, format!("{} value", value.kind_name()))
    }

    fn untyped(&self) -> OverlayError {
        OverlayError::unresolved(format!("untyped memory at {:#x}", self.address))
    }
}

impl fmt::Display for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render(&self.overlay.config().repr) {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "<error: {}>", e),
        }
    }
}

/// A fixed-width scalar in memory.
#[derive(Debug, Clone, Copy)]
pub struct ScalarView<'a> {
    element: Element<'a>,
    kind: ScalarKind,
}

impl<'a> ScalarView<'a> {
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn element(&self) -> Element<'a> {
        self.element
    }

    pub fn get(&self) -> OverlayResult<Scalar> {
        let bytes = self
            .element
            .overlay
            .read(self.element.address, self.kind.size())?;
        self.kind.decode(&bytes)
    }

    /// Encode `value` as this scalar's kind and write it. Conversion errors
    /// are raised before anything is written.
    pub fn set(&self, value: impl Into<Scalar>) -> OverlayResult<()> {
        let bytes = self.kind.encode(value.into())?;
        self.element.overlay.write(self.element.address, &bytes)
    }

    /// Parse `text` as this scalar's kind and write it.
    pub fn set_from_str(&self, text: &str) -> OverlayResult<()> {
        self.set(self.kind.parse_value(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BufferStore;
    use crate::types::StructBuilder;

    const BASE: u64 = 0x1000;

    fn pair_schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .define(
                StructBuilder::new("Pair")
                    .field("a", ScalarKind::I32)
                    .field("b", ScalarKind::I32),
            )
            .unwrap();
        schema
    }

    fn pair_store(a: i32, b: i32) -> BufferStore {
        let mut bytes = a.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&b.to_ne_bytes());
        BufferStore::new(BASE, bytes)
    }

    #[test]
    fn test_scalar_get_set() {
        let schema = Schema::new();
        let store = BufferStore::zeroed(BASE, 8);
        let overlay = Overlay::new(&schema, &store);
        let ty = ElementType::scalar(ScalarKind::U16);
        let element = overlay.element(&ty, BASE + 2);

        element.set(&Value::from(513u16)).unwrap();
        assert_eq!(element.get().unwrap(), Value::from(513u16));
        assert_eq!(&store.snapshot()[2..4], &513u16.to_ne_bytes());
        assert_eq!(element.size().unwrap(), 2);
    }

    #[test]
    fn test_scalar_conversion_failure_writes_nothing() {
        let schema = Schema::new();
        let store = BufferStore::zeroed(BASE, 4);
        let overlay = Overlay::new(&schema, &store);
        let ty = ElementType::scalar(ScalarKind::U8);
        let element = overlay.element(&ty, BASE);

        assert!(element.set(&Value::from(1000i32)).is_err());
        assert!(element.set(&Value::from("text")).is_err());
        assert_eq!(store.snapshot(), vec![0; 4]);
    }

    #[test]
    fn test_struct_round_trip() {
        let schema = pair_schema();
        let store = pair_store(1, 2);
        let overlay = Overlay::new(&schema, &store);
        let pair = overlay.structure("Pair", BASE).unwrap().as_element();

        let value = pair.get().unwrap();
        assert_eq!(value.field("a"), Some(&Value::from(1i32)));
        assert_eq!(value.field("b"), Some(&Value::from(2i32)));

        pair.set(&value).unwrap();
        assert_eq!(store.snapshot(), pair_store(1, 2).snapshot());
    }

    #[test]
    fn test_assign_from() {
        let schema = pair_schema();
        let mut bytes = pair_store(5, 6).snapshot();
        bytes.extend_from_slice(&[0u8; 8]);
        let store = BufferStore::new(BASE, bytes);
        let overlay = Overlay::new(&schema, &store);

        let source = overlay.structure("Pair", BASE).unwrap().as_element();
        let target = overlay.structure("Pair", BASE + 8).unwrap().as_element();
        target.assign_from(&source).unwrap();
        assert_eq!(target.get().unwrap(), source.get().unwrap());
    }

    #[test]
    fn test_path() {
        let mut schema = pair_schema();
        schema
            .define(
                StructBuilder::new("Holder")
                    .field("pairs", ElementType::array(ElementType::structure("Pair"), 2))
                    .field("next", ElementType::pointer_to(ElementType::structure("Pair"))),
            )
            .unwrap();

        let mut bytes = Vec::new();
        for v in [1i32, 2, 3, 4] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        bytes.extend_from_slice(&(BASE as usize).to_ne_bytes());
        let store = BufferStore::new(BASE, bytes);
        let overlay = Overlay::new(&schema, &store);
        let holder = overlay.structure("Holder", BASE).unwrap().as_element();

        assert_eq!(holder.path("pairs.1.b").unwrap().get().unwrap(), Value::from(4i32));
        assert_eq!(holder.path("next.a").unwrap().get().unwrap(), Value::from(1i32));
        assert!(holder.path("pairs.7").is_err());
        assert!(holder.path("missing").is_err());
        assert!(holder.path("pairs.0.a.x").is_err());
    }

    #[test]
    fn test_opaque_is_unresolved() {
        let schema = Schema::new();
        let store = BufferStore::zeroed(BASE, 8);
        let overlay = Overlay::new(&schema, &store);
        let element = overlay.element(&OPAQUE, BASE);

        assert!(matches!(element.get(), Err(OverlayError::UnresolvedType(_))));
        assert!(matches!(element.as_struct(), Err(OverlayError::UnresolvedType(_))));
        assert_eq!(element.size().unwrap(), 0);
    }

    #[test]
    fn test_unknown_struct_name() {
        let schema = Schema::new();
        let store = BufferStore::zeroed(BASE, 8);
        let overlay = Overlay::new(&schema, &store);
        assert!(matches!(
            overlay.structure("Nope", BASE),
            Err(OverlayError::UnresolvedType(_))
        ));
    }

    #[test]
    fn test_set_from_str() {
        let schema = pair_schema();
        let store = pair_store(0, 0);
        let overlay = Overlay::new(&schema, &store);
        let pair = overlay.structure("Pair", BASE).unwrap();

        pair.field("b").unwrap().as_scalar().unwrap().set_from_str("-9").unwrap();
        assert_eq!(pair.get("b").unwrap(), Value::from(-9i32));
    }
}
