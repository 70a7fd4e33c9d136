//! Schema-driven typed overlays over raw memory.
//!
//! This crate reads and writes memory at arbitrary addresses as if it held
//! typed values, without copying it into a separate representation first.
//! It provides:
//!
//! - Struct layouts computed once per type from an ordered field list, with
//!   native alignment padding and single inheritance
//! - Lazy elements: scalars, pointers, fixed, property-length and
//!   null-terminated arrays, and zero-terminated strings
//! - Cycle-safe rendering of whole object graphs
//! - Backing stores for in-memory buffers, memory-mapped dumps and live
//!   process memory (`/proc/<pid>/mem`)
//! - A JSON schema format (`.json` or `.json.xz`)
//!
//! Multi-byte values use the host's byte order and alignment rules, matching
//! the layouts of the process being inspected.
//!
//! # Example
//!
//! ```rust,ignore
//! use overlay::{BufferStore, Overlay, ScalarKind, Schema, StructBuilder, Value};
//!
//! let mut schema = Schema::new();
//! schema.define(
//!     StructBuilder::new("Pair")
//!         .field("a", ScalarKind::I32)
//!         .field("b", ScalarKind::I32),
//! )?;
//!
//! let store = BufferStore::new(0x1000, vec![1, 0, 0, 0, 2, 0, 0, 0]);
//! let pair = Overlay::new(&schema, &store).structure("Pair", 0x1000)?;
//! pair.set("b", &Value::from(99i32))?;
//! println!("{}", pair.as_element());
//! ```

pub mod array;
pub mod config;
pub mod element;
pub mod error;
pub mod parser;
pub mod pointer;
pub mod repr;
pub mod scalar;
pub mod schema;
pub mod store;
pub mod string;
pub mod structure;
pub mod types;
pub mod value;

// Re-export key types at crate root.
pub use array::ArrayView;
pub use config::{OverlayConfig, ReprLayout, ReprOptions, ReprStyle, DEFAULT_MAX_SCAN};
pub use element::{Element, Overlay, ScalarView, View};
pub use error::{OverlayError, OverlayResult};
pub use parser::{parse_schema_bytes, parse_schema_file, parse_schema_str};
pub use pointer::PointerView;
pub use repr::render;
pub use scalar::{Scalar, ScalarKind, POINTER_SIZE};
pub use schema::Schema;
pub use store::{BackingStore, BufferStore, MappedFileStore};
#[cfg(target_os = "linux")]
pub use store::ProcessMemory;
pub use string::StringView;
pub use structure::StructView;
pub use types::{ArrayLength, ElementType, FieldDescriptor, Length, StructBuilder, StructLayout};
pub use value::Value;
