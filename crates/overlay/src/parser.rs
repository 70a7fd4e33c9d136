//! Schema file parser: handles both plain JSON and `.xz` compressed files.
//!
//! A schema file lists struct declarations in dependency order:
//!
//! ```json
//! {
//!   "structs": [
//!     { "name": "Object", "fields": [
//!         { "name": "refcnt", "type": "ssize_t" },
//!         { "name": "type", "type": "TypeObject*" } ] },
//!     { "name": "List", "extends": "Object", "fields": [
//!         { "name": "size", "type": "ssize_t" },
//!         { "name": "items", "type": { "kind": "pointer", "subtype":
//!             { "kind": "array", "subtype": "Object*", "length": { "field": "size" } } } } ] }
//!   ]
//! }
//! ```
//!
//! A type is either a string or an object with a `kind`. Strings name a
//! scalar (`int`, `u32`, `size_t`, ...), `string`, `void`, `void*`, a struct,
//! or any of these followed by `*`.

use crate::error::{OverlayError, OverlayResult};
use crate::scalar::ScalarKind;
use crate::schema::Schema;
use crate::types::{ArrayLength, ElementType, Length, StructBuilder};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;
use xz2::read::XzDecoder;

/// Top-level schema file structure.
#[derive(Debug, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub structs: Vec<StructDef>,
}

/// One struct declaration.
#[derive(Debug, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

/// A field within a struct declaration.
#[derive(Debug, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_info: TypeInfo,
}

/// A field type, as a short name or a full description.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TypeInfo {
    Name(String),
    Spec(TypeSpec),
}

/// Full type description, recursive through `subtype`.
#[derive(Debug, Deserialize)]
pub struct TypeSpec {
    /// `base`, `pointer`, `array`, `string`, `struct` or `void`.
    pub kind: String,

    /// For kind="base" or kind="struct": the type name.
    #[serde(default)]
    pub name: Option<String>,

    /// For kind="pointer": the target (absent for `void*`).
    /// For kind="array": the item type.
    #[serde(default)]
    pub subtype: Option<Box<TypeInfo>>,

    /// For kind="array": fixed element count.
    #[serde(default)]
    pub count: Option<usize>,

    /// For kind="array": length read from a sibling field.
    #[serde(default)]
    pub length: Option<LengthSpec>,

    /// For kind="array": ends before the first all-zero item.
    #[serde(default)]
    pub null_terminated: bool,
}

/// Property length taken from an integer field of the owning struct.
#[derive(Debug, Deserialize)]
pub struct LengthSpec {
    pub field: String,
    /// Use the absolute value, for sign-encoded sizes.
    #[serde(default)]
    pub abs: bool,
}

/// Parse a schema file from a filesystem path.
///
/// Automatically detects compression:
/// - `.json.xz` or `.xz` → LZMA decompression then JSON parse
/// - `.json` or anything else → direct JSON parse
pub fn parse_schema_file(path: impl AsRef<Path>) -> OverlayResult<Schema> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut buf = Vec::new();

    if path.to_string_lossy().to_lowercase().ends_with(".xz") {
        XzDecoder::new(BufReader::new(file))
            .read_to_end(&mut buf)
            .map_err(|e| OverlayError::Schema(format!("decompressing {}: {}", path.display(), e)))?;
    } else {
        BufReader::new(file).read_to_end(&mut buf)?;
    }

    debug!("Read schema {} ({} bytes)", path.display(), buf.len());
    parse_schema_bytes(&buf)
}

/// Parse a schema from raw JSON bytes (already decompressed).
pub fn parse_schema_bytes(json_bytes: &[u8]) -> OverlayResult<Schema> {
    let file: SchemaFile =
        serde_json::from_slice(json_bytes).map_err(|e| OverlayError::Schema(e.to_string()))?;
    let mut schema = Schema::new();
    load_schema(file, &mut schema)?;
    Ok(schema)
}

/// Parse a schema from a JSON string.
pub fn parse_schema_str(json_str: &str) -> OverlayResult<Schema> {
    parse_schema_bytes(json_str.as_bytes())
}

/// Define every struct of `file` in `schema`, in file order.
pub fn load_schema(file: SchemaFile, schema: &mut Schema) -> OverlayResult<()> {
    for def in file.structs {
        let mut builder = StructBuilder::new(def.name.as_str());
        if let Some(parent) = def.extends {
            builder = builder.extends(parent);
        }
        for field in def.fields {
            let ty = resolve_type(&field.type_info).map_err(|e| match e {
                OverlayError::Schema(msg) => {
                    OverlayError::Schema(format!("{}.{}: {}", def.name, field.name, msg))
                }
                other => other,
            })?;
            builder = builder.field(field.name, ty);
        }
        schema.define(builder)?;
    }
    Ok(())
}

/// Convert a type description into an element type.
pub fn resolve_type(info: &TypeInfo) -> OverlayResult<ElementType> {
    match info {
        TypeInfo::Name(name) => resolve_name(name),
        TypeInfo::Spec(spec) => resolve_spec(spec),
    }
}

fn resolve_name(name: &str) -> OverlayResult<ElementType> {
    let name = name.trim();
    if name.is_empty() {
        return Err(OverlayError::Schema("empty type name".to_string()));
    }
    if let Some(kind) = ScalarKind::from_name(name) {
        return Ok(ElementType::Scalar(kind));
    }
    match name {
        "string" | "char[]" => Ok(ElementType::CString),
        "void" => Ok(ElementType::Opaque),
        "void*" | "pointer" => Ok(ElementType::void_pointer()),
        _ => match name.strip_suffix('*') {
            Some(target) => Ok(ElementType::pointer_to(resolve_name(target)?)),
            None => Ok(ElementType::structure(name)),
        },
    }
}

fn resolve_spec(spec: &TypeSpec) -> OverlayResult<ElementType> {
    let name = || {
        spec.name
            .as_deref()
            .ok_or_else(|| OverlayError::Schema(format!("kind \"{}\" needs a name", spec.kind)))
    };
    let subtype = || {
        spec.subtype
            .as_deref()
            .ok_or_else(|| OverlayError::Schema(format!("kind \"{}\" needs a subtype", spec.kind)))
    };

    match spec.kind.as_str() {
        "base" => {
            let name = name()?;
            ScalarKind::from_name(name)
                .map(ElementType::Scalar)
                .ok_or_else(|| OverlayError::Schema(format!("unknown base type \"{}\"", name)))
        }
        "struct" => Ok(ElementType::structure(name()?)),
        "string" => Ok(ElementType::CString),
        "void" => Ok(ElementType::Opaque),
        "pointer" => match &spec.subtype {
            Some(target) => Ok(ElementType::pointer_to(resolve_type(target)?)),
            None => Ok(ElementType::void_pointer()),
        },
        "array" => {
            let item = resolve_type(subtype()?)?;
            let length = match (spec.count, &spec.length, spec.null_terminated) {
                (Some(count), None, false) => ArrayLength::Fixed(count),
                (None, Some(LengthSpec { field, abs: false }), false) => {
                    ArrayLength::Property(Length::field(field.as_str()))
                }
                (None, Some(LengthSpec { field, abs: true }), false) => {
                    ArrayLength::Property(Length::abs_field(field.as_str()))
                }
                (None, None, true) => ArrayLength::NullTerminated,
                _ => {
                    return Err(OverlayError::Schema(
                        "array needs exactly one of count, length or null_terminated".to_string(),
                    ))
                }
            };
            Ok(ElementType::Array {
                item: Box::new(item),
                length,
            })
        }
        other => Err(OverlayError::Schema(format!("unknown type kind \"{}\"", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::POINTER_SIZE;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const OBJECTS: &str = r#"{
        "structs": [
            { "name": "Object", "fields": [
                { "name": "refcnt", "type": "ssize_t" },
                { "name": "type", "type": "TypeObject*" }
            ] },
            { "name": "VarObject", "extends": "Object", "fields": [
                { "name": "size", "type": "ssize_t" }
            ] },
            { "name": "TypeObject", "extends": "VarObject", "fields": [
                { "name": "name", "type": "string*" },
                { "name": "basicsize", "type": "ssize_t" }
            ] },
            { "name": "Tuple", "extends": "VarObject", "fields": [
                { "name": "items", "type": {
                    "kind": "array",
                    "subtype": "Object*",
                    "length": { "field": "size" }
                } }
            ] },
            { "name": "Argv", "fields": [
                { "name": "argv", "type": { "kind": "pointer", "subtype": {
                    "kind": "array", "subtype": { "kind": "pointer", "subtype": { "kind": "string" } },
                    "null_terminated": true
                } } },
                { "name": "digest", "type": { "kind": "array", "subtype": { "kind": "base", "name": "u8" }, "count": 16 } }
            ] }
        ]
    }"#;

    #[test]
    fn test_parse_objects() {
        let schema = parse_schema_str(OBJECTS).unwrap();
        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["Object", "VarObject", "TypeObject", "Tuple", "Argv"]
        );

        let type_object = schema.get("TypeObject").unwrap();
        assert_eq!(type_object.offset_of("name").unwrap(), 3 * POINTER_SIZE);
        assert_eq!(
            type_object.field("type").unwrap().ty.type_name(),
            "TypeObject*"
        );

        let tuple = schema.get("Tuple").unwrap();
        let items = tuple.field("items").unwrap();
        assert_eq!(items.offset, 3 * POINTER_SIZE);
        assert_eq!(items.size, 0);
        assert!(matches!(
            &items.ty,
            ElementType::Array { length: ArrayLength::Property(l), .. } if l.description() == "size"
        ));

        let argv = schema.get("Argv").unwrap();
        assert_eq!(argv.field("argv").unwrap().ty.type_name(), "char[]*[]*");
        assert_eq!(argv.field("digest").unwrap().ty.type_name(), "unsigned byte[16]");
        assert_eq!(argv.size(), POINTER_SIZE + 16);
    }

    #[test]
    fn test_resolve_names() {
        assert!(matches!(
            resolve_name("int").unwrap(),
            ElementType::Scalar(ScalarKind::I32)
        ));
        assert!(matches!(resolve_name("void*").unwrap(), ElementType::Pointer(None)));
        assert!(matches!(resolve_name("void").unwrap(), ElementType::Opaque));
        assert_eq!(resolve_name("int**").unwrap().type_name(), "int**");
        assert_eq!(resolve_name("Node").unwrap().type_name(), "Node");
        assert!(resolve_name(" ").is_err());
    }

    #[test]
    fn test_bad_array_spec() {
        let json = r#"{ "structs": [ { "name": "Bad", "fields": [
            { "name": "items", "type": { "kind": "array", "subtype": "int", "count": 2, "null_terminated": true } }
        ] } ] }"#;
        let err = parse_schema_str(json).unwrap_err();
        match err {
            OverlayError::Schema(msg) => assert!(msg.starts_with("Bad.items")),
            other => panic!("Expected Schema error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_and_bad_json() {
        let json = r#"{ "structs": [ { "name": "Bad", "fields": [
            { "name": "x", "type": { "kind": "union" } }
        ] } ] }"#;
        assert!(matches!(parse_schema_str(json), Err(OverlayError::Schema(_))));
        assert!(matches!(parse_schema_str("{"), Err(OverlayError::Schema(_))));
    }

    #[test]
    fn test_oversized_array_count() {
        let json = r#"{ "structs": [ { "name": "Huge", "fields": [
            { "name": "items", "type": { "kind": "array", "subtype": "int", "count": 18446744073709551615 } }
        ] } ] }"#;
        assert!(matches!(parse_schema_str(json), Err(OverlayError::Schema(_))));

        let json = r#"{ "structs": [ { "name": "Huge", "fields": [
            { "name": "tag", "type": "char" },
            { "name": "items", "type": { "kind": "array", "subtype": "char", "count": 18446744073709551615 } }
        ] } ] }"#;
        assert!(matches!(parse_schema_str(json), Err(OverlayError::Schema(_))));
    }

    #[test]
    fn test_embedded_before_definition() {
        let json = r#"{ "structs": [
            { "name": "Outer", "fields": [ { "name": "inner", "type": "Inner" } ] },
            { "name": "Inner", "fields": [ { "name": "x", "type": "int" } ] }
        ] }"#;
        assert!(matches!(
            parse_schema_str(json),
            Err(OverlayError::UnresolvedType(_))
        ));
    }

    #[test]
    fn test_parse_plain_file() {
        let mut tmpfile = NamedTempFile::new().unwrap();
        tmpfile.write_all(OBJECTS.as_bytes()).unwrap();
        tmpfile.flush().unwrap();

        let schema = parse_schema_file(tmpfile.path()).unwrap();
        assert_eq!(schema.len(), 5);
    }

    #[test]
    fn test_parse_xz_file() {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(OBJECTS.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut tmpfile = tempfile::Builder::new().suffix(".json.xz").tempfile().unwrap();
        tmpfile.write_all(&compressed).unwrap();
        tmpfile.flush().unwrap();

        let schema = parse_schema_file(tmpfile.path()).unwrap();
        assert!(schema.contains("Tuple"));
    }

    #[test]
    fn test_parse_file_not_found() {
        let result = parse_schema_file("/nonexistent/path.json");
        match result.unwrap_err() {
            OverlayError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected Io, got: {:?}", other),
        }
    }
}
