//! Fixed-width scalar codec.
//!
//! Every scalar is encoded in host-native byte order with size and alignment
//! equal to its native width. The overlay only ever targets the layouts of the
//! process it runs in (or a dump taken from the same architecture), so no
//! endianness conversion is offered.

use crate::error::{OverlayError, OverlayResult};
use std::fmt;

/// Width of a raw address on the host.
pub const POINTER_SIZE: usize = std::mem::size_of::<usize>();

/// The kind of a fixed-width scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    ISize,
    USize,
    F32,
    F64,
    Bool,
    /// A single byte rendered as a character.
    Char,
    /// An address-sized value holding a raw pointer.
    RawPointer,
}

/// A decoded scalar value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    ISize(isize),
    USize(usize),
    F32(f32),
    F64(f64),
    Bool(bool),
    Char(u8),
    RawPointer(u64),
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 15] = [
        ScalarKind::I8,
        ScalarKind::U8,
        ScalarKind::I16,
        ScalarKind::U16,
        ScalarKind::I32,
        ScalarKind::U32,
        ScalarKind::I64,
        ScalarKind::U64,
        ScalarKind::ISize,
        ScalarKind::USize,
        ScalarKind::F32,
        ScalarKind::F64,
        ScalarKind::Bool,
        ScalarKind::Char,
        ScalarKind::RawPointer,
    ];

    /// Native width in bytes.
    pub fn size(self) -> usize {
        match self {
            ScalarKind::I8 | ScalarKind::U8 | ScalarKind::Bool | ScalarKind::Char => 1,
            ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::U64 | ScalarKind::F64 => 8,
            ScalarKind::ISize | ScalarKind::USize | ScalarKind::RawPointer => POINTER_SIZE,
        }
    }

    /// Required alignment in bytes. Always the native width.
    pub fn alignment(self) -> usize {
        self.size()
    }

    /// The C spelling used in type names and declarations.
    pub fn c_name(self) -> &'static str {
        match self {
            ScalarKind::I8 => "byte",
            ScalarKind::U8 => "unsigned byte",
            ScalarKind::I16 => "short",
            ScalarKind::U16 => "unsigned short",
            ScalarKind::I32 => "int",
            ScalarKind::U32 => "unsigned int",
            ScalarKind::I64 => "long long",
            ScalarKind::U64 => "unsigned long long",
            ScalarKind::ISize => "ssize_t",
            ScalarKind::USize => "size_t",
            ScalarKind::F32 => "float",
            ScalarKind::F64 => "double",
            ScalarKind::Bool => "bool",
            ScalarKind::Char => "char",
            ScalarKind::RawPointer => "void*",
        }
    }

    /// Look up a kind by its C spelling or its Rust-style short name.
    pub fn from_name(name: &str) -> Option<ScalarKind> {
        let kind = match name {
            "i8" | "byte" | "signed char" | "int8_t" => ScalarKind::I8,
            "u8" | "unsigned byte" | "unsigned char" | "uint8_t" => ScalarKind::U8,
            "i16" | "short" | "int16_t" => ScalarKind::I16,
            "u16" | "unsigned short" | "uint16_t" => ScalarKind::U16,
            "i32" | "int" | "int32_t" => ScalarKind::I32,
            "u32" | "unsigned int" | "uint32_t" => ScalarKind::U32,
            "i64" | "long long" | "int64_t" => ScalarKind::I64,
            "u64" | "unsigned long long" | "uint64_t" => ScalarKind::U64,
            "isize" | "ssize_t" | "long" | "Py_ssize_t" => ScalarKind::ISize,
            "usize" | "size_t" | "unsigned long" | "Py_size_t" => ScalarKind::USize,
            "f32" | "float" => ScalarKind::F32,
            "f64" | "double" => ScalarKind::F64,
            "bool" | "_Bool" => ScalarKind::Bool,
            "char" => ScalarKind::Char,
            "raw_pointer" | "uintptr_t" => ScalarKind::RawPointer,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            ScalarKind::F32 | ScalarKind::F64 | ScalarKind::Bool | ScalarKind::Char
        )
    }

    /// Decode a scalar from exactly `self.size()` bytes.
    pub fn decode(self, bytes: &[u8]) -> OverlayResult<Scalar> {
        if bytes.len() != self.size() {
            return Err(OverlayError::size_mismatch(
                self.c_name(),
                self.size(),
                bytes.len(),
            ));
        }

        macro_rules! ne {
            ($t:ty) => {{
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }};
        }

        let value = match self {
            ScalarKind::I8 => Scalar::I8(ne!(i8)),
            ScalarKind::U8 => Scalar::U8(bytes[0]),
            ScalarKind::I16 => Scalar::I16(ne!(i16)),
            ScalarKind::U16 => Scalar::U16(ne!(u16)),
            ScalarKind::I32 => Scalar::I32(ne!(i32)),
            ScalarKind::U32 => Scalar::U32(ne!(u32)),
            ScalarKind::I64 => Scalar::I64(ne!(i64)),
            ScalarKind::U64 => Scalar::U64(ne!(u64)),
            ScalarKind::ISize => Scalar::ISize(ne!(isize)),
            ScalarKind::USize => Scalar::USize(ne!(usize)),
            ScalarKind::F32 => Scalar::F32(ne!(f32)),
            ScalarKind::F64 => Scalar::F64(ne!(f64)),
            ScalarKind::Bool => Scalar::Bool(bytes[0] != 0),
            ScalarKind::Char => Scalar::Char(bytes[0]),
            ScalarKind::RawPointer => Scalar::RawPointer(ne!(usize) as u64),
        };
        Ok(value)
    }

    /// Encode `value` as this kind, converting it first if needed.
    pub fn encode(self, value: Scalar) -> OverlayResult<Vec<u8>> {
        let bytes = match self.coerce(value)? {
            Scalar::I8(v) => v.to_ne_bytes().to_vec(),
            Scalar::U8(v) => vec![v],
            Scalar::I16(v) => v.to_ne_bytes().to_vec(),
            Scalar::U16(v) => v.to_ne_bytes().to_vec(),
            Scalar::I32(v) => v.to_ne_bytes().to_vec(),
            Scalar::U32(v) => v.to_ne_bytes().to_vec(),
            Scalar::I64(v) => v.to_ne_bytes().to_vec(),
            Scalar::U64(v) => v.to_ne_bytes().to_vec(),
            Scalar::ISize(v) => v.to_ne_bytes().to_vec(),
            Scalar::USize(v) => v.to_ne_bytes().to_vec(),
            Scalar::F32(v) => v.to_ne_bytes().to_vec(),
            Scalar::F64(v) => v.to_ne_bytes().to_vec(),
            Scalar::Bool(v) => vec![v as u8],
            Scalar::Char(v) => vec![v],
            Scalar::RawPointer(v) => (v as usize).to_ne_bytes().to_vec(),
        };
        Ok(bytes)
    }

    /// Convert `value` into this kind.
    ///
    /// Integers convert between widths only when the value fits. Floats accept
    /// floats and integers; nothing converts to an integer from a float.
    pub fn coerce(self, value: Scalar) -> OverlayResult<Scalar> {
        if value.kind() == self {
            return Ok(value);
        }
        let mismatch = || OverlayError::type_mismatch(self.c_name(), value.describe());

        match self {
            ScalarKind::F32 => value.as_f64().map(|v| Scalar::F32(v as f32)).ok_or_else(mismatch),
            ScalarKind::F64 => value.as_f64().map(Scalar::F64).ok_or_else(mismatch),
            ScalarKind::Bool => Err(mismatch()),
            _ => {
                let wide = value.as_i128().ok_or_else(mismatch)?;
                self.from_i128(wide).ok_or_else(mismatch)
            }
        }
    }

    fn from_i128(self, v: i128) -> Option<Scalar> {
        let value = match self {
            ScalarKind::I8 => Scalar::I8(i8::try_from(v).ok()?),
            ScalarKind::U8 => Scalar::U8(u8::try_from(v).ok()?),
            ScalarKind::I16 => Scalar::I16(i16::try_from(v).ok()?),
            ScalarKind::U16 => Scalar::U16(u16::try_from(v).ok()?),
            ScalarKind::I32 => Scalar::I32(i32::try_from(v).ok()?),
            ScalarKind::U32 => Scalar::U32(u32::try_from(v).ok()?),
            ScalarKind::I64 => Scalar::I64(i64::try_from(v).ok()?),
            ScalarKind::U64 => Scalar::U64(u64::try_from(v).ok()?),
            ScalarKind::ISize => Scalar::ISize(isize::try_from(v).ok()?),
            ScalarKind::USize => Scalar::USize(usize::try_from(v).ok()?),
            ScalarKind::Char => Scalar::Char(u8::try_from(v).ok()?),
            ScalarKind::RawPointer => Scalar::RawPointer(usize::try_from(v).ok()? as u64),
            ScalarKind::F32 | ScalarKind::F64 | ScalarKind::Bool => return None,
        };
        Some(value)
    }

    /// Parse a textual value (`42`, `-1`, `0x10`, `1.5`, `true`, `'a'`) as this kind.
    pub fn parse_value(self, text: &str) -> OverlayResult<Scalar> {
        let text = text.trim();
        let bad = || OverlayError::type_mismatch(self.c_name(), format!("{:?}", text));

        match self {
            ScalarKind::F32 | ScalarKind::F64 => {
                let v: f64 = text.parse().map_err(|_| bad())?;
                self.coerce(Scalar::F64(v))
            }
            ScalarKind::Bool => match text {
                "true" | "1" => Ok(Scalar::Bool(true)),
                "false" | "0" => Ok(Scalar::Bool(false)),
                _ => Err(bad()),
            },
            ScalarKind::Char
                if text.len() == 3 && text.starts_with('\'') && text.ends_with('\'') =>
            {
                Ok(Scalar::Char(text.as_bytes()[1]))
            }
            _ => {
                let (negative, digits) = match text.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, text),
                };
                let magnitude = match digits
                    .strip_prefix("0x")
                    .or_else(|| digits.strip_prefix("0X"))
                {
                    Some(hex) => i128::from_str_radix(hex, 16),
                    None => digits.parse::<i128>(),
                }
                .map_err(|_| bad())?;
                let v = if negative { -magnitude } else { magnitude };
                self.from_i128(v).ok_or_else(bad)
            }
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::I8(_) => ScalarKind::I8,
            Scalar::U8(_) => ScalarKind::U8,
            Scalar::I16(_) => ScalarKind::I16,
            Scalar::U16(_) => ScalarKind::U16,
            Scalar::I32(_) => ScalarKind::I32,
            Scalar::U32(_) => ScalarKind::U32,
            Scalar::I64(_) => ScalarKind::I64,
            Scalar::U64(_) => ScalarKind::U64,
            Scalar::ISize(_) => ScalarKind::ISize,
            Scalar::USize(_) => ScalarKind::USize,
            Scalar::F32(_) => ScalarKind::F32,
            Scalar::F64(_) => ScalarKind::F64,
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Char(_) => ScalarKind::Char,
            Scalar::RawPointer(_) => ScalarKind::RawPointer,
        }
    }

    /// Integer view of integer-like scalars (including chars and raw pointers).
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Scalar::I8(v) => Some(v as i128),
            Scalar::U8(v) => Some(v as i128),
            Scalar::I16(v) => Some(v as i128),
            Scalar::U16(v) => Some(v as i128),
            Scalar::I32(v) => Some(v as i128),
            Scalar::U32(v) => Some(v as i128),
            Scalar::I64(v) => Some(v as i128),
            Scalar::U64(v) => Some(v as i128),
            Scalar::ISize(v) => Some(v as i128),
            Scalar::USize(v) => Some(v as i128),
            Scalar::Char(v) => Some(v as i128),
            Scalar::RawPointer(v) => Some(v as i128),
            Scalar::F32(_) | Scalar::F64(_) | Scalar::Bool(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::F32(v) => Some(v as f64),
            Scalar::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Scalar::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        format!("{} {}", self.kind().c_name(), self)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Scalar::F32(v) => write!(f, "{:?}", v),
            Scalar::F64(v) => write!(f, "{:?}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Char(v) => write!(f, "'{}'", std::ascii::escape_default(v)),
            Scalar::RawPointer(v) => write!(f, "{:#x}", v),
            _ => match self.as_i128() {
                Some(v) => write!(f, "{}", v),
                None => Ok(()),
            },
        }
    }
}

macro_rules! scalar_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Scalar {
                fn from(v: $t) -> Self {
                    Scalar::$variant(v)
                }
            }
        )*
    };
}

scalar_from! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    isize => ISize,
    usize => USize,
    f32 => F32,
    f64 => F64,
    bool => Bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_native_widths() {
        assert_eq!(ScalarKind::I8.size(), 1);
        assert_eq!(ScalarKind::U16.size(), 2);
        assert_eq!(ScalarKind::I32.size(), 4);
        assert_eq!(ScalarKind::F64.size(), 8);
        assert_eq!(ScalarKind::RawPointer.size(), std::mem::size_of::<*const u8>());
        for kind in ScalarKind::ALL {
            assert_eq!(kind.size(), kind.alignment(), "{}", kind);
        }
    }

    #[test]
    fn test_round_trip_extremes() {
        let values = [
            Scalar::I8(i8::MIN),
            Scalar::U8(u8::MAX),
            Scalar::I16(-12345),
            Scalar::U16(u16::MAX),
            Scalar::I32(i32::MIN),
            Scalar::U32(0xDEAD_BEEF),
            Scalar::I64(i64::MIN),
            Scalar::U64(u64::MAX),
            Scalar::ISize(-1),
            Scalar::USize(usize::MAX),
            Scalar::F32(-0.5),
            Scalar::F64(std::f64::consts::PI),
            Scalar::Bool(true),
            Scalar::Char(b'z'),
            Scalar::RawPointer(0x7fff_0000_1000),
        ];
        for value in values {
            let kind = value.kind();
            let bytes = kind.encode(value).unwrap();
            assert_eq!(bytes.len(), kind.size());
            assert_eq!(kind.decode(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn test_host_byte_order() {
        let bytes = ScalarKind::I32.encode(Scalar::I32(1)).unwrap();
        assert_eq!(bytes, 1i32.to_ne_bytes());
    }

    #[test]
    fn test_decode_wrong_length() {
        let err = ScalarKind::I32.decode(&[1, 2, 3]).unwrap_err();
        assert!(err.is_size_mismatch());
    }

    #[test]
    fn test_coerce_between_widths() {
        assert_eq!(ScalarKind::U8.coerce(Scalar::I32(200)).unwrap(), Scalar::U8(200));
        assert!(ScalarKind::U8.coerce(Scalar::I32(300)).is_err());
        assert!(ScalarKind::U32.coerce(Scalar::I32(-1)).is_err());
        assert_eq!(ScalarKind::F64.coerce(Scalar::I32(3)).unwrap(), Scalar::F64(3.0));
        assert!(ScalarKind::I32.coerce(Scalar::F64(1.0)).is_err());
        assert!(ScalarKind::Bool.coerce(Scalar::I32(1)).is_err());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(ScalarKind::I32.parse_value("-7").unwrap(), Scalar::I32(-7));
        assert_eq!(ScalarKind::U64.parse_value("0x10").unwrap(), Scalar::U64(16));
        assert_eq!(ScalarKind::F32.parse_value("1.5").unwrap(), Scalar::F32(1.5));
        assert_eq!(ScalarKind::Bool.parse_value("true").unwrap(), Scalar::Bool(true));
        assert_eq!(ScalarKind::Char.parse_value("'a'").unwrap(), Scalar::Char(b'a'));
        assert!(ScalarKind::U8.parse_value("256").is_err());
        assert!(ScalarKind::I32.parse_value("nope").is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(ScalarKind::from_name("int"), Some(ScalarKind::I32));
        assert_eq!(ScalarKind::from_name("ssize_t"), Some(ScalarKind::ISize));
        assert_eq!(ScalarKind::from_name("u16"), Some(ScalarKind::U16));
        assert_eq!(ScalarKind::from_name("PyObject"), None);
        assert_eq!(ScalarKind::U32.c_name(), "unsigned int");
    }

    #[test]
    fn test_display() {
        assert_eq!(Scalar::I32(-3).to_string(), "-3");
        assert_eq!(Scalar::F64(1.0).to_string(), "1.0");
        assert_eq!(Scalar::Char(b'a').to_string(), "'a'");
        assert_eq!(Scalar::RawPointer(255).to_string(), "0xff");
    }
}
