//! # Value Codec
//!
//! Purpose: Convert typed scalar values to and from the canonical text the
//! store keeps, so every typed `set`/`get` goes through one string primitive.
//!
//! ## Canonical Forms
//! - Booleans are the literal tokens `true` and `false`.
//! - Integers are plain decimal.
//! - Floats are fixed-point (never scientific) and use the shortest digits that
//!   parse back to the same value, so `decode(encode(v)) == v` holds exactly.
//!
//! Decoding is strict: empty text, whitespace and trailing garbage fail.

use std::fmt;

use crate::error::{CodecError, CodecResult};

/// Discriminant of a `TypedValue`, used to request a decode target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Str,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Str => "string",
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::U8 => "u8",
            ValueKind::I16 => "i16",
            ValueKind::U16 => "u16",
            ValueKind::I32 => "i32",
            ValueKind::U32 => "u32",
            ValueKind::I64 => "i64",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A value the store can hold under a key or inside a queue.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Str(String),
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl TypedValue {
    /// Returns the kind this value decodes back as.
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Str(_) => ValueKind::Str,
            TypedValue::Bool(_) => ValueKind::Bool,
            TypedValue::I8(_) => ValueKind::I8,
            TypedValue::U8(_) => ValueKind::U8,
            TypedValue::I16(_) => ValueKind::I16,
            TypedValue::U16(_) => ValueKind::U16,
            TypedValue::I32(_) => ValueKind::I32,
            TypedValue::U32(_) => ValueKind::U32,
            TypedValue::I64(_) => ValueKind::I64,
            TypedValue::U64(_) => ValueKind::U64,
            TypedValue::F32(_) => ValueKind::F32,
            TypedValue::F64(_) => ValueKind::F64,
        }
    }
}

/// Encodes a value into its canonical text.
pub fn encode(value: &TypedValue) -> String {
    match value {
        TypedValue::Str(text) => text.clone(),
        TypedValue::Bool(flag) => flag.to_string(),
        TypedValue::I8(v) => v.to_string(),
        TypedValue::U8(v) => v.to_string(),
        TypedValue::I16(v) => v.to_string(),
        TypedValue::U16(v) => v.to_string(),
        TypedValue::I32(v) => v.to_string(),
        TypedValue::U32(v) => v.to_string(),
        TypedValue::I64(v) => v.to_string(),
        TypedValue::U64(v) => v.to_string(),
        // `Display` for floats never switches to exponent notation.
        TypedValue::F32(v) => v.to_string(),
        TypedValue::F64(v) => v.to_string(),
    }
}

/// Encodes a possibly absent string. `None` is the only encode failure.
pub fn encode_nullable(value: Option<&str>) -> CodecResult<String> {
    value.map(str::to_owned).ok_or(CodecError::NullString)
}

/// Decodes text as the requested kind. The whole text must be consumed.
pub fn decode(text: &str, kind: ValueKind) -> CodecResult<TypedValue> {
    let invalid = || CodecError::Invalid {
        kind,
        text: text.to_owned(),
    };

    let value = match kind {
        ValueKind::Str => TypedValue::Str(text.to_owned()),
        ValueKind::Bool => match text {
            "true" => TypedValue::Bool(true),
            "false" => TypedValue::Bool(false),
            _ => return Err(invalid()),
        },
        ValueKind::I8 => TypedValue::I8(text.parse().map_err(|_| invalid())?),
        ValueKind::U8 => TypedValue::U8(text.parse().map_err(|_| invalid())?),
        ValueKind::I16 => TypedValue::I16(text.parse().map_err(|_| invalid())?),
        ValueKind::U16 => TypedValue::U16(text.parse().map_err(|_| invalid())?),
        ValueKind::I32 => TypedValue::I32(text.parse().map_err(|_| invalid())?),
        ValueKind::U32 => TypedValue::U32(text.parse().map_err(|_| invalid())?),
        ValueKind::I64 => TypedValue::I64(text.parse().map_err(|_| invalid())?),
        ValueKind::U64 => TypedValue::U64(text.parse().map_err(|_| invalid())?),
        ValueKind::F32 => TypedValue::F32(text.parse().map_err(|_| invalid())?),
        ValueKind::F64 => TypedValue::F64(text.parse().map_err(|_| invalid())?),
    };
    Ok(value)
}

/// Outcome of a per-element codec pass over a list.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    /// Elements that converted, in input order.
    pub items: Vec<T>,
    /// Number of elements that failed.
    pub failures: usize,
}

impl<T> Batch<T> {
    /// True when no element failed.
    pub fn is_complete(&self) -> bool {
        self.failures == 0
    }
}

/// Encodes every value. Never aborts; `failures` stays 0 for well-formed input.
pub fn encode_all<'a, I>(values: I) -> Batch<String>
where
    I: IntoIterator<Item = &'a TypedValue>,
{
    Batch {
        items: values.into_iter().map(encode).collect(),
        failures: 0,
    }
}

/// Decodes every text, keeping the successes and counting the failures.
pub fn decode_all<I, S>(texts: I, kind: ValueKind) -> Batch<TypedValue>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut batch = Batch {
        items: Vec::new(),
        failures: 0,
    };
    for text in texts {
        match decode(text.as_ref(), kind) {
            Ok(value) => batch.items.push(value),
            Err(_) => batch.failures += 1,
        }
    }
    batch
}

/// Rust types with a `TypedValue` counterpart.
pub trait Storable: Sized {
    const KIND: ValueKind;

    fn into_value(self) -> TypedValue;

    /// Returns `None` when the value holds a different kind.
    fn from_value(value: TypedValue) -> Option<Self>;
}

macro_rules! storable {
    ($ty:ty, $variant:ident) => {
        impl Storable for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_value(self) -> TypedValue {
                TypedValue::$variant(self)
            }

            fn from_value(value: TypedValue) -> Option<Self> {
                match value {
                    TypedValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for TypedValue {
            fn from(value: $ty) -> Self {
                TypedValue::$variant(value)
            }
        }
    };
}

storable!(String, Str);
storable!(bool, Bool);
storable!(i8, I8);
storable!(u8, U8);
storable!(i16, I16);
storable!(u16, U16);
storable!(i32, I32);
storable!(u32, U32);
storable!(i64, I64);
storable!(u64, U64);
storable!(f32, F32);
storable!(f64, F64);

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::Str(value.to_owned())
    }
}

impl From<&String> for TypedValue {
    fn from(value: &String) -> Self {
        TypedValue::Str(value.clone())
    }
}
