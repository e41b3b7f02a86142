//! Closed classification of values by wire-level shape.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::Value;

/// The semantic kind of a value.
///
/// Every value handled by the engine maps to exactly one kind, and the kind
/// decides which emitter and parser calls are legal for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Nil,
    Bool,
    Int,
    Uint,
    Float,
    String,
    Bytes,
    Time,
    Duration,
    Error,
    Array,
    Map,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Nil => "nil",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Time => "time",
            Kind::Duration => "duration",
            Kind::Error => "error",
            Kind::Array => "array",
            Kind::Map => "map",
        }
    }

    /// Int, Uint and Float convert into each other on decode.
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Int | Kind::Uint | Kind::Float)
    }

    /// String and Bytes are interchangeable octet sequences.
    pub fn is_text(self) -> bool {
        matches!(self, Kind::String | Kind::Bytes)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A borrowed view of a built-in value recognized behind `dyn Any`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scalar<'a> {
    Bool(bool),
    Int(i64, u8),
    Uint(u64, u8),
    Float(f64, u8),
    String(&'a str),
    Bytes(&'a [u8]),
    Time(&'a DateTime<Utc>),
    Duration(TimeDelta),
    StdDuration(std::time::Duration),
    Value(&'a Value),
}

impl Scalar<'_> {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Scalar::Bool(_) => Kind::Bool,
            Scalar::Int(..) => Kind::Int,
            Scalar::Uint(..) => Kind::Uint,
            Scalar::Float(..) => Kind::Float,
            Scalar::String(_) => Kind::String,
            Scalar::Bytes(_) => Kind::Bytes,
            Scalar::Time(_) => Kind::Time,
            Scalar::Duration(_) | Scalar::StdDuration(_) => Kind::Duration,
            Scalar::Value(v) => v.kind(),
        }
    }
}

macro_rules! recognize {
    ($v:expr, $($t:ty => |$x:ident| $e:expr),+ $(,)?) => {
        $(
            if let Some($x) = $v.downcast_ref::<$t>() {
                return Some($e);
            }
        )+
    };
}

/// Recognizes the built-in scalar types, then the well-known time types, then
/// the dynamic [`Value`].
pub(crate) fn scalar_of(v: &dyn Any) -> Option<Scalar<'_>> {
    recognize!(v,
        bool => |x| Scalar::Bool(*x),
        i8 => |x| Scalar::Int(*x as i64, 8),
        i16 => |x| Scalar::Int(*x as i64, 16),
        i32 => |x| Scalar::Int(*x as i64, 32),
        i64 => |x| Scalar::Int(*x, 64),
        isize => |x| Scalar::Int(*x as i64, 64),
        u8 => |x| Scalar::Uint(*x as u64, 8),
        u16 => |x| Scalar::Uint(*x as u64, 16),
        u32 => |x| Scalar::Uint(*x as u64, 32),
        u64 => |x| Scalar::Uint(*x, 64),
        usize => |x| Scalar::Uint(*x as u64, 64),
        f32 => |x| Scalar::Float(*x as f64, 32),
        f64 => |x| Scalar::Float(*x, 64),
        String => |x| Scalar::String(x.as_str()),
        &'static str => |x| Scalar::String(x),
        Vec<u8> => |x| Scalar::Bytes(x.as_slice()),
        DateTime<Utc> => |x| Scalar::Time(x),
        TimeDelta => |x| Scalar::Duration(*x),
        std::time::Duration => |x| Scalar::StdDuration(*x),
        Value => |x| Scalar::Value(x),
    );
    None
}

/// Classifies a type-erased value among the built-in kinds.
///
/// Returns `None` for types the engine does not know natively; those can still
/// be encoded when an adapter is registered for them on the [`crate::Context`].
pub fn classify(v: &dyn Any) -> Option<Kind> {
    scalar_of(v).map(|s| s.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_builtins() {
        assert_eq!(classify(&true), Some(Kind::Bool));
        assert_eq!(classify(&-1i8), Some(Kind::Int));
        assert_eq!(classify(&7usize), Some(Kind::Uint));
        assert_eq!(classify(&1.5f32), Some(Kind::Float));
        assert_eq!(classify(&String::from("x")), Some(Kind::String));
        assert_eq!(classify(&"x"), Some(Kind::String));
        assert_eq!(classify(&vec![1u8, 2]), Some(Kind::Bytes));
        assert_eq!(classify(&Utc::now()), Some(Kind::Time));
        assert_eq!(classify(&TimeDelta::seconds(1)), Some(Kind::Duration));
        assert_eq!(
            classify(&std::time::Duration::from_millis(1)),
            Some(Kind::Duration)
        );
        assert_eq!(classify(&Value::Array(vec![])), Some(Kind::Array));
    }

    #[test]
    fn classify_unknown() {
        struct Opaque;
        assert_eq!(classify(&Opaque), None);
        assert_eq!(classify(&vec![1u16]), None);
    }

    #[test]
    fn kind_names() {
        assert_eq!(Kind::Nil.to_string(), "nil");
        assert_eq!(Kind::Duration.to_string(), "duration");
        assert!(Kind::Uint.is_numeric());
        assert!(Kind::Bytes.is_text());
        assert!(!Kind::Map.is_text());
    }
}
