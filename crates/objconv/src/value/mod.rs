//! [`Value`]: the dynamic representation of anything the engine can carry.

mod emitter;
mod parser;

pub use emitter::ValueEmitter;
pub use parser::ValueParser;

use std::cmp::Ordering;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::{Decode, Decoder, Encode, Encoder, Error, Kind};

/// A dynamically typed value, one variant per [`Kind`].
///
/// This is what open destinations decode into: maps become ordered lists of
/// pairs, arrays become vectors and scalars keep their native type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    Duration(TimeDelta),
    /// An error value, carried by its message.
    Error(String),
    Array(Vec<Value>),
    /// Key/value pairs in wire order.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Float(_) => Kind::Float,
            Value::String(_) => Kind::String,
            Value::Bytes(_) => Kind::Bytes,
            Value::Time(_) => Kind::Time,
            Value::Duration(_) => Kind::Duration,
            Value::Error(_) => Kind::Error,
            Value::Array(_) => Kind::Array,
            Value::Map(_) => Kind::Map,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Uint(v) => Some(v),
            Value::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            Value::Uint(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up the value stored under a textual key of a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// A total order over values: first by kind, then by content. Used to sort
    /// map keys.
    pub fn cmp_key(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::Duration(a), Value::Duration(b)) => a.cmp(b),
            (Value::Error(a), Value::Error(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => cmp_seq(a.iter(), b.iter(), Value::cmp_key),
            (Value::Map(a), Value::Map(b)) => cmp_seq(a.iter(), b.iter(), |x, y| {
                x.0.cmp_key(&y.0).then_with(|| x.1.cmp_key(&y.1))
            }),
            (a, b) => a.kind().cmp(&b.kind()),
        }
    }
}

fn cmp_seq<'a, T: 'a>(
    mut a: impl Iterator<Item = &'a T>,
    mut b: impl Iterator<Item = &'a T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match cmp(x, y) {
                Ordering::Equal => {}
                ord => return ord,
            },
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident $(as $as:ty)?),+ $(,)?) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v $(as $as)?)
            }
        }
    )+};
}

value_from!(
    bool => Bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint,
    f32 => Float as f64,
    f64 => Float,
    String => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Time,
    TimeDelta => Duration,
    Vec<Value> => Array,
    Vec<(Value, Value)> => Map,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (Value::String(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Bytes become base64 text, timestamps RFC 3339 text, durations integer
/// nanoseconds and map keys their textual form.
impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::json!(i),
            Value::Uint(u) => serde_json::json!(u),
            Value::Float(f) => serde_json::json!(f),
            Value::String(s) | Value::Error(s) => serde_json::Value::String(s),
            Value::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
            Value::Time(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Duration(d) => serde_json::json!(d.num_nanoseconds()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(pairs) => serde_json::Value::Object(
                pairs
                    .into_iter()
                    .map(|(k, v)| {
                        let key = match serde_json::Value::from(k) {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        (key, serde_json::Value::from(v))
                    })
                    .collect(),
            ),
        }
    }
}

impl Encode for Value {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        match self {
            Value::Nil => e.encode_nil(),
            Value::Bool(v) => e.encode_bool(*v),
            Value::Int(v) => e.encode_int(*v),
            Value::Uint(v) => e.encode_uint(*v),
            Value::Float(v) => e.encode_float(*v),
            Value::String(v) => e.encode_string(v),
            Value::Bytes(v) => e.encode_bytes(v),
            Value::Time(v) => e.encode_time(v),
            Value::Duration(v) => e.encode_duration(*v),
            Value::Error(v) => e.encode_error(v),
            Value::Array(items) => e.encode_seq(items),
            Value::Map(pairs) => {
                e.encode_entries_by(pairs.len(), pairs.iter().map(|(k, v)| (k, v)), Value::cmp_key)
            }
        }
    }

    fn is_empty_value(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Bool(v) => !*v,
            Value::Int(v) => *v == 0,
            Value::Uint(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::String(v) | Value::Error(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Time(v) => *v == DateTime::<Utc>::UNIX_EPOCH,
            Value::Duration(v) => v.is_zero(),
            Value::Array(v) => v.is_empty(),
            Value::Map(v) => v.is_empty(),
        }
    }
}

impl Decode for Value {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        *self = match d.kind()? {
            Kind::Nil => {
                d.decode_nil()?;
                Value::Nil
            }
            Kind::Bool => Value::Bool(d.decode_bool()?),
            Kind::Int => Value::Int(d.decode_int()?),
            Kind::Uint => Value::Uint(d.decode_uint()?),
            Kind::Float => Value::Float(d.decode_float()?),
            Kind::String => match String::from_utf8(d.decode_bytes()?) {
                Ok(s) => Value::String(s),
                Err(err) => Value::Bytes(err.into_bytes()),
            },
            Kind::Bytes => Value::Bytes(d.decode_bytes()?),
            Kind::Time => Value::Time(d.decode_time()?),
            Kind::Duration => Value::Duration(d.decode_duration()?),
            Kind::Error => Value::Error(d.decode_error()?),
            Kind::Array => {
                let mut items = Vec::new();
                d.decode_array(|d| {
                    let mut v = Value::Nil;
                    d.decode(&mut v)?;
                    items.push(v);
                    Ok(())
                })?;
                Value::Array(items)
            }
            Kind::Map => {
                let mut pairs = Vec::new();
                d.decode_map(|d| {
                    let (mut k, mut v) = (Value::Nil, Value::Nil);
                    d.decode(&mut k)?;
                    d.decode(&mut v)?;
                    pairs.push((k, v));
                    Ok(())
                })?;
                Value::Map(pairs)
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion() {
        let v = Value::from(json!({"a": [1, -2, 2.5, null], "b": "x"}));
        assert_eq!(
            v,
            Value::Map(vec![
                (
                    "a".into(),
                    Value::Array(vec![
                        Value::Int(1),
                        Value::Int(-2),
                        Value::Float(2.5),
                        Value::Nil
                    ])
                ),
                ("b".into(), "x".into()),
            ])
        );
        assert_eq!(v.get("b"), Some(&Value::from("x")));
    }

    #[test]
    fn json_rendering_of_wire_only_kinds() {
        let v = Value::Map(vec![
            (Value::Int(1), Value::Bytes(b"hi".to_vec())),
            ("d".into(), Value::Duration(TimeDelta::milliseconds(2))),
        ]);
        assert_eq!(
            serde_json::Value::from(v),
            json!({"1": "aGk=", "d": 2_000_000})
        );
    }

    #[test]
    fn key_order_is_total() {
        let mut keys = vec![
            Value::from("b"),
            Value::Int(3),
            Value::Float(f64::NAN),
            Value::Nil,
            Value::from("a"),
            Value::Float(-1.0),
        ];
        keys.sort_by(Value::cmp_key);
        assert_eq!(keys[0], Value::Nil);
        assert_eq!(keys[1], Value::Int(3));
        assert_eq!(keys[2], Value::Float(-1.0));
        assert_eq!(&keys[4..], &[Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Uint(5).as_i64(), Some(5));
        assert_eq!(Value::Int(-5).as_u64(), None);
        assert_eq!(Value::Bytes(b"ok".to_vec()).as_str(), Some("ok"));
        assert_eq!(Value::from(None::<i64>), Value::Nil);
        assert!(Value::Map(vec![]).is_empty_value());
    }
}
