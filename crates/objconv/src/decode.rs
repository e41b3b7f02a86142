//! Value traversal on the decoding side.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::mem;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;

use crate::{Context, Error, Kind, Parser, Record, Value};

/// Types that can be populated from a [`Decoder`].
///
/// Decoding writes into an existing value, so containers may reuse their
/// allocations. On error the destination may be partially updated.
pub trait Decode {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error>;

    #[doc(hidden)]
    fn decode_vec(v: &mut Vec<Self>, d: &mut Decoder<'_>) -> Result<(), Error>
    where
        Self: Sized + Default,
    {
        d.decode_seq(v)
    }
}

/// The decoding half of [`crate::TextMarshal`].
pub trait TextUnmarshal {
    fn unmarshal_text(&mut self, text: &str) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Any,
    /// A key of entry `i`. `flat` is set when the map arrived as an array of
    /// alternating keys and values.
    Key { i: usize, flat: bool },
    Value { i: usize, flat: bool },
}

enum Token {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(Vec<u8>),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    Duration(TimeDelta),
    Error(String),
}

impl Token {
    fn kind(&self) -> Kind {
        match self {
            Token::Nil => Kind::Nil,
            Token::Bool(_) => Kind::Bool,
            Token::Int(_) => Kind::Int,
            Token::Uint(_) => Kind::Uint,
            Token::Float(_) => Kind::Float,
            Token::String(_) => Kind::String,
            Token::Bytes(_) => Kind::Bytes,
            Token::Time(_) => Kind::Time,
            Token::Duration(_) => Kind::Duration,
            Token::Error(_) => Kind::Error,
        }
    }

    fn mismatch<T>(&self, to: Kind) -> Result<T, Error> {
        Err(Error::conversion(self.kind(), to))
    }
}

fn parse_text<T: std::str::FromStr>(b: &[u8], from: Kind, to: Kind) -> Result<T, Error> {
    std::str::from_utf8(b)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or(Error::conversion(from, to))
}

fn parse_time_text(b: &[u8], from: Kind) -> Result<DateTime<Utc>, Error> {
    std::str::from_utf8(b)
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or(Error::conversion(from, Kind::Time))
}

macro_rules! decode_downcast {
    ($d:expr, $v:expr; $($t:ty),+ $(,)?) => {$(
        if let Some(x) = $v.downcast_mut::<$t>() {
            return $d.decode(x);
        }
    )+};
}

/// Drives a [`Parser`] and writes what it reads into caller-supplied values.
///
/// Like [`crate::Encoder`], a decoder lives for a single traversal and tracks
/// where it stands inside maps so key/value separators are consumed in order.
pub struct Decoder<'a> {
    parser: &'a mut dyn Parser,
    cx: &'a Context,
    expect: Expect,
}

impl<'a> Decoder<'a> {
    pub fn new(parser: &'a mut dyn Parser, cx: &'a Context) -> Self {
        Self {
            parser,
            cx,
            expect: Expect::Any,
        }
    }

    pub fn context(&self) -> &'a Context {
        self.cx
    }

    /// Whether the underlying format is human-readable.
    pub fn text(&self) -> bool {
        self.parser.text()
    }

    fn separator(&mut self, i: usize, flat: bool) -> Result<(), Error> {
        if flat {
            self.parser.parse_array_next(2 * i + 1)
        } else {
            self.parser.parse_map_value(i)
        }
    }

    fn enter(&mut self) -> Result<Expect, Error> {
        let prev = mem::replace(&mut self.expect, Expect::Any);
        if let Expect::Value { i, flat } = prev {
            self.separator(i, flat)?;
        }
        Ok(prev)
    }

    fn leave(&mut self, prev: Expect) {
        if let Expect::Key { i, flat } = prev {
            self.expect = Expect::Value { i, flat };
        }
    }

    /// Decodes the next value into `v`.
    ///
    /// Running out of input is reported as an `UnexpectedEof` I/O error.
    pub fn decode<T: Decode + ?Sized>(&mut self, v: &mut T) -> Result<(), Error> {
        match v.decode(self) {
            Err(Error::End) => Err(Error::unexpected_eof()),
            res => res,
        }
    }

    /// Peeks at the kind of the next value.
    pub fn kind(&mut self) -> Result<Kind, Error> {
        if let Expect::Value { i, flat } = self.expect {
            self.separator(i, flat)?;
            self.expect = Expect::Any;
        }
        self.parser.parse_type()
    }

    fn token(&mut self) -> Result<Token, Error> {
        let p = &mut *self.parser;
        Ok(match p.parse_type()? {
            Kind::Nil => {
                p.parse_nil()?;
                Token::Nil
            }
            Kind::Bool => Token::Bool(p.parse_bool()?),
            Kind::Int => Token::Int(p.parse_int()?),
            Kind::Uint => Token::Uint(p.parse_uint()?),
            Kind::Float => Token::Float(p.parse_float()?),
            Kind::String => Token::String(p.parse_string()?),
            Kind::Bytes => Token::Bytes(p.parse_bytes()?),
            Kind::Time => Token::Time(p.parse_time()?),
            Kind::Duration => Token::Duration(p.parse_duration()?),
            Kind::Error => Token::Error(p.parse_error()?),
            kind => return Err(Error::conversion(kind, Kind::Nil)),
        })
    }

    fn scalar<R, F>(&mut self, to: Kind, f: F) -> Result<R, Error>
    where
        F: FnOnce(Token) -> Result<R, Error>,
    {
        let prev = self.enter()?;
        let token = self.token().map_err(|err| match err {
            Error::TypeConversion { from, .. } => Error::conversion(from, to),
            err => err,
        })?;
        let v = f(token)?;
        self.leave(prev);
        Ok(v)
    }

    pub fn decode_nil(&mut self) -> Result<(), Error> {
        self.scalar(Kind::Nil, |t| match t {
            Token::Nil => Ok(()),
            t => t.mismatch(Kind::Nil),
        })
    }

    pub fn decode_bool(&mut self) -> Result<bool, Error> {
        self.scalar(Kind::Bool, |t| match t {
            Token::Bool(v) => Ok(v),
            Token::Int(v) => Ok(v != 0),
            Token::Uint(v) => Ok(v != 0),
            Token::String(b) => parse_text(&b, Kind::String, Kind::Bool),
            Token::Bytes(b) => parse_text(&b, Kind::Bytes, Kind::Bool),
            t => t.mismatch(Kind::Bool),
        })
    }

    /// Decodes a signed integer. Unsigned and float values are cast, numeric
    /// text is parsed.
    pub fn decode_int(&mut self) -> Result<i64, Error> {
        self.scalar(Kind::Int, |t| match t {
            Token::Int(v) => Ok(v),
            Token::Uint(v) => Ok(v as i64),
            Token::Float(v) => Ok(v as i64),
            Token::String(b) => parse_text(&b, Kind::String, Kind::Int),
            Token::Bytes(b) => parse_text(&b, Kind::Bytes, Kind::Int),
            t => t.mismatch(Kind::Int),
        })
    }

    pub fn decode_uint(&mut self) -> Result<u64, Error> {
        self.scalar(Kind::Uint, |t| match t {
            Token::Uint(v) => Ok(v),
            Token::Int(v) => Ok(v as u64),
            Token::Float(v) => Ok(v as u64),
            Token::String(b) => parse_text(&b, Kind::String, Kind::Uint),
            Token::Bytes(b) => parse_text(&b, Kind::Bytes, Kind::Uint),
            t => t.mismatch(Kind::Uint),
        })
    }

    pub fn decode_float(&mut self) -> Result<f64, Error> {
        self.scalar(Kind::Float, |t| match t {
            Token::Float(v) => Ok(v),
            Token::Int(v) => Ok(v as f64),
            Token::Uint(v) => Ok(v as f64),
            Token::String(b) => parse_text(&b, Kind::String, Kind::Float),
            Token::Bytes(b) => parse_text(&b, Kind::Bytes, Kind::Float),
            t => t.mismatch(Kind::Float),
        })
    }

    pub fn decode_string(&mut self) -> Result<String, Error> {
        self.scalar(Kind::String, |t| match t {
            Token::String(b) => {
                String::from_utf8(b).map_err(|_| Error::conversion(Kind::String, Kind::String))
            }
            Token::Bytes(b) => {
                String::from_utf8(b).map_err(|_| Error::conversion(Kind::Bytes, Kind::String))
            }
            t => t.mismatch(Kind::String),
        })
    }

    pub fn decode_bytes(&mut self) -> Result<Vec<u8>, Error> {
        self.scalar(Kind::Bytes, |t| match t {
            Token::String(b) | Token::Bytes(b) => Ok(b),
            t => t.mismatch(Kind::Bytes),
        })
    }

    /// Decodes a timestamp. RFC 3339 text is accepted as well.
    pub fn decode_time(&mut self) -> Result<DateTime<Utc>, Error> {
        self.scalar(Kind::Time, |t| match t {
            Token::Time(v) => Ok(v),
            Token::String(b) => parse_time_text(&b, Kind::String),
            Token::Bytes(b) => parse_time_text(&b, Kind::Bytes),
            t => t.mismatch(Kind::Time),
        })
    }

    /// Decodes a duration. Integers are read as nanoseconds.
    pub fn decode_duration(&mut self) -> Result<TimeDelta, Error> {
        self.scalar(Kind::Duration, |t| match t {
            Token::Duration(v) => Ok(v),
            Token::Int(v) => Ok(TimeDelta::nanoseconds(v)),
            Token::Uint(v) => Ok(TimeDelta::nanoseconds(v as i64)),
            Token::String(b) => {
                parse_text::<i64>(&b, Kind::String, Kind::Duration).map(TimeDelta::nanoseconds)
            }
            t => t.mismatch(Kind::Duration),
        })
    }

    /// Decodes an error value and returns its message.
    pub fn decode_error(&mut self) -> Result<String, Error> {
        self.scalar(Kind::Error, |t| match t {
            Token::Error(v) => Ok(v),
            Token::String(b) | Token::Bytes(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
            t => t.mismatch(Kind::Error),
        })
    }

    /// Decodes a value through its text form.
    pub fn decode_text(&mut self, v: &mut dyn TextUnmarshal) -> Result<(), Error> {
        let text = self.decode_string()?;
        v.unmarshal_text(&text)
    }

    /// Decodes an array, calling `f` once per element with the decoder
    /// positioned on it. A nil value reads as an empty array. Returns the
    /// number of elements read.
    pub fn decode_array<F>(&mut self, mut f: F) -> Result<usize, Error>
    where
        F: FnMut(&mut Self) -> Result<(), Error>,
    {
        let prev = self.enter()?;
        let n = match self.parser.parse_type()? {
            Kind::Nil => {
                self.parser.parse_nil()?;
                self.leave(prev);
                return Ok(0);
            }
            Kind::Array => self.parser.parse_array_begin()?,
            kind => return Err(Error::conversion(kind, Kind::Array)),
        };
        let mut i = 0;
        while n < 0 || (i as isize) < n {
            if i != 0 || n < 0 {
                match self.parser.parse_array_next(i) {
                    Ok(()) => {}
                    Err(Error::End) if n < 0 => break,
                    Err(err) => return Err(err),
                }
            }
            f(self)?;
            i += 1;
        }
        self.parser.parse_array_end(i)?;
        self.leave(prev);
        Ok(i)
    }

    /// Decodes a map, calling `f` once per entry. `f` must decode the key
    /// and then the value. A nil value reads as an empty map.
    ///
    /// Formats without a map type may send an array of alternating keys and
    /// values, which is accepted as well.
    pub fn decode_map<F>(&mut self, mut f: F) -> Result<usize, Error>
    where
        F: FnMut(&mut Self) -> Result<(), Error>,
    {
        let prev = self.enter()?;
        let (n, flat) = match self.parser.parse_type()? {
            Kind::Nil => {
                self.parser.parse_nil()?;
                self.leave(prev);
                return Ok(0);
            }
            Kind::Map => (self.parser.parse_map_begin()?, false),
            Kind::Array => {
                let n = self.parser.parse_array_begin()?;
                if n < 0 || n % 2 != 0 {
                    return Err(Error::conversion(Kind::Array, Kind::Map));
                }
                (n / 2, true)
            }
            kind => return Err(Error::conversion(kind, Kind::Map)),
        };
        let mut i = 0;
        while n < 0 || (i as isize) < n {
            let step = if flat {
                if i != 0 {
                    self.parser.parse_array_next(2 * i)
                } else {
                    Ok(())
                }
            } else if i != 0 || n < 0 {
                self.parser.parse_map_next(i)
            } else {
                Ok(())
            };
            match step {
                Ok(()) => {}
                Err(Error::End) if n < 0 => break,
                Err(err) => return Err(err),
            }
            self.expect = Expect::Key { i, flat };
            let res = f(self);
            self.expect = Expect::Any;
            res?;
            i += 1;
        }
        if flat {
            self.parser.parse_array_end(2 * i)?;
        } else {
            self.parser.parse_map_end(i)?;
        }
        self.leave(prev);
        Ok(i)
    }

    /// Decodes an array into `v`, replacing its contents.
    pub fn decode_seq<T: Decode + Default>(&mut self, v: &mut Vec<T>) -> Result<(), Error> {
        v.clear();
        self.decode_array(|d| {
            let mut x = T::default();
            d.decode(&mut x)?;
            v.push(x);
            Ok(())
        })?;
        Ok(())
    }

    /// Decodes a map into a record. Keys that match no field are skipped.
    pub fn decode_struct<T: Record>(&mut self, v: &mut T) -> Result<(), Error> {
        let fields = self.cx.fields::<T>();
        let mut key = String::new();
        self.decode_map(|d| {
            d.decode(&mut key)?;
            match fields.get(&key) {
                Some(f) => f.decode(v, d),
                None => d.skip(),
            }
        })?;
        Ok(())
    }

    /// Decodes the next value into its natural dynamic representation.
    pub fn decode_value(&mut self) -> Result<Value, Error> {
        let mut v = Value::Nil;
        self.decode(&mut v)?;
        Ok(v)
    }

    /// Reads and discards the next value, nested containers included.
    pub fn skip(&mut self) -> Result<(), Error> {
        self.decode_value().map(drop)
    }

    /// Decodes into a type-erased destination. Built-in scalars and
    /// [`Value`] are recognized first, then the adapters registered on the
    /// context.
    pub fn decode_any(&mut self, v: &mut dyn Any) -> Result<(), Error> {
        decode_downcast!(self, v;
            bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, Vec<u8>,
            DateTime<Utc>, TimeDelta, std::time::Duration, Value,
        );
        let id = Any::type_id(&*v);
        match self.cx.adapter(id) {
            Some(adapter) => adapter.decode(v, self),
            None => Err(Error::Unsupported(format!("{id:?}"))),
        }
    }
}

impl Decode for bool {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        *self = d.decode_bool()?;
        Ok(())
    }
}

macro_rules! decode_num {
    ($method:ident: $($t:ty),+) => {$(
        impl Decode for $t {
            fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
                *self = d.$method()? as $t;
                Ok(())
            }
        }
    )+};
}

decode_num!(decode_int: i8, i16, i32, i64, isize);
decode_num!(decode_uint: u16, u32, u64, usize);
decode_num!(decode_float: f32, f64);

impl Decode for u8 {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        *self = d.decode_uint()? as u8;
        Ok(())
    }

    fn decode_vec(v: &mut Vec<Self>, d: &mut Decoder<'_>) -> Result<(), Error> {
        match d.kind()? {
            Kind::String | Kind::Bytes => {
                *v = d.decode_bytes()?;
                Ok(())
            }
            _ => d.decode_seq(v),
        }
    }
}

impl Decode for String {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        *self = d.decode_string()?;
        Ok(())
    }
}

impl<T: Decode + Default> Decode for Vec<T> {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        T::decode_vec(self, d)
    }
}

/// Extra elements are skipped and missing ones are reset to their default.
impl<T: Decode + Default, const N: usize> Decode for [T; N] {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        let mut i = 0;
        d.decode_array(|d| {
            let res = match self.get_mut(i) {
                Some(slot) => d.decode(slot),
                None => d.skip(),
            };
            i += 1;
            res
        })?;
        for slot in self.iter_mut().skip(i) {
            *slot = T::default();
        }
        Ok(())
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        if d.kind()? == Kind::Nil {
            *self = None;
            return d.decode_nil();
        }
        d.decode(self.get_or_insert_with(T::default))
    }
}

impl<T: Decode + ?Sized> Decode for Box<T> {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        (**self).decode(d)
    }
}

impl<T: Decode + ?Sized> Decode for &mut T {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        (**self).decode(d)
    }
}

macro_rules! decode_map {
    ($map:ident<K, V $(, $s:ident)?> where K: $($bound:path),+) => {
        impl<K, V $(, $s)?> Decode for $map<K, V $(, $s)?>
        where
            K: Decode + Default $(+ $bound)+,
            V: Decode + Default,
            $($s: BuildHasher,)?
        {
            fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
                if d.kind()? == Kind::Nil {
                    self.clear();
                    return d.decode_nil();
                }
                d.decode_map(|d| {
                    let mut k = K::default();
                    d.decode(&mut k)?;
                    let mut v = V::default();
                    d.decode(&mut v)?;
                    self.insert(k, v);
                    Ok(())
                })?;
                Ok(())
            }
        }
    };
}

decode_map!(HashMap<K, V, S> where K: Eq, Hash);
decode_map!(IndexMap<K, V, S> where K: Eq, Hash);
decode_map!(BTreeMap<K, V> where K: Ord);

impl Decode for DateTime<Utc> {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        *self = d.decode_time()?;
        Ok(())
    }
}

impl Decode for TimeDelta {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        *self = d.decode_duration()?;
        Ok(())
    }
}

impl Decode for std::time::Duration {
    fn decode(&mut self, d: &mut Decoder<'_>) -> Result<(), Error> {
        *self = d
            .decode_duration()?
            .to_std()
            .map_err(|_| Error::conversion(Kind::Duration, Kind::Duration))?;
        Ok(())
    }
}
