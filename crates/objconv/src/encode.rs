//! Value traversal on the encoding side.

use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::mem;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;

use crate::kind::{scalar_of, Scalar};
use crate::{Context, Emitter, Error, Record};

/// Types that know how to describe themselves to an [`Encoder`].
///
/// An implementation must produce exactly one complete value, either through
/// one `encode_*` call or by delegating to [`Encoder::encode`].
pub trait Encode {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error>;

    /// The zero value test used by fields declared with `omit_empty`.
    fn is_empty_value(&self) -> bool {
        false
    }

    #[doc(hidden)]
    fn encode_slice(items: &[Self], e: &mut Encoder<'_>) -> Result<(), Error>
    where
        Self: Sized,
    {
        e.encode_seq(items)
    }
}

/// Types with a canonical textual form.
///
/// They are encoded as a string on text formats and as bytes otherwise. The
/// [`crate::text_codec!`] macro implements [`Encode`] and [`crate::Decode`] in
/// terms of this trait and [`crate::TextUnmarshal`].
pub trait TextMarshal {
    fn marshal_text(&self) -> Result<String, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Any,
    Key,
    Value,
}

/// Walks values and turns them into [`Emitter`] calls.
///
/// An encoder lives for a single traversal. Nested values are encoded
/// through the same instance, which tracks whether the next value is a map
/// key, a map value, or a free-standing value, and emits the key/value
/// separator accordingly.
pub struct Encoder<'a> {
    emitter: &'a mut dyn Emitter,
    cx: &'a Context,
    sort_map_keys: bool,
    expect: Expect,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(emitter: &'a mut dyn Emitter, cx: &'a Context) -> Self {
        Self {
            emitter,
            cx,
            sort_map_keys: false,
            expect: Expect::Any,
            depth: 0,
        }
    }

    /// Orders map keys before emitting them so equal maps always produce
    /// identical output.
    pub fn with_sort_map_keys(mut self, sort: bool) -> Self {
        self.sort_map_keys = sort;
        self
    }

    pub fn sort_map_keys(&self) -> bool {
        self.sort_map_keys
    }

    pub fn context(&self) -> &'a Context {
        self.cx
    }

    /// Whether the underlying format is human-readable.
    pub fn text(&self) -> bool {
        self.emitter.text()
    }

    fn enter(&mut self) -> Result<Expect, Error> {
        let prev = mem::replace(&mut self.expect, Expect::Any);
        if prev == Expect::Value {
            self.emitter.emit_map_value()?;
        }
        Ok(prev)
    }

    fn leave(&mut self, prev: Expect) {
        if prev == Expect::Key {
            self.expect = Expect::Value;
        }
    }

    fn scalar<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut (dyn Emitter + 'a)) -> Result<(), Error>,
    {
        let prev = self.enter()?;
        f(&mut *self.emitter)?;
        self.leave(prev);
        Ok(())
    }

    /// Runs `f` as one nested value. When the outermost one fails, the
    /// emitter is told to drop what it has buffered for it.
    fn guarded<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        self.depth += 1;
        let res = f(self);
        self.depth -= 1;
        if self.depth == 0 && res.is_err() {
            self.emitter.discard();
        }
        res
    }

    pub fn encode<T: Encode + ?Sized>(&mut self, v: &T) -> Result<(), Error> {
        self.guarded(|e| v.encode(e))
    }

    pub fn encode_nil(&mut self) -> Result<(), Error> {
        self.scalar(|e| e.emit_nil())
    }

    pub fn encode_bool(&mut self, v: bool) -> Result<(), Error> {
        self.scalar(|e| e.emit_bool(v))
    }

    pub fn encode_int(&mut self, v: i64) -> Result<(), Error> {
        self.encode_int_bits(v, 64)
    }

    pub fn encode_int_bits(&mut self, v: i64, bits: u8) -> Result<(), Error> {
        self.scalar(|e| e.emit_int(v, bits))
    }

    pub fn encode_uint(&mut self, v: u64) -> Result<(), Error> {
        self.encode_uint_bits(v, 64)
    }

    pub fn encode_uint_bits(&mut self, v: u64, bits: u8) -> Result<(), Error> {
        self.scalar(|e| e.emit_uint(v, bits))
    }

    pub fn encode_float(&mut self, v: f64) -> Result<(), Error> {
        self.encode_float_bits(v, 64)
    }

    pub fn encode_float_bits(&mut self, v: f64, bits: u8) -> Result<(), Error> {
        self.scalar(|e| e.emit_float(v, bits))
    }

    pub fn encode_string(&mut self, v: &str) -> Result<(), Error> {
        self.scalar(|e| e.emit_string(v))
    }

    pub fn encode_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
        self.scalar(|e| e.emit_bytes(v))
    }

    pub fn encode_time(&mut self, v: &DateTime<Utc>) -> Result<(), Error> {
        self.scalar(|e| e.emit_time(v))
    }

    pub fn encode_duration(&mut self, v: TimeDelta) -> Result<(), Error> {
        self.scalar(|e| e.emit_duration(v))
    }

    /// Encodes an error value from its message.
    pub fn encode_error(&mut self, v: &dyn fmt::Display) -> Result<(), Error> {
        let msg = v.to_string();
        self.scalar(|e| e.emit_error(&msg))
    }

    /// Encodes a value through its text form.
    pub fn encode_text(&mut self, v: &dyn TextMarshal) -> Result<(), Error> {
        let text = v.marshal_text()?;
        if self.text() {
            self.encode_string(&text)
        } else {
            self.encode_bytes(text.as_bytes())
        }
    }

    /// Encodes an array whose elements are produced by `f`, one per call.
    ///
    /// `n` is the number of elements, or a negative value when unknown, in
    /// which case `f` is called until it returns [`Error::End`]. Returning
    /// `End` with a known length truncates the array. Not every format
    /// supports arrays of unknown length.
    pub fn encode_array<F>(&mut self, n: isize, f: F) -> Result<(), Error>
    where
        F: FnMut(&mut Self) -> Result<(), Error>,
    {
        self.guarded(|e| e.array(n, f))
    }

    fn array<F>(&mut self, n: isize, mut f: F) -> Result<(), Error>
    where
        F: FnMut(&mut Self) -> Result<(), Error>,
    {
        let prev = self.enter()?;
        self.emitter.emit_array_begin(n)?;
        let mut i: isize = 0;
        while n < 0 || i < n {
            if i != 0 {
                self.emitter.emit_array_next()?;
            }
            match f(self) {
                Ok(()) => {}
                Err(Error::End) => break,
                Err(err) => return Err(err),
            }
            i += 1;
        }
        self.emitter.emit_array_end()?;
        self.leave(prev);
        Ok(())
    }

    /// Encodes a map whose entries are produced by `f`, one per call. Each
    /// call must encode a key and then its value through the encoder it is
    /// given. `n` follows the same convention as in
    /// [`Encoder::encode_array`].
    pub fn encode_map<F>(&mut self, n: isize, f: F) -> Result<(), Error>
    where
        F: FnMut(&mut Self) -> Result<(), Error>,
    {
        self.guarded(|e| e.map(n, f))
    }

    fn map<F>(&mut self, n: isize, mut f: F) -> Result<(), Error>
    where
        F: FnMut(&mut Self) -> Result<(), Error>,
    {
        let prev = self.enter()?;
        self.emitter.emit_map_begin(n)?;
        let mut i: isize = 0;
        while n < 0 || i < n {
            if i != 0 {
                self.emitter.emit_map_next()?;
            }
            self.expect = Expect::Key;
            let res = f(self);
            self.expect = Expect::Any;
            match res {
                Ok(()) => {}
                Err(Error::End) => break,
                Err(err) => return Err(err),
            }
            i += 1;
        }
        self.emitter.emit_map_end()?;
        self.leave(prev);
        Ok(())
    }

    /// Encodes the elements of a slice as an array.
    pub fn encode_seq<T: Encode>(&mut self, items: &[T]) -> Result<(), Error> {
        let mut it = items.iter();
        self.encode_array(items.len() as isize, |e| match it.next() {
            Some(v) => e.encode(v),
            None => Err(Error::End),
        })
    }

    /// Encodes key/value pairs as a map, in iteration order.
    pub fn encode_entries<'v, K, V, I>(&mut self, n: usize, entries: I) -> Result<(), Error>
    where
        K: Encode + ?Sized + 'v,
        V: Encode + ?Sized + 'v,
        I: IntoIterator<Item = (&'v K, &'v V)>,
    {
        let mut it = entries.into_iter();
        self.encode_map(n as isize, |e| match it.next() {
            Some((k, v)) => {
                e.encode(k)?;
                e.encode(v)
            }
            None => Err(Error::End),
        })
    }

    /// Like [`Encoder::encode_entries`], but orders the pairs with `cmp`
    /// first when key sorting is enabled.
    pub fn encode_entries_by<'v, K, V, I, C>(&mut self, n: usize, entries: I, cmp: C) -> Result<(), Error>
    where
        K: Encode + ?Sized + 'v,
        V: Encode + ?Sized + 'v,
        I: IntoIterator<Item = (&'v K, &'v V)>,
        C: Fn(&K, &K) -> std::cmp::Ordering,
    {
        if !self.sort_map_keys {
            return self.encode_entries(n, entries);
        }
        let mut pairs: Vec<(&K, &V)> = entries.into_iter().collect();
        pairs.sort_by(|a, b| cmp(a.0, b.0));
        self.encode_entries(n, pairs)
    }

    /// Encodes a record as a map of its non-omitted fields.
    pub fn encode_struct<T: Record>(&mut self, v: &T) -> Result<(), Error> {
        let fields = self.cx.fields::<T>();
        let n = fields.iter().filter(|f| !f.omitted(v)).count();
        let mut it = fields.iter().filter(|f| !f.omitted(v));
        self.encode_map(n as isize, |e| match it.next() {
            Some(f) => {
                e.encode_string(f.name())?;
                f.encode(v, e)
            }
            None => Err(Error::End),
        })
    }

    /// Encodes a type-erased value. Built-in scalars and [`crate::Value`] are
    /// recognized first, then the adapters registered on the context.
    pub fn encode_any(&mut self, v: &dyn Any) -> Result<(), Error> {
        if let Some(s) = scalar_of(v) {
            return match s {
                Scalar::Bool(v) => self.encode_bool(v),
                Scalar::Int(v, bits) => self.encode_int_bits(v, bits),
                Scalar::Uint(v, bits) => self.encode_uint_bits(v, bits),
                Scalar::Float(v, bits) => self.encode_float_bits(v, bits),
                Scalar::String(v) => self.encode_string(v),
                Scalar::Bytes(v) => self.encode_bytes(v),
                Scalar::Time(v) => self.encode_time(v),
                Scalar::Duration(v) => self.encode_duration(v),
                Scalar::StdDuration(v) => v.encode(self),
                Scalar::Value(v) => v.encode(self),
            };
        }
        match self.cx.adapter(Any::type_id(v)) {
            Some(adapter) => adapter.encode(v, self),
            None => Err(Error::Unsupported(format!("{:?}", Any::type_id(v)))),
        }
    }
}

impl Encode for bool {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_bool(*self)
    }

    fn is_empty_value(&self) -> bool {
        !*self
    }
}

macro_rules! encode_int {
    ($method:ident: $($t:ty => $as:ty),+) => {$(
        impl Encode for $t {
            fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
                e.$method(*self as $as, <$t>::BITS as u8)
            }

            fn is_empty_value(&self) -> bool {
                *self == 0
            }
        }
    )+};
}

encode_int!(encode_int_bits: i8 => i64, i16 => i64, i32 => i64, i64 => i64, isize => i64);
encode_int!(encode_uint_bits: u16 => u64, u32 => u64, u64 => u64, usize => u64);

impl Encode for u8 {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_uint_bits(*self as u64, 8)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }

    fn encode_slice(items: &[Self], e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_bytes(items)
    }
}

impl Encode for f32 {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_float_bits(*self as f64, 32)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl Encode for f64 {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_float_bits(*self, 64)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl Encode for str {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_string(self)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Encode for String {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_string(self)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        T::encode_slice(self, e)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        T::encode_slice(self, e)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        T::encode_slice(self, e)
    }

    fn is_empty_value(&self) -> bool {
        N == 0
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        match self {
            Some(v) => v.encode(e),
            None => e.encode_nil(),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

macro_rules! encode_deref {
    ($($ptr:ident),+) => {$(
        impl<T: Encode + ?Sized> Encode for $ptr<T> {
            fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
                (**self).encode(e)
            }

            fn is_empty_value(&self) -> bool {
                (**self).is_empty_value()
            }
        }
    )+};
}

encode_deref!(Box, Rc, Arc);

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        (**self).encode(e)
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<K: Encode + Ord, V: Encode, S: BuildHasher> Encode for HashMap<K, V, S> {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_entries_by(self.len(), self, K::cmp)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Encode + Ord, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_entries(self.len(), self)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Encode + Ord, V: Encode, S: BuildHasher> Encode for IndexMap<K, V, S> {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_entries_by(self.len(), self, K::cmp)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Encode for DateTime<Utc> {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_time(self)
    }

    fn is_empty_value(&self) -> bool {
        *self == DateTime::<Utc>::UNIX_EPOCH
    }
}

impl Encode for TimeDelta {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        e.encode_duration(*self)
    }

    fn is_empty_value(&self) -> bool {
        self.is_zero()
    }
}

impl Encode for std::time::Duration {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<(), Error> {
        let d = TimeDelta::from_std(*self).map_err(|_| {
            Error::Unsupported(format!("{} out of range", type_name::<Self>()))
        })?;
        e.encode_duration(d)
    }

    fn is_empty_value(&self) -> bool {
        self.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every emitter call as a short token.
    #[derive(Default)]
    struct Tape(Vec<String>);

    impl Emitter for Tape {
        fn emit_nil(&mut self) -> Result<(), Error> {
            self.0.push("nil".into());
            Ok(())
        }
        fn emit_bool(&mut self, v: bool) -> Result<(), Error> {
            self.0.push(format!("bool:{v}"));
            Ok(())
        }
        fn emit_int(&mut self, v: i64, bits: u8) -> Result<(), Error> {
            self.0.push(format!("int{bits}:{v}"));
            Ok(())
        }
        fn emit_uint(&mut self, v: u64, bits: u8) -> Result<(), Error> {
            self.0.push(format!("uint{bits}:{v}"));
            Ok(())
        }
        fn emit_float(&mut self, v: f64, bits: u8) -> Result<(), Error> {
            self.0.push(format!("float{bits}:{v}"));
            Ok(())
        }
        fn emit_string(&mut self, v: &str) -> Result<(), Error> {
            self.0.push(format!("str:{v}"));
            Ok(())
        }
        fn emit_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
            self.0.push(format!("bytes:{}", v.len()));
            Ok(())
        }
        fn emit_time(&mut self, v: &DateTime<Utc>) -> Result<(), Error> {
            self.0.push(format!("time:{}", v.timestamp()));
            Ok(())
        }
        fn emit_duration(&mut self, v: TimeDelta) -> Result<(), Error> {
            self.0.push(format!("dur:{}", v.num_milliseconds()));
            Ok(())
        }
        fn emit_error(&mut self, v: &str) -> Result<(), Error> {
            self.0.push(format!("err:{v}"));
            Ok(())
        }
        fn emit_array_begin(&mut self, n: isize) -> Result<(), Error> {
            self.0.push("[".into());
            self.0.push(format!("#{n}"));
            Ok(())
        }
        fn emit_array_end(&mut self) -> Result<(), Error> {
            self.0.push("]".into());
            Ok(())
        }
        fn emit_array_next(&mut self) -> Result<(), Error> {
            self.0.push(",".into());
            Ok(())
        }
        fn emit_map_begin(&mut self, n: isize) -> Result<(), Error> {
            self.0.push("{".into());
            self.0.push(format!("#{n}"));
            Ok(())
        }
        fn emit_map_end(&mut self) -> Result<(), Error> {
            self.0.push("}".into());
            Ok(())
        }
        fn emit_map_value(&mut self) -> Result<(), Error> {
            self.0.push(":".into());
            Ok(())
        }
        fn emit_map_next(&mut self) -> Result<(), Error> {
            self.0.push(",".into());
            Ok(())
        }
    }

    fn tape<T: Encode + ?Sized>(v: &T, sort: bool) -> Vec<String> {
        let cx = Context::new();
        let mut out = Tape::default();
        Encoder::new(&mut out, &cx)
            .with_sort_map_keys(sort)
            .encode(v)
            .unwrap();
        out.0
    }

    #[test]
    fn scalars_carry_their_width() {
        assert_eq!(tape(&-1i8, false), ["int8:-1"]);
        assert_eq!(tape(&7u32, false), ["uint32:7"]);
        assert_eq!(tape(&1.5f32, false), ["float32:1.5"]);
        assert_eq!(tape("hi", false), ["str:hi"]);
        assert_eq!(tape(&None::<i64>, false), ["nil"]);
        assert_eq!(tape(&Some(true), false), ["bool:true"]);
    }

    #[test]
    fn byte_vectors_are_bytes() {
        assert_eq!(tape(&vec![1u8, 2, 3], false), ["bytes:3"]);
        assert_eq!(
            tape(&vec![1u16, 2], false),
            ["[", "#2", "uint16:1", ",", "uint16:2", "]"]
        );
    }

    #[test]
    fn map_grammar() {
        let mut m = BTreeMap::new();
        m.insert("a", vec![1i64]);
        m.insert("b", vec![]);
        assert_eq!(
            tape(&m, false),
            [
                "{", "#2", "str:a", ":", "[", "#1", "int64:1", "]", ",", "str:b", ":", "[",
                "#0", "]", "}"
            ]
        );
    }

    #[test]
    fn sorted_hash_map_keys() {
        let mut m = HashMap::new();
        for k in ["z", "m", "a", "q"] {
            m.insert(k.to_string(), 0u8);
        }
        let keys: Vec<String> = tape(&m, true)
            .into_iter()
            .filter(|t| t.starts_with("str:"))
            .collect();
        assert_eq!(keys, ["str:a", "str:m", "str:q", "str:z"]);
    }

    #[test]
    fn producer_end_truncates() {
        let cx = Context::new();
        let mut out = Tape::default();
        let mut left = 2;
        Encoder::new(&mut out, &cx)
            .encode_array(-1, |e| {
                if left == 0 {
                    return Err(Error::End);
                }
                left -= 1;
                e.encode_int(left)
            })
            .unwrap();
        assert_eq!(out.0, ["[", "#-1", "int64:1", ",", "int64:0", ",", "]"]);
    }

    #[test]
    fn producer_errors_propagate() {
        let cx = Context::new();
        let mut out = Tape::default();
        let err = Encoder::new(&mut out, &cx)
            .encode_map(1, |_| Err(Error::custom("boom")))
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn any_dispatch() {
        struct Opaque;
        let cx = Context::new();
        let mut out = Tape::default();
        let mut e = Encoder::new(&mut out, &cx);
        e.encode_any(&42u64).unwrap();
        e.encode_any(&"x").unwrap();
        assert!(matches!(e.encode_any(&Opaque), Err(Error::Unsupported(_))));
        assert_eq!(out.0, ["uint64:42", "str:x"]);
    }
}
