//! Record field metadata and the cache that memoizes it per type.

use std::any::{type_name, Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::{Decode, Decoder, Encode, Encoder, Error};

type EncodeFn<T> = Arc<dyn Fn(&T, &mut Encoder<'_>) -> Result<(), Error> + Send + Sync>;
type DecodeFn<T> = Arc<dyn Fn(&mut T, &mut Decoder<'_>) -> Result<(), Error> + Send + Sync>;
type EmptyFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A struct-like type whose fields are serialized as a map.
///
/// ```
/// use objconv::{Field, Record};
///
/// #[derive(Default)]
/// struct Point {
///     x: i64,
///     y: i64,
///     label: String,
/// }
///
/// impl Record for Point {
///     fn fields() -> Vec<Field<Self>> {
///         vec![
///             Field::new("x", |p: &Point| &p.x, |p: &mut Point| &mut p.x),
///             Field::new("y", |p: &Point| &p.y, |p: &mut Point| &mut p.y),
///             Field::new("label", |p: &Point| &p.label, |p: &mut Point| &mut p.label)
///                 .omit_empty(),
///         ]
///     }
/// }
///
/// objconv::record_codec!(Point);
/// ```
pub trait Record: Sized + 'static {
    /// Declares the fields in the order they are emitted.
    fn fields() -> Vec<Field<Self>>;
}

struct Access<T> {
    encode: EncodeFn<T>,
    decode: DecodeFn<T>,
    is_empty: EmptyFn<T>,
}

enum Shape<T> {
    Leaf(Access<T>),
    Flatten(Vec<FieldDesc<T>>),
}

/// A field declaration, turned into one or more [`FieldDesc`] when the cache
/// builds the descriptor list of its record.
pub struct Field<T> {
    name: Cow<'static, str>,
    omit_empty: bool,
    skip: bool,
    shape: Shape<T>,
}

impl<T: 'static> Field<T> {
    /// Declares a field serialized under `name` through its own codec.
    pub fn new<F>(name: &'static str, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self
    where
        F: Encode + Decode + 'static,
    {
        let access = Access {
            encode: Arc::new(move |t: &T, e: &mut Encoder<'_>| e.encode(get(t))),
            decode: Arc::new(move |t: &mut T, d: &mut Decoder<'_>| d.decode(get_mut(t))),
            is_empty: Arc::new(move |t: &T| get(t).is_empty_value()),
        };
        Self {
            name: Cow::Borrowed(name),
            omit_empty: false,
            skip: false,
            shape: Shape::Leaf(access),
        }
    }

    /// Embeds the fields of another record at this position, as if they
    /// were declared on `T` directly.
    pub fn flatten<U>(get: fn(&T) -> &U, get_mut: fn(&mut T) -> &mut U) -> Self
    where
        U: Record,
    {
        let inner = build::<U>()
            .into_iter()
            .map(|d| FieldDesc {
                name: d.name,
                index: d.index,
                omit_empty: d.omit_empty,
                access: lift(&d.access, get, get_mut),
            })
            .collect();
        Self {
            name: Cow::Borrowed(""),
            omit_empty: false,
            skip: false,
            shape: Shape::Flatten(inner),
        }
    }

    /// Overrides the wire name.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Cow::Owned(name.into());
        self
    }

    /// Leaves the field out of the output when it holds its zero value.
    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    /// Excludes the field from both encoding and decoding.
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }
}

fn lift<T: 'static, U: 'static>(
    inner: &Access<U>,
    get: fn(&T) -> &U,
    get_mut: fn(&mut T) -> &mut U,
) -> Access<T> {
    let (encode, decode, is_empty) = (
        inner.encode.clone(),
        inner.decode.clone(),
        inner.is_empty.clone(),
    );
    Access {
        encode: Arc::new(move |t: &T, e: &mut Encoder<'_>| encode(get(t), e)),
        decode: Arc::new(move |t: &mut T, d: &mut Decoder<'_>| decode(get_mut(t), d)),
        is_empty: Arc::new(move |t: &T| is_empty(get(t))),
    }
}

/// Precomputed metadata of one serialized field.
pub struct FieldDesc<T> {
    name: Cow<'static, str>,
    index: Vec<usize>,
    omit_empty: bool,
    access: Access<T>,
}

impl<T> FieldDesc<T> {
    /// The wire name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positions of the field in its declaration, outermost first. Fields of
    /// flattened records have one entry per level of nesting.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn omits_empty(&self) -> bool {
        self.omit_empty
    }

    pub fn is_empty(&self, v: &T) -> bool {
        (self.access.is_empty)(v)
    }

    /// Whether this occurrence is left out of the output.
    pub fn omitted(&self, v: &T) -> bool {
        self.omit_empty && self.is_empty(v)
    }

    pub fn encode(&self, v: &T, e: &mut Encoder<'_>) -> Result<(), Error> {
        (self.access.encode)(v, e)
    }

    pub fn decode(&self, v: &mut T, d: &mut Decoder<'_>) -> Result<(), Error> {
        (self.access.decode)(v, d)
    }
}

/// The ordered, immutable descriptor list of a record type.
pub struct Fields<T> {
    map: IndexMap<String, FieldDesc<T>>,
}

impl<T> Fields<T> {
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDesc<T>> {
        self.map.values()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDesc<T>> {
        self.map.get(name)
    }
}

fn build<T: Record>() -> Vec<FieldDesc<T>> {
    let mut all = Vec::new();
    for (pos, field) in T::fields().into_iter().enumerate() {
        if field.skip {
            continue;
        }
        match field.shape {
            Shape::Leaf(access) => all.push(FieldDesc {
                name: field.name,
                index: vec![pos],
                omit_empty: field.omit_empty,
                access,
            }),
            Shape::Flatten(inner) => all.extend(inner.into_iter().map(|mut d| {
                d.index.insert(0, pos);
                d
            })),
        }
    }

    // For every name, the shallowest declaration wins and ties keep the first.
    let mut winner: HashMap<&str, usize> = HashMap::new();
    for (i, d) in all.iter().enumerate() {
        match winner.get(d.name()) {
            Some(&w) if all[w].index.len() <= d.index.len() => {}
            _ => {
                winner.insert(d.name(), i);
            }
        }
    }
    let keep: Vec<bool> = (0..all.len())
        .map(|i| winner.get(all[i].name()) == Some(&i))
        .collect();
    drop(winner);

    let mut out = Vec::with_capacity(all.len());
    for (d, keep) in all.into_iter().zip(keep) {
        if keep {
            out.push(d);
        } else {
            tracing::trace!(record = type_name::<T>(), field = d.name(), "shadowed field dropped");
        }
    }
    out
}

/// Memoizes the descriptor list of every record type it is asked about.
///
/// Lookups take a shared lock. A miss builds the list without holding any
/// lock, then inserts it unless another thread got there first, in which case
/// the already cached list is returned and the fresh one is dropped.
#[derive(Default)]
pub struct StructCache {
    map: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl StructCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<T: Record>(&self) -> Arc<Fields<T>> {
        let id = TypeId::of::<T>();
        if let Some(fields) = self.get::<T>(id) {
            return fields;
        }

        let list = build::<T>();
        let fields = Fields {
            map: list
                .into_iter()
                .map(|d| (d.name().to_owned(), d))
                .collect(),
        };

        let mut map = self.map.write();
        let entry = map
            .entry(id)
            .or_insert_with(|| {
                tracing::trace!(
                    record = type_name::<T>(),
                    fields = fields.len(),
                    "building field descriptors"
                );
                Arc::new(fields) as Arc<dyn Any + Send + Sync>
            })
            .clone();
        drop(map);
        match entry.downcast::<Fields<T>>() {
            Ok(fields) => fields,
            Err(_) => unreachable!("struct cache entry keyed by the wrong type"),
        }
    }

    /// Number of record types cached so far.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    fn get<T: Record>(&self, id: TypeId) -> Option<Arc<Fields<T>>> {
        let entry = self.map.read().get(&id)?.clone();
        entry.downcast::<Fields<T>>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Base {
        id: u64,
        name: String,
    }

    impl Record for Base {
        fn fields() -> Vec<Field<Self>> {
            vec![
                Field::new("id", |b: &Base| &b.id, |b: &mut Base| &mut b.id),
                Field::new("name", |b: &Base| &b.name, |b: &mut Base| &mut b.name),
            ]
        }
    }

    #[derive(Default)]
    struct User {
        email: String,
        base: Base,
        name: String,
        secret: String,
        tags: Vec<String>,
    }

    impl Record for User {
        fn fields() -> Vec<Field<Self>> {
            vec![
                Field::new("email", |u: &User| &u.email, |u: &mut User| &mut u.email)
                    .rename("mail"),
                Field::flatten(|u: &User| &u.base, |u: &mut User| &mut u.base),
                Field::new("name", |u: &User| &u.name, |u: &mut User| &mut u.name),
                Field::new("secret", |u: &User| &u.secret, |u: &mut User| &mut u.secret).skip(),
                Field::new("tags", |u: &User| &u.tags, |u: &mut User| &mut u.tags).omit_empty(),
            ]
        }
    }

    fn names<T: Record>(fields: &Fields<T>) -> Vec<&str> {
        fields.iter().map(|f| f.name()).collect()
    }

    #[test]
    fn flatten_keeps_declaration_order() {
        let cache = StructCache::new();
        let fields = cache.fields::<User>();
        assert_eq!(names(&fields), ["mail", "id", "name", "tags"]);
        assert_eq!(fields.get("id").map(|f| f.index()), Some(&[1, 0][..]));
        assert_eq!(fields.get("name").map(|f| f.index()), Some(&[2][..]));
    }

    #[test]
    fn omit_rule_is_per_occurrence() {
        let cache = StructCache::new();
        let fields = cache.fields::<User>();
        let tags = fields.get("tags").unwrap();
        let mut user = User::default();
        assert!(tags.omitted(&user));
        user.tags.push("a".into());
        assert!(!tags.omitted(&user));
        assert!(!fields.get("mail").unwrap().omitted(&User::default()));
    }

    #[test]
    fn lookups_are_memoized() {
        let cache = StructCache::new();
        let a = cache.fields::<Base>();
        let b = cache.fields::<Base>();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_builds_agree() {
        let cache = Arc::new(StructCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.fields::<User>())
            })
            .collect();
        let all: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for fields in &all[1..] {
            assert!(Arc::ptr_eq(&all[0], fields));
        }
        assert_eq!(cache.len(), 1);
    }

    #[traced_test]
    #[test]
    fn build_is_logged() {
        let cache = StructCache::new();
        cache.fields::<Base>();
        assert!(logs_contain("building field descriptors"));
    }

    #[traced_test]
    #[test]
    fn racing_builds_log_once() {
        let cache = Arc::new(StructCache::new());
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        let span = tracing::Span::current();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (cache, dispatch, span) = (cache.clone(), dispatch.clone(), span.clone());
                std::thread::spawn(move || {
                    tracing::dispatcher::with_default(&dispatch, || {
                        span.in_scope(|| cache.fields::<User>())
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        cache.fields::<User>();
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|l| l.contains("building field descriptors"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("logged {n} builds")),
            }
        });
    }
}
