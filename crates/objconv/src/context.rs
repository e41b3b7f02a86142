use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::adapter::Adapters;
use crate::record::{Fields, StructCache};
use crate::{Adapter, Decode, Decoder, Encode, Encoder, Error, Record, Value, ValueEmitter, ValueParser};

#[derive(Default)]
struct Inner {
    structs: StructCache,
    adapters: Adapters,
}

/// Shared state of encoding and decoding sessions: the record field cache and
/// the adapter table.
///
/// Cloning is cheap and clones share their state, so one context is normally
/// created at startup and handed to every session.
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor list of `T`, building it on first use.
    pub fn fields<T: Record>(&self) -> Arc<Fields<T>> {
        self.inner.structs.fields::<T>()
    }

    pub fn struct_cache(&self) -> &StructCache {
        &self.inner.structs
    }

    pub fn register_adapter(&self, adapter: Adapter) {
        self.inner.adapters.insert(adapter);
    }

    pub fn unregister_adapter<T: Any>(&self) -> bool {
        self.inner.adapters.remove(TypeId::of::<T>()).is_some()
    }

    pub fn adapter(&self, id: TypeId) -> Option<Arc<Adapter>> {
        self.inner.adapters.get(id)
    }

    pub fn adapter_for<T: Any>(&self) -> Option<Arc<Adapter>> {
        self.adapter(TypeId::of::<T>())
    }

    /// Encodes `v` into a dynamic [`Value`].
    pub fn to_value<T: Encode + ?Sized>(&self, v: &T) -> Result<Value, Error> {
        let mut out = ValueEmitter::new();
        Encoder::new(&mut out, self).encode(v)?;
        Ok(out.into_value())
    }

    /// Decodes a dynamic [`Value`] into `dst`.
    pub fn from_value<T: Decode + ?Sized>(&self, v: &Value, dst: &mut T) -> Result<(), Error> {
        let mut p = ValueParser::new(v);
        Decoder::new(&mut p, self).decode(dst)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("records", &self.inner.structs.len())
            .finish_non_exhaustive()
    }
}
