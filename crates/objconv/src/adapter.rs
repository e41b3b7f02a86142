//! Encode/decode routines registered for types that cannot implement
//! [`crate::Encode`] and [`crate::Decode`] themselves.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Decoder, Encoder, Error};

type EncodeFn = dyn Fn(&dyn Any, &mut Encoder<'_>) -> Result<(), Error> + Send + Sync;
type DecodeFn = dyn Fn(&mut dyn Any, &mut Decoder<'_>) -> Result<(), Error> + Send + Sync;

/// A pair of routines teaching the engine one foreign type.
///
/// ```
/// use std::net::Ipv4Addr;
/// use objconv::{Adapter, Context, Error};
///
/// let cx = Context::new();
/// cx.register_adapter(Adapter::new::<Ipv4Addr, _, _>(
///     |ip, e| e.encode_string(&ip.to_string()),
///     |ip, d| {
///         *ip = d.decode_string()?.parse().map_err(Error::custom)?;
///         Ok(())
///     },
/// ));
/// assert!(cx.adapter_for::<Ipv4Addr>().is_some());
/// ```
pub struct Adapter {
    type_id: TypeId,
    type_name: &'static str,
    encode: Box<EncodeFn>,
    decode: Box<DecodeFn>,
}

impl Adapter {
    pub fn new<T, E, D>(encode: E, decode: D) -> Self
    where
        T: Any,
        E: Fn(&T, &mut Encoder<'_>) -> Result<(), Error> + Send + Sync + 'static,
        D: Fn(&mut T, &mut Decoder<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            encode: Box::new(move |v: &dyn Any, e: &mut Encoder<'_>| match v.downcast_ref::<T>() {
                Some(v) => encode(v, e),
                None => Err(Error::Unsupported(type_name::<T>().to_owned())),
            }),
            decode: Box::new(move |v: &mut dyn Any, d: &mut Decoder<'_>| {
                match v.downcast_mut::<T>() {
                    Some(v) => decode(v, d),
                    None => Err(Error::Unsupported(type_name::<T>().to_owned())),
                }
            }),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn encode(&self, v: &dyn Any, e: &mut Encoder<'_>) -> Result<(), Error> {
        (self.encode)(v, e)
    }

    pub fn decode(&self, v: &mut dyn Any, d: &mut Decoder<'_>) -> Result<(), Error> {
        (self.decode)(v, d)
    }
}

/// The per-context adapter table, keyed by type identity.
#[derive(Default)]
pub struct Adapters {
    map: RwLock<HashMap<TypeId, Arc<Adapter>>>,
}

impl Adapters {
    /// Installs `adapter`, replacing any previous one for the same type.
    pub fn insert(&self, adapter: Adapter) {
        tracing::debug!(type_name = adapter.type_name, "adapter registered");
        self.map.write().insert(adapter.type_id, Arc::new(adapter));
    }

    pub fn remove(&self, id: TypeId) -> Option<Arc<Adapter>> {
        self.map.write().remove(&id)
    }

    pub fn get(&self, id: TypeId) -> Option<Arc<Adapter>> {
        self.map.read().get(&id).cloned()
    }
}
