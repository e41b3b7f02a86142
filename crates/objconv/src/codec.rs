//! Named emitter/parser factories.

use std::collections::HashMap;
use std::io::{Read, Write};

use parking_lot::RwLock;

use crate::{Emitter, Parser};

/// Builds an emitter writing to the given sink.
pub type NewEmitter = fn(Box<dyn Write + Send>) -> Box<dyn Emitter + Send>;

/// Builds a parser reading from the given source.
pub type NewParser = fn(Box<dyn Read + Send>) -> Box<dyn Parser + Send>;

/// The constructors of one wire format.
#[derive(Clone, Copy)]
pub struct Codec {
    pub new_emitter: NewEmitter,
    pub new_parser: NewParser,
}

impl Codec {
    pub fn emitter<W: Write + Send + 'static>(&self, w: W) -> Box<dyn Emitter + Send> {
        (self.new_emitter)(Box::new(w))
    }

    pub fn parser<R: Read + Send + 'static>(&self, r: R) -> Box<dyn Parser + Send> {
        (self.new_parser)(Box::new(r))
    }
}

/// A table of codecs by name, usually filled once at startup.
///
/// Formats provide an explicit `register` function that installs their codec
/// under the names they answer to.
#[derive(Default)]
pub struct Registry {
    codecs: RwLock<HashMap<String, Codec>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `codec` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, codec: Codec) {
        let name = name.into();
        tracing::debug!(name = %name, "codec registered");
        self.codecs.write().insert(name, codec);
    }

    pub fn unregister(&self, name: &str) -> Option<Codec> {
        self.codecs.write().remove(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Codec> {
        self.codecs.read().get(name).copied()
    }

    /// Registered names in lexical order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.codecs.read().keys().cloned().collect();
        names.sort();
        names
    }
}
