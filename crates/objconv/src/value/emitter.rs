use chrono::{DateTime, TimeDelta, Utc};

use super::Value;
use crate::{Emitter, Error};

enum Frame {
    Array(Vec<Value>),
    Map {
        pairs: Vec<(Value, Value)>,
        key: Option<Value>,
    },
}

/// An [`Emitter`] that builds [`Value`] trees in memory.
///
/// Every complete top-level value is appended to [`ValueEmitter::values`].
/// Containers of unknown length are supported.
#[derive(Default)]
pub struct ValueEmitter {
    stack: Vec<Frame>,
    values: Vec<Value>,
}

impl ValueEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the first complete value, or nil when nothing was emitted.
    pub fn into_value(self) -> Value {
        self.values.into_iter().next().unwrap_or_default()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    fn push(&mut self, v: Value) -> Result<(), Error> {
        match self.stack.last_mut() {
            None => self.values.push(v),
            Some(Frame::Array(items)) => items.push(v),
            Some(Frame::Map { pairs, key }) => match key.take() {
                Some(k) => pairs.push((k, v)),
                None => *key = Some(v),
            },
        }
        Ok(())
    }
}

impl Emitter for ValueEmitter {
    fn emit_nil(&mut self) -> Result<(), Error> {
        self.push(Value::Nil)
    }

    fn emit_bool(&mut self, v: bool) -> Result<(), Error> {
        self.push(Value::Bool(v))
    }

    fn emit_int(&mut self, v: i64, _bits: u8) -> Result<(), Error> {
        self.push(Value::Int(v))
    }

    fn emit_uint(&mut self, v: u64, _bits: u8) -> Result<(), Error> {
        self.push(Value::Uint(v))
    }

    fn emit_float(&mut self, v: f64, _bits: u8) -> Result<(), Error> {
        self.push(Value::Float(v))
    }

    fn emit_string(&mut self, v: &str) -> Result<(), Error> {
        self.push(Value::String(v.to_owned()))
    }

    fn emit_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
        self.push(Value::Bytes(v.to_vec()))
    }

    fn emit_time(&mut self, v: &DateTime<Utc>) -> Result<(), Error> {
        self.push(Value::Time(*v))
    }

    fn emit_duration(&mut self, v: TimeDelta) -> Result<(), Error> {
        self.push(Value::Duration(v))
    }

    fn emit_error(&mut self, v: &str) -> Result<(), Error> {
        self.push(Value::Error(v.to_owned()))
    }

    fn emit_array_begin(&mut self, n: isize) -> Result<(), Error> {
        self.stack
            .push(Frame::Array(Vec::with_capacity(n.max(0) as usize)));
        Ok(())
    }

    fn emit_array_end(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.push(Value::Array(items)),
            _ => Err(Error::custom("objconv: array end without a matching begin")),
        }
    }

    fn emit_array_next(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn emit_map_begin(&mut self, n: isize) -> Result<(), Error> {
        self.stack.push(Frame::Map {
            pairs: Vec::with_capacity(n.max(0) as usize),
            key: None,
        });
        Ok(())
    }

    fn emit_map_end(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(Frame::Map { pairs, key: None }) => self.push(Value::Map(pairs)),
            Some(Frame::Map { key: Some(_), .. }) => {
                Err(Error::custom("objconv: map key without a value"))
            }
            _ => Err(Error::custom("objconv: map end without a matching begin")),
        }
    }

    fn emit_map_value(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn emit_map_next(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn discard(&mut self) {
        self.stack.clear();
    }
}
