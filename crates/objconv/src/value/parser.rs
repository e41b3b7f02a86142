use chrono::{DateTime, TimeDelta, Utc};

use super::Value;
use crate::{Error, Kind, Parser};

enum Cursor<'v> {
    Array {
        items: &'v [Value],
        pos: usize,
    },
    Map {
        pairs: &'v [(Value, Value)],
        pos: usize,
        on_value: bool,
    },
}

/// A [`Parser`] that walks a borrowed [`Value`] tree.
pub struct ValueParser<'v> {
    root: Option<&'v Value>,
    stack: Vec<Cursor<'v>>,
}

impl<'v> ValueParser<'v> {
    pub fn new(v: &'v Value) -> Self {
        Self {
            root: Some(v),
            stack: Vec::new(),
        }
    }

    fn current(&self) -> Result<&'v Value, Error> {
        let v = match self.stack.last() {
            None => self.root,
            Some(&Cursor::Array { items, pos }) => items.get(pos),
            Some(&Cursor::Map {
                pairs,
                pos,
                on_value,
            }) => pairs.get(pos).map(|(k, v)| if on_value { v } else { k }),
        };
        v.ok_or(Error::End)
    }

    fn advance(&mut self) {
        match self.stack.last_mut() {
            None => self.root = None,
            Some(Cursor::Array { pos, .. }) => *pos += 1,
            Some(Cursor::Map { pos, on_value, .. }) => {
                if *on_value {
                    *pos += 1;
                }
                *on_value = !*on_value;
            }
        }
    }

    fn take<T>(&mut self, to: Kind, f: impl FnOnce(&'v Value) -> Option<T>) -> Result<T, Error> {
        let v = self.current()?;
        let out = f(v).ok_or(Error::conversion(v.kind(), to))?;
        self.advance();
        Ok(out)
    }

    fn close(&mut self) -> Result<(), Error> {
        match self.stack.pop() {
            Some(_) => {
                self.advance();
                Ok(())
            }
            None => Err(Error::custom("objconv: container end without a matching begin")),
        }
    }
}

impl Parser for ValueParser<'_> {
    fn parse_type(&mut self) -> Result<Kind, Error> {
        self.current().map(Value::kind)
    }

    fn parse_nil(&mut self) -> Result<(), Error> {
        self.take(Kind::Nil, |v| v.is_nil().then_some(()))
    }

    fn parse_bool(&mut self) -> Result<bool, Error> {
        self.take(Kind::Bool, |v| match v {
            Value::Bool(b) => Some(*b),
            _ => None,
        })
    }

    fn parse_int(&mut self) -> Result<i64, Error> {
        self.take(Kind::Int, |v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        })
    }

    fn parse_uint(&mut self) -> Result<u64, Error> {
        self.take(Kind::Uint, |v| match v {
            Value::Uint(u) => Some(*u),
            _ => None,
        })
    }

    fn parse_float(&mut self) -> Result<f64, Error> {
        self.take(Kind::Float, |v| match v {
            Value::Float(f) => Some(*f),
            _ => None,
        })
    }

    fn parse_string(&mut self) -> Result<Vec<u8>, Error> {
        self.take(Kind::String, |v| match v {
            Value::String(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        })
    }

    fn parse_bytes(&mut self) -> Result<Vec<u8>, Error> {
        self.take(Kind::Bytes, |v| match v {
            Value::Bytes(b) => Some(b.clone()),
            _ => None,
        })
    }

    fn parse_time(&mut self) -> Result<DateTime<Utc>, Error> {
        self.take(Kind::Time, |v| match v {
            Value::Time(t) => Some(*t),
            _ => None,
        })
    }

    fn parse_duration(&mut self) -> Result<TimeDelta, Error> {
        self.take(Kind::Duration, |v| match v {
            Value::Duration(d) => Some(*d),
            _ => None,
        })
    }

    fn parse_error(&mut self) -> Result<String, Error> {
        self.take(Kind::Error, |v| match v {
            Value::Error(e) => Some(e.clone()),
            _ => None,
        })
    }

    fn parse_array_begin(&mut self) -> Result<isize, Error> {
        match self.current()? {
            Value::Array(items) => {
                self.stack.push(Cursor::Array { items, pos: 0 });
                Ok(items.len() as isize)
            }
            v => Err(Error::conversion(v.kind(), Kind::Array)),
        }
    }

    fn parse_array_end(&mut self, _n: usize) -> Result<(), Error> {
        self.close()
    }

    fn parse_array_next(&mut self, _n: usize) -> Result<(), Error> {
        Ok(())
    }

    fn parse_map_begin(&mut self) -> Result<isize, Error> {
        match self.current()? {
            Value::Map(pairs) => {
                self.stack.push(Cursor::Map {
                    pairs,
                    pos: 0,
                    on_value: false,
                });
                Ok(pairs.len() as isize)
            }
            v => Err(Error::conversion(v.kind(), Kind::Map)),
        }
    }

    fn parse_map_end(&mut self, _n: usize) -> Result<(), Error> {
        self.close()
    }

    fn parse_map_value(&mut self, _n: usize) -> Result<(), Error> {
        Ok(())
    }

    fn parse_map_next(&mut self, _n: usize) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_in_order() {
        let v = Value::Map(vec![(
            Value::from("a"),
            Value::Array(vec![Value::Int(1), Value::Nil]),
        )]);
        let mut p = ValueParser::new(&v);
        assert_eq!(p.parse_type().unwrap(), Kind::Map);
        assert_eq!(p.parse_map_begin().unwrap(), 1);
        assert_eq!(p.parse_string().unwrap(), b"a");
        p.parse_map_value(0).unwrap();
        assert_eq!(p.parse_array_begin().unwrap(), 2);
        assert_eq!(p.parse_int().unwrap(), 1);
        p.parse_array_next(1).unwrap();
        p.parse_nil().unwrap();
        p.parse_array_end(2).unwrap();
        p.parse_map_end(1).unwrap();
        assert!(p.parse_type().unwrap_err().is_end());
    }

    #[test]
    fn kind_mismatch() {
        let v = Value::Int(1);
        let mut p = ValueParser::new(&v);
        assert!(matches!(
            p.parse_string(),
            Err(Error::TypeConversion {
                from: Kind::Int,
                to: Kind::String
            })
        ));
    }
}
