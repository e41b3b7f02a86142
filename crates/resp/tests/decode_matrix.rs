use std::collections::HashMap;
use std::io;

use objconv::{record_codec, Context, Decoder, Error, Field, Kind, Parser as _, Record, Registry, Value};
use objconv_resp::{marshal, unmarshal, ErrorReply, Parser, Resp, RespError};
use proptest::prelude::*;

fn cases() -> Vec<(&'static str, Value, Kind)> {
    vec![
        ("$-1\r\n", Value::Nil, Kind::Nil),
        ("*-1\r\n", Value::Nil, Kind::Nil),
        (":0\r\n", Value::Int(0), Kind::Int),
        (":-1\r\n", Value::Int(-1), Kind::Int),
        (":42\r\n", Value::Int(42), Kind::Int),
        ("+\r\n", Value::from(""), Kind::String),
        ("+Hello World!\r\n", Value::from("Hello World!"), Kind::String),
        ("+Hello\nWorld!\r\n", Value::from("Hello\nWorld!"), Kind::String),
        ("$13\r\nHello\r\nWorld!\r\n", Value::Bytes(b"Hello\r\nWorld!".to_vec()), Kind::Bytes),
        ("$0\r\n\r\n", Value::Bytes(Vec::new()), Kind::Bytes),
        ("$12\r\nHello World!\r\n", Value::Bytes(b"Hello World!".to_vec()), Kind::Bytes),
        ("-\r\n", Value::Error(String::new()), Kind::Error),
        ("-oops\r\n", Value::Error("oops".into()), Kind::Error),
        ("-ERR A\r\n", Value::Error("ERR A".into()), Kind::Error),
        ("*0\r\n", Value::Array(Vec::new()), Kind::Array),
        (
            "*3\r\n:1\r\n:2\r\n:3\r\n",
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            Kind::Array,
        ),
    ]
}

#[test]
fn parser_reports_kinds() {
    for (s, _, kind) in cases() {
        let mut p = Parser::new(s.as_bytes());
        assert_eq!(p.parse_type().unwrap(), kind, "{s:?}");
    }
}

#[test]
fn messages_decode_to_values() {
    for (s, want, _) in cases() {
        let mut v = Value::Nil;
        unmarshal(s.as_bytes(), &mut v).unwrap();
        assert_eq!(v, want, "{s:?}");
    }
}

#[test]
fn arrays_decode_into_sequences() {
    let mut v: Vec<i64> = vec![9];
    unmarshal(b"*3\r\n:1\r\n:2\r\n:3\r\n", &mut v).unwrap();
    assert_eq!(v, [1, 2, 3]);
    unmarshal(b"*0\r\n", &mut v).unwrap();
    assert!(v.is_empty());
}

#[test]
fn both_nil_spellings_clear_nullable_destinations() {
    for s in ["$-1\r\n", "*-1\r\n"] {
        let mut opt = Some("x".to_string());
        unmarshal(s.as_bytes(), &mut opt).unwrap();
        assert_eq!(opt, None, "{s:?}");

        let mut seq = vec![1i64];
        unmarshal(s.as_bytes(), &mut seq).unwrap();
        assert!(seq.is_empty(), "{s:?}");

        let mut n = 5i64;
        let err = unmarshal(s.as_bytes(), &mut n).unwrap_err();
        assert!(matches!(err, Error::TypeConversion { from: Kind::Nil, .. }), "{s:?}");
    }
}

#[test]
fn crlf_strings_round_trip_as_bulk() {
    let b = marshal("Hello\r\nWorld!").unwrap();
    assert_eq!(b, b"$13\r\nHello\r\nWorld!\r\n");
    let mut s = String::new();
    unmarshal(&b, &mut s).unwrap();
    assert_eq!(s, "Hello\r\nWorld!");

    assert_eq!(marshal("Hello World!").unwrap(), b"+Hello World!\r\n");
}

#[test]
fn error_replies() {
    let b = marshal(&ErrorReply::new("ERR unknown command")).unwrap();
    assert_eq!(b, b"-ERR unknown command\r\n");
    let mut reply = ErrorReply::default();
    unmarshal(&b, &mut reply).unwrap();
    assert_eq!(reply.message(), "ERR unknown command");
}

#[test]
fn trailing_bytes_are_ignored_by_unmarshal() {
    let mut n = 0i64;
    unmarshal(b":1\r\n:2\r\n", &mut n).unwrap();
    assert_eq!(n, 1);
    unmarshal(b":3\r\n", &mut n).unwrap();
    assert_eq!(n, 3);
}

#[test]
fn empty_input_is_an_unexpected_eof() {
    let mut n = 0i64;
    let err = unmarshal(b"", &mut n).unwrap_err();
    assert_eq!(err.io_kind(), Some(io::ErrorKind::UnexpectedEof));
}

#[test]
fn framing_errors_are_protocol_errors() {
    let mut v = Value::Nil;
    let err = unmarshal(b"!x\r\n", &mut v).unwrap_err();
    assert_eq!(err.protocol_error::<RespError>(), Some(&RespError::UnknownType(b'!')));
    let err = unmarshal(b"$5\r\nab\r\n", &mut v).unwrap_err();
    assert_eq!(err.protocol_error::<RespError>(), Some(&RespError::EndOfInput));
}

#[derive(Debug, Default, PartialEq)]
struct Entry {
    key: String,
    ttl: i64,
    hits: u32,
}

impl Record for Entry {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::new("key", |e: &Entry| &e.key, |e: &mut Entry| &mut e.key),
            Field::new("ttl", |e: &Entry| &e.ttl, |e: &mut Entry| &mut e.ttl).omit_empty(),
            Field::new("hits", |e: &Entry| &e.hits, |e: &mut Entry| &mut e.hits),
        ]
    }
}

record_codec!(Entry);

#[test]
fn records_travel_as_flat_arrays() {
    let entry = Entry {
        key: "k-0".into(),
        ttl: 0,
        hits: 3,
    };
    let b = marshal(&entry).unwrap();
    assert_eq!(b, b"*4\r\n+key\r\n+k-0\r\n+hits\r\n:3\r\n");
    let mut back = Entry::default();
    unmarshal(&b, &mut back).unwrap();
    assert_eq!(back, entry);
}

#[test]
fn sorted_maps_are_byte_identical() {
    let resp = Resp::default().with_sort_map_keys(true);
    let a: HashMap<String, i64> = [("b", 2), ("a", 1), ("c", 3)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let b: HashMap<String, i64> = [("c", 3), ("b", 2), ("a", 1)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let ea = resp.marshal(&a).unwrap();
    assert_eq!(ea, resp.marshal(&b).unwrap());
    assert_eq!(ea, b"*6\r\n+a\r\n:1\r\n+b\r\n:2\r\n+c\r\n:3\r\n");

    let mut back: HashMap<String, i64> = HashMap::new();
    resp.unmarshal(&ea, &mut back).unwrap();
    assert_eq!(back, a);
}

#[test]
fn integer_extremes_round_trip() {
    assert_eq!(marshal(&u64::MAX).unwrap(), b":18446744073709551615\r\n");
    let mut u = 0u64;
    unmarshal(b":18446744073709551615\r\n", &mut u).unwrap();
    assert_eq!(u, u64::MAX);

    let mut v = Value::Nil;
    unmarshal(b":9223372036854775808\r\n", &mut v).unwrap();
    assert_eq!(v, Value::Uint(1 << 63));

    let mut i = 0i64;
    unmarshal(&marshal(&i64::MIN).unwrap(), &mut i).unwrap();
    assert_eq!(i, i64::MIN);
}

#[test]
fn mapped_kinds_round_trip() {
    let mut b = false;
    unmarshal(&marshal(&true).unwrap(), &mut b).unwrap();
    assert!(b);

    let mut f = 0f64;
    unmarshal(&marshal(&-2.25f64).unwrap(), &mut f).unwrap();
    assert_eq!(f, -2.25);

    let t = chrono::DateTime::from_timestamp(1_600_000_000, 5_000).unwrap();
    let mut back = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
    unmarshal(&marshal(&t).unwrap(), &mut back).unwrap();
    assert_eq!(back, t);

    let d = chrono::TimeDelta::milliseconds(1500);
    assert_eq!(marshal(&d).unwrap(), b":1500000000\r\n");
    let mut back = chrono::TimeDelta::zero();
    unmarshal(b":1500000000\r\n", &mut back).unwrap();
    assert_eq!(back, d);
}

#[test]
fn registry_lookup() {
    let registry = Registry::new();
    objconv_resp::register(&registry);
    assert_eq!(registry.names(), ["application/x-resp", "resp"]);

    let codec = registry.lookup("application/x-resp").unwrap();
    let cx = Context::new();
    let mut p = codec.parser(io::Cursor::new(b":5\r\n".to_vec()));
    let mut n = 0u8;
    Decoder::new(&mut *p, &cx).decode(&mut n).unwrap();
    assert_eq!(n, 5);

    let mut e = codec.emitter(io::sink());
    objconv::Encoder::new(&mut *e, &cx).encode("ok").unwrap();
}

proptest! {
    #[test]
    fn ints_round_trip(v in any::<i64>()) {
        let mut back = 0i64;
        unmarshal(&marshal(&v).unwrap(), &mut back).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn uints_round_trip(v in any::<u64>()) {
        let mut back = 0u64;
        unmarshal(&marshal(&v).unwrap(), &mut back).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn strings_round_trip(v in any::<String>()) {
        let mut back = String::new();
        unmarshal(&marshal(&v).unwrap(), &mut back).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn floats_round_trip(v in any::<f64>().prop_filter("nan", |f| !f.is_nan())) {
        let mut back = 0f64;
        unmarshal(&marshal(&v).unwrap(), &mut back).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn byte_vectors_round_trip(v in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut back: Vec<u8> = Vec::new();
        unmarshal(&marshal(&v).unwrap(), &mut back).unwrap();
        prop_assert_eq!(back, v);
    }
}
