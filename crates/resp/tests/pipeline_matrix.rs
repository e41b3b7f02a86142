use objconv::{Error, Value};
use objconv_resp::{new_stream_decoder, new_stream_encoder, Resp};

const LONG: &str = "resp: ParseMapNext should never be called because RESP has no map type, this is likely a bug in the decoder code";

fn bulk(s: &str) -> String {
    format!("${}\r\n{}\r\n", s.len(), s)
}

fn command(args: &[&str]) -> String {
    let mut out = format!("*{}\r\n", args.len());
    for arg in args {
        out.push_str(&bulk(arg));
    }
    out
}

fn frames() -> Vec<Vec<&'static str>> {
    vec![
        vec!["set", "k-0", LONG, "ex", "1"],
        vec!["get", "k-0"],
        vec!["set", "k-1", "1", "ex", "1"],
        vec!["get", "k-1"],
    ]
}

#[test]
fn fixture_layout() {
    let input = command(&["set", "k-0", LONG, "ex", "1"]);
    assert!(input.contains("$112\r\n"));
}

#[test]
fn pipelined_frames_decode_in_order() {
    let frames = frames();
    let input: String = frames.iter().map(|f| command(f)).collect();
    let mut dec = new_stream_decoder(input.as_bytes());

    for (n, frame) in frames.iter().enumerate() {
        assert_eq!(dec.len(), frame.len() as isize, "frame {n}");
        let mut got = Vec::new();
        let mut v: Vec<u8> = Vec::new();
        while dec.decode(&mut v).is_ok() {
            got.push(String::from_utf8(v.clone()).unwrap());
        }
        assert_eq!(&got, frame, "frame {n}");
        if n + 1 < frames.len() {
            dec.next_frame().unwrap();
        }
    }

    let mut v: Vec<u8> = Vec::new();
    assert!(dec.decode(&mut v).unwrap_err().is_end());
}

#[test]
fn next_frame_skips_unread_elements() {
    let input = command(&["set", "k", "v"]) + &command(&["get", "k"]);
    let mut dec = new_stream_decoder(input.as_bytes());
    let mut s = String::new();
    dec.decode(&mut s).unwrap();
    assert_eq!(s, "set");
    dec.next_frame().unwrap();
    let mut rest = Vec::new();
    while dec.decode(&mut s).is_ok() {
        rest.push(s.clone());
    }
    assert_eq!(rest, ["get", "k"]);
}

#[test]
fn stream_of_integers_ends() {
    let mut dec = new_stream_decoder(&b"*3\r\n:1\r\n:2\r\n:3\r\n"[..]);
    let mut got = Vec::new();
    let mut n = 0i64;
    for _ in 0..3 {
        dec.decode(&mut n).unwrap();
        got.push(n);
    }
    assert_eq!(got, [1, 2, 3]);
    assert!(dec.decode(&mut n).unwrap_err().is_end());
    assert!(dec.decode(&mut n).unwrap_err().is_end());
}

#[test]
fn nil_frame_is_empty() {
    let mut dec = new_stream_decoder(&b"*-1\r\n"[..]);
    assert_eq!(dec.len(), 0);
    let mut v = Value::Nil;
    assert!(dec.decode(&mut v).unwrap_err().is_end());
}

#[test]
fn stream_encoder_declared_count() {
    let mut enc = new_stream_encoder(Vec::new());
    enc.open(2).unwrap();
    enc.encode("get").unwrap();
    enc.encode(&b"k-0".to_vec()).unwrap();
    let err = enc.encode("extra").unwrap_err();
    assert!(matches!(err, Error::Capacity(2)));
    enc.close().unwrap();
    enc.close().unwrap();
    assert_eq!(enc.into_inner().into_inner(), b"*2\r\n+get\r\n$3\r\nk-0\r\n");
}

#[test]
fn stream_encoder_with_unknown_count() {
    let mut enc = new_stream_encoder(Vec::new());
    for n in 1..=3i64 {
        enc.encode(&n).unwrap();
    }
    enc.close().unwrap();
    assert_eq!(enc.into_inner().into_inner(), b"*3\r\n:1\r\n:2\r\n:3\r\n");
}

#[test]
fn closing_an_unused_stream_writes_an_empty_array() {
    let mut enc = new_stream_encoder(Vec::new());
    enc.close().unwrap();
    assert!(matches!(enc.encode(&1i64), Err(Error::Closed)));
    assert_eq!(enc.into_inner().into_inner(), b"*0\r\n");
}

#[test]
fn pipeline_mode_writes_top_level_messages() {
    let resp = Resp::default();
    let mut enc = resp.pipeline_encoder(Vec::new());
    enc.encode("PING").unwrap();
    enc.encode(&vec!["GET", "k"]).unwrap();
    enc.close().unwrap();
    let wire = enc.into_inner().into_inner();
    assert_eq!(wire, b"+PING\r\n*2\r\n+GET\r\n+k\r\n");

    let mut dec = resp.pipeline_decoder(&wire[..]);
    assert_eq!(dec.len(), -1);
    let mut got = Vec::new();
    let mut v = Value::Nil;
    while dec.decode(&mut v).is_ok() {
        got.push(v.clone());
    }
    assert_eq!(
        got,
        [
            Value::from("PING"),
            Value::Array(vec![Value::from("GET"), Value::from("k")]),
        ]
    );
}

#[test]
fn truncated_frame_is_an_error() {
    let mut dec = new_stream_decoder(&b"*2\r\n:1\r\n"[..]);
    let mut n = 0i64;
    dec.decode(&mut n).unwrap();
    let err = dec.decode(&mut n).unwrap_err();
    assert!(!err.is_end());
    assert!(dec.decode(&mut n).is_err());
}
