//! statsd line protocol: `<label>:<value>|<unit>`, one line per datagram.

use std::fmt::{Display, Write};

use bytes::{BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Counter,
    Timer,
    Gauge,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Counter => "c",
            Unit::Timer => "ms",
            Unit::Gauge => "g",
        }
    }
}

/// Characters that would break the line framing are replaced with `_`.
fn push_label(buf: &mut BytesMut, label: &str) {
    for c in label.chars() {
        match c {
            ':' | '|' | '\n' | '\r' => buf.put_u8(b'_'),
            c => {
                let mut tmp = [0u8; 4];
                buf.put_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
}

pub fn encode(label: &str, value: impl Display, unit: Unit) -> Bytes {
    let mut buf = BytesMut::with_capacity(label.len() + 16);
    push_label(&mut buf, label);
    // BytesMut's fmt::Write never fails
    let _ = write!(buf, ":{}|{}", value, unit.as_str());
    buf.freeze()
}

pub fn counter(label: &str, count: u64) -> Bytes {
    encode(label, count, Unit::Counter)
}

pub fn timer(label: &str, millis: f64) -> Bytes {
    encode(label, millis, Unit::Timer)
}

pub fn gauge(label: &str, value: f64) -> Bytes {
    encode(label, value, Unit::Gauge)
}
