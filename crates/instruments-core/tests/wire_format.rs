//! statsd line encoding.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use instruments_core::wire::{self, Unit};

fn text(b: bytes::Bytes) -> String {
    String::from_utf8(b.to_vec()).unwrap()
}

#[test]
fn units_render() {
    assert_eq!(text(wire::counter("api.hits", 3)), "api.hits:3|c");
    assert_eq!(text(wire::timer("api.get", 12.5)), "api.get:12.5|ms");
    assert_eq!(text(wire::timer("api.get", 10.0)), "api.get:10|ms");
    assert_eq!(text(wire::gauge("queue.depth", -4.0)), "queue.depth:-4|g");
}

#[test]
fn framing_characters_are_replaced() {
    assert_eq!(text(wire::encode("a:b|c\nd", 1, Unit::Counter)), "a_b_c_d:1|c");
}

#[test]
fn unit_strings() {
    assert_eq!(Unit::Counter.as_str(), "c");
    assert_eq!(Unit::Timer.as_str(), "ms");
    assert_eq!(Unit::Gauge.as_str(), "g");
}
