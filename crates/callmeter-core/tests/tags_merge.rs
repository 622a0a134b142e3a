//! Tag ordering and meter identity.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use callmeter_core::tags::{MeterId, Tags};

#[test]
fn later_tags_override_earlier_ones() {
    let tags = Tags::of("class", "FromSpec")
        .and("exception", "none")
        .and("class", "Inventory");
    assert_eq!(tags.len(), 3);
    assert_eq!(tags.get("class"), Some("Inventory"));

    let id = MeterId::new("method.timed", tags);
    assert_eq!(id.tags().len(), 2);
    assert_eq!(id.tag("class"), Some("Inventory"));
    assert_eq!(id.tag("exception"), Some("none"));
}

#[test]
fn identity_ignores_insertion_order() {
    let a = MeterId::new("m", Tags::of("a", "1").and("b", "2"));
    let b = MeterId::new("m", Tags::of("b", "2").and("a", "1"));
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "m{a=\"1\",b=\"2\"}");
}

#[test]
fn from_pairs_rejects_odd_length() {
    assert!(Tags::from_pairs(&["k"]).is_err());
    let tags = Tags::from_pairs(&["k", "v"]).unwrap();
    assert_eq!(tags.get("k"), Some("v"));
    assert!(Tags::from_pairs::<&str>(&[]).unwrap().is_empty());
}
