// Cache fingerprint tests

use kagami::cache::{build_fingerprint, identity_fingerprint};
use kagami::image_optimizer::TransformSpec;
use kagami::storage::ObjectMetadata;
use std::collections::HashMap;

fn spec(pairs: &[(&str, &str)]) -> TransformSpec {
    let params: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    TransformSpec::from_query(&params, 90)
}

#[test]
fn test_query_order_does_not_matter() {
    let a = identity_fingerprint("cat.jpg", &spec(&[("width", "10"), ("format", "webp"), ("crop", "1,2,3,4")]));
    let b = identity_fingerprint("cat.jpg", &spec(&[("crop", "1,2,3,4"), ("format", "webp"), ("width", "10")]));
    assert_eq!(a, b);
    assert_eq!(
        a.as_str(),
        "img:cat.jpg?crop=1,2,3,4&format=webp&quality=90&width=10"
    );
}

#[test]
fn test_dropped_fields_do_not_appear() {
    let fp = identity_fingerprint("cat.jpg", &spec(&[("width", "abc"), ("fit", "stretch")]));
    assert_eq!(fp.as_str(), "img:cat.jpg?quality=90");
}

#[test]
fn test_metadata_changes_the_fingerprint() {
    let s = spec(&[("width", "10")]);
    let old = build_fingerprint("cat.jpg", &s, None, Some(&ObjectMetadata::new("aaa", 100)));
    let new = build_fingerprint("cat.jpg", &s, None, Some(&ObjectMetadata::new("bbb", 200)));
    assert_ne!(old, new);
    assert_eq!(old.as_str(), "img:cat.jpg?_etag=aaa&_ts=100&quality=90&width=10");
}

#[test]
fn test_identity_differs_from_full_when_metadata_known() {
    let s = spec(&[]);
    let identity = identity_fingerprint("cat.jpg", &s);
    let full = build_fingerprint("cat.jpg", &s, None, Some(&ObjectMetadata::new("e", 1)));
    assert_ne!(identity, full);
    assert!(full.as_str().starts_with("img:cat.jpg?"));
}

#[test]
fn test_etag_is_escaped() {
    let fp = build_fingerprint(
        "cat.jpg",
        &TransformSpec::empty(),
        None,
        Some(&ObjectMetadata {
            etag: Some("a&b=c".into()),
            last_modified: None,
        }),
    );
    assert_eq!(fp.as_str(), "img:cat.jpg?_etag=a%26b%3Dc");
}

#[test]
fn test_long_fingerprints_are_hashed_within_key_scope() {
    let long_etag = "e".repeat(2000);
    let fp = build_fingerprint(
        "cat.jpg",
        &spec(&[]),
        None,
        Some(&ObjectMetadata::new(long_etag, 1)),
    );
    assert!(fp.is_hashed());
    assert!(fp.as_str().starts_with("img:cat.jpg#sha256:"));
    assert_eq!(fp.as_str().len(), "img:cat.jpg#sha256:".len() + 64);
}

#[test]
fn test_empty_spec_is_bare_key() {
    assert_eq!(identity_fingerprint("a/b.png", &TransformSpec::empty()).as_str(), "img:a/b.png");
}
