//! Ghost Tag Store Tests
//!
//! Identity-keyed tags that never keep their object alive:
//! - Tags follow object identity, not equality
//! - Dropped objects lose their tag and are swept
//! - Concurrent tagging from many threads
//! - Ghost array instance checks and checked casts
//!
//! # Running Tests
//! ```bash
//! cargo test --test ghost_tags
//! ```

use std::sync::{Arc, Barrier};
use std::thread;

use corvid_engine::ghost::{self, TagStore};
use corvid_engine::{BridgeError, GuestTypeTag, HostClass};

fn named() -> GuestTypeTag {
    GuestTypeTag::ghost("demo.Named", Vec::new())
}

// ===== Identity Tests =====

#[test]
fn test_equal_values_are_distinct_identities() {
    let store = TagStore::new(0);
    let a = Arc::new(String::from("same"));
    let b = Arc::new(String::from("same"));

    store.set_tag(&a, named());
    assert_eq!(store.get_tag(&a), Some(named()));
    assert_eq!(store.get_tag(&b), None);

    let alias = a.clone();
    assert_eq!(store.get_tag(&alias), Some(named()));
}

#[test]
fn test_tag_does_not_extend_lifetime() {
    let store = TagStore::new(0);
    let class = HostClass::builder("demo.Holder").build().unwrap();
    let obj = class.instantiate();
    let weak = Arc::downgrade(&obj);

    store.set_tag(&obj, named());
    drop(obj);

    assert!(weak.upgrade().is_none());
    assert_eq!(store.live_entries(), 0);
    assert_eq!(store.purge(), 1);
}

#[test]
fn test_global_store_is_shared() {
    let a = ghost::global();
    let b = ghost::global();
    assert!(std::ptr::eq(a, b));

    let obj = Arc::new(7u32);
    a.set_tag(&obj, named());
    assert_eq!(b.get_tag(&obj), Some(named()));
}

// ===== Concurrency Tests =====

#[test]
fn test_concurrent_tagging() {
    let store = Arc::new(TagStore::new(16));
    let tags: Vec<GuestTypeTag> = (0..8)
        .map(|i| GuestTypeTag::ghost(format!("demo.Ghost{}", i), Vec::new()))
        .collect();
    let barrier = Arc::new(Barrier::new(tags.len()));

    let handles: Vec<_> = tags
        .iter()
        .cloned()
        .map(|tag| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut kept = Vec::new();
                for i in 0..200 {
                    let obj = Arc::new(i as u64);
                    store.set_tag(&obj, tag.clone());
                    if i % 10 == 0 {
                        kept.push(obj);
                    }
                }
                for obj in &kept {
                    assert_eq!(store.get_tag(obj).as_ref(), Some(&tag));
                }
                kept
            })
        })
        .collect();

    let kept: Vec<Vec<Arc<u64>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(store.live_entries(), 8 * 20);

    store.purge();
    assert_eq!(store.len(), 8 * 20);
    drop(kept);
    assert_eq!(store.live_entries(), 0);
}

#[test]
fn test_concurrent_overwrite_keeps_one_entry() {
    let store = Arc::new(TagStore::new(0));
    let obj = Arc::new(String::from("contended"));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            let obj = obj.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    store.set_tag(&obj, GuestTypeTag::ghost(format!("demo.T{}", i), Vec::new()));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 1);
    let name = store.get_tag(&obj).unwrap().name().to_string();
    assert!(name.starts_with("demo.T"));
}

// ===== Ghost Array Tests =====

#[test]
fn test_array_instance_through_subtype() {
    let store = TagStore::new(0);
    let ghost_type = named();
    let implementor = GuestTypeTag::class("demo.Person", None, vec![ghost_type.clone()]);
    let array = HostClass::builder("demo.Object[][]").build().unwrap().instantiate();

    store.set_tag(&array, implementor.make_array_type(2));
    assert!(store.is_ghost_array_instance(&array, &ghost_type, 2));
    assert!(!store.is_ghost_array_instance(&array, &ghost_type, 1));
    assert!(!store.is_ghost_array_instance(&array, &ghost_type, 3));
}

#[test]
fn test_cast_failure_message() {
    let store = TagStore::new(0);
    let untagged = HostClass::builder("demo.Object[]").build().unwrap().instantiate();

    let err = store.cast_ghost_array(Some(&untagged), &named(), 1).unwrap_err();
    assert!(matches!(err, BridgeError::ClassCast(_)));
    assert_eq!(err.to_string(), "demo.Object[] cannot be cast to [Ldemo.Named;");
    assert_eq!(err.guest_class(), "java.lang.ClassCastException");
}
