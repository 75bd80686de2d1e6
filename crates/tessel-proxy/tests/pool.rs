//! Pool allocation, recycling and memory layout.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tessel_core::Value;
use tessel_proxy::{Pool, PoolOptions, Proxy, ProxyOps, Schema, Storage, Tracking};

fn uint8() -> Schema {
    Schema::primitive("uint8")
}

fn nested() -> Schema {
    Schema::object([("x", uint8()), ("o", Schema::object([("x", uint8())]))])
}

fn object(proxy: &Proxy) -> &tessel_proxy::ObjectProxy {
    proxy.as_object().expect("object proxy")
}

// ── Configuration ───────────────────────────────────────────────

#[test]
fn unknown_types_are_reported() {
    let schema = Schema::object([("x", Schema::primitive("vec3"))]);
    let err = Pool::new(&schema, PoolOptions::default()).unwrap_err();
    assert!(err.to_string().contains("not registered"), "{err}");
}

#[test]
fn leaf_roots_are_rejected() {
    let err = Pool::new(&uint8(), PoolOptions::default()).unwrap_err();
    assert!(err.to_string().contains("not a proxy type"), "{err}");
}

// ── Layout ──────────────────────────────────────────────────────

#[test]
fn nested_fields_share_the_record() {
    let mut pool = Pool::new(&nested(), PoolOptions::default()).unwrap();
    assert_eq!(pool.storage(), Storage::Mapped);
    pool.allocate(Some(&Value::object([
        ("x", Value::from(43)),
        ("o", Value::object([("x", 12)])),
    ])));
    let imports = pool.imports();
    let data = imports.data.borrow();
    assert_eq!(data.bytes()[0], 43);
    assert_eq!(data.bytes()[1], 12);
    assert_eq!(imports.length.get(), 1);
}

#[test]
fn second_slot_follows_the_first() {
    let mut pool = Pool::new(&nested(), PoolOptions::default()).unwrap();
    pool.allocate(None);
    let second = pool.allocate(Some(&Value::object([("x", 7)])));
    assert_eq!(second.slot(), 1);
    assert_eq!(pool.imports().data.borrow().bytes()[2], 7);
}

// ── Recycling ───────────────────────────────────────────────────

fn reallocated_diff(schema: &Schema) -> Option<Value> {
    let mut pool = Pool::new(schema, PoolOptions::default()).unwrap();
    let proxy = pool.allocate(None);
    object(&proxy).set("x", 5);
    object(&proxy).object("o").unwrap().set("x", 6);
    pool.mark_clean();
    pool.free(&proxy);
    let again = pool.allocate(None);
    assert!(again.ptr_eq(&proxy));
    again.diff()
}

#[test]
fn reallocation_seeds_every_leaf_mapped() {
    assert_eq!(
        reallocated_diff(&nested()),
        Some(Value::object([
            ("x", Value::from(0u8)),
            ("o", Value::object([("x", 0u8)])),
        ]))
    );
}

#[test]
fn reallocation_seeds_every_leaf_concrete() {
    let schema = nested().with_property("s", Schema::primitive("string"));
    assert_eq!(
        reallocated_diff(&schema),
        Some(Value::object([
            ("x", Value::from(0u8)),
            ("o", Value::object([("x", 0u8)])),
            ("s", Value::from("")),
        ]))
    );
}

#[test]
fn churn_resets_to_defaults() {
    let schema = Schema::object([("z", uint8().with_default(123)), ("a", uint8())]);
    let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
    let first = pool.allocate(Some(&Value::object([("z", 23)])));
    assert_eq!(object(&first).get("z"), Some(Value::from(23u8)));
    pool.free(&first);

    let second = pool.allocate(Some(&Value::object([("a", 54)])));
    assert!(second.ptr_eq(&first));
    assert_eq!(pool.imports().data.borrow().bytes()[1], 54);
    assert_eq!(object(&second).get("z"), Some(Value::from(123u8)));
    assert_eq!(object(&second).get("a"), Some(Value::from(54u8)));
}

#[test]
fn freed_contents_persist_until_reuse() {
    let mut pool = Pool::new(&nested(), PoolOptions::default()).unwrap();
    let proxy = pool.allocate(Some(&Value::object([("x", 9)])));
    pool.free(&proxy);
    assert_eq!(pool.imports().data.borrow().bytes()[0], 9);
    assert!(pool.proxy(0).is_none());
    assert_eq!(proxy.diff(), None);
}

// ── Dirty memory ────────────────────────────────────────────────

#[test]
fn shapeless_objects_still_use_dirty_bits() {
    let schema = Schema::object([("s", Schema::primitive("string"))]);
    let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
    assert_eq!(pool.storage(), Storage::Concrete);
    let proxy = pool.allocate(None);
    let dirty = pool.imports().dirty;
    assert_eq!(dirty.borrow().bytes()[0], 1);
    pool.mark_clean();
    assert_eq!(dirty.borrow().bytes()[0], 0);
    object(&proxy).set("s", "hello");
    assert_eq!(dirty.borrow().bytes()[0], 1);
}

#[test]
fn mark_clean_zeroes_every_slot() {
    let mut pool = Pool::new(&nested(), PoolOptions::default()).unwrap();
    for _ in 0..5 {
        pool.allocate(None);
    }
    assert!(pool.imports().dirty.borrow().bytes()[..2].iter().any(|b| *b != 0));
    pool.mark_clean();
    assert!(pool.imports().dirty.borrow().bytes().iter().all(|b| *b == 0));
    assert!(pool.diff().is_empty());
}

#[test]
fn pool_diff_is_keyed_by_slot() {
    let mut pool = Pool::new(&nested(), PoolOptions::default()).unwrap();
    pool.allocate(None);
    let second = pool.allocate(None);
    pool.mark_clean();
    object(&second).set("x", 3);
    let diff = pool.diff();
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[&1], Value::object([("x", 3u8)]));
}

#[test]
fn tracking_off_keeps_no_dirty_state() {
    let mut pool = Pool::new(&nested(), PoolOptions::with_tracking(Tracking::Off)).unwrap();
    let proxy = pool.allocate(Some(&Value::object([("x", 1)])));
    assert_eq!(proxy.diff(), None);
    assert!(pool.diff().is_empty());
    assert!(pool.imports().dirty.borrow().is_empty());
}

#[test]
fn allocations_notify_per_leaf() {
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    let schema = Schema::object([("a", uint8()), ("b", uint8())]);
    let tracking = Tracking::notify(move |_, _| seen.set(seen.get() + 1));
    let mut pool = Pool::new(&schema, PoolOptions::with_tracking(tracking)).unwrap();
    pool.allocate(None);
    assert_eq!(calls.get(), 2);
    pool.allocate(None);
    assert_eq!(calls.get(), 4);
}

// ── Hooks ───────────────────────────────────────────────────────

#[test]
fn init_runs_before_population() {
    let mut pool = Pool::new(&nested(), PoolOptions::default()).unwrap();
    let seen = RefCell::new(None);
    let proxy = pool.allocate_with(Some(&Value::object([("x", 1)])), |proxy| {
        *seen.borrow_mut() = object(proxy).get("x");
    });
    assert_eq!(seen.into_inner(), Some(Value::from(0u8)));
    assert_eq!(object(&proxy).get("x"), Some(Value::from(1u8)));
}

#[test]
fn decorators_run_once_per_construction() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let outer = Rc::clone(&order);
    let inner = Rc::clone(&order);
    let schema = Schema::object([
        ("x", uint8()),
        (
            "o",
            Schema::object([("x", uint8())]).with_wrapper(move |_| inner.borrow_mut().push("o")),
        ),
    ])
    .with_wrapper(move |_| outer.borrow_mut().push("root"));
    let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
    let proxy = pool.allocate(None);
    pool.free(&proxy);
    pool.allocate(None);
    assert_eq!(*order.borrow(), ["o", "root"]);
}

#[test]
fn foreign_proxies_are_not_freed() {
    let mut a = Pool::new(&nested(), PoolOptions::default()).unwrap();
    let mut b = Pool::new(&nested(), PoolOptions::default()).unwrap();
    let proxy = a.allocate(None);
    b.allocate(None);
    b.free(&proxy);
    assert_eq!(b.free_count(), 0);
    assert_eq!(b.live_count(), 1);
}
