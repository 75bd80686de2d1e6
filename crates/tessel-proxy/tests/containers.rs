//! Arrays and maps: pooled elements, identity, and upward dirtying.

use std::cell::Cell;
use std::rc::Rc;

use tessel_arena::MemoryConfig;
use tessel_core::Value;
use tessel_proxy::{ArrayProxy, MapProxy, Pool, PoolOptions, ProxyOps, Schema, Tracking};

fn uint8() -> Schema {
    Schema::primitive("uint8")
}

fn point() -> Schema {
    Schema::object([("x", uint8())])
}

fn px(x: u8) -> Value {
    Value::object([("x", x)])
}

fn counter() -> (Rc<Cell<usize>>, Tracking) {
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    (calls, Tracking::notify(move |_, _| seen.set(seen.get() + 1)))
}

fn array_pool(schema: Schema, tracking: Tracking) -> (Pool, ArrayProxy) {
    let mut pool = Pool::new(&schema, PoolOptions::with_tracking(tracking)).unwrap();
    let array = pool.allocate(None).as_array().cloned().unwrap();
    (pool, array)
}

fn map_pool(schema: Schema) -> (Pool, MapProxy) {
    let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
    let map = pool.allocate(None).as_map().cloned().unwrap();
    (pool, map)
}

// ── Arrays ──────────────────────────────────────────────────────

#[test]
fn array_default_is_seeded_dirty() {
    let schema = Schema::array(uint8()).with_default(Value::list([1, 2, 3]));
    let (_pool, array) = array_pool(schema, Tracking::On);
    assert_eq!(
        array.diff(),
        Some(Value::indexed([(0, 1u8), (1, 2), (2, 3)]))
    );
}

#[test]
fn array_assign_notifies_per_element() {
    let (calls, tracking) = counter();
    let mut pool = Pool::new(&Schema::array(uint8()), PoolOptions::with_tracking(tracking)).unwrap();
    pool.allocate(Some(&Value::list([1, 2, 3])));
    assert_eq!(calls.get(), 3);
}

#[test]
fn array_elements_keep_identity() {
    let (pool, array) = array_pool(Schema::array(point()), Tracking::On);
    array.assign(&Value::list([px(1), px(2), px(3)]));
    let first = array.at(0).unwrap();
    let middle = array.at(1).unwrap();

    // Replacing the whole list frees in reverse, so slot order survives.
    array.assign(&Value::list([px(4), px(5), px(6)]));
    assert!(array.at(0).unwrap().ptr_eq(&first));
    assert!(array.at(1).unwrap().ptr_eq(&middle));

    array.mark_clean();
    array.set_at(0, px(7));
    array.set_at(1, Value::Null);
    assert!(array.at(0).unwrap().ptr_eq(&first));
    assert_eq!(
        array.diff(),
        Some(Value::indexed([(0, px(7)), (1, Value::Null)]))
    );
    array.mark_clean();
    assert_eq!(array.diff(), Some(Value::indexed::<Value, _>([])));

    array.set_at(1, px(8));
    assert!(array.at(1).unwrap().ptr_eq(&middle));
    assert_eq!(pool.len(), 1);
}

#[test]
fn array_inside_object() {
    let schema = Schema::object([("x", Schema::array(uint8()))]);
    let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
    let proxy = pool.allocate(None);
    pool.mark_clean();
    proxy.as_object().unwrap().array("x").unwrap().set_at(1, 3);
    assert_eq!(
        proxy.diff(),
        Some(Value::object([("x", Value::indexed([(1, 3u8)]))]))
    );
}

#[test]
fn partial_assign_keeps_other_elements() {
    let (_pool, array) = array_pool(Schema::array(point()), Tracking::On);
    array.assign(&Value::list([px(1), px(2)]));
    let second = array.at(1).unwrap();
    array.assign(&Value::indexed([(0, px(9))]));
    assert_eq!(array.to_json(), Value::list([px(9), px(2)]));
    assert!(array.at(1).unwrap().ptr_eq(&second));
}

#[test]
fn element_writes_reach_the_array() {
    let (calls, tracking) = counter();
    let (_pool, array) = array_pool(Schema::array(point()), tracking);
    assert_eq!(calls.get(), 0);
    array.set_at(0, px(1));
    assert_eq!(calls.get(), 1);
    array.set_at(0, px(2));
    assert_eq!(calls.get(), 2);
    array.set_at(1, px(0));
    assert_eq!(calls.get(), 3);
    array.set_at(0, Value::Null);
    assert_eq!(calls.get(), 4);

    array.mark_clean();
    array.at(1).unwrap().as_object().unwrap().set("x", 5);
    assert_eq!(calls.get(), 5);
    assert_eq!(array.dirty_indices(), [1]);
}

#[test]
fn array_tracking_off() {
    let (_pool, array) = array_pool(Schema::array(point()), Tracking::Off);
    array.assign(&Value::list([px(1)]));
    assert_eq!(array.diff(), None);
    assert_eq!(array.at(0).unwrap().diff(), None);
}

#[test]
fn removed_elements_return_to_the_pool() {
    let (_pool, array) = array_pool(Schema::array(point()), Tracking::On);
    array.assign(&Value::list([px(1), px(2)]));
    let elements = array.element_pool().unwrap();
    assert_eq!(elements.borrow().free_count(), 0);

    array.set_at(1, Value::Null);
    assert_eq!(elements.borrow().free_count(), 1);
    assert_eq!(
        array.diff(),
        Some(Value::indexed([(0, px(1)), (1, Value::Null)]))
    );

    array.set_at(1, px(3));
    assert_eq!(elements.borrow().free_count(), 0);
    assert_eq!(
        array.diff(),
        Some(Value::indexed([(0, px(1)), (1, px(3))]))
    );
}

#[test]
fn truncation_frees_composites() {
    let (_pool, array) = array_pool(Schema::array(point()), Tracking::On);
    array.assign(&Value::list([px(1), px(2), px(3)]));
    array.mark_clean();
    array.set_length(1);
    assert_eq!(array.element_pool().unwrap().borrow().free_count(), 2);
    assert_eq!(array.dirty_indices(), [1, 2]);
    array.set_length(3);
    assert_eq!(array.len(), 3);
    assert!(array.at(2).is_none());
}

#[test]
fn reallocated_arrays_start_from_the_default() {
    let schema = Schema::array(uint8()).with_default(Value::list([7]));
    let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
    let proxy = pool.allocate(Some(&Value::list([1, 2, 3])));
    pool.free(&proxy);
    let again = pool.allocate(None);
    assert!(again.ptr_eq(&proxy));
    assert_eq!(again.to_json(), Value::list([7]));
}

#[test]
fn null_input_resets_a_recycled_array() {
    let schema = Schema::array(uint8()).with_default(Value::list([7]));
    let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
    let proxy = pool.allocate(Some(&Value::list([1, 2, 3])));
    pool.free(&proxy);
    let again = pool.allocate(Some(&Value::Null));
    assert!(again.ptr_eq(&proxy));
    assert_eq!(again.to_json(), Value::list([7]));
}

#[test]
fn reused_array_diff_has_no_stale_positions() {
    let mut pool = Pool::new(&Schema::array(uint8()), PoolOptions::default()).unwrap();
    let proxy = pool.allocate(Some(&Value::list([1, 2, 3])));
    pool.free(&proxy);
    let again = pool.allocate(Some(&Value::list([9])));
    assert_eq!(again.diff(), Some(Value::indexed([(0, 9u8)])));
}

#[test]
fn reused_array_returns_old_elements() {
    let mut pool = Pool::new(&Schema::array(point()), PoolOptions::default()).unwrap();
    let proxy = pool.allocate(Some(&Value::list([px(1), px(2)])));
    let elements = proxy.as_array().unwrap().element_pool().unwrap();
    assert_eq!(elements.borrow().free_count(), 0);
    pool.free(&proxy);
    let again = pool.allocate(None);
    assert_eq!(elements.borrow().free_count(), 2);
    assert_eq!(again.to_json(), Value::list(Vec::<Value>::new()));
    assert_eq!(again.diff(), Some(Value::indexed(Vec::<(usize, Value)>::new())));
}

#[test]
fn element_pools_inherit_the_memory_config() {
    let memory = MemoryConfig {
        page_size: 4,
        max_pages: 8,
    };
    let options = PoolOptions {
        memory: memory.clone(),
        ..PoolOptions::default()
    };
    let mut pool = Pool::new(&Schema::array(point()), options).unwrap();
    let array = pool.allocate(None).as_array().cloned().unwrap();
    assert_eq!(array.element_pool().unwrap().borrow().config(), &memory);
}

// ── Maps ────────────────────────────────────────────────────────

#[test]
fn null_input_applies_the_map_default() {
    let schema = Schema::map(uint8(), uint8()).with_default(Value::list([Value::list([1, 2])]));
    let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
    let map = pool.allocate(Some(&Value::Null));
    assert_eq!(map.to_json(), Value::entries([(1u8, 2u8)]));
    map.as_map().unwrap().set(5, 6);
    pool.free(&map);
    let again = pool.allocate(Some(&Value::Null));
    assert_eq!(again.to_json(), Value::entries([(1u8, 2u8)]));
}

#[test]
fn reused_map_diff_has_no_stale_keys() {
    let mut pool = Pool::new(&Schema::map(uint8(), uint8()), PoolOptions::default()).unwrap();
    let map = pool.allocate(Some(&Value::object([("1", 2)])));
    pool.free(&map);
    let again = pool.allocate(Some(&Value::object([("3", 4)])));
    assert_eq!(again.diff(), Some(Value::entries([(3u8, 4u8)])));
}

#[test]
fn map_set_and_get() {
    let (_pool, map) = map_pool(Schema::map(uint8(), point()));
    map.set(0, px(3));
    assert_eq!(map.get(0), Some(px(3)));
    assert!(map.at(0).is_some());
    assert_eq!(map.to_json(), Value::entries([(0u8, px(3))]));
}

#[test]
fn map_values_keep_identity() {
    let (_pool, map) = map_pool(Schema::map(uint8(), point()));
    map.set(1, px(1));
    let held = map.at(1).unwrap();
    map.set(1, px(2));
    assert!(map.at(1).unwrap().ptr_eq(&held));
    assert_eq!(map.get(1), Some(px(2)));
}

#[test]
fn nested_maps() {
    let inner = Schema::map(uint8(), point());
    let (_pool, map) = map_pool(Schema::map(uint8(), inner));
    map.set(0, Value::entries([(0u8, px(3))]));
    assert_eq!(
        map.to_json(),
        Value::entries([(0u8, Value::entries([(0u8, px(3))]))])
    );
}

#[test]
fn map_tombstones() {
    let (_pool, map) = map_pool(Schema::map(uint8(), point()));
    map.set(0, px(1));
    map.mark_clean();
    assert!(map.delete(0));
    assert_eq!(map.diff(), Some(Value::entries([(0u8, Value::Null)])));
    assert_eq!(map.element_pool().unwrap().borrow().free_count(), 1);

    map.mark_clean();
    map.set(1, px(1));
    map.set(2, px(2));
    map.mark_clean();
    map.clear();
    assert_eq!(
        map.diff(),
        Some(Value::entries([(1u8, Value::Null), (2u8, Value::Null)]))
    );
    map.mark_clean();
    assert_eq!(map.diff(), Some(Value::Entries(Vec::new())));
}

#[test]
fn nested_map_changes_propagate() {
    let inner = Schema::map(uint8(), point());
    let mut pool = Pool::new(&Schema::map(uint8(), inner), PoolOptions::default()).unwrap();
    let root = pool.allocate(None);
    let map = root.as_map().unwrap();
    map.set(0, Value::entries([(0u8, px(1))]));
    pool.mark_clean();
    assert_eq!(map.diff(), Some(Value::Entries(Vec::new())));

    let inner = map.at(0).unwrap();
    let point = inner.as_map().unwrap().at(0).unwrap();
    point.as_object().unwrap().set("x", 2);
    assert_eq!(
        root.diff(),
        Some(Value::entries([(0u8, Value::entries([(0u8, px(2))]))]))
    );
}

#[test]
fn map_inside_object_notifies_its_root() {
    let (calls, tracking) = counter();
    let schema = Schema::object([("m", Schema::map(Schema::primitive("string"), uint8()))]);
    let mut pool = Pool::new(&schema, PoolOptions::with_tracking(tracking)).unwrap();
    let proxy = pool.allocate(None);
    let before = calls.get();
    proxy.as_object().unwrap().map("m").unwrap().set("k", 1);
    assert_eq!(calls.get(), before + 1);
    assert_eq!(
        proxy.to_json(),
        Value::object([("m", Value::entries([("k", 1u8)]))])
    );
}
