//! Integration Tests for the Reactive System
//!
//! These tests drive observed data, Computations, owners and the scheduler
//! together through the public API.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ripple_core::reactive::{
    callback, BatchScheduler, Computation, ErrorReporter, Owner, ReactiveContext, Runtime, WatchOptions,
    WatchSource,
};
use ripple_core::{delete, observe, set, Error, ObjectRef, Value};

fn json(value: serde_json::Value) -> Value {
    Value::from(value)
}

fn root(owner: &Owner) -> ObjectRef {
    owner.data().as_object().cloned().unwrap()
}

/// A sync watch on `a` fires exactly once with the new and old value.
#[test]
fn sync_watch_receives_new_and_old_value() {
    let owner = Owner::new("watch", json(serde_json::json!({ "a": 1 })));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();

    owner
        .watch(
            "a",
            callback(move |_, new, old| {
                recorded.lock().push((new.as_number(), old.as_number()));
                Ok(())
            }),
            WatchOptions::default().sync(),
        )
        .unwrap();

    root(&owner).set("a", 2).unwrap();
    assert_eq!(calls.lock().as_slice(), [(Some(2.0), Some(1.0))]);

    // Writing the same value again is not a change.
    root(&owner).set("a", 2).unwrap();
    assert_eq!(calls.lock().len(), 1);
}

/// A lazy Computation only recomputes when evaluated.
#[test]
fn lazy_computation_waits_for_evaluate() {
    let owner = Owner::new("lazy", json(serde_json::json!({ "a": 1, "b": 2 })));
    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();

    let sum = Computation::new(
        &owner,
        WatchSource::getter(move |owner| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            let data = owner.data();
            let obj = data.as_object().ok_or("root data is not an object")?;
            let a = obj.get("a").as_number().unwrap_or(0.0);
            let b = obj.get("b").as_number().unwrap_or(0.0);
            Ok(Value::from(a + b))
        }),
        None,
        WatchOptions::default().lazy(),
    )
    .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(sum.is_dirty());

    sum.evaluate().unwrap();
    assert_eq!(sum.value().as_number(), Some(3.0));
    assert!(!sum.is_dirty());

    root(&owner).set("a", 10).unwrap();
    root(&owner).set("b", 20).unwrap();
    assert!(sum.is_dirty());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    sum.evaluate().unwrap();
    assert_eq!(sum.value().as_number(), Some(30.0));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// A computed value read inside a watch forwards its dependencies.
#[test]
fn computed_value_feeds_a_watch() {
    let owner = Owner::new("computed", json(serde_json::json!({ "price": 2, "qty": 3 })));
    let total = owner
        .computed(|owner| {
            let data = owner.data();
            let obj = data.as_object().ok_or("root data is not an object")?;
            let price = obj.get("price").as_number().unwrap_or(0.0);
            let qty = obj.get("qty").as_number().unwrap_or(0.0);
            Ok(Value::from(price * qty))
        })
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let reader = total.clone();
    owner
        .watch(
            WatchSource::getter(move |_| Ok(reader.get()?)),
            callback(move |_, new, _| {
                recorded.lock().push(new.as_number());
                Ok(())
            }),
            WatchOptions::default().sync(),
        )
        .unwrap();

    root(&owner).set("qty", 5).unwrap();
    assert_eq!(seen.lock().as_slice(), [Some(10.0)]);
}

/// A deep watch re-runs on mutations below the watched value.
#[test]
fn deep_watch_tracks_nested_mutation() {
    let owner = Owner::new("deep", json(serde_json::json!({ "a": { "b": 1 } })));
    let shallow_calls = Arc::new(AtomicI32::new(0));
    let deep_calls = Arc::new(AtomicI32::new(0));

    let counter = shallow_calls.clone();
    owner
        .watch(
            "a",
            callback(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            WatchOptions::default().sync(),
        )
        .unwrap();
    let counter = deep_calls.clone();
    owner
        .watch(
            "a",
            callback(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            WatchOptions::default().sync().deep(),
        )
        .unwrap();

    let a = root(&owner).get("a");
    a.as_object().unwrap().set("b", 2).unwrap();

    assert_eq!(shallow_calls.load(Ordering::SeqCst), 0);
    assert_eq!(deep_calls.load(Ordering::SeqCst), 1);
}

/// Pushing onto an observed array notifies its readers once.
#[test]
fn array_push_notifies_once() {
    let owner = Owner::new("array", json(serde_json::json!({ "items": [1, 2] })));
    let calls = Arc::new(AtomicI32::new(0));
    let counter = calls.clone();
    owner
        .watch(
            "items",
            callback(move |_, new, _| {
                assert_eq!(new.as_array().map(|items| items.len()), Some(3));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            WatchOptions::default().sync(),
        )
        .unwrap();

    let items = root(&owner).get("items");
    items.as_array().unwrap().push(3).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn observe_is_idempotent() {
    let value = json(serde_json::json!({ "a": [1, { "b": 2 }] }));
    let first = observe(&value, false).unwrap();
    let second = observe(&value, false).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let subject = value.as_object().unwrap().property_subject("a").unwrap();
    observe(&value, false);
    assert!(subject.ptr_eq(&value.as_object().unwrap().property_subject("a").unwrap()));
}

/// Dependencies not read by the latest run are dropped.
#[test]
fn stale_dependencies_are_pruned() {
    let owner = Owner::new("prune", json(serde_json::json!({ "flag": true, "x": 1, "y": 1 })));
    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();

    let computation = Computation::new(
        &owner,
        WatchSource::getter(move |owner| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            let data = owner.data();
            let obj = data.as_object().ok_or("root data is not an object")?;
            if obj.get("flag").as_bool() == Some(true) {
                Ok(obj.get("x"))
            } else {
                Ok(obj.get("y"))
            }
        }),
        None,
        WatchOptions::default().sync(),
    )
    .unwrap();

    let data = root(&owner);
    let x = data.property_subject("x").unwrap();
    assert!(computation.depends_on(&x));

    data.set("flag", false).unwrap();
    assert!(!computation.depends_on(&x));
    assert!(!x.has_subscriber(&computation));
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    data.set("x", 5).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    data.set("y", 5).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// A torn-down Computation never runs again and holds no subscriptions.
#[test]
fn teardown_detaches_completely() {
    let owner = Owner::new("teardown", json(serde_json::json!({ "a": 1 })));
    let calls = Arc::new(AtomicI32::new(0));
    let counter = calls.clone();
    let watch = owner
        .watch(
            "a",
            callback(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            WatchOptions::default().sync(),
        )
        .unwrap();

    let subject = root(&owner).property_subject("a").unwrap();
    assert!(subject.has_subscriber(&watch));

    watch.teardown();
    assert!(!watch.is_active());
    assert!(!subject.has_subscriber(&watch));
    assert_eq!(owner.computation_count(), 0);

    root(&owner).set("a", 2).unwrap();
    watch.run().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn destroying_an_owner_tears_down_everything() {
    let owner = Owner::new("destroy", json(serde_json::json!({ "a": 1, "b": 1 })));
    let a = owner.watch("a", callback(|_, _, _| Ok(())), WatchOptions::default()).unwrap();
    let b = owner.watch("b", callback(|_, _, _| Ok(())), WatchOptions::default()).unwrap();
    assert_eq!(owner.computation_count(), 2);

    owner.destroy();
    owner.destroy();
    assert!(!a.is_active());
    assert!(!b.is_active());
    assert_eq!(owner.computation_count(), 0);

    let data = owner.data();
    assert_eq!(data.as_object().unwrap().observer().unwrap().root_count(), 0);
}

/// Root data refuses late keys; nested objects accept them reactively.
#[test]
fn set_and_delete_on_root_and_nested_data() {
    let owner = Owner::new("mutation", json(serde_json::json!({ "nested": { "a": 1 } })));
    let data = owner.data();

    set(&data, "late", 1).unwrap();
    assert!(!root(&owner).has_own("late"));

    let nested = root(&owner).get("nested");
    let calls = Arc::new(AtomicI32::new(0));
    let counter = calls.clone();
    owner
        .watch(
            "nested",
            callback(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            WatchOptions::default().sync(),
        )
        .unwrap();

    set(&nested, "b", 2).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(nested.as_object().unwrap().property_subject("b").is_some());

    delete(&nested, "a").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!nested.as_object().unwrap().has_own("a"));

    delete(&data, "nested").unwrap();
    assert!(root(&owner).has_own("nested"));
}

/// Deferred Computations run when the scheduler flushes, once per batch.
#[test]
fn batch_scheduler_defers_and_deduplicates() {
    let scheduler = Arc::new(BatchScheduler::new());
    Runtime::set_scheduler(scheduler.clone());

    let owner = Owner::new("batch", json(serde_json::json!({ "a": 1 })));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    owner
        .watch(
            "a",
            callback(move |_, new, old| {
                recorded.lock().push((new.as_number(), old.as_number()));
                Ok(())
            }),
            WatchOptions::default(),
        )
        .unwrap();

    root(&owner).set("a", 2).unwrap();
    root(&owner).set("a", 3).unwrap();
    assert!(seen.lock().is_empty());
    assert_eq!(scheduler.pending(), 1);

    assert_eq!(scheduler.flush().unwrap(), 1);
    assert_eq!(seen.lock().as_slice(), [(Some(3.0), Some(1.0))]);
}

struct CollectingReporter {
    phases: Mutex<Vec<String>>,
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, _error: &Error, _owner: &Owner, phase: &str) {
        self.phases.lock().push(phase.to_string());
    }
}

/// Errors from user watches are reported instead of returned.
#[test]
fn user_errors_go_to_the_reporter() {
    let reporter = Arc::new(CollectingReporter {
        phases: Mutex::new(Vec::new()),
    });
    Runtime::set_error_reporter(reporter.clone());

    let owner = Owner::new("errors", json(serde_json::json!({ "a": 1 })));
    owner
        .watch(
            "a",
            callback(|_, _, _| Err("callback failed".into())),
            WatchOptions::default().sync(),
        )
        .unwrap();

    root(&owner).set("a", 2).unwrap();
    assert_eq!(
        reporter.phases.lock().as_slice(),
        ["callback for watcher \"a\"".to_string()]
    );
}

/// The active-computation slot is restored after nested evaluations.
#[test]
fn context_is_restored_after_nested_runs() {
    let owner = Owner::new("context", json(serde_json::json!({ "a": 1 })));
    let inner_owner = owner.clone();
    let depth_inside = Arc::new(AtomicI32::new(0));
    let depth = depth_inside.clone();

    let _outer = Computation::new(
        &owner,
        WatchSource::getter(move |_| {
            let depth = depth.clone();
            let inner = Computation::new(
                &inner_owner,
                WatchSource::getter(move |_| {
                    depth.store(ReactiveContext::depth() as i32, Ordering::SeqCst);
                    Ok(Value::Undefined)
                }),
                None,
                WatchOptions::default().sync(),
            )?;
            inner.teardown();
            Ok(Value::Undefined)
        }),
        None,
        WatchOptions::default().sync(),
    )
    .unwrap();

    assert_eq!(depth_inside.load(Ordering::SeqCst), 2);
    assert!(!ReactiveContext::is_active());
    assert_eq!(ReactiveContext::depth(), 0);
}
