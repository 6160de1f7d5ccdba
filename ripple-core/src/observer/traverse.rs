use std::collections::HashSet;

use crate::reactive::SubjectId;
use crate::value::Value;

/// Read every nested property of `value` so the active Computation depends
/// on all of them.
///
/// Each observed value is visited once, so shared and cyclic structures
/// terminate. Frozen and other non-extensible values are not descended into.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    visit(value, &mut seen);
}

fn visit(value: &Value, seen: &mut HashSet<SubjectId>) {
    if !value.is_extensible_object() {
        return;
    }
    if let Some(observer) = super::observer_of(value) {
        if !seen.insert(observer.subject().id()) {
            return;
        }
    }
    match value {
        Value::Array(arr) => {
            for item in arr.to_vec() {
                visit(&item, seen);
            }
        }
        Value::Object(obj) => {
            for key in obj.keys() {
                visit(&obj.get(&key), seen);
            }
        }
        _ => {}
    }
}
