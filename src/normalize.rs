//! Structure normalization: collapsing an input tree to its shape map.
//!
//! Sibling objects inside a sequence may be heterogeneous; compilation needs
//! one structural template per collection. [`normalize`] rewrites every
//! sequence into the merged template of its elements (the head element
//! establishes which keys survive) and preserves empty collections as empty
//! objects. Scalar values pass through untouched; only their keys matter to
//! the compilers.

use crate::value::{Object, Value};

/// Reduce an object tree to its canonical shape map.
pub fn normalize(obj: &Object) -> Object {
    obj.iter()
        .map(|(k, v)| (k.clone(), normalize_value(v)))
        .collect()
}

fn normalize_value(v: &Value) -> Value {
    match v {
        Value::Sequence(items) if items.is_empty() => Value::Object(Object::new()),
        Value::Sequence(items) => Value::Object(merge(items.iter().filter_map(Value::as_object))),
        Value::Object(o) => Value::Object(normalize(o)),
        other => other.clone(),
    }
}

/// Fold a list of objects left-to-right into one template. Each element is
/// normalized before it is folded in. Only keys present in the head object
/// survive; at each shared key two non-empty objects merge recursively and
/// otherwise the first non-empty object (or the head value) wins.
pub fn merge<'a>(objects: impl IntoIterator<Item = &'a Object>) -> Object {
    let mut iter = objects.into_iter();
    let Some(head) = iter.next() else {
        return Object::new();
    };
    iter.fold(normalize(head), |acc, next| merge_pair(acc, &normalize(next)))
}

fn merge_pair(head: Object, next: &Object) -> Object {
    head.into_iter()
        .map(|(k, v1)| {
            let combined = match (v1, next.get(&k)) {
                (Value::Object(m1), Some(Value::Object(m2))) if !m1.is_empty() && !m2.is_empty() => {
                    Value::Object(merge_pair(m1, m2))
                }
                (Value::Object(m1), _) if !m1.is_empty() => Value::Object(m1),
                (_, Some(Value::Object(m2))) if !m2.is_empty() => Value::Object(m2.clone()),
                (v1, _) => v1,
            };
            (k, combined)
        })
        .collect()
}
