//! Dotted path resolution into JSON values

use serde_json::Value;

/// Resolve a dotted path such as `quote.USD.price` against `root`.
///
/// Object members are looked up by key; numeric segments index arrays.
/// Returns `None` when any segment is missing. A present JSON `null` is
/// returned as-is; callers decide whether it counts as absent.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }

    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolve a path, treating JSON `null` as absent
pub fn resolve_present<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    resolve(root, path).filter(|v| !v.is_null())
}
