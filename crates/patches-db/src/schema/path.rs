//! Dotted field-path helpers.

/// The top-level field a dotted path starts at: `gt.detections.label` → `gt`.
pub fn root_field(path: &str) -> &str {
    path.split_once('.').map_or(path, |(root, _)| root)
}

/// Split a dotted path into its root field and the remainder, if any.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((root, rest)) => (root, Some(rest)),
        None => (path, None),
    }
}
