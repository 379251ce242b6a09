//! Namespace argument normalization

/// `""`, `"all"` and `"*"` all mean every namespace
pub fn normalize(namespace: Option<&str>) -> Option<&str> {
    match namespace.map(str::trim) {
        None | Some("") | Some("all") | Some("*") => None,
        Some(ns) => Some(ns),
    }
}

/// Display form of a normalized namespace scope
pub fn display(namespace: Option<&str>) -> &str {
    normalize(namespace).unwrap_or("all")
}
