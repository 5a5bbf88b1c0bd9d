//! Dotted paths into a document.
//!
//! Paths name a node by the keys leading to it from the root, joined with
//! dots: `"todo.3.title"`. Array elements are addressed by their index.

/// Normalizes a path string by cleaning up dots and empty components.
///
/// - Empty string "" → empty string (the root)
/// - Leading dots ".user" → "user"
/// - Trailing dots "user." → "user"
/// - Consecutive dots "user..profile" → "user.profile"
/// - Pure dots "..." → empty string
///
/// # Examples
///
/// ```rust
/// # use driftdoc::document::path::normalize_path;
/// assert_eq!(normalize_path(""), "");
/// assert_eq!(normalize_path(".user"), "user");
/// assert_eq!(normalize_path("user..profile."), "user.profile");
/// assert_eq!(normalize_path("..."), "");
/// ```
pub fn normalize_path(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    components(input).collect::<Vec<_>>().join(".")
}

/// Splits a path into its non-empty components.
pub fn segments(input: &str) -> Vec<String> {
    components(input).map(str::to_string).collect()
}

fn components(input: &str) -> impl Iterator<Item = &str> {
    input.split('.').filter(|component| !component.is_empty())
}
