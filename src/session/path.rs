//! Canonical path form used for session equality and cache keys.

/// Normalize a path string for comparison and cache-key use.
///
/// On Windows, path comparison is case-insensitive and accepts either
/// separator style, so backslashes become forward slashes and ASCII
/// letters fold to lowercase. Elsewhere the path passes through
/// unchanged. Never fails; an empty input yields an empty string.
pub fn normalize_path(path: &str) -> String {
    if cfg!(windows) {
        fold_windows(path)
    } else {
        path.to_owned()
    }
}

/// Windows folding rule, separated so it is testable on every platform.
fn fold_windows(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '\\' => '/',
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => c,
        })
        .collect()
}
