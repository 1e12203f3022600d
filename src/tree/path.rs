//! Slash-delimited path helpers

/// Split a tree path into its segments.
///
/// Leading and trailing slashes are ignored, so `"/users/u1/"` and
/// `"users/u1"` address the same node. An empty path has no segments.
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}
