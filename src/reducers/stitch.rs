//! Index stitching
//!
//! Merges a freshly fetched fragment of an ordered index into the index already
//! in the tree, using the fragment's first and last keys as anchors.

use std::collections::HashSet;

/// Merge `append` into `current`.
///
/// - When the fragment's head is already indexed, everything before it is kept.
/// - When its tail is indexed, everything after it is kept.
/// - When the fragment overlaps nowhere (and does not already cover the whole
///   index) it is appended.
///
/// The fragment's keys always win over stale positions of the same key, so the
/// result never holds a key twice.
pub fn stitch_index(current: &[String], append: &[String]) -> Vec<String> {
    let (Some(head), Some(tail)) = (append.first(), append.last()) else {
        return current.to_vec();
    };
    let first = current.iter().position(|key| key == head);
    let last = current.iter().position(|key| key == tail);

    let prefix: &[String] = match first {
        Some(pos) => &current[..pos],
        None if last.is_some()
            || current.is_empty()
            || current.iter().all(|key| append.contains(key)) =>
        {
            &[]
        }
        None => current,
    };
    let suffix: &[String] = match last {
        Some(pos) => &current[pos + 1..],
        None => &[],
    };

    let mut seen: HashSet<&str> = HashSet::with_capacity(current.len() + append.len());
    let fragment: Vec<&String> = append
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .collect();

    let mut stitched = Vec::with_capacity(prefix.len() + fragment.len() + suffix.len());
    stitched.extend(prefix.iter().filter(|key| !seen.contains(key.as_str())).cloned());
    stitched.extend(fragment.into_iter().cloned());
    for key in suffix {
        if seen.insert(key.as_str()) && !prefix.contains(key) {
            stitched.push(key.clone());
        }
    }
    stitched
}

/// Drop `remove` from `current`, keeping survivors in order
pub fn remove_from_index(current: &[String], remove: &[String]) -> Vec<String> {
    current
        .iter()
        .filter(|key| !remove.contains(key))
        .cloned()
        .collect()
}
