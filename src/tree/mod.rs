//! Path-addressed JSON Tree
//!
//! The data and shadow trees are plain `serde_json::Value` objects addressed by
//! slash-delimited paths. Everything in here works on an owned working copy;
//! callers decide when a new snapshot is published.

pub mod ops;
pub mod path;

pub use ops::{contains_path, get_in, merge_deep, remove_in, set_in};
pub use path::split_path;
