//! Reducers
//!
//! Pure `(state, event) -> state` functions folding load events into the data
//! tree and the shadow (load metadata) tree. State is passed as `Arc<Value>`:
//! an event that changes nothing hands back the very same `Arc`, anything else
//! produces a new one.

pub mod data;
pub mod shadow;
pub mod stitch;

pub use data::reduce_data;
pub use shadow::{reduce_shadow, ShadowRecord};
pub use stitch::stitch_index;
