//! Leaf utilities for the scheduler.
//!
//! - [`backoff`]: shared spin/yield/sleep busy-wait policy
//! - [`slot_map`]: generation-stamped slot map with dense storage
//! - [`snapshot`]: versioned snapshot lock for cross-thread state reads

pub mod backoff;
pub mod slot_map;
pub mod snapshot;

pub use backoff::{backoff, Backoff};
pub use slot_map::{GenerationalSlotMap, SlotKey};
pub use snapshot::{Snapshot, VersionedSnapshotLock};
