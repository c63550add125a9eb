//! Transparency module for the activity collector.
//!
//! Tracks and exposes how much the collector recorded, so the person being
//! observed can always check what was collected.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, read_persisted, CollectionCounts,
    SharedTransparencyLog, TransparencyLog, TransparencyStats,
};
