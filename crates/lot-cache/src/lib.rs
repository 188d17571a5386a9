//! # Lot Cache
//!
//! 數量緩存同步與核對模組

pub mod dirty_tracking;
pub mod sync;

// Re-export 主要類型
pub use dirty_tracking::DirtyTracker;
pub use sync::{QuantityCacheSync, Reconciliation};
