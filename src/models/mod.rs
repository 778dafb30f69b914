//! Data models shared across the scan orchestration core.

pub mod asset;
pub mod scan;
pub mod target;
