//! Browser-side services wired into the core.

pub mod geometry;
pub mod http;
pub mod runtime;
pub mod scheduler;
pub mod socket;
pub mod storage;
