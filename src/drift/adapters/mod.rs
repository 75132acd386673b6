//! Branch-head source implementations.

pub mod github;
pub mod memory;
