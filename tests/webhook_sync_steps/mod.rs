//! Step definitions for webhook sync scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
