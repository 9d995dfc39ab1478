//! Common types shared by every pool-exit crate

pub mod errors;
pub mod fixed_point;
