//! Foundational types: exact fixed-point arithmetic and pool state.

pub mod fixed;
pub mod state;
