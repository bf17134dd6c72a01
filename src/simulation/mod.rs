//! Random scenario generation for benchmarks and stress testing.

pub mod scenario;

pub use scenario::{random_scenario, ScenarioConfig};
