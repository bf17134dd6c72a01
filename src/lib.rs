//! # epoch-allocator
//!
//! Epoch order allocation engine for tranched investment pools.
//!
//! During a settlement epoch, a pool's risk-ordered tranches accumulate
//! pending investment and redemption orders. This engine computes the maximal
//! weighted fulfillment of those orders that keeps the pool solvent: the
//! liquid reserve stays within its configured bounds and every senior tranche
//! keeps at least its minimum risk buffer (the fraction of pool value
//! subordinate to it). The allocation problem is solved as a linear program.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: fixed-point quantities, pool/tranche/order state
//! - **solver** — Constraint model builder, LP backend boundary, solution interpreter
//! - **simulation** — Random scenario generation for benchmarks and stress tests

pub mod core;
pub mod simulation;
pub mod solver;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::fixed::{
        CurrencyBalance, FixedPoint, NumericError, Perquintill, Rounding,
    };
    pub use crate::core::state::{
        OrderState, PoolState, StateError, TrancheState, WeightState,
    };
    pub use crate::solver::{
        solve, solve_with_backend, EpochSolution, LpBackend, SimplexBackend, SolveError,
    };
}
