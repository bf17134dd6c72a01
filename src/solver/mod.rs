//! The epoch allocation pipeline: constraint model → LP backend → solution.

pub mod backend;
pub mod model;
pub mod solution;

use crate::core::fixed::NumericError;
use crate::core::state::{OrderState, PoolState, StateError, WeightState};
use thiserror::Error;

pub use backend::{BackendError, LpBackend, LpOutcome, SimplexBackend};
pub use model::{build_model, AllocationModel, ConstraintRow, Relation, VariableBound};
pub use solution::{EpochSolution, Fulfillment, TrancheSolution};

/// Failure of an epoch allocation.
///
/// Infeasibility never surfaces here; it is carried in the solution itself.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Numeric(#[from] NumericError),
}

/// Allocate the epoch's pending orders with the default backend.
///
/// The computation is pure and synchronous: it owns its model and solver
/// invocation, shares nothing, and may run concurrently with other calls
/// (e.g. a dry run racing the submitted epoch). The solve step is CPU-bound;
/// interactive callers should run it off their latency-sensitive threads.
///
/// # Examples
///
/// ```
/// use epoch_allocator::prelude::*;
///
/// let pool = PoolState {
///     net_asset_value: CurrencyBalance::from_units(1_000_000_000u64, 6),
///     reserve: CurrencyBalance::zero(6),
///     max_reserve: CurrencyBalance::from_units(1_000_000_000u64, 6),
///     currency_decimals: 6,
///     tranches: vec![
///         TrancheState {
///             ratio: Perquintill::from_percent(70)?,
///             min_risk_buffer: None,
///         },
///         TrancheState {
///             ratio: Perquintill::from_percent(30)?,
///             min_risk_buffer: Some(Perquintill::from_percent(10)?),
///         },
///     ],
/// };
/// let orders = vec![
///     OrderState::none(6),
///     OrderState {
///         invest: CurrencyBalance::from_units(500_000_000u64, 6),
///         redeem: CurrencyBalance::zero(6),
///     },
/// ];
/// let weights = WeightState::priority_ladder(2);
///
/// let solution = solve(&pool, &orders, &weights)?;
/// assert!(solution.is_feasible);
/// assert!(solution.tranches[1].invest.fraction.is_one());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn solve(
    pool: &PoolState,
    orders: &[OrderState],
    weights: &[WeightState],
) -> Result<EpochSolution, SolveError> {
    solve_with_backend(pool, orders, weights, &SimplexBackend)
}

/// Allocate the epoch's pending orders with a caller-supplied backend.
pub fn solve_with_backend(
    pool: &PoolState,
    orders: &[OrderState],
    weights: &[WeightState],
    backend: &dyn LpBackend,
) -> Result<EpochSolution, SolveError> {
    let model = model::build_model(pool, orders, weights)?;
    match backend.solve(&model)? {
        LpOutcome::Infeasible => {
            log::debug!("allocation model infeasible; returning the zero-fulfillment solution");
            Ok(EpochSolution::infeasible(
                pool.tranche_count(),
                pool.currency_decimals,
            ))
        }
        LpOutcome::Optimal(units) => Ok(EpochSolution::from_solved(
            units,
            orders,
            pool.currency_decimals,
        )?),
    }
}
