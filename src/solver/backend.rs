use crate::solver::model::{AllocationModel, Relation};
use good_lp::{
    default_solver, variable, variables, Expression, ResolutionError, Solution, SolverModel,
    Variable,
};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};
use thiserror::Error;

/// Failure of the underlying solver machinery.
///
/// Infeasibility is NOT an error — it is reported through
/// [`LpOutcome::Infeasible`] so callers can distinguish "nothing to execute"
/// from "solver malfunction".
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("solver reported an unbounded optimum for a bounded model")]
    Unbounded,
    #[error("solver failure: {0}")]
    Failure(String),
}

/// Result of one solve: the optimal vector in non-negative base-currency
/// units (interleaved invest/redeem, junior-first), or infeasibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LpOutcome {
    Optimal(Vec<BigInt>),
    Infeasible,
}

/// Boundary to an LP engine.
///
/// Implementations perform no domain logic: they take the structured model
/// and return an optimal vector or the infeasibility marker. The model
/// builder and the solution interpreter are tested against scripted fakes of
/// this trait.
pub trait LpBackend {
    fn solve(&self, model: &AllocationModel) -> Result<LpOutcome, BackendError>;
}

/// The production backend, on the pure-Rust `microlp` simplex via `good_lp`.
///
/// The solve is deterministic: identical models produce bit-identical
/// outputs across invocations. A degenerate model with several optimal
/// vertices may be resolved differently by a different [`LpBackend`]
/// implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplexBackend;

impl LpBackend for SimplexBackend {
    fn solve(&self, model: &AllocationModel) -> Result<LpOutcome, BackendError> {
        let mut vars = variables!();
        let xs: Vec<Variable> = model
            .variables
            .iter()
            .map(|bound| vars.add(variable().min(0.0).max(bound.upper)))
            .collect();

        let mut objective = Expression::with_capacity(xs.len());
        for (weight, var) in model.objective.iter().zip(&xs) {
            objective.add_mul(*weight, *var);
        }

        let mut problem = vars.maximise(objective).using(default_solver);
        for row in &model.constraints {
            let mut expr = Expression::with_capacity(row.coefficients.len());
            for (coef, var) in row.coefficients.iter().zip(&xs) {
                if *coef != 0.0 {
                    expr.add_mul(*coef, *var);
                }
            }
            problem = problem.with(match row.relation {
                Relation::Leq => expr.leq(row.bound),
                Relation::Geq => expr.geq(row.bound),
            });
        }

        match problem.solve() {
            Ok(solution) => {
                let units = xs
                    .iter()
                    .map(|var| to_units(solution.value(*var), model.divisor()))
                    .collect();
                Ok(LpOutcome::Optimal(units))
            }
            Err(ResolutionError::Infeasible) => Ok(LpOutcome::Infeasible),
            Err(ResolutionError::Unbounded) => Err(BackendError::Unbounded),
            Err(other) => Err(BackendError::Failure(other.to_string())),
        }
    }
}

/// Map a solved coordinate back to base-currency units.
///
/// The integer part is restored exactly through the conditioning divisor;
/// only the fractional remainder rounds (nearest, ties away from zero), so
/// the result is unit-accurate regardless of the divisor's magnitude.
fn to_units(raw: f64, divisor: &BigInt) -> BigInt {
    if !raw.is_finite() || raw <= 0.0 {
        return BigInt::zero();
    }
    let whole = BigInt::from_f64(raw.trunc()).unwrap_or_default() * divisor;
    let remainder = (raw.fract() * divisor.to_f64().unwrap_or(1.0)).round();
    let units = whole + BigInt::from_f64(remainder).unwrap_or_default();
    if units.is_negative() {
        BigInt::zero()
    } else {
        units
    }
}
