use crate::core::fixed::{div_rounded, pow10, Rounding, PERQUINTILL_DECIMALS};
use crate::core::state::{OrderState, PoolState, StateError, WeightState};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Relational operator of a constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Leq,
    Geq,
}

/// One linear constraint: `coefficients · x <relation> bound`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintRow {
    pub name: String,
    pub coefficients: Vec<f64>,
    pub relation: Relation,
    pub bound: f64,
}

/// A decision variable, non-negative with an upper bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableBound {
    pub name: String,
    pub upper: f64,
}

/// The structured allocation model handed to an [`LpBackend`].
///
/// Variables are interleaved per tranche: `invest_i` at `2i`, `redeem_i` at
/// `2i + 1`, junior-first. All currency magnitudes are expressed in base
/// units divided by the conditioning `divisor`, which the backend multiplies
/// back into the solved vector.
///
/// [`LpBackend`]: crate::solver::backend::LpBackend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationModel {
    pub variables: Vec<VariableBound>,
    /// Maximization objective, one coefficient per variable.
    pub objective: Vec<f64>,
    pub constraints: Vec<ConstraintRow>,
    pub tranche_count: usize,
    divisor: BigInt,
}

impl AllocationModel {
    /// The magnitude-conditioning divisor applied to all currency bounds.
    pub fn divisor(&self) -> &BigInt {
        &self.divisor
    }

    pub fn invest_index(tranche: usize) -> usize {
        2 * tranche
    }

    pub fn redeem_index(tranche: usize) -> usize {
        2 * tranche + 1
    }
}

/// Translate pool state, pending orders, and priority weights into an
/// [`AllocationModel`].
///
/// Fails fast on precondition violations; no partial model is ever produced.
pub fn build_model(
    pool: &PoolState,
    orders: &[OrderState],
    weights: &[WeightState],
) -> Result<AllocationModel, StateError> {
    pool.validate(orders, weights)?;
    let n = pool.tranche_count();
    let divisor = conditioning_divisor(pool, orders);

    let mut variables = Vec::with_capacity(2 * n);
    let mut objective = Vec::with_capacity(2 * n);
    for (index, (order, weight)) in orders.iter().zip(weights).enumerate() {
        variables.push(VariableBound {
            name: format!("invest_{index}"),
            upper: scaled(order.invest.units(), &divisor),
        });
        variables.push(VariableBound {
            name: format!("redeem_{index}"),
            upper: scaled(order.redeem.units(), &divisor),
        });
        objective.push(weight.invest.to_f64().unwrap_or(f64::MAX));
        objective.push(weight.redeem.to_f64().unwrap_or(f64::MAX));
    }

    let mut constraints = Vec::with_capacity(n + 1);

    // Net flow coefficients: +1 on every invest, −1 on every redeem.
    let mut net_flow = vec![0.0; 2 * n];
    for index in 0..n {
        net_flow[AllocationModel::invest_index(index)] = 1.0;
        net_flow[AllocationModel::redeem_index(index)] = -1.0;
    }

    // Fulfilling net redemptions cannot drive the reserve negative.
    constraints.push(ConstraintRow {
        name: "reserve_floor".to_string(),
        coefficients: net_flow.clone(),
        relation: Relation::Geq,
        bound: -scaled(pool.reserve.units(), &divisor),
    });

    // Net investment cannot push the reserve above its configured maximum.
    let headroom = pool.max_reserve.units() - pool.reserve.units();
    constraints.push(ConstraintRow {
        name: "reserve_ceiling".to_string(),
        coefficients: net_flow,
        relation: Relation::Leq,
        bound: scaled(&headroom, &divisor),
    });

    // One row per tranche boundary: the value subordinate to tranche i must
    // stay at least min_risk_buffer_i of the post-epoch pool value.
    //
    //   Σ_{j<i} (1−β)(I_j − R_j) − Σ_{j≥i} β(I_j − R_j) ≥ β·PV − SV_i
    let pool_value = pool.net_asset_value.units();
    let one = pow10(PERQUINTILL_DECIMALS);
    let mut subordinate = BigInt::zero();
    for boundary in 1..n {
        subordinate += pool
            .net_asset_value
            .mul_fraction(&pool.tranches[boundary - 1].ratio, Rounding::Nearest)
            .into_units();
        let Some(buffer) = pool.tranches[boundary].min_risk_buffer.as_ref() else {
            return Err(StateError::MissingRiskBuffer { index: boundary });
        };
        let beta = buffer.to_f64();
        let mut row = vec![0.0; 2 * n];
        for index in 0..n {
            let (invest_coef, redeem_coef) = if index < boundary {
                (1.0 - beta, -(1.0 - beta))
            } else {
                (-beta, beta)
            };
            row[AllocationModel::invest_index(index)] = invest_coef;
            row[AllocationModel::redeem_index(index)] = redeem_coef;
        }
        let buffer_value = div_rounded(&(pool_value * buffer.units()), &one, Rounding::Nearest);
        let bound = buffer_value - &subordinate;
        constraints.push(ConstraintRow {
            name: format!("risk_buffer_{boundary}"),
            coefficients: row,
            relation: Relation::Geq,
            bound: scaled(&bound, &divisor),
        });
    }

    log::debug!(
        "built allocation model: {} tranches, {} variables, {} constraints, conditioning divisor {}",
        n,
        variables.len(),
        constraints.len(),
        divisor
    );

    Ok(AllocationModel {
        variables,
        objective,
        constraints,
        tranche_count: n,
        divisor,
    })
}

/// Greatest common divisor of the order amounts and reserve figures.
///
/// Dividing every currency magnitude by it keeps the numbers handed to the
/// f64 solver small without changing the optimum.
fn conditioning_divisor(pool: &PoolState, orders: &[OrderState]) -> BigInt {
    let mut divisor = BigInt::zero();
    let values = orders
        .iter()
        .flat_map(|order| [order.invest.units(), order.redeem.units()])
        .chain([pool.reserve.units(), pool.max_reserve.units()]);
    for value in values {
        if !value.is_zero() {
            divisor = divisor.gcd(value);
        }
    }
    if divisor.is_zero() {
        BigInt::one()
    } else {
        divisor
    }
}

/// `value / divisor` as an `f64`, exact whenever the divisor divides evenly.
fn scaled(value: &BigInt, divisor: &BigInt) -> f64 {
    let (quot, rem) = value.div_rem(divisor);
    quot.to_f64().unwrap_or(f64::MAX)
        + rem.to_f64().unwrap_or(0.0) / divisor.to_f64().unwrap_or(1.0)
}
