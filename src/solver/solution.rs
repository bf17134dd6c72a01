use crate::core::fixed::{
    pow10, CurrencyBalance, NumericError, Perquintill, Rounding, PERQUINTILL_DECIMALS,
};
use crate::core::state::{OrderState, PoolState};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fulfilled part of one pending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    /// Executed amount in pool currency.
    pub amount: CurrencyBalance,
    /// `amount / pending`, zero when nothing was pending.
    pub fraction: Perquintill,
}

impl Fulfillment {
    fn zero(currency_decimals: u32) -> Self {
        Self {
            amount: CurrencyBalance::zero(currency_decimals),
            fraction: Perquintill::zero(),
        }
    }

    fn from_solved(
        solved: BigInt,
        pending: &CurrencyBalance,
        currency_decimals: u32,
    ) -> Result<Self, NumericError> {
        // absorb sub-unit solver fuzz: clamp into [0, pending]
        let mut units = solved;
        if units.is_negative() {
            units = BigInt::zero();
        }
        if &units > pending.units() {
            units = pending.units().clone();
        }
        let amount = CurrencyBalance::from_units(units, currency_decimals);
        let fraction = if pending.is_zero() {
            Perquintill::zero()
        } else {
            amount.ratio_of(pending, Rounding::Nearest)?
        };
        Ok(Self { amount, fraction })
    }
}

/// Fulfillment of one tranche's invest and redeem orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheSolution {
    pub invest: Fulfillment,
    pub redeem: Fulfillment,
}

/// Outcome of one epoch allocation, junior-first per tranche.
///
/// An infeasible epoch is a valid terminal state, not an error: every amount
/// and fraction is zero and `is_feasible` is `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSolution {
    pub is_feasible: bool,
    pub tranches: Vec<TrancheSolution>,
}

impl EpochSolution {
    pub(crate) fn infeasible(tranche_count: usize, currency_decimals: u32) -> Self {
        Self {
            is_feasible: false,
            tranches: (0..tranche_count)
                .map(|_| TrancheSolution {
                    invest: Fulfillment::zero(currency_decimals),
                    redeem: Fulfillment::zero(currency_decimals),
                })
                .collect(),
        }
    }

    pub(crate) fn from_solved(
        units: Vec<BigInt>,
        orders: &[OrderState],
        currency_decimals: u32,
    ) -> Result<Self, NumericError> {
        let mut solved = units.into_iter();
        let tranches = orders
            .iter()
            .map(|order| {
                let invest = solved.next().unwrap_or_default();
                let redeem = solved.next().unwrap_or_default();
                Ok(TrancheSolution {
                    invest: Fulfillment::from_solved(invest, &order.invest, currency_decimals)?,
                    redeem: Fulfillment::from_solved(redeem, &order.redeem, currency_decimals)?,
                })
            })
            .collect::<Result<Vec<_>, NumericError>>()?;
        Ok(Self {
            is_feasible: true,
            tranches,
        })
    }

    /// Total executed investment across all tranches.
    pub fn total_invested(&self) -> CurrencyBalance {
        self.sum_units(|tranche| tranche.invest.amount.units().clone())
    }

    /// Total executed redemption across all tranches.
    pub fn total_redeemed(&self) -> CurrencyBalance {
        self.sum_units(|tranche| tranche.redeem.amount.units().clone())
    }

    /// Net change of the pool reserve if this solution executes.
    pub fn net_reserve_delta(&self) -> CurrencyBalance {
        self.sum_units(|tranche| tranche.invest.amount.units() - tranche.redeem.amount.units())
    }

    fn sum_units(&self, per_tranche: impl Fn(&TrancheSolution) -> BigInt) -> CurrencyBalance {
        let scale = self
            .tranches
            .first()
            .map(|tranche| tranche.invest.amount.scale())
            .unwrap_or(0);
        CurrencyBalance::from_units(self.tranches.iter().map(per_tranche).sum::<BigInt>(), scale)
    }

    /// Re-check this solution against the pool's invariants.
    ///
    /// `tolerance` absorbs the sub-unit rounding the solver boundary may
    /// introduce. An infeasible solution is valid exactly when it is the
    /// all-zero terminal state.
    pub fn is_valid(
        &self,
        pool: &PoolState,
        orders: &[OrderState],
        tolerance: &CurrencyBalance,
    ) -> bool {
        if self.tranches.len() != pool.tranche_count() || orders.len() != self.tranches.len() {
            return false;
        }
        if !self.is_feasible {
            return self
                .tranches
                .iter()
                .all(|tranche| tranche.invest.amount.is_zero() && tranche.redeem.amount.is_zero());
        }

        let one = pow10(PERQUINTILL_DECIMALS);
        for (tranche, order) in self.tranches.iter().zip(orders) {
            let invest = &tranche.invest;
            let redeem = &tranche.redeem;
            if invest.amount.is_negative() || redeem.amount.is_negative() {
                return false;
            }
            if invest.amount.units() > order.invest.units()
                || redeem.amount.units() > order.redeem.units()
            {
                return false;
            }
            if invest.fraction.units() > &one || redeem.fraction.units() > &one {
                return false;
            }
        }

        let tol = tolerance.units();
        let delta = self.net_reserve_delta().into_units();
        let post_reserve = pool.reserve.units() + &delta;
        if post_reserve < -tol.clone() || post_reserve > pool.max_reserve.units() + tol {
            return false;
        }

        // risk buffers: subordinate_post ≥ β·pool_value_post, within tolerance
        let pool_value_post = pool.net_asset_value.units() + &delta;
        let mut subordinate_post = BigInt::zero();
        for boundary in 1..pool.tranche_count() {
            let junior = &self.tranches[boundary - 1];
            subordinate_post += pool
                .net_asset_value
                .mul_fraction(&pool.tranches[boundary - 1].ratio, Rounding::Nearest)
                .into_units()
                + junior.invest.amount.units()
                - junior.redeem.amount.units();
            let Some(buffer) = pool.tranches[boundary].min_risk_buffer.as_ref() else {
                return false;
            };
            let lhs = (&subordinate_post + tol) * &one;
            let rhs = buffer.units() * &pool_value_post;
            if lhs < rhs {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for EpochSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Epoch Solution ===")?;
        writeln!(f, "Feasible: {}", self.is_feasible)?;
        for (index, tranche) in self.tranches.iter().enumerate() {
            writeln!(
                f,
                "Tranche {}: invest {} ({:.1}%), redeem {} ({:.1}%)",
                index,
                tranche.invest.amount,
                tranche.invest.fraction.to_f64() * 100.0,
                tranche.redeem.amount,
                tranche.redeem.fraction.to_f64() * 100.0,
            )?;
        }
        writeln!(f, "Net reserve delta: {}", self.net_reserve_delta())
    }
}
