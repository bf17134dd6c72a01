use crate::core::fixed::{
    div_rounded, pow10, CurrencyBalance, Perquintill, Rounding, PERQUINTILL_DECIMALS,
};
use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input precondition failures.
///
/// All of these are raised synchronously, before any model is built or any
/// solving occurs — a failed precondition never produces a partial result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("index-aligned inputs disagree: {tranches} tranches, {orders} orders, {weights} weights")]
    ShapeMismatch {
        tranches: usize,
        orders: usize,
        weights: usize,
    },
    #[error("pool has no tranches")]
    NoTranches,
    #[error("missing junior tranche: tranche 0 must not carry a min risk buffer")]
    MissingJuniorTranche,
    #[error("tranche {index} is missing its min risk buffer")]
    MissingRiskBuffer { index: usize },
    #[error("tranche index {index} out of range for {len} tranches")]
    IndexOutOfRange { index: usize, len: usize },
}

/// One tranche of the pool's seniority chain.
///
/// Tranches are ordered junior-first: index 0 absorbs losses first and is
/// the only tranche without a minimum risk buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheState {
    /// Fraction of the pool value owned by this tranche.
    pub ratio: Perquintill,
    /// Minimum fraction of pool value that must stay subordinate to this
    /// tranche. `None` for the junior-most tranche only.
    pub min_risk_buffer: Option<Perquintill>,
}

/// Snapshot of the pool at the epoch boundary.
///
/// `net_asset_value` is the total pool valuation the tranche ratios are
/// measured against, inclusive of the liquid reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub net_asset_value: CurrencyBalance,
    /// Liquid currency held by the pool; bounded by `[0, max_reserve]`
    /// after epoch execution.
    pub reserve: CurrencyBalance,
    pub max_reserve: CurrencyBalance,
    pub currency_decimals: u32,
    /// Junior-first seniority chain.
    pub tranches: Vec<TrancheState>,
}

/// Pending orders of one tranche, in pool currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    pub invest: CurrencyBalance,
    pub redeem: CurrencyBalance,
}

impl OrderState {
    /// No pending orders.
    pub fn none(currency_decimals: u32) -> Self {
        Self {
            invest: CurrencyBalance::zero(currency_decimals),
            redeem: CurrencyBalance::zero(currency_decimals),
        }
    }
}

/// Priority coefficients of one tranche's orders in the allocation objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightState {
    pub invest: BigUint,
    pub redeem: BigUint,
}

impl WeightState {
    /// The canonical priority ladder for `tranche_count` tranches.
    ///
    /// Every redemption weight dominates every investment weight, and within
    /// each kind more-senior tranches dominate more-junior ones, so the
    /// objective fills senior redemptions first, then senior investments,
    /// cascading toward the junior tranche.
    pub fn priority_ladder(tranche_count: usize) -> Vec<WeightState> {
        let ten = BigUint::from(10u32);
        (0..tranche_count)
            .map(|index| WeightState {
                invest: ten.pow((index + 1) as u32),
                redeem: ten.pow((tranche_count + index + 1) as u32),
            })
            .collect()
    }
}

impl PoolState {
    pub fn tranche_count(&self) -> usize {
        self.tranches.len()
    }

    /// The tranche at `index`, junior-first.
    pub fn tranche(&self, index: usize) -> Result<&TrancheState, StateError> {
        self.tranches.get(index).ok_or(StateError::IndexOutOfRange {
            index,
            len: self.tranches.len(),
        })
    }

    /// Check the index-aligned input shape and the seniority-chain
    /// invariants. Called by the solver before any model is built.
    pub fn validate(
        &self,
        orders: &[OrderState],
        weights: &[WeightState],
    ) -> Result<(), StateError> {
        if self.tranches.is_empty() {
            return Err(StateError::NoTranches);
        }
        if orders.len() != self.tranches.len() || weights.len() != self.tranches.len() {
            return Err(StateError::ShapeMismatch {
                tranches: self.tranches.len(),
                orders: orders.len(),
                weights: weights.len(),
            });
        }
        self.check_seniority()
    }

    pub(crate) fn check_seniority(&self) -> Result<(), StateError> {
        if self.tranches.is_empty() {
            return Err(StateError::NoTranches);
        }
        if self.tranches[0].min_risk_buffer.is_some() {
            return Err(StateError::MissingJuniorTranche);
        }
        for (index, tranche) in self.tranches.iter().enumerate().skip(1) {
            if tranche.min_risk_buffer.is_none() {
                return Err(StateError::MissingRiskBuffer { index });
            }
        }
        Ok(())
    }

    /// Total value of the tranches strictly junior to `index`.
    pub fn subordinate_value(&self, index: usize) -> Result<CurrencyBalance, StateError> {
        if index >= self.tranches.len() {
            return Err(StateError::IndexOutOfRange {
                index,
                len: self.tranches.len(),
            });
        }
        Ok(CurrencyBalance::from_units(
            self.subordinate_units(index),
            self.currency_decimals,
        ))
    }

    pub(crate) fn subordinate_units(&self, index: usize) -> BigInt {
        self.tranches[..index]
            .iter()
            .map(|tranche| {
                self.net_asset_value
                    .mul_fraction(&tranche.ratio, Rounding::Nearest)
                    .into_units()
            })
            .sum()
    }

    /// How much can be invested into tranche `index` this epoch, holding all
    /// other orders at zero.
    ///
    /// Bounded by the reserve headroom and by the risk buffers of `index`
    /// and every tranche junior to it, which investment into `index`
    /// dilutes.
    pub fn invest_capacity(&self, index: usize) -> Result<CurrencyBalance, StateError> {
        self.check_seniority()?;
        if index >= self.tranches.len() {
            return Err(StateError::IndexOutOfRange {
                index,
                len: self.tranches.len(),
            });
        }
        let mut capacity = self.max_reserve.units() - self.reserve.units();
        if capacity.is_negative() {
            capacity = BigInt::zero();
        }
        let pool_value = self.net_asset_value.units();
        let one = pow10(PERQUINTILL_DECIMALS);
        for boundary in 1..=index {
            let Some(buffer) = self.tranches[boundary].min_risk_buffer.as_ref() else {
                return Err(StateError::MissingRiskBuffer { index: boundary });
            };
            if buffer.is_zero() {
                continue;
            }
            let subordinate = self.subordinate_units(boundary);
            // invest ≤ subordinate / buffer − pool_value
            let mut allowed =
                div_rounded(&(subordinate * &one), buffer.units(), Rounding::Down) - pool_value;
            if allowed.is_negative() {
                allowed = BigInt::zero();
            }
            if allowed < capacity {
                capacity = allowed;
            }
        }
        Ok(CurrencyBalance::from_units(capacity, self.currency_decimals))
    }

    /// How much can be redeemed from tranche `index` this epoch, holding all
    /// other orders at zero.
    ///
    /// Bounded by the liquid reserve and by the risk buffers of every
    /// tranche senior to `index`, whose subordination a junior redemption
    /// erodes.
    pub fn redeem_capacity(&self, index: usize) -> Result<CurrencyBalance, StateError> {
        self.check_seniority()?;
        if index >= self.tranches.len() {
            return Err(StateError::IndexOutOfRange {
                index,
                len: self.tranches.len(),
            });
        }
        let mut capacity = self.reserve.units().clone();
        if capacity.is_negative() {
            capacity = BigInt::zero();
        }
        let pool_value = self.net_asset_value.units();
        let one = pow10(PERQUINTILL_DECIMALS);
        for boundary in index + 1..self.tranches.len() {
            let Some(buffer) = self.tranches[boundary].min_risk_buffer.as_ref() else {
                return Err(StateError::MissingRiskBuffer { index: boundary });
            };
            let subordinate = self.subordinate_units(boundary);
            let buffer_value = div_rounded(
                &(pool_value * buffer.units()),
                &one,
                Rounding::Nearest,
            );
            let slack = subordinate - buffer_value;
            let denom = &one - buffer.units();
            if denom.is_zero() {
                // a 100% buffer only tolerates redemption while subordination
                // covers the whole pool
                if slack.is_negative() {
                    capacity = BigInt::zero();
                }
                continue;
            }
            // redeem ≤ (subordinate − buffer·pool_value) / (1 − buffer)
            let mut allowed = div_rounded(&(slack * &one), &denom, Rounding::Down);
            if allowed.is_negative() {
                allowed = BigInt::zero();
            }
            if allowed < capacity {
                capacity = allowed;
            }
        }
        Ok(CurrencyBalance::from_units(capacity, self.currency_decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn two_tranche_pool() -> PoolState {
        // 70% junior, 30% senior with a 10% min risk buffer;
        // pool value 1000.000000, reserve 0, max reserve 1000.000000
        PoolState {
            net_asset_value: CurrencyBalance::from_units(1_000_000_000u64, 6),
            reserve: CurrencyBalance::zero(6),
            max_reserve: CurrencyBalance::from_units(1_000_000_000u64, 6),
            currency_decimals: 6,
            tranches: vec![
                TrancheState {
                    ratio: Perquintill::from_percent(70).unwrap(),
                    min_risk_buffer: None,
                },
                TrancheState {
                    ratio: Perquintill::from_percent(30).unwrap(),
                    min_risk_buffer: Some(Perquintill::from_percent(10).unwrap()),
                },
            ],
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_inputs() {
        let pool = two_tranche_pool();
        let orders = vec![OrderState::none(6), OrderState::none(6)];
        let weights = WeightState::priority_ladder(2);
        assert!(pool.validate(&orders, &weights).is_ok());
    }

    #[test]
    fn test_validate_rejects_shape_mismatch() {
        let pool = two_tranche_pool();
        let orders = vec![OrderState::none(6)];
        let weights = WeightState::priority_ladder(2);
        assert_eq!(
            pool.validate(&orders, &weights).unwrap_err(),
            StateError::ShapeMismatch {
                tranches: 2,
                orders: 1,
                weights: 2
            }
        );
    }

    #[test]
    fn test_validate_rejects_buffered_junior() {
        let mut pool = two_tranche_pool();
        pool.tranches[0].min_risk_buffer = Some(Perquintill::from_percent(5).unwrap());
        let orders = vec![OrderState::none(6), OrderState::none(6)];
        let weights = WeightState::priority_ladder(2);
        assert_eq!(
            pool.validate(&orders, &weights).unwrap_err(),
            StateError::MissingJuniorTranche
        );
    }

    #[test]
    fn test_validate_rejects_unbuffered_senior() {
        let mut pool = two_tranche_pool();
        pool.tranches[1].min_risk_buffer = None;
        let orders = vec![OrderState::none(6), OrderState::none(6)];
        let weights = WeightState::priority_ladder(2);
        assert_eq!(
            pool.validate(&orders, &weights).unwrap_err(),
            StateError::MissingRiskBuffer { index: 1 }
        );
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let mut pool = two_tranche_pool();
        pool.tranches.clear();
        assert_eq!(pool.validate(&[], &[]).unwrap_err(), StateError::NoTranches);
    }

    #[test]
    fn test_subordinate_value() {
        let pool = two_tranche_pool();
        assert!(pool.subordinate_value(0).unwrap().is_zero());
        assert_eq!(
            pool.subordinate_value(1).unwrap().units(),
            &BigInt::from(700_000_000u64)
        );
        assert_eq!(
            pool.subordinate_value(2).unwrap_err(),
            StateError::IndexOutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn test_invest_capacity_reserve_bound() {
        // buffer allows 6000 of senior investment, reserve headroom only 1000
        let pool = two_tranche_pool();
        assert_eq!(
            pool.invest_capacity(1).unwrap().units(),
            &BigInt::from(1_000_000_000u64)
        );
        assert_eq!(
            pool.invest_capacity(0).unwrap().units(),
            &BigInt::from(1_000_000_000u64)
        );
    }

    #[test]
    fn test_invest_capacity_buffer_bound() {
        let mut pool = two_tranche_pool();
        pool.max_reserve = CurrencyBalance::from_units(10_000_000_000u64, 6);
        // subordinate / buffer − pool value = 7000 − 1000 = 6000
        assert_eq!(
            pool.invest_capacity(1).unwrap().units(),
            &BigInt::from(6_000_000_000u64)
        );
        // junior investment never dilutes anything: full headroom
        assert_eq!(
            pool.invest_capacity(0).unwrap().units(),
            &BigInt::from(9_000_000_000u64)
        );
    }

    #[test]
    fn test_redeem_capacity() {
        let mut pool = two_tranche_pool();
        pool.reserve = CurrencyBalance::from_units(100_000_000u64, 6);
        // junior redemption is reserve-bound: buffer slack allows 666.67
        assert_eq!(
            pool.redeem_capacity(0).unwrap().units(),
            &BigInt::from(100_000_000u64)
        );
        // senior redemption only improves its own buffer
        assert_eq!(
            pool.redeem_capacity(1).unwrap().units(),
            &BigInt::from(100_000_000u64)
        );
    }

    #[test]
    fn test_redeem_capacity_buffer_bound() {
        let mut pool = two_tranche_pool();
        pool.reserve = CurrencyBalance::from_units(700_000_000u64, 6);
        pool.max_reserve = CurrencyBalance::from_units(1_000_000_000u64, 6);
        // (700 − 100) / 0.9 = 666.666666...
        assert_eq!(
            pool.redeem_capacity(0).unwrap().units(),
            &BigInt::from(666_666_666u64)
        );
    }

    #[test]
    fn test_capacity_out_of_range() {
        let pool = two_tranche_pool();
        assert_eq!(
            pool.invest_capacity(2).unwrap_err(),
            StateError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert_eq!(
            pool.redeem_capacity(5).unwrap_err(),
            StateError::IndexOutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn test_priority_ladder_ordering() {
        let weights = WeightState::priority_ladder(3);
        assert_eq!(weights.len(), 3);
        // seniority dominates within each kind
        assert!(weights[2].invest > weights[1].invest);
        assert!(weights[1].invest > weights[0].invest);
        assert!(weights[2].redeem > weights[1].redeem);
        // every redemption dominates every investment
        assert!(weights[0].redeem > weights[2].invest);
    }
}
