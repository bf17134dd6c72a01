//! Generates random, invariant-respecting pool scenarios.
//!
//! Used by the criterion benchmarks and available for exploratory testing;
//! generated scenarios always pass input validation, though the generated
//! orders may well be infeasible to fill.

use crate::core::fixed::{CurrencyBalance, Perquintill};
use crate::core::state::{OrderState, PoolState, TrancheState, WeightState};
use num_bigint::BigInt;
use rand::Rng;

const PERQUINTILL_ONE: u128 = 1_000_000_000_000_000_000;

/// Configuration for generating a random epoch scenario.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Number of tranches, junior-first.
    pub tranche_count: usize,
    pub currency_decimals: u32,
    /// Pool valuation in whole currency units.
    pub pool_value: u64,
    /// Upper bound of each pending order, in whole currency units.
    pub max_order: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            tranche_count: 3,
            currency_decimals: 6,
            pool_value: 10_000_000,
            max_order: 1_000_000,
        }
    }
}

/// Generate a random scenario: pool state, pending orders, and the canonical
/// priority weights, index-aligned.
pub fn random_scenario(config: &ScenarioConfig) -> (PoolState, Vec<OrderState>, Vec<WeightState>) {
    let mut rng = rand::thread_rng();
    let n = config.tranche_count.max(1);
    let unit = 10u128.pow(config.currency_decimals);

    // random ownership ratios summing to exactly one
    let draws: Vec<u128> = (0..n).map(|_| rng.gen_range(1..=1_000u128)).collect();
    let total: u128 = draws.iter().sum();
    let mut ratio_units: Vec<u128> = draws
        .iter()
        .map(|draw| draw * PERQUINTILL_ONE / total)
        .collect();
    ratio_units[0] = PERQUINTILL_ONE - ratio_units[1..].iter().sum::<u128>();

    let mut tranches = Vec::with_capacity(n);
    let mut subordinate = 0u128;
    for (index, units) in ratio_units.iter().enumerate() {
        let min_risk_buffer = if index == 0 {
            None
        } else {
            // half the current subordination, so the starting state complies
            Some(fraction(subordinate / 2))
        };
        tranches.push(TrancheState {
            ratio: fraction(*units),
            min_risk_buffer,
        });
        subordinate += units;
    }

    let reserve = rng.gen_range(0..=config.pool_value / 5) as u128 * unit;
    let max_reserve = reserve + rng.gen_range(1..=(config.pool_value / 2).max(1)) as u128 * unit;
    let pool = PoolState {
        net_asset_value: balance(config.pool_value as u128 * unit, config.currency_decimals),
        reserve: balance(reserve, config.currency_decimals),
        max_reserve: balance(max_reserve, config.currency_decimals),
        currency_decimals: config.currency_decimals,
        tranches,
    };

    let orders = (0..n)
        .map(|_| OrderState {
            invest: balance(
                rng.gen_range(0..=config.max_order) as u128 * unit,
                config.currency_decimals,
            ),
            redeem: balance(
                rng.gen_range(0..=config.max_order) as u128 * unit,
                config.currency_decimals,
            ),
        })
        .collect();

    let weights = WeightState::priority_ladder(n);
    (pool, orders, weights)
}

fn balance(units: u128, currency_decimals: u32) -> CurrencyBalance {
    CurrencyBalance::from_units(BigInt::from(units), currency_decimals)
}

fn fraction(units: u128) -> Perquintill {
    Perquintill::from_units(BigInt::from(units)).unwrap_or_else(|_| Perquintill::one())
}
