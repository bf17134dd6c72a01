use approx::assert_relative_eq;
use epoch_allocator::core::fixed::{CurrencyBalance, Perquintill};
use epoch_allocator::core::state::{
    OrderState, PoolState, StateError, TrancheState, WeightState,
};
use epoch_allocator::solver::{solve, SolveError};
use num_bigint::BigInt;

const DECIMALS: u32 = 6;

fn balance(units: u64) -> CurrencyBalance {
    CurrencyBalance::from_units(units, DECIMALS)
}

fn percent(value: u32) -> Perquintill {
    Perquintill::from_percent(value).unwrap()
}

/// 70% junior / 30% senior pool with a 10% senior risk buffer,
/// pool value 1000, reserve 0.
fn two_tranche_pool(max_reserve: u64) -> PoolState {
    PoolState {
        net_asset_value: balance(1_000_000_000),
        reserve: balance(0),
        max_reserve: balance(max_reserve),
        currency_decimals: DECIMALS,
        tranches: vec![
            TrancheState {
                ratio: percent(70),
                min_risk_buffer: None,
            },
            TrancheState {
                ratio: percent(30),
                min_risk_buffer: Some(percent(10)),
            },
        ],
    }
}

fn senior_invest_orders(units: u64) -> Vec<OrderState> {
    vec![
        OrderState::none(DECIMALS),
        OrderState {
            invest: balance(units),
            redeem: balance(0),
        },
    ]
}

/// Neither the reserve ceiling nor the risk buffer binds: the senior
/// investment fills completely.
#[test]
fn senior_investment_fills_fully() {
    let pool = two_tranche_pool(1_000_000_000);
    let orders = senior_invest_orders(500_000_000);
    let weights = WeightState::priority_ladder(2);

    let solution = solve(&pool, &orders, &weights).unwrap();

    assert!(solution.is_feasible);
    assert_eq!(
        solution.tranches[1].invest.amount.units(),
        &BigInt::from(500_000_000u64)
    );
    assert!(solution.tranches[1].invest.fraction.is_one());
    assert!(solution.tranches[0].invest.amount.is_zero());
    assert!(solution.tranches[0].redeem.amount.is_zero());
    assert!(solution.is_valid(&pool, &orders, &balance(10)));
}

/// A tight reserve ceiling caps the fill at the remaining headroom.
#[test]
fn reserve_ceiling_caps_investment() {
    let pool = two_tranche_pool(200_000_000);
    let orders = senior_invest_orders(500_000_000);
    let weights = WeightState::priority_ladder(2);

    let solution = solve(&pool, &orders, &weights).unwrap();

    assert!(solution.is_feasible);
    assert_eq!(
        solution.tranches[1].invest.amount.units(),
        &BigInt::from(200_000_000u64)
    );
    assert_eq!(
        solution.tranches[1].invest.fraction,
        percent(40)
    );
    assert_relative_eq!(
        solution.tranches[1].invest.fraction.to_f64(),
        0.4,
        epsilon = 1e-12
    );
    assert!(solution.is_valid(&pool, &orders, &balance(10)));
}

/// An epoch with no pending orders is feasible and executes nothing.
#[test]
fn empty_epoch_is_feasible_zero() {
    let pool = two_tranche_pool(1_000_000_000);
    let orders = vec![OrderState::none(DECIMALS), OrderState::none(DECIMALS)];
    let weights = WeightState::priority_ladder(2);

    let solution = solve(&pool, &orders, &weights).unwrap();

    assert!(solution.is_feasible);
    for tranche in &solution.tranches {
        assert!(tranche.invest.amount.is_zero());
        assert!(tranche.redeem.amount.is_zero());
        assert!(tranche.invest.fraction.is_zero());
        assert!(tranche.redeem.fraction.is_zero());
    }
}

/// Misaligned input lengths fail before the solver is ever invoked.
#[test]
fn shape_mismatch_rejected() {
    let pool = PoolState {
        net_asset_value: balance(1_000_000_000),
        reserve: balance(0),
        max_reserve: balance(1_000_000_000),
        currency_decimals: DECIMALS,
        tranches: vec![
            TrancheState {
                ratio: percent(50),
                min_risk_buffer: None,
            },
            TrancheState {
                ratio: percent(30),
                min_risk_buffer: Some(percent(20)),
            },
            TrancheState {
                ratio: percent(20),
                min_risk_buffer: Some(percent(10)),
            },
        ],
    };
    let orders = vec![OrderState::none(DECIMALS), OrderState::none(DECIMALS)];
    let weights = WeightState::priority_ladder(3);

    let err = solve(&pool, &orders, &weights).unwrap_err();
    assert!(matches!(
        err,
        SolveError::State(StateError::ShapeMismatch {
            tranches: 3,
            orders: 2,
            weights: 3
        })
    ));
}

/// A buffered junior-most tranche means the seniority chain is malformed.
#[test]
fn buffered_junior_tranche_rejected() {
    let mut pool = two_tranche_pool(1_000_000_000);
    pool.tranches[0].min_risk_buffer = Some(percent(5));
    let orders = vec![OrderState::none(DECIMALS), OrderState::none(DECIMALS)];
    let weights = WeightState::priority_ladder(2);

    let err = solve(&pool, &orders, &weights).unwrap_err();
    assert!(matches!(
        err,
        SolveError::State(StateError::MissingJuniorTranche)
    ));
    assert_eq!(
        err.to_string(),
        "missing junior tranche: tranche 0 must not carry a min risk buffer"
    );
}

/// A reserve already above its maximum cannot be fixed by investments alone:
/// the epoch is infeasible, which is a terminal state rather than an error.
#[test]
fn overfull_reserve_yields_infeasible_solution() {
    let mut pool = two_tranche_pool(200_000_000);
    pool.reserve = balance(300_000_000);
    let orders = senior_invest_orders(500_000_000);
    let weights = WeightState::priority_ladder(2);

    let solution = solve(&pool, &orders, &weights).unwrap();

    assert!(!solution.is_feasible);
    for tranche in &solution.tranches {
        assert!(tranche.invest.amount.is_zero());
        assert!(tranche.redeem.amount.is_zero());
    }
    assert!(solution.is_valid(&pool, &orders, &balance(10)));
}

/// The senior risk buffer caps how much the junior tranche may redeem.
#[test]
fn risk_buffer_caps_junior_redemption() {
    let mut pool = two_tranche_pool(1_000_000_000);
    pool.reserve = balance(700_000_000);
    let orders = vec![
        OrderState {
            invest: balance(0),
            redeem: balance(700_000_000),
        },
        OrderState::none(DECIMALS),
    ];
    let weights = WeightState::priority_ladder(2);

    let solution = solve(&pool, &orders, &weights).unwrap();

    assert!(solution.is_feasible);
    // (subordinate − β·pool_value) / (1 − β) = 666.666667, to the unit
    let redeemed = solution.tranches[0].redeem.amount.units();
    assert!(redeemed >= &BigInt::from(666_666_664u64));
    assert!(redeemed <= &BigInt::from(666_666_669u64));
    assert!(solution.is_valid(&pool, &orders, &balance(10)));
}

/// With only enough reserve for one redemption, the senior tranche wins.
#[test]
fn senior_redemption_outranks_junior() {
    let pool = PoolState {
        net_asset_value: balance(1_000_000_000),
        reserve: balance(100_000_000),
        max_reserve: balance(1_000_000_000),
        currency_decimals: DECIMALS,
        tranches: vec![
            TrancheState {
                ratio: percent(40),
                min_risk_buffer: None,
            },
            TrancheState {
                ratio: percent(35),
                min_risk_buffer: Some(percent(30)),
            },
            TrancheState {
                ratio: percent(25),
                min_risk_buffer: Some(percent(20)),
            },
        ],
    };
    let orders = vec![
        OrderState {
            invest: balance(0),
            redeem: balance(100_000_000),
        },
        OrderState::none(DECIMALS),
        OrderState {
            invest: balance(0),
            redeem: balance(100_000_000),
        },
    ];
    let weights = WeightState::priority_ladder(3);

    let solution = solve(&pool, &orders, &weights).unwrap();

    assert!(solution.is_feasible);
    assert_eq!(
        solution.tranches[2].redeem.amount.units(),
        &BigInt::from(100_000_000u64)
    );
    assert!(solution.tranches[0].redeem.amount.is_zero());
    assert!(solution.is_valid(&pool, &orders, &balance(10)));
}

/// Relaxing the reserve ceiling never shrinks what gets executed.
#[test]
fn wider_ceiling_never_hurts() {
    let tight = two_tranche_pool(200_000_000);
    let wide = two_tranche_pool(800_000_000);
    let orders = senior_invest_orders(500_000_000);
    let weights = WeightState::priority_ladder(2);

    let capped = solve(&tight, &orders, &weights).unwrap();
    let relaxed = solve(&wide, &orders, &weights).unwrap();

    assert!(
        relaxed.tranches[1].invest.amount.units() >= capped.tranches[1].invest.amount.units()
    );
}

/// Identical inputs produce identical solutions.
#[test]
fn solve_is_deterministic() {
    let mut pool = two_tranche_pool(400_000_000);
    pool.reserve = balance(100_000_000);
    let orders = vec![
        OrderState {
            invest: balance(70_000_000),
            redeem: balance(30_000_000),
        },
        OrderState {
            invest: balance(250_000_000),
            redeem: balance(110_000_000),
        },
    ];
    let weights = WeightState::priority_ladder(2);

    let first = solve(&pool, &orders, &weights).unwrap();
    let second = solve(&pool, &orders, &weights).unwrap();
    assert_eq!(first, second);
}

/// The solution serializes to JSON with its full fixed-point precision.
#[test]
fn solution_serializes() {
    let pool = two_tranche_pool(1_000_000_000);
    let orders = senior_invest_orders(500_000_000);
    let weights = WeightState::priority_ladder(2);

    let solution = solve(&pool, &orders, &weights).unwrap();
    let json = serde_json::to_string_pretty(&solution).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["is_feasible"], true);
    assert!(parsed["tranches"].as_array().unwrap().len() == 2);

    let round_tripped: epoch_allocator::solver::EpochSolution =
        serde_json::from_str(&json).unwrap();
    assert_eq!(round_tripped, solution);
}

/// Capacity queries agree with what the solver actually executes.
#[test]
fn capacities_match_solver_behavior() {
    let pool = two_tranche_pool(200_000_000);
    let capacity = pool.invest_capacity(1).unwrap();
    assert_eq!(capacity.units(), &BigInt::from(200_000_000u64));

    let orders = senior_invest_orders(500_000_000);
    let weights = WeightState::priority_ladder(2);
    let solution = solve(&pool, &orders, &weights).unwrap();
    assert_eq!(
        solution.tranches[1].invest.amount.units(),
        capacity.units()
    );

    assert!(matches!(
        pool.invest_capacity(7),
        Err(StateError::IndexOutOfRange { index: 7, len: 2 })
    ));
}

#[test]
fn solution_display_is_readable() {
    let pool = two_tranche_pool(1_000_000_000);
    let orders = senior_invest_orders(500_000_000);
    let weights = WeightState::priority_ladder(2);

    let solution = solve(&pool, &orders, &weights).unwrap();
    let rendered = solution.to_string();
    assert!(rendered.contains("Feasible: true"));
    assert!(rendered.contains("Tranche 1"));
    assert!(rendered.contains("500.000000"));
}
