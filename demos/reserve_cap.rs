//! Reserve-bound allocation example.
//!
//! Shows a reserve ceiling capping an investment, and an epoch whose
//! constraints admit no solution at all — reported as an infeasible
//! solution, not an error.

use epoch_allocator::prelude::*;

fn pool(reserve: u64, max_reserve: u64) -> PoolState {
    PoolState {
        net_asset_value: CurrencyBalance::from_units(1_000_000_000u64, 6),
        reserve: CurrencyBalance::from_units(reserve, 6),
        max_reserve: CurrencyBalance::from_units(max_reserve, 6),
        currency_decimals: 6,
        tranches: vec![
            TrancheState {
                ratio: Perquintill::from_percent(70).expect("valid percent"),
                min_risk_buffer: None,
            },
            TrancheState {
                ratio: Perquintill::from_percent(30).expect("valid percent"),
                min_risk_buffer: Some(Perquintill::from_percent(10).expect("valid percent")),
            },
        ],
    }
}

fn senior_invest(amount: u64) -> Vec<OrderState> {
    vec![
        OrderState::none(6),
        OrderState {
            invest: CurrencyBalance::from_units(amount, 6),
            redeem: CurrencyBalance::zero(6),
        },
    ]
}

fn main() {
    env_logger::init();

    println!("╔══════════════════════════════════════════╗");
    println!("║  epoch-allocator: Reserve Cap Example    ║");
    println!("╚══════════════════════════════════════════╝\n");

    let weights = WeightState::priority_ladder(2);

    // --- Scenario 1: the ceiling caps the fill ---
    println!("━━━ Scenario 1: Capped Investment ━━━\n");

    let capped = pool(0, 200_000_000);
    let orders = senior_invest(500_000_000);
    println!(
        "Senior tranche wants to invest 500.000000, reserve headroom is {}",
        capped.max_reserve
    );
    let solution = solve(&capped, &orders, &weights).expect("well-formed inputs");
    println!("{}", solution);

    // --- Scenario 2: no feasible allocation ---
    println!("━━━ Scenario 2: Infeasible Epoch ━━━\n");

    // The reserve already exceeds its maximum and only investments are
    // pending, so no allocation can restore the bounds this epoch.
    let overfull = pool(300_000_000, 200_000_000);
    println!(
        "Reserve {} exceeds max reserve {}",
        overfull.reserve, overfull.max_reserve
    );
    let solution = solve(&overfull, &orders, &weights).expect("well-formed inputs");
    println!("{}", solution);
    if !solution.is_feasible {
        println!("Nothing to execute: callers distinguish this from a malfunction.");
    }
}
