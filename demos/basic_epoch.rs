//! Basic epoch allocation example.
//!
//! Demonstrates how pending orders of a two-tranche pool are matched
//! against the reserve bounds and the senior risk buffer.

use epoch_allocator::prelude::*;

fn main() {
    env_logger::init();

    println!("╔══════════════════════════════════════════╗");
    println!("║  epoch-allocator: Basic Epoch Example    ║");
    println!("╚══════════════════════════════════════════╝\n");

    // A 1000-unit pool: 70% junior tranche, 30% senior tranche with a
    // 10% minimum risk buffer. The reserve is empty and may hold up to 1000.
    let pool = PoolState {
        net_asset_value: CurrencyBalance::from_units(1_000_000_000u64, 6),
        reserve: CurrencyBalance::zero(6),
        max_reserve: CurrencyBalance::from_units(1_000_000_000u64, 6),
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
    };

    println!("━━━ Pool ━━━\n");
    println!("Pool value:   {}", pool.net_asset_value);
    println!("Reserve:      {}", pool.reserve);
    println!("Max reserve:  {}", pool.max_reserve);
    println!(
        "Senior invest capacity: {}",
        pool.invest_capacity(1).expect("valid index")
    );
    println!();

    // The senior tranche wants to invest 500; the junior tranche wants
    // to redeem 100.
    let orders = vec![
        OrderState {
            invest: CurrencyBalance::zero(6),
            redeem: CurrencyBalance::from_units(100_000_000u64, 6),
        },
        OrderState {
            invest: CurrencyBalance::from_units(500_000_000u64, 6),
            redeem: CurrencyBalance::zero(6),
        },
    ];
    let weights = WeightState::priority_ladder(2);

    println!("━━━ Orders ━━━\n");
    for (index, order) in orders.iter().enumerate() {
        println!(
            "Tranche {}: invest {}, redeem {}",
            index, order.invest, order.redeem
        );
    }
    println!();

    let solution = solve(&pool, &orders, &weights).expect("well-formed inputs");
    println!("{}", solution);
}
