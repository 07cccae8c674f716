use tracing::{debug, warn};

use super::engine::{PERCENT_SCALE, calculate_metrics};
use super::error::SweepError;
use super::types::{
    Axis, ParameterRange, PayoutTerms, ScenarioInput, ScenarioRow, SurfaceConfig, SurfaceGrid,
    SweepConfig, TableResult,
};

// Absorbs float drift in (max - min) / step: a candidate landing within this
// many steps of `max + step` counts as past the end.
const STEP_COUNT_EPSILON: f64 = 1e-9;

/// Upper bound on scenarios evaluated by a single sweep.
pub const MAX_SWEEP_SCENARIOS: usize = 1 << 21;

/// Values `min + i * step` for every `i` with `min + i * step < max + step`,
/// so a `max` between steps rounds up to the next step. Generated from an
/// integer step count, so endpoints never drift.
pub fn generate_range(axis: Axis, range: ParameterRange) -> Result<Vec<f64>, SweepError> {
    validate_range(axis, range)?;

    let slots = (range.max - range.min) / range.step + 1.0 - STEP_COUNT_EPSILON;
    if slots <= 0.0 {
        return Ok(Vec::new());
    }

    let count = slots.ceil();
    if count > MAX_SWEEP_SCENARIOS as f64 {
        return Err(SweepError::TooLarge {
            scenarios: count as usize,
            limit: MAX_SWEEP_SCENARIOS,
        });
    }

    Ok((0..count as usize)
        .map(|i| range.min + i as f64 * range.step)
        .collect())
}

/// Full Cartesian product, pass rate outermost and allocation innermost.
pub fn run_table_sweep(config: &SweepConfig) -> Result<TableResult, SweepError> {
    let pass_rates = generate_range(Axis::PassRate, config.pass_rate)?;
    let prices = generate_range(Axis::Price, config.price)?;
    let allocations = generate_range(Axis::Allocation, config.allocation)?;

    let scenarios = check_sweep_size(&[pass_rates.len(), prices.len(), allocations.len()])?;

    let mut rows = Vec::with_capacity(scenarios);
    for &pass_rate in &pass_rates {
        for &price in &prices {
            for &allocation in &allocations {
                let input = scenario_input(pass_rate, price, allocation, config.payout);
                rows.push(ScenarioRow {
                    input,
                    metrics: calculate_metrics(&input),
                });
            }
        }
    }

    let degenerate_rows = rows.iter().filter(|r| !r.metrics.is_finite()).count();
    if degenerate_rows > 0 {
        warn!(
            degenerate_rows,
            total_rows = rows.len(),
            "sweep produced scenarios with non-finite metrics"
        );
    }
    debug!(
        pass_rates = pass_rates.len(),
        prices = prices.len(),
        allocations = allocations.len(),
        rows = rows.len(),
        "table sweep complete"
    );

    Ok(TableResult {
        pass_rates,
        prices,
        allocations,
        rows,
        degenerate_rows,
    })
}

/// Profit margin after payout over (price, pass rate) with allocation pinned
/// to `live_allocation`. Rows are prices, columns are pass rates.
pub fn run_surface_sweep(config: &SurfaceConfig) -> Result<SurfaceGrid, SweepError> {
    let pass_rates = generate_range(Axis::PassRate, config.pass_rate)?;
    let prices = generate_range(Axis::Price, config.price)?;
    check_sweep_size(&[prices.len(), pass_rates.len()])?;

    let values: Vec<Vec<f64>> = prices
        .iter()
        .map(|&price| {
            pass_rates
                .iter()
                .map(|&pass_rate| {
                    let input =
                        scenario_input(pass_rate, price, config.live_allocation, config.payout);
                    calculate_metrics(&input).profit_margin_after_payout * PERCENT_SCALE
                })
                .collect()
        })
        .collect();

    let non_finite = values.iter().flatten().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        warn!(non_finite, "surface contains non-finite cells");
    }
    debug!(
        rows = prices.len(),
        cols = pass_rates.len(),
        live_allocation = config.live_allocation,
        "surface sweep complete"
    );

    Ok(SurfaceGrid {
        pass_rates,
        prices,
        live_allocation: config.live_allocation,
        values,
    })
}

pub fn select_row(rows: &[ScenarioRow], index: i64) -> Result<&ScenarioRow, SweepError> {
    usize::try_from(index)
        .ok()
        .and_then(|idx| rows.get(idx))
        .ok_or_else(|| SweepError::InvalidSelection {
            index,
            row_count: rows.len(),
        })
}

fn scenario_input(
    pass_rate: f64,
    price: f64,
    allocation: f64,
    payout: PayoutTerms,
) -> ScenarioInput {
    ScenarioInput {
        pass_rate,
        price,
        allocation,
        payout_size: payout.payout_size,
        payout_rate: payout.payout_rate,
        company_profit_split: payout.company_profit_split,
    }
}

fn check_sweep_size(axis_lens: &[usize]) -> Result<usize, SweepError> {
    let scenarios = axis_lens
        .iter()
        .try_fold(1usize, |acc, &len| acc.checked_mul(len))
        .unwrap_or(usize::MAX);
    if scenarios > MAX_SWEEP_SCENARIOS {
        return Err(SweepError::TooLarge {
            scenarios,
            limit: MAX_SWEEP_SCENARIOS,
        });
    }
    Ok(scenarios)
}

fn validate_range(axis: Axis, range: ParameterRange) -> Result<(), SweepError> {
    let invalid = |reason: &str| SweepError::InvalidRange {
        axis: axis.name(),
        reason: reason.to_string(),
    };
    if !range.min.is_finite() || !range.max.is_finite() {
        return Err(invalid("bounds must be finite"));
    }
    if !range.step.is_finite() || range.step <= 0.0 {
        return Err(invalid("step must be > 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn default_payout() -> PayoutTerms {
        PayoutTerms {
            payout_size: 1000.0,
            payout_rate: 0.5,
            company_profit_split: 0.2,
        }
    }

    fn default_sweep() -> SweepConfig {
        SweepConfig {
            pass_rate: ParameterRange::new(8.0, 25.0, 1.0),
            price: ParameterRange::new(100.0, 250.0, 25.0),
            allocation: ParameterRange::new(1500.0, 3000.0, 250.0),
            payout: default_payout(),
        }
    }

    #[test]
    fn integer_range_includes_both_endpoints() {
        let values = generate_range(Axis::PassRate, ParameterRange::new(8.0, 25.0, 1.0))
            .expect("valid range");
        let expected: Vec<f64> = (8..=25).map(f64::from).collect();
        assert_eq!(values, expected);
        assert_eq!(values.len(), 18);
    }

    #[test]
    fn fractional_step_keeps_terminal_value() {
        let values = generate_range(Axis::PassRate, ParameterRange::new(0.0, 1.0, 0.1))
            .expect("valid range");
        assert_eq!(values.len(), 11);
        assert_approx(values[10], 1.0);

        let values = generate_range(Axis::PassRate, ParameterRange::new(0.1, 0.7, 0.3))
            .expect("valid range");
        assert_eq!(values.len(), 3);
        assert_approx(values[2], 0.7);
    }

    #[test]
    fn max_off_step_boundary_rounds_up_to_next_step() {
        let values = generate_range(Axis::Price, ParameterRange::new(100.0, 240.0, 25.0))
            .expect("valid range");
        assert_eq!(
            values,
            vec![100.0, 125.0, 150.0, 175.0, 200.0, 225.0, 250.0]
        );

        let values = generate_range(Axis::PassRate, ParameterRange::new(8.0, 8.5, 1.0))
            .expect("valid range");
        assert_eq!(values, vec![8.0, 9.0]);
    }

    #[test]
    fn min_within_one_step_above_max_yields_min() {
        let values = generate_range(Axis::Price, ParameterRange::new(100.0, 90.0, 25.0))
            .expect("valid range");
        assert_eq!(values, vec![100.0]);
    }

    #[test]
    fn min_at_max_plus_step_yields_empty_range() {
        let values = generate_range(Axis::Price, ParameterRange::new(125.0, 100.0, 25.0))
            .expect("valid range");
        assert!(values.is_empty());
    }

    #[test]
    fn oversized_axis_is_rejected_before_allocating() {
        let err = generate_range(Axis::Allocation, ParameterRange::new(0.0, 1e12, 1.0))
            .expect_err("axis too long");
        assert!(matches!(
            err,
            SweepError::TooLarge {
                limit: MAX_SWEEP_SCENARIOS,
                ..
            }
        ));
    }

    #[test]
    fn widest_clamped_table_sweep_is_rejected() {
        let config = SweepConfig {
            pass_rate: ParameterRange::new(0.0, 100.0, 0.1),
            price: ParameterRange::new(0.0, 1000.0, 1.0),
            allocation: ParameterRange::new(0.0, 10_000.0, 1.0),
            payout: default_payout(),
        };
        let err = run_table_sweep(&config).expect_err("grid too large");
        let SweepError::TooLarge { scenarios, limit } = err else {
            panic!("expected TooLarge, got {err:?}");
        };
        assert!(scenarios > limit);
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn widest_clamped_surface_sweep_still_runs() {
        let grid = run_surface_sweep(&SurfaceConfig {
            pass_rate: ParameterRange::new(0.0, 100.0, 0.1),
            price: ParameterRange::new(0.0, 1000.0, 1.0),
            live_allocation: 2000.0,
            payout: default_payout(),
        })
        .expect("surface fits");
        assert_eq!(grid.prices.len(), 1001);
        assert_eq!(grid.pass_rates.len(), 1001);
    }

    #[test]
    fn equal_bounds_yield_single_value() {
        let values = generate_range(Axis::Allocation, ParameterRange::new(2000.0, 2000.0, 250.0))
            .expect("valid range");
        assert_eq!(values, vec![2000.0]);
    }

    #[test]
    fn inverted_bounds_yield_empty_range() {
        let values = generate_range(Axis::Price, ParameterRange::new(250.0, 100.0, 25.0))
            .expect("valid range");
        assert!(values.is_empty());
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let err = generate_range(Axis::Allocation, ParameterRange::new(0.0, 10.0, 0.0))
            .expect_err("zero step must be rejected");
        assert!(matches!(
            err,
            SweepError::InvalidRange {
                axis: "allocation",
                ..
            }
        ));

        let err = generate_range(Axis::Price, ParameterRange::new(0.0, f64::NAN, 1.0))
            .expect_err("NaN bound must be rejected");
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn default_table_sweep_has_expected_shape_and_order() {
        let table = run_table_sweep(&default_sweep()).expect("sweep runs");

        assert_eq!(table.pass_rates.len(), 18);
        assert_eq!(table.prices.len(), 7);
        assert_eq!(table.allocations.len(), 7);
        assert_eq!(table.rows.len(), 18 * 7 * 7);
        assert_eq!(table.degenerate_rows, 0);

        let first = table.rows[0].input;
        assert_approx(first.pass_rate, 8.0);
        assert_approx(first.price, 100.0);
        assert_approx(first.allocation, 1500.0);

        // Allocation varies fastest, then price.
        assert_approx(table.rows[1].input.allocation, 1750.0);
        assert_approx(table.rows[1].input.price, 100.0);
        assert_approx(table.rows[7].input.price, 125.0);
        assert_approx(table.rows[49].input.pass_rate, 9.0);

        let last = table.rows.last().expect("rows present").input;
        assert_approx(last.pass_rate, 25.0);
        assert_approx(last.price, 250.0);
        assert_approx(last.allocation, 3000.0);
    }

    #[test]
    fn first_table_row_matches_reference_scenario() {
        let table = run_table_sweep(&default_sweep()).expect("sweep runs");
        let m = table.rows[0].metrics;

        assert_approx(m.total_eval_spend, 75_000.0);
        assert_approx(m.total_users_live, 80.0);
        assert_approx(m.total_allocation, 120_000.0);
        assert_approx(m.profit_margin_live, -0.6);
        assert_approx(m.total_company_profit, 8_000.0);
        assert_approx(m.profit_margin_after_payout, -0.493_333_333_333_333_3);
    }

    #[test]
    fn zero_price_rows_are_counted_as_degenerate() {
        let mut config = default_sweep();
        config.price = ParameterRange::new(0.0, 50.0, 25.0);
        let table = run_table_sweep(&config).expect("sweep runs");

        let per_price = table.pass_rates.len() * table.allocations.len();
        assert_eq!(table.degenerate_rows, per_price);
        assert!(
            table
                .rows
                .iter()
                .filter(|r| r.input.price == 0.0)
                .all(|r| !r.metrics.is_finite())
        );
    }

    #[test]
    fn surface_grid_is_prices_by_pass_rates_in_percent() {
        let config = SurfaceConfig {
            pass_rate: ParameterRange::new(8.0, 25.0, 1.0),
            price: ParameterRange::new(100.0, 250.0, 25.0),
            live_allocation: 1500.0,
            payout: default_payout(),
        };
        let grid = run_surface_sweep(&config).expect("sweep runs");

        assert_eq!(grid.values.len(), grid.prices.len());
        assert!(grid.values.iter().all(|row| row.len() == grid.pass_rates.len()));
        assert_approx(grid.values[0][0], -49.333_333_333_333_33);

        // Cell (price 125, pass rate 10) against a direct evaluation.
        let input = scenario_input(10.0, 125.0, 1500.0, default_payout());
        assert_approx(
            grid.values[1][2],
            calculate_metrics(&input).profit_margin_after_payout * 100.0,
        );
    }

    #[test]
    fn surface_matches_table_column_at_same_allocation() {
        let mut sweep = default_sweep();
        sweep.allocation = ParameterRange::new(2000.0, 2000.0, 250.0);
        let table = run_table_sweep(&sweep).expect("sweep runs");
        let grid = run_surface_sweep(&SurfaceConfig {
            pass_rate: sweep.pass_rate,
            price: sweep.price,
            live_allocation: 2000.0,
            payout: sweep.payout,
        })
        .expect("sweep runs");

        for (p, _) in grid.pass_rates.iter().enumerate() {
            for (q, _) in grid.prices.iter().enumerate() {
                let row = table.rows[p * grid.prices.len() + q];
                assert_approx(grid.values[q][p], row.metrics.profit_margin_after_payout * 100.0);
            }
        }
    }

    #[test]
    fn select_row_rejects_out_of_bounds_indexes() {
        let table = run_table_sweep(&default_sweep()).expect("sweep runs");
        let count = table.rows.len();

        assert!(select_row(&table.rows, 0).is_ok());
        let last = select_row(&table.rows, count as i64 - 1).expect("last row valid");
        assert_approx(last.input.allocation, 3000.0);

        assert_eq!(
            select_row(&table.rows, count as i64),
            Err(SweepError::InvalidSelection {
                index: count as i64,
                row_count: count,
            })
        );
        assert!(select_row(&table.rows, -1).is_err());
        assert!(select_row(&[], 0).is_err());
    }

    #[test]
    fn row_labeled_fields_cover_all_columns() {
        let table = run_table_sweep(&default_sweep()).expect("sweep runs");
        let fields = table.rows[0].labeled_fields();

        assert_eq!(fields.len(), 10);
        assert_eq!(fields[0], ("Pass Rate (%)", 8.0));
        assert_eq!(fields[2], ("Allocation ($)", 1500.0));
        assert_eq!(fields[3].0, "Total Eval Spend (Discounted)");
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_range_endpoints_are_exact(
            min_tenths in 0u32..500,
            steps in 0u32..200,
            step_tenths in 1u32..100
        ) {
            let min = min_tenths as f64 / 10.0;
            let step = step_tenths as f64 / 10.0;
            let max = min + steps as f64 * step;
            let values = generate_range(Axis::PassRate, ParameterRange::new(min, max, step))
                .expect("valid range");

            prop_assert_eq!(values.len(), steps as usize + 1);
            prop_assert!((values[0] - min).abs() <= 1e-9);
            prop_assert!((values[values.len() - 1] - max).abs() <= 1e-6);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(24))]

        #[test]
        fn prop_row_count_is_product_of_axes(
            pass_steps in 0u32..12,
            price_steps in 0u32..8,
            allocation_steps in 0u32..8,
            pass_step_tenths in 1u32..30
        ) {
            let pass_step = pass_step_tenths as f64 / 10.0;
            let config = SweepConfig {
                pass_rate: ParameterRange::new(1.0, 1.0 + pass_steps as f64 * pass_step, pass_step),
                price: ParameterRange::new(50.0, 50.0 + price_steps as f64 * 25.0, 25.0),
                allocation: ParameterRange::new(500.0, 500.0 + allocation_steps as f64 * 250.0, 250.0),
                payout: default_payout(),
            };
            let table = run_table_sweep(&config).expect("sweep runs");

            prop_assert_eq!(
                table.rows.len(),
                table.pass_rates.len() * table.prices.len() * table.allocations.len()
            );
            prop_assert_eq!(table.pass_rates.len(), pass_steps as usize + 1);
            prop_assert_eq!(table.degenerate_rows, 0);
        }
    }
}
