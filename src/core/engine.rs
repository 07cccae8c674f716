use super::types::{ScenarioInput, ScenarioMetrics};

/// Cohort size every scenario is evaluated against.
pub const SAMPLE_SIZE: f64 = 1000.0;

/// Share of list price kept after the fixed reset/refund discount.
pub const EVAL_SPEND_DISCOUNT: f64 = 0.75;

pub const PERCENT_SCALE: f64 = 100.0;

/// Evaluates one scenario. No validation is done: a zero price leaves every
/// ratio non-finite, and callers are expected to check `is_finite`.
pub fn calculate_metrics(input: &ScenarioInput) -> ScenarioMetrics {
    let total_eval_spend = input.price * SAMPLE_SIZE * EVAL_SPEND_DISCOUNT;
    let total_users_live = SAMPLE_SIZE * (input.pass_rate / PERCENT_SCALE);
    let total_allocation = total_users_live * input.allocation;

    let percent_funds_paid_out = total_allocation / total_eval_spend;
    let profit_margin_live = 1.0 - percent_funds_paid_out;

    let total_company_profit =
        total_users_live * input.payout_rate * input.payout_size * input.company_profit_split;
    let profit_margin_after_payout =
        1.0 - ((total_allocation - total_company_profit) / total_eval_spend);

    ScenarioMetrics {
        total_eval_spend,
        total_users_live,
        total_allocation,
        percent_funds_paid_out,
        profit_margin_live,
        total_company_profit,
        profit_margin_after_payout,
    }
}
