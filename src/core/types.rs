use serde::Serialize;

/// Column labels for the flat scenario table, in display order.
pub const TABLE_COLUMNS: [&str; 10] = [
    "Pass Rate (%)",
    "Price ($)",
    "Allocation ($)",
    "Total Eval Spend (Discounted)",
    "Total Users Expected to Become Live",
    "Total Allocation of Users Who Pass",
    "% Of Funds Paid Out in Allocation To Traders",
    "Profit Margins at Live Allocation",
    "Total Company Profits of 1st Payout",
    "Profit Margin After 1st Payout Considered",
];

/// Axis labels of the profit-margin surface: x, y, z.
pub const SURFACE_AXIS_LABELS: [&str; 3] = [
    "Pass Rate (%)",
    "Price ($)",
    "Profit Margin After Payout (%)",
];

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Axis {
    PassRate,
    Price,
    Allocation,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::PassRate => "pass_rate",
            Axis::Price => "price",
            Axis::Allocation => "allocation",
        }
    }
}

/// One point of the scenario space. `pass_rate` is in percent (0-100);
/// `payout_rate` and `company_profit_split` are fractions (0-1).
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInput {
    pub pass_rate: f64,
    pub price: f64,
    pub allocation: f64,
    pub payout_size: f64,
    pub payout_rate: f64,
    pub company_profit_split: f64,
}

/// Derived metrics for a single scenario. Ratios are fractions, not percent.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMetrics {
    pub total_eval_spend: f64,
    pub total_users_live: f64,
    pub total_allocation: f64,
    pub percent_funds_paid_out: f64,
    pub profit_margin_live: f64,
    pub total_company_profit: f64,
    pub profit_margin_after_payout: f64,
}

impl ScenarioMetrics {
    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }

    pub fn labeled_fields(&self) -> Vec<(&'static str, f64)> {
        TABLE_COLUMNS[3..]
            .iter()
            .copied()
            .zip(self.values())
            .collect()
    }

    fn values(&self) -> [f64; 7] {
        [
            self.total_eval_spend,
            self.total_users_live,
            self.total_allocation,
            self.percent_funds_paid_out,
            self.profit_margin_live,
            self.total_company_profit,
            self.profit_margin_after_payout,
        ]
    }
}

/// Inclusive `min..=max` sweep in increments of `step`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParameterRange {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }
}

/// Scalars held constant across a sweep.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PayoutTerms {
    pub payout_size: f64,
    pub payout_rate: f64,
    pub company_profit_split: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SweepConfig {
    pub pass_rate: ParameterRange,
    pub price: ParameterRange,
    pub allocation: ParameterRange,
    pub payout: PayoutTerms,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SurfaceConfig {
    pub pass_rate: ParameterRange,
    pub price: ParameterRange,
    pub live_allocation: f64,
    pub payout: PayoutTerms,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRow {
    pub input: ScenarioInput,
    pub metrics: ScenarioMetrics,
}

impl ScenarioRow {
    /// All ten table cells paired with their column label.
    pub fn labeled_fields(&self) -> Vec<(&'static str, f64)> {
        let mut fields = vec![
            (TABLE_COLUMNS[0], self.input.pass_rate),
            (TABLE_COLUMNS[1], self.input.price),
            (TABLE_COLUMNS[2], self.input.allocation),
        ];
        fields.extend(self.metrics.labeled_fields());
        fields
    }
}

#[derive(Debug, Clone)]
pub struct TableResult {
    pub pass_rates: Vec<f64>,
    pub prices: Vec<f64>,
    pub allocations: Vec<f64>,
    pub rows: Vec<ScenarioRow>,
    pub degenerate_rows: usize,
}

/// `values[price_index][pass_rate_index]` holds the profit margin after
/// payout in percent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceGrid {
    pub pass_rates: Vec<f64>,
    pub prices: Vec<f64>,
    pub live_allocation: f64,
    pub values: Vec<Vec<f64>>,
}
