mod engine;
mod error;
mod sweep;
mod types;

pub use engine::{EVAL_SPEND_DISCOUNT, PERCENT_SCALE, SAMPLE_SIZE, calculate_metrics};
pub use error::SweepError;
pub use sweep::{
    MAX_SWEEP_SCENARIOS, generate_range, run_surface_sweep, run_table_sweep, select_row,
};
pub use types::{
    Axis, ParameterRange, PayoutTerms, SURFACE_AXIS_LABELS, ScenarioInput, ScenarioMetrics,
    ScenarioRow, SurfaceConfig, SurfaceGrid, SweepConfig, TABLE_COLUMNS, TableResult,
};
