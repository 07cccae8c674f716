mod render;

use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::core::{
    ParameterRange, PayoutTerms, SURFACE_AXIS_LABELS, ScenarioRow, SurfaceConfig, SurfaceGrid,
    SweepConfig, TABLE_COLUMNS, TableResult, run_surface_sweep, run_table_sweep, select_row,
};

pub use render::{render_selection, render_surface, render_table};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const PASS_RATE_BOUNDS: (f64, f64) = (0.0, 100.0);
const PASS_RATE_STEP_BOUNDS: (f64, f64) = (0.1, 10.0);
const PRICE_BOUNDS: (f64, f64) = (0.0, 1_000.0);
const PRICE_STEP_BOUNDS: (f64, f64) = (1.0, 100.0);
const ALLOCATION_BOUNDS: (f64, f64) = (0.0, 10_000.0);
const ALLOCATION_STEP_BOUNDS: (f64, f64) = (1.0, 1_000.0);
const PAYOUT_SIZE_BOUNDS: (f64, f64) = (0.0, 10_000.0);
const PERCENT_BOUNDS: (f64, f64) = (0.0, 100.0);

#[derive(Parser, Debug)]
#[command(
    name = "margin",
    about = "Evaluation-to-funded-trader profitability sweeps (pass rate x price x allocation)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API and the web UI
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Print every scenario of the pass rate x price x allocation sweep
    Table(ScenarioArgs),
    /// Print the profit margin surface at a fixed live allocation
    Surface(ScenarioArgs),
}

#[derive(Args, Debug, Clone, Copy)]
pub struct ScenarioArgs {
    #[arg(long, default_value_t = 8.0, help = "Minimum expected pass rate in percent")]
    pub pass_rate_min: f64,
    #[arg(long, default_value_t = 25.0, help = "Maximum expected pass rate in percent")]
    pub pass_rate_max: f64,
    #[arg(long, default_value_t = 1.0, help = "Pass rate step in percent")]
    pub pass_rate_step: f64,
    #[arg(long, default_value_t = 100.0)]
    pub price_min: f64,
    #[arg(long, default_value_t = 250.0)]
    pub price_max: f64,
    #[arg(long, default_value_t = 25.0)]
    pub price_step: f64,
    #[arg(long, default_value_t = 1500.0)]
    pub allocation_min: f64,
    #[arg(long, default_value_t = 3000.0)]
    pub allocation_max: f64,
    #[arg(long, default_value_t = 250.0)]
    pub allocation_step: f64,
    #[arg(long, default_value_t = 1000.0)]
    pub payout_size: f64,
    #[arg(
        long,
        default_value_t = 50.0,
        help = "Share of live traders taking a first payout, in percent"
    )]
    pub payout_rate: f64,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Share of each payout kept by the company, in percent"
    )]
    pub company_profit_split: f64,
    #[arg(
        long,
        default_value_t = 2000.0,
        help = "Allocation held fixed across the surface"
    )]
    pub live_allocation: f64,
    #[arg(
        long = "row",
        default_value_t = 0,
        allow_negative_numbers = true,
        help = "Zero-based table row to show in detail"
    )]
    pub selected_row: i64,
}

impl Default for ScenarioArgs {
    fn default() -> Self {
        Self {
            pass_rate_min: 8.0,
            pass_rate_max: 25.0,
            pass_rate_step: 1.0,
            price_min: 100.0,
            price_max: 250.0,
            price_step: 25.0,
            allocation_min: 1500.0,
            allocation_max: 3000.0,
            allocation_step: 250.0,
            payout_size: 1000.0,
            payout_rate: 50.0,
            company_profit_split: 20.0,
            live_allocation: 2000.0,
            selected_row: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ScenarioPayload {
    pass_rate_min: Option<f64>,
    pass_rate_max: Option<f64>,
    pass_rate_step: Option<f64>,
    price_min: Option<f64>,
    price_max: Option<f64>,
    price_step: Option<f64>,
    allocation_min: Option<f64>,
    allocation_max: Option<f64>,
    allocation_step: Option<f64>,
    payout_size: Option<f64>,
    payout_rate: Option<f64>,
    company_profit_split: Option<f64>,
    live_allocation: Option<f64>,
    selected_row: Option<f64>,
}

#[derive(Debug)]
struct ApiRequest {
    args: ScenarioArgs,
    selected_row: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectionField {
    label: &'static str,
    value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TableResponse {
    columns: [&'static str; 10],
    pass_rates: Vec<f64>,
    prices: Vec<f64>,
    allocations: Vec<f64>,
    row_count: usize,
    degenerate_rows: usize,
    rows: Vec<ScenarioRow>,
    selected_row: f64,
    selection: Option<Vec<SelectionField>>,
    selection_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SurfaceResponse {
    axis_labels: [&'static str; 3],
    #[serde(flatten)]
    grid: SurfaceGrid,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Clamps `value` into `bounds` the way the numeric input widgets do.
fn clamp_input(name: &str, value: f64, bounds: (f64, f64)) -> Result<f64, String> {
    if value.is_nan() {
        return Err(format!("--{name} must be a number"));
    }
    let clamped = value.clamp(bounds.0, bounds.1);
    if clamped != value {
        debug!(input = name, value, clamped, "input clamped to allowed range");
    }
    Ok(clamped)
}

fn build_payout_terms(args: &ScenarioArgs) -> Result<PayoutTerms, String> {
    Ok(PayoutTerms {
        payout_size: clamp_input("payout-size", args.payout_size, PAYOUT_SIZE_BOUNDS)?,
        payout_rate: clamp_input("payout-rate", args.payout_rate, PERCENT_BOUNDS)? / 100.0,
        company_profit_split: clamp_input(
            "company-profit-split",
            args.company_profit_split,
            PERCENT_BOUNDS,
        )? / 100.0,
    })
}

fn build_pass_rate_range(args: &ScenarioArgs) -> Result<ParameterRange, String> {
    Ok(ParameterRange::new(
        clamp_input("pass-rate-min", args.pass_rate_min, PASS_RATE_BOUNDS)?,
        clamp_input("pass-rate-max", args.pass_rate_max, PASS_RATE_BOUNDS)?,
        clamp_input("pass-rate-step", args.pass_rate_step, PASS_RATE_STEP_BOUNDS)?,
    ))
}

fn build_price_range(args: &ScenarioArgs) -> Result<ParameterRange, String> {
    Ok(ParameterRange::new(
        clamp_input("price-min", args.price_min, PRICE_BOUNDS)?,
        clamp_input("price-max", args.price_max, PRICE_BOUNDS)?,
        clamp_input("price-step", args.price_step, PRICE_STEP_BOUNDS)?,
    ))
}

pub fn build_sweep_config(args: &ScenarioArgs) -> Result<SweepConfig, String> {
    Ok(SweepConfig {
        pass_rate: build_pass_rate_range(args)?,
        price: build_price_range(args)?,
        allocation: ParameterRange::new(
            clamp_input("allocation-min", args.allocation_min, ALLOCATION_BOUNDS)?,
            clamp_input("allocation-max", args.allocation_max, ALLOCATION_BOUNDS)?,
            clamp_input(
                "allocation-step",
                args.allocation_step,
                ALLOCATION_STEP_BOUNDS,
            )?,
        ),
        payout: build_payout_terms(args)?,
    })
}

pub fn build_surface_config(args: &ScenarioArgs) -> Result<SurfaceConfig, String> {
    Ok(SurfaceConfig {
        pass_rate: build_pass_rate_range(args)?,
        price: build_price_range(args)?,
        live_allocation: clamp_input("live-allocation", args.live_allocation, ALLOCATION_BOUNDS)?,
        payout: build_payout_terms(args)?,
    })
}

/// Runs a CLI subcommand that produces text output.
pub fn run_cli_command(command: &Command) -> Result<String, String> {
    match command {
        Command::Table(args) => {
            let config = build_sweep_config(args)?;
            let table = run_table_sweep(&config).map_err(|e| e.to_string())?;
            let mut out = render_table(&table);
            out.push('\n');
            out.push_str(&render_selection(&table.rows, args.selected_row));
            Ok(out)
        }
        Command::Surface(args) => {
            let config = build_surface_config(args)?;
            let grid = run_surface_sweep(&config).map_err(|e| e.to_string())?;
            Ok(render_surface(&grid))
        }
        Command::Serve { .. } => Err("serve does not produce text output".to_string()),
    }
}

pub fn create_app() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/api/table", get(table_get_handler).post(table_post_handler))
        .route(
            "/api/surface",
            get(surface_get_handler).post(surface_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "margin HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, create_app()).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn table_get_handler(Query(payload): Query<ScenarioPayload>) -> Response {
    table_handler_impl(payload)
}

async fn table_post_handler(Json(payload): Json<ScenarioPayload>) -> Response {
    table_handler_impl(payload)
}

async fn surface_get_handler(Query(payload): Query<ScenarioPayload>) -> Response {
    surface_handler_impl(payload)
}

async fn surface_post_handler(Json(payload): Json<ScenarioPayload>) -> Response {
    surface_handler_impl(payload)
}

fn table_handler_impl(payload: ScenarioPayload) -> Response {
    let ApiRequest { args, selected_row } = api_request_from_payload(payload);
    let table = match build_sweep_config(&args)
        .and_then(|config| run_table_sweep(&config).map_err(|e| e.to_string()))
    {
        Ok(table) => table,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    json_response(
        StatusCode::OK,
        build_table_response(table, selected_row),
    )
}

fn surface_handler_impl(payload: ScenarioPayload) -> Response {
    let ApiRequest { args, .. } = api_request_from_payload(payload);
    let grid = match build_surface_config(&args)
        .and_then(|config| run_surface_sweep(&config).map_err(|e| e.to_string()))
    {
        Ok(grid) => grid,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    json_response(
        StatusCode::OK,
        SurfaceResponse {
            axis_labels: SURFACE_AXIS_LABELS,
            grid,
        },
    )
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<ScenarioPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(api_request_from_payload(payload))
}

// The row arrives as a plain number so that a fractional index is reported
// as an invalid selection instead of failing the whole request.
fn api_request_from_payload(payload: ScenarioPayload) -> ApiRequest {
    let defaults = ScenarioArgs::default();
    let selected_row = payload.selected_row.unwrap_or(defaults.selected_row as f64);
    let args = ScenarioArgs {
        pass_rate_min: payload.pass_rate_min.unwrap_or(defaults.pass_rate_min),
        pass_rate_max: payload.pass_rate_max.unwrap_or(defaults.pass_rate_max),
        pass_rate_step: payload.pass_rate_step.unwrap_or(defaults.pass_rate_step),
        price_min: payload.price_min.unwrap_or(defaults.price_min),
        price_max: payload.price_max.unwrap_or(defaults.price_max),
        price_step: payload.price_step.unwrap_or(defaults.price_step),
        allocation_min: payload.allocation_min.unwrap_or(defaults.allocation_min),
        allocation_max: payload.allocation_max.unwrap_or(defaults.allocation_max),
        allocation_step: payload.allocation_step.unwrap_or(defaults.allocation_step),
        payout_size: payload.payout_size.unwrap_or(defaults.payout_size),
        payout_rate: payload.payout_rate.unwrap_or(defaults.payout_rate),
        company_profit_split: payload
            .company_profit_split
            .unwrap_or(defaults.company_profit_split),
        live_allocation: payload.live_allocation.unwrap_or(defaults.live_allocation),
        selected_row: row_index(selected_row).unwrap_or(defaults.selected_row),
    };
    ApiRequest { args, selected_row }
}

fn row_index(value: f64) -> Option<i64> {
    (value.fract() == 0.0).then_some(value as i64)
}

fn build_table_response(table: TableResult, selected_row: f64) -> TableResponse {
    let selected = row_index(selected_row)
        .ok_or_else(|| format!("Invalid selection: row {selected_row} is not a whole number"))
        .and_then(|index| select_row(&table.rows, index).map_err(|e| e.to_string()));
    let (selection, selection_error) = match selected {
        Ok(row) => (
            Some(
                row.labeled_fields()
                    .into_iter()
                    .map(|(label, value)| SelectionField { label, value })
                    .collect(),
            ),
            None,
        ),
        Err(msg) => (None, Some(msg)),
    };

    TableResponse {
        columns: TABLE_COLUMNS,
        row_count: table.rows.len(),
        degenerate_rows: table.degenerate_rows,
        pass_rates: table.pass_rates,
        prices: table.prices,
        allocations: table.allocations,
        rows: table.rows,
        selected_row,
        selection,
        selection_error,
    }
}
