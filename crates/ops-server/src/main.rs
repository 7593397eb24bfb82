//! HTTP adapter for the optimization engine.
//!
//! One POST route per tool, JSON in / JSON out. Domain failures
//! (infeasible, timeout, no solution) ride inside 200 responses with a
//! status field; malformed or schema-invalid bodies return 422 with
//! `{status, message, details}`. The adapter holds the only process-wide
//! mutable state: two counters (requests served, cumulative solve
//! seconds).

use anyhow::Result;
use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use ops_analysis::{
    analyze_sensitivity, optimize_pareto, optimize_robust, optimize_stochastic,
    prescriptive_advise, ParetoRequest, PrescriptiveRequest, RobustRequest, SensitivityRequest,
    StochasticRequest,
};
use ops_core::packing::PackingRequest;
use ops_core::routing::RoutingRequest;
use ops_core::schedule::{ScheduleRequest, ValidateRequest};
use ops_solve::{solve_packing, solve_routing, solve_schedule, validate_schedule};

#[derive(Parser)]
#[command(author, version, about = "Operations intelligence engine over HTTP", long_about = None)]
struct Opt {
    /// Port to bind (also read from the PORT environment variable).
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[derive(Default)]
struct Counters {
    requests_served: u64,
    total_solve_time_seconds: f64,
}

#[derive(Clone)]
struct AppState {
    counters: Arc<Mutex<Counters>>,
}

impl AppState {
    fn record(&self, solve_seconds: f64) {
        let mut counters = self.counters.lock().expect("counter lock");
        counters.requests_served += 1;
        counters.total_solve_time_seconds += solve_seconds;
    }
}

const TOOLS: [(&str, &str); 9] = [
    ("optimize_schedule", "Flexible job-shop scheduling"),
    ("validate_schedule", "Check a schedule against constraints"),
    ("optimize_routing", "Vehicle routing with time windows"),
    ("optimize_packing", "Multi-dimensional bin packing"),
    ("analyze_sensitivity", "One-at-a-time parameter sensitivity"),
    ("optimize_robust", "Scenario-based robust optimization"),
    ("optimize_stochastic", "Monte-Carlo risk analysis"),
    ("optimize_pareto", "Multi-objective Pareto frontier"),
    ("prescriptive_advise", "Forecast-driven recommendations"),
];

fn validation_error(details: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "status": "validation_error",
            "message": "Request failed validation.",
            "details": details,
        })),
    )
        .into_response()
}

fn ok_response<T: Serialize>(state: &AppState, solve_seconds: f64, body: &T) -> Response {
    state.record(solve_seconds);
    (StatusCode::OK, Json(body)).into_response()
}

async fn root() -> Response {
    let tools: Vec<_> = TOOLS
        .iter()
        .map(|(name, description)| json!({"name": name, "description": description}))
        .collect();
    Json(json!({
        "name": "ops-server",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": tools,
    }))
    .into_response()
}

async fn health(State(state): State<AppState>) -> Response {
    let counters = state.counters.lock().expect("counter lock");
    Json(json!({
        "status": "ok",
        "requests_served": counters.requests_served,
        "total_solve_time_seconds": counters.total_solve_time_seconds,
    }))
    .into_response()
}

async fn optimize_schedule(
    State(state): State<AppState>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = solve_schedule(&request);
    let seconds = response
        .metrics
        .as_ref()
        .map(|m| m.solve_time_seconds)
        .unwrap_or(0.0);
    ok_response(&state, seconds, &response)
}

async fn validate_schedule_handler(
    State(state): State<AppState>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = validate_schedule(&request);
    ok_response(&state, 0.0, &response)
}

async fn optimize_routing(
    State(state): State<AppState>,
    payload: Result<Json<RoutingRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = solve_routing(&request);
    let seconds = response
        .metrics
        .as_ref()
        .map(|m| m.solve_time_seconds)
        .unwrap_or(0.0);
    ok_response(&state, seconds, &response)
}

async fn optimize_packing(
    State(state): State<AppState>,
    payload: Result<Json<PackingRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = solve_packing(&request);
    let seconds = response
        .metrics
        .as_ref()
        .map(|m| m.solve_time_seconds)
        .unwrap_or(0.0);
    ok_response(&state, seconds, &response)
}

async fn sensitivity(
    State(state): State<AppState>,
    payload: Result<Json<SensitivityRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = analyze_sensitivity(&request);
    let seconds = response
        .metrics
        .as_ref()
        .map(|m| m.solve_time_seconds)
        .unwrap_or(0.0);
    ok_response(&state, seconds, &response)
}

async fn robust(
    State(state): State<AppState>,
    payload: Result<Json<RobustRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = optimize_robust(&request);
    let seconds = response
        .metrics
        .as_ref()
        .map(|m| m.solve_time_seconds)
        .unwrap_or(0.0);
    ok_response(&state, seconds, &response)
}

async fn stochastic(
    State(state): State<AppState>,
    payload: Result<Json<StochasticRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = optimize_stochastic(&request);
    let seconds = response
        .metrics
        .as_ref()
        .map(|m| m.solve_time_seconds)
        .unwrap_or(0.0);
    ok_response(&state, seconds, &response)
}

async fn pareto(
    State(state): State<AppState>,
    payload: Result<Json<ParetoRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = optimize_pareto(&request);
    let seconds = response
        .metrics
        .as_ref()
        .map(|m| m.solve_time_seconds)
        .unwrap_or(0.0);
    ok_response(&state, seconds, &response)
}

async fn prescriptive(
    State(state): State<AppState>,
    payload: Result<Json<PrescriptiveRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return validation_error(rejection.body_text()),
    };
    if let Err(err) = request.validate() {
        return validation_error(err.to_string());
    }
    let response = prescriptive_advise(&request);
    let seconds = response.solve_time_seconds;
    ok_response(&state, seconds, &response)
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/optimize_schedule", post(optimize_schedule))
        .route("/validate_schedule", post(validate_schedule_handler))
        .route("/optimize_routing", post(optimize_routing))
        .route("/optimize_packing", post(optimize_packing))
        .route("/analyze_sensitivity", post(sensitivity))
        .route("/optimize_robust", post(robust))
        .route("/optimize_stochastic", post(stochastic))
        .route("/optimize_pareto", post(pareto))
        .route("/prescriptive_advise", post(prescriptive))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let opts = Opt::parse();
    let state = AppState {
        counters: Arc::new(Mutex::new(Counters::default())),
    };

    let addr: SocketAddr = format!("{}:{}", opts.host, opts.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "ops-server listening");
    serve(listener, app(state)).await?;
    Ok(())
}
