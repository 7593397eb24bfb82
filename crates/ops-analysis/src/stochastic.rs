//! Monte-Carlo stochastic optimization with probabilistic risk metrics.
//!
//! Samples N scenarios from per-parameter distributions (request-seeded,
//! fully reproducible), solves each, and summarizes the objective
//! distribution: percentiles, skewness, coefficient of variation, Value at
//! Risk and Conditional Value at Risk at 90/95/99, plus a recommended
//! scenario closest to the requested risk metric.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ops_core::stats::{cvar, mean, percentile, round1, round2, round3, skewness, std_dev};

use crate::dispatch::SolverKind;
use crate::scenario::{
    generate_stochastic_scenarios, resolve_nominals, run_scenarios, ScenarioOutcome,
    StochasticParameter,
};
use crate::sensitivity::default_meta_solve_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMetric {
    ExpectedValue,
    Cvar90,
    Cvar95,
    Cvar99,
    WorstCase,
}

impl Default for RiskMetric {
    fn default() -> Self {
        RiskMetric::Cvar95
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticRequest {
    pub solver_type: SolverKind,
    pub solver_request: Value,
    pub stochastic_parameters: Vec<StochasticParameter>,
    #[serde(default)]
    pub optimize_for: RiskMetric,
    #[serde(default = "default_num_scenarios")]
    pub num_scenarios: usize,
    #[serde(default = "default_meta_solve_time")]
    pub max_solve_time_seconds: i64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_num_scenarios() -> usize {
    50
}

fn default_seed() -> u64 {
    42
}

impl StochasticRequest {
    pub fn validate(&self) -> ops_core::OpsResult<()> {
        if self.stochastic_parameters.is_empty() {
            return Err(ops_core::OpsError::Validation(
                "stochastic_parameters must not be empty".into(),
            ));
        }
        if !(10..=500).contains(&self.num_scenarios) {
            return Err(ops_core::OpsError::Validation(
                "num_scenarios must be in 10..=500".into(),
            ));
        }
        if !(1..=60).contains(&self.max_solve_time_seconds) {
            return Err(ops_core::OpsError::Validation(
                "max_solve_time_seconds must be in 1..=60".into(),
            ));
        }
        for p in &self.stochastic_parameters {
            p.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub percentile_5: f64,
    pub percentile_10: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub percentile_90: f64,
    pub percentile_95: f64,
    pub percentile_99: f64,
    /// Positive = tail toward worse outcomes.
    pub skewness: f64,
    /// Std dev / mean, in percent.
    pub coefficient_of_variation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub expected_value: f64,
    pub var_90: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_90: f64,
    pub cvar_95: f64,
    pub cvar_99: f64,
    pub worst_case: f64,
    pub best_case: f64,
    /// Percent of scenarios that were infeasible.
    pub probability_of_infeasibility: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticMetrics {
    pub scenarios_generated: usize,
    pub scenarios_feasible: usize,
    pub scenarios_infeasible: usize,
    pub total_solves: usize,
    pub solve_time_seconds: f64,
    pub optimized_for: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticResponse {
    /// completed or error.
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub objective_name: String,
    #[serde(default)]
    pub recommended_objective: f64,
    pub recommended_scenario: Option<ScenarioOutcome>,
    pub distribution: Option<DistributionSummary>,
    pub risk: Option<RiskAnalysis>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioOutcome>,
    pub metrics: Option<StochasticMetrics>,
    #[serde(default)]
    pub recommendation: String,
}

impl StochasticResponse {
    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            objective_name: String::new(),
            recommended_objective: 0.0,
            recommended_scenario: None,
            distribution: None,
            risk: None,
            scenarios: Vec::new(),
            metrics: None,
            recommendation: String::new(),
        }
    }
}

/// Run Monte-Carlo stochastic optimization.
pub fn optimize_stochastic(request: &StochasticRequest) -> StochasticResponse {
    let t0 = Instant::now();
    if let Err(err) = request.validate() {
        return StochasticResponse::error(err.to_string());
    }

    let doc = &request.solver_request;
    let (nominals, integer) = match resolve_nominals(
        doc,
        request
            .stochastic_parameters
            .iter()
            .map(|p| (p.parameter_path.clone(), None)),
    ) {
        Ok(pair) => pair,
        Err(err) => {
            return StochasticResponse::error(format!("Cannot resolve parameter: {err}"));
        }
    };

    let scenarios = generate_stochastic_scenarios(
        &request.stochastic_parameters,
        &nominals,
        &integer,
        request.num_scenarios,
        request.seed,
    );

    let (outcomes, feasible_objectives, total_solves) = run_scenarios(
        request.solver_type,
        doc,
        &scenarios,
        request.max_solve_time_seconds,
    );

    if feasible_objectives.is_empty() {
        let mut resp = StochasticResponse::error(
            "No feasible scenario found across all Monte Carlo samples.".to_string(),
        );
        resp.scenarios = outcomes;
        return resp;
    }

    let mut sorted = feasible_objectives.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let mean_obj = mean(&sorted);
    let sd = std_dev(&sorted);

    let distribution = DistributionSummary {
        mean: round2(mean_obj),
        median: round2(percentile(&sorted, 50.0)),
        std_dev: round2(sd),
        min_value: round2(sorted[0]),
        max_value: round2(sorted[n - 1]),
        percentile_5: round2(percentile(&sorted, 5.0)),
        percentile_10: round2(percentile(&sorted, 10.0)),
        percentile_25: round2(percentile(&sorted, 25.0)),
        percentile_75: round2(percentile(&sorted, 75.0)),
        percentile_90: round2(percentile(&sorted, 90.0)),
        percentile_95: round2(percentile(&sorted, 95.0)),
        percentile_99: round2(percentile(&sorted, 99.0)),
        skewness: round3(skewness(&sorted, mean_obj, sd)),
        coefficient_of_variation: if mean_obj > 0.0 {
            round1(sd / mean_obj * 100.0)
        } else {
            0.0
        },
    };

    let risk = RiskAnalysis {
        expected_value: round2(mean_obj),
        var_90: round2(percentile(&sorted, 90.0)),
        var_95: round2(percentile(&sorted, 95.0)),
        var_99: round2(percentile(&sorted, 99.0)),
        cvar_90: round2(cvar(&sorted, 90.0)),
        cvar_95: round2(cvar(&sorted, 95.0)),
        cvar_99: round2(cvar(&sorted, 99.0)),
        worst_case: round2(sorted[n - 1]),
        best_case: round2(sorted[0]),
        probability_of_infeasibility: round1(
            (outcomes.len() - n) as f64 / outcomes.len() as f64 * 100.0,
        ),
    };

    let (target, label) = match request.optimize_for {
        RiskMetric::ExpectedValue => (mean_obj, "expected value"),
        RiskMetric::Cvar90 => (risk.cvar_90, "CVaR 90%"),
        RiskMetric::Cvar95 => (risk.cvar_95, "CVaR 95%"),
        RiskMetric::Cvar99 => (risk.cvar_99, "CVaR 99%"),
        RiskMetric::WorstCase => (risk.worst_case, "worst case"),
    };

    let recommended_scenario = outcomes
        .iter()
        .filter(|o| o.feasible)
        .min_by(|a, b| {
            (a.objective_value - target)
                .abs()
                .partial_cmp(&(b.objective_value - target).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned();

    let objective_name = request.solver_type.objective_name().to_string();
    let cv = distribution.coefficient_of_variation;
    let mut rec_parts = Vec::new();
    if cv < 5.0 {
        rec_parts.push(format!(
            "Very stable: CV={cv:.1}%. The {objective_name} varies minimally across \
             scenarios. The deterministic solution is reliable."
        ));
    } else if cv < 15.0 {
        rec_parts.push(format!(
            "Moderate variability: CV={cv:.1}%. The {objective_name} ranges from {} to {}. \
             Consider using the {label} solution for safety.",
            risk.best_case, risk.worst_case
        ));
    } else if cv < 30.0 {
        rec_parts.push(format!(
            "High variability: CV={cv:.1}%. The {objective_name} ranges from {} to {}. \
             Risk-aware planning strongly recommended.",
            risk.best_case, risk.worst_case
        ));
    } else {
        rec_parts.push(format!(
            "Extreme variability: CV={cv:.1}%. The {objective_name} ranges from {} to {}. \
             The system is highly sensitive to uncertain parameters.",
            risk.best_case, risk.worst_case
        ));
    }
    if risk.probability_of_infeasibility > 0.0 {
        rec_parts.push(format!(
            "{:.1}% of scenarios are infeasible. Consider relaxing constraints or adding \
             capacity buffer.",
            risk.probability_of_infeasibility
        ));
    }
    let gap_pct = if risk.expected_value > 0.0 {
        round1((risk.cvar_95 - risk.expected_value) / risk.expected_value * 100.0)
    } else {
        0.0
    };
    rec_parts.push(format!(
        "The gap between expected value ({}) and CVaR 95% ({}) is {gap_pct}%. This is the \
         'risk premium' - what you pay for 95% protection.",
        risk.expected_value, risk.cvar_95
    ));

    let metrics = StochasticMetrics {
        scenarios_generated: outcomes.len(),
        scenarios_feasible: n,
        scenarios_infeasible: outcomes.len() - n,
        total_solves,
        solve_time_seconds: round3(t0.elapsed().as_secs_f64()),
        optimized_for: label.to_string(),
    };

    let message = format!(
        "Stochastic analysis completed in {:.1}s. {} Monte Carlo scenarios ({} feasible, \
         {} infeasible). Expected {}: {}. CVaR 95%: {}. Range: [{}, {}].",
        metrics.solve_time_seconds,
        outcomes.len(),
        n,
        outcomes.len() - n,
        objective_name,
        risk.expected_value,
        risk.cvar_95,
        risk.best_case,
        risk.worst_case
    );

    StochasticResponse {
        status: "completed".to_string(),
        message,
        objective_name,
        recommended_objective: round2(target),
        recommended_scenario,
        distribution: Some(distribution),
        risk: Some(risk),
        scenarios: outcomes,
        metrics: Some(metrics),
        recommendation: rec_parts.join(" "),
    }
}
