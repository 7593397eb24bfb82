//! Scenario-based robust optimization.
//!
//! Generates scenarios from per-parameter uncertainty ranges (always
//! including the nominal and both corners), solves each, and selects a
//! protective scenario per the requested mode: worst case, 90th/95th
//! percentile, or minimum regret (closest to the mean). The price of
//! robustness is the relative degradation from the nominal objective to
//! the selected one.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ops_core::stats::{mean, percentile, round1, round2, round3, std_dev};

use crate::dispatch::SolverKind;
use crate::scenario::{
    generate_robust_scenarios, resolve_nominals, run_scenarios, Scenario, UncertainParameter,
};
use crate::sensitivity::default_meta_solve_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobustMode {
    WorstCase,
    Percentile90,
    Percentile95,
    RegretMinimization,
}

impl Default for RobustMode {
    fn default() -> Self {
        RobustMode::WorstCase
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustRequest {
    pub solver_type: SolverKind,
    pub solver_request: Value,
    pub uncertain_parameters: Vec<UncertainParameter>,
    #[serde(default)]
    pub mode: RobustMode,
    #[serde(default = "default_num_scenarios")]
    pub num_scenarios: usize,
    #[serde(default = "default_meta_solve_time")]
    pub max_solve_time_seconds: i64,
    /// Seed for the uniform scenario fill; fixed default keeps runs
    /// reproducible across invocations.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_num_scenarios() -> usize {
    20
}

fn default_seed() -> u64 {
    42
}

impl RobustRequest {
    pub fn validate(&self) -> ops_core::OpsResult<()> {
        if self.uncertain_parameters.is_empty() {
            return Err(ops_core::OpsError::Validation(
                "uncertain_parameters must not be empty".into(),
            ));
        }
        if !(5..=100).contains(&self.num_scenarios) {
            return Err(ops_core::OpsError::Validation(
                "num_scenarios must be in 5..=100".into(),
            ));
        }
        if !(1..=60).contains(&self.max_solve_time_seconds) {
            return Err(ops_core::OpsError::Validation(
                "max_solve_time_seconds must be in 1..=60".into(),
            ));
        }
        for p in &self.uncertain_parameters {
            p.validate()?;
        }
        Ok(())
    }
}

/// One evaluated scenario, with nominal/worst-case markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_id: usize,
    #[serde(default)]
    pub parameter_values: Scenario,
    pub objective_value: f64,
    pub feasible: bool,
    pub status: String,
    #[serde(default)]
    pub is_worst_case: bool,
    #[serde(default)]
    pub is_nominal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustSolution {
    pub objective_value: f64,
    /// Which selection produced this solution.
    pub scenario_used: String,
    #[serde(default)]
    pub parameter_values: Scenario,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustMetrics {
    pub nominal_objective: f64,
    pub worst_case_objective: f64,
    pub best_case_objective: f64,
    pub robust_objective: f64,
    pub price_of_robustness_pct: f64,
    pub feasibility_rate_pct: f64,
    pub scenarios_evaluated: usize,
    pub total_solves: usize,
    pub solve_time_seconds: f64,
    pub percentile_90_objective: f64,
    pub percentile_95_objective: f64,
    pub objective_std_dev: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustResponse {
    /// completed or error.
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub objective_name: String,
    pub robust_solution: Option<RobustSolution>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioResult>,
    pub metrics: Option<RobustMetrics>,
    #[serde(default)]
    pub recommendation: String,
}

impl RobustResponse {
    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            objective_name: String::new(),
            robust_solution: None,
            scenarios: Vec::new(),
            metrics: None,
            recommendation: String::new(),
        }
    }
}

/// Run scenario-based robust optimization.
pub fn optimize_robust(request: &RobustRequest) -> RobustResponse {
    let t0 = Instant::now();
    if let Err(err) = request.validate() {
        return RobustResponse::error(err.to_string());
    }

    let doc = &request.solver_request;
    let (nominals, integer) = match resolve_nominals(
        doc,
        request
            .uncertain_parameters
            .iter()
            .map(|p| (p.parameter_path.clone(), p.nominal_value)),
    ) {
        Ok(pair) => pair,
        Err(err) => {
            return RobustResponse::error(format!("Cannot resolve parameter: {err}"));
        }
    };

    let scenarios = generate_robust_scenarios(
        &request.uncertain_parameters,
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

    let mut results: Vec<ScenarioResult> = outcomes
        .into_iter()
        .map(|o| ScenarioResult {
            is_nominal: o.scenario_id == 0,
            is_worst_case: false,
            scenario_id: o.scenario_id,
            parameter_values: o.parameter_values,
            objective_value: o.objective_value,
            feasible: o.feasible,
            status: o.status,
        })
        .collect();

    if feasible_objectives.is_empty() {
        let mut resp = RobustResponse::error(
            "No feasible scenario found. The problem may be too constrained even under \
             nominal conditions."
                .to_string(),
        );
        resp.scenarios = results;
        return resp;
    }

    let mut sorted = feasible_objectives.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let best_obj = sorted[0];
    let worst_obj = sorted[sorted.len() - 1];
    let p90 = percentile(&sorted, 90.0);
    let p95 = percentile(&sorted, 95.0);
    let mean_obj = mean(&sorted);
    let obj_std = round2(std_dev(&sorted));

    let nominal_obj = results
        .first()
        .filter(|r| r.feasible)
        .map(|r| r.objective_value);

    let (target, label) = match request.mode {
        RobustMode::WorstCase => (worst_obj, "worst-case scenario"),
        RobustMode::Percentile90 => (p90, "90th percentile scenario"),
        RobustMode::Percentile95 => (p95, "95th percentile scenario"),
        RobustMode::RegretMinimization => {
            let closest = sorted
                .iter()
                .copied()
                .min_by(|a, b| {
                    (a - mean_obj)
                        .abs()
                        .partial_cmp(&(b - mean_obj).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(worst_obj);
            (closest, "minimum-regret scenario")
        }
    };

    // Interpolated percentile targets may fall between scenario objectives;
    // pick the feasible scenario closest to the target.
    let robust_idx = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.feasible)
        .min_by(|(_, a), (_, b)| {
            (a.objective_value - target)
                .abs()
                .partial_cmp(&(b.objective_value - target).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    for r in results.iter_mut() {
        if r.feasible && r.objective_value == worst_obj {
            r.is_worst_case = true;
        }
    }

    let robust_obj = results[robust_idx].objective_value;
    let robust_solution = RobustSolution {
        objective_value: robust_obj,
        scenario_used: label.to_string(),
        parameter_values: results[robust_idx].parameter_values.clone(),
    };

    let price_pct = match nominal_obj {
        Some(nominal) if nominal > 0.0 => round2((robust_obj - nominal) / nominal * 100.0),
        _ => 0.0,
    };
    let feasibility_rate = round1(feasible_objectives.len() as f64 / results.len() as f64 * 100.0);

    let metrics = RobustMetrics {
        nominal_objective: nominal_obj.unwrap_or(0.0),
        worst_case_objective: worst_obj,
        best_case_objective: best_obj,
        robust_objective: robust_obj,
        price_of_robustness_pct: price_pct,
        feasibility_rate_pct: feasibility_rate,
        scenarios_evaluated: results.len(),
        total_solves,
        solve_time_seconds: round3(t0.elapsed().as_secs_f64()),
        percentile_90_objective: round2(p90),
        percentile_95_objective: round2(p95),
        objective_std_dev: obj_std,
    };

    let mut rec_parts = Vec::new();
    if price_pct <= 5.0 {
        rec_parts.push(format!(
            "The robust solution costs only {price_pct:.1}% more than nominal - strongly \
             recommended."
        ));
    } else if price_pct <= 15.0 {
        rec_parts.push(format!(
            "The robust solution costs {price_pct:.1}% more than nominal - a reasonable \
             insurance premium."
        ));
    } else {
        rec_parts.push(format!(
            "The robust solution costs {price_pct:.1}% more than nominal - significant \
             premium. Consider tightening uncertainty ranges."
        ));
    }
    if feasibility_rate < 80.0 {
        rec_parts.push(format!(
            "Only {feasibility_rate:.0}% of scenarios are feasible. The system is fragile \
             under uncertainty."
        ));
    } else if feasibility_rate < 95.0 {
        rec_parts.push(format!(
            "~{feasibility_rate:.0}% of scenarios are feasible. Some edge cases cause \
             infeasibility."
        ));
    } else {
        rec_parts.push(format!(
            "{feasibility_rate:.0}% of scenarios are feasible. The system is robust."
        ));
    }
    if obj_std > 0.0 && mean_obj > 0.0 {
        let cv = obj_std / mean_obj * 100.0;
        if cv > 20.0 {
            rec_parts.push(format!(
                "High variability (CV={cv:.0}%). Outcome depends heavily on uncertain \
                 parameters."
            ));
        } else if cv > 10.0 {
            rec_parts.push(format!(
                "Moderate variability (CV={cv:.0}%). Some sensitivity to parameter changes."
            ));
        } else {
            rec_parts.push(format!(
                "Low variability (CV={cv:.0}%). Solution is stable across scenarios."
            ));
        }
    }

    let objective_name = request.solver_type.objective_name().to_string();
    let message = format!(
        "Robust analysis completed in {:.1}s. {} scenarios evaluated ({} solves). \
         Nominal {}: {}. Worst-case: {}. Robust ({}): {}. Price of robustness: {:.1}%.",
        metrics.solve_time_seconds,
        results.len(),
        total_solves,
        objective_name,
        nominal_obj.map_or_else(|| "N/A".to_string(), |v| v.to_string()),
        worst_obj,
        label,
        robust_obj,
        price_pct
    );

    RobustResponse {
        status: "completed".to_string(),
        message,
        objective_name,
        robust_solution: Some(robust_solution),
        scenarios: results,
        metrics: Some(metrics),
        recommendation: rec_parts.join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_mode_default_is_worst_case() {
        assert_eq!(RobustMode::default(), RobustMode::WorstCase);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let p = UncertainParameter {
            parameter_path: "p".to_string(),
            min_value: 10.0,
            max_value: 5.0,
            nominal_value: None,
        };
        assert!(p.validate().is_err());
    }

    fn outcome(id: usize, obj: f64, feasible: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_id: id,
            parameter_values: BTreeMap::new(),
            objective_value: obj,
            feasible,
            status: if feasible { "feasible" } else { "infeasible" }.to_string(),
            is_worst_case: false,
            is_nominal: id == 0,
        }
    }

    #[test]
    fn test_scenario_result_markers() {
        let results = [outcome(0, 10.0, true), outcome(1, 20.0, true)];
        assert!(results[0].is_nominal);
        assert!(!results[1].is_nominal);
    }
}
