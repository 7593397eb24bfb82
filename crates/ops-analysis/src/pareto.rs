//! Multi-objective Pareto frontier enumeration.
//!
//! Weighted-sum scalarization: generate weight vectors (extreme points,
//! the normalized user weights, then evenly spaced or simplex-grid fills),
//! re-solve with the largest-weight objective as the solver's scalar
//! objective, extract every requested objective from each solution, filter
//! dominated points, and analyze pairwise trade-offs.
//!
//! Internally every objective is "smaller is better" (`maximize_*` values
//! are negated during extraction and flipped back for display); the
//! convention never leaves this module.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ops_core::packing::PackingRequest;
use ops_core::routing::RoutingRequest;
use ops_core::schedule::ScheduleRequest;
use ops_core::stats::{pearson, round2, round3};
use ops_core::{OpsError, OpsResult, SolverStatus};
use ops_solve::{solve_packing, solve_routing, solve_schedule};

use crate::dispatch::SolverKind;
use crate::scenario::generate_weight_vectors;
use crate::sensitivity::default_meta_solve_time;

/// One objective participating in the scalarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoRequest {
    pub solver_type: SolverKind,
    /// Solver request without an `objective` field (it is overridden per
    /// weight vector).
    pub solver_request: Value,
    pub objectives: Vec<ObjectiveSpec>,
    #[serde(default = "default_num_points")]
    pub num_points: usize,
    #[serde(default = "default_meta_solve_time")]
    pub max_solve_time_seconds: i64,
}

fn default_num_points() -> usize {
    10
}

impl ParetoRequest {
    pub fn validate(&self) -> OpsResult<()> {
        if !(2..=4).contains(&self.objectives.len()) {
            return Err(OpsError::Validation(
                "objectives must contain 2..=4 entries".into(),
            ));
        }
        if !(3..=50).contains(&self.num_points) {
            return Err(OpsError::Validation("num_points must be in 3..=50".into()));
        }
        if !(1..=60).contains(&self.max_solve_time_seconds) {
            return Err(OpsError::Validation(
                "max_solve_time_seconds must be in 1..=60".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoPoint {
    pub point_id: usize,
    /// Display values: maximization objectives are reported positive.
    #[serde(default)]
    pub objectives: BTreeMap<String, f64>,
    #[serde(default)]
    pub weights_used: BTreeMap<String, f64>,
    pub feasible: bool,
    pub status: String,
    /// True when this point optimizes a single objective.
    #[serde(default)]
    pub is_extreme: bool,
    /// True for the equal-weight balanced solution.
    #[serde(default)]
    pub is_balanced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOff {
    pub objective_a: String,
    pub objective_b: String,
    pub correlation: f64,
    /// range(B) / range(A) across the frontier.
    pub trade_off_ratio: f64,
    /// conflict, synergy, or independent.
    pub relationship: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoMetrics {
    pub points_generated: usize,
    pub points_feasible: usize,
    pub points_on_frontier: usize,
    pub total_solves: usize,
    pub solve_time_seconds: f64,
    #[serde(default)]
    pub spread: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoResponse {
    /// completed or error.
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub frontier: Vec<ParetoPoint>,
    #[serde(default)]
    pub trade_offs: Vec<TradeOff>,
    pub metrics: Option<ParetoMetrics>,
    #[serde(default)]
    pub recommendation: String,
}

impl ParetoResponse {
    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            frontier: Vec::new(),
            trade_offs: Vec::new(),
            metrics: None,
            recommendation: String::new(),
        }
    }
}

/// Known objective names per family, with the solver objective each maps
/// onto when it carries the largest weight.
fn known_objectives(kind: SolverKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        SolverKind::Scheduling => &[
            ("minimize_makespan", "minimize_makespan"),
            ("minimize_total_tardiness", "minimize_total_tardiness"),
            (
                "minimize_total_completion_time",
                "minimize_total_completion_time",
            ),
            ("maximize_machine_utilization", "balance_load"),
        ],
        SolverKind::Routing => &[
            ("minimize_total_distance", "minimize_total_distance"),
            ("minimize_num_vehicles", "minimize_vehicles"),
            ("minimize_longest_route", "balance_routes"),
            ("minimize_total_time", "minimize_total_time"),
        ],
        SolverKind::Packing => &[
            ("minimize_bins", "minimize_bins"),
            ("maximize_items", "maximize_items"),
            ("maximize_value", "maximize_value"),
            ("minimize_waste", "minimize_bins"),
        ],
    }
}

/// Internal ("smaller is better") objective values from one typed solve.
enum FamilyMetrics {
    Scheduling(ops_core::schedule::ScheduleMetrics),
    Routing(ops_core::routing::RoutingMetrics),
    Packing(ops_core::packing::PackingMetrics),
}

fn internal_value(metrics: &FamilyMetrics, objective: &str) -> f64 {
    match metrics {
        FamilyMetrics::Scheduling(m) => match objective {
            "minimize_makespan" => m.makespan as f64,
            "minimize_total_tardiness" => m.total_tardiness as f64,
            "minimize_total_completion_time" => m.total_completion_time as f64,
            "maximize_machine_utilization" => -m.avg_machine_utilization_pct,
            _ => 0.0,
        },
        FamilyMetrics::Routing(m) => match objective {
            "minimize_total_distance" => m.total_distance as f64,
            "minimize_num_vehicles" => m.vehicles_used as f64,
            "minimize_longest_route" => m.max_route_distance as f64,
            "minimize_total_time" => m.total_time as f64,
            _ => 0.0,
        },
        FamilyMetrics::Packing(m) => match objective {
            "minimize_bins" => m.bins_used as f64,
            "maximize_items" => -(m.items_packed as f64),
            "maximize_value" => -(m.total_value_packed as f64),
            "minimize_waste" => m.total_waste_pct,
            _ => 0.0,
        },
    }
}

fn solve_with_objective(
    kind: SolverKind,
    base: &Value,
    solver_objective: &str,
    max_time: i64,
) -> OpsResult<(SolverStatus, Option<FamilyMetrics>)> {
    let mut doc = base.clone();
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| OpsError::Parse("solver_request must be a JSON object".into()))?;
    obj.insert("objective".to_string(), Value::from(solver_objective));
    obj.insert("max_solve_time_seconds".to_string(), Value::from(max_time));

    match kind {
        SolverKind::Scheduling => {
            let request: ScheduleRequest = serde_json::from_value(doc)
                .map_err(|e| OpsError::Parse(format!("invalid scheduling request: {e}")))?;
            request.validate()?;
            let response = solve_schedule(&request);
            Ok((
                response.status,
                response.metrics.map(FamilyMetrics::Scheduling),
            ))
        }
        SolverKind::Routing => {
            let request: RoutingRequest = serde_json::from_value(doc)
                .map_err(|e| OpsError::Parse(format!("invalid routing request: {e}")))?;
            request.validate()?;
            let response = solve_routing(&request);
            Ok((response.status, response.metrics.map(FamilyMetrics::Routing)))
        }
        SolverKind::Packing => {
            let request: PackingRequest = serde_json::from_value(doc)
                .map_err(|e| OpsError::Parse(format!("invalid packing request: {e}")))?;
            request.validate()?;
            let response = solve_packing(&request);
            Ok((response.status, response.metrics.map(FamilyMetrics::Packing)))
        }
    }
}

/// Whether `a` is dominated by `b`: `b` at least as good everywhere and
/// strictly better somewhere (internal sign convention).
fn dominated_by(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> bool {
    let mut at_least_as_good = true;
    let mut strictly_better = false;
    for (key, &a_val) in a {
        let b_val = b.get(key).copied().unwrap_or(0.0);
        if b_val > a_val {
            at_least_as_good = false;
        }
        if b_val < a_val {
            strictly_better = true;
        }
    }
    at_least_as_good && strictly_better
}

fn to_display(internal: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    internal
        .iter()
        .map(|(k, &v)| {
            if k.starts_with("maximize_") {
                (k.clone(), -v)
            } else {
                (k.clone(), v)
            }
        })
        .collect()
}

/// Run multi-objective Pareto optimization.
pub fn optimize_pareto(request: &ParetoRequest) -> ParetoResponse {
    let t0 = Instant::now();
    if let Err(err) = request.validate() {
        return ParetoResponse::error(err.to_string());
    }

    let registry = known_objectives(request.solver_type);
    for obj in &request.objectives {
        if !registry.iter().any(|(name, _)| *name == obj.name) {
            let available: Vec<&str> = registry.iter().map(|(name, _)| *name).collect();
            return ParetoResponse::error(format!(
                "Unknown objective '{}' for this solver. Available: {:?}",
                obj.name, available
            ));
        }
    }

    let pairs: Vec<(String, f64)> = request
        .objectives
        .iter()
        .map(|o| (o.name.clone(), o.weight))
        .collect();
    let weights = generate_weight_vectors(&pairs, request.num_points);

    let mut total_solves = 0_usize;
    let mut internal_points: Vec<(usize, BTreeMap<String, f64>)> = Vec::new();
    let mut all_points: Vec<ParetoPoint> = Vec::new();

    for (idx, w) in weights.iter().enumerate() {
        let primary = w
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        let solver_objective = registry
            .iter()
            .find(|(name, _)| *name == primary)
            .map(|(_, solver)| *solver)
            .unwrap_or(primary.as_str());

        let solved = solve_with_objective(
            request.solver_type,
            &request.solver_request,
            solver_objective,
            request.max_solve_time_seconds,
        );

        let is_extreme = w.values().any(|&v| v >= 0.99);
        let n = request.objectives.len() as f64;
        let is_balanced = w.values().all(|&v| (v - 1.0 / n).abs() < 0.05);

        match solved {
            Ok((status, metrics)) => {
                total_solves += 1;
                let feasible = status.is_feasible() && metrics.is_some();
                let internal: BTreeMap<String, f64> = match (&metrics, feasible) {
                    (Some(m), true) => request
                        .objectives
                        .iter()
                        .map(|o| (o.name.clone(), internal_value(m, &o.name)))
                        .collect(),
                    _ => request
                        .objectives
                        .iter()
                        .map(|o| (o.name.clone(), 0.0))
                        .collect(),
                };
                if feasible {
                    internal_points.push((idx, internal.clone()));
                }
                all_points.push(ParetoPoint {
                    point_id: idx,
                    objectives: to_display(&internal),
                    weights_used: w.clone(),
                    feasible,
                    status: status.to_string(),
                    is_extreme,
                    is_balanced,
                });
            }
            Err(err) => {
                tracing::warn!(point = idx, error = %err, "pareto solve failed");
                all_points.push(ParetoPoint {
                    point_id: idx,
                    objectives: request
                        .objectives
                        .iter()
                        .map(|o| (o.name.clone(), 0.0))
                        .collect(),
                    weights_used: w.clone(),
                    feasible: false,
                    status: "error".to_string(),
                    is_extreme,
                    is_balanced,
                });
            }
        }
    }

    let points_feasible = internal_points.len();
    if points_feasible == 0 {
        let mut resp = ParetoResponse::error(
            "No feasible solution found for any weight combination.".to_string(),
        );
        resp.frontier = all_points;
        return resp;
    }

    // Non-dominance filter over the feasible points.
    let frontier_ids: Vec<usize> = internal_points
        .iter()
        .filter(|(id, objs)| {
            !internal_points
                .iter()
                .any(|(other_id, other)| other_id != id && dominated_by(objs, other))
        })
        .map(|(id, _)| *id)
        .collect();
    let frontier: Vec<ParetoPoint> = all_points
        .iter()
        .filter(|p| frontier_ids.contains(&p.point_id))
        .cloned()
        .collect();

    // Pairwise trade-offs on frontier display values.
    let obj_names: Vec<&str> = request.objectives.iter().map(|o| o.name.as_str()).collect();
    let mut trade_offs = Vec::new();
    for i in 0..obj_names.len() {
        for j in i + 1..obj_names.len() {
            let a_vals: Vec<f64> = frontier
                .iter()
                .map(|p| p.objectives.get(obj_names[i]).copied().unwrap_or(0.0))
                .collect();
            let b_vals: Vec<f64> = frontier
                .iter()
                .map(|p| p.objectives.get(obj_names[j]).copied().unwrap_or(0.0))
                .collect();
            if a_vals.len() < 2 {
                continue;
            }
            let corr = pearson(&a_vals, &b_vals);
            let range_a = a_vals.iter().cloned().fold(f64::MIN, f64::max)
                - a_vals.iter().cloned().fold(f64::MAX, f64::min);
            let range_b = b_vals.iter().cloned().fold(f64::MIN, f64::max)
                - b_vals.iter().cloned().fold(f64::MAX, f64::min);
            let ratio = if range_a > 0.0 { range_b / range_a } else { 0.0 };
            let relationship = if corr < -0.3 {
                "conflict"
            } else if corr > 0.3 {
                "synergy"
            } else {
                "independent"
            };
            trade_offs.push(TradeOff {
                objective_a: obj_names[i].to_string(),
                objective_b: obj_names[j].to_string(),
                correlation: round3(corr),
                trade_off_ratio: round3(ratio),
                relationship: relationship.to_string(),
            });
        }
    }

    let mut spread = BTreeMap::new();
    for name in &obj_names {
        let vals: Vec<f64> = frontier
            .iter()
            .map(|p| p.objectives.get(*name).copied().unwrap_or(0.0))
            .collect();
        let s = if vals.is_empty() {
            0.0
        } else {
            vals.iter().cloned().fold(f64::MIN, f64::max)
                - vals.iter().cloned().fold(f64::MAX, f64::min)
        };
        spread.insert(name.to_string(), round2(s));
    }

    let metrics = ParetoMetrics {
        points_generated: all_points.len(),
        points_feasible,
        points_on_frontier: frontier.len(),
        total_solves,
        solve_time_seconds: round3(t0.elapsed().as_secs_f64()),
        spread: spread.clone(),
    };

    let mut rec_parts: Vec<String> = Vec::new();
    for to in &trade_offs {
        match to.relationship.as_str() {
            "conflict" => rec_parts.push(format!(
                "{} and {} are in conflict (correlation: {:.2}). Improving one degrades \
                 the other.",
                to.objective_a, to.objective_b, to.correlation
            )),
            "synergy" => rec_parts.push(format!(
                "{} and {} show synergy (correlation: {:.2}). They can be improved together.",
                to.objective_a, to.objective_b, to.correlation
            )),
            _ => rec_parts.push(format!(
                "{} and {} are largely independent.",
                to.objective_a, to.objective_b
            )),
        }
    }
    for point in frontier.iter().filter(|p| p.is_extreme) {
        if let Some((primary, _)) = point
            .weights_used
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        {
            let values: Vec<String> = point
                .objectives
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            rec_parts.push(format!(
                "Optimizing only {primary}: {}.",
                values.join(", ")
            ));
        }
    }
    let recommendation = if rec_parts.is_empty() {
        "Pareto frontier generated. Review the trade-off points to choose the best compromise."
            .to_string()
    } else {
        rec_parts.join(" ")
    };

    let spread_text: Vec<String> = spread.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    let message = format!(
        "Pareto analysis completed in {:.1}s. {} non-dominated solutions found from {} \
         solves. Objectives: {}. Spread: {}.",
        metrics.solve_time_seconds,
        metrics.points_on_frontier,
        total_solves,
        obj_names.join(", "),
        spread_text.join(", ")
    );

    ParetoResponse {
        status: "completed".to_string(),
        message,
        frontier,
        trade_offs,
        metrics: Some(metrics),
        recommendation,
    }
}
