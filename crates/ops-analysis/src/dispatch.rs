//! Narrow solver-dispatch capability for the meta-engines.
//!
//! Every uncertainty engine consumes the Layer-1 solvers through one seam:
//! `solve_document` takes a solver family, an untyped request document, and
//! a per-solve time budget, and returns the outcome triple (status, scalar
//! objective, objective name). The canonical objective per family is
//! makespan / total_distance / bins_used; Pareto has its own wider
//! extraction registry on top of the typed responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ops_core::packing::PackingRequest;
use ops_core::routing::RoutingRequest;
use ops_core::schedule::ScheduleRequest;
use ops_core::{OpsError, OpsResult, SolverStatus};
use ops_solve::{solve_packing, solve_routing, solve_schedule};

/// Which Layer-1 solver a meta-request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    Scheduling,
    Routing,
    Packing,
}

impl SolverKind {
    pub fn objective_name(self) -> &'static str {
        match self {
            SolverKind::Scheduling => "makespan",
            SolverKind::Routing => "total_distance",
            SolverKind::Packing => "bins_used",
        }
    }
}

/// Result of one dispatched solve.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolverStatus,
    pub objective: f64,
    pub objective_name: &'static str,
}

impl SolveOutcome {
    pub fn feasible(&self) -> bool {
        self.status.is_feasible()
    }
}

/// Deserialize the document into the family's request, clamp the per-solve
/// time budget, solve, and extract the canonical objective.
pub fn solve_document(kind: SolverKind, doc: &Value, max_time: i64) -> OpsResult<SolveOutcome> {
    let mut doc = doc.clone();
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("max_solve_time_seconds".to_string(), Value::from(max_time));
    } else {
        return Err(OpsError::Parse("solver_request must be a JSON object".into()));
    }

    match kind {
        SolverKind::Scheduling => {
            let request: ScheduleRequest = serde_json::from_value(doc)
                .map_err(|e| OpsError::Parse(format!("invalid scheduling request: {e}")))?;
            request.validate()?;
            let response = solve_schedule(&request);
            Ok(SolveOutcome {
                status: response.status,
                objective: response
                    .metrics
                    .map(|m| m.makespan as f64)
                    .unwrap_or(0.0),
                objective_name: kind.objective_name(),
            })
        }
        SolverKind::Routing => {
            let request: RoutingRequest = serde_json::from_value(doc)
                .map_err(|e| OpsError::Parse(format!("invalid routing request: {e}")))?;
            request.validate()?;
            let response = solve_routing(&request);
            Ok(SolveOutcome {
                status: response.status,
                objective: response
                    .metrics
                    .map(|m| m.total_distance as f64)
                    .unwrap_or(0.0),
                objective_name: kind.objective_name(),
            })
        }
        SolverKind::Packing => {
            let request: PackingRequest = serde_json::from_value(doc)
                .map_err(|e| OpsError::Parse(format!("invalid packing request: {e}")))?;
            request.validate()?;
            let response = solve_packing(&request);
            Ok(SolveOutcome {
                status: response.status,
                objective: response
                    .metrics
                    .map(|m| m.bins_used as f64)
                    .unwrap_or(0.0),
                objective_name: kind.objective_name(),
            })
        }
    }
}
