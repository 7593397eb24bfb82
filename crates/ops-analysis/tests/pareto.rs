//! Pareto frontier tests

use ops_analysis::pareto::ObjectiveSpec;
use ops_analysis::{optimize_pareto, ParetoRequest, SolverKind};
use serde_json::{json, Value};

fn fjsp_doc() -> Value {
    json!({
        "jobs": [
            {"job_id": "J1", "due_date": 4, "tasks": [
                {"task_id": "a", "duration": 3, "eligible_machines": ["M1"]},
                {"task_id": "b", "duration": 2, "eligible_machines": ["M2"]}
            ]},
            {"job_id": "J2", "due_date": 20, "tasks": [
                {"task_id": "a", "duration": 2, "eligible_machines": ["M1"]},
                {"task_id": "b", "duration": 4, "eligible_machines": ["M2"]}
            ]},
            {"job_id": "J3", "due_date": 5, "tasks": [
                {"task_id": "a", "duration": 2, "eligible_machines": ["M1", "M2"]}
            ]}
        ],
        "machines": [{"machine_id": "M1"}, {"machine_id": "M2"}]
    })
}

fn makespan_vs_tardiness(num_points: usize) -> ParetoRequest {
    ParetoRequest {
        solver_type: SolverKind::Scheduling,
        solver_request: fjsp_doc(),
        objectives: vec![
            ObjectiveSpec {
                name: "minimize_makespan".to_string(),
                weight: 1.0,
            },
            ObjectiveSpec {
                name: "minimize_total_tardiness".to_string(),
                weight: 1.0,
            },
        ],
        num_points,
        max_solve_time_seconds: 5,
    }
}

#[test]
fn test_frontier_nonempty_with_extreme_point() {
    let resp = optimize_pareto(&makespan_vs_tardiness(6));
    assert_eq!(resp.status, "completed", "{}", resp.message);
    assert!(!resp.frontier.is_empty(), "frontier must be non-empty");
    assert!(
        resp.frontier.iter().any(|p| p.is_extreme),
        "at least one extreme point survives"
    );
    for to in &resp.trade_offs {
        assert!(
            ["conflict", "synergy", "independent"].contains(&to.relationship.as_str()),
            "unexpected relationship {}",
            to.relationship
        );
    }
}

#[test]
fn test_point_counting_laws() {
    let resp = optimize_pareto(&makespan_vs_tardiness(8));
    let metrics = resp.metrics.expect("metrics");
    assert!(metrics.points_on_frontier <= metrics.points_feasible);
    assert!(metrics.points_feasible <= metrics.points_generated);
    assert_eq!(metrics.points_generated, 8);
}

#[test]
fn test_frontier_is_non_dominated() {
    let resp = optimize_pareto(&makespan_vs_tardiness(6));
    // Re-check dominance on display values (both objectives minimized).
    for p in &resp.frontier {
        for q in &resp.frontier {
            if p.point_id == q.point_id {
                continue;
            }
            let better_everywhere = q.objectives.iter().all(|(k, qv)| qv <= &p.objectives[k]);
            let strictly = q.objectives.iter().any(|(k, qv)| qv < &p.objectives[k]);
            assert!(
                !(better_everywhere && strictly),
                "frontier point {:?} dominated by {:?}",
                p.objectives,
                q.objectives
            );
        }
    }
}

#[test]
fn test_spread_reported_per_objective() {
    let resp = optimize_pareto(&makespan_vs_tardiness(6));
    let metrics = resp.metrics.expect("metrics");
    assert!(metrics.spread.contains_key("minimize_makespan"));
    assert!(metrics.spread.contains_key("minimize_total_tardiness"));
    for v in metrics.spread.values() {
        assert!(*v >= 0.0);
    }
}

#[test]
fn test_weights_sum_to_one() {
    let resp = optimize_pareto(&makespan_vs_tardiness(7));
    for p in &resp.frontier {
        let sum: f64 = p.weights_used.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_too_few_objectives_rejected() {
    let mut request = makespan_vs_tardiness(6);
    request.objectives.truncate(1);
    let resp = optimize_pareto(&request);
    assert_eq!(resp.status, "error");
}
