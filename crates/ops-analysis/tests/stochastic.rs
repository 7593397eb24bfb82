//! Monte-Carlo stochastic optimization tests

use ops_analysis::scenario::{DistributionType, StochasticParameter};
use ops_analysis::{optimize_stochastic, RiskMetric, SolverKind, StochasticRequest};
use serde_json::{json, Value};

fn fjsp_doc() -> Value {
    json!({
        "jobs": [
            {"job_id": "J1", "tasks": [
                {"task_id": "cut", "duration": 30, "eligible_machines": ["M1"]},
                {"task_id": "weld", "duration": 10, "eligible_machines": ["M2"]}
            ]}
        ],
        "machines": [{"machine_id": "M1"}, {"machine_id": "M2"}]
    })
}

fn normal_duration_request(seed: u64, num_scenarios: usize) -> StochasticRequest {
    StochasticRequest {
        solver_type: SolverKind::Scheduling,
        solver_request: fjsp_doc(),
        stochastic_parameters: vec![StochasticParameter {
            parameter_path: "jobs[J1].tasks[cut].duration".to_string(),
            distribution: DistributionType::Normal,
            mean: Some(30.0),
            std_dev: Some(5.0),
            min_value: None,
            max_value: None,
            mode_value: None,
        }],
        optimize_for: RiskMetric::Cvar95,
        num_scenarios,
        max_solve_time_seconds: 5,
        seed,
    }
}

#[test]
fn test_reproducible_with_same_seed() {
    let a = optimize_stochastic(&normal_duration_request(123, 10));
    let b = optimize_stochastic(&normal_duration_request(123, 10));
    assert_eq!(a.status, "completed", "{}", a.message);
    let risk_a = a.risk.expect("risk");
    let risk_b = b.risk.expect("risk");
    assert_eq!(risk_a.expected_value, risk_b.expected_value);
    assert_eq!(risk_a.cvar_95, risk_b.cvar_95);
    for (sa, sb) in a.scenarios.iter().zip(b.scenarios.iter()) {
        assert_eq!(sa.parameter_values, sb.parameter_values);
        assert_eq!(sa.objective_value, sb.objective_value);
    }
}

#[test]
fn test_different_seeds_differ() {
    let a = optimize_stochastic(&normal_duration_request(1, 20));
    let b = optimize_stochastic(&normal_duration_request(2, 20));
    let samples = |resp: &ops_analysis::StochasticResponse| -> Vec<f64> {
        resp.scenarios
            .iter()
            .map(|s| s.parameter_values["jobs[J1].tasks[cut].duration"])
            .collect()
    };
    assert_ne!(
        samples(&a),
        samples(&b),
        "different seeds should draw different sample streams"
    );
}

#[test]
fn test_risk_metric_ordering_laws() {
    let resp = optimize_stochastic(&normal_duration_request(42, 60));
    assert_eq!(resp.status, "completed", "{}", resp.message);
    let risk = resp.risk.expect("risk");

    assert!(risk.best_case <= risk.expected_value);
    assert!(risk.expected_value <= risk.worst_case);
    assert!(risk.var_90 <= risk.var_95);
    assert!(risk.var_95 <= risk.var_99);
    assert!(risk.var_99 <= risk.worst_case);
    assert!(risk.cvar_90 <= risk.cvar_95 + 1e-9);
    assert!(risk.cvar_95 <= risk.cvar_99 + 1e-9);
    assert!(risk.cvar_90 >= risk.var_90, "CVaR dominates VaR");
    assert!(risk.cvar_95 >= risk.var_95);
    assert!(risk.cvar_99 >= risk.var_99);
}

#[test]
fn test_scenario_accounting() {
    let resp = optimize_stochastic(&normal_duration_request(42, 25));
    let metrics = resp.metrics.expect("metrics");
    assert_eq!(metrics.scenarios_generated, 25);
    assert_eq!(
        metrics.scenarios_feasible + metrics.scenarios_infeasible,
        25
    );
    assert_eq!(resp.scenarios.len(), 25);
    let recommended = resp.recommended_scenario.expect("recommended");
    assert!(recommended.feasible);
}

#[test]
fn test_unresolvable_path_is_error() {
    let mut request = normal_duration_request(42, 10);
    request.stochastic_parameters[0].parameter_path = "jobs[J9].tasks[cut].duration".to_string();
    let resp = optimize_stochastic(&request);
    assert_eq!(resp.status, "error");
    assert!(resp.message.contains("Cannot resolve"), "{}", resp.message);
}

#[test]
fn test_objective_tracks_sampled_duration() {
    // With one job chained cut -> weld, makespan = cut + 10 exactly.
    let resp = optimize_stochastic(&normal_duration_request(7, 15));
    for s in resp.scenarios.iter().filter(|s| s.feasible) {
        let duration = s.parameter_values["jobs[J1].tasks[cut].duration"];
        assert_eq!(s.objective_value, duration + 10.0);
    }
}
