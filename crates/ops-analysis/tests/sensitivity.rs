//! Sensitivity analysis tests

use ops_analysis::{analyze_sensitivity, SensitivityRequest};
use serde_json::{json, Value};

fn fjsp_doc() -> Value {
    json!({
        "jobs": [
            {"job_id": "J1", "due_date": 50, "tasks": [
                {"task_id": "cut", "duration": 30, "eligible_machines": ["M1"]},
                {"task_id": "weld", "duration": 10, "eligible_machines": ["M2"]}
            ]}
        ],
        "machines": [{"machine_id": "M1"}, {"machine_id": "M2"}]
    })
}

fn auto_request() -> SensitivityRequest {
    serde_json::from_value(json!({
        "solver_type": "scheduling",
        "solver_request": fjsp_doc(),
        "max_solve_time_seconds": 5
    }))
    .unwrap()
}

#[test]
fn test_auto_detected_analysis_completes() {
    let resp = analyze_sensitivity(&auto_request());
    assert_eq!(resp.status, "completed", "{}", resp.message);
    assert!(resp.baseline_objective > 0.0);
    assert_eq!(resp.baseline_objective_name, "makespan");
    assert!(!resp.parameters.is_empty());
    assert!(resp.parameters.len() <= 12);
}

#[test]
fn test_results_sorted_by_score_descending() {
    let resp = analyze_sensitivity(&auto_request());
    for pair in resp.parameters.windows(2) {
        assert!(
            pair[0].sensitivity_score >= pair[1].sensitivity_score,
            "results must be sorted most-sensitive first"
        );
    }
    assert_eq!(resp.risk_ranking.len(), resp.parameters.len());
}

#[test]
fn test_duration_perturbation_moves_makespan() {
    // Makespan = cut + weld, so the cut duration has direct impact.
    let resp = analyze_sensitivity(&auto_request());
    let cut = resp
        .parameters
        .iter()
        .find(|p| p.parameter_path.contains("cut"))
        .expect("cut duration analyzed");
    assert!(cut.sensitivity_score > 0.0);
    assert_eq!(cut.direction, "increase_hurts");
    for pr in &cut.perturbation_results {
        assert!(pr.feasible);
        // +50% on a 30-unit task adds 15 to a 40-unit makespan.
        if pr.perturbation_value == 50.0 {
            assert_eq!(pr.objective_value, 55.0);
            assert_eq!(pr.objective_delta_pct, 37.5);
        }
    }
}

#[test]
fn test_sensitivity_score_capped_at_100() {
    let resp = analyze_sensitivity(&auto_request());
    for p in &resp.parameters {
        assert!(p.sensitivity_score <= 100.0);
        assert!(p.sensitivity_score >= 0.0);
    }
}

#[test]
fn test_metrics_counts_solves() {
    let resp = analyze_sensitivity(&auto_request());
    let metrics = resp.metrics.expect("metrics");
    assert!(metrics.total_solves > 1, "baseline plus perturbations");
    assert_eq!(metrics.parameters_analyzed, resp.parameters.len());
    assert_eq!(
        metrics.most_sensitive_parameter.as_deref(),
        resp.risk_ranking.first().map(String::as_str)
    );
}

#[test]
fn test_infeasible_baseline_aborts() {
    let mut request = auto_request();
    // A time window too small for the chain makes the baseline infeasible.
    request.solver_request["jobs"][0]["time_window"] =
        json!({"earliest_start": 0, "latest_end": 10});
    let resp = analyze_sensitivity(&request);
    assert_eq!(resp.status, "error");
    assert!(
        resp.message.contains("not feasible"),
        "{}",
        resp.message
    );
}

#[test]
fn test_explicit_parameters_respected() {
    let request: SensitivityRequest = serde_json::from_value(json!({
        "solver_type": "scheduling",
        "solver_request": fjsp_doc(),
        "parameters": [
            {"parameter_path": "jobs[J1].tasks[cut].duration", "perturbations": [-10, 10]}
        ],
        "max_solve_time_seconds": 5
    }))
    .unwrap();
    let resp = analyze_sensitivity(&request);
    assert_eq!(resp.status, "completed", "{}", resp.message);
    assert_eq!(resp.parameters.len(), 1);
    assert_eq!(resp.parameters[0].perturbation_results.len(), 2);
}
