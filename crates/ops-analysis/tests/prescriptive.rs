//! Prescriptive advisor tests

use ops_analysis::forecast::{ForecastMethod, ForecastParameter, TimeSeriesPoint};
use ops_analysis::prescriptive::RiskAppetite;
use ops_analysis::{prescriptive_advise, PrescriptiveRequest, SolverKind};
use serde_json::{json, Value};

fn fjsp_doc() -> Value {
    json!({
        "jobs": [
            {"job_id": "J1", "tasks": [
                {"task_id": "cut", "duration": 90, "eligible_machines": ["M1"]},
                {"task_id": "weld", "duration": 10, "eligible_machines": ["M2"]}
            ]}
        ],
        "machines": [{"machine_id": "M1"}, {"machine_id": "M2"}]
    })
}

fn series(values: &[f64]) -> Vec<TimeSeriesPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| TimeSeriesPoint {
            period: i as i64,
            value: v,
        })
        .collect()
}

fn increasing_request(appetite: RiskAppetite) -> PrescriptiveRequest {
    PrescriptiveRequest {
        solver_type: SolverKind::Scheduling,
        solver_request: fjsp_doc(),
        forecast_parameters: vec![ForecastParameter {
            parameter_path: "jobs[J1].tasks[cut].duration".to_string(),
            historical_data: series(&[80.0, 85.0, 92.0, 88.0, 95.0, 100.0, 105.0]),
            forecast_method: ForecastMethod::ExponentialSmoothing,
            forecast_horizon: 1,
            confidence_level: 0.95,
            smoothing_alpha: None,
            seasonal_period: None,
        }],
        risk_appetite: appetite,
        max_solve_time_seconds: 5,
        include_risk_analysis: true,
    }
}

#[test]
fn test_increasing_series_pipeline() {
    let resp = prescriptive_advise(&increasing_request(RiskAppetite::Moderate));
    assert_eq!(resp.status, "completed", "{}", resp.message);

    let fc = &resp.forecasts[0];
    assert!(
        fc.trend == "increasing" || fc.trend == "stable",
        "got {}",
        fc.trend
    );
    assert!(
        fc.forecast_value > fc.historical_mean,
        "forecast {} must exceed mean {}",
        fc.forecast_value,
        fc.historical_mean
    );
    assert!(fc.upper_bound > fc.forecast_value);
}

#[test]
fn test_scenario_band_ordering() {
    let resp = prescriptive_advise(&increasing_request(RiskAppetite::Moderate));
    let risk = resp.risk.expect("risk analysis");
    // Makespan rises with the injected duration, so planning for the upper
    // bound costs the most.
    assert!(risk.conservative_objective >= risk.moderate_objective);
    assert!(risk.moderate_objective >= risk.aggressive_objective);
    assert_eq!(risk.feasibility_risk, "low");
}

#[test]
fn test_appetite_selects_scenario() {
    let conservative = prescriptive_advise(&increasing_request(RiskAppetite::Conservative));
    let aggressive = prescriptive_advise(&increasing_request(RiskAppetite::Aggressive));
    let c_obj = conservative.optimization.expect("optimization").objective_value;
    let a_obj = aggressive.optimization.expect("optimization").objective_value;
    assert!(c_obj >= a_obj, "conservative plans for the upper bound");
}

#[test]
fn test_actions_generated_for_trending_parameter() {
    let resp = prescriptive_advise(&increasing_request(RiskAppetite::Moderate));
    let fc = &resp.forecasts[0];
    if fc.trend == "increasing" {
        assert!(
            resp.actions
                .iter()
                .any(|a| a.action.contains("Plan for increasing")),
            "actions: {:?}",
            resp.actions.iter().map(|a| &a.action).collect::<Vec<_>>()
        );
        let priorities: Vec<usize> = resp.actions.iter().map(|a| a.priority).collect();
        assert!(priorities.windows(2).all(|w| w[0] <= w[1]) || priorities.contains(&1));
    }
}

#[test]
fn test_aggressive_with_uncertainty_warns() {
    let resp = prescriptive_advise(&increasing_request(RiskAppetite::Aggressive));
    // All three scenarios are feasible here, so no warning is required;
    // but if risk were non-low a warning action must appear.
    if let Some(risk) = &resp.risk {
        if risk.feasibility_risk != "low" {
            assert!(resp
                .actions
                .iter()
                .any(|a| a.action.contains("aggressive")));
        }
    }
}

#[test]
fn test_risk_block_omitted_when_disabled() {
    let mut request = increasing_request(RiskAppetite::Moderate);
    request.include_risk_analysis = false;
    let resp = prescriptive_advise(&request);
    assert_eq!(resp.status, "completed");
    assert!(resp.risk.is_none());
}

#[test]
fn test_unresolvable_path_is_error() {
    let mut request = increasing_request(RiskAppetite::Moderate);
    request.forecast_parameters[0].parameter_path = "jobs[JX].tasks[cut].duration".to_string();
    let resp = prescriptive_advise(&request);
    assert_eq!(resp.status, "error");
    assert!(resp.message.contains("Cannot resolve"));
}

#[test]
fn test_recommendation_mentions_objective() {
    let resp = prescriptive_advise(&increasing_request(RiskAppetite::Moderate));
    assert!(resp.recommendation.contains("makespan"), "{}", resp.recommendation);
}
