//! Forecast-driven prescriptive advice.
//!
//! Pipeline: forecast each uncertain parameter from its history, inject
//! the interval bounds into three planning scenarios (conservative =
//! upper, moderate = point, aggressive = lower), solve each, grade the
//! feasibility risk, and emit a ranked action list plus an executive
//! recommendation.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ops_core::path;
use ops_core::stats::round3;

use crate::dispatch::{solve_document, SolverKind};
use crate::forecast::{forecast_parameter, ForecastParameter, ForecastResult};
use crate::scenario::apply_scenario;
use crate::sensitivity::default_meta_solve_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAppetite {
    /// Plan for the upper bound of the prediction interval.
    Conservative,
    /// Plan for the point forecast.
    Moderate,
    /// Plan for the lower bound (optimistic).
    Aggressive,
}

impl Default for RiskAppetite {
    fn default() -> Self {
        RiskAppetite::Moderate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptiveRequest {
    pub solver_type: SolverKind,
    /// Base solver request; forecast values are injected per scenario.
    pub solver_request: Value,
    pub forecast_parameters: Vec<ForecastParameter>,
    #[serde(default)]
    pub risk_appetite: RiskAppetite,
    #[serde(default = "default_meta_solve_time")]
    pub max_solve_time_seconds: i64,
    /// When false, the risk block is omitted from the response.
    #[serde(default = "default_true")]
    pub include_risk_analysis: bool,
}

fn default_true() -> bool {
    true
}

impl PrescriptiveRequest {
    pub fn validate(&self) -> ops_core::OpsResult<()> {
        if self.forecast_parameters.is_empty() {
            return Err(ops_core::OpsError::Validation(
                "forecast_parameters must not be empty".into(),
            ));
        }
        if !(1..=60).contains(&self.max_solve_time_seconds) {
            return Err(ops_core::OpsError::Validation(
                "max_solve_time_seconds must be in 1..=60".into(),
            ));
        }
        for p in &self.forecast_parameters {
            p.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub objective_name: String,
    pub objective_value: f64,
    pub status: String,
    #[serde(default)]
    pub parameters_used: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Objective when planning for the upper bound.
    pub conservative_objective: f64,
    pub moderate_objective: f64,
    /// Objective when planning for the lower bound.
    pub aggressive_objective: f64,
    pub sensitivity_summary: String,
    /// low, medium, or high.
    pub feasibility_risk: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// 1 = highest priority.
    pub priority: usize,
    pub action: String,
    pub reason: String,
    #[serde(default)]
    pub impact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptiveResponse {
    /// completed or error.
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub forecasts: Vec<ForecastResult>,
    pub optimization: Option<OptimizationResult>,
    pub risk: Option<RiskAssessment>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub solve_time_seconds: f64,
}

impl PrescriptiveResponse {
    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            forecasts: Vec::new(),
            optimization: None,
            risk: None,
            actions: Vec::new(),
            recommendation: String::new(),
            solve_time_seconds: 0.0,
        }
    }
}

struct ScenarioSolve {
    status: String,
    objective: f64,
    feasible: bool,
    params: BTreeMap<String, f64>,
}

/// Run the full prescriptive pipeline: forecast, optimize, grade risk,
/// advise.
pub fn prescriptive_advise(request: &PrescriptiveRequest) -> PrescriptiveResponse {
    let t0 = Instant::now();
    if let Err(err) = request.validate() {
        return PrescriptiveResponse::error(err.to_string());
    }

    let doc = &request.solver_request;

    // Step 1: forecast every parameter; each path must resolve.
    let mut forecasts = Vec::with_capacity(request.forecast_parameters.len());
    for fp in &request.forecast_parameters {
        if let Err(err) = path::resolve_number(doc, &fp.parameter_path) {
            return PrescriptiveResponse::error(format!(
                "Cannot resolve parameter '{}': {err}",
                fp.parameter_path
            ));
        }
        match forecast_parameter(fp) {
            Ok(fc) => forecasts.push(fc),
            Err(err) => return PrescriptiveResponse::error(err.to_string()),
        }
    }

    // Step 2/3: solve the three planning scenarios.
    let solve_band = |pick: fn(&ForecastResult) -> f64| -> ScenarioSolve {
        let scenario: crate::scenario::Scenario = forecasts
            .iter()
            .map(|fc| (fc.parameter_path.clone(), pick(fc)))
            .collect();
        let solved = apply_scenario(doc, &scenario).and_then(|injected| {
            solve_document(request.solver_type, &injected, request.max_solve_time_seconds)
        });
        match solved {
            Ok(outcome) => ScenarioSolve {
                status: outcome.status.to_string(),
                objective: outcome.objective,
                feasible: outcome.feasible(),
                params: scenario,
            },
            Err(_) => ScenarioSolve {
                status: "error".to_string(),
                objective: 0.0,
                feasible: false,
                params: scenario,
            },
        }
    };

    let conservative = solve_band(|fc| fc.upper_bound);
    let moderate = solve_band(|fc| fc.forecast_value);
    let aggressive = solve_band(|fc| fc.lower_bound);

    let primary = match request.risk_appetite {
        RiskAppetite::Conservative => &conservative,
        RiskAppetite::Moderate => &moderate,
        RiskAppetite::Aggressive => &aggressive,
    };
    let objective_name = request.solver_type.objective_name().to_string();

    let optimization = OptimizationResult {
        objective_name: objective_name.clone(),
        objective_value: primary.objective,
        status: primary.status.clone(),
        parameters_used: primary.params.clone(),
    };

    let feasible_count = [&conservative, &moderate, &aggressive]
        .iter()
        .filter(|s| s.feasible)
        .count();
    let feasibility_risk = match feasible_count {
        3 => "low",
        2 => "medium",
        _ => "high",
    };

    // Most critical parameter: widest prediction interval relative to the
    // historical mean.
    let mut max_spread = 0.0_f64;
    let mut critical_param = String::new();
    for fc in &forecasts {
        let spread = fc.upper_bound - fc.lower_bound;
        let rel = if fc.historical_mean > 0.0 {
            spread / fc.historical_mean
        } else {
            spread
        };
        if rel > max_spread {
            max_spread = rel;
            critical_param = fc.parameter_path.clone();
        }
    }
    let sensitivity_summary = if critical_param.is_empty() {
        String::new()
    } else {
        format!(
            "Most critical: {critical_param} (prediction spread: {:.0}% of mean).",
            max_spread * 100.0
        )
    };

    let risk = RiskAssessment {
        conservative_objective: conservative.objective,
        moderate_objective: moderate.objective,
        aggressive_objective: aggressive.objective,
        sensitivity_summary,
        feasibility_risk: feasibility_risk.to_string(),
    };

    // Step 4: actions, trend-driven, with feasibility pre-emption.
    let mut actions: Vec<Action> = Vec::new();
    let mut priority = 1;
    for fc in &forecasts {
        match fc.trend.as_str() {
            "increasing" => {
                let impact = if fc.historical_mean > 0.0 {
                    format!(
                        "May need {:.0}% more capacity.",
                        (fc.forecast_value - fc.historical_mean) / fc.historical_mean * 100.0
                    )
                } else {
                    String::new()
                };
                actions.push(Action {
                    priority,
                    action: format!(
                        "Plan for increasing {} (trend: +{:.1}%/period).",
                        fc.parameter_path,
                        fc.trend_strength * 100.0
                    ),
                    reason: format!(
                        "Historical data shows consistent upward trend. Forecast: {} \
                         (was {} avg).",
                        fc.forecast_value, fc.historical_mean
                    ),
                    impact,
                });
                priority += 1;
            }
            "volatile" => {
                actions.push(Action {
                    priority,
                    action: format!(
                        "Add safety buffer for {} (volatile: CV={:.0}%).",
                        fc.parameter_path,
                        fc.trend_strength * 100.0
                    ),
                    reason: format!(
                        "High variability in historical data. Prediction interval: [{}, {}].",
                        fc.lower_bound, fc.upper_bound
                    ),
                    impact: "Consider robust or conservative planning.".to_string(),
                });
                priority += 1;
            }
            "decreasing" => {
                actions.push(Action {
                    priority,
                    action: format!(
                        "Monitor declining {} (trend: -{:.1}%/period).",
                        fc.parameter_path,
                        fc.trend_strength * 100.0
                    ),
                    reason: format!(
                        "Downward trend detected. Forecast: {} (was {} avg).",
                        fc.forecast_value, fc.historical_mean
                    ),
                    impact: "Potential to reduce allocated resources.".to_string(),
                });
                priority += 1;
            }
            _ => {}
        }
    }

    if feasibility_risk == "high" {
        for a in actions.iter_mut() {
            a.priority += 1;
        }
        actions.insert(
            0,
            Action {
                priority: 1,
                action: "Increase capacity or relax constraints immediately.".to_string(),
                reason: "Most scenarios are infeasible. System cannot handle forecasted \
                         demand."
                    .to_string(),
                impact: "Without action, plan failure is likely.".to_string(),
            },
        );
        priority += 1;
    } else if feasibility_risk == "medium" {
        actions.push(Action {
            priority,
            action: "Consider switching to conservative planning mode.".to_string(),
            reason: "Some scenarios are infeasible at the boundaries of prediction intervals."
                .to_string(),
            impact: "Prevents plan failure in pessimistic conditions.".to_string(),
        });
        priority += 1;
    }

    if request.risk_appetite == RiskAppetite::Aggressive && feasibility_risk != "low" {
        actions.push(Action {
            priority,
            action: "Warning: aggressive risk appetite with non-trivial uncertainty. \
                     Consider moderate."
                .to_string(),
            reason: format!(
                "Feasibility risk is {feasibility_risk}. Aggressive planning uses lower \
                 bounds which may underestimate."
            ),
            impact: "Risk of plan failure if actual values exceed forecast.".to_string(),
        });
    }

    // Step 5: executive recommendation.
    let mut rec_parts = vec![
        format!(
            "Based on {} forecasted parameter(s) using {} risk appetite:",
            forecasts.len(),
            match request.risk_appetite {
                RiskAppetite::Conservative => "conservative",
                RiskAppetite::Moderate => "moderate",
                RiskAppetite::Aggressive => "aggressive",
            }
        ),
        format!("Recommended {objective_name}: {}.", primary.objective),
    ];
    if conservative.objective > 0.0
        && aggressive.objective > 0.0
        && conservative.objective != aggressive.objective
    {
        let spread_pct = if moderate.objective > 0.0 {
            (conservative.objective - aggressive.objective).abs() / moderate.objective * 100.0
        } else {
            0.0
        };
        rec_parts.push(format!(
            "Outcome range: {} (optimistic) to {} (pessimistic), spread {spread_pct:.0}%.",
            aggressive.objective, conservative.objective
        ));
    }
    for fc in &forecasts {
        if fc.trend != "stable" {
            rec_parts.push(format!(
                "{} is {} (forecast: {}).",
                fc.parameter_path, fc.trend, fc.forecast_value
            ));
        }
    }
    if feasibility_risk != "low" {
        rec_parts.push(format!("Feasibility risk: {feasibility_risk}. Monitor closely."));
    }

    let solve_time = round3(t0.elapsed().as_secs_f64());
    let message = format!(
        "Prescriptive analysis completed in {solve_time:.1}s. {} parameter(s) forecasted. \
         Risk appetite: {}. Recommended {objective_name}: {}. Feasibility risk: \
         {feasibility_risk}.",
        forecasts.len(),
        match request.risk_appetite {
            RiskAppetite::Conservative => "conservative",
            RiskAppetite::Moderate => "moderate",
            RiskAppetite::Aggressive => "aggressive",
        },
        primary.objective
    );

    PrescriptiveResponse {
        status: "completed".to_string(),
        message,
        forecasts,
        optimization: Some(optimization),
        risk: request.include_risk_analysis.then_some(risk),
        actions,
        recommendation: rec_parts.join(" "),
        solve_time_seconds: solve_time,
    }
}
