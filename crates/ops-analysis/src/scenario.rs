//! Scenario generation and per-scenario solve orchestration.
//!
//! Scenarios are mappings from parameter path to numeric value. The engine
//! never mutates the caller's request: each scenario is injected into a
//! fresh deep copy of the base document, with integer scalars kept integer
//! by the path resolver. Scenario ids are generation-order indices, so the
//! id-to-values mapping is stable within a request and across identical
//! requests (all randomness flows from request-level seeds).

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal, Normal, Triangular};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ops_core::path;
use ops_core::stats::round2;
use ops_core::{OpsError, OpsResult};

use crate::dispatch::{solve_document, SolverKind};

/// One perturbed problem instance: path -> value.
pub type Scenario = BTreeMap<String, f64>;

/// Result of re-solving one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario_id: usize,
    #[serde(default)]
    pub parameter_values: Scenario,
    pub objective_value: f64,
    pub feasible: bool,
    pub status: String,
}

/// An uncertain parameter with a plausible range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertainParameter {
    pub parameter_path: String,
    /// Best case or lower bound.
    pub min_value: f64,
    /// Worst case or upper bound.
    pub max_value: f64,
    /// Defaults to the value found in the solver request.
    pub nominal_value: Option<f64>,
}

impl UncertainParameter {
    pub fn validate(&self) -> OpsResult<()> {
        if self.min_value > self.max_value {
            return Err(OpsError::Validation(format!(
                "parameter '{}': min_value {} > max_value {}",
                self.parameter_path, self.min_value, self.max_value
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionType {
    Normal,
    Uniform,
    Triangular,
    LogNormal,
}

impl Default for DistributionType {
    fn default() -> Self {
        DistributionType::Normal
    }
}

impl DistributionType {
    fn as_str(self) -> &'static str {
        match self {
            DistributionType::Normal => "normal",
            DistributionType::Uniform => "uniform",
            DistributionType::Triangular => "triangular",
            DistributionType::LogNormal => "log_normal",
        }
    }
}

/// A parameter with a probability distribution for Monte-Carlo sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticParameter {
    pub parameter_path: String,
    #[serde(default)]
    pub distribution: DistributionType,
    /// For normal/log_normal; defaults to the nominal request value.
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub mode_value: Option<f64>,
}

impl StochasticParameter {
    pub fn validate(&self) -> OpsResult<()> {
        let need = |field: &str, present: bool| -> OpsResult<()> {
            if present {
                Ok(())
            } else {
                Err(OpsError::Validation(format!(
                    "parameter '{}': {} distribution requires {}",
                    self.parameter_path,
                    self.distribution.as_str(),
                    field
                )))
            }
        };
        match self.distribution {
            DistributionType::Normal | DistributionType::LogNormal => {
                need("std_dev", self.std_dev.is_some())?;
                if matches!(self.std_dev, Some(sd) if sd < 0.0) {
                    return Err(OpsError::Validation(format!(
                        "parameter '{}': std_dev must be >= 0",
                        self.parameter_path
                    )));
                }
            }
            DistributionType::Uniform => {
                need("min_value", self.min_value.is_some())?;
                need("max_value", self.max_value.is_some())?;
                if self.min_value.unwrap_or(0.0) > self.max_value.unwrap_or(0.0) {
                    return Err(OpsError::Validation(format!(
                        "parameter '{}': min_value > max_value",
                        self.parameter_path
                    )));
                }
            }
            DistributionType::Triangular => {
                need("min_value", self.min_value.is_some())?;
                need("max_value", self.max_value.is_some())?;
                need("mode_value", self.mode_value.is_some())?;
                let (lo, mode, hi) = (
                    self.min_value.unwrap_or(0.0),
                    self.mode_value.unwrap_or(0.0),
                    self.max_value.unwrap_or(0.0),
                );
                if !(lo <= mode && mode <= hi) {
                    return Err(OpsError::Validation(format!(
                        "parameter '{}': triangular requires min <= mode <= max",
                        self.parameter_path
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Resolve each parameter's nominal value (and integer-ness) from the base
/// document. Errors when any path fails to resolve.
pub fn resolve_nominals(
    doc: &Value,
    paths: impl IntoIterator<Item = (String, Option<f64>)>,
) -> OpsResult<(Scenario, BTreeMap<String, bool>)> {
    let mut nominals = Scenario::new();
    let mut integer = BTreeMap::new();
    for (p, override_value) in paths {
        let resolved = path::resolve_number(doc, &p)?;
        integer.insert(p.clone(), path::is_integer(doc, &p)?);
        nominals.insert(p, override_value.unwrap_or(resolved));
    }
    Ok((nominals, integer))
}

fn coerce_sample(value: f64, is_int: bool) -> f64 {
    if is_int {
        value.round().max(0.0)
    } else {
        round2(value).max(0.0)
    }
}

/// Robust scenario set: nominal, all-max corner, all-min corner, then
/// seeded uniform samples in `[min, max]` per parameter.
pub fn generate_robust_scenarios(
    params: &[UncertainParameter],
    nominals: &Scenario,
    integer: &BTreeMap<String, bool>,
    num_scenarios: usize,
    seed: u64,
) -> Vec<Scenario> {
    let mut scenarios = Vec::with_capacity(num_scenarios);

    scenarios.push(nominals.clone());
    scenarios.push(
        params
            .iter()
            .map(|p| (p.parameter_path.clone(), p.max_value))
            .collect(),
    );
    scenarios.push(
        params
            .iter()
            .map(|p| (p.parameter_path.clone(), p.min_value))
            .collect(),
    );

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for _ in 0..num_scenarios.saturating_sub(3) {
        let mut scenario = Scenario::new();
        for p in params {
            let raw = if p.max_value > p.min_value {
                rng.gen_range(p.min_value..=p.max_value)
            } else {
                p.min_value
            };
            let is_int = integer.get(&p.parameter_path).copied().unwrap_or(false);
            scenario.insert(p.parameter_path.clone(), coerce_sample(raw, is_int));
        }
        scenarios.push(scenario);
    }

    scenarios
}

fn sample_one(
    param: &StochasticParameter,
    nominal: f64,
    is_int: bool,
    rng: &mut ChaCha8Rng,
) -> f64 {
    let mean = param.mean.unwrap_or(nominal);
    let raw = match param.distribution {
        DistributionType::Normal => {
            let sd = param.std_dev.unwrap_or(0.0);
            if sd > 0.0 {
                Normal::new(mean, sd)
                    .map(|d| d.sample(rng))
                    .unwrap_or(mean)
                    .max(0.0)
            } else {
                mean
            }
        }
        DistributionType::Uniform => {
            let lo = param.min_value.unwrap_or(nominal);
            let hi = param.max_value.unwrap_or(nominal);
            if hi > lo {
                rng.gen_range(lo..=hi)
            } else {
                lo
            }
        }
        DistributionType::Triangular => {
            let lo = param.min_value.unwrap_or(nominal);
            let hi = param.max_value.unwrap_or(nominal);
            let mode = param.mode_value.unwrap_or(nominal);
            if hi > lo {
                Triangular::new(lo, hi, mode)
                    .map(|d| d.sample(rng))
                    .unwrap_or(mode)
            } else {
                lo
            }
        }
        DistributionType::LogNormal => {
            // Moment-matched so the arithmetic mean/std match the request.
            let sd = param.std_dev.unwrap_or(0.0);
            if sd > 0.0 && mean > 0.0 {
                let variance = sd * sd;
                let mu = (mean * mean / (variance + mean * mean).sqrt()).ln();
                let sigma = (1.0 + variance / (mean * mean)).ln().sqrt();
                LogNormal::new(mu, sigma)
                    .map(|d| d.sample(rng))
                    .unwrap_or(mean)
            } else {
                mean
            }
        }
    };
    coerce_sample(raw, is_int)
}

/// Monte-Carlo scenario set: `num_scenarios` independent draws from each
/// parameter's distribution, from a request-seeded stream.
pub fn generate_stochastic_scenarios(
    params: &[StochasticParameter],
    nominals: &Scenario,
    integer: &BTreeMap<String, bool>,
    num_scenarios: usize,
    seed: u64,
) -> Vec<Scenario> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..num_scenarios)
        .map(|_| {
            params
                .iter()
                .map(|p| {
                    let nominal = nominals.get(&p.parameter_path).copied().unwrap_or(0.0);
                    let is_int = integer.get(&p.parameter_path).copied().unwrap_or(false);
                    (
                        p.parameter_path.clone(),
                        sample_one(p, nominal, is_int, &mut rng),
                    )
                })
                .collect()
        })
        .collect()
}

/// Weight vectors for weighted-sum scalarization: unit basis vectors, the
/// normalized user weights, then `(alpha, 1-alpha)` fills for two
/// objectives or a simplex grid for three or more, deduplicated by
/// l-infinity distance.
pub fn generate_weight_vectors(
    objectives: &[(String, f64)],
    num_points: usize,
) -> Vec<BTreeMap<String, f64>> {
    let n = objectives.len();
    let mut vectors: Vec<BTreeMap<String, f64>> = Vec::new();

    for (name, _) in objectives {
        let mut w: BTreeMap<String, f64> =
            objectives.iter().map(|(o, _)| (o.clone(), 0.0)).collect();
        w.insert(name.clone(), 1.0);
        vectors.push(w);
    }

    let total: f64 = objectives.iter().map(|(_, w)| w).sum();
    let total = if total > 0.0 { total } else { n as f64 };
    vectors.push(
        objectives
            .iter()
            .map(|(o, w)| (o.clone(), w / total))
            .collect(),
    );

    let remaining = num_points.saturating_sub(vectors.len());
    if remaining > 0 && n == 2 {
        for i in 1..=remaining {
            let alpha = i as f64 / (remaining + 1) as f64;
            let mut w = BTreeMap::new();
            w.insert(objectives[0].0.clone(), alpha);
            w.insert(objectives[1].0.clone(), 1.0 - alpha);
            vectors.push(w);
        }
    } else if remaining > 0 && n >= 3 {
        let steps = ((remaining as f64).powf(1.0 / (n as f64 - 1.0)) as usize).max(2);
        let mut combo = vec![0_usize; n];
        simplex_grid(&mut combo, 0, steps, &mut |combo| {
            if vectors.len() >= num_points {
                return;
            }
            let w: BTreeMap<String, f64> = objectives
                .iter()
                .enumerate()
                .map(|(i, (o, _))| (o.clone(), combo[i] as f64 / steps as f64))
                .collect();
            let duplicate = vectors.iter().any(|v| {
                v.iter()
                    .all(|(k, val)| (w.get(k).copied().unwrap_or(0.0) - val).abs() < 0.01)
            });
            if !duplicate {
                vectors.push(w);
            }
        });
    }

    vectors.truncate(num_points);
    vectors
}

/// Enumerate integer compositions of `steps` into `combo.len()` parts.
fn simplex_grid(combo: &mut Vec<usize>, idx: usize, left: usize, emit: &mut impl FnMut(&[usize])) {
    if idx == combo.len() - 1 {
        combo[idx] = left;
        emit(combo);
        return;
    }
    for v in 0..=left {
        combo[idx] = v;
        simplex_grid(combo, idx + 1, left - v, emit);
    }
}

/// Inject a scenario into a deep copy of the base document.
pub fn apply_scenario(base: &Value, scenario: &Scenario) -> OpsResult<Value> {
    let mut doc = base.clone();
    for (p, value) in scenario {
        path::set_number(&mut doc, p, *value)?;
    }
    Ok(doc)
}

/// Solve every scenario in order, collecting outcomes. A failed scenario
/// solve becomes an infeasible outcome; it never aborts the run.
pub fn run_scenarios(
    kind: SolverKind,
    base: &Value,
    scenarios: &[Scenario],
    max_time: i64,
) -> (Vec<ScenarioOutcome>, Vec<f64>, usize) {
    let mut outcomes = Vec::with_capacity(scenarios.len());
    let mut feasible_objectives = Vec::new();
    let mut total_solves = 0;

    for (i, scenario) in scenarios.iter().enumerate() {
        let solved = apply_scenario(base, scenario)
            .and_then(|doc| solve_document(kind, &doc, max_time));
        match solved {
            Ok(outcome) => {
                total_solves += 1;
                let feasible = outcome.feasible();
                if feasible {
                    feasible_objectives.push(outcome.objective);
                }
                outcomes.push(ScenarioOutcome {
                    scenario_id: i,
                    parameter_values: scenario.clone(),
                    objective_value: outcome.objective,
                    feasible,
                    status: outcome.status.to_string(),
                });
            }
            Err(err) => {
                tracing::warn!(scenario = i, error = %err, "scenario solve failed");
                outcomes.push(ScenarioOutcome {
                    scenario_id: i,
                    parameter_values: scenario.clone(),
                    objective_value: 0.0,
                    feasible: false,
                    status: "error".to_string(),
                });
            }
        }
    }

    (outcomes, feasible_objectives, total_solves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_robust_scenarios_include_corners() {
        let params = vec![UncertainParameter {
            parameter_path: "jobs[J1].tasks[cut].duration".to_string(),
            min_value: 10.0,
            max_value: 50.0,
            nominal_value: None,
        }];
        let nominals: Scenario = [("jobs[J1].tasks[cut].duration".to_string(), 30.0)]
            .into_iter()
            .collect();
        let integer: BTreeMap<String, bool> =
            [("jobs[J1].tasks[cut].duration".to_string(), true)]
                .into_iter()
                .collect();
        let scenarios = generate_robust_scenarios(&params, &nominals, &integer, 10, 42);
        assert_eq!(scenarios.len(), 10);
        assert_eq!(scenarios[0]["jobs[J1].tasks[cut].duration"], 30.0);
        assert_eq!(scenarios[1]["jobs[J1].tasks[cut].duration"], 50.0);
        assert_eq!(scenarios[2]["jobs[J1].tasks[cut].duration"], 10.0);
        for s in &scenarios[3..] {
            let v = s["jobs[J1].tasks[cut].duration"];
            assert!((10.0..=50.0).contains(&v));
            assert_eq!(v, v.round(), "integer parameters sample to integers");
        }
    }

    #[test]
    fn test_robust_sampling_is_reproducible() {
        let params = vec![UncertainParameter {
            parameter_path: "p".to_string(),
            min_value: 0.0,
            max_value: 100.0,
            nominal_value: None,
        }];
        let nominals: Scenario = [("p".to_string(), 50.0)].into_iter().collect();
        let integer: BTreeMap<String, bool> = [("p".to_string(), false)].into_iter().collect();
        let a = generate_robust_scenarios(&params, &nominals, &integer, 20, 42);
        let b = generate_robust_scenarios(&params, &nominals, &integer, 20, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_stochastic_normal_clamps_negative() {
        let params = vec![StochasticParameter {
            parameter_path: "p".to_string(),
            distribution: DistributionType::Normal,
            mean: Some(1.0),
            std_dev: Some(50.0),
            min_value: None,
            max_value: None,
            mode_value: None,
        }];
        let nominals: Scenario = [("p".to_string(), 1.0)].into_iter().collect();
        let integer: BTreeMap<String, bool> = [("p".to_string(), false)].into_iter().collect();
        let scenarios = generate_stochastic_scenarios(&params, &nominals, &integer, 200, 7);
        assert!(scenarios.iter().all(|s| s["p"] >= 0.0));
    }

    #[test]
    fn test_weight_vectors_two_objectives() {
        let objectives = vec![("a".to_string(), 1.0), ("b".to_string(), 1.0)];
        let vectors = generate_weight_vectors(&objectives, 6);
        assert_eq!(vectors.len(), 6);
        // Extreme points first.
        assert_eq!(vectors[0]["a"], 1.0);
        assert_eq!(vectors[1]["b"], 1.0);
        for v in &vectors {
            let sum: f64 = v.values().sum();
            assert!((sum - 1.0).abs() < 1e-9, "weights sum to 1, got {sum}");
        }
    }

    #[test]
    fn test_weight_vectors_three_objectives_dedup() {
        let objectives = vec![
            ("a".to_string(), 1.0),
            ("b".to_string(), 1.0),
            ("c".to_string(), 1.0),
        ];
        let vectors = generate_weight_vectors(&objectives, 10);
        assert!(vectors.len() <= 10);
        for (i, v) in vectors.iter().enumerate() {
            for w in &vectors[i + 1..] {
                let close = v
                    .iter()
                    .all(|(k, val)| (w.get(k).copied().unwrap_or(0.0) - val).abs() < 0.01);
                assert!(!close, "duplicate weight vectors at {v:?} / {w:?}");
            }
        }
    }

    #[test]
    fn test_apply_scenario_leaves_base_untouched() {
        let base = json!({
            "jobs": [{"job_id": "J1", "tasks": [
                {"task_id": "cut", "duration": 30, "eligible_machines": ["M1"]}
            ]}],
            "machines": [{"machine_id": "M1"}]
        });
        let scenario: Scenario = [("jobs[J1].tasks[cut].duration".to_string(), 45.0)]
            .into_iter()
            .collect();
        let derived = apply_scenario(&base, &scenario).unwrap();
        assert_eq!(
            base["jobs"][0]["tasks"][0]["duration"], 30,
            "base document must not change"
        );
        assert_eq!(derived["jobs"][0]["tasks"][0]["duration"], 45);
    }
}
