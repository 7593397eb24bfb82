//! # ops-analysis: Uncertainty and Multi-Objective Meta-Engines
//!
//! Decision tools layered on the combinatorial solvers in `ops-solve`:
//!
//! - [`sensitivity`] - one-at-a-time parameter perturbation and fragility
//!   scoring
//! - [`robust`] - scenario-based robust optimization (corners + seeded
//!   uniform sampling, worst-case / percentile / regret selection)
//! - [`stochastic`] - Monte-Carlo sampling with VaR/CVaR risk analysis
//! - [`pareto`] - weighted-sum multi-objective frontier enumeration
//! - [`forecast`] - point forecasts with prediction intervals and trend
//!   classification
//! - [`prescriptive`] - forecast-optimize-advise pipeline
//!
//! The engines know nothing about the three request families beyond the
//! [`dispatch`] seam (solver kind + untyped document in, status/objective
//! out) and the parameter paths of `ops-core`. Control flow for every
//! engine is the same: resolve uncertain parameter paths, enumerate
//! scenarios ([`scenario`]), inject each into a deep copy of the request,
//! dispatch, and aggregate the outcomes. All sampling is seeded; two runs
//! of the same request produce identical responses.

pub mod dispatch;
pub mod forecast;
pub mod pareto;
pub mod prescriptive;
pub mod robust;
pub mod scenario;
pub mod sensitivity;
pub mod stochastic;

pub use dispatch::{solve_document, SolveOutcome, SolverKind};
pub use forecast::{forecast_parameter, ForecastMethod, ForecastParameter, ForecastResult};
pub use pareto::{optimize_pareto, ParetoRequest, ParetoResponse};
pub use prescriptive::{prescriptive_advise, PrescriptiveRequest, PrescriptiveResponse};
pub use robust::{optimize_robust, RobustMode, RobustRequest, RobustResponse};
pub use scenario::{ScenarioOutcome, StochasticParameter, UncertainParameter};
pub use sensitivity::{analyze_sensitivity, SensitivityRequest, SensitivityResponse};
pub use stochastic::{optimize_stochastic, RiskMetric, StochasticRequest, StochasticResponse};
