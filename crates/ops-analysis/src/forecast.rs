//! Time-series forecasting with prediction intervals.
//!
//! Four methods over a short historical series: moving average (window of
//! the last five points), single exponential smoothing (alpha grid-fitted
//! to one-step squared error when omitted), least-squares linear trend,
//! and seasonal naive. The prediction interval widens with the horizon
//! (`z * sigma * sqrt(1 + 0.1h)`) and the lower bound never goes
//! negative. Trend classification is slope-based, with a coefficient of
//! variation above 0.3 overriding to volatile.

use serde::{Deserialize, Serialize};

use ops_core::stats::{mean, round2, round4, std_dev};
use ops_core::{OpsError, OpsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    MovingAverage,
    ExponentialSmoothing,
    LinearTrend,
    SeasonalNaive,
}

impl Default for ForecastMethod {
    fn default() -> Self {
        ForecastMethod::ExponentialSmoothing
    }
}

/// One observed period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Period index; most recent = highest.
    pub period: i64,
    pub value: f64,
}

/// A parameter to forecast from historical observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastParameter {
    pub parameter_path: String,
    pub historical_data: Vec<TimeSeriesPoint>,
    #[serde(default)]
    pub forecast_method: ForecastMethod,
    #[serde(default = "default_horizon")]
    pub forecast_horizon: i64,
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    /// Auto-fitted when omitted.
    pub smoothing_alpha: Option<f64>,
    pub seasonal_period: Option<i64>,
}

fn default_horizon() -> i64 {
    1
}

fn default_confidence() -> f64 {
    0.95
}

impl ForecastParameter {
    pub fn validate(&self) -> OpsResult<()> {
        if self.historical_data.len() < 3 {
            return Err(OpsError::Validation(format!(
                "parameter '{}': at least 3 historical points required, got {}",
                self.parameter_path,
                self.historical_data.len()
            )));
        }
        if !(1..=12).contains(&self.forecast_horizon) {
            return Err(OpsError::Validation(format!(
                "parameter '{}': forecast_horizon must be in 1..=12",
                self.parameter_path
            )));
        }
        if !(0.5..=0.99).contains(&self.confidence_level) {
            return Err(OpsError::Validation(format!(
                "parameter '{}': confidence_level must be in 0.5..=0.99",
                self.parameter_path
            )));
        }
        if let Some(alpha) = self.smoothing_alpha {
            if !(0.01..=0.99).contains(&alpha) {
                return Err(OpsError::Validation(format!(
                    "parameter '{}': smoothing_alpha must be in 0.01..=0.99",
                    self.parameter_path
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub parameter_path: String,
    pub method_used: String,
    pub historical_mean: f64,
    pub historical_std: f64,
    pub forecast_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence_level: f64,
    /// increasing, decreasing, stable, or volatile.
    pub trend: String,
    /// Normalized slope; coefficient of variation when volatile.
    pub trend_strength: f64,
    pub forecast_horizon: i64,
}

fn moving_average(values: &[f64]) -> f64 {
    let window = values.len().min(5);
    mean(&values[values.len() - window..])
}

/// Final state of single exponential smoothing from `s0 = y0`.
fn ses_state(values: &[f64], alpha: f64) -> f64 {
    let mut s = values[0];
    for &v in &values[1..] {
        s = alpha * v + (1.0 - alpha) * s;
    }
    s
}

/// Grid-search alpha over {0.05, 0.10, ..., 0.95} minimizing one-step SSE.
fn fit_alpha(values: &[f64]) -> f64 {
    let mut best_alpha = 0.3;
    let mut best_sse = f64::INFINITY;
    for i in 1..20 {
        let alpha = i as f64 / 20.0;
        let mut s = values[0];
        let mut sse = 0.0;
        for &v in &values[1..] {
            let r = v - s;
            sse += r * r;
            s = alpha * v + (1.0 - alpha) * s;
        }
        if sse < best_sse {
            best_sse = sse;
            best_alpha = alpha;
        }
    }
    best_alpha
}

/// Least-squares slope and intercept over indices 0..n-1.
fn linear_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &v) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (v - y_mean);
        den += dx * dx;
    }
    let slope = if den > 0.0 { num / den } else { 0.0 };
    (slope, y_mean - slope * x_mean)
}

fn seasonal_naive(values: &[f64], period: i64, horizon: i64) -> f64 {
    let n = values.len() as i64;
    if period > 0 && period <= n {
        let idx = n - period + ((horizon - 1) % period);
        if (0..n).contains(&idx) {
            return values[idx as usize];
        }
    }
    values[values.len() - 1]
}

fn z_for(confidence: f64) -> f64 {
    const TABLE: [(f64, f64); 5] = [
        (0.50, 0.674),
        (0.80, 1.282),
        (0.90, 1.645),
        (0.95, 1.96),
        (0.99, 2.576),
    ];
    for (c, z) in TABLE {
        if (confidence - c).abs() < 1e-9 {
            return z;
        }
    }
    1.96
}

/// Forecast one parameter from its history.
pub fn forecast_parameter(param: &ForecastParameter) -> OpsResult<ForecastResult> {
    param.validate()?;

    let mut sorted = param.historical_data.clone();
    sorted.sort_by_key(|p| p.period);
    let values: Vec<f64> = sorted.iter().map(|p| p.value).collect();
    let n = values.len();

    let mean_val = mean(&values);
    let std_val = std_dev(&values);
    let horizon = param.forecast_horizon;

    let alpha = param.smoothing_alpha.unwrap_or_else(|| fit_alpha(&values));
    let forecast = match param.forecast_method {
        ForecastMethod::MovingAverage => moving_average(&values),
        ForecastMethod::ExponentialSmoothing => ses_state(&values, alpha),
        ForecastMethod::LinearTrend => {
            let (slope, intercept) = linear_fit(&values);
            intercept + slope * (n as f64 - 1.0 + horizon as f64)
        }
        ForecastMethod::SeasonalNaive => {
            seasonal_naive(&values, param.seasonal_period.unwrap_or(4), horizon)
        }
    };

    // Residual spread: one-step residuals for smoothing, deviation from the
    // sample mean otherwise.
    let residuals: Vec<f64> = match param.forecast_method {
        ForecastMethod::ExponentialSmoothing => {
            let mut s = values[0];
            let mut res = Vec::with_capacity(n - 1);
            for &v in &values[1..] {
                res.push(v - s);
                s = alpha * v + (1.0 - alpha) * s;
            }
            res
        }
        _ => values.iter().map(|v| v - mean_val).collect(),
    };
    let res_std = if residuals.is_empty() {
        std_val
    } else {
        (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
    };

    let z = z_for(param.confidence_level);
    let margin = z * res_std * (1.0 + 0.1 * horizon as f64).sqrt();
    let lower = (forecast - margin).max(0.0);
    let upper = forecast + margin;

    let (slope, _) = linear_fit(&values);
    let normalized_slope = if mean_val > 0.0 {
        slope.abs() / mean_val
    } else {
        0.0
    };
    let cv = if mean_val > 0.0 { std_val / mean_val } else { 0.0 };
    let (trend, trend_strength) = if cv > 0.3 {
        ("volatile", cv)
    } else if normalized_slope < 0.02 {
        ("stable", normalized_slope)
    } else if slope > 0.0 {
        ("increasing", normalized_slope)
    } else {
        ("decreasing", normalized_slope)
    };

    Ok(ForecastResult {
        parameter_path: param.parameter_path.clone(),
        method_used: serde_variant_name(param.forecast_method),
        historical_mean: round2(mean_val),
        historical_std: round2(std_val),
        forecast_value: round2(forecast),
        lower_bound: round2(lower),
        upper_bound: round2(upper),
        confidence_level: param.confidence_level,
        trend: trend.to_string(),
        trend_strength: round4(trend_strength),
        forecast_horizon: horizon,
    })
}

fn serde_variant_name(method: ForecastMethod) -> String {
    match method {
        ForecastMethod::MovingAverage => "moving_average",
        ForecastMethod::ExponentialSmoothing => "exponential_smoothing",
        ForecastMethod::LinearTrend => "linear_trend",
        ForecastMethod::SeasonalNaive => "seasonal_naive",
    }
    .to_string()
}
