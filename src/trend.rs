//! Trend, seasonality and short-range forecasts over a site's index history.
//!
//! Everything here is a pure function of the observations passed in. Fetching
//! the history and storing the analyses belongs to the caller.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Slopes with a smaller magnitude count as stable.
pub const STABLE_SLOPE: f64 = 0.01;

/// Z-score of the forecast interval.
pub const FORECAST_Z: f64 = 1.96;

const MIN_TREND_POINTS: usize = 3;
const MIN_SEASONAL_MONTHS: usize = 6;
const FORECAST_WINDOW: usize = 5;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Tracked series. The first four are indices, the rest raw concentrations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    Hpi,
    Hei,
    Cd,
    Ef,
    Lead,
    Arsenic,
    Cadmium,
    Chromium,
}

impl Parameter {
    pub fn as_str(self) -> &'static str {
        match self {
            Parameter::Hpi => "hpi",
            Parameter::Hei => "hei",
            Parameter::Cd => "cd",
            Parameter::Ef => "ef",
            Parameter::Lead => "lead",
            Parameter::Arsenic => "arsenic",
            Parameter::Cadmium => "cadmium",
            Parameter::Chromium => "chromium",
        }
    }

    fn is_headline_index(self) -> bool {
        matches!(self, Parameter::Hpi | Parameter::Hei)
    }

    fn is_contamination_index(self) -> bool {
        matches!(self, Parameter::Hpi | Parameter::Hei | Parameter::Cd)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
    Stable,
}

/// Escalation level attached to an analysis.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// One value at one point in time.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub at: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub parameter: Parameter,
    pub direction: Direction,
    /// Least-squares slope per observation.
    pub rate_of_change: f64,
    /// R² of the fit, clamped to [0, 1].
    pub confidence: f64,
}

/// Fit a line through `values` taken at equally spaced positions.
pub fn analyze_trend(parameter: Parameter, values: &[f64]) -> Result<TrendAnalysis, IndexError> {
    if values.len() < MIN_TREND_POINTS {
        return Err(IndexError::InsufficientData {
            needed: MIN_TREND_POINTS,
            got: values.len(),
        });
    }

    let n = values.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    let intercept = (sum_y - slope * sum_x) / n;

    let mean = sum_y / n;
    let (mut ss_res, mut ss_tot) = (0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        ss_res += (y - (slope * i as f64 + intercept)).powi(2);
        ss_tot += (y - mean).powi(2);
    }
    // a flat series is fitted exactly
    let r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };

    let direction = if slope.abs() < STABLE_SLOPE {
        Direction::Stable
    } else if slope > 0.0 {
        Direction::Increasing
    } else {
        Direction::Decreasing
    };

    Ok(TrendAnalysis {
        parameter,
        direction,
        rate_of_change: slope,
        confidence: r_squared.clamp(0.0, 1.0),
    })
}

pub fn trend_warning_level(trends: &[TrendAnalysis]) -> WarningLevel {
    let increasing = |t: &&TrendAnalysis| t.direction == Direction::Increasing;

    let critical = trends
        .iter()
        .filter(increasing)
        .any(|t| t.parameter.is_headline_index() && t.confidence > 0.8 && t.rate_of_change > 1.0);
    if critical {
        return WarningLevel::Critical;
    }

    let high = trends
        .iter()
        .filter(increasing)
        .filter(|t| t.parameter.is_contamination_index() && t.confidence > 0.6)
        .count();
    match high {
        0 => WarningLevel::None,
        1 => WarningLevel::Medium,
        _ => WarningLevel::High,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalPattern {
    pub parameter: Parameter,
    pub peaks: Vec<&'static str>,
    pub lows: Vec<&'static str>,
    pub amplitude: f64,
    pub confidence: f64,
}

/// Group observations by calendar month (across years) and compare the
/// monthly means.
pub fn seasonal_pattern(
    parameter: Parameter,
    observations: &[Observation],
) -> Result<SeasonalPattern, IndexError> {
    let mut months: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for obs in observations {
        let slot = months.entry(obs.at.month0() as usize).or_insert((0.0, 0));
        slot.0 += obs.value;
        slot.1 += 1;
    }
    if months.len() < MIN_SEASONAL_MONTHS {
        return Err(IndexError::InsufficientData {
            needed: MIN_SEASONAL_MONTHS,
            got: months.len(),
        });
    }

    let means: Vec<(usize, f64)> = months
        .into_iter()
        .map(|(month, (sum, count))| (month, sum / count as f64))
        .collect();
    let max = means.iter().map(|&(_, m)| m).fold(f64::NEG_INFINITY, f64::max);
    let min = means.iter().map(|&(_, m)| m).fold(f64::INFINITY, f64::min);
    let amplitude = max - min;

    let peaks = means
        .iter()
        .filter(|&&(_, m)| m > max * 0.9)
        .map(|&(month, _)| MONTH_NAMES[month])
        .collect();
    let lows = means
        .iter()
        .filter(|&&(_, m)| m < min * 1.1)
        .map(|&(month, _)| MONTH_NAMES[month])
        .collect();

    let overall = means.iter().map(|&(_, m)| m).sum::<f64>() / means.len() as f64;
    let variance =
        means.iter().map(|&(_, m)| (m - overall).powi(2)).sum::<f64>() / means.len() as f64;
    let confidence = if amplitude > 0.0 {
        (1.0 - variance / (amplitude * amplitude)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(SeasonalPattern {
        parameter,
        peaks,
        lows,
        amplitude,
        confidence,
    })
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub parameter: Parameter,
    pub predicted_value: f64,
    /// 95% interval; the lower bound never goes below zero.
    pub confidence_interval: (f64, f64),
    pub prediction_date: DateTime<Utc>,
    pub confidence: f64,
}

/// Moving average of the last five values, pushed forward by the slope of
/// the last three.
pub fn forecast(
    parameter: Parameter,
    values: &[f64],
    days_ahead: u32,
    now: DateTime<Utc>,
) -> Result<Forecast, IndexError> {
    if values.len() < MIN_TREND_POINTS {
        return Err(IndexError::InsufficientData {
            needed: MIN_TREND_POINTS,
            got: values.len(),
        });
    }
    let prediction_date = now
        .checked_add_signed(Duration::days(i64::from(days_ahead)))
        .ok_or_else(|| IndexError::InvalidInput(format!("{days_ahead} days ahead is out of range")))?;

    let recent = &values[values.len().saturating_sub(FORECAST_WINDOW)..];
    let n = recent.len() as f64;
    let mean = recent.iter().sum::<f64>() / n;
    let slope = (recent[recent.len() - 1] - recent[recent.len() - 3]) / 2.0;
    let raw = mean + slope * f64::from(days_ahead) / 30.0;

    let std_dev = (recent.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let margin = std_dev * FORECAST_Z;
    let ratio = std_dev / mean;
    let confidence = if ratio.is_finite() {
        (1.0 - ratio).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(Forecast {
        parameter,
        predicted_value: raw.max(0.0),
        confidence_interval: ((raw - margin).max(0.0), raw + margin),
        prediction_date,
        confidence,
    })
}

/// Level from the HPI forecast; `None` without one.
pub fn forecast_warning_level(forecasts: &[Forecast]) -> WarningLevel {
    let Some(hpi) = forecasts.iter().find(|f| f.parameter == Parameter::Hpi) else {
        return WarningLevel::None;
    };
    if hpi.predicted_value > 300.0 {
        WarningLevel::Critical
    } else if hpi.predicted_value > 200.0 {
        WarningLevel::High
    } else if hpi.predicted_value > 100.0 {
        WarningLevel::Medium
    } else {
        WarningLevel::Low
    }
}

/// Human-readable warning derived from an analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub level: WarningLevel,
    pub message: String,
    pub parameters: Vec<Parameter>,
    pub recommended_actions: Vec<&'static str>,
}

pub fn trend_advisory(trends: &[TrendAnalysis]) -> Option<Advisory> {
    let level = trend_warning_level(trends);
    if level == WarningLevel::None {
        return None;
    }
    let parameters: Vec<Parameter> = trends
        .iter()
        .filter(|t| {
            t.direction == Direction::Increasing
                && t.confidence > 0.7
                && t.parameter.is_contamination_index()
        })
        .map(|t| t.parameter)
        .collect();
    if parameters.is_empty() {
        return None;
    }
    let names: Vec<&str> = parameters.iter().map(|p| p.as_str()).collect();
    Some(Advisory {
        level,
        message: format!("Increasing contamination trends detected in {}", names.join(", ")),
        parameters,
        recommended_actions: vec![
            "Increase monitoring frequency",
            "Investigate contamination sources",
            "Consider water treatment options",
            "Alert local authorities",
        ],
    })
}

pub fn forecast_advisory(forecasts: &[Forecast]) -> Option<Advisory> {
    let level = forecast_warning_level(forecasts);
    let critical = forecasts
        .iter()
        .any(|f| f.parameter == Parameter::Hpi && f.predicted_value > 200.0);
    if !critical {
        return None;
    }
    Some(Advisory {
        level,
        message: "Critical HPI levels predicted in the near future".to_string(),
        parameters: vec![Parameter::Hpi],
        recommended_actions: vec![
            "Implement immediate water treatment",
            "Seek alternative water sources",
            "Notify health authorities",
            "Prepare emergency response plan",
        ],
    })
}
