use crate::indices::{self, SafetyLevel};
use crate::sample::Sample;
use crate::standards::ACTION_LIMITS_PPM;

/// Model HPI vs formula HPI gap that calls for manual verification.
pub const FORMULA_DISCREPANCY: f64 = 50.0;

/// Primary vs ensemble HPI gap that calls for expert review.
pub const ENSEMBLE_DISCREPANCY: f64 = 30.0;

/// Signals the advisories are derived from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RecommendationInput {
    /// HPI the result reports (model output on the ML paths).
    pub hpi: f64,
    pub safety_level: SafetyLevel,
    pub is_anomaly: bool,
    pub ensemble_hpi: Option<f64>,
}

/// Advisories in rule order. Rules accumulate; none excludes another.
pub fn generate_recommendations(sample: &Sample, input: &RecommendationInput) -> Vec<String> {
    let mut out = Vec::new();

    if (input.hpi - indices::hpi(sample)).abs() > FORMULA_DISCREPANCY {
        out.push(
            "Significant discrepancy between ML prediction and calculated HPI. \
             Recommend manual verification."
                .to_string(),
        );
    }

    out.extend(safety_advisories(input.safety_level).iter().map(|s| s.to_string()));

    if input.is_anomaly {
        out.push("Unusual pattern detected in sample data. Recommend additional testing.".to_string());
    }

    if let Some(ensemble_hpi) = input.ensemble_hpi {
        if (input.hpi - ensemble_hpi).abs() > ENSEMBLE_DISCREPANCY {
            out.push(
                "Significant difference between primary and ensemble model predictions. \
                 Recommend expert review."
                    .to_string(),
            );
        }
    }

    for (metal, limit) in ACTION_LIMITS_PPM {
        if sample.concentration(metal) > limit {
            out.push(format!(
                "Elevated {metal} levels detected. Consider {metal}-specific treatment methods."
            ));
        }
    }

    out
}

fn safety_advisories(level: SafetyLevel) -> &'static [&'static str] {
    match level {
        SafetyLevel::Critical => &[
            "Immediate action required. Water not suitable for any use.",
            "Implement emergency water treatment protocols.",
            "Notify environmental authorities immediately.",
        ],
        SafetyLevel::High => &[
            "Water not suitable for drinking. Consider treatment before use.",
            "Implement water treatment solutions.",
        ],
        SafetyLevel::Moderate => {
            &["Water quality is moderate. Monitor regularly and consider treatment."]
        }
        SafetyLevel::Safe => &["Water quality is within safe limits for drinking and irrigation."],
    }
}
