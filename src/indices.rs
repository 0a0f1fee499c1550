//! Closed-form pollution indices.
//!
//! Every function here is pure and total over finite concentrations. The
//! enrichment factor is the one index with a degenerate input (zero iron) and
//! reports it as [`IndexError::DegenerateReference`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::narrative::risk_assessment;
use crate::sample::{Metal, Sample};
use crate::standards::{background_ratio, standard, REFERENCE_METAL};

/// Step classification of HPI.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum SafetyLevel {
    Safe,
    Moderate,
    High,
    Critical,
}

impl SafetyLevel {
    /// Classifier output order.
    pub const ALL: [SafetyLevel; 4] = [
        SafetyLevel::Safe,
        SafetyLevel::Moderate,
        SafetyLevel::High,
        SafetyLevel::Critical,
    ];

    /// Lower bounds are inclusive: exactly 100 is `Moderate`.
    pub fn from_hpi(hpi: f64) -> Self {
        if hpi < 100.0 {
            SafetyLevel::Safe
        } else if hpi < 200.0 {
            SafetyLevel::Moderate
        } else if hpi < 300.0 {
            SafetyLevel::High
        } else {
            SafetyLevel::Critical
        }
    }

    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyLevel::Safe => "Safe",
            SafetyLevel::Moderate => "Moderate",
            SafetyLevel::High => "High",
            SafetyLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Ci / Si` for one metal.
pub fn concentration_ratio(sample: &Sample, metal: Metal) -> f64 {
    sample.concentration(metal) / standard(metal).limit_ppm
}

/// Heavy Metal Pollution Index, `Σ Wi × (Ci/Si) × 100`.
pub fn hpi(sample: &Sample) -> f64 {
    Metal::ALL.iter().fold(0.0, |acc, &metal| {
        let sub_index = concentration_ratio(sample, metal) * 100.0;
        acc + standard(metal).weight * sub_index
    })
}

/// Heavy Metal Evaluation Index, `max (Ci/Si)`.
pub fn hei(sample: &Sample) -> f64 {
    Metal::ALL
        .iter()
        .map(|&metal| concentration_ratio(sample, metal))
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Contamination degree, `Σ (Ci/Si)`.
pub fn contamination_degree(sample: &Sample) -> f64 {
    Metal::ALL
        .iter()
        .fold(0.0, |acc, &metal| acc + concentration_ratio(sample, metal))
}

/// Mean enrichment factor of the six non-reference metals, normalized by the
/// iron ratio and each metal's background ratio.
pub fn enrichment_factor(sample: &Sample) -> Result<f64, IndexError> {
    let reference_ratio = concentration_ratio(sample, REFERENCE_METAL);
    if reference_ratio == 0.0 {
        return Err(IndexError::DegenerateReference {
            metal: REFERENCE_METAL,
        });
    }

    let (sum, count) = Metal::ALL
        .iter()
        .filter(|&&metal| metal != REFERENCE_METAL)
        .map(|&metal| concentration_ratio(sample, metal) / (background_ratio(metal) * reference_ratio))
        .fold((0.0, 0usize), |(sum, n), ef| (sum + ef, n + 1));

    Ok(sum / count as f64)
}

/// HPI, HEI, Cd and EF for one sample.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct IndexSet {
    pub hpi: f64,
    pub hei: f64,
    pub cd: f64,
    /// `None` when the reference metal is absent from the sample.
    pub ef: Option<f64>,
}

impl IndexSet {
    pub fn compute(sample: &Sample) -> Self {
        let ef = match enrichment_factor(sample) {
            Ok(ef) => Some(ef),
            Err(err) => {
                tracing::warn!(sample_id = %sample.sample_id, error = %err, "enrichment factor undefined");
                None
            }
        };
        IndexSet {
            hpi: hpi(sample),
            hei: hei(sample),
            cd: contamination_degree(sample),
            ef,
        }
    }
}

/// Formula-only output for one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollutionIndexResult {
    pub sample_id: String,
    pub hpi: f64,
    pub hei: f64,
    pub cd: f64,
    pub ef: Option<f64>,
    pub safety_level: SafetyLevel,
    pub risk_assessment: String,
}

impl PollutionIndexResult {
    pub fn from_formulas(sample: &Sample) -> Self {
        let set = IndexSet::compute(sample);
        PollutionIndexResult {
            sample_id: sample.sample_id.clone(),
            hpi: set.hpi,
            hei: set.hei,
            cd: set.cd,
            ef: set.ef,
            safety_level: SafetyLevel::from_hpi(set.hpi),
            risk_assessment: risk_assessment(set.hpi, set.hei, set.cd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(c: [f64; 7]) -> Sample {
        Sample::new("T", 0.0, 0.0, c)
    }

    #[test]
    fn iron_at_standard_only() {
        let s = sample([0.0, 0.0, 0.0, 0.0, 0.0, 0.3, 0.0]);
        assert!((hpi(&s) - 10.0).abs() < 1e-12);
        assert!((hei(&s) - 1.0).abs() < 1e-12);
        assert!((contamination_degree(&s) - 1.0).abs() < 1e-12);
        assert_eq!(SafetyLevel::from_hpi(hpi(&s)), SafetyLevel::Safe);
        assert_eq!(enrichment_factor(&s).unwrap(), 0.0);
    }

    #[test]
    fn lead_five_times_standard() {
        let s = sample([0.05, 0.01, 0.003, 0.05, 2.0, 0.3, 3.0]);
        assert!((hpi(&s) - 180.0).abs() < 1e-9);
        assert!((hei(&s) - 5.0).abs() < 1e-9);
        assert!((contamination_degree(&s) - 11.0).abs() < 1e-9);
        assert_eq!(SafetyLevel::from_hpi(hpi(&s)), SafetyLevel::Moderate);
    }

    #[test]
    fn all_metals_triple_standard() {
        let s = sample([0.03, 0.03, 0.009, 0.15, 6.0, 0.9, 9.0]);
        let set = IndexSet::compute(&s);
        assert!((set.hei - 3.0).abs() < 1e-9);
        assert!((set.cd - 21.0).abs() < 1e-9);
        assert!((set.hpi - 300.0).abs() < 1e-9);
        assert_eq!(SafetyLevel::from_hpi(set.hpi), SafetyLevel::Critical);
    }

    #[test]
    fn enrichment_factor_at_standards() {
        // every ratio is 1, so each ef_i is 1 / background_i
        let s = sample([0.01, 0.01, 0.003, 0.05, 2.0, 0.3, 3.0]);
        let expected = (1.0 / 0.5 + 1.0 / 0.3 + 1.0 / 0.2 + 1.0 / 0.8 + 1.0 / 1.2 + 1.0 / 0.9) / 6.0;
        assert!((enrichment_factor(&s).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_iron_is_degenerate() {
        let s = sample([0.01, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            enrichment_factor(&s),
            Err(IndexError::DegenerateReference { metal: Metal::Iron })
        ));
        let set = IndexSet::compute(&s);
        assert_eq!(set.ef, None);
        assert!((set.hpi - 20.0).abs() < 1e-9);
    }

    #[test]
    fn breakpoints_are_closed_below() {
        assert_eq!(SafetyLevel::from_hpi(99.999), SafetyLevel::Safe);
        assert_eq!(SafetyLevel::from_hpi(100.0), SafetyLevel::Moderate);
        assert_eq!(SafetyLevel::from_hpi(200.0), SafetyLevel::High);
        assert_eq!(SafetyLevel::from_hpi(300.0), SafetyLevel::Critical);
        assert_eq!(SafetyLevel::from_hpi(1e9), SafetyLevel::Critical);
    }

    #[test]
    fn class_index_mapping() {
        assert_eq!(SafetyLevel::from_class_index(0), Some(SafetyLevel::Safe));
        assert_eq!(SafetyLevel::from_class_index(3), Some(SafetyLevel::Critical));
        assert_eq!(SafetyLevel::from_class_index(4), None);
    }

    #[test]
    fn formula_result_carries_narrative() {
        // HEI is exactly 1, which already leaves the suitable tier
        let s = sample([0.0, 0.0, 0.0, 0.0, 0.0, 0.3, 0.0]);
        let result = PollutionIndexResult::from_formulas(&s);
        assert_eq!(result.safety_level, SafetyLevel::Safe);
        assert!(result.risk_assessment.starts_with("Groundwater quality is moderately"));
    }

    fn concentrations() -> impl Strategy<Value = [f64; 7]> {
        prop::array::uniform7(0.0..10.0f64)
    }

    proptest! {
        #[test]
        fn indices_are_deterministic(c in concentrations()) {
            let s = sample(c);
            prop_assert_eq!(hpi(&s).to_bits(), hpi(&s).to_bits());
            prop_assert_eq!(hei(&s).to_bits(), hei(&s).to_bits());
            prop_assert_eq!(contamination_degree(&s).to_bits(), contamination_degree(&s).to_bits());
            let ef_a = enrichment_factor(&s).ok().map(f64::to_bits);
            let ef_b = enrichment_factor(&s).ok().map(f64::to_bits);
            prop_assert_eq!(ef_a, ef_b);
        }

        #[test]
        fn raising_one_metal_never_lowers_indices(
            c in concentrations(),
            idx in 0usize..7,
            bump in 0.0..5.0f64,
        ) {
            let base = sample(c);
            let mut raised = c;
            raised[idx] += bump;
            let raised = sample(raised);
            prop_assert!(hpi(&raised) >= hpi(&base));
            prop_assert!(hei(&raised) >= hei(&base));
            prop_assert!(contamination_degree(&raised) >= contamination_degree(&base));
        }

        #[test]
        fn safety_level_is_non_decreasing(a in 0.0..1000.0f64, b in 0.0..1000.0f64) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(SafetyLevel::from_hpi(lo) <= SafetyLevel::from_hpi(hi));
        }
    }
}
