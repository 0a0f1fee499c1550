/// Formula documentation appended to every narrative.
pub const FORMULA_NOTE: &str = "HPI Formula: Σ(Wi × (Ci/Si) × 100). HEI Formula: (Ci/Si)max. \
Cd Formula: Σ(Ci/Si). EF Formula: (Ci/Cref)sample / (Ci/Cref)background.";

/// Narrative tier. Each tier requires all three indices under its bounds, so
/// it can sit below the HPI-only safety level for the same sample.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RiskTier {
    Suitable,
    Moderate,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_indices(hpi: f64, hei: f64, cd: f64) -> Self {
        if hpi < 100.0 && hei < 1.0 && cd < 7.0 {
            RiskTier::Suitable
        } else if hpi < 200.0 && hei < 2.0 && cd < 14.0 {
            RiskTier::Moderate
        } else if hpi < 300.0 && hei < 3.0 && cd < 21.0 {
            RiskTier::High
        } else {
            RiskTier::Critical
        }
    }

    pub fn statement(self) -> &'static str {
        match self {
            RiskTier::Suitable => "Groundwater quality is suitable for drinking and irrigation.",
            RiskTier::Moderate => {
                "Groundwater quality is moderately contaminated. Use with caution."
            }
            RiskTier::High => {
                "Groundwater quality is highly contaminated. Not suitable for drinking."
            }
            RiskTier::Critical => {
                "Groundwater quality is critically contaminated. Not suitable for any use."
            }
        }
    }
}

/// Risk narrative for a set of indices, followed by the formula note.
pub fn risk_assessment(hpi: f64, hei: f64, cd: f64) -> String {
    format!("{} {}", RiskTier::from_indices(hpi, hei, cd).statement(), FORMULA_NOTE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::SafetyLevel;

    #[test]
    fn clean_sample_is_suitable() {
        let text = risk_assessment(10.0, 0.5, 1.0);
        assert!(text.starts_with("Groundwater quality is suitable"));
        assert!(text.ends_with(FORMULA_NOTE));
    }

    #[test]
    fn every_index_must_clear_the_tier() {
        assert_eq!(RiskTier::from_indices(50.0, 1.0, 1.0), RiskTier::Moderate);
        assert_eq!(RiskTier::from_indices(50.0, 0.5, 7.0), RiskTier::Moderate);
        assert_eq!(RiskTier::from_indices(150.0, 2.5, 10.0), RiskTier::High);
        assert_eq!(RiskTier::from_indices(250.0, 2.9, 20.9), RiskTier::High);
        assert_eq!(RiskTier::from_indices(300.0, 0.0, 0.0), RiskTier::Critical);
    }

    #[test]
    fn narrative_can_disagree_with_safety_level() {
        // lead at five times its limit, everything else at the limit
        let (hpi, hei, cd) = (180.0, 5.0, 11.0);
        assert_eq!(SafetyLevel::from_hpi(hpi), SafetyLevel::Moderate);
        assert_eq!(RiskTier::from_indices(hpi, hei, cd), RiskTier::Critical);
    }
}
