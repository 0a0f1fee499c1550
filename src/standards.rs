use serde::Serialize;

use crate::sample::Metal;

/// Regulatory limit `Si` (ppm) and HPI weight `Wi` for one metal.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Standard {
    pub limit_ppm: f64,
    pub weight: f64,
}

/// Reference element for the enrichment factor.
pub const REFERENCE_METAL: Metal = Metal::Iron;

/// Standard table. Weights sum to 1.0 across the seven metals.
pub const fn standard(metal: Metal) -> Standard {
    match metal {
        Metal::Lead => Standard { limit_ppm: 0.01, weight: 0.20 },
        Metal::Arsenic => Standard { limit_ppm: 0.01, weight: 0.20 },
        Metal::Cadmium => Standard { limit_ppm: 0.003, weight: 0.20 },
        Metal::Chromium => Standard { limit_ppm: 0.05, weight: 0.15 },
        Metal::Copper => Standard { limit_ppm: 2.0, weight: 0.10 },
        Metal::Iron => Standard { limit_ppm: 0.3, weight: 0.10 },
        Metal::Zinc => Standard { limit_ppm: 3.0, weight: 0.05 },
    }
}

/// Assumed geological background ratio against the reference element.
pub const fn background_ratio(metal: Metal) -> f64 {
    match metal {
        Metal::Lead => 0.5,
        Metal::Arsenic => 0.3,
        Metal::Cadmium => 0.2,
        Metal::Chromium => 0.8,
        Metal::Copper => 1.2,
        Metal::Iron => 1.0,
        Metal::Zinc => 0.9,
    }
}

/// Treatment action limits used by the recommendation engine. These are
/// stricter or looser than the standards on purpose and are not interchangeable.
pub const ACTION_LIMITS_PPM: [(Metal, f64); 4] = [
    (Metal::Lead, 0.015),
    (Metal::Arsenic, 0.010),
    (Metal::Cadmium, 0.005),
    (Metal::Chromium, 0.100),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = Metal::ALL.iter().map(|&m| standard(m).weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reference_background_is_unity() {
        assert_eq!(background_ratio(REFERENCE_METAL), 1.0);
    }

    #[test]
    fn limits_are_positive() {
        assert!(Metal::ALL.iter().all(|&m| standard(m).limit_ppm > 0.0));
    }
}
