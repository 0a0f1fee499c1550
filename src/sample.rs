use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IndexError;

/// Upper bound accepted at entry for any concentration, in ppm.
pub const MAX_CONCENTRATION_PPM: f64 = 10.0;

/// The seven heavy metals measured in every sample.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metal {
    Lead,
    Arsenic,
    Cadmium,
    Chromium,
    Copper,
    Iron,
    Zinc,
}

impl Metal {
    /// Canonical feature order, shared by the formulas and the model inputs.
    pub const ALL: [Metal; 7] = [
        Metal::Lead,
        Metal::Arsenic,
        Metal::Cadmium,
        Metal::Chromium,
        Metal::Copper,
        Metal::Iron,
        Metal::Zinc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metal::Lead => "lead",
            Metal::Arsenic => "arsenic",
            Metal::Cadmium => "cadmium",
            Metal::Chromium => "chromium",
            Metal::Copper => "copper",
            Metal::Iron => "iron",
            Metal::Zinc => "zinc",
        }
    }
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One groundwater measurement. Concentrations are in ppm.
///
/// Deserialization requires every field, so a record missing a metal is
/// rejected before it reaches the formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: String,
    pub sample_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub lead: f64,
    pub arsenic: f64,
    pub cadmium: f64,
    pub chromium: f64,
    pub copper: f64,
    pub iron: f64,
    pub zinc: f64,
}

impl Sample {
    /// Build a sample with a fresh internal id from concentrations in
    /// canonical order.
    pub fn new(
        sample_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        concentrations: [f64; 7],
    ) -> Self {
        let [lead, arsenic, cadmium, chromium, copper, iron, zinc] = concentrations;
        Sample {
            id: Uuid::new_v4().to_string(),
            sample_id: sample_id.into(),
            latitude,
            longitude,
            lead,
            arsenic,
            cadmium,
            chromium,
            copper,
            iron,
            zinc,
        }
    }

    pub fn concentration(&self, metal: Metal) -> f64 {
        match metal {
            Metal::Lead => self.lead,
            Metal::Arsenic => self.arsenic,
            Metal::Cadmium => self.cadmium,
            Metal::Chromium => self.chromium,
            Metal::Copper => self.copper,
            Metal::Iron => self.iron,
            Metal::Zinc => self.zinc,
        }
    }

    /// Concentrations as `[lead, arsenic, cadmium, chromium, copper, iron, zinc]`.
    pub fn features(&self) -> [f64; 7] {
        Metal::ALL.map(|m| self.concentration(m))
    }

    /// Entry-side guard. The calculation core assumes samples already passed it.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.sample_id.trim().is_empty() {
            return Err(IndexError::InvalidInput("sampleId must not be empty".into()));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(IndexError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(IndexError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        for metal in Metal::ALL {
            let c = self.concentration(metal);
            if !c.is_finite() || !(0.0..=MAX_CONCENTRATION_PPM).contains(&c) {
                return Err(IndexError::InvalidInput(format!(
                    "{metal} concentration {c} outside [0, {MAX_CONCENTRATION_PPM}] ppm"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        Sample::new("TEST-001", 12.9716, 77.5946, [0.015, 0.008, 0.004, 0.06, 2.5, 0.4, 4.2])
    }

    #[test]
    fn features_follow_canonical_order() {
        let s = sample();
        assert_eq!(s.features(), [0.015, 0.008, 0.004, 0.06, 2.5, 0.4, 4.2]);
        assert_eq!(s.concentration(Metal::Iron), 0.4);
    }

    #[test]
    fn new_assigns_distinct_ids() {
        assert_ne!(sample().id, sample().id);
    }

    #[test]
    fn validate_accepts_in_range_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let mut s = sample();
        s.latitude = 91.0;
        assert!(s.validate().is_err());

        let mut s = sample();
        s.longitude = -180.5;
        assert!(s.validate().is_err());

        let mut s = sample();
        s.cadmium = -0.001;
        assert!(s.validate().is_err());

        let mut s = sample();
        s.zinc = 10.5;
        assert!(s.validate().is_err());

        let mut s = sample();
        s.lead = f64::NAN;
        assert!(s.validate().is_err());

        let mut s = sample();
        s.sample_id = "  ".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn missing_metal_fails_to_deserialize() {
        let json = r#"{"id":"1","sampleId":"S1","latitude":0,"longitude":0,
            "lead":0,"arsenic":0,"cadmium":0,"chromium":0,"copper":0,"iron":0.3}"#;
        let parsed: Result<Sample, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn camel_case_round_trip_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("sampleId").is_some());
        assert!(json.get("sample_id").is_none());
    }
}
