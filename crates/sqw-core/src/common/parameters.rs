//! Configuration value objects injected into the spectral operations.
//!
//! There is deliberately no process-wide parameter registry: callers pass
//! these small structs into the operations that need them, so every numeric
//! knob is visible at the call site and trivially replaced in tests.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Recognized sample forms; the empty string in container metadata means
/// "unset" and is not a member of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleForm {
    Powder,
    SingleCrystal,
}

impl SampleForm {
    pub const ALL: [SampleForm; 2] = [SampleForm::Powder, SampleForm::SingleCrystal];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Powder => "Powder",
            Self::SingleCrystal => "SingleCrystal",
        }
    }

    /// Resolve a metadata tag to a recognized sample form.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|form| form.as_str() == tag)
    }

    pub fn known_tags() -> [&'static str; 2] {
        [Self::Powder.as_str(), Self::SingleCrystal.as_str()]
    }
}

impl Display for SampleForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls for synthesizing higher quantum orders by repeated convolution
/// with the fundamental spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoconvolutionParameters {
    /// Highest quantum order to synthesize.
    pub max_order: usize,
    /// The convolution kernel is normalized to sum to this value.
    pub scale: f64,
}

impl Default for AutoconvolutionParameters {
    fn default() -> Self {
        Self {
            max_order: 10,
            scale: 1.0,
        }
    }
}

/// Thresholds used by the small-intensity diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParameters {
    pub s_absolute_threshold: f64,
    pub s_relative_threshold: f64,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            s_absolute_threshold: 1.0e-7,
            s_relative_threshold: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AutoconvolutionParameters, SampleForm, SamplingParameters};

    #[test]
    fn sample_form_tags_round_trip() {
        for form in SampleForm::ALL {
            assert_eq!(SampleForm::from_tag(form.as_str()), Some(form));
            assert_eq!(form.to_string(), form.as_str());
        }
    }

    #[test]
    fn sample_form_rejects_unknown_and_unset_tags() {
        assert_eq!(SampleForm::from_tag(""), None);
        assert_eq!(SampleForm::from_tag("powder"), None);
        assert_eq!(SampleForm::from_tag("Liquid"), None);
    }

    #[test]
    fn parameter_defaults_match_reference_values() {
        let autoconvolution = AutoconvolutionParameters::default();
        assert_eq!(autoconvolution.max_order, 10);
        assert_eq!(autoconvolution.scale, 1.0);

        let sampling = SamplingParameters::default();
        assert_eq!(sampling.s_absolute_threshold, 1.0e-7);
        assert_eq!(sampling.s_relative_threshold, 0.01);
    }

    #[test]
    fn parameters_serialize_as_plain_objects() {
        let sampling = SamplingParameters::default();
        let json = serde_json::to_value(sampling).expect("sampling parameters should serialize");
        assert_eq!(json["s_relative_threshold"], 0.01);

        let restored: SamplingParameters =
            serde_json::from_value(json).expect("sampling parameters should deserialize");
        assert_eq!(restored, sampling);
    }
}
