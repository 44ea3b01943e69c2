use thiserror::Error;

use crate::common::parameters::SampleForm;

pub type SpectralResult<T> = Result<T, SpectralError>;

/// Failure category, grouping error variants by the kind of contract they
/// break rather than by the operation that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectralErrorKind {
    /// A scalar value of the wrong shape for its slot.
    Type,
    /// Structural or metadata consistency violation.
    Validation,
    /// Positional access or dimension-count mismatch.
    Index,
    /// An operation-specific precondition check failed.
    Precondition,
    /// A referenced atom/order key does not exist.
    KeyAbsent,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectralError {
    #[error("temperature must be finite, got {value}")]
    NonFiniteTemperature { value: f64 },

    #[error("frequencies must be sorted low to high at index {index}: {previous} -> {current}")]
    UnsortedFrequencies {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("invalid keyword '{key}' in spectral data: entries must be atom keys")]
    InvalidDataKeyword { key: String },

    #[error("the spectral data format changed: do not put frequencies in the data mapping")]
    ReservedFrequenciesKey,

    #[error("atom entry '{atom_key}' must contain exactly the 's' key")]
    InvalidAtomEntry { atom_key: String },

    #[error("series '{atom_key}/{order_key}' has length {actual}, expected {expected}")]
    SeriesLengthMismatch {
        atom_key: String,
        order_key: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "series '{atom_key}/{order_key}' must be a 2-D (angles, frequencies) array of shape ({expected_angles}, {expected_frequencies})"
    )]
    AngleShapeMismatch {
        atom_key: String,
        order_key: String,
        expected_angles: usize,
        expected_frequencies: usize,
    },

    #[error("cannot update spectral data with inconsistent frequencies")]
    InconsistentFrequencies,

    #[error("property '{property}' must agree for all spectra being collected (mismatch at index {index})")]
    MetadataMismatch { property: &'static str, index: usize },

    #[error("atom/order keys of the spectra at index {index} do not match the first in the series")]
    KeySetMismatch { index: usize },

    #[error("cannot collect an empty series of spectra")]
    EmptySpectraSeries,

    #[error("cannot set weights while average is requested")]
    WeightsWithAverage,

    #[error("rebin requires at least two bin edges, got {count}")]
    BinEdgesTooShort { count: usize },

    #[error("bin edges must be sorted low to high at index {index}: {previous} -> {current}")]
    UnsortedBinEdges {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("fundamental spectrum of '{atom_key}' sums to zero; autoconvolution kernel is undefined")]
    ZeroFundamental { atom_key: String },

    #[error("Debye-Waller row {row} has length {actual}, expected {expected}")]
    DebyeWallerRowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("malformed interchange mapping: {context}")]
    MalformedInterchange { context: String },

    #[error("atom index {index} out of range for {atom_count} atoms")]
    AtomIndexOutOfRange { index: usize, atom_count: usize },

    #[error("angle index {index} out of range for {angle_count} angles")]
    AngleIndexOutOfRange { index: usize, angle_count: usize },

    #[error("atoms in spectral data do not match dimensions of Debye-Waller data: {rows} rows for {atom_count} atoms")]
    DebyeWallerShapeMismatch { rows: usize, atom_count: usize },

    #[error("number of angles {angle_count} is not consistent with length of spectra series {series_count}")]
    AngleCountMismatch {
        series_count: usize,
        angle_count: usize,
    },

    #[error("length of weights {weights} must match sampled angles {angle_count}")]
    WeightsLengthMismatch { weights: usize, angle_count: usize },

    #[error("invalid temperature {temperature:?}: expected a finite value greater than zero")]
    TemperatureNotPositive { temperature: Option<f64> },

    #[error("invalid sample form '{sample_form}': known sample forms are {known:?}", known = SampleForm::known_tags())]
    UnknownSampleForm { sample_form: String },

    #[error("atom key '{atom_key}' is not present in the spectral data")]
    MissingAtomKey { atom_key: String },

    #[error("order key '{order_key}' is not present for atom '{atom_key}'")]
    MissingOrderKey {
        atom_key: String,
        order_key: String,
    },
}

impl SpectralError {
    pub const fn kind(&self) -> SpectralErrorKind {
        match self {
            Self::NonFiniteTemperature { .. } => SpectralErrorKind::Type,

            Self::UnsortedFrequencies { .. }
            | Self::InvalidDataKeyword { .. }
            | Self::ReservedFrequenciesKey
            | Self::InvalidAtomEntry { .. }
            | Self::SeriesLengthMismatch { .. }
            | Self::AngleShapeMismatch { .. }
            | Self::InconsistentFrequencies
            | Self::MetadataMismatch { .. }
            | Self::KeySetMismatch { .. }
            | Self::EmptySpectraSeries
            | Self::WeightsWithAverage
            | Self::BinEdgesTooShort { .. }
            | Self::UnsortedBinEdges { .. }
            | Self::ZeroFundamental { .. }
            | Self::DebyeWallerRowLength { .. }
            | Self::MalformedInterchange { .. } => SpectralErrorKind::Validation,

            Self::AtomIndexOutOfRange { .. }
            | Self::AngleIndexOutOfRange { .. }
            | Self::DebyeWallerShapeMismatch { .. }
            | Self::AngleCountMismatch { .. }
            | Self::WeightsLengthMismatch { .. } => SpectralErrorKind::Index,

            Self::TemperatureNotPositive { .. } | Self::UnknownSampleForm { .. } => {
                SpectralErrorKind::Precondition
            }

            Self::MissingAtomKey { .. } | Self::MissingOrderKey { .. } => {
                SpectralErrorKind::KeyAbsent
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SpectralError, SpectralErrorKind};

    #[test]
    fn kind_mapping_is_stable() {
        let cases = [
            (
                SpectralError::NonFiniteTemperature { value: f64::NAN },
                SpectralErrorKind::Type,
            ),
            (
                SpectralError::ReservedFrequenciesKey,
                SpectralErrorKind::Validation,
            ),
            (
                SpectralError::AtomIndexOutOfRange {
                    index: 4,
                    atom_count: 2,
                },
                SpectralErrorKind::Index,
            ),
            (
                SpectralError::TemperatureNotPositive { temperature: None },
                SpectralErrorKind::Precondition,
            ),
            (
                SpectralError::MissingOrderKey {
                    atom_key: "atom_0".to_string(),
                    order_key: "order_3".to_string(),
                },
                SpectralErrorKind::KeyAbsent,
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "{error}");
        }
    }

    #[test]
    fn messages_name_the_offending_entry() {
        let error = SpectralError::SeriesLengthMismatch {
            atom_key: "atom_1".to_string(),
            order_key: "order_2".to_string(),
            expected: 8,
            actual: 7,
        };
        assert_eq!(
            error.to_string(),
            "series 'atom_1/order_2' has length 7, expected 8"
        );

        let error = SpectralError::UnknownSampleForm {
            sample_form: "Liquid".to_string(),
        };
        assert!(error.to_string().contains("Powder"));
        assert!(error.to_string().contains("SingleCrystal"));
    }
}
