//! # sqw-core
//!
//! In-memory containers for dynamical structure factor spectra S(Q, ω):
//! per-atom, per-quantum-order intensity series on a shared frequency grid,
//! optionally resolved by scattering angle.
//!
//! [`SpectralData`] stores one 1-D series per atom and quantum order and
//! offers validation, merging, Debye-Waller scaling, autoconvolution of
//! higher orders, re-histogramming and threshold diagnostics.
//! [`AngleResolvedSpectralData`] carries the same structure with one
//! (angle × frequency) series per leaf, and converts to and from sequences
//! of flat containers, including a weighted reduction over angles.
//!
//! Everything is synchronous and in-memory; the only external boundary is
//! the interchange mapping produced by [`SpectralData::extract`].

pub mod common;
pub mod domain;
pub mod numerics;
pub mod spectra;

pub use common::parameters::{AutoconvolutionParameters, SampleForm, SamplingParameters};
pub use domain::{SpectralError, SpectralErrorKind, SpectralResult};
pub use spectra::{
    AngleResolvedSpectralData, AngleSpectralMap, SpectralData, SpectralMap, ThresholdCase,
};
