//! Container for dynamical structure factor spectra S(Q, ω), arranged by atom
//! and quantum order over a shared frequency grid.
//!
//! The container validates on construction and stays internally consistent
//! afterwards: every stored series has the same length as the frequency grid,
//! and the grid is sorted low to high.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::ops::Range;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::common::constants::{
    ABS_TOLERANCE, FREQUENCIES_LABEL, REL_TOLERANCE, S_LABEL, atom_key, order_key, trailing_index,
};
use crate::common::parameters::{AutoconvolutionParameters, SampleForm, SamplingParameters};
use crate::domain::{SpectralError, SpectralResult};
use crate::numerics;

use super::{flatten_entries, validate_atom_key};

/// Per-atom series keyed by quantum order, e.g. `order_1`.
pub type OrderSeriesMap = BTreeMap<String, Vec<f64>>;
/// Interchange-shaped atom entry: exactly one `s` key.
pub type AtomEntryMap = BTreeMap<String, OrderSeriesMap>;
/// Interchange-shaped spectral mapping keyed by atom, e.g. `atom_0`.
pub type SpectralMap = BTreeMap<String, AtomEntryMap>;

/// One diagnostic case recorded by [`SpectralData::check_thresholds`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCase {
    pub atom_key: String,
    pub order_key: String,
    pub max_s: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectralData {
    frequencies: Vec<f64>,
    temperature: Option<f64>,
    sample_form: String,
    data: BTreeMap<String, OrderSeriesMap>,
}

impl SpectralData {
    /// Validating constructor from an interchange-shaped mapping.
    pub fn new(
        data: SpectralMap,
        frequencies: Vec<f64>,
        temperature: Option<f64>,
        sample_form: impl Into<String>,
    ) -> SpectralResult<Self> {
        let flat = flatten_entries(data)?;
        Self::build(flat, frequencies, temperature, sample_form)
    }

    pub(crate) fn build(
        data: BTreeMap<String, OrderSeriesMap>,
        frequencies: Vec<f64>,
        temperature: Option<f64>,
        sample_form: impl Into<String>,
    ) -> SpectralResult<Self> {
        if let Some(value) = temperature {
            if !value.is_finite() {
                return Err(SpectralError::NonFiniteTemperature { value });
            }
        }

        if let Some(index) = numerics::first_unsorted_index(&frequencies) {
            return Err(SpectralError::UnsortedFrequencies {
                index,
                previous: frequencies[index - 1],
                current: frequencies[index],
            });
        }

        for (atom, orders) in &data {
            validate_atom_key(atom)?;
            for (order, series) in orders {
                if series.len() != frequencies.len() {
                    return Err(SpectralError::SeriesLengthMismatch {
                        atom_key: atom.clone(),
                        order_key: order.clone(),
                        expected: frequencies.len(),
                        actual: series.len(),
                    });
                }
            }
        }

        Ok(Self {
            frequencies,
            temperature,
            sample_form: sample_form.into(),
            data,
        })
    }

    /// Container with zero-filled series of the right length for every
    /// atom/order key pair, as a starting point for accumulation loops.
    pub fn get_empty<A, O>(
        frequencies: Vec<f64>,
        atom_keys: A,
        order_keys: O,
        temperature: Option<f64>,
        sample_form: impl Into<String>,
    ) -> SpectralResult<Self>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let order_keys: Vec<String> = order_keys.into_iter().map(Into::into).collect();
        let series_length = frequencies.len();

        let data = atom_keys
            .into_iter()
            .map(|atom| {
                let orders = order_keys
                    .iter()
                    .map(|order| (order.clone(), vec![0.0; series_length]))
                    .collect();
                (atom.into(), orders)
            })
            .collect();

        Self::build(data, frequencies, temperature, sample_form)
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn sample_form(&self) -> &str {
        &self.sample_form
    }

    /// Number of atom entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Atom keys in mapping order.
    pub fn atom_keys(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    pub(crate) fn series(&self) -> &BTreeMap<String, OrderSeriesMap> {
        &self.data
    }

    /// The uniform frequency spacing, or `None` for an irregular grid.
    pub fn bin_width(&self) -> Option<f64> {
        numerics::uniform_step(&self.frequencies, ABS_TOLERANCE, REL_TOLERANCE)
    }

    /// Elementwise sum over every atom and quantum order.
    pub fn total_intensity(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.frequencies.len()];
        for orders in self.data.values() {
            for series in orders.values() {
                for (slot, value) in total.iter_mut().zip(series) {
                    *slot += value;
                }
            }
        }
        total
    }

    pub fn check_finite_temperature(&self) -> SpectralResult<()> {
        match self.temperature {
            Some(value) if value > 0.0 => Ok(()),
            _ => Err(SpectralError::TemperatureNotPositive {
                temperature: self.temperature,
            }),
        }
    }

    pub fn check_known_sample_form(&self) -> SpectralResult<()> {
        match SampleForm::from_tag(&self.sample_form) {
            Some(_) => Ok(()),
            None => Err(SpectralError::UnknownSampleForm {
                sample_form: self.sample_form.clone(),
            }),
        }
    }

    /// The order-keyed series of atom `atom_<index>`.
    pub fn atom(&self, index: usize) -> SpectralResult<&OrderSeriesMap> {
        self.data
            .get(&atom_key(index))
            .ok_or(SpectralError::AtomIndexOutOfRange {
                index,
                atom_count: self.data.len(),
            })
    }

    /// Order-keyed series for a contiguous range of atom indices; the range
    /// is clamped to the atom count like sequence slicing.
    pub fn atom_range(&self, range: Range<usize>) -> SpectralResult<Vec<&OrderSeriesMap>> {
        let end = range.end.min(self.data.len());
        (range.start.min(end)..end)
            .map(|index| self.atom(index))
            .collect()
    }

    /// Merge another container into this one by atom and order: keys present
    /// in both are overwritten with the other's values, keys only in the
    /// other are appended, keys only in this container are untouched.
    pub fn update(&mut self, other: &SpectralData) -> SpectralResult<()> {
        if !numerics::all_within_tolerance(
            &self.frequencies,
            &other.frequencies,
            ABS_TOLERANCE,
            REL_TOLERANCE,
        ) {
            return Err(SpectralError::InconsistentFrequencies);
        }

        for (atom, orders) in &other.data {
            match self.data.get_mut(atom) {
                Some(existing) => {
                    for (order, series) in orders {
                        existing.insert(order.clone(), series.clone());
                    }
                }
                None => {
                    self.data.insert(atom.clone(), orders.clone());
                }
            }
        }
        Ok(())
    }

    /// Add interchange-shaped values elementwise into existing series. The
    /// atom/order keys must already be present; use [`Self::update`] to
    /// append new entries.
    pub fn add_dict(&mut self, data: &SpectralMap) -> SpectralResult<()> {
        for (atom, entry) in data {
            let source = match entry.get(S_LABEL) {
                Some(orders) if entry.len() == 1 => orders,
                _ => {
                    return Err(SpectralError::InvalidAtomEntry {
                        atom_key: atom.clone(),
                    });
                }
            };
            let target_orders =
                self.data
                    .get_mut(atom)
                    .ok_or_else(|| SpectralError::MissingAtomKey {
                        atom_key: atom.clone(),
                    })?;

            for (order, series) in source {
                let target =
                    target_orders
                        .get_mut(order)
                        .ok_or_else(|| SpectralError::MissingOrderKey {
                            atom_key: atom.clone(),
                            order_key: order.clone(),
                        })?;
                if series.len() != target.len() {
                    return Err(SpectralError::SeriesLengthMismatch {
                        atom_key: atom.clone(),
                        order_key: order.clone(),
                        expected: target.len(),
                        actual: series.len(),
                    });
                }
                for (slot, value) in target.iter_mut().zip(series) {
                    *slot += value;
                }
            }
        }
        Ok(())
    }

    /// Scale every series of atom `i` in orders `min_order..=max_order` by
    /// row `i` of the Debye-Waller factor array.
    pub fn apply_dw(
        &mut self,
        dw: &[Vec<f64>],
        min_order: usize,
        max_order: usize,
    ) -> SpectralResult<()> {
        if dw.len() != self.data.len() {
            return Err(SpectralError::DebyeWallerShapeMismatch {
                rows: dw.len(),
                atom_count: self.data.len(),
            });
        }

        for (atom_index, row) in dw.iter().enumerate() {
            if row.len() != self.frequencies.len() {
                return Err(SpectralError::DebyeWallerRowLength {
                    row: atom_index,
                    expected: self.frequencies.len(),
                    actual: row.len(),
                });
            }

            let key = atom_key(atom_index);
            let orders = self
                .data
                .get_mut(&key)
                .ok_or_else(|| SpectralError::MissingAtomKey {
                    atom_key: key.clone(),
                })?;

            for order in min_order..=max_order {
                let order_name = order_key(order);
                let series =
                    orders
                        .get_mut(&order_name)
                        .ok_or_else(|| SpectralError::MissingOrderKey {
                            atom_key: key.clone(),
                            order_key: order_name.clone(),
                        })?;
                for (value, scale) in series.iter_mut().zip(row) {
                    *value *= scale;
                }
            }
        }
        Ok(())
    }

    fn highest_existing_order(orders: &OrderSeriesMap) -> usize {
        let mut order = 1;
        while orders.contains_key(&order_key(order)) {
            order += 1;
        }
        order - 1
    }

    /// Atom by atom, synthesize higher-order spectra by repeated convolution
    /// with the fundamental. The kernel is the fundamental normalized to sum
    /// to `parameters.scale`; each convolution is a full convolution
    /// truncated back to the series length. Synthesis starts from the highest
    /// existing order and stops at `parameters.max_order`.
    ///
    /// Data must not have been broadened before this operation, or higher
    /// orders end up repeatedly broadened.
    pub fn add_autoconvolution_spectra(
        &mut self,
        parameters: &AutoconvolutionParameters,
    ) -> SpectralResult<()> {
        for (atom, orders) in &mut self.data {
            let fundamental_key = order_key(1);
            let fundamental =
                orders
                    .get(&fundamental_key)
                    .ok_or_else(|| SpectralError::MissingOrderKey {
                        atom_key: atom.clone(),
                        order_key: fundamental_key,
                    })?;

            let normalization = numerics::stable_sum(fundamental);
            if normalization == 0.0 {
                return Err(SpectralError::ZeroFundamental {
                    atom_key: atom.clone(),
                });
            }
            let kernel: Vec<f64> = fundamental
                .iter()
                .map(|value| value * parameters.scale / normalization)
                .collect();
            let series_length = fundamental.len();

            let start = Self::highest_existing_order(orders);
            debug!(
                atom = %atom,
                from_order = start,
                max_order = parameters.max_order,
                "synthesizing autoconvolution spectra"
            );

            for order in start..parameters.max_order {
                let source_key = order_key(order);
                let source =
                    orders
                        .get(&source_key)
                        .ok_or_else(|| SpectralError::MissingOrderKey {
                            atom_key: atom.clone(),
                            order_key: source_key,
                        })?;
                let mut spectrum = numerics::convolve_full(source, &kernel);
                spectrum.truncate(series_length);
                orders.insert(order_key(order + 1), spectrum);
            }
        }
        Ok(())
    }

    /// Re-histogram every series onto the grid defined by `bin_edges` and
    /// return the result on the bin midpoints. Values are accumulated, not
    /// interpolated, so this degrades resolution and is intended for moving
    /// to a coarser grid. Metadata is carried over unchanged.
    pub fn rebin(&self, bin_edges: &[f64]) -> SpectralResult<SpectralData> {
        if bin_edges.len() < 2 {
            return Err(SpectralError::BinEdgesTooShort {
                count: bin_edges.len(),
            });
        }
        if let Some(index) = numerics::first_unsorted_index(bin_edges) {
            return Err(SpectralError::UnsortedBinEdges {
                index,
                previous: bin_edges[index - 1],
                current: bin_edges[index],
            });
        }

        let new_frequencies = numerics::bin_midpoints(bin_edges);
        let data = self
            .data
            .iter()
            .map(|(atom, orders)| {
                let rebinned = orders
                    .iter()
                    .map(|(order, series)| {
                        (
                            order.clone(),
                            numerics::histogram_accumulate(&self.frequencies, bin_edges, series),
                        )
                    })
                    .collect();
                (atom.clone(), rebinned)
            })
            .collect();

        Self::build(
            data,
            new_frequencies,
            self.temperature,
            self.sample_form.clone(),
        )
    }

    /// Compare every series maximum against the configured thresholds and
    /// report the cases where `max(S) * relative < absolute`, sorted by atom
    /// then order index. Small-S cases are a data-quality warning, not an
    /// error: they are logged and returned, never raised.
    pub fn check_thresholds(&self, sampling: &SamplingParameters) -> Vec<ThresholdCase> {
        let mut cases = Vec::new();
        for (atom, orders) in &self.data {
            for (order, series) in orders {
                let max_s = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if max_s * sampling.s_relative_threshold < sampling.s_absolute_threshold {
                    cases.push(ThresholdCase {
                        atom_key: atom.clone(),
                        order_key: order.clone(),
                        max_s,
                    });
                }
            }
        }

        cases.sort_by_key(|case| {
            (
                trailing_index(&case.atom_key).unwrap_or(usize::MAX),
                trailing_index(&case.order_key).unwrap_or(usize::MAX),
            )
        });

        if !cases.is_empty() {
            warn!("some contributions had small S compared to threshold");
            warn!(
                "the minimum S threshold ({}) is greater than {}% of the maximum S for the following:",
                sampling.s_absolute_threshold,
                sampling.s_relative_threshold * 100.0
            );
            for case in &cases {
                warn!(
                    "{}, {}: max S {:10.4E}",
                    case.atom_key, case.order_key, case.max_s
                );
            }
        }

        cases
    }

    /// The interchange mapping handed to external consumers: every atom entry
    /// plus a `frequencies` key.
    pub fn extract(&self) -> Value {
        let mut root = Map::new();
        for (atom, orders) in &self.data {
            let series: Map<String, Value> = orders
                .iter()
                .map(|(order, values)| (order.clone(), json!(values)))
                .collect();
            let mut entry = Map::new();
            entry.insert(S_LABEL.to_string(), Value::Object(series));
            root.insert(atom.clone(), Value::Object(entry));
        }
        root.insert(FREQUENCIES_LABEL.to_string(), json!(self.frequencies));
        Value::Object(root)
    }

    /// Rebuild a container from an interchange mapping produced by
    /// [`Self::extract`]. The `frequencies` key becomes the grid; metadata is
    /// left unset (it does not travel through the interchange format).
    pub fn from_extracted(value: &Value) -> SpectralResult<Self> {
        let root = value
            .as_object()
            .ok_or_else(|| malformed("expected a top-level object"))?;

        let mut frequencies = None;
        let mut data = SpectralMap::new();
        for (key, entry) in root {
            if key == FREQUENCIES_LABEL {
                frequencies = Some(number_series(entry).ok_or_else(|| {
                    malformed("'frequencies' must be an array of numbers")
                })?);
                continue;
            }

            let entry_object = entry
                .as_object()
                .ok_or_else(|| malformed(format!("atom entry '{key}' must be an object")))?;
            let mut atom_entry = AtomEntryMap::new();
            for (sub_key, orders_value) in entry_object {
                let orders_object = orders_value.as_object().ok_or_else(|| {
                    malformed(format!("entry '{key}/{sub_key}' must be an object"))
                })?;
                let mut orders = OrderSeriesMap::new();
                for (order, series_value) in orders_object {
                    let series = number_series(series_value).ok_or_else(|| {
                        malformed(format!("series '{key}/{order}' must be an array of numbers"))
                    })?;
                    orders.insert(order.clone(), series);
                }
                atom_entry.insert(sub_key.clone(), orders);
            }
            data.insert(key.clone(), atom_entry);
        }

        let frequencies = frequencies.ok_or_else(|| malformed("missing 'frequencies' key"))?;
        Self::new(data, frequencies, None, "")
    }
}

impl Display for SpectralData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dynamical structure factor data ({} atoms, {} frequency bins)",
            self.data.len(),
            self.frequencies.len()
        )
    }
}

fn number_series(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

fn malformed(context: impl Into<String>) -> SpectralError {
    SpectralError::MalformedInterchange {
        context: context.into(),
    }
}
