//! Angle-resolved spectral container: the same atom/order structure as
//! [`SpectralData`], with one 2-D (angle × frequency) series per leaf.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::common::constants::{ABS_TOLERANCE, REL_TOLERANCE, S_LABEL};
use crate::domain::{SpectralError, SpectralResult};
use crate::numerics;

use super::sdata::{OrderSeriesMap, SpectralData, SpectralMap};
use super::{flatten_entries, validate_atom_key};

/// Per-atom 2-D series keyed by quantum order; rows are angles, columns are
/// frequencies.
pub type AngleOrderSeriesMap = BTreeMap<String, Vec<Vec<f64>>>;
/// Interchange-shaped atom entry: exactly one `s` key.
pub type AngleAtomEntryMap = BTreeMap<String, AngleOrderSeriesMap>;
/// Interchange-shaped angle-resolved mapping keyed by atom.
pub type AngleSpectralMap = BTreeMap<String, AngleAtomEntryMap>;

#[derive(Debug, Clone, PartialEq)]
pub struct AngleResolvedSpectralData {
    angles: Vec<f64>,
    frequencies: Vec<f64>,
    temperature: Option<f64>,
    sample_form: String,
    data: BTreeMap<String, AngleOrderSeriesMap>,
}

impl AngleResolvedSpectralData {
    /// Validating constructor from an interchange-shaped mapping.
    pub fn new(
        data: AngleSpectralMap,
        angles: Vec<f64>,
        frequencies: Vec<f64>,
        temperature: Option<f64>,
        sample_form: impl Into<String>,
    ) -> SpectralResult<Self> {
        let flat = flatten_entries(data)?;
        Self::build(flat, angles, frequencies, temperature, sample_form)
    }

    fn build(
        data: BTreeMap<String, AngleOrderSeriesMap>,
        angles: Vec<f64>,
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
            for (order, rows) in orders {
                let well_shaped = rows.len() == angles.len()
                    && rows.iter().all(|row| row.len() == frequencies.len());
                if !well_shaped {
                    return Err(SpectralError::AngleShapeMismatch {
                        atom_key: atom.clone(),
                        order_key: order.clone(),
                        expected_angles: angles.len(),
                        expected_frequencies: frequencies.len(),
                    });
                }
            }
        }

        Ok(Self {
            angles,
            frequencies,
            temperature,
            sample_form: sample_form.into(),
            data,
        })
    }

    /// Container with zero-filled (angles × frequencies) series for every
    /// atom/order key pair.
    pub fn get_empty<A, O>(
        angles: Vec<f64>,
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
        let angle_count = angles.len();
        let series_length = frequencies.len();

        let data = atom_keys
            .into_iter()
            .map(|atom| {
                let orders = order_keys
                    .iter()
                    .map(|order| (order.clone(), vec![vec![0.0; series_length]; angle_count]))
                    .collect();
                (atom.into(), orders)
            })
            .collect();

        Self::build(data, angles, frequencies, temperature, sample_form)
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
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

    /// Number of sampled angles.
    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// The spectra at one angle, with the shared metadata.
    pub fn angle(&self, index: usize) -> SpectralResult<SpectralData> {
        if index >= self.angles.len() {
            return Err(SpectralError::AngleIndexOutOfRange {
                index,
                angle_count: self.angles.len(),
            });
        }

        let data = self
            .data
            .iter()
            .map(|(atom, orders)| {
                let sliced: OrderSeriesMap = orders
                    .iter()
                    .map(|(order, rows)| (order.clone(), rows[index].clone()))
                    .collect();
                (atom.clone(), sliced)
            })
            .collect();

        SpectralData::build(
            data,
            self.frequencies.clone(),
            self.temperature,
            self.sample_form.clone(),
        )
    }

    /// Restrict to a contiguous subrange of angles; the range is clamped to
    /// the angle count like sequence slicing.
    pub fn angle_range(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.angles.len());
        let start = range.start.min(end);
        let indices: Vec<usize> = (start..end).collect();
        self.take_angles(&indices)
    }

    /// Restrict to an arbitrary (e.g. strided) selection of angle indices,
    /// in the given order.
    pub fn select_angles(&self, indices: &[usize]) -> SpectralResult<Self> {
        for &index in indices {
            if index >= self.angles.len() {
                return Err(SpectralError::AngleIndexOutOfRange {
                    index,
                    angle_count: self.angles.len(),
                });
            }
        }
        Ok(self.take_angles(indices))
    }

    fn take_angles(&self, indices: &[usize]) -> Self {
        let angles = indices.iter().map(|&index| self.angles[index]).collect();
        let data = self
            .data
            .iter()
            .map(|(atom, orders)| {
                let sliced = orders
                    .iter()
                    .map(|(order, rows)| {
                        (
                            order.clone(),
                            indices.iter().map(|&index| rows[index].clone()).collect(),
                        )
                    })
                    .collect();
                (atom.clone(), sliced)
            })
            .collect();

        Self {
            angles,
            frequencies: self.frequencies.clone(),
            temperature: self.temperature,
            sample_form: self.sample_form.clone(),
            data,
        }
    }

    /// Overwrite (or, with `add_to_existing`, accumulate into) one angle row
    /// of every matching atom/order series from a flat container.
    pub fn set_angle_data(
        &mut self,
        angle_index: usize,
        sdata: &SpectralData,
        add_to_existing: bool,
    ) -> SpectralResult<()> {
        if angle_index >= self.angles.len() {
            return Err(SpectralError::AngleIndexOutOfRange {
                index: angle_index,
                angle_count: self.angles.len(),
            });
        }

        for (atom, orders) in sdata.series() {
            self.write_angle_orders(angle_index, atom, orders, add_to_existing)?;
        }
        Ok(())
    }

    /// Same as [`Self::set_angle_data`], with an interchange-shaped mapping
    /// as the source.
    pub fn set_angle_data_from_dict(
        &mut self,
        angle_index: usize,
        data: &SpectralMap,
        add_to_existing: bool,
    ) -> SpectralResult<()> {
        if angle_index >= self.angles.len() {
            return Err(SpectralError::AngleIndexOutOfRange {
                index: angle_index,
                angle_count: self.angles.len(),
            });
        }

        for (atom, entry) in data {
            let orders = match entry.get(S_LABEL) {
                Some(orders) if entry.len() == 1 => orders,
                _ => {
                    return Err(SpectralError::InvalidAtomEntry {
                        atom_key: atom.clone(),
                    });
                }
            };
            self.write_angle_orders(angle_index, atom, orders, add_to_existing)?;
        }
        Ok(())
    }

    fn write_angle_orders(
        &mut self,
        angle_index: usize,
        atom: &str,
        orders: &OrderSeriesMap,
        add_to_existing: bool,
    ) -> SpectralResult<()> {
        let target_orders = self
            .data
            .get_mut(atom)
            .ok_or_else(|| SpectralError::MissingAtomKey {
                atom_key: atom.to_string(),
            })?;

        for (order, series) in orders {
            let rows = target_orders
                .get_mut(order)
                .ok_or_else(|| SpectralError::MissingOrderKey {
                    atom_key: atom.to_string(),
                    order_key: order.clone(),
                })?;
            let row = &mut rows[angle_index];
            if series.len() != row.len() {
                return Err(SpectralError::SeriesLengthMismatch {
                    atom_key: atom.to_string(),
                    order_key: order.clone(),
                    expected: row.len(),
                    actual: series.len(),
                });
            }

            if add_to_existing {
                for (slot, value) in row.iter_mut().zip(series) {
                    *slot += value;
                }
            } else {
                row.copy_from_slice(series);
            }
        }
        Ok(())
    }

    /// Assemble per-angle flat containers into one angle-resolved container.
    /// All inputs must agree on frequencies, temperature and sample form
    /// (within tolerance) and carry the same atom/order key sets.
    pub fn from_sdata_series(series: &[SpectralData], angles: Vec<f64>) -> SpectralResult<Self> {
        if series.len() != angles.len() {
            return Err(SpectralError::AngleCountMismatch {
                series_count: series.len(),
                angle_count: angles.len(),
            });
        }
        let Some(first) = series.first() else {
            return Err(SpectralError::EmptySpectraSeries);
        };

        for (index, sdata) in series.iter().enumerate().skip(1) {
            if !numerics::all_within_tolerance(
                first.frequencies(),
                sdata.frequencies(),
                ABS_TOLERANCE,
                REL_TOLERANCE,
            ) {
                return Err(SpectralError::MetadataMismatch {
                    property: "frequencies",
                    index,
                });
            }
            if !numerics::optional_within_tolerance(
                first.temperature(),
                sdata.temperature(),
                ABS_TOLERANCE,
                REL_TOLERANCE,
            ) {
                return Err(SpectralError::MetadataMismatch {
                    property: "temperature",
                    index,
                });
            }
            if first.sample_form() != sdata.sample_form() {
                return Err(SpectralError::MetadataMismatch {
                    property: "sample_form",
                    index,
                });
            }
            if !same_key_sets(first.series(), sdata.series()) {
                return Err(SpectralError::KeySetMismatch { index });
            }
        }

        let atom_keys: Vec<String> = first.series().keys().cloned().collect();
        let order_keys: Vec<String> = first
            .series()
            .values()
            .next()
            .map(|orders| orders.keys().cloned().collect())
            .unwrap_or_default();

        let mut collection = Self::get_empty(
            angles,
            first.frequencies().to_vec(),
            atom_keys,
            order_keys,
            first.temperature(),
            first.sample_form(),
        )?;
        for (angle_index, sdata) in series.iter().enumerate() {
            collection.set_angle_data(angle_index, sdata, false)?;
        }
        Ok(collection)
    }

    /// Weighted reduction over the angle dimension to a flat container.
    /// `average` weights every angle by 1/N and is mutually exclusive with
    /// explicit `weights`; with neither, angles are summed with unit weight.
    pub fn sum_over_angles(
        &self,
        average: bool,
        weights: Option<&[f64]>,
    ) -> SpectralResult<SpectralData> {
        let angle_count = self.angles.len();
        let weights = match (average, weights) {
            (true, Some(_)) => return Err(SpectralError::WeightsWithAverage),
            (true, None) => vec![1.0 / angle_count as f64; angle_count],
            (false, Some(values)) => {
                if values.len() != angle_count {
                    return Err(SpectralError::WeightsLengthMismatch {
                        weights: values.len(),
                        angle_count,
                    });
                }
                values.to_vec()
            }
            (false, None) => vec![1.0; angle_count],
        };

        let data = self
            .data
            .iter()
            .map(|(atom, orders)| {
                let reduced: OrderSeriesMap = orders
                    .iter()
                    .map(|(order, rows)| {
                        let mut total = vec![0.0; self.frequencies.len()];
                        for (row, &weight) in rows.iter().zip(&weights) {
                            for (slot, value) in total.iter_mut().zip(row) {
                                *slot += weight * value;
                            }
                        }
                        (order.clone(), total)
                    })
                    .collect();
                (atom.clone(), reduced)
            })
            .collect();

        SpectralData::build(
            data,
            self.frequencies.clone(),
            self.temperature,
            self.sample_form.clone(),
        )
    }
}

fn same_key_sets(
    lhs: &BTreeMap<String, OrderSeriesMap>,
    rhs: &BTreeMap<String, OrderSeriesMap>,
) -> bool {
    lhs.len() == rhs.len()
        && lhs.iter().zip(rhs).all(|((lhs_atom, lhs_orders), (rhs_atom, rhs_orders))| {
            lhs_atom == rhs_atom
                && lhs_orders.len() == rhs_orders.len()
                && lhs_orders.keys().zip(rhs_orders.keys()).all(|(l, r)| l == r)
        })
}

#[cfg(test)]
mod tests {
    use super::{AngleResolvedSpectralData, AngleSpectralMap};
    use crate::domain::{SpectralError, SpectralErrorKind};
    use crate::spectra::sdata::SpectralData;
    use std::collections::BTreeMap;

    fn raw_angle_map(entries: &[(&str, &[(&str, &[&[f64]])])]) -> AngleSpectralMap {
        entries
            .iter()
            .map(|(atom, orders)| {
                let series = orders
                    .iter()
                    .map(|(order, rows)| {
                        (
                            order.to_string(),
                            rows.iter().map(|row| row.to_vec()).collect(),
                        )
                    })
                    .collect();
                (
                    atom.to_string(),
                    BTreeMap::from([("s".to_string(), series)]),
                )
            })
            .collect()
    }

    fn two_angle_sample() -> AngleResolvedSpectralData {
        AngleResolvedSpectralData::new(
            raw_angle_map(&[(
                "atom_0",
                &[("order_1", &[&[2.0, 2.0, 2.0], &[4.0, 4.0, 4.0]])],
            )]),
            vec![0.0, 10.0],
            vec![0.0, 1.0, 2.0],
            Some(10.0),
            "Powder",
        )
        .expect("sample container should construct")
    }

    #[test]
    fn construction_rejects_badly_shaped_series() {
        let result = AngleResolvedSpectralData::new(
            raw_angle_map(&[("atom_0", &[("order_1", &[&[1.0, 1.0, 1.0]])])]),
            vec![0.0, 10.0],
            vec![0.0, 1.0, 2.0],
            None,
            "",
        );
        let error = result.expect_err("one row for two angles should be rejected");
        assert!(matches!(error, SpectralError::AngleShapeMismatch { .. }));
        assert_eq!(error.kind(), SpectralErrorKind::Validation);

        let result = AngleResolvedSpectralData::new(
            raw_angle_map(&[("atom_0", &[("order_1", &[&[1.0, 1.0], &[1.0, 1.0]])])]),
            vec![0.0, 10.0],
            vec![0.0, 1.0, 2.0],
            None,
            "",
        );
        assert!(matches!(
            result,
            Err(SpectralError::AngleShapeMismatch { .. })
        ));
    }

    #[test]
    fn get_empty_allocates_angle_by_frequency_rows() {
        let empty = AngleResolvedSpectralData::get_empty(
            vec![0.0, 10.0, 20.0],
            vec![0.0, 1.0],
            ["atom_0"],
            ["order_1", "order_2"],
            None,
            "",
        )
        .expect("empty container should construct");

        assert_eq!(empty.len(), 3);
        let flat = empty.angle(2).expect("angle 2 exists");
        assert_eq!(flat.atom(0).expect("atom_0")["order_2"], vec![0.0, 0.0]);
    }

    #[test]
    fn angle_access_returns_flat_spectra_with_shared_metadata() {
        let by_angle = two_angle_sample();
        let flat = by_angle.angle(1).expect("angle 1 exists");
        assert_eq!(flat.atom(0).expect("atom_0")["order_1"], vec![4.0, 4.0, 4.0]);
        assert_eq!(flat.temperature(), Some(10.0));
        assert_eq!(flat.sample_form(), "Powder");

        let error = by_angle.angle(2).expect_err("angle 2 is out of range");
        assert_eq!(error.kind(), SpectralErrorKind::Index);
    }

    #[test]
    fn set_angle_data_overwrites_or_accumulates_one_row() {
        let mut by_angle = two_angle_sample();
        let replacement = SpectralData::new(
            BTreeMap::from([(
                "atom_0".to_string(),
                BTreeMap::from([(
                    "s".to_string(),
                    BTreeMap::from([("order_1".to_string(), vec![1.0, 2.0, 3.0])]),
                )]),
            )]),
            vec![0.0, 1.0, 2.0],
            Some(10.0),
            "Powder",
        )
        .expect("replacement should construct");

        by_angle
            .set_angle_data(0, &replacement, false)
            .expect("overwrite should succeed");
        assert_eq!(
            by_angle.angle(0).expect("angle 0").atom(0).expect("atom_0")["order_1"],
            vec![1.0, 2.0, 3.0]
        );

        by_angle
            .set_angle_data(0, &replacement, true)
            .expect("accumulate should succeed");
        assert_eq!(
            by_angle.angle(0).expect("angle 0").atom(0).expect("atom_0")["order_1"],
            vec![2.0, 4.0, 6.0]
        );

        // the other angle row is untouched
        assert_eq!(
            by_angle.angle(1).expect("angle 1").atom(0).expect("atom_0")["order_1"],
            vec![4.0, 4.0, 4.0]
        );
    }

    #[test]
    fn set_angle_data_rejects_unknown_keys_and_bad_indices() {
        let mut by_angle = two_angle_sample();
        let foreign = SpectralData::new(
            BTreeMap::from([(
                "atom_7".to_string(),
                BTreeMap::from([(
                    "s".to_string(),
                    BTreeMap::from([("order_1".to_string(), vec![1.0, 1.0, 1.0])]),
                )]),
            )]),
            vec![0.0, 1.0, 2.0],
            None,
            "",
        )
        .expect("foreign container should construct");

        let error = by_angle
            .set_angle_data(0, &foreign, false)
            .expect_err("unknown atom key should be rejected");
        assert_eq!(error.kind(), SpectralErrorKind::KeyAbsent);

        let error = by_angle
            .set_angle_data(9, &foreign, false)
            .expect_err("angle index out of range");
        assert_eq!(error.kind(), SpectralErrorKind::Index);
    }

    #[test]
    fn sum_over_angles_defaults_to_unit_weights() {
        let by_angle = two_angle_sample();
        let total = by_angle
            .sum_over_angles(false, None)
            .expect("plain sum should succeed");
        assert_eq!(total.atom(0).expect("atom_0")["order_1"], vec![6.0, 6.0, 6.0]);
    }
}
