//! Spectral data containers: per-atom, per-quantum-order intensity series on
//! a shared frequency grid, either flat or resolved by scattering angle.

pub mod by_angle;
pub mod sdata;

pub use by_angle::{
    AngleAtomEntryMap, AngleOrderSeriesMap, AngleResolvedSpectralData, AngleSpectralMap,
};
pub use sdata::{AtomEntryMap, OrderSeriesMap, SpectralData, SpectralMap, ThresholdCase};

use std::collections::BTreeMap;

use crate::common::constants::{ATOM_LABEL, FREQUENCIES_LABEL, S_LABEL};
use crate::domain::{SpectralError, SpectralResult};

/// Reject keys that are not valid atom entries of the data mapping.
pub(crate) fn validate_atom_key(key: &str) -> SpectralResult<()> {
    if key == FREQUENCIES_LABEL {
        // Legacy schema guard: frequency grids once travelled inside the data
        // mapping and must never do so again.
        return Err(SpectralError::ReservedFrequenciesKey);
    }
    if !key.contains(ATOM_LABEL) {
        return Err(SpectralError::InvalidDataKeyword {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Strip the interchange `'s'` layer from each atom entry, validating that
/// every entry holds exactly that key.
pub(crate) fn flatten_entries<T>(
    data: BTreeMap<String, BTreeMap<String, T>>,
) -> SpectralResult<BTreeMap<String, T>> {
    let mut flat = BTreeMap::new();
    for (atom_key, mut entry) in data {
        validate_atom_key(&atom_key)?;
        let series = match entry.remove(S_LABEL) {
            Some(series) if entry.is_empty() => series,
            _ => return Err(SpectralError::InvalidAtomEntry { atom_key }),
        };
        flat.insert(atom_key, series);
    }
    Ok(flat)
}
