//! Key labels and numeric tolerances shared by the spectral containers.
//!
//! The interchange mapping is keyed by strings of the form `atom_<i>` and
//! `order_<n>`; these labels keep the format in one place.

/// Substring identifying an atom entry key, e.g. `atom_0`.
pub const ATOM_LABEL: &str = "atom";
/// Prefix of quantum-order keys, e.g. `order_1`.
pub const ORDER_LABEL: &str = "order";
/// The single recognized sub-key of an atom entry.
pub const S_LABEL: &str = "s";
/// Reserved top-level key of the interchange mapping.
pub const FREQUENCIES_LABEL: &str = "frequencies";

/// Relative tolerance for grid and metadata agreement checks.
pub const REL_TOLERANCE: f64 = 1.0e-5;
/// Absolute tolerance for grid and metadata agreement checks.
pub const ABS_TOLERANCE: f64 = 1.0e-8;

pub fn atom_key(index: usize) -> String {
    format!("{ATOM_LABEL}_{index}")
}

pub fn order_key(order: usize) -> String {
    format!("{ORDER_LABEL}_{order}")
}

/// Parse the trailing integer of a key such as `atom_3` or `order_12`.
pub fn trailing_index(key: &str) -> Option<usize> {
    key.rsplit('_').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::{atom_key, order_key, trailing_index};

    #[test]
    fn key_builders_and_parser_round_trip() {
        assert_eq!(atom_key(0), "atom_0");
        assert_eq!(order_key(12), "order_12");
        assert_eq!(trailing_index("atom_3"), Some(3));
        assert_eq!(trailing_index("order_12"), Some(12));
    }

    #[test]
    fn trailing_index_rejects_non_numeric_suffixes() {
        assert_eq!(trailing_index("atom_x"), None);
        assert_eq!(trailing_index(""), None);
        assert_eq!(trailing_index("frequencies"), None);
    }
}
