pub mod errors;

pub use errors::{SpectralError, SpectralErrorKind, SpectralResult};
