pub mod constants;
pub mod parameters;

pub use parameters::{AutoconvolutionParameters, SampleForm, SamplingParameters};
