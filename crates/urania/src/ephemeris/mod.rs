pub mod elements;
pub mod frames;
pub mod source;
pub mod transform;
pub mod types;
pub mod upstream;

pub use elements::MeanElementsSource;
pub use source::{fetch_with_timeout, EphemerisSource, HeliocentricFrame};
pub use transform::{CoordinateTransform, MissingBody, TransformOptions, TransformOutput};
pub use types::*;
pub use upstream::{normalize, normalize_str, NormalizedPositions};
