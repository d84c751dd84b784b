pub mod calculator;
pub mod types;

pub use calculator::{angular_separation, detect_aspects, AspectCalculator, DEFAULT_EXACT_ORB};
pub use types::*;
