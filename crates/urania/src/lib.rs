//! Geocentric chart positions, sign/house placement, aspect detection and
//! transit windows.
//!
//! Raw heliocentric coordinates come from a pluggable [`EphemerisSource`];
//! [`MeanElementsSource`] is the built-in low-precision implementation.
//! [`ChartEngine`] ties the pipeline to an injected [`PositionCache`].

pub mod aspects;
pub mod cache;
pub mod chart;
pub mod config;
pub mod engine;
pub mod ephemeris;
pub mod error;
pub mod time;
pub mod transit;

pub use aspects::{detect_aspects, AspectKind, AspectMatch, AspectPoint, AspectTable};
pub use cache::{CacheKey, PositionCache};
pub use chart::{
    format_chart_line, resolve_sign_house, ChartLine, ChartSnapshot, HouseSystem, Sign,
    SignPlacement, SourceTag,
};
pub use config::EngineConfig;
pub use engine::ChartEngine;
pub use ephemeris::{
    Angle, Body, BodyPosition, ChartPoint, EphemerisSource, GeoLocation, Instant,
    MeanElementsSource, MissingBody,
};
pub use error::{AstroError, Result, SourceError};
pub use transit::{estimate_transit_period, TransitPeriod, TransitWindow};
