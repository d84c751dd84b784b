use crate::ephemeris::types::Body;
use thiserror::Error;

/// Errors surfaced by the chart engine and its pure stages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AstroError {
    #[error("Invalid instant: {message}")]
    InvalidInstant { message: String },
    #[error("Ephemeris source '{source_name}' unavailable: {message}")]
    UpstreamUnavailable { source_name: String, message: String },
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
    #[error("Invalid aspect table: {message}")]
    InvalidAspectTable { message: String },
    #[error("Malformed chart line segment '{segment}': {message}")]
    ChartLine { segment: String, message: String },
    #[error("Unrecognised upstream payload: {message}")]
    UpstreamFormat { message: String },
}

impl AstroError {
    pub fn invalid_instant(message: impl Into<String>) -> Self {
        Self::InvalidInstant {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// True when the caller may reasonably retry or serve stale cache data.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

/// Errors reported by an [`EphemerisSource`](crate::ephemeris::EphemerisSource)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Ephemeris source unavailable: {message}")]
    Unavailable { message: String },
    #[error("No coordinates for {body} at JD {jd}")]
    MissingBody { body: Body, jd: f64 },
    #[error("Ephemeris request timed out after {millis} ms")]
    Timeout { millis: u64 },
}

impl SourceError {
    pub fn into_astro(self, source_name: &str) -> AstroError {
        AstroError::UpstreamUnavailable {
            source_name: source_name.to_string(),
            message: self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AstroError>;
