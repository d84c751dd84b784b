use crate::ephemeris::frames::Vector3;
use crate::ephemeris::types::Body;
use crate::error::SourceError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Heliocentric rectangular coordinates (AU, mean ecliptic and equinox J2000)
/// returned by an ephemeris source for one TT Julian Day.
#[derive(Debug, Clone, PartialEq)]
pub struct HeliocentricFrame {
    pub jd_tt: f64,
    pub earth: Vector3,
    /// Requested bodies the source could supply. The Sun is the origin and
    /// never appears here.
    pub bodies: BTreeMap<Body, Vector3>,
}

impl HeliocentricFrame {
    pub fn get(&self, body: Body) -> Option<&Vector3> {
        self.bodies.get(&body)
    }
}

/// External provider of raw heliocentric coordinates.
///
/// Implementations may omit bodies they cannot supply; the transform drops
/// those bodies instead of failing the whole chart. A source that cannot
/// answer at all returns [`SourceError::Unavailable`].
#[async_trait]
pub trait EphemerisSource: Send + Sync {
    fn name(&self) -> &str;

    async fn heliocentric(
        &self,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError>;
}

#[async_trait]
impl<S: EphemerisSource + ?Sized> EphemerisSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn heliocentric(
        &self,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError> {
        (**self).heliocentric(jd_tt, bodies).await
    }
}

/// Query a source with a deadline.
pub async fn fetch_with_timeout(
    source: &dyn EphemerisSource,
    jd_tt: f64,
    bodies: &[Body],
    timeout: Duration,
) -> Result<HeliocentricFrame, SourceError> {
    match tokio::time::timeout(timeout, source.heliocentric(jd_tt, bodies)).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!(
                "Ephemeris source '{}' timed out after {:?} (JD {:.5})",
                source.name(),
                timeout,
                jd_tt
            );
            Err(SourceError::Timeout {
                millis: timeout.as_millis() as u64,
            })
        }
    }
}
