//! Ephemeris sources shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use urania::ephemeris::HeliocentricFrame;
use urania::{Body, EphemerisSource, MeanElementsSource, SourceError};

/// Never answers.
pub struct UnavailableSource;

#[async_trait]
impl EphemerisSource for UnavailableSource {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn heliocentric(
        &self,
        _jd_tt: f64,
        _bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError> {
        Err(SourceError::Unavailable {
            message: "connection refused".to_string(),
        })
    }
}

/// Answers after `delay`, which is longer than any test timeout.
pub struct SlowSource {
    pub delay: Duration,
}

#[async_trait]
impl EphemerisSource for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    async fn heliocentric(
        &self,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(MeanElementsSource::new().frame(jd_tt, bodies))
    }
}

/// Refuses one body with an error instead of omitting it.
pub struct RefusingSource {
    pub refused: Body,
}

#[async_trait]
impl EphemerisSource for RefusingSource {
    fn name(&self) -> &str {
        "refusing"
    }

    async fn heliocentric(
        &self,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError> {
        if bodies.contains(&self.refused) {
            return Err(SourceError::MissingBody {
                body: self.refused,
                jd: jd_tt,
            });
        }
        Ok(MeanElementsSource::new().frame(jd_tt, bodies))
    }
}

/// Mean-elements source that counts requests.
#[derive(Default)]
pub struct CountingSource {
    inner: MeanElementsSource,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EphemerisSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn heliocentric(
        &self,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.heliocentric(jd_tt, bodies).await
    }
}

/// Fails its first `failures` requests, then answers from mean elements.
pub struct FlakySource {
    failures: usize,
    requests: AtomicUsize,
}

impl FlakySource {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EphemerisSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn heliocentric(
        &self,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError> {
        if self.requests.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(SourceError::Unavailable {
                message: "connection reset".to_string(),
            });
        }
        Ok(MeanElementsSource::new().frame(jd_tt, bodies))
    }
}
