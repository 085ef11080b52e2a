//! # pb-viz
//!
//! Visualization data artifacts for probitstat.
//!
//! This crate is intentionally dependency-light and focuses on emitting
//! plot-friendly JSON structures (arrays instead of nested objects).

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Dose-response line with confidence band.
pub mod dose_response;

/// Profile likelihood curves.
pub mod profile;

pub use dose_response::{DEFAULT_LINE_POINTS, DoseMarker, DoseResponseArtifact, ObservedPoint};
pub use profile::{ProfileCurveArtifact, ProfileCurvePoint, profile_curves};

use pb_core::Result;
use pb_inference::ProbitFit;
use serde::{Deserialize, Serialize};

/// All artifacts for one fit, as returned by `artifacts=true` requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbitArtifacts {
    /// Dose-response line and band.
    pub dose_response: DoseResponseArtifact,
    /// One profile curve per level.
    pub profiles: Vec<ProfileCurveArtifact>,
}

impl ProbitArtifacts {
    /// Build every artifact for `fit`.
    pub fn from_fit(fit: &ProbitFit, n_points: usize) -> Result<Self> {
        Ok(Self {
            dose_response: DoseResponseArtifact::from_fit(fit, n_points)?,
            profiles: profile_curves(fit),
        })
    }
}
