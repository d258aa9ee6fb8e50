//! Scene catalog collaborator interface.
//!
//! Scene acquisition, cloud scoring, band harmonization and geometric
//! coregistration happen upstream; implementations of this trait deliver
//! analysis-ready scenes for an area of interest.

use crate::types::{BoundingBox, SceneCollection, SedResult, Sensor};
use chrono::{DateTime, Utc};

/// Provider of harmonized, coregistered scene collections
pub trait SceneCatalog {
    /// Scenes intersecting the area of interest within the date range,
    /// carrying water index, vegetation index and cloud score bands
    fn load_scenes(
        &self,
        aoi: &BoundingBox,
        sensors: &[Sensor],
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> SedResult<SceneCollection>;
}
