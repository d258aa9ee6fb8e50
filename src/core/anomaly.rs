//! Per-scene shoreline-elevation anomalies.
//!
//! The anomaly is the edge elevation minus the scene's reference (median)
//! elevation, smoothed with a fixed-radius mean kernel to suppress
//! edge-detection noise, and tagged with the scene's year offset.

use crate::core::calendar::whole_years_between;
use crate::core::morphology::focal_mean_square;
use crate::types::{CorrectedScene, SceneAnomaly};
use chrono::{DateTime, Utc};
use ndarray::Array2;

/// Anomaly extraction parameters
#[derive(Debug, Clone)]
pub struct AnomalyParams {
    /// Radius of the spatial averaging kernel, meters
    pub smoothing_radius_m: f64,
    /// Raster pixel size, meters
    pub pixel_size_m: f64,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            smoothing_radius_m: 30.0,
            pixel_size_m: 10.0,
        }
    }
}

/// Anomaly extractor
pub struct AnomalyExtractor {
    params: AnomalyParams,
}

impl AnomalyExtractor {
    pub fn new(params: AnomalyParams) -> Self {
        Self { params }
    }

    fn radius_px(&self) -> usize {
        ((self.params.smoothing_radius_m / self.params.pixel_size_m).round() as usize).max(1)
    }

    /// Smoothed elevation anomaly of one filtered scene
    pub fn extract(&self, scene: &CorrectedScene, start_date: DateTime<Utc>) -> SceneAnomaly {
        let edge = &scene.edge;
        let dims = edge.elevation.dim();

        let mut diff = Array2::from_elem(dims, f32::NAN);
        for ((i, j), v) in edge.elevation.indexed_iter() {
            if v.is_finite() && !edge.veg_adjacent[[i, j]] {
                diff[[i, j]] = v - scene.median_elevation;
            }
        }

        let smoothed = focal_mean_square(&diff, self.radius_px());

        // The kernel spreads values into masked pixels; keep every valid
        // edge pixel. Vegetation adjacency excludes a pixel from the
        // smoothing input only, not from the output footprint.
        let mut values = Array2::from_elem(dims, f32::NAN);
        for ((i, j), v) in smoothed.indexed_iter() {
            if edge.elevation[[i, j]].is_finite() {
                values[[i, j]] = *v;
            }
        }

        let year_offset = whole_years_between(start_date, edge.meta.timestamp);
        log::debug!(
            "Scene {}: anomaly extracted, year offset {}",
            edge.meta.id,
            year_offset
        );

        SceneAnomaly {
            values,
            year_offset,
            timestamp: edge.meta.timestamp,
        }
    }
}

impl Default for AnomalyExtractor {
    fn default() -> Self {
        Self::new(AnomalyParams::default())
    }
}
