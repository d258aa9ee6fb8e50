//! Robust per-scene reference elevation and dynamic outlier filtering.
//!
//! Computes the median shoreline elevation of each scene and a noise
//! indicator (stddev of elevation residuals). Scenes without any valid
//! edge pixel report the sentinel elevation and are dropped; optionally
//! the noisiest scenes of the ensemble are dropped as well. A correction
//! surface from the previous iteration round masks out pixels already
//! identified as actively unstable, closing the feedback loop.

use crate::core::stats::{mean_std, median};
use crate::types::{CorrectedScene, EdgeElevation, Raster, SedResult, NO_EDGE_ELEVATION};

/// Elevation correction parameters
#[derive(Debug, Clone)]
pub struct ElevationCorrectorParams {
    /// Drop the noisiest scenes of the ensemble
    pub filter_outliers: bool,
    /// Correction-surface slope magnitude at or above this marks a pixel
    /// as actively unstable, excluded from the elevation reference
    pub instability_threshold: f32,
    /// Ensemble noise cutoff = mean + this many standard deviations
    pub outlier_sigma: f64,
}

impl Default for ElevationCorrectorParams {
    fn default() -> Self {
        Self {
            filter_outliers: true,
            instability_threshold: 0.01,
            outlier_sigma: 2.0,
        }
    }
}

/// Elevation corrector and outlier filter
pub struct ElevationCorrector {
    params: ElevationCorrectorParams,
}

impl ElevationCorrector {
    pub fn new(params: ElevationCorrectorParams) -> Self {
        Self { params }
    }

    /// Median elevation and noise indicator for one scene.
    ///
    /// Returns the sentinel elevation when no pixel survives masking.
    fn scene_statistics(
        &self,
        edge: &EdgeElevation,
        correction: Option<&Raster>,
    ) -> (f32, f32) {
        let mut values = Vec::new();
        for ((i, j), v) in edge.elevation.indexed_iter() {
            if !v.is_finite() || edge.veg_adjacent[[i, j]] {
                continue;
            }
            if let Some(surface) = correction {
                // Masked correction pixels exclude the edge pixel as well
                let s = surface[[i, j]];
                if !s.is_finite() || s.abs() >= self.params.instability_threshold {
                    continue;
                }
            }
            values.push(*v);
        }
        let mut sorted = values.clone();
        let med = match median(&mut sorted) {
            Some(m) => m,
            None => return (NO_EDGE_ELEVATION, 0.0),
        };
        let residuals: Vec<f64> = values.iter().map(|v| (*v - med) as f64).collect();
        let (_, noise_std) = mean_std(&residuals);
        (med, noise_std as f32)
    }

    /// Tag every scene with its reference elevation, drop sentinel scenes
    /// and optionally the noisiest ones.
    ///
    /// The noise cutoff is a pure reduction over the round's valid scene
    /// set, recomputed from scratch on every call.
    pub fn correct(
        &self,
        edges: &[EdgeElevation],
        correction: Option<&Raster>,
    ) -> SedResult<Vec<CorrectedScene>> {
        log::info!(
            "Correcting elevations for {} scenes (feedback surface: {})",
            edges.len(),
            if correction.is_some() { "present" } else { "absent" }
        );

        #[cfg(feature = "parallel")]
        let stats: Vec<(f32, f32)> = {
            use rayon::prelude::*;
            edges
                .par_iter()
                .map(|edge| self.scene_statistics(edge, correction))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let stats: Vec<(f32, f32)> = edges
            .iter()
            .map(|edge| self.scene_statistics(edge, correction))
            .collect();

        let mut survivors: Vec<CorrectedScene> = edges
            .iter()
            .zip(stats)
            .filter(|(_, (med, _))| *med > NO_EDGE_ELEVATION)
            .map(|(edge, (median_elevation, noise_std))| CorrectedScene {
                edge: edge.clone(),
                median_elevation,
                noise_std,
            })
            .collect();
        log::debug!("{} scenes carry a valid median elevation", survivors.len());

        // Below three scenes the ensemble cutoff is meaningless
        if self.params.filter_outliers && survivors.len() >= 3 {
            let noise: Vec<f64> = survivors.iter().map(|s| s.noise_std as f64).collect();
            let (mean, std) = mean_std(&noise);
            let cutoff = mean + self.params.outlier_sigma * std;
            let before = survivors.len();
            survivors.retain(|s| (s.noise_std as f64) <= cutoff);
            log::info!(
                "Outlier filter: noise cutoff {:.3}, dropped {} of {} scenes",
                cutoff,
                before - survivors.len(),
                before
            );
        }

        Ok(survivors)
    }
}

impl Default for ElevationCorrector {
    fn default() -> Self {
        Self::new(ElevationCorrectorParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, SceneMetadata, Sensor};
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use ndarray::Array2;

    fn meta(id: &str) -> SceneMetadata {
        SceneMetadata {
            id: id.to_string(),
            sensor: Sensor::Landsat7,
            timestamp: chrono::Utc.with_ymd_and_hms(2003, 2, 1, 10, 0, 0).unwrap(),
            footprint: BoundingBox {
                min_lon: 0.0,
                max_lon: 1.0,
                min_lat: 0.0,
                max_lat: 1.0,
            },
            cloud_cover: 0.0,
            nodata_cover: 0.0,
        }
    }

    fn edge_with_values(id: &str, values: &[f32]) -> EdgeElevation {
        let n = values.len();
        let mut elevation = Array2::from_elem((1, n.max(4)), f32::NAN);
        for (j, v) in values.iter().enumerate() {
            elevation[[0, j]] = *v;
        }
        EdgeElevation {
            meta: meta(id),
            elevation,
            veg_adjacent: Array2::from_elem((1, n.max(4)), false),
            threshold: 0.1,
        }
    }

    #[test]
    fn test_median_and_noise() {
        let edge = edge_with_values("a", &[300.0, 301.0, 302.0]);
        let corrector = ElevationCorrector::default();
        let out = corrector.correct(&[edge], None).unwrap();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].median_elevation, 301.0);
        assert_relative_eq!(out[0].noise_std, 1.0);
    }

    #[test]
    fn test_sentinel_scene_dropped() {
        let empty = edge_with_values("empty", &[]);
        let good = edge_with_values("good", &[300.0, 301.0]);
        let corrector = ElevationCorrector::new(ElevationCorrectorParams {
            filter_outliers: false,
            ..Default::default()
        });
        let out = corrector.correct(&[empty, good], None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].edge.meta.id, "good");
    }

    #[test]
    fn test_vegetation_pixels_excluded() {
        let mut edge = edge_with_values("veg", &[300.0, 400.0]);
        edge.veg_adjacent[[0, 1]] = true;
        let corrector = ElevationCorrector::default();
        let out = corrector.correct(&[edge], None).unwrap();
        assert_relative_eq!(out[0].median_elevation, 300.0);
    }

    #[test]
    fn test_feedback_masks_unstable_pixels() {
        let edge = edge_with_values("fb", &[300.0, 350.0]);
        let mut surface = Array2::from_elem((1, 4), 0.0f32);
        surface[[0, 1]] = 0.02; // actively unstable
        surface[[0, 2]] = f32::NAN;
        let corrector = ElevationCorrector::default();
        let out = corrector.correct(&[edge], Some(&surface)).unwrap();
        assert_relative_eq!(out[0].median_elevation, 300.0);
    }

    #[test]
    fn test_outlier_cutoff_is_mean_plus_two_sigma() {
        // Noise indicators: three quiet scenes and one noisy one
        let scenes = vec![
            edge_with_values("q1", &[300.0, 300.5, 301.0]),
            edge_with_values("q2", &[300.0, 300.4, 301.1]),
            edge_with_values("q3", &[300.0, 300.6, 300.9]),
            edge_with_values("loud", &[250.0, 300.0, 350.0]),
        ];
        let corrector = ElevationCorrector::default();
        let out = corrector.correct(&scenes, None).unwrap();
        let noise: Vec<f64> = scenes
            .iter()
            .map(|e| {
                corrector.scene_statistics(e, None).1 as f64
            })
            .collect();
        let (mean, std) = mean_std(&noise);
        let cutoff = mean + 2.0 * std;
        let expected: Vec<&str> = scenes
            .iter()
            .zip(&noise)
            .filter(|(_, n)| **n <= cutoff)
            .map(|(e, _)| e.meta.id.as_str())
            .collect();
        let got: Vec<&str> = out.iter().map(|s| s.edge.meta.id.as_str()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_small_ensembles_skip_outlier_filter() {
        let scenes = vec![
            edge_with_values("a", &[300.0, 301.0]),
            edge_with_values("b", &[250.0, 350.0]),
        ];
        let corrector = ElevationCorrector::default();
        let out = corrector.correct(&scenes, None).unwrap();
        assert_eq!(out.len(), 2);
    }
}
