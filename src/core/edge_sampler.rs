//! Per-scene water-edge elevation sampling.
//!
//! Binarizes the capped water index with an externally computed threshold,
//! derives a buffered edge zone around the water/land boundary and samples
//! the reference elevation surface there. Also flags pixels adjacent to
//! inundated vegetation, where the edge detection is unreliable.

use crate::core::morphology::{dilate, edge_zone};
use crate::types::{BoundingBox, EdgeElevation, Raster, Scene, SedError, SedResult};
use ndarray::Array2;

/// Parameters forwarded to the adaptive threshold routine
#[derive(Debug, Clone)]
pub struct ThresholdSearchParams {
    /// Canny edge-detection threshold
    pub canny_threshold: f32,
    /// Canny Gaussian sigma
    pub canny_sigma: f32,
    /// Lower bound of the threshold search interval
    pub minimum_value: f32,
}

impl Default for ThresholdSearchParams {
    fn default() -> Self {
        Self {
            canny_threshold: 0.7,
            canny_sigma: 0.7,
            minimum_value: -0.3,
        }
    }
}

/// Adaptive water/land separation threshold, an external collaborator.
///
/// Given the capped index raster, a spatial scale and the scene footprint,
/// returns the scalar threshold that binarizes the water index.
pub trait ThresholdRoutine: Sync {
    fn compute_threshold(
        &self,
        index: &Raster,
        scale_m: f64,
        footprint: &BoundingBox,
        params: &ThresholdSearchParams,
    ) -> SedResult<f32>;
}

/// Constant threshold, for tests and pre-computed deployments
#[derive(Debug, Clone, Copy)]
pub struct FixedThreshold(pub f32);

impl ThresholdRoutine for FixedThreshold {
    fn compute_threshold(
        &self,
        _index: &Raster,
        _scale_m: f64,
        _footprint: &BoundingBox,
        _params: &ThresholdSearchParams,
    ) -> SedResult<f32> {
        Ok(self.0)
    }
}

/// Edge-elevation sampling parameters
#[derive(Debug, Clone)]
pub struct EdgeSamplerParams {
    /// Cap on the water index; extreme values rarely mark the water edge
    /// and would bias the threshold search
    pub max_index_value: f32,
    /// Spatial scale handed to the threshold routine, meters
    pub threshold_scale_m: f64,
    /// Half-width of the edge zone around the water boundary, meters
    pub edge_buffer_m: f64,
    /// Vegetation index above this marks inundated vegetation
    pub veg_threshold: f32,
    /// Raster pixel size, meters
    pub pixel_size_m: f64,
    /// Cloud score at or above this marks an invalid pixel
    pub cloud_invalid_at: f32,
    pub search: ThresholdSearchParams,
}

impl Default for EdgeSamplerParams {
    fn default() -> Self {
        Self {
            max_index_value: 0.3,
            threshold_scale_m: 30.0,
            edge_buffer_m: 10.0,
            veg_threshold: 0.5,
            pixel_size_m: 10.0,
            cloud_invalid_at: 100.0,
            search: ThresholdSearchParams::default(),
        }
    }
}

/// Edge-elevation sampler
pub struct EdgeSampler {
    params: EdgeSamplerParams,
}

impl EdgeSampler {
    pub fn new(params: EdgeSamplerParams) -> Self {
        Self { params }
    }

    /// Buffer distance in whole pixels, at least one
    fn buffer_px(&self) -> usize {
        ((self.params.edge_buffer_m / self.params.pixel_size_m).round() as usize).max(1)
    }

    /// Sample the reference elevation along one scene's water edge.
    ///
    /// An entirely masked edge zone yields an all-NaN elevation raster,
    /// not an error; the scene is dropped later by the elevation corrector.
    pub fn sample(
        &self,
        scene: &Scene,
        dem: &Raster,
        routine: &dyn ThresholdRoutine,
    ) -> SedResult<EdgeElevation> {
        let dims = scene.water_index.dim();
        if dims != dem.dim() || dims != scene.veg_index.dim() || dims != scene.cloud.dim() {
            return Err(SedError::Processing(format!(
                "Scene {} rasters ({}x{}) do not match the DEM ({}x{})",
                scene.meta.id,
                dims.0,
                dims.1,
                dem.dim().0,
                dem.dim().1
            )));
        }
        log::debug!("Sampling edge elevation for scene {}", scene.meta.id);

        // Cap the water index before the threshold search
        let capped = scene
            .water_index
            .mapv(|v| if v > self.params.max_index_value { self.params.max_index_value } else { v });

        // Threshold search only sees cloud-valid pixels
        let mut search_index = capped.clone();
        for ((i, j), v) in search_index.indexed_iter_mut() {
            if scene.cloud[[i, j]] >= self.params.cloud_invalid_at {
                *v = f32::NAN;
            }
        }
        let threshold = routine.compute_threshold(
            &search_index,
            self.params.threshold_scale_m,
            &scene.meta.footprint,
            &self.params.search,
        )?;
        log::debug!("Scene {}: separation threshold {:.4}", scene.meta.id, threshold);

        let (rows, cols) = dims;
        let mut water = Array2::from_elem(dims, false);
        for ((i, j), v) in capped.indexed_iter() {
            water[[i, j]] = v.is_finite() && *v > threshold;
        }

        let buffer_px = self.buffer_px();
        let edge = edge_zone(&water, buffer_px);

        // Elevation at cloud-valid edge pixels, NaN elsewhere
        let mut elevation = Array2::from_elem(dims, f32::NAN);
        let mut edge_pixels = 0usize;
        for i in 0..rows {
            for j in 0..cols {
                if edge[[i, j]]
                    && scene.cloud[[i, j]] < self.params.cloud_invalid_at
                    && dem[[i, j]].is_finite()
                {
                    elevation[[i, j]] = dem[[i, j]];
                    edge_pixels += 1;
                }
            }
        }
        if edge_pixels == 0 {
            log::warn!(
                "Scene {}: no valid edge pixel after masking, output is fully invalid",
                scene.meta.id
            );
        }

        // Vegetation adjacency, dilated by the same buffer
        let mut veg = Array2::from_elem(dims, false);
        for ((i, j), v) in scene.veg_index.indexed_iter() {
            veg[[i, j]] = v.is_finite() && *v > self.params.veg_threshold;
        }
        let veg_adjacent = dilate(&veg, buffer_px);

        Ok(EdgeElevation {
            meta: scene.meta.clone(),
            elevation,
            veg_adjacent,
            threshold,
        })
    }
}

impl Default for EdgeSampler {
    fn default() -> Self {
        Self::new(EdgeSamplerParams::default())
    }
}
