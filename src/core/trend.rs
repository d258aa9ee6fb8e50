//! Per-pixel robust trend estimation over the annual anomaly stack.
//!
//! For every pixel the time series of (year offset, anomaly) pairs is
//! reduced to a Sen's slope, a Pearson correlation p-value and validity
//! counts. Two slope variants are gated independently: the full-period
//! estimate and a recent-window estimate for pixels that only became
//! shoreline in later years. Insignificant slopes are zeroed, the recent
//! estimate is blended over the full one, and a gap-filled surface is
//! produced for the next iteration round's correction mask.

use crate::core::morphology::{focal_mean_circle, overlay};
use crate::core::stats::{pearson, sens_slope};
use crate::types::{AnnualStack, SedError, SedResult, SedimentBalance};
use ndarray::Array2;

/// Trend estimation parameters
#[derive(Debug, Clone)]
pub struct TrendParams {
    /// Minimum contributing years for the full-period slope
    pub min_full_count: u32,
    /// Year offsets at or below this form the early window
    pub early_max_offset: i64,
    /// Minimum early-window years for the full-period slope to hold
    pub min_early_years: u32,
    /// Minimum contributing years for the recent-window slope
    pub min_recent_count: u32,
    /// Slopes with a p-value above this carry no detectable trend
    pub p_gate: f64,
    /// Radius of the circular gap-fill kernel, pixels
    pub fill_radius_px: usize,
    /// Minimum contributing years for the gap-filled slope
    pub min_filled_count: u32,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            min_full_count: 6,
            early_max_offset: 10,
            min_early_years: 2,
            min_recent_count: 5,
            p_gate: 0.1,
            fill_radius_px: 2,
            min_filled_count: 3,
        }
    }
}

/// Per-pixel series reduction
struct PixelTrend {
    /// Sen's slope; undefined below two contributing years
    slope: Option<f64>,
    p_value: Option<f64>,
    count: u32,
    early_count: u32,
    recent_count: u32,
}

/// Robust trend estimator
pub struct TrendEstimator {
    params: TrendParams,
}

impl TrendEstimator {
    pub fn new(params: TrendParams) -> Self {
        Self { params }
    }

    fn reduce_pixel(&self, stack: &AnnualStack, i: usize, j: usize) -> PixelTrend {
        let mut times = Vec::with_capacity(stack.bands.len());
        let mut values = Vec::with_capacity(stack.bands.len());
        let mut early_count = 0u32;
        let mut recent_count = 0u32;
        for band in &stack.bands {
            let v = band.values[[i, j]];
            if v.is_finite() {
                times.push(band.year_offset as f64);
                values.push(v as f64);
                if band.year_offset <= self.params.early_max_offset {
                    early_count += 1;
                } else {
                    recent_count += 1;
                }
            }
        }
        let slope = sens_slope(&times, &values);
        let p_value = pearson(&times, &values).map(|(_, p)| p);
        PixelTrend {
            slope,
            p_value,
            count: times.len() as u32,
            early_count,
            recent_count,
        }
    }

    /// Whether a slope survives the significance gate; an undefined
    /// p-value counts as insignificant
    fn significant(&self, p_value: Option<f64>) -> bool {
        matches!(p_value, Some(p) if p <= self.params.p_gate)
    }

    /// Estimate the sediment balance of one annual stack
    pub fn estimate(&self, stack: &AnnualStack) -> SedResult<SedimentBalance> {
        let dims = stack.shape().ok_or_else(|| {
            SedError::EmptyInput("annual anomaly stack has no bands".to_string())
        })?;
        log::info!(
            "Estimating per-pixel trends over {} annual bands",
            stack.bands.len()
        );

        let (rows, cols) = dims;
        let mut blended = Array2::from_elem(dims, f32::NAN);
        let mut p_value = Array2::from_elem(dims, f32::NAN);
        let mut count = Array2::<u32>::zeros(dims);
        // Raw slope at well-covered pixels, input to the gap fill
        let mut raw_covered = Array2::from_elem(dims, f32::NAN);

        for i in 0..rows {
            for j in 0..cols {
                let trend = self.reduce_pixel(stack, i, j);
                count[[i, j]] = trend.count;
                if let Some(p) = trend.p_value {
                    p_value[[i, j]] = p as f32;
                }
                let slope = match trend.slope {
                    Some(s) => s,
                    None => continue,
                };

                let gated = if self.significant(trend.p_value) {
                    slope as f32
                } else {
                    0.0
                };

                let full_valid = trend.count >= self.params.min_full_count
                    && trend.early_count >= self.params.min_early_years;
                // The full-period estimate takes precedence when both
                // eras are covered
                let recent_valid = trend.early_count < self.params.min_early_years
                    && trend.recent_count >= self.params.min_recent_count;

                if recent_valid {
                    blended[[i, j]] = gated;
                } else if full_valid {
                    blended[[i, j]] = gated;
                }

                if trend.count >= self.params.min_full_count {
                    raw_covered[[i, j]] = slope as f32;
                }
            }
        }

        // Gap fill: smooth the well-covered slope outward, keep the
        // unsmoothed value wherever it exists, then enforce the minimum
        // final coverage
        let smoothed = focal_mean_circle(&raw_covered, self.params.fill_radius_px);
        let mut filled = overlay(&raw_covered, &smoothed);
        for ((i, j), v) in filled.indexed_iter_mut() {
            if count[[i, j]] < self.params.min_filled_count {
                *v = f32::NAN;
            }
        }

        let valid = filled.iter().filter(|v| v.is_finite()).count();
        log::info!(
            "Sediment balance: {} of {} pixels carry a filled slope",
            valid,
            rows * cols
        );

        Ok(SedimentBalance {
            slope: blended,
            p_value,
            count,
            filled,
        })
    }
}

impl Default for TrendEstimator {
    fn default() -> Self {
        Self::new(TrendParams::default())
    }
}
