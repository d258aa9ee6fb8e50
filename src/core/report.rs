//! Area-weighted summaries of a sediment-balance surface.
//!
//! Aggregates the filled slope over the area of interest and over derived
//! sub-masks: above/below a named outflow elevation, net-erosion,
//! net-deposition and stable ground. Rates are reported per year and as
//! total depth change over the analysis period; zone extents as percent
//! of the valid area.

use crate::types::{MaskRaster, Raster, SedError, SedResult};

/// Reporting parameters
#[derive(Debug, Clone)]
pub struct ReportParams {
    /// Slope magnitude separating stable ground from active change
    pub instability_threshold: f32,
    /// Elevation of the basin outflow, if one exists
    pub outflow_elevation: Option<f32>,
    /// Length of the analysis period, years
    pub period_years: f64,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            instability_threshold: 0.01,
            outflow_elevation: None,
            period_years: 22.0,
        }
    }
}

/// Summary of one sub-mask of the area of interest
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSummary {
    pub pixel_count: usize,
    /// Percent of all valid pixels
    pub area_fraction_pct: f64,
    /// Area-weighted mean slope, meters per year
    pub mean_slope: f64,
    /// Mean depth change over the analysis period, meters
    pub depth_change: f64,
}

/// Area-weighted sediment-balance report
#[derive(Debug, Clone)]
pub struct SedimentReport {
    pub total: ZoneSummary,
    /// Slope >= threshold (net erosion)
    pub erosion: ZoneSummary,
    /// Slope <= -threshold (net deposition)
    pub deposition: ZoneSummary,
    /// |slope| < threshold
    pub stable: ZoneSummary,
    /// DEM above the outflow elevation, when one is configured
    pub above_outflow: Option<ZoneSummary>,
    /// DEM at or below the outflow elevation
    pub below_outflow: Option<ZoneSummary>,
}

fn summarize_zone<F>(slope: &Raster, total_valid: usize, period_years: f64, select: F) -> ZoneSummary
where
    F: Fn(usize, usize, f32) -> bool,
{
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for ((i, j), v) in slope.indexed_iter() {
        if v.is_finite() && select(i, j, *v) {
            sum += *v as f64;
            count += 1;
        }
    }
    let mean_slope = if count > 0 { sum / count as f64 } else { 0.0 };
    ZoneSummary {
        pixel_count: count,
        area_fraction_pct: if total_valid > 0 {
            100.0 * count as f64 / total_valid as f64
        } else {
            0.0
        },
        mean_slope,
        depth_change: mean_slope * period_years,
    }
}

/// Summarize a slope surface over the area of interest.
///
/// The AOI mask limits the statistics to the basin; the DEM is only
/// needed when an outflow elevation splits the report.
pub fn summarize(
    slope: &Raster,
    dem: &Raster,
    aoi: Option<&MaskRaster>,
    params: &ReportParams,
) -> SedResult<SedimentReport> {
    if let Some(mask) = aoi {
        if mask.dim() != slope.dim() {
            return Err(SedError::Processing(format!(
                "AOI mask ({:?}) does not match the slope surface ({:?})",
                mask.dim(),
                slope.dim()
            )));
        }
    }
    if params.outflow_elevation.is_some() && dem.dim() != slope.dim() {
        return Err(SedError::Processing(format!(
            "DEM ({:?}) does not match the slope surface ({:?})",
            dem.dim(),
            slope.dim()
        )));
    }

    let in_aoi = |i: usize, j: usize| aoi.map_or(true, |m| m[[i, j]]);
    let total_valid = slope
        .indexed_iter()
        .filter(|((i, j), v)| v.is_finite() && in_aoi(*i, *j))
        .count();

    let th = params.instability_threshold;
    let years = params.period_years;
    let total = summarize_zone(slope, total_valid, years, |i, j, _| in_aoi(i, j));
    let erosion = summarize_zone(slope, total_valid, years, |i, j, v| in_aoi(i, j) && v >= th);
    let deposition =
        summarize_zone(slope, total_valid, years, |i, j, v| in_aoi(i, j) && v <= -th);
    let stable =
        summarize_zone(slope, total_valid, years, |i, j, v| in_aoi(i, j) && v.abs() < th);

    let (above_outflow, below_outflow) = match params.outflow_elevation {
        Some(outflow) => (
            Some(summarize_zone(slope, total_valid, years, |i, j, _| {
                in_aoi(i, j) && dem[[i, j]] > outflow
            })),
            Some(summarize_zone(slope, total_valid, years, |i, j, _| {
                in_aoi(i, j) && dem[[i, j]] <= outflow
            })),
        ),
        None => (None, None),
    };

    log::info!(
        "Report: mean slope {:.4} m/yr over {} valid pixels ({:.1}% erosion, {:.1}% deposition, {:.1}% stable)",
        total.mean_slope,
        total.pixel_count,
        erosion.area_fraction_pct,
        deposition.area_fraction_pct,
        stable.area_fraction_pct
    );

    Ok(SedimentReport {
        total,
        erosion,
        deposition,
        stable,
        above_outflow,
        below_outflow,
    })
}
