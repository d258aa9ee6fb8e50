use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-pixel raster value; invalid pixels are NaN
pub type RasterValue = f32;

/// 2D raster (row x col), NaN-masked
pub type Raster = Array2<RasterValue>;

/// 2D boolean mask raster (row x col)
pub type MaskRaster = Array2<bool>;

/// Scalar median elevation reported when no valid edge pixel survives masking.
/// Scenes carrying this sentinel are dropped before anomaly extraction.
pub const NO_EDGE_ELEVATION: f32 = -100.0;

/// Optical sensors supported by the shoreline archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensor {
    Landsat5,
    Landsat7,
    Landsat8,
    Sentinel2,
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensor::Landsat5 => write!(f, "LANDSAT_5"),
            Sensor::Landsat7 => write!(f, "LANDSAT_7"),
            Sensor::Landsat8 => write!(f, "LANDSAT_8"),
            Sensor::Sentinel2 => write!(f, "SENTINEL_2"),
        }
    }
}

/// Geographic bounding box (scene footprint, area of interest)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Metadata carried by every scene and every raster derived from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub id: String,
    pub sensor: Sensor,
    pub timestamp: DateTime<Utc>,
    pub footprint: BoundingBox,
    /// Fraction of the footprint flagged as cloud, percent
    pub cloud_cover: f32,
    /// Fraction of the footprint without data, percent
    pub nodata_cover: f32,
}

/// One harmonized, coregistered satellite scene.
///
/// The water index (e.g. MNDWI), vegetation index (e.g. NDVI) and cloud
/// score arrive already computed by the scene catalog; a pixel is
/// cloud-valid when the score is below 100.
#[derive(Debug, Clone)]
pub struct Scene {
    pub meta: SceneMetadata,
    pub water_index: Raster,
    pub veg_index: Raster,
    pub cloud: Raster,
}

/// Timestamp-ordered sequence of scenes for one analysis window
#[derive(Debug, Clone)]
pub struct SceneCollection {
    scenes: Vec<Scene>,
}

impl SceneCollection {
    /// Build a collection, sorting scenes by acquisition time
    pub fn new(mut scenes: Vec<Scene>) -> Self {
        scenes.sort_by_key(|s| s.meta.timestamp);
        Self { scenes }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// Output of the edge-elevation sampler for one scene
#[derive(Debug, Clone)]
pub struct EdgeElevation {
    pub meta: SceneMetadata,
    /// Reference elevation at edge pixels, NaN elsewhere
    pub elevation: Raster,
    /// Pixels adjacent to inundated vegetation, where edge detection is unreliable
    pub veg_adjacent: MaskRaster,
    /// Scalar threshold used to binarize the water index
    pub threshold: f32,
}

/// Edge-elevation scene tagged with its robust reference elevation
#[derive(Debug, Clone)]
pub struct CorrectedScene {
    pub edge: EdgeElevation,
    /// Median elevation over valid edge pixels, `NO_EDGE_ELEVATION` if none
    pub median_elevation: f32,
    /// Stddev of (edge elevation - median); noise indicator for outlier filtering
    pub noise_std: f32,
}

/// Smoothed per-scene shoreline-elevation anomaly
#[derive(Debug, Clone)]
pub struct SceneAnomaly {
    pub values: Raster,
    /// Whole years elapsed between the analysis start date and the scene
    pub year_offset: i64,
    pub timestamp: DateTime<Utc>,
}

/// One anniversary-aligned annual composite of scene anomalies
#[derive(Debug, Clone)]
pub struct AnnualBand {
    pub values: Raster,
    /// Per-pixel number of contributing scenes
    pub pixel_count: Array2<u32>,
    /// Number of scenes in the 12-month bucket
    pub scene_count: usize,
    /// Zero-based year index relative to the first full analysis year
    pub year_offset: i64,
}

/// Multi-band stack of annual anomaly composites, ordered by year offset
#[derive(Debug, Clone)]
pub struct AnnualStack {
    pub bands: Vec<AnnualBand>,
}

impl AnnualStack {
    /// Raster shape shared by all bands, if any band exists
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.bands.first().map(|b| b.values.dim())
    }
}

/// Per-pixel sediment-balance estimate for one iteration round
#[derive(Debug, Clone)]
pub struct SedimentBalance {
    /// Significance-gated slope, recent-window estimate blended over full-period
    pub slope: Raster,
    /// Two-sided Pearson correlation p-value of (year offset, anomaly)
    pub p_value: Raster,
    /// Number of annual composites contributing per pixel
    pub count: Array2<u32>,
    /// Gap-filled slope; becomes the next round's correction surface
    pub filled: Raster,
}

/// Error types for sediment-balance processing
#[derive(Debug, thiserror::Error)]
pub enum SedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    /// Scene collection or reference elevation surface is empty for the
    /// area of interest; distinct from low coverage, the pipeline cannot proceed
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Checkpoint manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Result type for sediment-balance operations
pub type SedResult<T> = Result<T, SedError>;
