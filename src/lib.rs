//! lakesed: A Fast, Modular Shoreline-Based Lake Sediment-Balance Estimator
//!
//! This library estimates long-term per-pixel lake-bed erosion and
//! deposition rates from a multi-decade archive of optical satellite
//! scenes, using historical water/land boundary positions as elevation
//! proxies against a reference elevation model. The engine iterates a
//! shoreline-elevation correction loop: per-scene edge elevations are
//! filtered, reduced to annual anomaly composites and fitted with a
//! robust per-pixel trend, whose gap-filled slope masks unstable ground
//! in the next round.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AnnualBand, AnnualStack, BoundingBox, CorrectedScene, EdgeElevation, MaskRaster, Raster,
    Scene, SceneAnomaly, SceneCollection, SceneMetadata, SedError, SedResult, SedimentBalance,
    Sensor, NO_EDGE_ELEVATION,
};

pub use core::{
    AnnualAggregator, AnomalyExtractor, EdgeSampler, ElevationCorrector, FixedThreshold,
    IterationController, PipelineConfig, SedimentPipeline, ThresholdRoutine, TrendEstimator,
};

pub use io::{CheckpointStore, SceneCatalog};
