//! Core sediment-balance processing modules

pub mod anomaly;
pub mod annual;
pub mod calendar;
pub mod edge_sampler;
pub mod elevation;
pub mod iteration;
pub mod morphology;
pub mod report;
pub mod stats;
pub mod trend;

// Re-export main types
pub use anomaly::{AnomalyExtractor, AnomalyParams};
pub use annual::AnnualAggregator;
pub use edge_sampler::{
    EdgeSampler, EdgeSamplerParams, FixedThreshold, ThresholdRoutine, ThresholdSearchParams,
};
pub use elevation::{ElevationCorrector, ElevationCorrectorParams};
pub use iteration::{IterationController, PipelineConfig, RoundState, SedimentPipeline};
pub use report::{summarize, ReportParams, SedimentReport, ZoneSummary};
pub use trend::{TrendEstimator, TrendParams};
