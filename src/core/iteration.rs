//! Round iteration: threads the filled slope surface of one round into the
//! elevation corrector of the next.
//!
//! The loop runs a fixed, configured number of rounds; there is no
//! numerical stopping rule. Scenes surviving the outlier filter change
//! from round to round, so estimates are not guaranteed to converge
//! monotonically; a max-change diagnostic is logged per round but never
//! acted on. Every round persists its annual stack and filled slope
//! before the next round starts.

use crate::core::anomaly::{AnomalyExtractor, AnomalyParams};
use crate::core::annual::AnnualAggregator;
use crate::core::edge_sampler::{EdgeSampler, EdgeSamplerParams, ThresholdRoutine};
use crate::core::elevation::{ElevationCorrector, ElevationCorrectorParams};
use crate::core::trend::{TrendEstimator, TrendParams};
use crate::io::catalog::SceneCatalog;
use crate::io::checkpoint::CheckpointStore;
use crate::types::{
    AnnualStack, BoundingBox, EdgeElevation, Raster, SceneAnomaly, SedError, SedResult,
    SedimentBalance, Sensor,
};
use chrono::{DateTime, Utc};

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Fixed number of iteration rounds
    pub rounds: usize,
    pub sampler: EdgeSamplerParams,
    pub corrector: ElevationCorrectorParams,
    pub anomaly: AnomalyParams,
    pub trend: TrendParams,
}

impl PipelineConfig {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            start_date,
            end_date,
            rounds: 8,
            sampler: EdgeSamplerParams::default(),
            corrector: ElevationCorrectorParams::default(),
            anomaly: AnomalyParams::default(),
            trend: TrendParams::default(),
        }
    }
}

/// Immutable state threaded between rounds
#[derive(Debug, Clone)]
pub struct RoundState {
    /// Rounds completed so far
    pub round: usize,
    /// Filled slope of the last completed round; absent before round one
    pub correction: Option<Raster>,
}

impl RoundState {
    pub fn initial() -> Self {
        Self {
            round: 0,
            correction: None,
        }
    }
}

/// Drives the fixed-round-count correction loop
pub struct IterationController {
    config: PipelineConfig,
}

impl IterationController {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn extract_anomalies(&self, corrected: &[crate::types::CorrectedScene]) -> Vec<SceneAnomaly> {
        let extractor = AnomalyExtractor::new(self.config.anomaly.clone());
        #[cfg(feature = "parallel")]
        let anomalies: Vec<SceneAnomaly> = {
            use rayon::prelude::*;
            corrected
                .par_iter()
                .map(|s| extractor.extract(s, self.config.start_date))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let anomalies: Vec<SceneAnomaly> = corrected
            .iter()
            .map(|s| extractor.extract(s, self.config.start_date))
            .collect();
        anomalies
    }

    /// One pure round: corrector -> anomalies -> annual stack -> trend
    pub fn run_round(
        &self,
        edges: &[EdgeElevation],
        correction: Option<&Raster>,
    ) -> SedResult<(AnnualStack, SedimentBalance)> {
        let corrector = ElevationCorrector::new(self.config.corrector.clone());
        let corrected = corrector.correct(edges, correction)?;
        let anomalies = self.extract_anomalies(&corrected);
        let stack =
            AnnualAggregator::aggregate(&anomalies, self.config.start_date, self.config.end_date)?;
        let estimator = TrendEstimator::new(self.config.trend.clone());
        let balance = estimator.estimate(&stack)?;
        Ok((stack, balance))
    }

    /// Run all configured rounds, checkpointing each before the next starts
    pub fn run(
        &self,
        edges: &[EdgeElevation],
        store: &CheckpointStore,
    ) -> SedResult<SedimentBalance> {
        self.run_from(edges, store, RoundState::initial())
    }

    /// Continue from the latest persisted round, or start fresh if none exists
    pub fn resume(
        &self,
        edges: &[EdgeElevation],
        store: &CheckpointStore,
    ) -> SedResult<SedimentBalance> {
        match store.latest_round()? {
            Some(round) => {
                log::info!("Resuming after persisted round {}", round);
                let correction = store.read_filled(round)?;
                self.run_from(
                    edges,
                    store,
                    RoundState {
                        round,
                        correction: Some(correction),
                    },
                )
            }
            None => self.run(edges, store),
        }
    }

    fn run_from(
        &self,
        edges: &[EdgeElevation],
        store: &CheckpointStore,
        state: RoundState,
    ) -> SedResult<SedimentBalance> {
        if edges.is_empty() {
            return Err(SedError::EmptyInput(
                "no edge-elevation scenes for the area of interest".to_string(),
            ));
        }
        let mut state = state;
        let mut balance = None;
        while state.round < self.config.rounds {
            let round = state.round + 1;
            log::info!("Iteration round {} of {}", round, self.config.rounds);
            let (stack, round_balance) = self.run_round(edges, state.correction.as_ref())?;
            store.write_round(round, &stack, &round_balance.filled)?;

            if let Some(prev) = &state.correction {
                log::info!(
                    "Round {}: max filled-slope change {:.5}",
                    round,
                    max_abs_change(prev, &round_balance.filled)
                );
            }
            state = RoundState {
                round,
                correction: Some(round_balance.filled.clone()),
            };
            balance = Some(round_balance);
        }
        balance.ok_or_else(|| {
            SedError::Processing(format!(
                "all {} configured rounds are already persisted; nothing left to run",
                self.config.rounds
            ))
        })
    }
}

/// Max absolute filled-slope change over pixels valid in both rounds
fn max_abs_change(prev: &Raster, next: &Raster) -> f32 {
    prev.iter()
        .zip(next.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max)
}

/// Whole-run entry point: catalog query, one-time edge sampling, iteration
pub struct SedimentPipeline {
    config: PipelineConfig,
}

impl SedimentPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Sample every scene's edge elevation once; edges do not change
    /// across rounds
    pub fn sample_edges(
        &self,
        scenes: &crate::types::SceneCollection,
        dem: &Raster,
        routine: &dyn ThresholdRoutine,
    ) -> SedResult<Vec<EdgeElevation>> {
        let sampler = EdgeSampler::new(self.config.sampler.clone());
        #[cfg(feature = "parallel")]
        let edges: SedResult<Vec<EdgeElevation>> = {
            use rayon::prelude::*;
            scenes
                .scenes()
                .par_iter()
                .map(|scene| sampler.sample(scene, dem, routine))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let edges: SedResult<Vec<EdgeElevation>> = scenes
            .scenes()
            .iter()
            .map(|scene| sampler.sample(scene, dem, routine))
            .collect();
        edges
    }

    /// Run the full pipeline for one area of interest
    pub fn run(
        &self,
        catalog: &dyn SceneCatalog,
        aoi: &BoundingBox,
        sensors: &[Sensor],
        dem: &Raster,
        routine: &dyn ThresholdRoutine,
        store: &CheckpointStore,
    ) -> SedResult<SedimentBalance> {
        let scenes =
            catalog.load_scenes(aoi, sensors, self.config.start_date, self.config.end_date)?;
        if scenes.is_empty() {
            return Err(SedError::EmptyInput(
                "scene catalog returned no scenes for the area of interest".to_string(),
            ));
        }
        if dem.is_empty() || dem.iter().all(|v| !v.is_finite()) {
            return Err(SedError::EmptyInput(
                "reference elevation surface is empty for the area of interest".to_string(),
            ));
        }
        log::info!(
            "Pipeline start: {} scenes, {} rounds, window {} to {}",
            scenes.len(),
            self.config.rounds,
            self.config.start_date.date_naive(),
            self.config.end_date.date_naive()
        );

        let edges = self.sample_edges(&scenes, dem, routine)?;
        IterationController::new(self.config.clone()).run(&edges, store)
    }
}
