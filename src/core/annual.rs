//! Anniversary-aligned annual anomaly composites.
//!
//! Buckets per-scene anomalies into 12-month windows anchored on the
//! analysis start date's month and day, averages each bucket pixel-wise
//! and stacks the retained years into one multi-band raster.

use crate::core::calendar::anchored_date;
use crate::types::{AnnualBand, AnnualStack, SceneAnomaly, SedError, SedResult};
use chrono::{DateTime, Datelike, Utc};
use ndarray::Array2;

/// Annual aggregator
pub struct AnnualAggregator;

impl AnnualAggregator {
    /// Stack per-scene anomalies into annual composites.
    ///
    /// For each anniversary year Y in (start+1)..=end, the bucket covers
    /// [anchor(Y-1), anchor(Y)) where the anchor keeps the start date's
    /// month and day. Empty buckets are dropped; band year offsets are
    /// zero-based on the first full analysis year.
    pub fn aggregate(
        anomalies: &[SceneAnomaly],
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> SedResult<AnnualStack> {
        if end_date <= start_date {
            return Err(SedError::Processing(format!(
                "Analysis window end {} precedes start {}",
                end_date, start_date
            )));
        }
        let dims = match anomalies.first() {
            Some(a) => a.values.dim(),
            None => {
                log::warn!("No anomalies to aggregate; annual stack is empty");
                return Ok(AnnualStack { bands: Vec::new() });
            }
        };

        let start_year = start_date.year();
        let end_year = end_date.year();
        let mut bands = Vec::new();
        for year in (start_year + 1)..=end_year {
            let window_start = anchored_date(year - 1, start_date.month(), start_date.day());
            let window_end = anchored_date(year, start_date.month(), start_date.day());
            let bucket: Vec<&SceneAnomaly> = anomalies
                .iter()
                .filter(|a| a.timestamp >= window_start && a.timestamp < window_end)
                .collect();
            if bucket.is_empty() {
                continue;
            }

            let mut sum = Array2::<f64>::zeros(dims);
            let mut pixel_count = Array2::<u32>::zeros(dims);
            for anomaly in &bucket {
                for ((i, j), v) in anomaly.values.indexed_iter() {
                    if v.is_finite() {
                        sum[[i, j]] += *v as f64;
                        pixel_count[[i, j]] += 1;
                    }
                }
            }
            let mut values = Array2::from_elem(dims, f32::NAN);
            for ((i, j), v) in values.indexed_iter_mut() {
                let n = pixel_count[[i, j]];
                if n > 0 {
                    *v = (sum[[i, j]] / n as f64) as f32;
                }
            }

            let year_offset = (year - (start_year + 1)) as i64;
            log::debug!(
                "Year offset {}: {} scenes in [{}, {})",
                year_offset,
                bucket.len(),
                window_start.date_naive(),
                window_end.date_naive()
            );
            bands.push(AnnualBand {
                values,
                pixel_count,
                scene_count: bucket.len(),
                year_offset,
            });
        }

        log::info!("Annual stack holds {} year bands", bands.len());
        Ok(AnnualStack { bands })
    }
}
