//! Inter-round persistence of annual anomaly stacks and filled slopes.
//!
//! Each iteration round writes one directory with a JSON manifest naming
//! the bands by year offset, the stack payload, the per-band pixel counts
//! and the filled slope surface. Payloads are raw little-endian values in
//! band-major row order. Resuming a run reads the latest round's filled
//! surface back as the next correction surface.

use crate::types::{AnnualBand, AnnualStack, Raster, SedError, SedResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.json";
const STACK_FILE: &str = "stack.bin";
const COUNTS_FILE: &str = "counts.bin";
const FILLED_FILE: &str = "filled.bin";

#[derive(Debug, Serialize, Deserialize)]
struct BandEntry {
    year_offset: i64,
    scene_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct RoundManifest {
    round: usize,
    rows: usize,
    cols: usize,
    bands: Vec<BandEntry>,
}

/// Per-round checkpoint store rooted at one directory
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    /// Open (and create if needed) a checkpoint directory
    pub fn open<P: AsRef<Path>>(root: P) -> SedResult<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    fn round_dir(&self, round: usize) -> PathBuf {
        self.root.join(format!("round_{:03}", round))
    }

    /// Persist one round's annual stack and filled slope
    pub fn write_round(
        &self,
        round: usize,
        stack: &AnnualStack,
        filled: &Raster,
    ) -> SedResult<()> {
        let dir = self.round_dir(round);
        fs::create_dir_all(&dir)?;
        let (rows, cols) = filled.dim();

        let manifest = RoundManifest {
            round,
            rows,
            cols,
            bands: stack
                .bands
                .iter()
                .map(|b| BandEntry {
                    year_offset: b.year_offset,
                    scene_count: b.scene_count,
                })
                .collect(),
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        fs::write(dir.join(MANIFEST_FILE), manifest_json)?;

        let mut stack_out = BufWriter::new(File::create(dir.join(STACK_FILE))?);
        let mut counts_out = BufWriter::new(File::create(dir.join(COUNTS_FILE))?);
        for band in &stack.bands {
            for v in band.values.iter() {
                stack_out.write_all(&v.to_le_bytes())?;
            }
            for c in band.pixel_count.iter() {
                counts_out.write_all(&c.to_le_bytes())?;
            }
        }
        stack_out.flush()?;
        counts_out.flush()?;

        let mut filled_out = BufWriter::new(File::create(dir.join(FILLED_FILE))?);
        for v in filled.iter() {
            filled_out.write_all(&v.to_le_bytes())?;
        }
        filled_out.flush()?;

        log::info!(
            "Checkpoint: round {} persisted ({} bands, {}x{})",
            round,
            stack.bands.len(),
            rows,
            cols
        );
        Ok(())
    }

    fn read_manifest(&self, round: usize) -> SedResult<RoundManifest> {
        let path = self.round_dir(round).join(MANIFEST_FILE);
        let manifest: RoundManifest = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Ok(manifest)
    }

    fn read_f32_raster(path: &Path, rows: usize, cols: usize) -> SedResult<Raster> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut buf = vec![0u8; rows * cols * 4];
        reader.read_exact(&mut buf)?;
        let values: Vec<f32> = buf
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| SedError::InvalidFormat(format!("raster payload shape: {}", e)))
    }

    /// Read back a round's filled slope surface
    pub fn read_filled(&self, round: usize) -> SedResult<Raster> {
        let manifest = self.read_manifest(round)?;
        Self::read_f32_raster(
            &self.round_dir(round).join(FILLED_FILE),
            manifest.rows,
            manifest.cols,
        )
    }

    /// Read back a round's annual anomaly stack
    pub fn read_stack(&self, round: usize) -> SedResult<AnnualStack> {
        let manifest = self.read_manifest(round)?;
        let (rows, cols) = (manifest.rows, manifest.cols);
        let mut stack_in = BufReader::new(File::open(self.round_dir(round).join(STACK_FILE))?);
        let mut counts_in = BufReader::new(File::open(self.round_dir(round).join(COUNTS_FILE))?);

        let mut bands = Vec::with_capacity(manifest.bands.len());
        for entry in &manifest.bands {
            let mut buf = vec![0u8; rows * cols * 4];
            stack_in.read_exact(&mut buf)?;
            let values: Vec<f32> = buf
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            let values = Array2::from_shape_vec((rows, cols), values)
                .map_err(|e| SedError::InvalidFormat(format!("stack band shape: {}", e)))?;

            counts_in.read_exact(&mut buf)?;
            let counts: Vec<u32> = buf
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            let pixel_count = Array2::from_shape_vec((rows, cols), counts)
                .map_err(|e| SedError::InvalidFormat(format!("count band shape: {}", e)))?;

            bands.push(AnnualBand {
                values,
                pixel_count,
                scene_count: entry.scene_count,
                year_offset: entry.year_offset,
            });
        }
        Ok(AnnualStack { bands })
    }

    /// Highest persisted round number, if any round completed
    pub fn latest_round(&self) -> SedResult<Option<usize>> {
        let mut latest = None;
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(num) = name.strip_prefix("round_") {
                if let Ok(round) = num.parse::<usize>() {
                    latest = latest.max(Some(round));
                }
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_stack() -> (AnnualStack, Raster) {
        let mut values = Array2::from_elem((2, 3), f32::NAN);
        values[[0, 0]] = 0.5;
        values[[1, 2]] = -0.25;
        let mut pixel_count = Array2::zeros((2, 3));
        pixel_count[[0, 0]] = 4;
        pixel_count[[1, 2]] = 1;
        let stack = AnnualStack {
            bands: vec![AnnualBand {
                values,
                pixel_count,
                scene_count: 5,
                year_offset: 3,
            }],
        };
        let mut filled = Array2::from_elem((2, 3), f32::NAN);
        filled[[0, 1]] = 0.012;
        (stack, filled)
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let (stack, filled) = sample_stack();

        store.write_round(1, &stack, &filled).unwrap();

        let stack_back = store.read_stack(1).unwrap();
        assert_eq!(stack_back.bands.len(), 1);
        let band = &stack_back.bands[0];
        assert_eq!(band.year_offset, 3);
        assert_eq!(band.scene_count, 5);
        assert_relative_eq!(band.values[[0, 0]], 0.5);
        assert!(band.values[[0, 1]].is_nan());
        assert_eq!(band.pixel_count[[0, 0]], 4);

        let filled_back = store.read_filled(1).unwrap();
        assert_relative_eq!(filled_back[[0, 1]], 0.012);
        assert!(filled_back[[0, 0]].is_nan());
    }

    #[test]
    fn test_latest_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        assert_eq!(store.latest_round().unwrap(), None);
        let (stack, filled) = sample_stack();
        store.write_round(1, &stack, &filled).unwrap();
        store.write_round(2, &stack, &filled).unwrap();
        assert_eq!(store.latest_round().unwrap(), Some(2));
    }

    #[test]
    fn test_missing_round_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        assert!(matches!(store.read_filled(7), Err(SedError::Io(_))));
    }
}
