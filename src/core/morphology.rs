//! Focal raster operators: morphological dilation/erosion on masks and
//! NaN-aware focal means, with circular or square neighborhoods.

use crate::types::{MaskRaster, Raster};
use ndarray::Array2;

/// Pixel offsets of a circular structuring element with the given radius
fn circle_offsets(radius_px: usize) -> Vec<(i32, i32)> {
    let r = radius_px as i32;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for di in -r..=r {
        for dj in -r..=r {
            if di * di + dj * dj <= r2 {
                offsets.push((di, dj));
            }
        }
    }
    offsets
}

/// Pixel offsets of a square structuring element with the given half-width
fn square_offsets(radius_px: usize) -> Vec<(i32, i32)> {
    let r = radius_px as i32;
    let mut offsets = Vec::new();
    for di in -r..=r {
        for dj in -r..=r {
            offsets.push((di, dj));
        }
    }
    offsets
}

fn apply_mask_reducer(mask: &MaskRaster, offsets: &[(i32, i32)], any: bool) -> MaskRaster {
    let (rows, cols) = mask.dim();
    let mut out = Array2::from_elem((rows, cols), !any);
    for i in 0..rows {
        for j in 0..cols {
            let mut hit = !any;
            for &(di, dj) in offsets {
                let ii = i as i32 + di;
                let jj = j as i32 + dj;
                // Pixels outside the raster are ignored, not counted as unset
                if ii < 0 || ii >= rows as i32 || jj < 0 || jj >= cols as i32 {
                    continue;
                }
                let v = mask[[ii as usize, jj as usize]];
                if any && v {
                    hit = true;
                    break;
                }
                if !any && !v {
                    hit = false;
                    break;
                }
            }
            out[[i, j]] = hit;
        }
    }
    out
}

/// Morphological dilation with a circular structuring element (focal max)
pub fn dilate(mask: &MaskRaster, radius_px: usize) -> MaskRaster {
    apply_mask_reducer(mask, &circle_offsets(radius_px), true)
}

/// Morphological erosion with a circular structuring element (focal min)
pub fn erode(mask: &MaskRaster, radius_px: usize) -> MaskRaster {
    apply_mask_reducer(mask, &circle_offsets(radius_px), false)
}

/// Edge zone of a binary mask: dilation minus erosion, a symmetric band
/// straddling the mask boundary
pub fn edge_zone(mask: &MaskRaster, radius_px: usize) -> MaskRaster {
    let grown = dilate(mask, radius_px);
    let shrunk = erode(mask, radius_px);
    let (rows, cols) = mask.dim();
    let mut out = Array2::from_elem((rows, cols), false);
    for i in 0..rows {
        for j in 0..cols {
            out[[i, j]] = grown[[i, j]] && !shrunk[[i, j]];
        }
    }
    out
}

fn focal_mean(values: &Raster, offsets: &[(i32, i32)]) -> Raster {
    let (rows, cols) = values.dim();
    let mut out = Array2::from_elem((rows, cols), f32::NAN);
    for i in 0..rows {
        for j in 0..cols {
            let mut sum = 0.0f64;
            let mut count = 0usize;
            for &(di, dj) in offsets {
                let ii = i as i32 + di;
                let jj = j as i32 + dj;
                if ii >= 0 && ii < rows as i32 && jj >= 0 && jj < cols as i32 {
                    let v = values[[ii as usize, jj as usize]];
                    if v.is_finite() {
                        sum += v as f64;
                        count += 1;
                    }
                }
            }
            if count > 0 {
                out[[i, j]] = (sum / count as f64) as f32;
            }
        }
    }
    out
}

/// NaN-ignoring focal mean over a circular neighborhood; NaN where the
/// neighborhood holds no valid pixel
pub fn focal_mean_circle(values: &Raster, radius_px: usize) -> Raster {
    focal_mean(values, &circle_offsets(radius_px))
}

/// NaN-ignoring focal mean over a square neighborhood
pub fn focal_mean_square(values: &Raster, radius_px: usize) -> Raster {
    focal_mean(values, &square_offsets(radius_px))
}

/// Overlay `top` onto `base`: top wins wherever it is finite
pub fn overlay(top: &Raster, base: &Raster) -> Raster {
    let (rows, cols) = top.dim();
    let mut out = base.clone();
    for i in 0..rows {
        for j in 0..cols {
            let v = top[[i, j]];
            if v.is_finite() {
                out[[i, j]] = v;
            }
        }
    }
    out
}
