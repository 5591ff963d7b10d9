//! Anisotropic Euclidean distance fields between mask borders.
//!
//! The distance transform runs one lower-envelope pass per axis over
//! squared distances, with each axis scaled by its physical spacing. The
//! directional surface-distance fields sample the transform of one mask's
//! border at the other mask's border voxels; every downstream boundary
//! measure (ASSD, MASD, Hausdorff, NSD) reads these two fields.

use log::debug;

use crate::grid::{c_strides, Mask};
use crate::morphology::border_map;

/// Border shells of both masks and the two directional surface-distance
/// fields, in physical units.
///
/// The distance fields cover the whole grid and are zero away from the
/// sampling border, so sums and maxima over them range over the directional
/// samples only.
#[derive(Debug, Clone)]
pub struct BorderDistance {
    pub border_ref: Mask,
    pub border_pred: Mask,
    /// Distance to the reference border, sampled at prediction-border voxels.
    pub to_ref_at_pred: Vec<f64>,
    /// Distance to the prediction border, sampled at reference-border voxels.
    pub to_pred_at_ref: Vec<f64>,
}

/// Computes both border shells and directional distance fields for a mask
/// pair.
pub fn border_distance(pred: &Mask, reference: &Mask, pixdim: &[f64]) -> BorderDistance {
    let border_ref = border_map(reference);
    let border_pred = border_map(pred);
    debug!(
        "computing distance fields over {} voxels ({} reference / {} prediction border voxels)",
        reference.len(),
        border_ref.count(),
        border_pred.count()
    );

    let dist_to_ref = distance_field(&border_ref, pixdim);
    let dist_to_pred = distance_field(&border_pred, pixdim);

    let to_ref_at_pred = mask_field(&dist_to_ref, &border_pred);
    let to_pred_at_ref = mask_field(&dist_to_pred, &border_ref);

    BorderDistance { border_ref, border_pred, to_ref_at_pred, to_pred_at_ref }
}

/// Distance from every voxel to the nearest foreground voxel of `sources`,
/// scaled per axis by `pixdim`.
///
/// When `sources` has no foreground voxel the whole field is infinite.
pub fn distance_field(sources: &Mask, pixdim: &[f64]) -> Vec<f64> {
    let shape = sources.shape();
    let strides = c_strides(shape);
    let len = sources.len();
    if len == 0 {
        return Vec::new();
    }

    let mut squared = vec![f64::INFINITY; len];
    for idx in 0..len {
        if sources.get(idx) {
            squared[idx] = 0.0;
        }
    }

    let max_extent = shape.iter().copied().max().unwrap_or(0);
    let mut line = vec![0.0; max_extent];
    let mut out = vec![0.0; max_extent];
    let mut hull = vec![0usize; max_extent];
    let mut crossings = vec![0.0; max_extent + 1];

    for axis in 0..shape.len() {
        let extent = shape[axis];
        let stride = strides[axis];
        if extent == 0 {
            continue;
        }
        let block = extent * stride;
        let outer = len / block;
        for o in 0..outer {
            for inner in 0..stride {
                let base = o * block + inner;
                for k in 0..extent {
                    line[k] = squared[base + k * stride];
                }
                lower_envelope(
                    &line[..extent],
                    pixdim[axis],
                    &mut out[..extent],
                    &mut hull[..extent],
                    &mut crossings[..extent + 1],
                );
                for k in 0..extent {
                    squared[base + k * stride] = out[k];
                }
            }
        }
    }

    squared.iter().map(|&d| d.sqrt()).collect()
}

/// One 1-D pass of the squared distance transform: the lower envelope of
/// the parabolas rooted at `i * spacing` with height `f[i]`.
fn lower_envelope(f: &[f64], spacing: f64, d: &mut [f64], hull: &mut [usize], crossings: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let mut k = 0usize;
    hull[0] = 0;
    crossings[0] = f64::NEG_INFINITY;
    crossings[1] = f64::INFINITY;

    for q in 1..n {
        let mut s = intersection(f, spacing, hull[k], q);
        while k > 0 && s <= crossings[k] {
            k -= 1;
            s = intersection(f, spacing, hull[k], q);
        }
        if k == 0 && s <= crossings[0] {
            // A finite parabola displaces an infinite-height hull root.
            hull[0] = q;
            crossings[1] = f64::INFINITY;
        } else {
            k += 1;
            hull[k] = q;
            crossings[k] = s;
            crossings[k + 1] = f64::INFINITY;
        }
    }

    let mut k = 0usize;
    for (i, slot) in d.iter_mut().enumerate() {
        let x = i as f64 * spacing;
        while crossings[k + 1] < x {
            k += 1;
        }
        let dx = x - hull[k] as f64 * spacing;
        *slot = f[hull[k]] + dx * dx;
    }
}

/// Crossing point of the parabolas rooted at samples `i` and `q` (`i < q`).
/// Infinite heights push the crossing to whichever side keeps the envelope
/// finite.
fn intersection(f: &[f64], spacing: f64, i: usize, q: usize) -> f64 {
    if f[q].is_infinite() {
        return f64::INFINITY;
    }
    if f[i].is_infinite() {
        return f64::NEG_INFINITY;
    }
    let xi = i as f64 * spacing;
    let xq = q as f64 * spacing;
    ((f[q] + xq * xq) - (f[i] + xi * xi)) / (2.0 * (xq - xi))
}

fn mask_field(field: &[f64], sampling_border: &Mask) -> Vec<f64> {
    field
        .iter()
        .zip(sampling_border.data())
        .map(|(&d, &on)| if on { d } else { 0.0 })
        .collect()
}

/// Percentile with linear interpolation between closest ranks, matching the
/// convention of the reference tooling used for percentile Hausdorff
/// distances.
pub(crate) fn percentile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let rank = (values.len() - 1) as f64 * q / 100.0;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        values[lo]
    } else {
        let weight = rank - lo as f64;
        values[lo] * (1.0 - weight) + values[hi] * weight
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::grid::Mask;

    fn mask(shape: Vec<usize>, rows: &[u8]) -> Mask {
        Mask::new(shape, rows.iter().map(|&v| v != 0).collect()).unwrap()
    }

    #[test]
    fn distance_field_counts_steps_from_the_source() {
        let sources = mask(vec![1, 4], &[1, 0, 0, 0]);
        let field = distance_field(&sources, &[1.0, 1.0]);
        assert_relative_eq!(field[0], 0.0);
        assert_relative_eq!(field[1], 1.0);
        assert_relative_eq!(field[3], 3.0);
    }

    #[test]
    fn distance_field_is_euclidean_across_axes() {
        let sources = mask(vec![4, 4], &[
            1, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0,
        ]);
        let field = distance_field(&sources, &[1.0, 1.0]);
        assert_relative_eq!(field[3 * 4 + 3], (18.0f64).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(field[1 * 4 + 1], (2.0f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn spacing_scales_each_axis_independently() {
        let sources = mask(vec![1, 3], &[1, 0, 0]);
        let field = distance_field(&sources, &[1.0, 0.5]);
        assert_relative_eq!(field[2], 1.0);

        let sources = mask(vec![3, 1], &[1, 0, 0]);
        let field = distance_field(&sources, &[2.0, 1.0]);
        assert_relative_eq!(field[2], 4.0);
    }

    #[test]
    fn empty_source_yields_an_infinite_field() {
        let sources = mask(vec![2, 2], &[0, 0, 0, 0]);
        let field = distance_field(&sources, &[1.0, 1.0]);
        assert!(field.iter().all(|d| d.is_infinite()));
    }

    #[test]
    fn directional_fields_sample_the_opposite_border() {
        let reference = mask(vec![1, 3], &[1, 0, 0]);
        let pred = mask(vec![1, 3], &[0, 0, 1]);
        let bd = border_distance(&pred, &reference, &[1.0, 1.0]);

        assert_eq!(bd.border_ref.count(), 1);
        assert_eq!(bd.border_pred.count(), 1);
        assert_relative_eq!(bd.to_ref_at_pred[2], 2.0);
        assert_relative_eq!(bd.to_pred_at_ref[0], 2.0);
        assert_relative_eq!(bd.to_ref_at_pred[0], 0.0);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let mut values = vec![0.0, 1.0, 2.0, 3.0];
        assert_relative_eq!(percentile(&mut values, 50.0), 1.5);
        assert_relative_eq!(percentile(&mut values, 100.0), 3.0);
        assert_relative_eq!(percentile(&mut values, 0.0), 0.0);
    }
}
