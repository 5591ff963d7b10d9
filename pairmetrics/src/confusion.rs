//! Confusion-count accumulation between a prediction and a reference grid.
//!
//! The four maps follow the arithmetic definitions used throughout the
//! ratio measures: `fp = (pred - ref) > 0`, `fn = (ref - pred) > 0`,
//! `tp = (ref + pred) > 1`, `tn = (ref + pred) < 0.5`. For probability
//! grids the prediction is binarized at the requested threshold first.

use crate::grid::{Mask, ProbMap};

/// Voxel counts of the four confusion classes at a fixed decision boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfusionCounts {
    pub true_positives: f64,
    pub false_positives: f64,
    pub true_negatives: f64,
    pub false_negatives: f64,
}

impl ConfusionCounts {
    pub fn total(&self) -> f64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    /// Positive voxels in the reference.
    pub fn n_pos_ref(&self) -> f64 {
        self.true_positives + self.false_negatives
    }

    /// Negative voxels in the reference.
    pub fn n_neg_ref(&self) -> f64 {
        self.true_negatives + self.false_positives
    }

    /// Positive voxels in the prediction.
    pub fn n_pos_pred(&self) -> f64 {
        self.true_positives + self.false_positives
    }

    /// Negative voxels in the prediction.
    pub fn n_neg_pred(&self) -> f64 {
        self.true_negatives + self.false_negatives
    }
}

/// A quotient that degrades to NaN instead of panicking or returning
/// infinity when the denominator is exactly zero.
#[inline]
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

/// Counts the confusion classes of a hard-mask pair.
pub fn hard_counts(pred: &Mask, reference: &Mask) -> ConfusionCounts {
    counts(pred.data().iter().copied(), reference)
}

/// Counts the confusion classes of a probability map binarized at
/// `pred >= threshold` against a hard reference.
pub fn thresholded_counts(pred: &ProbMap, reference: &Mask, threshold: f64) -> ConfusionCounts {
    counts(pred.data().iter().map(|&p| p >= threshold), reference)
}

fn counts(pred: impl Iterator<Item = bool>, reference: &Mask) -> ConfusionCounts {
    let mut out = ConfusionCounts {
        true_positives: 0.0,
        false_positives: 0.0,
        true_negatives: 0.0,
        false_negatives: 0.0,
    };
    for (p, &r) in pred.zip(reference.data()) {
        match (p, r) {
            (true, true) => out.true_positives += 1.0,
            (true, false) => out.false_positives += 1.0,
            (false, true) => out.false_negatives += 1.0,
            (false, false) => out.true_negatives += 1.0,
        }
    }
    out
}
