//! # PairMetrics
//!
//! Pairwise agreement measures between a predicted spatial mask (or
//! probability map) and a reference mask over a 2-D or 3-D grid, for
//! evaluating segmentation and detection models built with the Burn
//! framework.
//!
//! Two comparison engines cover the common evaluation settings:
//!
//! - [`BinaryPairwiseMeasures`]: hard-mask comparison — overlap and
//!   agreement ratios (Dice, IoU, MCC, Cohen's kappa, F-beta, ...),
//!   boundary distances (ASSD, MASD, Hausdorff and percentile Hausdorff,
//!   NSD, boundary IoU), connected-component counts with outline/detection
//!   error, and centreline (skeleton) measures.
//! - [`ProbabilityPairwiseMeasures`]: probability-map comparison — a cached
//!   operating-point curve swept over the decision thresholds, curve
//!   integrals (AUROC, average precision, FROC), discrete operating-point
//!   queries (`sens@spec`, `ppv@sens`, ...), expected calibration error and
//!   net benefit.
//!
//! Each engine memoizes its expensive intermediates (confusion counts,
//! distance fields, component labelings, skeletons, the sweep table) for
//! the lifetime of the comparison, so requesting many measures costs one
//! computation of each shared artifact. Engines never mutate their inputs,
//! and independent comparisons are safe to evaluate in parallel.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use burn::prelude::*;
//! use pairmetrics_burn::{BinaryPairwiseMeasures, MeasureConfig};
//!
//! # fn example<B: burn::tensor::backend::Backend>(pred: Tensor<B, 3>, gt: Tensor<B, 3>) {
//! let measures = BinaryPairwiseMeasures::from_tensors(
//!     pred,
//!     gt,
//!     MeasureConfig::new().with_pixdim(Some(vec![1.0, 0.5, 0.5])),
//! )
//! .unwrap();
//!
//! let report = measures.to_dict(&["dice", "hd_perc", "assd"]).unwrap();
//! println!("{report:?}");
//! # }
//! ```
//!
//! With the `train` feature enabled, [`metric`] exposes
//! `burn::train::metric::Metric` adapters for tracking Dice and IoU inside
//! a training loop.

pub mod binary;
pub mod boxes;
mod cache;
pub mod config;
pub mod confusion;
pub mod distance;
pub mod error;
pub mod grid;
#[cfg(feature = "train")]
pub mod metric;
pub mod morphology;
pub mod probability;
pub mod skeleton;


pub use binary::{BinaryPairwiseMeasures, BINARY_MEASURES};
pub use boxes::{box_area, box_intersection, box_iou, box_ior, box_union};
pub use config::MeasureConfig;
pub use confusion::ConfusionCounts;
pub use error::{MeasureError, MeasureResult};
pub use grid::{Mask, ProbMap};
pub use probability::{
    OperatingPoint, OperatingPointCurve, ProbabilityPairwiseMeasures, PROBABILITY_MEASURES,
};

/// Normalized result of a measure computation: a scalar, or a small tuple
/// exposed through dedicated registry keys.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureValue {
    Scalar(f64),
    Tuple(Vec<f64>),
}

impl MeasureValue {
    /// Fixed-precision rendering; tuples join their components with commas.
    pub fn format(&self, precision: usize) -> String {
        match self {
            Self::Scalar(value) => format!("{value:.precision$}"),
            Self::Tuple(values) => values
                .iter()
                .map(|value| format!("{value:.precision$}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// The scalar payload, if this is a scalar.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            Self::Tuple(_) => None,
        }
    }
}
