//! Probability-map comparison facade.
//!
//! A `ProbabilityPairwiseMeasures` sweeps decision thresholds over the
//! prediction, builds one cached operating-point curve per comparison, and
//! answers curve-integral measures (AUROC, average precision, FROC),
//! discrete operating-point queries and calibration measures from it.

use std::collections::BTreeMap;
use std::rc::Rc;

use burn::tensor::{backend::Backend, Tensor};
use log::debug;
use serde::Serialize;

use crate::cache::MeasureCache;
use crate::config::MeasureConfig;
use crate::confusion::{ratio, thresholded_counts, ConfusionCounts};
use crate::error::{MeasureError, MeasureResult};
use crate::grid::{Mask, ProbMap};
use crate::MeasureValue;

/// Measure keys answered by [`ProbabilityPairwiseMeasures::measure`].
pub const PROBABILITY_MEASURES: &[&str] = &[
    "auroc",
    "ap",
    "froc",
    "sens@spec",
    "spec@sens",
    "ppv@sens",
    "sens@ppv",
    "sens@fppi",
    "fppi@sens",
    "ece",
    "net_benefit",
];

/// One row of the threshold sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperatingPoint {
    pub threshold: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub precision: f64,
    /// False positives per case (or per trailing-axis image).
    pub fppi: f64,
}

/// The full sweep table, ordered by strictly decreasing threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct OperatingPointCurve {
    pub points: Vec<OperatingPoint>,
}

/// Comparison engine for a probability map against a hard reference.
pub struct ProbabilityPairwiseMeasures {
    pred: ProbMap,
    reference: Mask,
    cases: Option<Vec<usize>>,
    config: MeasureConfig,
    cache: MeasureCache,
}

impl ProbabilityPairwiseMeasures {
    /// Creates a comparison over a probability map and a reference mask of
    /// identical shape.
    pub fn new(pred: ProbMap, reference: Mask, config: MeasureConfig) -> MeasureResult<Self> {
        if pred.shape() != reference.shape() {
            return Err(MeasureError::ShapeMismatch {
                pred: pred.shape().to_vec(),
                reference: reference.shape().to_vec(),
            });
        }
        config.validate(pred.rank())?;
        Ok(Self { pred, reference, cases: None, config, cache: MeasureCache::new() })
    }

    /// Creates a comparison from two float tensors; the reference is
    /// binarized at 0.5.
    pub fn from_tensors<B: Backend, const D: usize>(
        pred: Tensor<B, D>,
        reference: Tensor<B, D>,
        config: MeasureConfig,
    ) -> MeasureResult<Self> {
        Self::new(ProbMap::from_tensor(&pred)?, Mask::from_tensor(&reference)?, config)
    }

    /// Attaches case identifiers partitioning the leading axis; FPPI then
    /// averages false-positive counts per case instead of per trailing-axis
    /// image.
    pub fn with_cases(mut self, cases: Vec<usize>) -> MeasureResult<Self> {
        let leading = self.pred.shape().first().copied().unwrap_or(0);
        if cases.len() != leading {
            return Err(MeasureError::InvalidConfiguration {
                reason: format!(
                    "{} case ids for a leading axis of extent {leading}",
                    cases.len()
                ),
            });
        }
        self.cases = Some(cases);
        Ok(self)
    }

    // --- Per-threshold statistics ---

    fn confusion_at(&self, threshold: f64) -> ConfusionCounts {
        self.cache.confusion(Some(threshold), || {
            thresholded_counts(&self.pred, &self.reference, threshold)
        })
    }

    /// Sensitivity of the prediction binarized at `pred >= threshold`.
    pub fn sensitivity_at(&self, threshold: f64) -> f64 {
        let c = self.confusion_at(threshold);
        ratio(c.true_positives, c.n_pos_ref())
    }

    /// Specificity at the given threshold.
    pub fn specificity_at(&self, threshold: f64) -> f64 {
        let c = self.confusion_at(threshold);
        ratio(c.true_negatives, c.n_neg_ref())
    }

    /// Precision at the given threshold, or the -1 sentinel under the
    /// `empty` flag.
    pub fn positive_predictive_values_at(&self, threshold: f64) -> f64 {
        if self.config.empty {
            return -1.0;
        }
        let c = self.confusion_at(threshold);
        ratio(c.true_positives, c.n_pos_pred())
    }

    /// Mean false-positive count per case (or per trailing-axis image) at
    /// the given threshold.
    pub fn fppi_at(&self, threshold: f64) -> f64 {
        match &self.cases {
            Some(cases) => {
                let leading = match self.pred.shape().first() {
                    Some(&n) if n > 0 => n,
                    _ => return f64::NAN,
                };
                let block = self.pred.len() / leading;
                let partitions = match cases.iter().max() {
                    Some(&max_id) => max_id + 1,
                    None => return f64::NAN,
                };
                let mut per_case = vec![0.0; partitions];
                for idx in 0..self.pred.len() {
                    if self.pred.get(idx) >= threshold && !self.reference.get(idx) {
                        per_case[cases[idx / block]] += 1.0;
                    }
                }
                per_case.iter().sum::<f64>() / partitions as f64
            }
            None => {
                let images = match self.pred.shape().last() {
                    Some(&n) if n > 0 => n,
                    _ => return f64::NAN,
                };
                let mut per_image = vec![0.0; images];
                for idx in 0..self.pred.len() {
                    if self.pred.get(idx) >= threshold && !self.reference.get(idx) {
                        per_image[idx % images] += 1.0;
                    }
                }
                per_image.iter().sum::<f64>() / images as f64
            }
        }
    }

    // --- Threshold sweep ---

    /// Decision thresholds, strictly decreasing. Every distinct probability
    /// is kept unless both sampling caps are exceeded, in which case values
    /// are coalesced into bins of roughly `size / max_samples` voxels.
    fn candidate_thresholds(&self) -> Vec<f64> {
        let mut values = self.pred.data().to_vec();
        values.sort_by(f64::total_cmp);

        let mut uniques: Vec<(f64, usize)> = Vec::new();
        for &v in &values {
            match uniques.last_mut() {
                Some((last, count)) if *last == v => *count += 1,
                _ => uniques.push((v, 1)),
            }
        }

        let mut thresholds: Vec<f64> = if uniques.len() < self.config.max_thresholds
            || self.reference.len() < self.config.max_samples
        {
            uniques.iter().map(|&(v, _)| v).collect()
        } else {
            let bin_voxels = self.reference.len() as f64 / self.config.max_samples as f64;
            debug!(
                "coalescing {} distinct probabilities into bins of ~{bin_voxels:.1} voxels",
                uniques.len()
            );
            let mut coalesced = vec![0.0];
            let mut accumulated = 0usize;
            for &(value, count) in &uniques {
                accumulated += count;
                if accumulated as f64 >= bin_voxels {
                    coalesced.push(value);
                    accumulated = 0;
                }
            }
            coalesced
        };

        thresholds.sort_by(f64::total_cmp);
        thresholds.dedup();
        thresholds.reverse();
        thresholds
    }

    fn sweep(&self) -> Rc<OperatingPointCurve> {
        self.cache.sweep(|| {
            let points = self
                .candidate_thresholds()
                .into_iter()
                .map(|threshold| OperatingPoint {
                    threshold,
                    sensitivity: self.sensitivity_at(threshold),
                    specificity: self.specificity_at(threshold),
                    precision: self.positive_predictive_values_at(threshold),
                    fppi: self.fppi_at(threshold),
                })
                .collect();
            OperatingPointCurve { points }
        })
    }

    /// The cached sweep table.
    pub fn operating_points(&self) -> OperatingPointCurve {
        (*self.sweep()).clone()
    }

    // --- Curve-integral measures ---

    /// Area under the ROC curve: sensitivity integrated against
    /// (1 - specificity).
    pub fn auroc(&self) -> f64 {
        let curve = self.sweep();
        let x: Vec<f64> = curve.points.iter().map(|p| 1.0 - p.specificity).collect();
        let y: Vec<f64> = curve.points.iter().map(|p| p.sensitivity).collect();
        trapezoidal_integration(&x, &y)
    }

    /// Precision integrated against sensitivity.
    pub fn average_precision(&self) -> f64 {
        let curve = self.sweep();
        let x: Vec<f64> = curve.points.iter().map(|p| p.sensitivity).collect();
        let y: Vec<f64> = curve.points.iter().map(|p| p.precision).collect();
        trapezoidal_integration(&x, &y)
    }

    /// Sensitivity integrated against false positives per case.
    pub fn froc(&self) -> f64 {
        let curve = self.sweep();
        let x: Vec<f64> = curve.points.iter().map(|p| p.fppi).collect();
        let y: Vec<f64> = curve.points.iter().map(|p| p.sensitivity).collect();
        trapezoidal_integration(&x, &y)
    }

    // --- Operating-point queries ---

    /// Largest sensitivity among rows with specificity at least the
    /// configured target.
    pub fn sensitivity_at_specificity(&self) -> MeasureResult<f64> {
        let target = self.config.value_specificity;
        self.best_point("sens@spec", format!("specificity >= {target}"), false, |p| {
            (p.sensitivity, p.specificity >= target)
        })
    }

    /// Largest specificity among rows with sensitivity at least the
    /// configured target.
    pub fn specificity_at_sensitivity(&self) -> MeasureResult<f64> {
        let target = self.config.value_sensitivity;
        self.best_point("spec@sens", format!("sensitivity >= {target}"), false, |p| {
            (p.specificity, p.sensitivity >= target)
        })
    }

    /// Largest precision among rows with sensitivity at least the
    /// configured target.
    pub fn ppv_at_sensitivity(&self) -> MeasureResult<f64> {
        let target = self.config.value_sensitivity;
        self.best_point("ppv@sens", format!("sensitivity >= {target}"), false, |p| {
            (p.precision, p.sensitivity >= target)
        })
    }

    /// Largest sensitivity among rows with precision at least the
    /// configured target.
    pub fn sensitivity_at_ppv(&self) -> MeasureResult<f64> {
        let target = self.config.value_ppv;
        self.best_point("sens@ppv", format!("precision >= {target}"), false, |p| {
            (p.sensitivity, p.precision >= target)
        })
    }

    /// Largest sensitivity among rows with at most the configured false
    /// positives per case.
    pub fn sensitivity_at_fppi(&self) -> MeasureResult<f64> {
        let target = self.config.value_fppi;
        self.best_point("sens@fppi", format!("fppi <= {target}"), false, |p| {
            (p.sensitivity, p.fppi <= target)
        })
    }

    /// Smallest false-positives-per-case among rows with sensitivity at
    /// least the configured target.
    pub fn fppi_at_sensitivity(&self) -> MeasureResult<f64> {
        let target = self.config.value_sensitivity;
        self.best_point("fppi@sens", format!("sensitivity >= {target}"), true, |p| {
            (p.fppi, p.sensitivity >= target)
        })
    }

    fn best_point(
        &self,
        measure: &str,
        constraint: String,
        select_min: bool,
        row: impl Fn(&OperatingPoint) -> (f64, bool),
    ) -> MeasureResult<f64> {
        let curve = self.sweep();
        let mut best: Option<f64> = None;
        for point in &curve.points {
            let (value, feasible) = row(point);
            if !feasible || value.is_nan() {
                continue;
            }
            best = Some(match best {
                None => value,
                Some(current) if select_min => current.min(value),
                Some(current) => current.max(value),
            });
        }
        best.ok_or(MeasureError::NoQualifyingPoint { measure: measure.to_string(), constraint })
    }

    // --- Calibration measures ---

    /// Expected calibration error over equal-width probability bins.
    pub fn expectation_calibration_error(&self) -> f64 {
        let bins = self.config.bins_ece;
        let step = 1.0 / bins as f64;
        let mut weighted = 0.0;
        let mut total = 0.0;
        for bin in 0..bins {
            let lower = bin as f64 * step;
            let upper = if bin + 1 == bins { 1.0 } else { (bin + 1) as f64 * step };
            let mut samples = 0.0;
            let mut positives = 0.0;
            let mut sum_pred = 0.0;
            for idx in 0..self.pred.len() {
                let p = self.pred.get(idx);
                if p > lower && p <= upper {
                    samples += 1.0;
                    sum_pred += p;
                    if self.reference.get(idx) {
                        positives += 1.0;
                    }
                }
            }
            if samples == 0.0 {
                continue;
            }
            weighted += samples * (positives / samples - sum_pred / samples).abs();
            total += samples;
        }
        ratio(weighted, total)
    }

    /// Net benefit of treating at the configured decision threshold.
    pub fn net_benefit_treated(&self) -> f64 {
        let threshold = self.config.benefit_proba;
        let c = self.confusion_at(threshold);
        let voxels = self.pred.len() as f64;
        let odds = threshold / (1.0 - threshold);
        ratio(c.true_positives, voxels) - ratio(c.false_positives, voxels) * odds
    }

    // --- Registry ---

    /// All keys [`Self::measure`] recognizes.
    pub fn measures() -> &'static [&'static str] {
        PROBABILITY_MEASURES
    }

    /// Computes one measure by registry key.
    pub fn measure(&self, key: &str) -> MeasureResult<MeasureValue> {
        let value = match key {
            "auroc" => self.auroc(),
            "ap" => self.average_precision(),
            "froc" => self.froc(),
            "sens@spec" => self.sensitivity_at_specificity()?,
            "spec@sens" => self.specificity_at_sensitivity()?,
            "ppv@sens" => self.ppv_at_sensitivity()?,
            "sens@ppv" => self.sensitivity_at_ppv()?,
            "sens@fppi" => self.sensitivity_at_fppi()?,
            "fppi@sens" => self.fppi_at_sensitivity()?,
            "ece" => self.expectation_calibration_error(),
            "net_benefit" => self.net_benefit_treated(),
            _ => return Err(MeasureError::UnknownMeasure { key: key.to_string() }),
        };
        Ok(MeasureValue::Scalar(value))
    }

    /// Computes the requested measures and formats them with four decimals.
    pub fn to_dict(&self, keys: &[&str]) -> MeasureResult<BTreeMap<String, String>> {
        keys.iter()
            .map(|&key| Ok((key.to_string(), self.measure(key)?.format(4))))
            .collect()
    }
}

/// Trapezoidal rule over sample pairs, signed by the direction of `x`.
pub fn trapezoidal_integration(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::MeasureConfig;
    use crate::grid::{Mask, ProbMap};

    fn engine(
        shape: Vec<usize>,
        pred: Vec<f64>,
        reference: Vec<u8>,
        config: MeasureConfig,
    ) -> ProbabilityPairwiseMeasures {
        let pred = ProbMap::new(shape.clone(), pred).unwrap();
        let reference =
            Mask::new(shape, reference.iter().map(|&v| v != 0).collect()).unwrap();
        ProbabilityPairwiseMeasures::new(pred, reference, config).unwrap()
    }

    #[test]
    fn trapezoid_matches_closed_form() {
        assert_relative_eq!(trapezoidal_integration(&[0.0, 1.0], &[0.0, 1.0]), 0.5);
        assert_relative_eq!(
            trapezoidal_integration(&[0.0, 0.5, 1.0], &[1.0, 1.0, 1.0]),
            1.0
        );
    }

    #[test]
    fn perfect_separator_has_unit_auroc() {
        let m = engine(
            vec![1, 4],
            vec![0.1, 0.2, 0.8, 0.9],
            vec![0, 0, 1, 1],
            MeasureConfig::new(),
        );
        assert_relative_eq!(m.auroc(), 1.0);
    }

    #[test]
    fn sweep_is_ordered_and_monotone() {
        let m = engine(
            vec![1, 6],
            vec![0.05, 0.2, 0.4, 0.6, 0.8, 0.95],
            vec![0, 1, 0, 1, 1, 1],
            MeasureConfig::new(),
        );
        let curve = m.operating_points();
        assert!(curve
            .points
            .windows(2)
            .all(|w| w[0].threshold > w[1].threshold));
        // Sensitivity grows as the threshold falls.
        assert!(curve
            .points
            .windows(2)
            .all(|w| w[0].sensitivity <= w[1].sensitivity));
    }

    #[test]
    fn sweeps_are_deterministic() {
        let build = || {
            engine(
                vec![1, 5],
                vec![0.1, 0.3, 0.5, 0.7, 0.9],
                vec![0, 0, 1, 1, 1],
                MeasureConfig::new(),
            )
        };
        assert_eq!(build().operating_points(), build().operating_points());
    }

    #[test]
    fn large_prediction_sets_coalesce() {
        let len = 1600;
        let pred: Vec<f64> = (0..len).map(|i| i as f64 / len as f64).collect();
        let reference: Vec<u8> = (0..len).map(|i| u8::from(i > 1200)).collect();
        let m = engine(vec![40, 40], pred, reference, MeasureConfig::new());

        let curve = m.operating_points();
        assert!(curve.points.len() <= m.config.max_samples + 2);
        assert!(curve.points.len() >= 100);
        assert!(curve
            .points
            .windows(2)
            .all(|w| w[0].threshold > w[1].threshold));
        assert!(curve
            .points
            .windows(2)
            .all(|w| w[0].sensitivity <= w[1].sensitivity));
    }

    #[test]
    fn operating_point_queries_search_the_feasible_rows() {
        let m = engine(
            vec![1, 4],
            vec![0.1, 0.2, 0.8, 0.9],
            vec![0, 0, 1, 1],
            MeasureConfig::new(),
        );
        // Rows with specificity 1 reach sensitivity 1 at threshold 0.8.
        assert_relative_eq!(m.sensitivity_at_specificity().unwrap(), 1.0);
        assert_relative_eq!(m.specificity_at_sensitivity().unwrap(), 1.0);
        // The smallest feasible FPPI at sensitivity >= 0.8.
        assert_relative_eq!(m.fppi_at_sensitivity().unwrap(), 0.0);
    }

    #[test]
    fn infeasible_queries_report_no_qualifying_point() {
        let m = engine(
            vec![1, 2],
            vec![0.2, 0.4],
            vec![1, 0],
            MeasureConfig::new().with_value_specificity(0.99),
        );
        match m.sensitivity_at_specificity() {
            Err(MeasureError::NoQualifyingPoint { measure, .. }) => {
                assert_eq!(measure, "sens@spec");
            }
            other => panic!("expected NoQualifyingPoint, got {other:?}"),
        }
    }

    #[test]
    fn single_bin_calibration_error() {
        let m = engine(
            vec![1, 4],
            vec![0.7, 0.7, 0.7, 0.7],
            vec![1, 1, 0, 0],
            MeasureConfig::new().with_bins_ece(1),
        );
        assert_relative_eq!(m.expectation_calibration_error(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn net_benefit_discounts_false_positives_by_the_odds() {
        let m = engine(
            vec![1, 4],
            vec![0.9, 0.9, 0.1, 0.9],
            vec![1, 1, 0, 0],
            MeasureConfig::new(),
        );
        // tp = 2, fp = 1, odds = 1 at the default 0.5 threshold.
        assert_relative_eq!(m.net_benefit_treated(), 2.0 / 4.0 - 1.0 / 4.0);
    }

    #[test]
    fn empty_flag_propagates_to_thresholded_precision() {
        let m = engine(
            vec![1, 2],
            vec![0.2, 0.8],
            vec![0, 0],
            MeasureConfig::new().with_empty(true),
        );
        assert_relative_eq!(m.positive_predictive_values_at(0.5), -1.0);
    }

    #[test]
    fn case_ids_partition_the_leading_axis() {
        // Two leading rows assigned to cases 0 and 1; three false positives
        // in case 0, one in case 1.
        let m = engine(
            vec![2, 4],
            vec![0.9, 0.9, 0.9, 0.1, 0.9, 0.1, 0.1, 0.1],
            vec![0, 0, 0, 0, 0, 0, 0, 0],
            MeasureConfig::new(),
        )
        .with_cases(vec![0, 1])
        .unwrap();
        assert_relative_eq!(m.fppi_at(0.5), 2.0);
    }
}
