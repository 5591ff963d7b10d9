//! Hard-mask comparison facade.
//!
//! A `BinaryPairwiseMeasures` wraps one (prediction, reference) mask pair
//! plus its configuration, and answers any measure from the registry.
//! Expensive intermediates (confusion counts, border distance fields,
//! component labelings, skeletons) are computed once per instance and
//! shared by every measure that needs them.

use std::collections::BTreeMap;
use std::rc::Rc;

use burn::tensor::{backend::Backend, Tensor};

use crate::cache::MeasureCache;
use crate::config::MeasureConfig;
use crate::confusion::{hard_counts, ratio, ConfusionCounts};
use crate::distance::{border_distance, percentile, BorderDistance};
use crate::error::{MeasureError, MeasureResult};
use crate::grid::{unravel, Mask};
use crate::morphology::{error_maps, match_components, neighborhood_order, ComponentMatch, ErrorMaps};
use crate::skeleton::{skeletonize, SkeletonPair};
use crate::MeasureValue;

/// Measure keys answered by [`BinaryPairwiseMeasures::measure`].
pub const BINARY_MEASURES: &[&str] = &[
    "accuracy",
    "balanced_accuracy",
    "cohens_kappa",
    "lr+",
    "iou",
    "ior",
    "dice",
    "fbeta",
    "youden_ind",
    "mcc",
    "sens",
    "spec",
    "ppv",
    "npv",
    "fpr",
    "informedness",
    "markedness",
    "vol_diff",
    "fppi",
    "com_dist",
    "assd",
    "masd",
    "hd",
    "hd_perc",
    "nsd",
    "boundary_iou",
    "centreline_prec",
    "centreline_sens",
    "centreline_dsc",
    "connected_elements",
    "connected_tp",
    "connected_fp",
    "connected_fn",
    "outline_error",
    "detection_error",
    "oer",
    "oefp",
    "oefn",
    "de",
    "defp",
    "defn",
];

/// Comparison engine for one hard-mask pair.
pub struct BinaryPairwiseMeasures {
    pred: Mask,
    reference: Mask,
    pixdim: Vec<f64>,
    neighborhood: usize,
    config: MeasureConfig,
    cache: MeasureCache,
}

impl BinaryPairwiseMeasures {
    /// Creates a comparison over two masks of identical shape.
    pub fn new(pred: Mask, reference: Mask, config: MeasureConfig) -> MeasureResult<Self> {
        if pred.shape() != reference.shape() {
            return Err(MeasureError::ShapeMismatch {
                pred: pred.shape().to_vec(),
                reference: reference.shape().to_vec(),
            });
        }
        let rank = pred.rank();
        config.validate(rank)?;
        let pixdim = config.resolve_pixdim(rank)?;
        let neighborhood = neighborhood_order(rank, config.num_neighbors).ok_or_else(|| {
            MeasureError::InvalidConfiguration {
                reason: format!(
                    "num_neighbors {} is not a valid rank-{rank} connectivity",
                    config.num_neighbors
                ),
            }
        })?;
        Ok(Self { pred, reference, pixdim, neighborhood, config, cache: MeasureCache::new() })
    }

    /// Creates a comparison from two float tensors, binarized at 0.5.
    pub fn from_tensors<B: Backend, const D: usize>(
        pred: Tensor<B, D>,
        reference: Tensor<B, D>,
        config: MeasureConfig,
    ) -> MeasureResult<Self> {
        Self::new(Mask::from_tensor(&pred)?, Mask::from_tensor(&reference)?, config)
    }

    pub fn pred(&self) -> &Mask {
        &self.pred
    }

    pub fn reference(&self) -> &Mask {
        &self.reference
    }

    // --- Confusion-derived ratios ---

    fn confusion(&self) -> ConfusionCounts {
        self.cache.confusion(None, || hard_counts(&self.pred, &self.reference))
    }

    /// tp / n_pos_ref.
    pub fn sensitivity(&self) -> f64 {
        let c = self.confusion();
        ratio(c.true_positives, c.n_pos_ref())
    }

    /// Alias of [`Self::sensitivity`].
    pub fn recall(&self) -> f64 {
        self.sensitivity()
    }

    /// tn / n_neg_ref.
    pub fn specificity(&self) -> f64 {
        let c = self.confusion();
        ratio(c.true_negatives, c.n_neg_ref())
    }

    /// fp / n_neg_ref.
    pub fn false_positive_rate(&self) -> f64 {
        let c = self.confusion();
        ratio(c.false_positives, c.n_neg_ref())
    }

    pub fn accuracy(&self) -> f64 {
        let c = self.confusion();
        ratio(c.true_positives + c.true_negatives, c.total())
    }

    pub fn balanced_accuracy(&self) -> f64 {
        0.5 * self.sensitivity() + 0.5 * self.specificity()
    }

    /// sens - spec + 1.
    pub fn youden_index(&self) -> f64 {
        1.0 - self.specificity() + self.sensitivity()
    }

    pub fn informedness(&self) -> f64 {
        self.sensitivity() + self.specificity() - 1.0
    }

    pub fn markedness(&self) -> f64 {
        self.positive_predictive_values() + self.negative_predictive_values() - 1.0
    }

    /// sens / (1 - spec).
    pub fn positive_likelihood_ratio(&self) -> f64 {
        ratio(self.sensitivity(), 1.0 - self.specificity())
    }

    /// tp / n_pos_pred, or the -1 sentinel under the `empty` flag.
    pub fn positive_predictive_values(&self) -> f64 {
        if self.config.empty {
            return -1.0;
        }
        let c = self.confusion();
        ratio(c.true_positives, c.n_pos_pred())
    }

    /// tn / (tn + fn).
    pub fn negative_predictive_values(&self) -> f64 {
        let c = self.confusion();
        ratio(c.true_negatives, c.n_neg_pred())
    }

    pub fn matthews_correlation_coefficient(&self) -> f64 {
        let c = self.confusion();
        let numerator =
            c.true_positives * c.true_negatives - c.false_positives * c.false_negatives;
        let denominator = (c.n_pos_pred() * c.n_pos_ref() * c.n_neg_ref() * c.n_neg_pred()).sqrt();
        ratio(numerator, denominator)
    }

    /// Chance agreement is taken over the class marginals, restricted to
    /// the classes actually present in the reference.
    pub fn cohens_kappa(&self) -> f64 {
        let c = self.confusion();
        let total = c.total();
        let mut chance = 0.0;
        if c.n_neg_ref() > 0.0 {
            chance += (c.n_neg_ref() / total) * (c.n_neg_pred() / total);
        }
        if c.n_pos_ref() > 0.0 {
            chance += (c.n_pos_ref() / total) * (c.n_pos_pred() / total);
        }
        ratio(self.accuracy() - chance, 1.0 - chance)
    }

    /// F-beta with the configured beta weight; NaN when the denominator
    /// vanishes.
    pub fn fbeta(&self) -> f64 {
        let beta2 = self.config.beta * self.config.beta;
        let ppv = self.positive_predictive_values();
        let recall = self.recall();
        let numerator = (1.0 + beta2) * ppv * recall;
        let denominator = beta2 * ppv + recall;
        if denominator == 0.0 {
            f64::NAN
        } else {
            numerator / denominator
        }
    }

    /// 2 tp / (|ref| + |pred|).
    pub fn dice_score(&self) -> f64 {
        let c = self.confusion();
        ratio(2.0 * c.true_positives, c.n_pos_ref() + c.n_pos_pred())
    }

    /// Jaccard coefficient over the voxel-wise intersection and union.
    pub fn intersection_over_union(&self) -> f64 {
        let c = self.confusion();
        ratio(
            c.true_positives,
            c.true_positives + c.false_positives + c.false_negatives,
        )
    }

    pub fn intersection_over_reference(&self) -> f64 {
        let c = self.confusion();
        ratio(c.true_positives, c.n_pos_ref())
    }

    /// |n_pos_ref - n_pos_pred| / n_pos_ref.
    pub fn volume_difference(&self) -> f64 {
        let c = self.confusion();
        ratio((c.n_pos_ref() - c.n_pos_pred()).abs(), c.n_pos_ref())
    }

    /// Mean false-positive count per image, the trailing axis indexing the
    /// images.
    pub fn fppi(&self) -> f64 {
        let images = match self.pred.shape().last() {
            Some(&n) if n > 0 => n,
            _ => return f64::NAN,
        };
        let mut per_image = vec![0.0; images];
        for idx in 0..self.pred.len() {
            if self.pred.get(idx) && !self.reference.get(idx) {
                per_image[idx % images] += 1.0;
            }
        }
        per_image.iter().sum::<f64>() / images as f64
    }

    /// Physical distance between the two centres of mass, or the -1
    /// sentinel under the `empty` flag.
    pub fn centre_of_mass_distance(&self) -> f64 {
        if self.config.empty {
            return -1.0;
        }
        let com_ref = centre_of_mass(&self.reference);
        let com_pred = centre_of_mass(&self.pred);
        com_ref
            .iter()
            .zip(&com_pred)
            .zip(&self.pixdim)
            .map(|((r, p), d)| ((r - p) * d).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    // --- Distance-based measures ---

    fn border_distance(&self) -> Rc<BorderDistance> {
        self.cache
            .border_distance(|| border_distance(&self.pred, &self.reference, &self.pixdim))
    }

    /// (hausdorff, assd, hausdorff percentile, masd) in one pass. All four
    /// are zero when both masks are empty.
    fn distances(&self, perc: f64) -> (f64, f64, f64, f64) {
        if self.pred.count() + self.reference.count() == 0 {
            return (0.0, 0.0, 0.0, 0.0);
        }
        let bd = self.border_distance();

        let sum_to_ref: f64 = bd.to_ref_at_pred.iter().sum();
        let sum_to_pred: f64 = bd.to_pred_at_ref.iter().sum();
        let n_border_ref = bd.border_ref.count() as f64;
        let n_border_pred = bd.border_pred.count() as f64;

        let assd = ratio(sum_to_ref + sum_to_pred, n_border_ref + n_border_pred);
        let masd = ratio(sum_to_pred, n_border_ref) + ratio(sum_to_ref, n_border_pred);

        let hausdorff = bd
            .to_ref_at_pred
            .iter()
            .chain(&bd.to_pred_at_ref)
            .fold(0.0, |acc: f64, &d| acc.max(d));

        // Percentiles range over the union of the two masks, not just the
        // border voxels.
        let mut at_union_ref = Vec::new();
        let mut at_union_pred = Vec::new();
        for idx in 0..self.pred.len() {
            if self.pred.get(idx) || self.reference.get(idx) {
                at_union_pred.push(bd.to_pred_at_ref[idx]);
                at_union_ref.push(bd.to_ref_at_pred[idx]);
            }
        }
        let hausdorff_perc =
            percentile(&mut at_union_ref, perc).max(percentile(&mut at_union_pred, perc));

        (hausdorff, assd, hausdorff_perc, masd)
    }

    /// Average symmetric surface distance.
    pub fn average_surface_distance(&self) -> f64 {
        self.distances(self.config.hd_percentile).1
    }

    /// Mean average surface distance: the sum of the two directional means.
    pub fn measured_masd(&self) -> f64 {
        self.distances(self.config.hd_percentile).3
    }

    /// Hausdorff distance.
    pub fn hausdorff_distance(&self) -> f64 {
        self.distances(self.config.hd_percentile).0
    }

    /// Percentile Hausdorff distance at the configured percentile.
    pub fn hausdorff_distance_percentile(&self) -> f64 {
        self.distances(self.config.hd_percentile).2
    }

    /// Fraction of border voxels whose directional distance stays below the
    /// configured tolerance.
    pub fn normalised_surface_distance(&self) -> f64 {
        if self.pred.count() + self.reference.count() == 0 {
            return 0.0;
        }
        let tau = self.config.tau;
        let bd = self.border_distance();
        let mut within = 0.0;
        for idx in 0..self.pred.len() {
            if bd.border_pred.get(idx) && bd.to_ref_at_pred[idx] < tau {
                within += 1.0;
            }
            if bd.border_ref.get(idx) && bd.to_pred_at_ref[idx] < tau {
                within += 1.0;
            }
        }
        ratio(within, bd.border_ref.count() as f64 + bd.border_pred.count() as f64)
    }

    /// Jaccard coefficient of the two border shells.
    pub fn boundary_iou(&self) -> f64 {
        let bd = self.border_distance();
        let intersection = bd
            .border_ref
            .data()
            .iter()
            .zip(bd.border_pred.data())
            .filter(|(&r, &p)| r && p)
            .count() as f64;
        let union = bd.border_ref.count() as f64 + bd.border_pred.count() as f64 - intersection;
        ratio(intersection, union)
    }

    // --- Connected-component measures ---

    fn components(&self) -> Rc<ComponentMatch> {
        self.cache
            .components(|| match_components(&self.pred, &self.reference, self.neighborhood))
    }

    fn error_maps(&self) -> Rc<ErrorMaps> {
        let matching = self.components();
        self.cache.error_maps(|| error_maps(&matching))
    }

    /// Component counts as (matched reference, unmatched prediction,
    /// unmatched reference).
    pub fn connected_elements(&self) -> (usize, usize, usize) {
        let matching = self.components();
        let matched_ref = matching.matched_reference.len();
        let matched_pred = matching.matched_prediction.len();
        (
            matched_ref,
            matching.prediction.count as usize - matched_pred,
            matching.reference.count as usize - matched_ref,
        )
    }

    /// Outline error over the matched components: (ratio, false-positive
    /// voxels, false-negative voxels).
    pub fn outline_error(&self) -> (f64, f64, f64) {
        let maps = self.error_maps();
        let c = self.confusion();
        let mut false_pos = 0.0;
        let mut false_neg = 0.0;
        for idx in 0..self.pred.len() {
            if !maps.matched[idx] {
                continue;
            }
            match (self.pred.get(idx), self.reference.get(idx)) {
                (true, false) => false_pos += 1.0,
                (false, true) => false_neg += 1.0,
                _ => {}
            }
        }
        let oer = ratio(2.0 * (false_pos + false_neg), c.n_pos_ref() + c.n_pos_pred());
        (oer, false_pos, false_neg)
    }

    /// Detection error over the unmatched components: (total, false-positive
    /// voxels, false-negative voxels).
    pub fn detection_error(&self) -> (f64, f64, f64) {
        let maps = self.error_maps();
        let false_pos = maps.unmatched_prediction.iter().filter(|&&v| v).count() as f64;
        let false_neg = maps.unmatched_reference.iter().filter(|&&v| v).count() as f64;
        (false_pos + false_neg, false_pos, false_neg)
    }

    // --- Topology measures ---

    fn skeletons(&self) -> Rc<SkeletonPair> {
        self.cache.skeletons(|| SkeletonPair {
            reference: skeletonize(&self.reference),
            prediction: skeletonize(&self.pred),
        })
    }

    /// Overlap of the predicted skeleton with the reference mask, over the
    /// predicted skeleton size.
    pub fn centreline_precision(&self) -> f64 {
        let skeletons = self.skeletons();
        let overlap = skeletons
            .prediction
            .data()
            .iter()
            .zip(self.reference.data())
            .filter(|(&s, &r)| s && r)
            .count() as f64;
        ratio(overlap, skeletons.prediction.count() as f64)
    }

    /// Overlap of the reference skeleton with the prediction mask, over the
    /// reference skeleton size.
    pub fn centreline_sensitivity(&self) -> f64 {
        let skeletons = self.skeletons();
        let overlap = skeletons
            .reference
            .data()
            .iter()
            .zip(self.pred.data())
            .filter(|(&s, &p)| s && p)
            .count() as f64;
        ratio(overlap, skeletons.reference.count() as f64)
    }

    /// Harmonic mean of centreline precision and sensitivity.
    pub fn centreline_dice(&self) -> f64 {
        let precision = self.centreline_precision();
        let sensitivity = self.centreline_sensitivity();
        ratio(2.0 * precision * sensitivity, precision + sensitivity)
    }

    // --- Registry ---

    /// All keys [`Self::measure`] recognizes.
    pub fn measures() -> &'static [&'static str] {
        BINARY_MEASURES
    }

    /// Computes one measure by registry key.
    pub fn measure(&self, key: &str) -> MeasureResult<MeasureValue> {
        let scalar = |v: f64| MeasureValue::Scalar(v);
        let value = match key {
            "accuracy" => scalar(self.accuracy()),
            "balanced_accuracy" => scalar(self.balanced_accuracy()),
            "cohens_kappa" => scalar(self.cohens_kappa()),
            "lr+" => scalar(self.positive_likelihood_ratio()),
            "iou" => scalar(self.intersection_over_union()),
            "ior" => scalar(self.intersection_over_reference()),
            "dice" => scalar(self.dice_score()),
            "fbeta" => scalar(self.fbeta()),
            "youden_ind" => scalar(self.youden_index()),
            "mcc" => scalar(self.matthews_correlation_coefficient()),
            "sens" => scalar(self.sensitivity()),
            "spec" => scalar(self.specificity()),
            "ppv" => scalar(self.positive_predictive_values()),
            "npv" => scalar(self.negative_predictive_values()),
            "fpr" => scalar(self.false_positive_rate()),
            "informedness" => scalar(self.informedness()),
            "markedness" => scalar(self.markedness()),
            "vol_diff" => scalar(self.volume_difference()),
            "fppi" => scalar(self.fppi()),
            "com_dist" => scalar(self.centre_of_mass_distance()),
            "assd" => scalar(self.average_surface_distance()),
            "masd" => scalar(self.measured_masd()),
            "hd" => scalar(self.hausdorff_distance()),
            "hd_perc" => scalar(self.hausdorff_distance_percentile()),
            "nsd" => scalar(self.normalised_surface_distance()),
            "boundary_iou" => scalar(self.boundary_iou()),
            "centreline_prec" => scalar(self.centreline_precision()),
            "centreline_sens" => scalar(self.centreline_sensitivity()),
            "centreline_dsc" => scalar(self.centreline_dice()),
            "connected_elements" => {
                let (tp, fp, fn_) = self.connected_elements();
                MeasureValue::Tuple(vec![tp as f64, fp as f64, fn_ as f64])
            }
            "outline_error" => {
                let (oer, oefp, oefn) = self.outline_error();
                MeasureValue::Tuple(vec![oer, oefp, oefn])
            }
            "detection_error" => {
                let (de, defp, defn) = self.detection_error();
                MeasureValue::Tuple(vec![de, defp, defn])
            }
            "connected_tp" => scalar(self.connected_elements().0 as f64),
            "connected_fp" => scalar(self.connected_elements().1 as f64),
            "connected_fn" => scalar(self.connected_elements().2 as f64),
            "oer" => scalar(self.outline_error().0),
            "oefp" => scalar(self.outline_error().1),
            "oefn" => scalar(self.outline_error().2),
            "de" => scalar(self.detection_error().0),
            "defp" => scalar(self.detection_error().1),
            "defn" => scalar(self.detection_error().2),
            _ => return Err(MeasureError::UnknownMeasure { key: key.to_string() }),
        };
        Ok(value)
    }

    /// Computes the requested measures and formats them with four decimals.
    pub fn to_dict(&self, keys: &[&str]) -> MeasureResult<BTreeMap<String, String>> {
        keys.iter()
            .map(|&key| Ok((key.to_string(), self.measure(key)?.format(4))))
            .collect()
    }
}

fn centre_of_mass(mask: &Mask) -> Vec<f64> {
    let shape = mask.shape();
    let mut sums = vec![0.0; shape.len()];
    let mut voxels = 0.0;
    for idx in 0..mask.len() {
        if mask.get(idx) {
            for (sum, coord) in sums.iter_mut().zip(unravel(idx, shape)) {
                *sum += coord as f64;
            }
            voxels += 1.0;
        }
    }
    sums.iter().map(|&sum| ratio(sum, voxels)).collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::Tensor;

    use super::*;
    use crate::config::MeasureConfig;
    use crate::grid::Mask;

    type TestBackend = NdArray<f32>;

    fn mask(shape: Vec<usize>, rows: &[u8]) -> Mask {
        Mask::new(shape, rows.iter().map(|&v| v != 0).collect()).unwrap()
    }

    fn compare(pred: Mask, reference: Mask) -> BinaryPairwiseMeasures {
        BinaryPairwiseMeasures::new(pred, reference, MeasureConfig::new()).unwrap()
    }

    #[test]
    fn overlap_measures_on_a_known_pair() {
        let reference = mask(vec![2, 3], &[1, 1, 0, 0, 0, 0]);
        let pred = mask(vec![2, 3], &[1, 0, 0, 0, 1, 0]);
        let measures = compare(pred, reference);

        assert_relative_eq!(measures.dice_score(), 0.5);
        assert_relative_eq!(measures.intersection_over_union(), 1.0 / 3.0);
        assert_relative_eq!(measures.sensitivity(), 0.5);
        assert_relative_eq!(measures.specificity(), 0.75);
        assert_relative_eq!(measures.accuracy(), 4.0 / 6.0);
    }

    #[test]
    fn a_mask_agrees_perfectly_with_itself() {
        let m = mask(vec![3, 3], &[0, 1, 0, 1, 1, 1, 0, 1, 0]);
        let measures = compare(m.clone(), m);

        assert_relative_eq!(measures.intersection_over_union(), 1.0);
        assert_relative_eq!(measures.dice_score(), 1.0);
        assert_relative_eq!(measures.hausdorff_distance(), 0.0);
        assert_relative_eq!(measures.average_surface_distance(), 0.0);
        assert_relative_eq!(measures.boundary_iou(), 1.0);
        assert_relative_eq!(measures.matthews_correlation_coefficient(), 1.0);
        assert_relative_eq!(measures.cohens_kappa(), 1.0);
    }

    #[test]
    fn directional_and_symmetric_measures() {
        let a = mask(vec![2, 3], &[1, 1, 0, 0, 0, 0]);
        let b = mask(vec![2, 3], &[1, 0, 0, 0, 1, 0]);
        let ab = compare(b.clone(), a.clone());
        let ba = compare(a, b);

        assert_relative_eq!(
            ab.intersection_over_union(),
            ba.intersection_over_union()
        );
        assert_relative_eq!(
            ab.average_surface_distance(),
            ba.average_surface_distance()
        );
        // Sensitivity swaps roles with precision under argument exchange.
        assert_relative_eq!(ab.sensitivity(), ba.positive_predictive_values());
    }

    #[test]
    fn confusion_counts_partition_every_voxel() {
        let reference = mask(vec![2, 3], &[1, 1, 0, 0, 0, 0]);
        let pred = mask(vec![2, 3], &[1, 0, 0, 0, 1, 0]);
        let measures = compare(pred, reference);
        let c = measures.confusion();

        assert_relative_eq!(c.true_positives + c.false_negatives, c.n_pos_ref());
        assert_relative_eq!(c.true_positives + c.false_positives, c.n_pos_pred());
        assert_relative_eq!(c.total(), 6.0);
    }

    #[test]
    fn empty_reference_uses_the_sentinel() {
        let zeros = mask(vec![2, 2], &[0, 0, 0, 0]);
        let measures = BinaryPairwiseMeasures::new(
            zeros.clone(),
            zeros,
            MeasureConfig::new().with_empty(true),
        )
        .unwrap();

        assert_relative_eq!(measures.positive_predictive_values(), -1.0);
        assert_eq!(
            measures.to_dict(&["ppv"]).unwrap()["ppv"],
            "-1.0000"
        );
    }

    #[test]
    fn degenerate_ratios_are_nan_without_the_flag() {
        let zeros = mask(vec![2, 2], &[0, 0, 0, 0]);
        let measures = compare(zeros.clone(), zeros);
        assert!(measures.sensitivity().is_nan());
        assert!(measures.positive_predictive_values().is_nan());
    }

    #[test]
    fn empty_masks_short_circuit_distances_to_zero() {
        let zeros = mask(vec![2, 2], &[0, 0, 0, 0]);
        let measures = compare(zeros.clone(), zeros);
        assert_relative_eq!(measures.hausdorff_distance(), 0.0);
        assert_relative_eq!(measures.average_surface_distance(), 0.0);
        assert_relative_eq!(measures.measured_masd(), 0.0);
        assert_relative_eq!(measures.normalised_surface_distance(), 0.0);
    }

    #[test]
    fn anisotropic_spacing_scales_surface_distances() {
        let reference = mask(vec![1, 3], &[1, 0, 0]);
        let pred = mask(vec![1, 3], &[0, 0, 1]);
        let measures = BinaryPairwiseMeasures::new(
            pred,
            reference,
            MeasureConfig::new().with_pixdim(Some(vec![1.0, 0.5])),
        )
        .unwrap();

        assert_relative_eq!(measures.hausdorff_distance(), 1.0);
        assert_relative_eq!(measures.average_surface_distance(), 1.0);
        assert_relative_eq!(measures.centre_of_mass_distance(), 1.0);
    }

    #[test]
    fn component_counts_and_error_maps() {
        let reference = mask(vec![1, 5], &[1, 1, 0, 0, 1]);
        let pred = mask(vec![1, 5], &[0, 1, 0, 1, 0]);
        let measures = compare(pred, reference);

        let (tp, fp, fn_) = measures.connected_elements();
        assert_eq!((tp, fp, fn_), (1, 1, 1));

        let (oer, oefp, oefn) = measures.outline_error();
        assert_relative_eq!(oefp, 0.0);
        assert_relative_eq!(oefn, 1.0);
        assert_relative_eq!(oer, 2.0 / 5.0);

        let (de, defp, defn) = measures.detection_error();
        assert_relative_eq!(defp, 1.0);
        assert_relative_eq!(defn, 1.0);
        assert_relative_eq!(de, 2.0);
    }

    #[test]
    fn matched_component_bounds_hold() {
        let reference = mask(vec![1, 5], &[1, 1, 0, 0, 1]);
        let pred = mask(vec![1, 5], &[0, 1, 0, 1, 0]);
        let measures = compare(pred, reference);
        let matching = measures.components();

        assert!(matching.matched_reference.len() <= matching.reference.count as usize);
        assert!(matching.matched_prediction.len() <= matching.prediction.count as usize);
    }

    #[test]
    fn thin_structures_have_unit_centreline_dice() {
        let line = mask(vec![3, 3], &[0, 0, 0, 1, 1, 1, 0, 0, 0]);
        let measures = compare(line.clone(), line);
        assert_relative_eq!(measures.centreline_precision(), 1.0);
        assert_relative_eq!(measures.centreline_sensitivity(), 1.0);
        assert_relative_eq!(measures.centreline_dice(), 1.0);
    }

    #[test]
    fn fppi_averages_over_trailing_axis_images() {
        // Two images along the trailing axis; three false positives total.
        let reference = mask(vec![3, 2], &[0, 0, 0, 0, 0, 0]);
        let pred = mask(vec![3, 2], &[1, 1, 0, 1, 0, 0]);
        let measures = compare(pred, reference);
        assert_relative_eq!(measures.fppi(), 1.5);
    }

    #[test]
    fn registry_dispatch_matches_typed_methods() {
        let reference = mask(vec![2, 3], &[1, 1, 0, 0, 0, 0]);
        let pred = mask(vec![2, 3], &[1, 0, 0, 0, 1, 0]);
        let measures = compare(pred, reference);

        let dict = measures
            .to_dict(&["dice", "iou", "connected_tp"])
            .unwrap();
        assert_eq!(dict["dice"], "0.5000");
        assert_eq!(dict["iou"], "0.3333");
        assert_eq!(dict["connected_tp"], "1.0000");
    }

    #[test]
    fn tuple_measures_format_comma_joined() {
        let reference = mask(vec![1, 5], &[1, 1, 0, 0, 1]);
        let pred = mask(vec![1, 5], &[0, 1, 0, 1, 0]);
        let measures = compare(pred, reference);

        let dict = measures.to_dict(&["connected_elements", "detection_error"]).unwrap();
        assert_eq!(dict["connected_elements"], "1.0000,1.0000,1.0000");
        assert_eq!(dict["detection_error"], "2.0000,1.0000,1.0000");
    }

    #[test]
    fn tensors_round_trip_into_masks() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &device);
        let reference =
            Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 0.0], [0.0, 0.0, 0.0]], &device);
        let measures =
            BinaryPairwiseMeasures::from_tensors(pred, reference, MeasureConfig::new()).unwrap();
        assert_relative_eq!(measures.dice_score(), 0.5);
    }
}
