//! Training-loop metric adapters.
//!
//! These wrap the overlap measures in `burn::train::metric::Metric` so a
//! training loop can track them per batch. Counts are accumulated across
//! batches, so the reported value is the measure of the epoch seen so far
//! rather than a mean of per-batch values.

use std::marker::PhantomData;

use burn::{
    prelude::*,
    tensor::{backend::Backend, ElementConversion, Tensor},
    train::metric::{Metric, MetricEntry, MetricMetadata, Numeric},
};

/// Input of the overlap metrics: probability predictions and hard targets
/// with shape `[batch, channel, height, width]`.
pub struct OverlapInput<B: Backend> {
    pub predictions: Tensor<B, 4>,
    pub targets: Tensor<B, 4>,
}

impl<B: Backend> OverlapInput<B> {
    pub const fn new(predictions: Tensor<B, 4>, targets: Tensor<B, 4>) -> Self {
        Self { predictions, targets }
    }
}

#[derive(Config, Debug)]
pub struct DiceMetricConfig {
    #[config(default = 0.5)]
    pub threshold: f64,
}

/// Dice score accumulated over batches.
#[derive(Debug, Clone)]
pub struct DiceMetric<B: Backend> {
    state: OverlapState,
    threshold: f64,
    _b: PhantomData<B>,
}

#[derive(Debug, Clone, Default)]
struct OverlapState {
    true_positives: f64,
    pred_positives: f64,
    ref_positives: f64,
    count: usize,
}

impl DiceMetricConfig {
    pub fn init<B: Backend>(&self) -> DiceMetric<B> {
        DiceMetric { state: OverlapState::default(), threshold: self.threshold, _b: PhantomData }
    }
}

impl<B: Backend> Default for DiceMetric<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> DiceMetric<B> {
    pub fn new() -> Self {
        DiceMetricConfig::new().init()
    }

    fn dice_value(&self) -> f64 {
        if self.state.count == 0 {
            return 0.0;
        }
        let denominator = self.state.pred_positives + self.state.ref_positives;
        if denominator > 0.0 {
            2.0 * self.state.true_positives / denominator
        } else {
            0.0
        }
    }
}

impl<B: Backend> Metric for DiceMetric<B> {
    type Input = OverlapInput<B>;

    fn name(&self) -> String {
        "Dice".to_string()
    }

    fn update(&mut self, item: &Self::Input, _metadata: &MetricMetadata) -> MetricEntry {
        update_overlap(&mut self.state, &item.predictions, &item.targets, self.threshold);
        let value = self.dice_value();
        MetricEntry::new(self.name(), format!("{value:.5}"), format!("{value:.5}"))
    }

    fn clear(&mut self) {
        self.state = OverlapState::default();
    }
}

impl<B: Backend> Numeric for DiceMetric<B> {
    fn value(&self) -> f64 {
        self.dice_value()
    }
}

#[derive(Config, Debug)]
pub struct IoUMetricConfig {
    #[config(default = 0.5)]
    pub threshold: f64,
}

/// Intersection over union accumulated over batches.
#[derive(Debug, Clone)]
pub struct IoUMetric<B: Backend> {
    state: OverlapState,
    threshold: f64,
    _b: PhantomData<B>,
}

impl IoUMetricConfig {
    pub fn init<B: Backend>(&self) -> IoUMetric<B> {
        IoUMetric { state: OverlapState::default(), threshold: self.threshold, _b: PhantomData }
    }
}

impl<B: Backend> Default for IoUMetric<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> IoUMetric<B> {
    pub fn new() -> Self {
        IoUMetricConfig::new().init()
    }

    fn iou_value(&self) -> f64 {
        if self.state.count == 0 {
            return 0.0;
        }
        let union = self.state.pred_positives + self.state.ref_positives
            - self.state.true_positives;
        if union > 0.0 {
            self.state.true_positives / union
        } else {
            0.0
        }
    }
}

impl<B: Backend> Metric for IoUMetric<B> {
    type Input = OverlapInput<B>;

    fn name(&self) -> String {
        "IoU".to_string()
    }

    fn update(&mut self, item: &Self::Input, _metadata: &MetricMetadata) -> MetricEntry {
        update_overlap(&mut self.state, &item.predictions, &item.targets, self.threshold);
        let value = self.iou_value();
        MetricEntry::new(self.name(), format!("{value:.5}"), format!("{value:.5}"))
    }

    fn clear(&mut self) {
        self.state = OverlapState::default();
    }
}

impl<B: Backend> Numeric for IoUMetric<B> {
    fn value(&self) -> f64 {
        self.iou_value()
    }
}

fn update_overlap<B: Backend>(
    state: &mut OverlapState,
    predictions: &Tensor<B, 4>,
    targets: &Tensor<B, 4>,
    threshold: f64,
) {
    let preds_binary = predictions.clone().greater_elem(threshold).int();
    let targets_binary = targets.clone().greater_elem(0.5).int();

    let true_positives = (preds_binary.clone() * targets_binary.clone())
        .sum()
        .into_scalar()
        .elem::<f64>();
    let pred_positives = preds_binary.sum().into_scalar().elem::<f64>();
    let ref_positives = targets_binary.sum().into_scalar().elem::<f64>();

    state.true_positives += true_positives;
    state.pred_positives += pred_positives;
    state.ref_positives += ref_positives;
    state.count += predictions.dims()[0];
}
