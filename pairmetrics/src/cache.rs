//! Per-comparison memoization of expensive derived artifacts.
//!
//! Each engine instance owns one cache keyed by an operation tag plus the
//! bit pattern of any scalar argument. Entries are filled lazily on first
//! access and never invalidated; large artifacts are handed out behind
//! `Rc` so repeated measures share one computation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::confusion::ConfusionCounts;
use crate::distance::BorderDistance;
use crate::morphology::{ComponentMatch, ErrorMaps};
use crate::probability::OperatingPointCurve;
use crate::skeleton::SkeletonPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CacheKey {
    Confusion { threshold_bits: Option<u64> },
    BorderDistance,
    Components,
    ErrorMaps,
    Skeletons,
    Sweep,
}

#[derive(Clone)]
enum CacheValue {
    Confusion(ConfusionCounts),
    BorderDistance(Rc<BorderDistance>),
    Components(Rc<ComponentMatch>),
    ErrorMaps(Rc<ErrorMaps>),
    Skeletons(Rc<SkeletonPair>),
    Sweep(Rc<OperatingPointCurve>),
}

#[derive(Default)]
pub(crate) struct MeasureCache {
    slots: RefCell<HashMap<CacheKey, CacheValue>>,
}

impl MeasureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confusion(
        &self,
        threshold: Option<f64>,
        fill: impl FnOnce() -> ConfusionCounts,
    ) -> ConfusionCounts {
        let key = CacheKey::Confusion { threshold_bits: threshold.map(f64::to_bits) };
        if let Some(CacheValue::Confusion(counts)) = self.lookup(key) {
            return counts;
        }
        let counts = fill();
        self.store(key, CacheValue::Confusion(counts));
        counts
    }

    pub fn border_distance(&self, fill: impl FnOnce() -> BorderDistance) -> Rc<BorderDistance> {
        if let Some(CacheValue::BorderDistance(value)) = self.lookup(CacheKey::BorderDistance) {
            return value;
        }
        let value = Rc::new(fill());
        self.store(CacheKey::BorderDistance, CacheValue::BorderDistance(Rc::clone(&value)));
        value
    }

    pub fn components(&self, fill: impl FnOnce() -> ComponentMatch) -> Rc<ComponentMatch> {
        if let Some(CacheValue::Components(value)) = self.lookup(CacheKey::Components) {
            return value;
        }
        let value = Rc::new(fill());
        self.store(CacheKey::Components, CacheValue::Components(Rc::clone(&value)));
        value
    }

    pub fn error_maps(&self, fill: impl FnOnce() -> ErrorMaps) -> Rc<ErrorMaps> {
        if let Some(CacheValue::ErrorMaps(value)) = self.lookup(CacheKey::ErrorMaps) {
            return value;
        }
        let value = Rc::new(fill());
        self.store(CacheKey::ErrorMaps, CacheValue::ErrorMaps(Rc::clone(&value)));
        value
    }

    pub fn skeletons(&self, fill: impl FnOnce() -> SkeletonPair) -> Rc<SkeletonPair> {
        if let Some(CacheValue::Skeletons(value)) = self.lookup(CacheKey::Skeletons) {
            return value;
        }
        let value = Rc::new(fill());
        self.store(CacheKey::Skeletons, CacheValue::Skeletons(Rc::clone(&value)));
        value
    }

    pub fn sweep(&self, fill: impl FnOnce() -> OperatingPointCurve) -> Rc<OperatingPointCurve> {
        if let Some(CacheValue::Sweep(value)) = self.lookup(CacheKey::Sweep) {
            return value;
        }
        let value = Rc::new(fill());
        self.store(CacheKey::Sweep, CacheValue::Sweep(Rc::clone(&value)));
        value
    }

    // The borrow is scoped to the lookup so fill closures may consult the
    // cache recursively.
    fn lookup(&self, key: CacheKey) -> Option<CacheValue> {
        self.slots.borrow().get(&key).cloned()
    }

    fn store(&self, key: CacheKey, value: CacheValue) {
        self.slots.borrow_mut().insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_entries_fill_once_per_threshold() {
        let cache = MeasureCache::new();
        let mut fills = 0;
        let make = |tp: f64| ConfusionCounts {
            true_positives: tp,
            false_positives: 0.0,
            true_negatives: 0.0,
            false_negatives: 0.0,
        };

        let first = cache.confusion(Some(0.5), || {
            fills += 1;
            make(1.0)
        });
        let second = cache.confusion(Some(0.5), || {
            fills += 1;
            make(2.0)
        });
        assert_eq!(fills, 1);
        assert_eq!(first, second);

        cache.confusion(Some(0.25), || {
            fills += 1;
            make(3.0)
        });
        assert_eq!(fills, 2);
    }

    #[test]
    fn unthresholded_and_thresholded_entries_are_distinct() {
        let cache = MeasureCache::new();
        let make = |tp: f64| ConfusionCounts {
            true_positives: tp,
            false_positives: 0.0,
            true_negatives: 0.0,
            false_negatives: 0.0,
        };
        let plain = cache.confusion(None, || make(1.0));
        let thresholded = cache.confusion(Some(1.0), || make(2.0));
        assert_ne!(plain, thresholded);
    }
}
