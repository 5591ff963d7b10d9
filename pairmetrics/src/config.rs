use burn::prelude::*;

use crate::error::{MeasureError, MeasureResult};

/// Configuration shared by the binary and probability comparison engines.
///
/// Every recognized option carries an explicit default, so
/// `MeasureConfig::new()` is a complete configuration and callers override
/// only what they need via the generated `with_*` builders.
#[derive(Config, Debug)]
pub struct MeasureConfig {
    /// Neighborhood used for border extraction and component labeling:
    /// 4 or 8 in 2-D; 6, 18 or 26 in 3-D (4 and 8 are accepted in 3-D as
    /// aliases of the axis and full neighborhoods).
    #[config(default = 8)]
    pub num_neighbors: usize,
    /// Physical voxel spacing per axis. `None` means unit spacing.
    #[config(default = "None")]
    pub pixdim: Option<Vec<f64>>,
    /// Signals a known-empty reference; precision-family measures then
    /// return the -1 sentinel instead of NaN.
    #[config(default = false)]
    pub empty: bool,
    /// Beta weight of the F-beta measure.
    #[config(default = 1.0)]
    pub beta: f64,
    /// Tolerance (physical units) of the normalised surface distance.
    #[config(default = 1.0)]
    pub tau: f64,
    /// Percentile of the percentile Hausdorff distance.
    #[config(default = 95.0)]
    pub hd_percentile: f64,
    /// Number of equal-width bins of the expected calibration error.
    #[config(default = 10)]
    pub bins_ece: usize,
    /// Sensitivity target of the `spec@sens`, `ppv@sens` and `fppi@sens`
    /// queries.
    #[config(default = 0.8)]
    pub value_sensitivity: f64,
    /// Specificity target of the `sens@spec` query.
    #[config(default = 0.8)]
    pub value_specificity: f64,
    /// Precision target of the `sens@ppv` query.
    #[config(default = 0.8)]
    pub value_ppv: f64,
    /// False-positives-per-case bound of the `sens@fppi` query.
    #[config(default = 0.8)]
    pub value_fppi: f64,
    /// Decision threshold of the net-benefit measure.
    #[config(default = 0.5)]
    pub benefit_proba: f64,
    /// Distinct-probability cap above which threshold sweeps coalesce.
    #[config(default = 1500)]
    pub max_thresholds: usize,
    /// Grid-size cap below which threshold sweeps never coalesce.
    #[config(default = 150)]
    pub max_samples: usize,
}

impl MeasureConfig {
    /// Checks the configuration against the rank of the grids under
    /// comparison. Called once at engine construction.
    pub(crate) fn validate(&self, rank: usize) -> MeasureResult<()> {
        if !(2..=3).contains(&rank) {
            return Err(MeasureError::InvalidConfiguration {
                reason: format!("grids must be rank 2 or 3, got rank {rank}"),
            });
        }
        if crate::morphology::neighborhood_order(rank, self.num_neighbors).is_none() {
            return Err(MeasureError::InvalidConfiguration {
                reason: format!(
                    "num_neighbors {} is not a valid rank-{rank} connectivity",
                    self.num_neighbors
                ),
            });
        }
        if self.bins_ece == 0 {
            return Err(MeasureError::InvalidConfiguration {
                reason: "bins_ece must be at least 1".to_string(),
            });
        }
        if !(self.hd_percentile > 0.0 && self.hd_percentile <= 100.0) {
            return Err(MeasureError::InvalidConfiguration {
                reason: format!("hd_percentile must lie in (0, 100], got {}", self.hd_percentile),
            });
        }
        if !(self.benefit_proba > 0.0 && self.benefit_proba < 1.0) {
            return Err(MeasureError::InvalidConfiguration {
                reason: format!("benefit_proba must lie in (0, 1), got {}", self.benefit_proba),
            });
        }
        if self.tau < 0.0 {
            return Err(MeasureError::InvalidConfiguration {
                reason: format!("tau must be non-negative, got {}", self.tau),
            });
        }
        if self.max_samples == 0 || self.max_thresholds == 0 {
            return Err(MeasureError::InvalidConfiguration {
                reason: "max_samples and max_thresholds must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the spacing vector for grids of the given rank, defaulting
    /// to unit spacing.
    pub(crate) fn resolve_pixdim(&self, rank: usize) -> MeasureResult<Vec<f64>> {
        match &self.pixdim {
            None => Ok(vec![1.0; rank]),
            Some(pixdim) => {
                if pixdim.len() != rank {
                    return Err(MeasureError::InvalidConfiguration {
                        reason: format!(
                            "pixdim has {} entries but the grids are rank {rank}",
                            pixdim.len()
                        ),
                    });
                }
                if pixdim.iter().any(|&d| !(d.is_finite() && d > 0.0)) {
                    return Err(MeasureError::InvalidConfiguration {
                        reason: "pixdim entries must be finite and positive".to_string(),
                    });
                }
                Ok(pixdim.clone())
            }
        }
    }
}
