use thiserror::Error;

/// The error type for pairwise-measure operations.
///
/// Every failure is either rejected at construction time (shape or
/// configuration problems) or reported per measure (unknown key, empty
/// feasible set). Degenerate ratios are not errors; they evaluate to NaN or
/// to the configured sentinel instead.
#[derive(Error, Debug)]
pub enum MeasureError {
    /// Error for when the prediction and reference grids disagree in shape.
    #[error("Shape mismatch between prediction and reference: {pred:?} vs {reference:?}")]
    ShapeMismatch {
        /// Shape of the prediction grid.
        pred: Vec<usize>,
        /// Shape of the reference grid.
        reference: Vec<usize>,
    },

    /// Error for when a grid buffer is inconsistent with its declared shape
    /// or holds values outside the expected range.
    #[error("Invalid grid: {reason}")]
    InvalidGrid {
        /// The reason why the grid is invalid.
        reason: String,
    },

    /// Error for when a configuration option is logically inconsistent with
    /// the grids being compared.
    #[error("Invalid measure configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when a requested measure key is not part of the registry.
    #[error("Unknown measure key: {key}")]
    UnknownMeasure {
        /// The unrecognized key.
        key: String,
    },

    /// Error for when an operating-point query has an empty feasible set.
    #[error("No qualifying operating point for {measure}: no curve row with {constraint}")]
    NoQualifyingPoint {
        /// The measure key of the failing query.
        measure: String,
        /// The constraint that no curve row satisfies.
        constraint: String,
    },

    /// Error for when a bounding-box coordinate vector is malformed.
    #[error("Invalid bounding box: {reason}")]
    InvalidBox {
        /// The reason why the box is invalid.
        reason: String,
    },

    /// Error for when reading values out of an input tensor fails.
    #[error("Failed to read tensor data: {reason}")]
    TensorData {
        /// A description of the failed extraction.
        reason: String,
    },
}

/// A specialized `Result` type for pairwise-measure operations.
pub type MeasureResult<T> = Result<T, MeasureError>;
