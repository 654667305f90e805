use thiserror::Error;

/// Failures of the segmentation/timing core. Timing problems on individual
/// segments are not errors; they are reported through `TimingStatus`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot reach {requested} segments: stopped at {reached}, none can be split further")]
    Unconvergeable { requested: usize, reached: usize },
}

pub type SegmentResult<T> = Result<T, SegmentError>;
