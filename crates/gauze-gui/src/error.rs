use std::fmt;

/// Failures surfaced by the asynchronous parts of the pipeline.
///
/// These travel inside rejected [`Promise`](crate::Promise)s; nothing in the
/// core panics on them, and nothing retries automatically - the next explicit
/// mutation triggers a fresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The vector library rejected a rasterization request
    RenderFailed(String),
    /// A natural-content-size query rejected
    MeasureFailed(String),
    /// The target of a deferred operation was dropped before the operation ran
    Disposed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenderFailed(reason) => write!(f, "rasterization failed: {reason}"),
            Self::MeasureFailed(reason) => write!(f, "content measurement failed: {reason}"),
            Self::Disposed => write!(f, "target disposed before the operation ran"),
        }
    }
}

impl std::error::Error for Error {}
