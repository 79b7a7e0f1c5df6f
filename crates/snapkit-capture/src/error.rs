//! Capture errors

use snapkit_common::SnapKitError;
use snapkit_dom::CanvasError;
use thiserror::Error;

/// Failures of the capture pipeline.
///
/// A blank frame after exhausting retries is not an error; it is returned as
/// a degraded [`CapturedFrame`](crate::CapturedFrame).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No plausible rendering surface exists in the document.
    #[error("No WebGL canvas found on this page")]
    NoSurfaceFound,

    /// The encode primitive raised; retrying stops here.
    #[error("Failed to capture canvas (attempt {attempt}): {source}")]
    Encode {
        attempt: u32,
        #[source]
        source: CanvasError,
    },
}

impl From<CaptureError> for SnapKitError {
    fn from(err: CaptureError) -> Self {
        SnapKitError::capture_with_source("capture failed", err)
    }
}
