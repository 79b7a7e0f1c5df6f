//! Frame Acquirer
//!
//! A non-preserved WebGL drawing buffer is cleared right after compositing,
//! so reading it at an arbitrary moment usually yields a blank image. The
//! acquirer samples once immediately, then retries just after refresh
//! signals until it sees content or runs out of attempts.

use crate::clock::FrameClock;
use crate::error::CaptureError;
use snapkit_common::CaptureConfig;
use snapkit_dom::{CanvasError, Node};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can be encoded into an image data URL.
pub trait FrameSource {
    fn encode(&self) -> Result<String, CanvasError>;
}

impl FrameSource for Node {
    fn encode(&self) -> Result<String, CanvasError> {
        self.canvas().ok_or(CanvasError::NotACanvas)?.to_data_url()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Rc<T> {
    fn encode(&self) -> Result<String, CanvasError> {
        (**self).encode()
    }
}

/// Successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// `data:image/png;base64,...`
    pub data_url: String,
    /// Retry that produced the frame; 0 for the immediate snapshot.
    pub attempts: u32,
    /// Every sample looked blank; the last one is returned anyway.
    pub blank: bool,
}

/// Bounded retry loop around the encode primitive.
#[derive(Debug, Clone)]
pub struct FrameAcquirer {
    max_attempts: u32,
    settle_delay: Duration,
    blank_threshold: usize,
}

impl FrameAcquirer {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            settle_delay: config.settle_delay(),
            blank_threshold: config.blank_threshold,
        }
    }

    /// Size heuristic: short payloads are assumed to be empty frames.
    pub fn is_blank(&self, data_url: &str) -> bool {
        data_url.len() < self.blank_threshold
    }

    /// Sample the source until it yields a non-blank frame.
    ///
    /// An error from the immediate snapshot is tolerated and retried; an
    /// error inside the retry loop ends acquisition. When every retry is
    /// blank the last payload is returned with `blank` set.
    pub async fn acquire<S, C>(&self, source: &S, clock: &C) -> Result<CapturedFrame, CaptureError>
    where
        S: FrameSource + ?Sized,
        C: FrameClock,
    {
        let mut last = match source.encode() {
            Ok(data_url) if !self.is_blank(&data_url) => {
                debug!(len = data_url.len(), "Immediate snapshot has content");
                return Ok(CapturedFrame {
                    data_url,
                    attempts: 0,
                    blank: false,
                });
            }
            Ok(data_url) => Ok(data_url),
            Err(e) => {
                debug!(error = %e, "Immediate snapshot failed, retrying after refresh");
                Err(e)
            }
        };

        for attempt in 1..=self.max_attempts {
            clock.next_frame().await;
            clock.sleep(self.settle_delay).await;

            let data_url = source.encode().map_err(|source| {
                warn!(attempt, error = %source, "Encode failed");
                CaptureError::Encode { attempt, source }
            })?;

            if !self.is_blank(&data_url) {
                info!(attempt, len = data_url.len(), "Captured frame");
                return Ok(CapturedFrame {
                    data_url,
                    attempts: attempt,
                    blank: false,
                });
            }
            debug!(attempt, len = data_url.len(), "Frame looks blank");
            last = Ok(data_url);
        }

        match last {
            Ok(data_url) => {
                warn!(
                    attempts = self.max_attempts,
                    len = data_url.len(),
                    "All samples blank, returning last frame"
                );
                Ok(CapturedFrame {
                    data_url,
                    attempts: self.max_attempts,
                    blank: true,
                })
            }
            // Only reachable with no retries configured.
            Err(source) => Err(CaptureError::Encode { attempt: 0, source }),
        }
    }
}

impl Default for FrameAcquirer {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}
