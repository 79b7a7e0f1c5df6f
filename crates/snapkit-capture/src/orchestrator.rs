//! Capture Orchestrator

use crate::acquirer::{CapturedFrame, FrameAcquirer};
use crate::clock::FrameClock;
use crate::error::CaptureError;
use crate::locator::SurfaceLocator;
use crate::suppressor::{HiddenSet, VisibilitySuppressor};
use snapkit_common::CaptureConfig;
use snapkit_dom::Document;
use tracing::{debug, info, warn};

/// Runs one capture: locate, hide, settle, acquire, restore.
#[derive(Debug)]
pub struct CaptureOrchestrator {
    locator: SurfaceLocator,
    suppressor: VisibilitySuppressor,
    acquirer: FrameAcquirer,
    settle_frames: u32,
}

impl CaptureOrchestrator {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            locator: SurfaceLocator::new(config),
            suppressor: VisibilitySuppressor::new(),
            acquirer: FrameAcquirer::new(config),
            settle_frames: config.settle_frames,
        }
    }

    pub fn with_locator(mut self, locator: SurfaceLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_suppressor(mut self, suppressor: VisibilitySuppressor) -> Self {
        self.suppressor = suppressor;
        self
    }

    pub fn locator(&self) -> &SurfaceLocator {
        &self.locator
    }

    /// Hide UI around the located surface, or by role when there is none.
    pub fn hide_ui(&self, doc: &Document) -> HiddenSet {
        let surface = self.locator.locate(doc);
        self.suppressor.hide(doc, surface.as_ref())
    }

    pub fn restore_ui(&self, hidden: HiddenSet) {
        self.suppressor.restore(hidden);
    }

    /// Capture the scene canvas without surrounding UI.
    ///
    /// The page is restored before returning on every path. If the future is
    /// dropped mid-capture, the hidden set restores itself on drop.
    pub async fn capture<C: FrameClock>(
        &self,
        doc: &Document,
        clock: &C,
    ) -> Result<CapturedFrame, CaptureError> {
        let Some(surface) = self.locator.locate(doc) else {
            warn!("No capture surface found");
            return Err(CaptureError::NoSurfaceFound);
        };

        let hidden = self.suppressor.hide(doc, Some(&surface));
        debug!(hidden = hidden.len(), settle_frames = self.settle_frames, "Waiting for layout");
        for _ in 0..self.settle_frames {
            clock.next_frame().await;
        }

        let result = self.acquirer.acquire(&*surface, clock).await;
        self.suppressor.restore(hidden);

        match &result {
            Ok(frame) => info!(
                attempts = frame.attempts,
                blank = frame.blank,
                len = frame.data_url.len(),
                "Capture complete"
            ),
            Err(e) => warn!(error = %e, "Capture failed"),
        }
        result
    }
}

impl Default for CaptureOrchestrator {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}
