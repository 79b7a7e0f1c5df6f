//! Scene replay
//!
//! Static pages have nothing drawing into their canvases. [`ReplayClock`]
//! plays the part of the page's render loop: on every refresh signal it
//! composites the previous frame and draws a recorded image into the scene
//! canvas, the way a WebGL application redraws each frame.

use snapkit_capture::{FrameClock, SurfaceLocator};
use snapkit_codecs::{decode_png, RgbaImage};
use snapkit_common::{Result, SnapKitError};
use snapkit_dom::{ContextAttributes, ContextKind, Document, Node};
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// Frame clock that redraws a fixed image into the scene canvas.
pub struct ReplayClock<C> {
    inner: C,
    frame: RgbaImage,
    surface: Option<Rc<Node>>,
    frames: Cell<u64>,
}

impl<C: FrameClock> ReplayClock<C> {
    pub fn new(inner: C, frame: RgbaImage) -> Self {
        Self {
            inner,
            frame,
            surface: None,
            frames: Cell::new(0),
        }
    }

    /// Read the replayed frame from a PNG file.
    pub fn from_png(inner: C, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let frame = decode_png(&bytes).map_err(|e| {
            SnapKitError::codec_with_source(format!("cannot decode {}", path.display()), e)
        })?;
        debug!(path = %path.display(), width = frame.width(), height = frame.height(), "Loaded scene frame");
        Ok(Self::new(inner, frame))
    }

    /// Draw into the canvas the locator picks, giving it a WebGL context.
    pub fn attach(mut self, doc: &Document, locator: &SurfaceLocator) -> Self {
        match locator.locate(doc) {
            Some(surface) => {
                if let Some(mut canvas) = surface.canvas_mut() {
                    if let Err(e) = canvas.get_context(ContextKind::WebGl, ContextAttributes::default()) {
                        warn!(error = %e, "Scene canvas keeps its existing context");
                    }
                }
                self.surface = Some(surface);
            }
            None => warn!("No canvas to replay the scene into"),
        }
        self
    }

    pub fn surface(&self) -> Option<&Rc<Node>> {
        self.surface.as_ref()
    }

    /// Refresh signals seen so far.
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    fn render(&self) {
        let Some(surface) = &self.surface else {
            return;
        };
        let Some(mut canvas) = surface.canvas_mut() else {
            return;
        };
        canvas.present();
        canvas.draw(|pixels| scale_into(&self.frame, pixels));
    }
}

impl<C: FrameClock> FrameClock for ReplayClock<C> {
    async fn next_frame(&self) {
        self.inner.next_frame().await;
        self.frames.set(self.frames.get() + 1);
        self.render();
    }

    async fn sleep(&self, duration: Duration) {
        self.inner.sleep(duration).await;
    }
}

/// Nearest-neighbour copy of `src` covering all of `dst`.
fn scale_into(src: &RgbaImage, dst: &mut RgbaImage) {
    let (sw, sh) = (u64::from(src.width()), u64::from(src.height()));
    let (dw, dh) = (u64::from(dst.width()), u64::from(dst.height()));
    if sw == 0 || sh == 0 || dw == 0 {
        return;
    }

    for (i, px) in (0u64..).zip(dst.pixels_mut()) {
        let (x, y) = (i % dw, i / dw);
        let sx = u32::try_from(x * sw / dw).unwrap_or(u32::MAX);
        let sy = u32::try_from(y * sh / dh).unwrap_or(u32::MAX);
        if let Some(rgba) = src.pixel(sx, sy) {
            px.copy_from_slice(&rgba);
        }
    }
}
