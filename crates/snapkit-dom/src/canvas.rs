//! Canvas drawing buffers.
//!
//! Every `<canvas>` element owns a [`CanvasSurface`]. A surface acquires at
//! most one rendering context kind. WebGL contexts created without
//! `preserve_drawing_buffer` lose their pixels each time the frame is
//! presented, which is why snapshots taken outside the redraw window come
//! back blank.

use snapkit_codecs::{png_data_url, RgbaImage};
use thiserror::Error;
use tracing::trace;

/// Largest width or height a surface will back with pixels.
pub const MAX_CANVAS_DIMENSION: u32 = 32_767;

/// Largest pixel count a surface will back with pixels (16384 x 16384).
pub const MAX_CANVAS_AREA: u64 = 16_384 * 16_384;

/// Errors raised by canvas operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanvasError {
    #[error("SecurityError: the canvas has been tainted by cross-origin data")]
    Security,

    #[error("Canvas already has a {0} context")]
    ContextMismatch(ContextKind),

    #[error("Unknown context type: {0}")]
    UnknownContext(String),

    #[error("Element is not a canvas")]
    NotACanvas,

    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Rendering context kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    TwoD,
    WebGl,
    WebGl2,
}

impl ContextKind {
    /// Parse a `getContext` type string.
    pub fn parse(name: &str) -> Result<Self, CanvasError> {
        match name {
            "2d" => Ok(ContextKind::TwoD),
            "webgl" | "experimental-webgl" => Ok(ContextKind::WebGl),
            "webgl2" => Ok(ContextKind::WebGl2),
            other => Err(CanvasError::UnknownContext(other.to_string())),
        }
    }

    pub fn is_3d(self) -> bool {
        matches!(self, ContextKind::WebGl | ContextKind::WebGl2)
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ContextKind::TwoD => "2d",
            ContextKind::WebGl => "webgl",
            ContextKind::WebGl2 => "webgl2",
        })
    }
}

/// Context creation attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextAttributes {
    /// Keep the drawing buffer after presentation.
    pub preserve_drawing_buffer: bool,
}

impl ContextAttributes {
    pub fn preserved() -> Self {
        Self {
            preserve_drawing_buffer: true,
        }
    }
}

/// Backing store of a `<canvas>` element.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    width: u32,
    height: u32,
    context: Option<ContextKind>,
    attributes: ContextAttributes,
    context_lost: bool,
    origin_clean: bool,
    /// Allocated on first draw.
    buffer: Option<RgbaImage>,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            context: None,
            attributes: ContextAttributes::default(),
            context_lost: false,
            origin_clean: true,
            buffer: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize the surface. Like setting `canvas.width`, this clears the buffer.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.buffer = None;
    }

    /// Acquire a rendering context. The first kind requested sticks.
    pub fn get_context(
        &mut self,
        kind: ContextKind,
        attributes: ContextAttributes,
    ) -> Result<ContextKind, CanvasError> {
        match self.context {
            Some(existing) if existing != kind => Err(CanvasError::ContextMismatch(existing)),
            Some(existing) => Ok(existing),
            None => {
                trace!(%kind, ?attributes, "Creating canvas context");
                self.context = Some(kind);
                self.attributes = attributes;
                Ok(kind)
            }
        }
    }

    pub fn context(&self) -> Option<ContextKind> {
        self.context
    }

    pub fn attributes(&self) -> ContextAttributes {
        self.attributes
    }

    /// True when a live WebGL/WebGL2 context is attached.
    pub fn has_3d_context(&self) -> bool {
        self.context.is_some_and(ContextKind::is_3d) && !self.context_lost
    }

    /// Simulate `WEBGL_lose_context.loseContext()`.
    pub fn lose_context(&mut self) {
        self.context_lost = true;
        self.buffer = None;
    }

    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    /// Mark the canvas origin-unclean; encoding will then fail.
    pub fn taint(&mut self) {
        self.origin_clean = false;
    }

    /// False when the surface is too large to allocate a drawing buffer.
    pub fn is_allocatable(&self) -> bool {
        self.width <= MAX_CANVAS_DIMENSION
            && self.height <= MAX_CANVAS_DIMENSION
            && u64::from(self.width) * u64::from(self.height) <= MAX_CANVAS_AREA
    }

    /// Draw into the drawing buffer. Oversized surfaces ignore drawing.
    pub fn draw(&mut self, paint: impl FnOnce(&mut RgbaImage)) {
        if self.buffer.is_none() {
            if !self.is_allocatable() {
                trace!(width = self.width, height = self.height, "Canvas too large to draw");
                return;
            }
            match RgbaImage::new(self.width, self.height) {
                Ok(image) => self.buffer = Some(image),
                Err(e) => {
                    trace!(error = %e, "Cannot allocate drawing buffer");
                    return;
                }
            }
        }
        if let Some(buffer) = self.buffer.as_mut() {
            paint(buffer);
        }
    }

    /// Present the frame to the compositor. Non-preserved WebGL buffers are cleared.
    pub fn present(&mut self) {
        let clears = self.context.is_some_and(ContextKind::is_3d)
            && !self.attributes.preserve_drawing_buffer;
        if clears {
            if let Some(buffer) = self.buffer.as_mut() {
                buffer.clear();
            }
        }
    }

    /// Current drawing buffer, if anything was ever drawn.
    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.buffer.as_ref()
    }

    /// Encode the drawing buffer as an `image/png` data URL.
    pub fn to_data_url(&self) -> Result<String, CanvasError> {
        if !self.origin_clean {
            return Err(CanvasError::Security);
        }
        if self.width == 0 || self.height == 0 {
            return Ok("data:,".to_string());
        }
        if !self.is_allocatable() {
            return Err(CanvasError::Encode(format!(
                "{}x{} canvas exceeds the maximum surface size",
                self.width, self.height
            )));
        }

        let encoded = match &self.buffer {
            Some(buffer) => png_data_url(buffer),
            None => RgbaImage::new(self.width, self.height).and_then(|blank| png_data_url(&blank)),
        };
        encoded.map_err(|e| CanvasError::Encode(e.to_string()))
    }
}

/// Parse a canvas `width`/`height` attribute, falling back to the HTML default.
///
/// Follows the HTML non-negative integer rules: leading whitespace is skipped
/// and parsing stops at the first non-digit, so `"600px"` is 600.
pub(crate) fn dimension_attribute(value: Option<&String>, default: u32) -> u32 {
    let Some(value) = value else {
        return default;
    };
    let digits = value
        .trim_start_matches(|c: char| c.is_ascii_whitespace())
        .trim_start_matches('+');
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return default;
    }
    digits[..end].parse::<u32>().unwrap_or(u32::MAX)
}
