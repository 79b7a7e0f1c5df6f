//! # SnapKit Capture
//!
//! Produces a clean snapshot of the 3D scene rendered by a page, without the
//! page's own interface on top of it.
//!
//! ## Pipeline
//!
//! 1. [`SurfaceLocator`] picks the canvas that renders the scene.
//! 2. [`VisibilitySuppressor`] hides everything around it and records the
//!    prior inline state in a [`HiddenSet`].
//! 3. The [`CaptureOrchestrator`] lets layout settle for a few refresh cycles.
//! 4. [`FrameAcquirer`] samples the canvas just after refresh signals until
//!    the frame has content.
//! 5. The hidden set is restored, whether or not acquisition succeeded.
//!
//! Timing goes through the [`FrameClock`] trait; [`IntervalClock`] is the
//! `tokio` implementation. The document model is single-threaded, so captures
//! run on a current-thread runtime.
//!
//! ## Example
//!
//! ```ignore
//! use snapkit_capture::{CaptureOrchestrator, IntervalClock};
//!
//! let doc = snapkit_dom::Document::parse_html(html)?;
//! let frame = CaptureOrchestrator::default()
//!     .capture(&doc, &IntervalClock::default())
//!     .await?;
//! println!("{}", frame.data_url);
//! ```

pub mod acquirer;
pub mod clock;
pub mod error;
pub mod locator;
pub mod orchestrator;
pub mod suppressor;

pub use acquirer::{CapturedFrame, FrameAcquirer, FrameSource};
pub use clock::{FrameClock, IntervalClock};
pub use error::CaptureError;
pub use locator::{default_rules, SurfaceInfo, SurfaceLocator, SurfaceRule};
pub use orchestrator::CaptureOrchestrator;
pub use suppressor::{HiddenElementRecord, HiddenSet, VisibilitySuppressor};
