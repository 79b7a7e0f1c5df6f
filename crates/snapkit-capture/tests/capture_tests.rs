//! End-to-end capture scenarios against parsed pages.

use snapkit_capture::{
    CaptureError, CaptureOrchestrator, FrameAcquirer, FrameClock, FrameSource, IntervalClock,
    SurfaceLocator, VisibilitySuppressor,
};
use snapkit_codecs::{decode_png, parse_data_url};
use snapkit_dom::{CanvasError, ContextAttributes, ContextKind, Document, Node, RgbaImage};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Deterministic noise so encoded frames are well above the blank threshold.
fn paint_noise(pixels: &mut RgbaImage, seed: u32) {
    let mut state = seed.max(1);
    for px in pixels.pixels_mut() {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        px.copy_from_slice(&[r, g, b, 255]);
    }
}

/// Stands in for the page's render loop: every refresh redraws the scene.
struct RenderLoop {
    scene: Rc<Node>,
    frames: Cell<u32>,
    sleeps: Cell<u32>,
}

impl RenderLoop {
    fn new(scene: Rc<Node>) -> Self {
        Self {
            scene,
            frames: Cell::new(0),
            sleeps: Cell::new(0),
        }
    }
}

impl FrameClock for RenderLoop {
    async fn next_frame(&self) {
        let frame = self.frames.get() + 1;
        self.frames.set(frame);
        if let Some(mut canvas) = self.scene.canvas_mut() {
            canvas.draw(|pixels| paint_noise(pixels, frame));
        }
    }

    async fn sleep(&self, _duration: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

const MAP_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Map</title><style>body { margin: 0; }</style></head>
<body>
  <div id="viewport">
    <canvas id="scene" width="600" height="600"></canvas>
    <div id="zoom" style="position: absolute; top: 10px; left: 10px;">+</div>
    <div id="legend" style="position: absolute; bottom: 0px; opacity: 0.8;">Legend</div>
    <div id="credits" style="position: absolute; right: 0px; pointer-events: auto;">(c)</div>
  </div>
</body>
</html>"#;

fn map_page() -> (Document, Rc<Node>) {
    let doc = Document::parse_html(MAP_PAGE).unwrap();
    let scene = doc.get_element_by_id("scene").unwrap();
    scene
        .canvas_mut()
        .unwrap()
        .get_context(ContextKind::WebGl, ContextAttributes::default())
        .unwrap();
    (doc, scene)
}

fn styles(doc: &Document) -> Vec<Option<String>> {
    doc.elements().iter().map(|e| e.get_attribute("style")).collect()
}

#[tokio::test]
async fn test_end_to_end_capture() {
    let (doc, scene) = map_page();
    let before = styles(&doc);
    let clock = RenderLoop::new(scene.clone());

    let frame = CaptureOrchestrator::default().capture(&doc, &clock).await.unwrap();

    assert!(!frame.blank);
    assert!(frame.data_url.starts_with("data:image/png;base64,"));
    assert!(frame.data_url.len() > 5000);
    assert_eq!(styles(&doc), before);

    let png = parse_data_url(&frame.data_url).unwrap();
    let image = decode_png(&png.data).unwrap();
    assert_eq!((image.width(), image.height()), (600, 600));
    assert!(!image.is_clear());
}

#[tokio::test]
async fn test_overlays_hidden_during_capture() {
    let (doc, scene) = map_page();
    let suppressor = VisibilitySuppressor::new();

    let hidden = suppressor.hide(&doc, Some(&scene));
    assert_eq!(hidden.len(), 3);
    for id in ["zoom", "legend", "credits"] {
        let overlay = doc.get_element_by_id(id).unwrap();
        assert!(hidden.contains(&overlay));
        assert_eq!(overlay.style_property("visibility"), "hidden");
    }
    assert!(!hidden.contains(&scene));
    for ancestor in scene.ancestors() {
        assert!(!hidden.contains(&ancestor));
    }

    suppressor.restore(hidden);
    let legend = doc.get_element_by_id("legend").unwrap();
    assert_eq!(legend.style_property("opacity"), "0.8");
    assert_eq!(legend.style_property("visibility"), "");
}

#[tokio::test]
async fn test_cleared_buffer_recovered_after_refresh() {
    let (_doc, scene) = map_page();
    {
        let mut canvas = scene.canvas_mut().unwrap();
        canvas.draw(|pixels| paint_noise(pixels, 7));
        canvas.present();
        assert!(canvas.pixels().unwrap().is_clear());
    }
    let clock = RenderLoop::new(scene.clone());

    let frame = FrameAcquirer::default().acquire(&scene, &clock).await.unwrap();
    assert_eq!(frame.attempts, 1);
    assert!(!frame.blank);
    assert_eq!(clock.frames.get(), 1);
    assert_eq!(clock.sleeps.get(), 1);
}

#[tokio::test]
async fn test_preserved_buffer_captured_immediately() {
    let doc = Document::parse_html(
        r#"<body><canvas id="scene" width="600" height="600"></canvas></body>"#,
    )
    .unwrap();
    let scene = doc.get_element_by_id("scene").unwrap();
    {
        let mut canvas = scene.canvas_mut().unwrap();
        canvas
            .get_context(ContextKind::WebGl2, ContextAttributes::preserved())
            .unwrap();
        canvas.draw(|pixels| paint_noise(pixels, 3));
        canvas.present();
    }

    let frame = FrameAcquirer::default()
        .acquire(&scene, &IntervalClock::default())
        .await
        .unwrap();
    assert_eq!(frame.attempts, 0);
}

#[tokio::test]
async fn test_stalled_render_loop_degrades_to_blank() {
    let (doc, _scene) = map_page();
    let idle = doc.create_element("canvas", &[("width", "10"), ("height", "10")]);
    let clock = RenderLoop::new(idle);

    let frame = CaptureOrchestrator::default().capture(&doc, &clock).await.unwrap();
    assert!(frame.blank);
    assert_eq!(frame.attempts, 10);
    assert!(parse_data_url(&frame.data_url).is_ok());
}

#[tokio::test]
async fn test_tainted_canvas_fails_and_restores() {
    let (doc, scene) = map_page();
    scene.canvas_mut().unwrap().taint();
    let before = styles(&doc);
    let clock = RenderLoop::new(scene.clone());

    let err = CaptureOrchestrator::default().capture(&doc, &clock).await.unwrap_err();
    assert_eq!(
        err,
        CaptureError::Encode {
            attempt: 1,
            source: CanvasError::Security
        }
    );
    assert_eq!(styles(&doc), before);
}

#[tokio::test]
async fn test_page_without_canvas() {
    let doc = Document::parse_html(
        r#"<body><nav id="nav">Home</nav><main id="main">Text</main></body>"#,
    )
    .unwrap();
    let before = styles(&doc);

    assert!(SurfaceLocator::default().locate(&doc).is_none());
    let err = CaptureOrchestrator::default()
        .capture(&doc, &IntervalClock::default())
        .await
        .unwrap_err();
    assert_eq!(err, CaptureError::NoSurfaceFound);
    assert_eq!(styles(&doc), before);

    let orchestrator = CaptureOrchestrator::default();
    let hidden = orchestrator.hide_ui(&doc);
    assert_eq!(hidden.len(), 1);
    orchestrator.restore_ui(hidden);
    assert_eq!(styles(&doc), before);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_capture_restores_ui() {
    let (doc, scene) = map_page();
    let before = styles(&doc);
    let orchestrator = CaptureOrchestrator::default();

    {
        let clock = IntervalClock::default();
        let capture = orchestrator.capture(&doc, &clock);
        // Polling once runs up to the first refresh wait, after hiding.
        let polled = tokio::time::timeout(Duration::from_millis(1), capture).await;
        assert!(polled.is_err());
    }
    assert_eq!(styles(&doc), before);
    assert!(!scene.has_attribute("style"));
}

#[tokio::test]
async fn test_locate_returns_surface_for_any_large_canvas() {
    for (attrs, expected) in [
        (r#"width="150" height="150""#, false),
        (r#"width="501" height="501""#, true),
        (r#"width="2000" height="101""#, false),
    ] {
        let html = format!(r#"<body><canvas id="c" {attrs}></canvas></body>"#);
        let doc = Document::parse_html(&html).unwrap();
        let located = SurfaceLocator::default().locate(&doc).unwrap();
        assert_eq!(located.get_attribute("id").as_deref(), Some("c"));

        let locator = SurfaceLocator::default();
        let info = snapkit_capture::SurfaceInfo::of(&located).unwrap();
        assert_eq!(locator.is_acceptable(&info), expected, "{attrs}");
    }
}

#[test]
fn test_frame_source_through_rc() {
    fn encode_any<S: FrameSource + ?Sized>(source: &S) -> Result<String, CanvasError> {
        source.encode()
    }

    let doc = Document::parse_html(r#"<body><canvas id="c" width="0"></canvas></body>"#).unwrap();
    let canvas = doc.get_element_by_id("c").unwrap();
    assert_eq!(encode_any(&canvas).unwrap(), "data:,");
    assert_eq!(encode_any(&*canvas).unwrap(), "data:,");
}
