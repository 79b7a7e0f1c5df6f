//! Command handling
//!
//! Each request is dispatched to a handler function that returns a
//! [`Response`]. Failures become `success: false` responses; nothing here
//! returns an error to the caller.

use crate::protocol::{Request, Response};
use snapkit_capture::{CaptureOrchestrator, FrameClock, HiddenSet};
use snapkit_common::CaptureConfig;
use snapkit_dom::Document;
use tracing::{debug, info, warn};

/// Session bound to one document.
///
/// Holds at most one outstanding [`HiddenSet`] from `hideUI`.
pub struct CommandHandler<C> {
    document: Document,
    orchestrator: CaptureOrchestrator,
    clock: C,
    hidden: Option<HiddenSet>,
}

impl<C: FrameClock> CommandHandler<C> {
    pub fn new(document: Document, config: &CaptureConfig, clock: C) -> Self {
        Self::with_orchestrator(document, CaptureOrchestrator::new(config), clock)
    }

    pub fn with_orchestrator(document: Document, orchestrator: CaptureOrchestrator, clock: C) -> Self {
        Self {
            document,
            orchestrator,
            clock,
            hidden: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of elements hidden by an outstanding `hideUI`.
    pub fn hidden_count(&self) -> usize {
        self.hidden.as_ref().map_or(0, HiddenSet::len)
    }

    /// Process one raw JSON message.
    pub async fn handle_json(&mut self, message: &str) -> Response {
        match serde_json::from_str::<Request>(message) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, "Malformed request");
                Response::error(format!("Invalid request: {e}"))
            }
        }
    }

    pub async fn handle(&mut self, request: Request) -> Response {
        debug!(?request, "Handling request");
        match request {
            Request::Capture => self.handle_capture().await,
            Request::HideUi => self.handle_hide_ui(),
            Request::RestoreUi => self.handle_restore_ui(),
        }
    }

    async fn handle_capture(&mut self) -> Response {
        match self.orchestrator.capture(&self.document, &self.clock).await {
            Ok(frame) => {
                if frame.blank {
                    warn!(attempts = frame.attempts, "Returning blank capture");
                }
                Response::captured(frame.data_url)
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    fn handle_hide_ui(&mut self) -> Response {
        if let Some(previous) = self.hidden.take() {
            debug!(count = previous.len(), "Restoring outstanding hide before hiding again");
            self.orchestrator.restore_ui(previous);
        }

        let hidden = self.orchestrator.hide_ui(&self.document);
        let count = hidden.len();
        info!(count, "UI hidden");
        self.hidden = Some(hidden);
        Response::hidden(count)
    }

    fn handle_restore_ui(&mut self) -> Response {
        match self.hidden.take() {
            Some(hidden) => {
                let count = hidden.len();
                self.orchestrator.restore_ui(hidden);
                info!(count, "UI restored");
            }
            None => debug!("Nothing to restore"),
        }
        Response::restored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct NoWait;

    impl FrameClock for NoWait {
        async fn next_frame(&self) {}
        async fn sleep(&self, _duration: Duration) {}
    }

    fn handler(body: &str) -> CommandHandler<NoWait> {
        let doc = Document::parse_html(&format!("<html><body>{body}</body></html>")).unwrap();
        CommandHandler::new(doc, &CaptureConfig::default(), NoWait)
    }

    const PAGE: &str = r#"<div id="map"><canvas width="800" height="600"></canvas></div>
        <div id="toolbar" style="opacity: 0.5;"></div>
        <div id="panel"></div>"#;

    #[tokio::test]
    async fn test_hide_then_restore() {
        let mut handler = handler(PAGE);

        let response = handler.handle(Request::HideUi).await;
        assert_eq!(response, Response::hidden(2));
        assert_eq!(handler.hidden_count(), 2);

        let response = handler.handle(Request::RestoreUi).await;
        assert_eq!(response, Response::restored());
        assert_eq!(handler.hidden_count(), 0);

        let toolbar = handler.document().get_element_by_id("toolbar").unwrap();
        assert_eq!(toolbar.get_attribute("style").as_deref(), Some("opacity: 0.5;"));
    }

    #[tokio::test]
    async fn test_second_hide_restores_first() {
        let mut handler = handler(PAGE);

        handler.handle(Request::HideUi).await;
        let response = handler.handle(Request::HideUi).await;
        // The first cycle's records are restored, so the same elements are hidden again.
        assert_eq!(response, Response::hidden(2));

        handler.handle(Request::RestoreUi).await;
        let panel = handler.document().get_element_by_id("panel").unwrap();
        assert!(!panel.has_attribute("style"));
        let toolbar = handler.document().get_element_by_id("toolbar").unwrap();
        assert_eq!(toolbar.style_property("opacity"), "0.5");
    }

    #[tokio::test]
    async fn test_restore_without_hide() {
        let mut handler = handler(PAGE);
        assert_eq!(handler.handle(Request::RestoreUi).await, Response::restored());
    }

    #[tokio::test]
    async fn test_capture_without_canvas() {
        let mut handler = handler("<p>text</p>");
        let response = handler.handle(Request::Capture).await;
        assert_eq!(response, Response::error("No WebGL canvas found on this page"));
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let mut handler = handler(PAGE);
        for message in ["", "not json", r#"{"action":"zoom"}"#, r#"["capture"]"#] {
            let response = handler.handle_json(message).await;
            assert!(!response.success, "{message}");
            assert!(response.error.unwrap().starts_with("Invalid request"));
        }
    }

    #[tokio::test]
    async fn test_json_round() {
        let mut handler = handler(PAGE);
        let response = handler.handle_json(r#"{"action":"hideUI"}"#).await;
        assert_eq!(response.to_json(), r#"{"success":true,"hiddenCount":2}"#);
    }
}
