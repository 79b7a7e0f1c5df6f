//! Surface Locator
//!
//! Host pages are not under our control, so the rendering surface is found
//! with a ranked list of rules, most specific first. Each rule is a pure
//! predicate over a canvas node. When no rule yields an acceptable canvas,
//! the largest canvas in the document wins.

use snapkit_common::CaptureConfig;
use snapkit_dom::{Document, DomError, Node, SelectorList};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Dimensions and context state of a candidate surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub width: u32,
    pub height: u32,
    pub has_rendering_context: bool,
}

impl SurfaceInfo {
    /// Inspect a node; `None` for anything that is not a canvas.
    pub fn of(node: &Node) -> Option<Self> {
        let canvas = node.canvas()?;
        Some(Self {
            width: canvas.width(),
            height: canvas.height(),
            has_rendering_context: canvas.has_3d_context(),
        })
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A named predicate identifying likely scene canvases.
pub struct SurfaceRule {
    name: String,
    predicate: Box<dyn Fn(&Node) -> bool>,
}

impl SurfaceRule {
    pub fn new(name: impl Into<String>, predicate: impl Fn(&Node) -> bool + 'static) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Rule backed by a selector list.
    pub fn selector(name: impl Into<String>, selector: &str) -> Result<Self, DomError> {
        let selectors = SelectorList::parse(selector)?;
        Ok(Self::new(name, move |node| selectors.matches(node)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Only canvases can match.
    pub fn matches(&self, node: &Node) -> bool {
        node.is_canvas() && (self.predicate)(node)
    }
}

impl fmt::Debug for SurfaceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceRule").field("name", &self.name).finish()
    }
}

const MAP_CLASS_KEYWORDS: &[&str] = &["map", "globe", "scene", "webgl"];

fn attribute_contains(node: &Node, attribute: &str, needle: &str) -> bool {
    node.get_attribute(attribute)
        .map(|v| v.to_ascii_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Mapbox GL / MapLibre GL canvases.
pub fn is_mapbox_canvas(node: &Node) -> bool {
    node.has_class("mapboxgl-canvas") || node.has_class("maplibregl-canvas")
}

/// Canvases inside a Cesium widget.
pub fn is_cesium_canvas(node: &Node) -> bool {
    node.ancestors()
        .iter()
        .any(|a| attribute_contains(a, "class", "cesium-widget"))
}

/// Canvases whose own class names mention a map or 3D scene.
pub fn has_map_class(node: &Node) -> bool {
    MAP_CLASS_KEYWORDS
        .iter()
        .any(|kw| attribute_contains(node, "class", kw))
}

/// Canvases labelled or tagged as a map by attributes.
pub fn has_map_attribute(node: &Node) -> bool {
    attribute_contains(node, "aria-label", "map")
        || attribute_contains(node, "id", "map")
        || node.has_attribute("data-engine")
}

/// Canvases nested in an element whose id or class mentions a map.
pub fn in_map_container(node: &Node) -> bool {
    node.ancestors()
        .iter()
        .any(|a| attribute_contains(a, "id", "map") || attribute_contains(a, "class", "map"))
}

/// Built-in rules in evaluation order.
pub fn default_rules() -> Vec<SurfaceRule> {
    vec![
        SurfaceRule::new("mapbox-gl", is_mapbox_canvas),
        SurfaceRule::new("cesium", is_cesium_canvas),
        SurfaceRule::new("map-class", has_map_class),
        SurfaceRule::new("map-attribute", has_map_attribute),
        SurfaceRule::new("map-container", in_map_container),
        SurfaceRule::new("any-canvas", |_| true),
    ]
}

/// Finds the canvas that renders the 3D scene.
#[derive(Debug)]
pub struct SurfaceLocator {
    rules: Vec<SurfaceRule>,
    min_size: u32,
    fallback_size: u32,
}

impl SurfaceLocator {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            rules: default_rules(),
            min_size: config.min_surface_size,
            fallback_size: config.fallback_surface_size,
        }
    }

    /// Replace the rule list.
    pub fn with_rules(mut self, rules: Vec<SurfaceRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Put extra rules ahead of the built-in ones.
    pub fn with_priority_rules(mut self, rules: Vec<SurfaceRule>) -> Self {
        let builtin = std::mem::take(&mut self.rules);
        self.rules = rules.into_iter().chain(builtin).collect();
        self
    }

    pub fn rules(&self) -> &[SurfaceRule] {
        &self.rules
    }

    /// Big enough, and either WebGL-backed or big enough to assume it is.
    pub fn is_acceptable(&self, info: &SurfaceInfo) -> bool {
        let big_enough = info.width > self.min_size && info.height > self.min_size;
        let large = info.width > self.fallback_size && info.height > self.fallback_size;
        big_enough && (info.has_rendering_context || large)
    }

    /// Locate the scene canvas. `None` only when the document has no canvas.
    pub fn locate(&self, doc: &Document) -> Option<Rc<Node>> {
        let canvases = doc.canvases();
        if canvases.is_empty() {
            debug!("No canvas elements in document");
            return None;
        }

        for rule in &self.rules {
            for canvas in canvases.iter().filter(|c| rule.matches(c)) {
                let Some(info) = SurfaceInfo::of(canvas) else {
                    continue;
                };
                if self.is_acceptable(&info) {
                    debug!(
                        rule = rule.name(),
                        width = info.width,
                        height = info.height,
                        webgl = info.has_rendering_context,
                        "Surface located"
                    );
                    return Some(canvas.clone());
                }
            }
        }

        self.largest(&canvases)
    }

    fn largest(&self, canvases: &[Rc<Node>]) -> Option<Rc<Node>> {
        let mut best: Option<(u64, &Rc<Node>)> = None;
        for canvas in canvases {
            let Some(info) = SurfaceInfo::of(canvas) else {
                continue;
            };
            // Strictly greater keeps the first canvas on ties.
            if best.map_or(true, |(area, _)| info.area() > area) {
                best = Some((info.area(), canvas));
            }
        }

        let (area, canvas) = best?;
        debug!(area, "No rule matched, using largest canvas");
        Some(canvas.clone())
    }
}

impl Default for SurfaceLocator {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}
