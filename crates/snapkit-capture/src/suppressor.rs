//! Visibility Suppressor
//!
//! Hides everything that is not the scene canvas or one of its ancestors,
//! recording each element's prior inline state so the page can be put back
//! exactly as it was.

use snapkit_dom::{Document, DomError, Node, NodeId, SelectorList};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, warn};

/// Generic UI roles hidden when no surface could be located.
const UI_ROLE_SELECTORS: &[&str] = &[
    "nav, header, footer, aside",
    r#"[role="navigation"], [role="toolbar"], [role="menu"], [role="menubar"], [role="search"], [role="banner"], [role="dialog"]"#,
    r#"[class*="nav"], [class*="toolbar"], [class*="menu"], [class*="search"]"#,
    r#"[class*="attribution"], [class*="watermark"], [class*="copyright"], [class*="logo"]"#,
    r#"[class*="control"], [class*="header"], [class*="footer"], [class*="sidebar"]"#,
    r#"[class*="popup"], [class*="tooltip"], [class*="modal"], [class*="overlay"]"#,
    r#"[id*="nav"], [id*="toolbar"], [id*="menu"], [id*="search"], [id*="header"], [id*="footer"]"#,
];

/// UI containers of common map libraries.
const THIRD_PARTY_UI_SELECTORS: &[&str] = &[
    ".mapboxgl-control-container, .maplibregl-control-container, .mapboxgl-ctrl, .maplibregl-ctrl",
    ".leaflet-control-container, .leaflet-control",
    ".gm-style-cc, .gmnoprint, .gm-control-active, .gm-fullscreen-control",
    ".cesium-viewer-toolbar, .cesium-viewer-bottom, .cesium-viewer-animationContainer, .cesium-viewer-timelineContainer",
    ".ol-control, .ol-attribution, .ol-overlaycontainer-stopevent",
];

/// Elements that never render and are not worth touching.
const INERT_TAGS: &[&str] = &[
    "head", "script", "style", "meta", "link", "title", "template", "noscript", "base",
];

/// Prior inline state of one element hidden by a cycle.
#[derive(Debug, Clone)]
pub struct HiddenElementRecord {
    element: Rc<Node>,
    original_visibility: String,
    original_opacity: String,
    original_pointer_events: String,
    /// The element carried no `style` attribute before hiding.
    unstyled: bool,
}

impl HiddenElementRecord {
    fn hide(element: &Rc<Node>) -> Self {
        let record = Self {
            element: element.clone(),
            original_visibility: element.style_property_text("visibility"),
            original_opacity: element.style_property_text("opacity"),
            original_pointer_events: element.style_property_text("pointer-events"),
            unstyled: !element.has_attribute("style"),
        };
        element.set_style_property("visibility", "hidden");
        element.set_style_property("opacity", "0");
        element.set_style_property("pointer-events", "none");
        record
    }

    fn restore(&self) {
        self.element
            .set_style_property("visibility", &self.original_visibility);
        self.element
            .set_style_property("opacity", &self.original_opacity);
        self.element
            .set_style_property("pointer-events", &self.original_pointer_events);
        if self.unstyled && self.element.style().is_empty() {
            self.element.remove_attribute("style");
        }
    }

    pub fn element(&self) -> &Rc<Node> {
        &self.element
    }

    pub fn original_visibility(&self) -> &str {
        &self.original_visibility
    }

    pub fn original_opacity(&self) -> &str {
        &self.original_opacity
    }

    pub fn original_pointer_events(&self) -> &str {
        &self.original_pointer_events
    }
}

/// Records of one hide cycle.
///
/// Restoring consumes the set. A set dropped without an explicit restore
/// restores itself, so hidden UI is never stranded.
#[derive(Debug, Default)]
pub struct HiddenSet {
    records: Vec<HiddenElementRecord>,
}

impl HiddenSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[HiddenElementRecord] {
        &self.records
    }

    /// Whether this cycle hid the given element.
    pub fn contains(&self, node: &Node) -> bool {
        self.records.iter().any(|r| r.element.id == node.id)
    }

    /// Put every recorded element back to its prior inline state.
    pub fn restore(mut self) {
        self.restore_all();
    }

    fn restore_all(&mut self) {
        for record in self.records.drain(..) {
            record.restore();
        }
    }

    fn push(&mut self, record: HiddenElementRecord) {
        self.records.push(record);
    }
}

impl Drop for HiddenSet {
    fn drop(&mut self) {
        if !self.records.is_empty() {
            debug!(count = self.records.len(), "Restoring hidden set on drop");
            self.restore_all();
        }
    }
}

/// True when the element is already invisible through its inline state.
pub fn is_hidden(node: &Node) -> bool {
    let style = node.style();
    has_keyword(style.get("visibility"), &["hidden"])
        || has_keyword(style.get("display"), &["none"])
        || node.has_attribute("hidden")
}

/// Inline `position: fixed` or `position: absolute`.
pub fn is_positioned_overlay(node: &Node) -> bool {
    has_keyword(node.style().get("position"), &["fixed", "absolute"])
}

/// CSS keywords are ASCII case-insensitive.
fn has_keyword(value: Option<&str>, keywords: &[&str]) -> bool {
    value.is_some_and(|v| keywords.iter().any(|k| v.eq_ignore_ascii_case(k)))
}

fn is_inert(node: &Node) -> bool {
    node.tag_name()
        .map(|tag| INERT_TAGS.contains(&tag))
        .unwrap_or(true)
}

fn parse_selectors(groups: &[&str]) -> Vec<SelectorList> {
    groups
        .iter()
        .filter_map(|group| {
            SelectorList::parse(group)
                .map_err(|e| warn!(selector = *group, error = %e, "Skipping fallback selector"))
                .ok()
        })
        .collect()
}

/// Hides UI around the scene canvas and restores it afterwards.
#[derive(Debug)]
pub struct VisibilitySuppressor {
    fallback_selectors: Vec<SelectorList>,
}

impl VisibilitySuppressor {
    pub fn new() -> Self {
        let groups: Vec<&str> = UI_ROLE_SELECTORS
            .iter()
            .chain(THIRD_PARTY_UI_SELECTORS)
            .copied()
            .collect();
        Self {
            fallback_selectors: parse_selectors(&groups),
        }
    }

    /// Add selectors to the fallback list.
    pub fn with_fallback_selectors(mut self, selectors: &str) -> Result<Self, DomError> {
        self.fallback_selectors.push(SelectorList::parse(selectors)?);
        Ok(self)
    }

    /// Hide UI. With a surface, everything off its ancestor chain is hidden;
    /// without one, elements matching the fallback selectors are.
    pub fn hide(&self, doc: &Document, surface: Option<&Rc<Node>>) -> HiddenSet {
        let hidden = match surface {
            Some(surface) => self.hide_around(doc, surface),
            None => self.hide_by_role(doc),
        };
        debug!(count = hidden.len(), fallback = surface.is_none(), "UI hidden");
        hidden
    }

    /// Restore a hide cycle. Never fails; an empty set is a no-op.
    pub fn restore(&self, hidden: HiddenSet) {
        let count = hidden.len();
        hidden.restore();
        debug!(count, "UI restored");
    }

    fn hide_around(&self, doc: &Document, surface: &Rc<Node>) -> HiddenSet {
        let chain: HashSet<NodeId> = surface.ancestors().iter().map(|n| n.id).collect();
        let mut hidden = HiddenSet::default();

        self.hide_off_chain(doc.root(), surface, &chain, &mut hidden);

        // Positioned overlays escape the walk when they sit under an ancestor.
        for element in doc.elements() {
            if is_positioned_overlay(&element)
                && !chain.contains(&element.id)
                && !surface.contains(&element)
                && !is_inert(&element)
                && !is_hidden(&element)
            {
                hidden.push(HiddenElementRecord::hide(&element));
            }
        }

        hidden
    }

    fn hide_off_chain(
        &self,
        node: &Rc<Node>,
        surface: &Rc<Node>,
        chain: &HashSet<NodeId>,
        hidden: &mut HiddenSet,
    ) {
        for child in node.element_children() {
            if child.id == surface.id {
                continue;
            }
            if chain.contains(&child.id) {
                self.hide_off_chain(&child, surface, chain, hidden);
            } else if !is_inert(&child) && !is_hidden(&child) {
                hidden.push(HiddenElementRecord::hide(&child));
            }
        }
    }

    fn hide_by_role(&self, doc: &Document) -> HiddenSet {
        let canvases = doc.canvases();
        let mut hidden = HiddenSet::default();

        for element in doc.elements() {
            if !self.fallback_selectors.iter().any(|s| s.matches(&element)) {
                continue;
            }
            let holds_canvas = canvases.iter().any(|c| element.contains(c));
            if holds_canvas || is_inert(&element) || is_hidden(&element) {
                continue;
            }
            hidden.push(HiddenElementRecord::hide(&element));
        }

        hidden
    }
}

impl Default for VisibilitySuppressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Document {
        Document::parse_html(&format!("<html><head><title>t</title></head><body>{body}</body></html>"))
            .unwrap()
    }

    fn get(doc: &Document, id: &str) -> Rc<Node> {
        doc.get_element_by_id(id).unwrap()
    }

    fn hidden_ids(set: &HiddenSet) -> Vec<String> {
        set.records()
            .iter()
            .map(|r| r.element().get_attribute("id").unwrap_or_default())
            .collect()
    }

    const MAP_PAGE: &str = r#"
        <header id="header">Title</header>
        <div id="app">
            <div id="sidebar">Layers</div>
            <div id="map">
                <canvas id="scene" width="800" height="600"></canvas>
                <div id="controls" style="position: absolute; top: 0px;">+ -</div>
            </div>
        </div>
        <footer id="footer">Footer</footer>
    "#;

    #[test]
    fn test_builtin_selectors_parse() {
        let suppressor = VisibilitySuppressor::new();
        assert_eq!(
            suppressor.fallback_selectors.len(),
            UI_ROLE_SELECTORS.len() + THIRD_PARTY_UI_SELECTORS.len()
        );
    }

    #[test]
    fn test_hides_everything_off_the_chain() {
        let doc = page(MAP_PAGE);
        let scene = get(&doc, "scene");

        let set = VisibilitySuppressor::new().hide(&doc, Some(&scene));
        assert_eq!(
            hidden_ids(&set),
            vec!["header", "sidebar", "controls", "footer"]
        );

        let header = get(&doc, "header");
        assert_eq!(header.style_property("visibility"), "hidden");
        assert_eq!(header.style_property("opacity"), "0");
        assert_eq!(header.style_property("pointer-events"), "none");

        for id in ["app", "map", "scene"] {
            assert!(!set.contains(&get(&doc, id)), "{id} must stay visible");
            assert_eq!(get(&doc, id).style_property("visibility"), "");
        }
        set.restore();
    }

    #[test]
    fn test_head_is_not_touched() {
        let doc = page(MAP_PAGE);
        let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
        let head = &doc.get_elements_by_tag_name("head")[0];
        assert!(!set.contains(head));
    }

    #[test]
    fn test_restore_returns_original_inline_state() {
        let doc = page(
            r#"<div id="map"><canvas id="scene" width="800" height="600"></canvas></div>
               <div id="dimmed" style="opacity: 0.4; color: red;"></div>
               <div id="pinned" style="visibility: visible !important; pointer-events: auto;"></div>"#,
        );
        let before: Vec<_> = ["dimmed", "pinned"]
            .iter()
            .map(|id| get(&doc, id).get_attribute("style"))
            .collect();

        let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].original_opacity(), "0.4");
        assert_eq!(set.records()[1].original_visibility(), "visible !important");

        VisibilitySuppressor::new().restore(set);
        let after: Vec<_> = ["dimmed", "pinned"]
            .iter()
            .map(|id| get(&doc, id).get_attribute("style"))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_unstyled_elements_restore_to_unset() {
        let doc = page(MAP_PAGE);
        let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
        set.restore();

        let footer = get(&doc, "footer");
        assert_eq!(footer.style_property("visibility"), "");
        assert_eq!(footer.style_property("opacity"), "");
        assert_eq!(footer.style_property("pointer-events"), "");
        assert!(!footer.has_attribute("style"));
    }

    #[test]
    fn test_already_hidden_elements_are_left_alone() {
        let doc = page(
            r#"<canvas id="scene" width="800" height="600"></canvas>
               <div id="a" style="visibility: hidden; opacity: 0.5;"></div>
               <div id="b" style="display: none;"></div>
               <div id="c" hidden></div>
               <div id="d"></div>"#,
        );
        let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
        assert_eq!(hidden_ids(&set), vec!["d"]);
        set.restore();

        assert_eq!(
            get(&doc, "a").get_attribute("style").as_deref(),
            Some("visibility: hidden; opacity: 0.5;")
        );
    }

    #[test]
    fn test_overlays_inside_ancestors_are_hidden() {
        let doc = page(
            r#"<div id="map">
                 <div id="layer">
                   <canvas id="scene" width="800" height="600"></canvas>
                   <div id="fixed" style="position: fixed;"></div>
                 </div>
                 <div id="static"></div>
               </div>"#,
        );
        let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
        let ids = hidden_ids(&set);
        assert!(ids.contains(&"fixed".to_string()));
        assert!(ids.contains(&"static".to_string()));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_positioned_ancestor_is_never_hidden() {
        let doc = page(
            r#"<div id="wrap" style="position: absolute;">
                 <canvas id="scene" width="800" height="600"></canvas>
               </div>
               <div id="legend" style="position: absolute;"></div>"#,
        );
        let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
        assert_eq!(hidden_ids(&set), vec!["legend"]);
        assert!(!set.contains(&get(&doc, "wrap")));
    }

    #[test]
    fn test_position_keywords_ignore_case() {
        let doc = page(
            r#"<canvas id="scene" width="800" height="600"></canvas>
               <div id="panel"><div id="legend" style="position: Fixed;"></div></div>
               <div id="badge" style="POSITION: ABSOLUTE;"></div>
               <div id="gone" style="display: NONE;"></div>"#,
        );
        assert!(is_positioned_overlay(&get(&doc, "legend")));
        assert!(is_positioned_overlay(&get(&doc, "badge")));
        assert!(is_hidden(&get(&doc, "gone")));

        let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
        assert_eq!(hidden_ids(&set), vec!["panel", "badge", "legend"]);
    }

    #[test]
    fn test_nested_overlay_recorded_once() {
        let doc = page(
            r#"<canvas id="scene" width="800" height="600"></canvas>
               <div id="popup" style="position: absolute;"></div>"#,
        );
        let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
        assert_eq!(hidden_ids(&set), vec!["popup"]);
    }

    #[test]
    fn test_fallback_hides_ui_roles() {
        let doc = page(
            r#"<nav id="nav">Links</nav>
               <div id="tools" role="toolbar"></div>
               <div id="attr" class="map-attribution">(c)</div>
               <div id="lib" class="leaflet-control-container"></div>
               <div id="content">Article</div>"#,
        );
        let set = VisibilitySuppressor::new().hide(&doc, None);
        assert_eq!(hidden_ids(&set), vec!["nav", "tools", "attr", "lib"]);
        assert!(!set.contains(&get(&doc, "content")));
    }

    #[test]
    fn test_fallback_skips_canvas_holders() {
        let doc = page(
            r#"<div id="wrapper" class="map-overlay"><canvas id="tiny" width="0" height="0"></canvas></div>
               <canvas id="ctl" class="control"></canvas>
               <div id="menu" class="menu"></div>"#,
        );
        let set = VisibilitySuppressor::new().hide(&doc, None);
        assert_eq!(hidden_ids(&set), vec!["menu"]);
    }

    #[test]
    fn test_fallback_on_document_without_surfaces() {
        let doc = page("<p>plain text</p>");
        let set = VisibilitySuppressor::new().hide(&doc, None);
        assert!(set.is_empty());
    }

    #[test]
    fn test_custom_fallback_selectors() {
        let doc = page(r#"<div id="promo" class="promo-banner"></div>"#);
        let suppressor = VisibilitySuppressor::new()
            .with_fallback_selectors(".promo-banner")
            .unwrap();
        let set = suppressor.hide(&doc, None);
        assert_eq!(hidden_ids(&set), vec!["promo"]);
        assert!(VisibilitySuppressor::new()
            .with_fallback_selectors("[broken")
            .is_err());
    }

    #[test]
    fn test_restore_empty_set() {
        let doc = page(MAP_PAGE);
        let before: Vec<_> = doc.elements().iter().map(|e| e.get_attribute("style")).collect();

        VisibilitySuppressor::new().restore(HiddenSet::default());

        let after: Vec<_> = doc.elements().iter().map(|e| e.get_attribute("style")).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_drop_restores() {
        let doc = page(MAP_PAGE);
        {
            let set = VisibilitySuppressor::new().hide(&doc, Some(&get(&doc, "scene")));
            assert!(!set.is_empty());
            assert_eq!(get(&doc, "sidebar").style_property("visibility"), "hidden");
        }
        assert_eq!(get(&doc, "sidebar").style_property("visibility"), "");
    }

    #[test]
    fn test_hide_restore_cycles_are_repeatable() {
        let doc = page(MAP_PAGE);
        let suppressor = VisibilitySuppressor::new();
        let scene = get(&doc, "scene");
        let snapshot = || -> Vec<_> { doc.elements().iter().map(|e| e.get_attribute("style")).collect() };

        let first = suppressor.hide(&doc, Some(&scene));
        let count = first.len();
        suppressor.restore(first);
        let after_first = snapshot();

        let second = suppressor.hide(&doc, Some(&scene));
        assert_eq!(second.len(), count);
        suppressor.restore(second);
        assert_eq!(snapshot(), after_first);
    }
}
