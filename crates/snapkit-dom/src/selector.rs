//! Simple CSS selector matching.
//!
//! Supports comma-separated lists of compound selectors joined by descendant
//! (whitespace) or child (`>`) combinators. Compound selectors may contain a
//! tag or `*`, `#id`, `.class`, and attribute selectors
//! (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, `[a~=v]`, optional ` i` flag).

use crate::{Document, DomError, Node};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: Option<(AttrOp, String)>,
    case_insensitive: bool,
}

impl AttrSelector {
    fn matches(&self, node: &Node) -> bool {
        let Some(actual) = node.get_attribute(&self.name) else {
            return false;
        };
        let Some((op, expected)) = &self.op else {
            return true;
        };

        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), expected.to_lowercase())
        } else {
            (actual, expected.clone())
        };

        match op {
            AttrOp::Equals => actual == expected,
            // Empty substrings never match, as in CSS.
            AttrOp::Contains => !expected.is_empty() && actual.contains(&expected),
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Word => actual.split_whitespace().any(|w| w == expected),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    universal: bool,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<AttrSelector>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && !self.universal
            && self.ids.is_empty()
            && self.classes.is_empty()
            && self.attributes.is_empty()
    }

    fn matches(&self, node: &Node) -> bool {
        let Some(tag) = node.tag_name() else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if !tag.eq_ignore_ascii_case(expected) {
                return false;
            }
        }
        self.ids
            .iter()
            .all(|id| node.get_attribute("id").as_deref() == Some(id.as_str()))
            && self.classes.iter().all(|c| node.has_class(c))
            && self.attributes.iter().all(|a| a.matches(node))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    /// Compounds left to right; the combinator joins a compound to the one before it.
    parts: Vec<(Combinator, Compound)>,
}

impl ComplexSelector {
    fn matches(&self, node: &Node) -> bool {
        !self.parts.is_empty() && self.matches_at(self.parts.len() - 1, node)
    }

    fn matches_at(&self, index: usize, node: &Node) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(node) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match combinator {
            Combinator::Child => node
                .parent()
                .map(|p| self.matches_at(index - 1, &p))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut current = node.parent();
                while let Some(ancestor) = current {
                    if self.matches_at(index - 1, &ancestor) {
                        return true;
                    }
                    current = ancestor.parent();
                }
                false
            }
        }
    }
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    /// Parse a selector list.
    pub fn parse(input: &str) -> Result<Self, DomError> {
        Parser::new(input).parse_list()
    }

    /// Check whether an element matches any selector in the list.
    pub fn matches(&self, node: &Node) -> bool {
        self.selectors.iter().any(|s| s.matches(node))
    }
}

/// Query selector support.
pub struct QuerySelector;

impl QuerySelector {
    /// Select elements matching a selector list, in document order.
    pub fn select(doc: &Document, selectors: &SelectorList) -> Vec<Rc<Node>> {
        doc.elements()
            .into_iter()
            .filter(|n| selectors.matches(n))
            .collect()
    }

    /// Parse and select in one step.
    pub fn select_str(doc: &Document, selector: &str) -> Result<Vec<Rc<Node>>, DomError> {
        Ok(Self::select(doc, &SelectorList::parse(selector)?))
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    source: String,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            source: input.to_string(),
        }
    }

    fn error(&self, what: &str) -> DomError {
        DomError::InvalidSelector(format!("{what} at {} in {:?}", self.pos, self.source))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn is_ident_char(c: char) -> bool {
        c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
    }

    fn ident(&mut self) -> Result<String, DomError> {
        let start = self.pos;
        while self.peek().is_some_and(Self::is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_list(mut self) -> Result<SelectorList, DomError> {
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(_) => return Err(self.error("unexpected character")),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, DomError> {
        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;

        loop {
            let compound = self.parse_compound()?;
            if compound.is_empty() {
                return Err(self.error("expected selector"));
            }
            parts.push((combinator, compound));

            let had_space = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_whitespace();
                    combinator = Combinator::Child;
                }
                Some(_) if had_space => combinator = Combinator::Descendant,
                Some(_) => return Err(self.error("unexpected character")),
            }
        }

        Ok(ComplexSelector { parts })
    }

    fn parse_compound(&mut self) -> Result<Compound, DomError> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
                compound.universal = true;
            }
            Some(c) if Self::is_ident_char(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.ids.push(self.ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.parse_attribute()?);
                }
                _ => break,
            }
        }

        Ok(compound)
    }

    fn parse_attribute(&mut self) -> Result<AttrSelector, DomError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => None,
            Some('=') => Some(AttrOp::Equals),
            Some(c) => {
                let op = match c {
                    '*' => AttrOp::Contains,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '~' => AttrOp::Word,
                    _ => return Err(self.error("unknown attribute operator")),
                };
                self.bump();
                if self.peek() != Some('=') {
                    return Err(self.error("expected '='"));
                }
                Some(op)
            }
            None => return Err(self.error("unterminated attribute selector")),
        };

        let mut selector = AttrSelector {
            name,
            op: None,
            case_insensitive: false,
        };

        if let Some(op) = op {
            self.bump(); // '='
            self.skip_whitespace();
            let value = self.parse_value()?;
            selector.op = Some((op, value));
            self.skip_whitespace();
            if matches!(self.peek(), Some('i') | Some('I')) {
                self.bump();
                selector.case_insensitive = true;
                self.skip_whitespace();
            }
        }

        match self.bump() {
            Some(']') => Ok(selector),
            _ => Err(self.error("unterminated attribute selector")),
        }
    }

    fn parse_value(&mut self) -> Result<String, DomError> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                while let Some(c) = self.bump() {
                    if c == q {
                        return Ok(self.chars[start..self.pos - 1].iter().collect());
                    }
                }
                Err(self.error("unterminated string"))
            }
            _ => self.ident(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse_html(
            r#"<html><body>
                <div id="map" class="map-container">
                    <canvas id="gl" class="mapboxgl-canvas" aria-label="Map"></canvas>
                </div>
                <div class="ui"><span class="btn primary" data-role="zoom-in"></span></div>
                <nav class="top-nav"></nav>
            </body></html>"#,
        )
        .unwrap()
    }

    fn ids(doc: &Document, selector: &str) -> Vec<String> {
        QuerySelector::select_str(doc, selector)
            .unwrap()
            .iter()
            .map(|n| {
                n.get_attribute("id")
                    .or_else(|| n.get_attribute("class"))
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn test_simple_selectors() {
        let doc = doc();
        assert_eq!(ids(&doc, "#gl"), vec!["gl"]);
        assert_eq!(ids(&doc, ".primary"), vec!["btn primary"]);
        assert_eq!(ids(&doc, "nav"), vec!["top-nav"]);
        assert_eq!(ids(&doc, "canvas.mapboxgl-canvas"), vec!["gl"]);
        assert!(ids(&doc, "div.mapboxgl-canvas").is_empty());
    }

    #[test]
    fn test_attribute_operators() {
        let doc = doc();
        assert_eq!(ids(&doc, r#"[class*="nav"]"#), vec!["top-nav"]);
        assert_eq!(ids(&doc, "[data-role^=zoom]"), vec!["btn primary"]);
        assert_eq!(ids(&doc, "[data-role$='-in']"), vec!["btn primary"]);
        assert_eq!(ids(&doc, "[class~=btn]"), vec!["btn primary"]);
        assert_eq!(ids(&doc, "[id=map]"), vec!["map"]);
        assert_eq!(ids(&doc, "canvas[aria-label]"), vec!["gl"]);
        assert!(ids(&doc, r#"[class*=""]"#).is_empty());
    }

    #[test]
    fn test_case_insensitive_flag() {
        let doc = doc();
        assert!(ids(&doc, r#"canvas[aria-label*="map"]"#).is_empty());
        assert_eq!(ids(&doc, r#"canvas[aria-label*="map" i]"#), vec!["gl"]);
    }

    #[test]
    fn test_combinators() {
        let doc = doc();
        assert_eq!(ids(&doc, "#map canvas"), vec!["gl"]);
        assert_eq!(ids(&doc, "div > canvas"), vec!["gl"]);
        assert_eq!(ids(&doc, "body > div > canvas"), vec!["gl"]);
        assert!(ids(&doc, "body > canvas").is_empty());
        assert!(ids(&doc, ".ui canvas").is_empty());
    }

    #[test]
    fn test_selector_list() {
        let doc = doc();
        assert_eq!(ids(&doc, "nav, #gl"), vec!["gl", "top-nav"]);
    }

    #[test]
    fn test_invalid_selectors() {
        for bad in ["", "div,", "[a", "[a%=b]", "[a*b]", "#", "div >", "a!b", "[a='x]"] {
            assert!(SelectorList::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }
}
