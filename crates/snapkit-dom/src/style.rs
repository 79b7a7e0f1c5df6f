//! Inline style declarations.
//!
//! Parses and serializes the contents of a `style` attribute. Declarations
//! keep their original order; setting an existing property replaces it in
//! place, new properties are appended.

/// A single `name: value` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Ordered list of inline declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclarations {
    declarations: Vec<Declaration>,
}

impl StyleDeclarations {
    /// Parse the text of a `style` attribute. Malformed declarations are dropped.
    pub fn parse(css: &str) -> Self {
        let mut declarations: Vec<Declaration> = Vec::new();

        for chunk in split_declarations(css) {
            let Some((name, value)) = chunk.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            let (value, important) = split_priority(value);
            if value.is_empty() {
                continue;
            }

            // Later declarations of the same property win.
            declarations.retain(|d| d.name != name);
            declarations.push(Declaration {
                name,
                value,
                important,
            });
        }

        Self { declarations }
    }

    /// Property value without priority.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).map(|d| d.value.as_str())
    }

    /// Property value with a trailing ` !important` when set.
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.find(name).map(|d| {
            if d.important {
                format!("{} !important", d.value)
            } else {
                d.value.clone()
            }
        })
    }

    pub fn is_important(&self, name: &str) -> bool {
        self.find(name).map(|d| d.important).unwrap_or(false)
    }

    /// Set a property. An empty value removes it; a trailing `!important` sets priority.
    pub fn set(&mut self, name: &str, value: &str) {
        let name = name.trim().to_ascii_lowercase();
        let (value, important) = split_priority(value);
        if value.is_empty() {
            self.remove(&name);
            return;
        }

        match self.declarations.iter_mut().find(|d| d.name == name) {
            Some(existing) => {
                existing.value = value;
                existing.important = important;
            }
            None => self.declarations.push(Declaration {
                name,
                value,
                important,
            }),
        }
    }

    /// Remove a property, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.trim().to_ascii_lowercase();
        let index = self.declarations.iter().position(|d| d.name == name)?;
        Some(self.declarations.remove(index).value)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Serialize as `name: value;` pairs separated by a space.
    pub fn to_css_text(&self) -> String {
        self.declarations
            .iter()
            .map(|d| {
                if d.important {
                    format!("{}: {} !important;", d.name, d.value)
                } else {
                    format!("{}: {};", d.name, d.value)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn find(&self, name: &str) -> Option<&Declaration> {
        let name = name.trim();
        self.declarations
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }
}

/// Split on `;` outside of quotes and parentheses.
fn split_declarations(css: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in css.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&css[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&css[start..]);
    parts
}

fn split_priority(value: &str) -> (String, bool) {
    let value = value.trim();
    if let Some(idx) = value.rfind('!') {
        if value[idx + 1..].trim().eq_ignore_ascii_case("important") {
            return (value[..idx].trim().to_string(), true);
        }
    }
    (value.to_string(), false)
}
