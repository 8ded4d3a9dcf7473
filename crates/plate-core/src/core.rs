use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ops::Path;
use crate::position::MarkEntry;

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::paragraph_with(vec![Node::text(text)])
    }

    pub fn paragraph_with(children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: "paragraph".to_string(),
            attrs: Attrs::new(),
            children,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::marked_text(text, Marks::default())
    }

    pub fn marked_text(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn divider() -> Self {
        Node::Void(VoidNode {
            kind: "divider".to_string(),
            attrs: Attrs::new(),
        })
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Text(_) | Node::Void(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

pub const BUILTIN_MARKS: [&str; 5] = ["bold", "italic", "underline", "strikethrough", "code"];

/// Marks carried by a text leaf.
///
/// Built-in marks are plain flags. Marks registered through a [`crate::MarkSpec`]
/// live in `custom`, keyed by mark name; a leaf holds at most one mark of each
/// name, so setting a mark again replaces its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Attrs>,
}

impl Marks {
    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        match name {
            "bold" => Some(&mut self.bold),
            "italic" => Some(&mut self.italic),
            "underline" => Some(&mut self.underline),
            "strikethrough" => Some(&mut self.strikethrough),
            "code" => Some(&mut self.code),
            _ => None,
        }
    }

    fn flag(&self, name: &str) -> Option<bool> {
        match name {
            "bold" => Some(self.bold),
            "italic" => Some(self.italic),
            "underline" => Some(self.underline),
            "strikethrough" => Some(self.strikethrough),
            "code" => Some(self.code),
            _ => None,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.flag(name)
            .unwrap_or_else(|| self.custom.contains_key(name))
    }

    pub fn get(&self, name: &str) -> Option<Attrs> {
        match self.flag(name) {
            Some(true) => Some(Attrs::new()),
            Some(false) => None,
            None => self.custom.get(name).cloned(),
        }
    }

    /// `Some` sets the mark (replacing the attributes it had), `None` clears it.
    pub fn set(&mut self, name: &str, attrs: Option<Attrs>) {
        if let Some(flag) = self.flag_mut(name) {
            *flag = attrs.is_some();
            return;
        }
        match attrs {
            Some(attrs) => {
                self.custom.insert(name.to_string(), attrs);
            }
            None => {
                self.custom.remove(name);
            }
        }
    }

    pub fn with(mut self, name: &str, attrs: Attrs) -> Self {
        self.set(name, Some(attrs));
        self
    }

    /// Built-in marks first, then registered marks in name order.
    pub fn entries(&self) -> Vec<MarkEntry> {
        let builtin = BUILTIN_MARKS
            .iter()
            .filter(|name| self.has(name))
            .map(|name| MarkEntry {
                name: name.to_string(),
                attrs: Attrs::new(),
            });
        let custom = self.custom.iter().map(|(name, attrs)| MarkEntry {
            name: name.clone(),
            attrs: attrs.clone(),
        });
        builtin.chain(custom).collect()
    }

    pub fn is_empty(&self) -> bool {
        *self == Marks::default()
    }
}

/// A caret location: the path of a text leaf and a byte offset into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self::new(point.clone(), point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub(crate) fn points_mut(&mut self) -> [&mut Point; 2] {
        [&mut self.anchor, &mut self.focus]
    }
}

impl Document {
    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (&first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.children.get(first)?, |node, &ix| node.children().get(ix))
    }

    pub fn text_at(&self, path: &[usize]) -> Option<&TextNode> {
        self.node(path).and_then(Node::as_text)
    }

    /// Path of the first text leaf in document order.
    pub fn first_text_path(&self) -> Option<Path> {
        self.descendants()
            .into_iter()
            .find(|d| d.as_text().is_some())
            .map(|d| d.path)
    }
}

pub(crate) fn clamp_to_char_boundary(s: &str, ix: usize) -> usize {
    let mut ix = ix.min(s.len());
    while !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}
