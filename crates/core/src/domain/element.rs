// Template & Element Domain Model

use serde::{Deserialize, Serialize};

/// Element ID (assigned by the template editor)
pub type ElementId = String;

/// Element kind - closed set, traversal code matches exhaustively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Image,
    Video,
    Audio,
    Font,
    Speed,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Text => "text",
            ElementKind::Image => "image",
            ElementKind::Video => "video",
            ElementKind::Audio => "audio",
            ElementKind::Font => "font",
            ElementKind::Speed => "speed",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Font styling carried by text nodes and targeted by font variations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
}

/// Kind-specific candidate value for an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariationValue {
    Text { text: String },
    Media { src: String },
    Font { font: FontSpec },
    Speed { multiplier: f64 },
}

impl VariationValue {
    /// Whether this value is applicable to the given element kind
    pub fn matches_kind(&self, kind: ElementKind) -> bool {
        matches!(
            (self, kind),
            (VariationValue::Text { .. }, ElementKind::Text)
                | (VariationValue::Media { .. }, ElementKind::Image)
                | (VariationValue::Media { .. }, ElementKind::Video)
                | (VariationValue::Media { .. }, ElementKind::Audio)
                | (VariationValue::Font { .. }, ElementKind::Font)
                | (VariationValue::Speed { .. }, ElementKind::Speed)
        )
    }
}

/// Display window of a timed node, in template-relative milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: f64,
    pub end_ms: f64,
}

/// Content payload of a leaf node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeContent {
    Text { text: String, font: FontSpec },
    Media { src: String },
}

fn default_playback_rate() -> f64 {
    1.0
}

/// One editable element in the template tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub id: ElementId,
    pub kind: ElementKind,
    pub content: NodeContent,
    /// Present on timed nodes (video/audio and timed overlays)
    pub window: Option<TimeWindow>,
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
}

impl ElementNode {
    /// The node's current value for the given substitution kind.
    ///
    /// Used by the projector's content-based fallback: an axis records the
    /// original value it was created against, and a node whose current value
    /// still equals it is considered the same element after id drift.
    pub fn current_value(&self, kind: ElementKind) -> Option<VariationValue> {
        match (&self.content, kind) {
            (NodeContent::Text { text, .. }, ElementKind::Text) => Some(VariationValue::Text {
                text: text.clone(),
            }),
            (NodeContent::Text { font, .. }, ElementKind::Font) => Some(VariationValue::Font {
                font: font.clone(),
            }),
            (NodeContent::Media { src }, ElementKind::Image)
            | (NodeContent::Media { src }, ElementKind::Video)
            | (NodeContent::Media { src }, ElementKind::Audio) => {
                Some(VariationValue::Media { src: src.clone() })
            }
            _ => None,
        }
    }
}

/// Template tree node: a leaf element or a group of nested nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TemplateNode {
    Group {
        id: String,
        children: Vec<TemplateNode>,
    },
    Element(ElementNode),
}

/// Immutable base template owned by a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub project: String,
    #[serde(default)]
    pub platform: Option<String>,
    pub duration_ms: f64,
    pub nodes: Vec<TemplateNode>,
}

impl Template {
    /// Ids of every element currently present in the tree.
    ///
    /// The orphan-cleanup sweep passes this list to the variation store so
    /// variations referencing deleted elements can be dropped.
    pub fn live_element_ids(&self) -> Vec<ElementId> {
        let mut ids = Vec::new();
        fn walk(nodes: &[TemplateNode], ids: &mut Vec<ElementId>) {
            for node in nodes {
                match node {
                    TemplateNode::Group { children, .. } => walk(children, ids),
                    TemplateNode::Element(el) => ids.push(el.id.clone()),
                }
            }
        }
        walk(&self.nodes, &mut ids);
        ids
    }

    /// Flat view of all element nodes, in traversal order
    pub fn elements(&self) -> Vec<&ElementNode> {
        let mut out = Vec::new();
        fn walk<'a>(nodes: &'a [TemplateNode], out: &mut Vec<&'a ElementNode>) {
            for node in nodes {
                match node {
                    TemplateNode::Group { children, .. } => walk(children, out),
                    TemplateNode::Element(el) => out.push(el),
                }
            }
        }
        walk(&self.nodes, &mut out);
        out
    }
}

/// Fully materialized render input: a template clone with one combination's
/// values substituted in, plus the metadata the backend needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub template: Template,
    pub duration_ms: f64,
    #[serde(default)]
    pub platform: Option<String>,
    pub output_format: String,
}
