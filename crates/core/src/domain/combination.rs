// Combination Domain Model

use crate::domain::element::{ElementId, ElementKind, VariationValue};
use serde::{Deserialize, Serialize};

/// One chosen candidate of one axis.
///
/// Selections are keyed by `(element_id, kind)`, not element id alone: a font
/// axis targets the same node id as a text axis, and the distinct kind keeps
/// the two substitutions from colliding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub element_id: ElementId,
    pub kind: ElementKind,
    /// Candidate index within the axis; 0 selects the original value
    pub index: usize,
    /// Total candidates on the axis (original + variations); 1 means the axis
    /// never branched, which the naming resolver uses to omit its token
    pub axis_len: usize,
    pub value: VariationValue,
    /// The axis's recorded original value, kept for content-fallback matching
    pub original: VariationValue,
}

impl Selection {
    pub fn is_original(&self) -> bool {
        self.index == 0
    }
}

/// One selection per axis, in axis order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Combination {
    entries: Vec<Selection>,
}

impl Combination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, selection: Selection) {
        self.entries.push(selection);
    }

    pub fn pop(&mut self) -> Option<Selection> {
        self.entries.pop()
    }

    pub fn entries(&self) -> &[Selection] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, element_id: &str, kind: ElementKind) -> Option<&Selection> {
        self.entries
            .iter()
            .find(|s| s.element_id == element_id && s.kind == kind)
    }

    /// The speed multiplier chosen by this combination, if a speed axis exists.
    ///
    /// Speed is global: the projector applies it to every timed node instead of
    /// looking the element id up in the tree.
    pub fn speed_multiplier(&self) -> Option<f64> {
        self.entries.iter().find_map(|s| match s.value {
            VariationValue::Speed { multiplier } if s.kind == ElementKind::Speed => {
                Some(multiplier)
            }
            _ => None,
        })
    }
}
