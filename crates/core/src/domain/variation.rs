// Variation & Axis Domain Model

use crate::domain::element::{ElementId, ElementKind, VariationValue};
use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Variation ID (UUID v4)
pub type VariationId = String;

/// Element id carried by the template-wide speed axis. Speed is not bound to
/// a real node: projection detects it by kind and rescales every timed node,
/// and axis loading fetches it under this synthetic id.
pub const SPEED_ELEMENT_ID: &str = "__speed__";

/// One alternative value attached to an element, persisted externally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub id: VariationId,
    pub element_id: ElementId,
    pub kind: ElementKind,
    pub value: VariationValue,
    pub order: i32,
}

/// One editable element plus its ordered candidate values.
///
/// Derived at enumeration time, never persisted. The original value is always
/// candidate 0, so an axis has length >= 1 even with no variations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub element_id: ElementId,
    pub kind: ElementKind,
    pub original: VariationValue,
    pub variations: Vec<Variation>,
}

impl Axis {
    /// Create an axis with no variations (original only)
    pub fn new(
        element_id: impl Into<String>,
        kind: ElementKind,
        original: VariationValue,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            kind,
            original,
            variations: Vec::new(),
        }
    }

    /// Create an axis with variations, validating kind consistency.
    ///
    /// Variations are sorted by their stored order so enumeration is
    /// deterministic regardless of fetch order.
    pub fn with_variations(
        element_id: impl Into<String>,
        kind: ElementKind,
        original: VariationValue,
        mut variations: Vec<Variation>,
    ) -> Result<Self> {
        let element_id = element_id.into();
        if !original.matches_kind(kind) {
            return Err(DomainError::ValidationError(format!(
                "original value does not match axis kind {} for element {}",
                kind, element_id
            )));
        }
        for v in &variations {
            if v.kind != kind || !v.value.matches_kind(kind) {
                return Err(DomainError::ValidationError(format!(
                    "variation {} does not match axis kind {} for element {}",
                    v.id, kind, element_id
                )));
            }
        }
        variations.sort_by_key(|v| v.order);
        Ok(Self {
            element_id,
            kind,
            original,
            variations,
        })
    }

    /// Candidate count: original + variations, always >= 1
    pub fn len(&self) -> usize {
        self.variations.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false // original is always present
    }

    /// Whether this axis actually branches (has at least one variation)
    pub fn has_variations(&self) -> bool {
        !self.variations.is_empty()
    }

    /// Candidate value at index; 0 is the original
    pub fn value_at(&self, index: usize) -> Option<&VariationValue> {
        if index == 0 {
            Some(&self.original)
        } else {
            self.variations.get(index - 1).map(|v| &v.value)
        }
    }
}
