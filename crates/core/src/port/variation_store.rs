// Variation Store Port
// Abstraction over the external variation persistence API

use crate::domain::{ElementId, ElementKind, Variation, VariationValue};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted variation record for one element and one axis kind. A text node
/// can carry both a text record and a font record under the same element id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisRecord {
    pub element_id: ElementId,
    pub kind: ElementKind,
    pub original_value: VariationValue,
    pub variations: Vec<Variation>,
}

/// Variation persistence interface. Records are keyed by project + element
/// id + kind; fetch returns everything stored against one element.
#[async_trait]
pub trait VariationStore: Send + Sync {
    /// All variation records attached to one element, at most one per kind
    /// (empty when the element was never varied)
    async fn fetch(&self, project: &str, element_id: &ElementId) -> Result<Vec<AxisRecord>>;

    /// Create or replace a variation
    async fn save(&self, project: &str, variation: &Variation) -> Result<()>;

    /// Delete a single variation
    async fn delete(&self, project: &str, variation_id: &str) -> Result<()>;

    /// Delete variations referencing element ids no longer present in the
    /// template. Returns the number of variations removed.
    async fn cleanup_orphans(&self, project: &str, live_ids: &[ElementId]) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory variation store for axis-service tests
    #[derive(Default)]
    pub struct InMemoryVariationStore {
        records: Mutex<HashMap<(ElementId, ElementKind), AxisRecord>>,
    }

    impl InMemoryVariationStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, record: AxisRecord) {
            self.records
                .lock()
                .unwrap()
                .insert((record.element_id.clone(), record.kind), record);
        }
    }

    #[async_trait]
    impl VariationStore for InMemoryVariationStore {
        async fn fetch(&self, _project: &str, element_id: &ElementId) -> Result<Vec<AxisRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .values()
                .filter(|r| &r.element_id == element_id)
                .cloned()
                .collect())
        }

        async fn save(&self, _project: &str, variation: &Variation) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(record) =
                records.get_mut(&(variation.element_id.clone(), variation.kind))
            {
                record.variations.retain(|v| v.id != variation.id);
                record.variations.push(variation.clone());
            }
            Ok(())
        }

        async fn delete(&self, _project: &str, variation_id: &str) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            for record in records.values_mut() {
                record.variations.retain(|v| v.id != variation_id);
            }
            Ok(())
        }

        async fn cleanup_orphans(&self, _project: &str, live_ids: &[ElementId]) -> Result<u64> {
            let mut records = self.records.lock().unwrap();
            let before: usize = records.values().map(|r| r.variations.len()).sum();
            records.retain(|(id, _), _| live_ids.contains(id));
            let after: usize = records.values().map(|r| r.variations.len()).sum();
            Ok((before - after) as u64)
        }
    }
}
