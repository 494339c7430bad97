//! Axis Service - builds variation axes from the template and the store
//!
//! Orphaned variations (element id no longer in the template) are excluded
//! from axis construction, never silently combined. A cleanup sweep pushes the
//! current live ids to the store so it can drop them for good.

use crate::domain::{
    Axis, ElementKind, ElementNode, NodeContent, Template, SPEED_ELEMENT_ID,
};
use crate::error::Result;
use crate::port::{AxisRecord, VariationStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AxisService {
    store: Arc<dyn VariationStore>,
}

/// Axis kinds an element can carry: its own kind, plus font for text nodes
fn applicable_kinds(element: &ElementNode) -> Vec<ElementKind> {
    let mut kinds = vec![element.kind];
    if matches!(element.content, NodeContent::Text { .. }) {
        kinds.push(ElementKind::Font);
    }
    kinds
}

impl AxisService {
    pub fn new(store: Arc<dyn VariationStore>) -> Self {
        Self { store }
    }

    /// Build axes for every (template element, kind) pair with a stored
    /// variation record, plus the template-wide speed axis if one is stored.
    ///
    /// Elements with no record contribute no axis (they are static). Records
    /// whose element id is not in the template are orphans and are skipped,
    /// as are records whose kind does not apply to their element. Axis order
    /// is deterministic: template traversal order, element kind before font,
    /// speed last.
    pub async fn load_axes(&self, project: &str, template: &Template) -> Result<Vec<Axis>> {
        let mut axes = Vec::new();

        for element in template.elements() {
            let records = self.store.fetch(project, &element.id).await?;
            let kinds = applicable_kinds(element);

            for record in &records {
                if !kinds.contains(&record.kind) {
                    warn!(
                        element_id = %element.id,
                        kind = %record.kind,
                        "variation record kind does not apply to its element, skipping"
                    );
                }
            }

            for kind in kinds {
                let Some(record) = records.iter().find(|r| r.kind == kind) else {
                    continue;
                };
                let axis = build_axis(record)?;
                debug!(
                    element_id = %axis.element_id,
                    kind = %axis.kind,
                    candidates = axis.len(),
                    "axis loaded"
                );
                axes.push(axis);
            }
        }

        // The speed axis spans the whole template and rides under a synthetic
        // element id no node carries
        let speed_records = self
            .store
            .fetch(project, &SPEED_ELEMENT_ID.to_string())
            .await?;
        if let Some(record) = speed_records.iter().find(|r| r.kind == ElementKind::Speed) {
            axes.push(build_axis(record)?);
        }

        info!(project = %project, axes = axes.len(), "axes built from template");
        Ok(axes)
    }

    /// Delete variations referencing elements no longer present in the
    /// template. Returns the number removed.
    pub async fn cleanup_orphans(&self, project: &str, template: &Template) -> Result<u64> {
        let mut live_ids = template.live_element_ids();
        // The synthetic speed id never appears in the tree but is not an orphan
        live_ids.push(SPEED_ELEMENT_ID.to_string());
        let removed = self.store.cleanup_orphans(project, &live_ids).await?;
        if removed > 0 {
            info!(project = %project, removed = removed, "orphaned variations removed");
        }
        Ok(removed)
    }
}

fn build_axis(record: &AxisRecord) -> Result<Axis> {
    Ok(Axis::with_variations(
        record.element_id.clone(),
        record.kind,
        record.original_value.clone(),
        record.variations.clone(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ElementKind, ElementNode, FontSpec, NodeContent, TemplateNode, Variation, VariationValue,
    };
    use crate::port::variation_store::mocks::InMemoryVariationStore;
    use crate::port::AxisRecord;

    fn text_node(id: &str, text: &str) -> TemplateNode {
        TemplateNode::Element(ElementNode {
            id: id.to_string(),
            kind: ElementKind::Text,
            content: NodeContent::Text {
                text: text.to_string(),
                font: FontSpec {
                    family: "Inter".to_string(),
                    size: 24.0,
                },
            },
            window: None,
            playback_rate: 1.0,
        })
    }

    fn template(nodes: Vec<TemplateNode>) -> Template {
        Template {
            id: "tpl".to_string(),
            project: "demo".to_string(),
            platform: None,
            duration_ms: 1000.0,
            nodes,
        }
    }

    fn text_record(element_id: &str, original: &str, alts: &[&str]) -> AxisRecord {
        AxisRecord {
            element_id: element_id.to_string(),
            kind: ElementKind::Text,
            original_value: VariationValue::Text {
                text: original.to_string(),
            },
            variations: alts
                .iter()
                .enumerate()
                .map(|(i, alt)| Variation {
                    id: format!("{}-v{}", element_id, i + 1),
                    element_id: element_id.to_string(),
                    kind: ElementKind::Text,
                    value: VariationValue::Text {
                        text: alt.to_string(),
                    },
                    order: i as i32 + 1,
                })
                .collect(),
        }
    }

    fn font_record(element_id: &str) -> AxisRecord {
        AxisRecord {
            element_id: element_id.to_string(),
            kind: ElementKind::Font,
            original_value: VariationValue::Font {
                font: FontSpec {
                    family: "Inter".to_string(),
                    size: 24.0,
                },
            },
            variations: vec![Variation {
                id: format!("{}-f1", element_id),
                element_id: element_id.to_string(),
                kind: ElementKind::Font,
                value: VariationValue::Font {
                    font: FontSpec {
                        family: "Futura".to_string(),
                        size: 48.0,
                    },
                },
                order: 1,
            }],
        }
    }

    fn speed_record() -> AxisRecord {
        AxisRecord {
            element_id: SPEED_ELEMENT_ID.to_string(),
            kind: ElementKind::Speed,
            original_value: VariationValue::Speed { multiplier: 1.0 },
            variations: vec![Variation {
                id: "speed-v1".to_string(),
                element_id: SPEED_ELEMENT_ID.to_string(),
                kind: ElementKind::Speed,
                value: VariationValue::Speed { multiplier: 2.0 },
                order: 1,
            }],
        }
    }

    #[tokio::test]
    async fn test_load_axes_skips_elements_without_records() {
        let store = Arc::new(InMemoryVariationStore::new());
        store.seed(text_record("t1", "hello", &["hi"]));

        let service = AxisService::new(store);
        let tpl = template(vec![text_node("t1", "hello"), text_node("t2", "static")]);

        let axes = service.load_axes("demo", &tpl).await.unwrap();
        assert_eq!(axes.len(), 1);
        assert_eq!(axes[0].element_id, "t1");
        assert_eq!(axes[0].len(), 2);
    }

    #[tokio::test]
    async fn test_text_and_font_records_coexist_on_one_element() {
        let store = Arc::new(InMemoryVariationStore::new());
        store.seed(text_record("t1", "hello", &["hi"]));
        store.seed(font_record("t1"));

        let service = AxisService::new(store);
        let tpl = template(vec![text_node("t1", "hello")]);

        let axes = service.load_axes("demo", &tpl).await.unwrap();
        assert_eq!(axes.len(), 2);
        assert_eq!(axes[0].kind, ElementKind::Text);
        assert_eq!(axes[1].kind, ElementKind::Font);
        assert_eq!(axes[1].element_id, "t1");
    }

    #[tokio::test]
    async fn test_speed_record_builds_template_wide_axis() {
        let store = Arc::new(InMemoryVariationStore::new());
        store.seed(text_record("t1", "hello", &["hi"]));
        store.seed(speed_record());

        let service = AxisService::new(store);
        let tpl = template(vec![text_node("t1", "hello")]);

        let axes = service.load_axes("demo", &tpl).await.unwrap();
        assert_eq!(axes.len(), 2);
        let speed = axes.last().unwrap();
        assert_eq!(speed.kind, ElementKind::Speed);
        assert_eq!(speed.element_id, SPEED_ELEMENT_ID);
        assert_eq!(speed.len(), 2);
    }

    #[tokio::test]
    async fn test_inapplicable_kind_record_skipped_not_error() {
        let store = Arc::new(InMemoryVariationStore::new());
        // A media record stored against a text element: wrong kind, not fatal
        store.seed(AxisRecord {
            element_id: "t1".to_string(),
            kind: ElementKind::Image,
            original_value: VariationValue::Media {
                src: "a.png".to_string(),
            },
            variations: vec![],
        });

        let service = AxisService::new(store);
        let tpl = template(vec![text_node("t1", "hello")]);

        let axes = service.load_axes("demo", &tpl).await.unwrap();
        assert!(axes.is_empty());
    }

    #[tokio::test]
    async fn test_orphaned_record_excluded_from_axes() {
        let store = Arc::new(InMemoryVariationStore::new());
        // Record for an element the template no longer contains
        store.seed(text_record("deleted", "gone", &["never"]));
        store.seed(text_record("t1", "hello", &["hi"]));

        let service = AxisService::new(store);
        let tpl = template(vec![text_node("t1", "hello")]);

        let axes = service.load_axes("demo", &tpl).await.unwrap();
        assert_eq!(axes.len(), 1);
        assert_eq!(axes[0].element_id, "t1");
    }

    #[tokio::test]
    async fn test_cleanup_orphans_reports_removed_count() {
        let store = Arc::new(InMemoryVariationStore::new());
        store.seed(text_record("deleted", "gone", &["a", "b"]));
        store.seed(text_record("t1", "hello", &["hi"]));

        let service = AxisService::new(store);
        let tpl = template(vec![text_node("t1", "hello")]);

        let removed = service.cleanup_orphans("demo", &tpl).await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_cleanup_never_drops_the_speed_record() {
        let store = Arc::new(InMemoryVariationStore::new());
        store.seed(speed_record());
        store.seed(text_record("deleted", "gone", &["a"]));

        let service = AxisService::new(store.clone());
        let tpl = template(vec![text_node("t1", "hello")]);

        let removed = service.cleanup_orphans("demo", &tpl).await.unwrap();
        assert_eq!(removed, 1);

        let axes = service.load_axes("demo", &tpl).await.unwrap();
        assert_eq!(axes.len(), 1);
        assert_eq!(axes[0].kind, ElementKind::Speed);
    }
}
