//! Template Projector - applies one combination to a cloned template tree
//!
//! The base template is never mutated: projection deep-clones the tree and
//! substitutes each chosen value per kind. Selections resolve against nodes in
//! two stages: exact id match wins; when no node carries the selection's id, a
//! content-based fallback matches the node's current value against the axis's
//! recorded original value. The fallback tolerates id drift after template
//! edits, at the documented cost of false positives when two nodes share
//! identical original content.

use crate::domain::{
    Combination, Descriptor, ElementId, ElementKind, ElementNode, NodeContent, Selection,
    Template, TemplateNode, VariationValue,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Output container format for descriptors (the artifact extension)
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp4";

/// Project one combination onto the template, producing a materialized
/// render descriptor.
///
/// Pure and deterministic: equal inputs produce structurally equal outputs,
/// and the input template is left untouched. Selections referencing elements
/// that no longer exist are skipped with a debug log, never an error.
pub fn project(template: &Template, combination: &Combination) -> Descriptor {
    let mut projected = template.clone();

    // Id drift can leave a selection pointing at nothing; bind each such
    // selection to at most one node up front, so two nodes sharing the same
    // original value cannot both be substituted by one selection.
    let live_ids = template.live_element_ids();
    let fallbacks = bind_fallbacks(template, combination, &live_ids);
    let speed = combination.speed_multiplier();

    apply_nodes(&mut projected.nodes, combination, &fallbacks, speed);

    // Fallback matches can fire on two nodes with identical original content.
    // Flag it; resolution order already picked the first in traversal order.
    warn_on_ambiguous_fallbacks(template, combination, &live_ids);

    for selection in combination.entries() {
        if selection.kind != ElementKind::Speed
            && !live_ids.contains(&selection.element_id)
            && !has_content_match(template, selection)
        {
            debug!(
                element_id = %selection.element_id,
                kind = %selection.kind,
                "projection miss: referenced element absent, skipping"
            );
        }
    }

    Descriptor {
        duration_ms: projected.duration_ms,
        platform: projected.platform.clone(),
        output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        template: projected,
    }
}

type FallbackMap<'a> = HashMap<(ElementId, ElementKind), &'a Selection>;

/// Bind selections whose element id no longer exists to the first node in
/// traversal order whose current value equals the recorded original. At most
/// one node per selection and one selection per (node, kind).
fn bind_fallbacks<'a>(
    template: &Template,
    combination: &'a Combination,
    live_ids: &[String],
) -> FallbackMap<'a> {
    let mut bound: FallbackMap<'a> = HashMap::new();
    for selection in combination.entries() {
        if selection.kind == ElementKind::Speed || live_ids.contains(&selection.element_id) {
            continue;
        }
        let target = template.elements().into_iter().find(|el| {
            el.current_value(selection.kind).as_ref() == Some(&selection.original)
                && !bound.contains_key(&(el.id.clone(), selection.kind))
        });
        if let Some(el) = target {
            bound.insert((el.id.clone(), selection.kind), selection);
        }
    }
    bound
}

fn apply_nodes(
    nodes: &mut [TemplateNode],
    combination: &Combination,
    fallbacks: &FallbackMap<'_>,
    speed: Option<f64>,
) {
    for node in nodes {
        match node {
            TemplateNode::Group { children, .. } => {
                apply_nodes(children, combination, fallbacks, speed)
            }
            TemplateNode::Element(el) => apply_element(el, combination, fallbacks, speed),
        }
    }
}

fn apply_element(
    el: &mut ElementNode,
    combination: &Combination,
    fallbacks: &FallbackMap<'_>,
    speed: Option<f64>,
) {
    // Text and font substitutions target the same node id under distinct keys
    for kind in [el.kind, ElementKind::Font] {
        if kind == ElementKind::Font && !matches!(el.content, NodeContent::Text { .. }) {
            continue;
        }
        if let Some(selection) = resolve(el, kind, combination, fallbacks) {
            substitute(el, &selection.value);
        }
    }

    // Speed is global: rescale every timed node's display window and rate
    if let Some(multiplier) = speed {
        if multiplier > 0.0 {
            if let Some(window) = &mut el.window {
                window.end_ms =
                    window.start_ms + (window.end_ms - window.start_ms) / multiplier;
            }
            if el.window.is_some() {
                el.playback_rate *= multiplier;
            }
        }
    }
}

/// Two-stage selection lookup for one node and one substitution kind.
///
/// Stage 1: selection whose element_id equals the node id.
/// Stage 2: the pre-bound content fallback for this node, if this node was
/// the first traversal-order match for a drifted selection.
fn resolve<'a>(
    el: &ElementNode,
    kind: ElementKind,
    combination: &'a Combination,
    fallbacks: &FallbackMap<'a>,
) -> Option<&'a Selection> {
    if let Some(selection) = combination.get(&el.id, kind) {
        return Some(selection);
    }
    fallbacks.get(&(el.id.clone(), kind)).copied()
}

fn substitute(el: &mut ElementNode, value: &VariationValue) {
    match (&mut el.content, value) {
        (NodeContent::Text { text, .. }, VariationValue::Text { text: new_text }) => {
            *text = new_text.clone();
        }
        (NodeContent::Text { font, .. }, VariationValue::Font { font: new_font }) => {
            *font = new_font.clone();
        }
        (NodeContent::Media { src }, VariationValue::Media { src: new_src }) => {
            *src = new_src.clone();
        }
        // Kind-mismatched values never reach here via resolve(); ignore
        _ => {}
    }
}

fn has_content_match(template: &Template, selection: &Selection) -> bool {
    template
        .elements()
        .iter()
        .any(|el| el.current_value(selection.kind).as_ref() == Some(&selection.original))
}

fn warn_on_ambiguous_fallbacks(
    template: &Template,
    combination: &Combination,
    live_ids: &[String],
) {
    for selection in combination.entries() {
        if selection.kind == ElementKind::Speed || live_ids.contains(&selection.element_id) {
            continue;
        }
        let matches: Vec<&str> = template
            .elements()
            .iter()
            .filter(|el| el.current_value(selection.kind).as_ref() == Some(&selection.original))
            .map(|el| el.id.as_str())
            .collect();
        if matches.len() > 1 {
            warn!(
                element_id = %selection.element_id,
                candidates = ?matches,
                "content fallback is ambiguous: multiple nodes share the original value, \
                 first in traversal order wins"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FontSpec, Selection, TimeWindow};

    fn font(family: &str, size: f64) -> FontSpec {
        FontSpec {
            family: family.to_string(),
            size,
        }
    }

    fn text_node(id: &str, text: &str) -> TemplateNode {
        TemplateNode::Element(ElementNode {
            id: id.to_string(),
            kind: ElementKind::Text,
            content: NodeContent::Text {
                text: text.to_string(),
                font: font("Inter", 24.0),
            },
            window: None,
            playback_rate: 1.0,
        })
    }

    fn video_node(id: &str, src: &str, start: f64, end: f64) -> TemplateNode {
        TemplateNode::Element(ElementNode {
            id: id.to_string(),
            kind: ElementKind::Video,
            content: NodeContent::Media {
                src: src.to_string(),
            },
            window: Some(TimeWindow {
                start_ms: start,
                end_ms: end,
            }),
            playback_rate: 1.0,
        })
    }

    fn template(nodes: Vec<TemplateNode>) -> Template {
        Template {
            id: "tpl-1".to_string(),
            project: "demo".to_string(),
            platform: Some("landscape".to_string()),
            duration_ms: 10_000.0,
            nodes,
        }
    }

    fn selection(element_id: &str, kind: ElementKind, value: VariationValue) -> Selection {
        let original = match kind {
            ElementKind::Text => VariationValue::Text {
                text: "orig".to_string(),
            },
            ElementKind::Speed => VariationValue::Speed { multiplier: 1.0 },
            ElementKind::Font => VariationValue::Font {
                font: font("Inter", 24.0),
            },
            _ => VariationValue::Media {
                src: "orig.bin".to_string(),
            },
        };
        Selection {
            element_id: element_id.to_string(),
            kind,
            index: 1,
            axis_len: 2,
            value,
            original,
        }
    }

    fn first_element(descriptor: &Descriptor) -> &ElementNode {
        match &descriptor.template.nodes[0] {
            TemplateNode::Element(el) => el,
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn test_project_never_mutates_input() {
        let tpl = template(vec![text_node("t1", "hello")]);
        let before = tpl.clone();

        let mut combo = Combination::new();
        combo.push(selection(
            "t1",
            ElementKind::Text,
            VariationValue::Text {
                text: "replaced".to_string(),
            },
        ));
        let _ = project(&tpl, &combo);
        assert_eq!(tpl, before);
    }

    #[test]
    fn test_project_is_deterministic() {
        let tpl = template(vec![text_node("t1", "hello"), video_node("v1", "a.mp4", 0.0, 4000.0)]);
        let mut combo = Combination::new();
        combo.push(selection(
            "t1",
            ElementKind::Text,
            VariationValue::Text {
                text: "replaced".to_string(),
            },
        ));
        assert_eq!(project(&tpl, &combo), project(&tpl, &combo));
    }

    #[test]
    fn test_text_substitution() {
        let tpl = template(vec![text_node("t1", "hello")]);
        let mut combo = Combination::new();
        combo.push(selection(
            "t1",
            ElementKind::Text,
            VariationValue::Text {
                text: "goodbye".to_string(),
            },
        ));
        let descriptor = project(&tpl, &combo);
        match &first_element(&descriptor).content {
            NodeContent::Text { text, .. } => assert_eq!(text, "goodbye"),
            _ => panic!("expected text content"),
        }
    }

    #[test]
    fn test_text_and_font_coexist_on_same_node() {
        let tpl = template(vec![text_node("t1", "hello")]);
        let mut combo = Combination::new();
        combo.push(selection(
            "t1",
            ElementKind::Text,
            VariationValue::Text {
                text: "restyled".to_string(),
            },
        ));
        combo.push(selection(
            "t1",
            ElementKind::Font,
            VariationValue::Font {
                font: font("Futura", 48.0),
            },
        ));
        let descriptor = project(&tpl, &combo);
        match &first_element(&descriptor).content {
            NodeContent::Text { text, font } => {
                assert_eq!(text, "restyled");
                assert_eq!(font.family, "Futura");
                assert_eq!(font.size, 48.0);
            }
            _ => panic!("expected text content"),
        }
    }

    #[test]
    fn test_media_substitution_in_nested_group() {
        let tpl = template(vec![TemplateNode::Group {
            id: "g1".to_string(),
            children: vec![TemplateNode::Group {
                id: "g2".to_string(),
                children: vec![video_node("v1", "a.mp4", 0.0, 4000.0)],
            }],
        }]);
        let mut combo = Combination::new();
        combo.push(selection(
            "v1",
            ElementKind::Video,
            VariationValue::Media {
                src: "b.mp4".to_string(),
            },
        ));
        let descriptor = project(&tpl, &combo);
        let el = match &descriptor.template.nodes[0] {
            TemplateNode::Group { children, .. } => match &children[0] {
                TemplateNode::Group { children, .. } => match &children[0] {
                    TemplateNode::Element(el) => el,
                    _ => panic!(),
                },
                _ => panic!(),
            },
            _ => panic!(),
        };
        match &el.content {
            NodeContent::Media { src } => assert_eq!(src, "b.mp4"),
            _ => panic!("expected media content"),
        }
    }

    #[test]
    fn test_speed_rescales_every_timed_node() {
        let tpl = template(vec![
            video_node("v1", "a.mp4", 0.0, 4000.0),
            video_node("v2", "b.mp4", 1000.0, 9000.0),
            text_node("t1", "untimed"),
        ]);
        let mut combo = Combination::new();
        combo.push(selection(
            "speed-1",
            ElementKind::Speed,
            VariationValue::Speed { multiplier: 2.0 },
        ));
        let descriptor = project(&tpl, &combo);

        let windows: Vec<(f64, f64, f64)> = descriptor
            .template
            .elements()
            .iter()
            .filter_map(|el| el.window.map(|w| (w.start_ms, w.end_ms, el.playback_rate)))
            .collect();
        // newEnd = start + (end - start) / s, rate multiplied, on every timed node
        assert_eq!(windows, vec![(0.0, 2000.0, 2.0), (1000.0, 5000.0, 2.0)]);
    }

    #[test]
    fn test_missing_element_is_soft_failed() {
        let tpl = template(vec![text_node("t1", "hello")]);
        let mut combo = Combination::new();
        combo.push(selection(
            "ghost",
            ElementKind::Text,
            VariationValue::Text {
                text: "never lands".to_string(),
            },
        ));
        let descriptor = project(&tpl, &combo);
        // Unmatched node passes through untouched, no panic, no error
        match &first_element(&descriptor).content {
            NodeContent::Text { text, .. } => assert_eq!(text, "hello"),
            _ => panic!(),
        }
    }

    #[test]
    fn test_content_fallback_on_id_drift() {
        // Axis was recorded against id "old", the editor re-created the node
        // as "new" with identical content. Fallback matches by original value.
        let tpl = template(vec![text_node("new", "orig")]);
        let mut combo = Combination::new();
        combo.push(selection(
            "old",
            ElementKind::Text,
            VariationValue::Text {
                text: "recovered".to_string(),
            },
        ));
        let descriptor = project(&tpl, &combo);
        match &first_element(&descriptor).content {
            NodeContent::Text { text, .. } => assert_eq!(text, "recovered"),
            _ => panic!(),
        }
    }

    #[test]
    fn test_content_fallback_substitutes_only_first_match() {
        // Both nodes carry the original content; the drifted selection lands
        // on the first in traversal order and the second stays untouched.
        let tpl = template(vec![text_node("a", "orig"), text_node("b", "orig")]);
        let mut combo = Combination::new();
        combo.push(selection(
            "gone",
            ElementKind::Text,
            VariationValue::Text {
                text: "swapped".to_string(),
            },
        ));
        let descriptor = project(&tpl, &combo);
        let texts: Vec<String> = descriptor
            .template
            .elements()
            .iter()
            .map(|el| match &el.content {
                NodeContent::Text { text, .. } => text.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(texts, vec!["swapped".to_string(), "orig".to_string()]);
    }

    #[test]
    fn test_id_match_wins_over_content_fallback() {
        // "t1" matches by id; the second node shares the original content but
        // must not be touched because the id match exists.
        let tpl = template(vec![text_node("t1", "orig"), text_node("t2", "orig")]);
        let mut combo = Combination::new();
        combo.push(selection(
            "t1",
            ElementKind::Text,
            VariationValue::Text {
                text: "only here".to_string(),
            },
        ));
        let descriptor = project(&tpl, &combo);
        let texts: Vec<String> = descriptor
            .template
            .elements()
            .iter()
            .map(|el| match &el.content {
                NodeContent::Text { text, .. } => text.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(texts, vec!["only here".to_string(), "orig".to_string()]);
    }

    #[test]
    fn test_empty_combination_is_identity() {
        let tpl = template(vec![
            text_node("t1", "hello"),
            video_node("v1", "a.mp4", 0.0, 4000.0),
        ]);
        let descriptor = project(&tpl, &Combination::new());
        assert_eq!(descriptor.template, tpl);
        assert_eq!(descriptor.duration_ms, tpl.duration_ms);
    }
}
