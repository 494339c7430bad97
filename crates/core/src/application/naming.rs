//! Naming Resolver - deterministic, collision-free filename per combination
//!
//! Default scheme: one `<marker>-<kind>` token per axis that actually
//! branches, `M` for the original candidate, markers from a configurable
//! sequence otherwise. An alternate mode renders a user-defined format string
//! with placeholders. Never fails; always returns a filesystem-safe string.

use crate::domain::{Combination, ElementKind, Selection, Template, VariationValue};

/// Placeholder fallback token used when a format string references something
/// the combination does not carry
pub const DEFAULT_TOKEN: &str = "default";

const TOKEN_SEPARATOR: &str = "_";
const ORIGINAL_MARKER: &str = "M";

/// Marker sequence for non-original candidates
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MarkerStyle {
    /// V1, V2, V3, ...
    #[default]
    Numeric,
    /// a, b, c, ...
    LowerAlpha,
    /// A, B, C, ...
    UpperAlpha,
    /// I, II, III, ...
    Roman,
    /// User-supplied sequence; falls back to numeric when exhausted
    Custom(Vec<String>),
}

impl MarkerStyle {
    /// Marker for the nth variation (n >= 1; 0 is the original's `M`)
    fn marker(&self, n: usize) -> String {
        match self {
            MarkerStyle::Numeric => format!("V{}", n),
            MarkerStyle::LowerAlpha => alpha_marker(n, b'a'),
            MarkerStyle::UpperAlpha => alpha_marker(n, b'A'),
            MarkerStyle::Roman => roman_marker(n),
            MarkerStyle::Custom(seq) => seq
                .get(n - 1)
                .cloned()
                .unwrap_or_else(|| format!("V{}", n)),
        }
    }
}

// 1 -> a, 26 -> z, 27 -> aa (bijective base 26)
fn alpha_marker(mut n: usize, base: u8) -> String {
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(base + (n % 26) as u8);
        n /= 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_else(|_| format!("V{}", n))
}

fn roman_marker(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, numeral) in TABLE {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Naming configuration
#[derive(Debug, Clone, Default)]
pub struct NamingConfig {
    /// Sanitized and prefixed before the tokens; empty means no prefix
    pub project_name: String,
    pub marker_style: MarkerStyle,
    /// Artifact extension appended when missing (without the dot)
    pub extension: String,
    /// When set, placeholders are rendered instead of the default scheme
    pub format: Option<String>,
}

impl NamingConfig {
    pub fn new(project_name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            marker_style: MarkerStyle::default(),
            extension: extension.into(),
            format: None,
        }
    }
}

/// Resolve the output filename for one combination.
///
/// Axes with no effective variation are omitted entirely rather than emitting
/// an `M` token, so a combination selecting only originals across static axes
/// carries no variation tokens at all.
pub fn resolve_name(
    combination: &Combination,
    config: &NamingConfig,
    template: &Template,
) -> String {
    let stem = match &config.format {
        Some(format) => render_format(format, combination, config, template),
        None => default_scheme(combination, config),
    };

    let mut name = sanitize(&stem);
    if name.is_empty() {
        name = DEFAULT_TOKEN.to_string();
    }
    if !config.extension.is_empty() && !name.ends_with(&format!(".{}", config.extension)) {
        name.push('.');
        name.push_str(&config.extension);
    }
    name
}

fn default_scheme(combination: &Combination, config: &NamingConfig) -> String {
    let mut parts: Vec<String> = Vec::new();
    let prefix = sanitize(&config.project_name);
    if !prefix.is_empty() {
        parts.push(prefix);
    }

    for selection in combination.entries() {
        // An axis that never branched (original only) emits nothing
        if !selection_has_alternatives(selection) {
            continue;
        }
        let marker = if selection.is_original() {
            ORIGINAL_MARKER.to_string()
        } else {
            config.marker_style.marker(selection.index)
        };
        parts.push(format!("{}-{}", marker, selection.kind));
    }

    parts.join(TOKEN_SEPARATOR)
}

// An axis branched iff it had at least one variation beside the original
fn selection_has_alternatives(selection: &Selection) -> bool {
    selection.axis_len > 1
}

fn render_format(
    format: &str,
    combination: &Combination,
    config: &NamingConfig,
    template: &Template,
) -> String {
    let mut out = format.to_string();

    let replace = |out: &mut String, key: &str, value: Option<String>| {
        let placeholder = format!("{{{}}}", key);
        if out.contains(&placeholder) {
            let value = value.unwrap_or_else(|| DEFAULT_TOKEN.to_string());
            *out = out.replace(&placeholder, &value);
        }
    };

    replace(&mut out, "project", non_empty(&config.project_name));
    replace(&mut out, "text", primary_text(combination, template));
    replace(
        &mut out,
        "speed",
        combination
            .speed_multiplier()
            .map(|s| format!("{}", s)),
    );
    replace(&mut out, "font", font_field(combination, |f| f.family.clone()));
    replace(
        &mut out,
        "font_size",
        font_field(combination, |f| format!("{}", f.size)),
    );
    replace(&mut out, "tokens", Some(default_scheme(combination, config)));

    out
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// First text value the combination selects, else the template's first text node
fn primary_text(combination: &Combination, template: &Template) -> Option<String> {
    combination
        .entries()
        .iter()
        .find_map(|s| match &s.value {
            VariationValue::Text { text } if s.kind == ElementKind::Text => Some(text.clone()),
            _ => None,
        })
        .or_else(|| {
            template.elements().iter().find_map(|el| {
                el.current_value(ElementKind::Text).and_then(|v| match v {
                    VariationValue::Text { text } => Some(text),
                    _ => None,
                })
            })
        })
}

fn font_field(
    combination: &Combination,
    f: impl Fn(&crate::domain::FontSpec) -> String,
) -> Option<String> {
    combination.entries().iter().find_map(|s| match &s.value {
        VariationValue::Font { font } if s.kind == ElementKind::Font => Some(f(font)),
        _ => None,
    })
}

/// Whitelist sanitizer: keep alphanumerics, dash, underscore, dot; everything
/// else becomes a dash. Leading/trailing separators are trimmed.
fn sanitize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    cleaned.trim_matches(['-', '.']).to_string()
}
