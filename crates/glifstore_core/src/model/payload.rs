//! Outline payload shape and derived-property extraction.
//!
//! # Responsibility
//! - Define the structured outline content stored in a glif `data` column.
//! - Derive name, filename, unicode list, flags and component references.
//!
//! # Invariants
//! - Derivation is a pure function of the payload: the same payload always
//!   yields the same `DerivedGlif`.
//! - `components` keeps first-occurrence order and contains no duplicates.

use crate::model::glif::{ComponentRef, GlifKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

const GLIF_SUFFIX: &str = ".glif";
const MAX_FILENAME_CHARS: usize = 255;
const ILLEGAL_FILENAME_CHARS: &[char] = &[
    '"', '*', '+', '/', ':', '<', '>', '?', '[', '\\', ']', '|',
];
const RESERVED_FILENAMES: &[&str] = &[
    "con", "prn", "aux", "clock$", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7",
    "com8", "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// One on-curve or off-curve point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// `line`, `curve`, `qcurve`, `move` or `None` for off-curve points.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub segment_type: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub smooth: bool,
}

/// Closed or open contour.
pub type Contour = Vec<Point>;

/// Named attachment point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

/// Variation axis declared by the glif.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub default: f64,
}

/// Component placement inside a glif outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedComponent {
    pub kind: GlifKind,
    pub name: String,
    /// Axis coordinates of the referenced glif at this placement.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub coord: BTreeMap<String, f64>,
}

/// Structured outline content of a glif or layer.
///
/// Produced by the external import pipeline; the core never interprets
/// geometry beyond the markers needed for derived flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlifPayload {
    pub name: String,
    #[serde(default)]
    pub unicodes: Vec<u32>,
    #[serde(default)]
    pub contours: Vec<Contour>,
    #[serde(default)]
    pub components: Vec<PlacedComponent>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub axes: Vec<Axis>,
}

impl GlifPayload {
    /// Creates an empty payload with only a glyph name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Boolean properties computed from a payload. Never independently writable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFlags {
    pub is_empty: bool,
    pub has_unicode: bool,
    pub has_variation_axis: bool,
    pub has_outlines: bool,
    pub has_components: bool,
}

/// Everything a glif stores that is derived from its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedGlif {
    pub name: String,
    pub filename: String,
    pub unicode_hex: String,
    pub flags: DerivedFlags,
    pub components: Vec<ComponentRef>,
}

/// Payload rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Glyph name is blank after trim.
    EmptyName,
    /// Codepoint is outside Unicode scalar range.
    InvalidCodepoint(u32),
    /// Component entry with a blank target name.
    EmptyComponentName,
    /// Payload text is not valid JSON for `GlifPayload`.
    Malformed(String),
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "glif payload name must not be blank"),
            Self::InvalidCodepoint(value) => write!(f, "invalid unicode codepoint: {value:#X}"),
            Self::EmptyComponentName => write!(f, "component reference name must not be blank"),
            Self::Malformed(message) => write!(f, "malformed glif payload: {message}"),
        }
    }
}

impl Error for PayloadError {}

/// Parses payload JSON text.
pub fn parse_payload(text: &str) -> Result<GlifPayload, PayloadError> {
    serde_json::from_str(text).map_err(|err| PayloadError::Malformed(err.to_string()))
}

/// Derives name, filename, flags and references from a payload.
///
/// # Errors
/// - `EmptyName` when the payload name is blank.
/// - `InvalidCodepoint` for surrogates or values above `U+10FFFF`.
/// - `EmptyComponentName` for a component with a blank target.
pub fn derive(payload: &GlifPayload) -> Result<DerivedGlif, PayloadError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(PayloadError::EmptyName);
    }

    for codepoint in &payload.unicodes {
        if char::from_u32(*codepoint).is_none() {
            return Err(PayloadError::InvalidCodepoint(*codepoint));
        }
    }

    let mut seen = HashSet::new();
    let mut components = Vec::new();
    for placed in &payload.components {
        let target = placed.name.trim();
        if target.is_empty() {
            return Err(PayloadError::EmptyComponentName);
        }
        let reference = ComponentRef::new(placed.kind, target);
        if seen.insert(reference.clone()) {
            components.push(reference);
        }
    }

    let has_outlines = !payload.contours.is_empty();
    let has_components = !components.is_empty();
    let flags = DerivedFlags {
        is_empty: !has_outlines && !has_components && payload.anchors.is_empty(),
        has_unicode: !payload.unicodes.is_empty(),
        has_variation_axis: !payload.axes.is_empty()
            || payload
                .components
                .iter()
                .any(|placed| !placed.coord.is_empty()),
        has_outlines,
        has_components,
    };

    Ok(DerivedGlif {
        name: name.to_string(),
        filename: user_name_to_filename(name),
        unicode_hex: unicode_hex(&payload.unicodes),
        flags,
        components,
    })
}

/// Formats codepoints as comma-separated uppercase hex (`4E00,4E01`).
pub fn unicode_hex(unicodes: &[u32]) -> String {
    unicodes
        .iter()
        .map(|value| format!("{value:04X}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Maps a glyph name to its `.glif` file name (UFO naming convention).
///
/// Uppercase letters get a trailing `_` so names differing only in case do
/// not collide on case-insensitive file systems.
pub fn user_name_to_filename(name: &str) -> String {
    let max_chars = MAX_FILENAME_CHARS - GLIF_SUFFIX.len();
    let mut escaped = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if index == 0 && ch == '.' {
            escaped.push('_');
        } else if ch.is_control() || ILLEGAL_FILENAME_CHARS.contains(&ch) {
            escaped.push('_');
        } else if ch.is_uppercase() {
            escaped.push(ch);
            escaped.push('_');
        } else {
            escaped.push(ch);
        }
    }

    let parts = escaped
        .split('.')
        .map(|part| {
            if RESERVED_FILENAMES.contains(&part.to_lowercase().as_str()) {
                format!("_{part}")
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>();
    let mut stem = parts.join(".");
    if stem.chars().count() > max_chars {
        stem = stem.chars().take(max_chars).collect();
    }
    format!("{stem}{GLIF_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::{derive, parse_payload, user_name_to_filename, GlifPayload, PayloadError};

    fn payload(json: &str) -> GlifPayload {
        parse_payload(json).expect("test payload should parse")
    }

    #[test]
    fn empty_payload_is_flagged_empty() {
        let derived = derive(&GlifPayload::named("uni4E00")).unwrap();
        assert!(derived.flags.is_empty);
        assert!(!derived.flags.has_unicode);
        assert!(!derived.flags.has_outlines);
        assert!(derived.components.is_empty());
        assert_eq!(derived.unicode_hex, "");
    }

    #[test]
    fn contour_and_unicode_set_flags() {
        let derived = derive(&payload(
            r#"{"name":"uni4E00","unicodes":[19968],
                "contours":[[{"x":0,"y":0,"type":"line"},{"x":10,"y":0,"type":"line"}]]}"#,
        ))
        .unwrap();
        assert!(derived.flags.has_outlines);
        assert!(derived.flags.has_unicode);
        assert!(!derived.flags.is_empty);
        assert!(!derived.flags.has_variation_axis);
        assert_eq!(derived.unicode_hex, "4E00");
    }

    #[test]
    fn anchors_alone_make_glif_non_empty() {
        let derived = derive(&payload(
            r#"{"name":"a","anchors":[{"name":"top","x":1,"y":2}]}"#,
        ))
        .unwrap();
        assert!(!derived.flags.is_empty);
        assert!(!derived.flags.has_outlines);
    }

    #[test]
    fn components_are_deduplicated_in_order() {
        let derived = derive(&payload(
            r#"{"name":"uni4E01","components":[
                {"kind":"deep_component","name":"DC_b","coord":{"wght":0.5}},
                {"kind":"deep_component","name":"DC_a"},
                {"kind":"deep_component","name":"DC_b"}]}"#,
        ))
        .unwrap();
        let names = derived
            .components
            .iter()
            .map(|reference| reference.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["DC_b", "DC_a"]);
        assert!(derived.flags.has_components);
        assert!(derived.flags.has_variation_axis);
    }

    #[test]
    fn derivation_is_idempotent() {
        let source = payload(r#"{"name":"x","unicodes":[120],"axes":[{"name":"wght","min":0,"max":1}]}"#);
        assert_eq!(derive(&source).unwrap(), derive(&source).unwrap());
    }

    #[test]
    fn rejects_blank_name_and_bad_codepoints() {
        assert_eq!(
            derive(&GlifPayload::named("  ")).unwrap_err(),
            PayloadError::EmptyName
        );
        let mut bad = GlifPayload::named("x");
        bad.unicodes = vec![0xD800];
        assert_eq!(
            derive(&bad).unwrap_err(),
            PayloadError::InvalidCodepoint(0xD800)
        );
    }

    #[test]
    fn filenames_follow_ufo_convention() {
        assert_eq!(user_name_to_filename("a"), "a.glif");
        assert_eq!(user_name_to_filename("A"), "A_.glif");
        assert_eq!(user_name_to_filename("AE"), "A_E_.glif");
        assert_eq!(user_name_to_filename(".notdef"), "_notdef.glif");
        assert_eq!(user_name_to_filename("a/b"), "a_b.glif");
        assert_eq!(user_name_to_filename("con"), "_con.glif");
        assert_eq!(user_name_to_filename("uni4E00"), "uni4E_00.glif");
    }
}
