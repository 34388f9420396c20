//! Generic composable glif record.
//!
//! # Responsibility
//! - Define the three glif kinds and the edge-rule table between them.
//! - Define the record shape shared by character glyphs, deep components
//!   and atomic elements.
//!
//! # Invariants
//! - `font_id` never changes after creation.
//! - `name`, `filename`, `unicode_hex`, `flags` and `components` are only
//!   written together, from one `DerivedGlif`.
//! - Lock holder and lock timestamp are stored as one optional value, so
//!   they are either both set or both unset.

use crate::model::container::FontId;
use crate::model::layer::LayerKind;
use crate::model::payload::{derive, DerivedFlags, DerivedGlif, GlifPayload, PayloadError};
use crate::model::status::StatusFields;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable glif identifier, unique within one glif kind table.
pub type GlifId = Uuid;

/// Composable glif kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlifKind {
    /// Full character glyph, may reference other glyphs and deep components.
    CharacterGlyph,
    /// Reusable sub-component built from atomic elements.
    DeepComponent,
    /// Leaf outline element.
    AtomicElement,
}

/// Which kinds each kind may reference as a component.
const EDGE_RULES: &[(GlifKind, &[GlifKind])] = &[
    (
        GlifKind::CharacterGlyph,
        &[GlifKind::CharacterGlyph, GlifKind::DeepComponent],
    ),
    (GlifKind::DeepComponent, &[GlifKind::AtomicElement]),
    (GlifKind::AtomicElement, &[]),
];

impl GlifKind {
    pub const ALL: [GlifKind; 3] = [
        Self::CharacterGlyph,
        Self::DeepComponent,
        Self::AtomicElement,
    ];

    /// Stable storage value, also used as tombstone `glif_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CharacterGlyph => "character_glyph",
            Self::DeepComponent => "deep_component",
            Self::AtomicElement => "atomic_element",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Table holding records of this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::CharacterGlyph => "character_glyphs",
            Self::DeepComponent => "deep_components",
            Self::AtomicElement => "atomic_elements",
        }
    }

    /// Directory name inside a `.rcjk` font package.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::CharacterGlyph => "characterGlyph",
            Self::DeepComponent => "deepComponent",
            Self::AtomicElement => "atomicElement",
        }
    }

    /// Kinds this kind may reference.
    pub fn allowed_targets(self) -> &'static [GlifKind] {
        EDGE_RULES
            .iter()
            .find(|(source, _)| *source == self)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn may_reference(self, target: GlifKind) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Paired layer kind, if this kind has layers.
    pub fn layer_kind(self) -> Option<LayerKind> {
        match self {
            Self::CharacterGlyph => Some(LayerKind::CharacterGlyphLayer),
            Self::AtomicElement => Some(LayerKind::AtomicElementLayer),
            Self::DeepComponent => None,
        }
    }
}

impl std::fmt::Display for GlifKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from one glif to another, by kind and name within a font.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    pub kind: GlifKind,
    pub name: String,
}

impl ComponentRef {
    pub fn new(kind: GlifKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Addresses one glif row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlifKey {
    pub kind: GlifKind,
    pub id: GlifId,
}

impl GlifKey {
    pub fn new(kind: GlifKind, id: GlifId) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for GlifKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Current exclusive edit session on a glif.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub actor: String,
    /// Epoch ms when the lock was (re)acquired.
    pub at: i64,
}

/// Composable glif record.
#[derive(Debug, Clone, PartialEq)]
pub struct Glif {
    pub id: GlifId,
    pub kind: GlifKind,
    pub font_id: FontId,
    pub name: String,
    pub filename: String,
    pub data: GlifPayload,
    pub unicode_hex: String,
    pub flags: DerivedFlags,
    pub components: Vec<ComponentRef>,
    pub status: StatusFields,
    pub lock: Option<LockHolder>,
    /// Current contributor set, sorted.
    pub editors: Vec<String>,
    pub deleted: bool,
    /// Compare-and-swap stamp, bumped by every committed mutation.
    pub version: i64,
    pub layers_updated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Glif {
    /// Creates an unlocked `wip` glif with no editors.
    pub fn new(kind: GlifKind, font_id: FontId, data: GlifPayload) -> Result<Self, PayloadError> {
        let derived = derive(&data)?;
        let mut glif = Self {
            id: Uuid::new_v4(),
            kind,
            font_id,
            name: String::new(),
            filename: String::new(),
            data: GlifPayload::default(),
            unicode_hex: String::new(),
            flags: DerivedFlags::default(),
            components: Vec::new(),
            status: StatusFields::default(),
            lock: None,
            editors: Vec::new(),
            deleted: false,
            version: 0,
            layers_updated_at: None,
            created_at: 0,
            updated_at: 0,
        };
        glif.apply_derived(data, derived);
        Ok(glif)
    }

    pub fn key(&self) -> GlifKey {
        GlifKey::new(self.kind, self.id)
    }

    /// Node identity of this glif in its font composition graph.
    pub fn node(&self) -> ComponentRef {
        ComponentRef::new(self.kind, self.name.clone())
    }

    pub fn locked_by(&self) -> Option<&str> {
        self.lock.as_ref().map(|holder| holder.actor.as_str())
    }

    pub fn locked_at(&self) -> Option<i64> {
        self.lock.as_ref().map(|holder| holder.at)
    }

    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Replaces payload and every payload-derived field in one step.
    pub fn apply_derived(&mut self, data: GlifPayload, derived: DerivedGlif) {
        self.data = data;
        self.name = derived.name;
        self.filename = derived.filename;
        self.unicode_hex = derived.unicode_hex;
        self.flags = derived.flags;
        self.components = derived.components;
    }
}
