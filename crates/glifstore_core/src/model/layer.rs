//! Glif layer model.
//!
//! # Responsibility
//! - Define alternate masters owned by one parent glif.
//!
//! # Invariants
//! - A layer is keyed by `(glif_id, group_name)` and never changes parent.
//! - Layers share payload derivation with glifs but carry no status or lock.

use crate::model::glif::{ComponentRef, GlifId, GlifKind};
use crate::model::payload::{derive, DerivedFlags, DerivedGlif, GlifPayload, PayloadError};
use uuid::Uuid;

pub type LayerId = Uuid;

/// Layer kind, paired with the glif kind that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    CharacterGlyphLayer,
    AtomicElementLayer,
}

impl LayerKind {
    /// Stable storage value, also used as tombstone `glif_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CharacterGlyphLayer => "character_glyph_layer",
            Self::AtomicElementLayer => "atomic_element_layer",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::CharacterGlyphLayer => "character_glyph_layers",
            Self::AtomicElementLayer => "atomic_element_layers",
        }
    }

    pub fn parent_kind(self) -> GlifKind {
        match self {
            Self::CharacterGlyphLayer => GlifKind::CharacterGlyph,
            Self::AtomicElementLayer => GlifKind::AtomicElement,
        }
    }
}

/// Alternate master of a glif outline.
#[derive(Debug, Clone, PartialEq)]
pub struct GlifLayer {
    pub id: LayerId,
    pub kind: LayerKind,
    pub glif_id: GlifId,
    pub group_name: String,
    pub name: String,
    pub filename: String,
    pub data: GlifPayload,
    pub unicode_hex: String,
    pub flags: DerivedFlags,
    pub components: Vec<ComponentRef>,
    pub deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GlifLayer {
    pub fn new(
        kind: LayerKind,
        glif_id: GlifId,
        group_name: impl Into<String>,
        data: GlifPayload,
    ) -> Result<Self, PayloadError> {
        let derived = derive(&data)?;
        let mut layer = Self {
            id: Uuid::new_v4(),
            kind,
            glif_id,
            group_name: group_name.into(),
            name: String::new(),
            filename: String::new(),
            data: GlifPayload::default(),
            unicode_hex: String::new(),
            flags: DerivedFlags::default(),
            components: Vec::new(),
            deleted: false,
            created_at: 0,
            updated_at: 0,
        };
        layer.apply_derived(data, derived);
        Ok(layer)
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
