//! Soft-delete tombstone model.
//!
//! # Responsibility
//! - Define the immutable ledger entry written before a glif or layer is
//!   excluded from active queries.
//! - Compute the package-relative file path recorded in each entry.
//!
//! # Invariants
//! - Tombstones are never updated after insert.
//! - Layer tombstones carry the parent glif id and a non-empty group name.

use crate::model::container::FontId;
use crate::model::glif::{GlifId, GlifKind};
use crate::model::layer::LayerKind;

pub type TombstoneId = i64;

/// Discriminates which table the deleted record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletedGlifType {
    Glif(GlifKind),
    Layer(LayerKind),
}

impl DeletedGlifType {
    pub const ALL: [DeletedGlifType; 5] = [
        Self::Glif(GlifKind::AtomicElement),
        Self::Layer(LayerKind::AtomicElementLayer),
        Self::Glif(GlifKind::DeepComponent),
        Self::Glif(GlifKind::CharacterGlyph),
        Self::Layer(LayerKind::CharacterGlyphLayer),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Glif(kind) => kind.as_str(),
            Self::Layer(kind) => kind.as_str(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|glif_type| glif_type.as_str() == value)
    }
}

/// Immutable record of a soft-deleted glif or layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub id: TombstoneId,
    /// Epoch ms.
    pub deleted_at: i64,
    pub deleted_by: Option<String>,
    pub font_id: FontId,
    pub glif_type: DeletedGlifType,
    pub glif_id: GlifId,
    /// Empty for glifs, layer group for layers.
    pub group_name: String,
    pub name: String,
    pub filename: String,
    pub filepath: String,
}

/// Tombstone fields known before insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTombstone {
    pub deleted_at: i64,
    pub deleted_by: Option<String>,
    pub font_id: FontId,
    pub glif_type: DeletedGlifType,
    pub glif_id: GlifId,
    pub group_name: String,
    pub name: String,
    pub filename: String,
    pub filepath: String,
}

/// Path of a glif file inside its project checkout.
///
/// `<project>/<font>.rcjk/<kind dir>/[<group>/]<filename>`
pub fn rcjk_path(
    project_slug: &str,
    font_slug: &str,
    kind: GlifKind,
    group_name: Option<&str>,
    filename: &str,
) -> String {
    match group_name {
        Some(group) => format!(
            "{project_slug}/{font_slug}.rcjk/{}/{group}/{filename}",
            kind.dir_name()
        ),
        None => format!(
            "{project_slug}/{font_slug}.rcjk/{}/{filename}",
            kind.dir_name()
        ),
    }
}
