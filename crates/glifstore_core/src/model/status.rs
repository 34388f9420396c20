//! Review status lifecycle shared by every composable glif kind.
//!
//! # Responsibility
//! - Define the ordered review states and their storage/display values.
//! - Hold the per-record status fields mutated by the status engine.
//!
//! # Invariants
//! - States are totally ordered by review depth: `Wip` lowest, `Done` highest.
//! - `downgraded == true` implies `previous` is set.

use serde::{Deserialize, Serialize};

/// Review state of a glif.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GlifStatus {
    #[serde(rename = "wip")]
    Wip,
    #[serde(rename = "checking-1")]
    Checking1,
    #[serde(rename = "checking-2")]
    Checking2,
    #[serde(rename = "checking-3")]
    Checking3,
    #[serde(rename = "done")]
    Done,
}

impl GlifStatus {
    /// All states in ascending review order.
    pub const ALL: [GlifStatus; 5] = [
        Self::Wip,
        Self::Checking1,
        Self::Checking2,
        Self::Checking3,
        Self::Done,
    ];

    /// Zero-based review depth.
    pub fn rank(self) -> u8 {
        match self {
            Self::Wip => 0,
            Self::Checking1 => 1,
            Self::Checking2 => 2,
            Self::Checking3 => 3,
            Self::Done => 4,
        }
    }

    /// Next review tier, `None` for `Done`.
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(usize::from(self.rank()) + 1).copied()
    }

    /// Stable storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wip => "wip",
            Self::Checking1 => "checking-1",
            Self::Checking2 => "checking-2",
            Self::Checking3 => "checking-3",
            Self::Done => "done",
        }
    }

    /// Parses a storage value.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
    }

    /// User-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Wip => "Wip",
            Self::Checking1 => "Checking 1",
            Self::Checking2 => "Checking 2",
            Self::Checking3 => "Checking 3",
            Self::Done => "Done",
        }
    }

    /// Hex color used by list screens.
    pub fn color(self) -> &'static str {
        match self {
            Self::Wip => "#e74c3c",
            Self::Checking1 => "#e67e22",
            Self::Checking2 => "#f1c40f",
            Self::Checking3 => "#2980b9",
            Self::Done => "#27ae60",
        }
    }
}

impl std::fmt::Display for GlifStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status fields carried by every composable glif.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFields {
    pub status: GlifStatus,
    /// Epoch ms of the last transition.
    pub changed_at: Option<i64>,
    /// Actor attributed with the last transition.
    pub changed_by: Option<String>,
    /// Status left by the last transition.
    pub previous: Option<GlifStatus>,
    pub downgraded: bool,
    pub downgraded_at: Option<i64>,
}

impl Default for StatusFields {
    fn default() -> Self {
        Self {
            status: GlifStatus::Wip,
            changed_at: None,
            changed_by: None,
            previous: None,
            downgraded: false,
            downgraded_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GlifStatus;

    #[test]
    fn states_are_ordered_by_review_depth() {
        assert!(GlifStatus::Wip < GlifStatus::Checking1);
        assert!(GlifStatus::Checking3 < GlifStatus::Done);
        assert_eq!(GlifStatus::Checking2.next(), Some(GlifStatus::Checking3));
        assert_eq!(GlifStatus::Done.next(), None);
    }

    #[test]
    fn storage_values_roundtrip_for_every_state() {
        for status in GlifStatus::ALL {
            assert_eq!(GlifStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(GlifStatus::parse("checking_1"), None);
    }

    #[test]
    fn display_metadata_covers_every_state() {
        for status in GlifStatus::ALL {
            assert!(!status.label().is_empty());
            assert!(status.color().starts_with('#'));
            assert_eq!(status.color().len(), 7);
        }
        assert_eq!(GlifStatus::Done.color(), "#27ae60");
    }
}
