use serde::{Deserialize, Serialize};

/// Which side of the owner/fragment split an entity type lives on.
///
/// Records are top-level, independently addressable resources. Fragments
/// only ever exist embedded under an owner's attribute slot (or standalone,
/// right after construction and before being attached).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Record,
    Fragment,
}

impl EntityKind {
    pub fn is_fragment(self) -> bool {
        matches!(self, EntityKind::Fragment)
    }
}
