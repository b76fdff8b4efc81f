use crate::{CacheError, CacheResult};
use fragkit_types::{Lid, StableIdentifier};
use std::collections::HashMap;
use tracing::debug;

/// The (owner, field) a fragment is currently bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    pub owner: StableIdentifier,
    pub field: String,
}

/// Per-lid materialization state of a fragment instance.
///
/// Tracked per derived key so that a reentrant read of the same field
/// cannot clobber the state of the read that is still creating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Materialization {
    #[default]
    Absent,
    BeingCreated,
    Ready,
}

#[derive(Debug, Default)]
struct OwnershipEntry {
    owner: Option<Ownership>,
    state: Materialization,
}

/// Fragment lid → current owner, plus materialization state.
///
/// Owned by one store; entries are detached when fragments are torn down.
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    entries: HashMap<Lid, OwnershipEntry>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `owner.field` as the owner of `fragment`.
    ///
    /// Re-attaching to the same owner and field is a no-op; a different
    /// owner or field is a conflict.
    pub fn attach(
        &mut self,
        fragment: &StableIdentifier,
        owner: &StableIdentifier,
        field: &str,
    ) -> CacheResult<()> {
        let entry = self.entries.entry(fragment.lid().clone()).or_default();
        match &entry.owner {
            Some(current) if current.owner == *owner && current.field == field => Ok(()),
            Some(current) => Err(CacheError::OwnershipConflict {
                fragment: fragment.lid().clone(),
                owner: current.owner.to_string(),
                field: current.field.clone(),
            }),
            None => {
                debug!(fragment = %fragment, owner = %owner, field, "attached fragment");
                entry.owner = Some(Ownership {
                    owner: owner.clone(),
                    field: field.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Removes the ownership record and materialization state. Idempotent.
    pub fn detach(&mut self, fragment: &StableIdentifier) -> Option<Ownership> {
        self.detach_lid(fragment.lid())
    }

    pub fn detach_lid(&mut self, lid: &Lid) -> Option<Ownership> {
        let entry = self.entries.remove(lid)?;
        if let Some(ownership) = &entry.owner {
            debug!(fragment = %lid, owner = %ownership.owner, "detached fragment");
        }
        entry.owner
    }

    pub fn owner_of(&self, fragment: &StableIdentifier) -> Option<&Ownership> {
        self.entries.get(fragment.lid())?.owner.as_ref()
    }

    pub fn materialization(&self, lid: &Lid) -> Materialization {
        self.entries.get(lid).map(|e| e.state).unwrap_or_default()
    }

    /// Marks `lid` as being created if nothing is materialized yet.
    ///
    /// Returns the state found before the call; only a caller that saw
    /// [`Materialization::Absent`] owns the creation.
    pub fn begin_materialization(&mut self, lid: &Lid) -> Materialization {
        let entry = self.entries.entry(lid.clone()).or_default();
        let previous = entry.state;
        if previous == Materialization::Absent {
            entry.state = Materialization::BeingCreated;
        }
        previous
    }

    pub fn finish_materialization(&mut self, lid: &Lid) {
        self.entries.entry(lid.clone()).or_default().state = Materialization::Ready;
    }

    /// Rolls a failed creation back to `Absent`.
    pub fn abandon_materialization(&mut self, lid: &Lid) {
        if let Some(entry) = self.entries.get_mut(lid) {
            if entry.state == Materialization::BeingCreated {
                entry.state = Materialization::Absent;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
