use super::group::Group;
use super::types::{Getter, PeerPicker};
use crate::error::CacheError;

use dashmap::DashMap;
use std::sync::{Arc, OnceLock};

/// Every cache group of this process, plus the peer picker they route through.
pub struct GroupRegistry {
    groups: DashMap<String, Arc<Group>>,
    picker: Arc<OnceLock<Arc<dyn PeerPicker>>>,
}

impl GroupRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Installs the picker used by all groups. Only one picker may ever be registered.
    pub fn register_peer_picker(&self, picker: Arc<dyn PeerPicker>) -> Result<(), CacheError> {
        self.picker
            .set(picker)
            .map_err(|_| CacheError::PickerAlreadyRegistered)?;
        tracing::info!("registered peer picker");
        Ok(())
    }

    pub fn has_peer_picker(&self) -> bool {
        self.picker.get().is_some()
    }

    /// Creates a group named `name` whose tiers each hold at most `max_entries` values.
    pub fn new_group<G>(
        &self,
        name: &str,
        max_entries: usize,
        getter: G,
    ) -> Result<Arc<Group>, CacheError>
    where
        G: Getter + 'static,
    {
        use dashmap::mapref::entry::Entry;

        match self.groups.entry(name.to_string()) {
            Entry::Occupied(_) => Err(CacheError::DuplicateGroup(name.to_string())),
            Entry::Vacant(slot) => {
                let group = Arc::new(Group::new(
                    name,
                    max_entries,
                    Arc::new(getter),
                    self.picker.clone(),
                ));
                slot.insert(group.clone());
                tracing::info!(group = name, max_entries, "created cache group");
                Ok(group)
            }
        }
    }

    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(name).map(|entry| entry.value().clone())
    }

    /// Group names, sorted.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self {
            groups: DashMap::new(),
            picker: Arc::new(OnceLock::new()),
        }
    }
}
