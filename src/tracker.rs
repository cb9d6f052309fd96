use crate::catalog::ModEntry;
use crate::index::{normalize_id, IdIndex};
use std::collections::HashSet;

/// Partitions the catalog into the active set and an alphabetized inactive
/// list. Positions are indices into the engine-owned catalog vec.
#[derive(Debug, Default)]
pub struct ActivationTracker {
    active: HashSet<usize>,
    inactive: Vec<usize>,
    unresolved: Vec<String>,
}

impl ActivationTracker {
    /// Rebuilds the partition from scratch. An item counts as active only
    /// when its id was requested *and* the index resolves that id back to
    /// this very item, so a later duplicate of an id stays inactive.
    /// Base-game items are active no matter what the requested list says.
    pub fn initialize(&mut self, items: &mut [ModEntry], index: &IdIndex, active_ids: &[String]) {
        self.active.clear();
        self.inactive.clear();
        self.unresolved.clear();

        let mut requested: HashSet<String> = HashSet::new();
        for id in active_ids {
            let key = normalize_id(id);
            if key.is_empty() {
                continue;
            }
            if index.get(id).is_none() {
                if !self.unresolved.contains(id) {
                    self.unresolved.push(id.clone());
                }
                continue;
            }
            requested.insert(key);
        }

        for (position, item) in items.iter_mut().enumerate() {
            let confirmed = requested.contains(&normalize_id(&item.id))
                && index.get(&item.id) == Some(position);
            let active = confirmed || item.is_base_game();
            item.active = active;
            if active {
                self.active.insert(position);
            } else {
                self.inactive.push(position);
            }
        }
        self.inactive
            .sort_by_key(|position| inactive_key(&items[*position], *position));
    }

    /// Idempotent; returns whether anything changed.
    pub fn activate(&mut self, items: &mut [ModEntry], position: usize) -> bool {
        if position >= items.len() || self.active.contains(&position) {
            return false;
        }
        self.inactive.retain(|entry| *entry != position);
        self.active.insert(position);
        items[position].active = true;
        true
    }

    /// Refused for base-game items; otherwise re-inserts into the sorted
    /// inactive list. Returns whether anything changed.
    pub fn deactivate(&mut self, items: &mut [ModEntry], position: usize) -> bool {
        if position >= items.len() || !self.active.contains(&position) {
            return false;
        }
        if items[position].is_base_game() {
            return false;
        }
        self.active.remove(&position);
        items[position].active = false;
        let key = inactive_key(&items[position], position);
        let at = self
            .inactive
            .partition_point(|entry| inactive_key(&items[*entry], *entry) < key);
        self.inactive.insert(at, position);
        true
    }

    pub fn is_active(&self, position: usize) -> bool {
        self.active.contains(&position)
    }

    pub fn active(&self) -> &HashSet<usize> {
        &self.active
    }

    pub fn inactive(&self) -> &[usize] {
        &self.inactive
    }

    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }
}

fn inactive_key(item: &ModEntry, position: usize) -> (String, usize) {
    (item.display_name().to_ascii_lowercase(), position)
}
