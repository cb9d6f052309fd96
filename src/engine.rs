use crate::{
    catalog::{ModDependency, ModEntry},
    index::{normalize_id, IdIndex},
    lookup::{is_browsable_reference, MetadataLookup, NullLookup},
    order::OrderSequence,
    sorter::{self, SortOutcome},
    tracker::ActivationTracker,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("catalog is empty")]
    EmptyCatalog,
}

/// A dependency id no catalog item answers to. Reports for the same id are
/// merged; `required_by` lists every active item that asked for it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MissingDependency {
    pub id: String,
    pub name: String,
    pub workshop_id: Option<String>,
    pub required_by: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolveReport {
    /// Ids of items auto-activated by the resolution walk, in activation
    /// order.
    pub added: Vec<String>,
    pub missing: Vec<MissingDependency>,
}

/// Owns the catalog and every piece of load-order state. All mutation goes
/// through here; each externally visible change ends with one issue rescan
/// and one change notification.
pub struct LoadOrderEngine {
    items: Vec<ModEntry>,
    index: IdIndex,
    tracker: ActivationTracker,
    order: OrderSequence,
    lookup: Box<dyn MetadataLookup>,
    on_change: Option<Box<dyn FnMut()>>,
    any_issues: bool,
}

impl Default for LoadOrderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadOrderEngine {
    pub fn new() -> Self {
        Self::with_lookup(Box::new(NullLookup))
    }

    pub fn with_lookup(lookup: Box<dyn MetadataLookup>) -> Self {
        Self {
            items: Vec::new(),
            index: IdIndex::default(),
            tracker: ActivationTracker::default(),
            order: OrderSequence::default(),
            lookup,
            on_change: None,
            any_issues: false,
        }
    }

    pub fn set_lookup(&mut self, lookup: Box<dyn MetadataLookup>) {
        self.lookup = lookup;
    }

    /// Registers the single list-changed notification. Fired synchronously
    /// on the calling thread, once per externally visible mutation.
    pub fn on_change(&mut self, callback: impl FnMut() + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    /// Full reset from a catalog and the persisted active-id list. The
    /// initial order is the subsequence of `active_ids` that resolved to
    /// active items, in the given relative order; base-game items missing
    /// from the list are forced active and placed up front.
    pub fn initialize(
        &mut self,
        catalog: Vec<ModEntry>,
        active_ids: &[String],
    ) -> Result<(), EngineError> {
        if catalog.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        self.items = catalog;
        self.index = IdIndex::build(&self.items);
        self.tracker
            .initialize(&mut self.items, &self.index, active_ids);

        let requested: HashSet<String> = active_ids.iter().map(|id| normalize_id(id)).collect();
        let mut seen: HashSet<usize> = HashSet::new();
        let mut initial = Vec::new();
        for (position, item) in self.items.iter().enumerate() {
            if !self.tracker.is_active(position) {
                continue;
            }
            if !requested.contains(&normalize_id(&item.id)) && seen.insert(position) {
                initial.push(position);
            }
        }
        for id in active_ids {
            let Some(position) = self.index.get(id) else {
                continue;
            };
            if self.tracker.is_active(position) && seen.insert(position) {
                initial.push(position);
            }
        }
        self.order.replace(initial);

        self.recalculate_issues();
        self.notify();
        Ok(())
    }

    pub fn activate(&mut self, id: &str) -> bool {
        let changed = match self.index.get(id) {
            Some(position) => self.activate_positions(&[position]),
            None => false,
        };
        self.finish(changed)
    }

    pub fn activate_many(&mut self, ids: &[String]) -> bool {
        let positions = self.resolve_positions(ids);
        let changed = self.activate_positions(&positions);
        self.finish(changed)
    }

    pub fn deactivate(&mut self, id: &str) -> bool {
        let changed = match self.index.get(id) {
            Some(position) => self.deactivate_positions(&[position]),
            None => false,
        };
        self.finish(changed)
    }

    pub fn deactivate_many(&mut self, ids: &[String]) -> bool {
        let positions = self.resolve_positions(ids);
        let changed = self.deactivate_positions(&positions);
        self.finish(changed)
    }

    /// Moves the given active items to `target` as one block, in the order
    /// they were passed. Any id that does not resolve, or resolves to an
    /// item not currently in the sequence, rejects the whole move.
    pub fn reorder(&mut self, ids: &[String], target: usize) -> bool {
        let mut positions = Vec::new();
        for id in ids {
            let Some(position) = self.index.get(id) else {
                return false;
            };
            if !positions.contains(&position) {
                positions.push(position);
            }
        }
        if positions.is_empty() {
            return false;
        }
        let changed = self.order.reorder(&positions, target);
        self.finish(changed)
    }

    /// Bulk activation at a position: already-active items are reordered to
    /// just before `index`, then the newly activated ones are inserted one
    /// past the repositioned block, so a mixed batch lands contiguously.
    pub fn activate_at(&mut self, ids: &[String], index: usize) -> bool {
        let positions = self.resolve_positions(ids);
        if positions.is_empty() {
            return false;
        }
        let already: Vec<usize> = positions
            .iter()
            .copied()
            .filter(|position| self.tracker.is_active(*position))
            .collect();
        let fresh: Vec<usize> = positions
            .iter()
            .copied()
            .filter(|position| !self.tracker.is_active(*position))
            .collect();

        let mut changed = false;
        let mut insert_at = index.min(self.order.len());
        if !already.is_empty() {
            changed |= self.order.reorder(&already, index);
            let last = already
                .iter()
                .filter_map(|position| self.order.position_of(*position))
                .max();
            if let Some(last) = last {
                insert_at = last + 1;
            }
        }

        let mut activated = Vec::new();
        for position in fresh {
            if self.tracker.activate(&mut self.items, position) {
                activated.push(position);
            }
        }
        if !activated.is_empty() {
            changed |= self.order.add_at(&activated, insert_at);
        }
        self.finish(changed)
    }

    /// Deactivates everything except base-game and expansion items.
    pub fn clear_active_list(&mut self) -> bool {
        let removable: Vec<usize> = self
            .order
            .entries()
            .iter()
            .copied()
            .filter(|position| {
                let item = &self.items[*position];
                !item.is_base_game() && !item.is_expansion()
            })
            .collect();
        let changed = self.deactivate_positions(&removable);
        self.finish(changed)
    }

    /// Runs the graph sort over the current active sequence. A cycle leaves
    /// the order untouched and returns false; an unchanged result is also
    /// false. Only an actual reordering mutates state and notifies.
    pub fn sort_active_list(&mut self) -> bool {
        let snapshot = self.order.entries().to_vec();
        let sorted = match sorter::sort_active(&self.items, &snapshot) {
            SortOutcome::Sorted(sorted) => sorted,
            SortOutcome::Cycle(_) => return false,
        };
        if sorted.len() != snapshot.len() || sorted == snapshot {
            return false;
        }
        self.order.replace(sorted);
        self.finish(true)
    }

    /// Breadth-first walk over the active items' dependencies. Dependencies
    /// found in the inactive pool are activated and appended at the end,
    /// and their own dependencies join the worklist. Ids the catalog does
    /// not know are reported as missing, merged per id, with the metadata
    /// lookup repairing absent or non-browsable references.
    pub fn resolve_dependencies(&mut self) -> ResolveReport {
        let mut queue: VecDeque<(usize, ModDependency)> = VecDeque::new();
        for position in self.order.entries().iter().copied() {
            for dependency in &self.items[position].dependencies {
                queue.push_back((position, dependency.clone()));
            }
        }

        let mut processed: HashSet<String> = HashSet::new();
        let mut added = Vec::new();
        let mut missing: Vec<MissingDependency> = Vec::new();

        while let Some((dependent, dependency)) = queue.pop_front() {
            let key = normalize_id(&dependency.id);
            if key.is_empty() || key == normalize_id(&self.items[dependent].id) {
                continue;
            }
            match self.index.get(&dependency.id) {
                Some(target) if self.tracker.is_active(target) => {}
                Some(target) => {
                    if !processed.insert(key) {
                        continue;
                    }
                    if self.tracker.activate(&mut self.items, target) {
                        let end = self.order.len();
                        self.order.add_at(&[target], end);
                        added.push(self.items[target].id.clone());
                        for next in self.items[target].dependencies.clone() {
                            queue.push_back((target, next));
                        }
                    }
                }
                None => {
                    let requiring = self.items[dependent].display_name().to_string();
                    if let Some(entry) = missing
                        .iter_mut()
                        .find(|entry| normalize_id(&entry.id) == key)
                    {
                        if entry.name.trim().is_empty() && !dependency.name.trim().is_empty() {
                            entry.name = dependency.name.clone();
                        }
                        if !is_browsable_reference(entry.workshop_id.as_deref())
                            && is_browsable_reference(dependency.workshop_id.as_deref())
                        {
                            entry.workshop_id = dependency.workshop_id.clone();
                        }
                        if !entry.required_by.contains(&requiring) {
                            entry.required_by.push(requiring);
                        }
                    } else {
                        let mut entry = MissingDependency {
                            id: dependency.id.clone(),
                            name: dependency.name.clone(),
                            workshop_id: dependency.workshop_id.clone(),
                            required_by: vec![requiring],
                        };
                        if !is_browsable_reference(entry.workshop_id.as_deref()) {
                            if let Some(found) = self.lookup.lookup(&entry.id) {
                                if entry.name.trim().is_empty() && !found.name.trim().is_empty() {
                                    entry.name = found.name;
                                }
                                if is_browsable_reference(found.workshop_id.as_deref()) {
                                    entry.workshop_id = found.workshop_id;
                                }
                            }
                        }
                        missing.push(entry);
                    }
                }
            }
        }

        if !added.is_empty() {
            self.recalculate_issues();
            self.notify();
        }
        ResolveReport { added, missing }
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.index
            .get(id)
            .map(|position| self.tracker.is_active(position))
            .unwrap_or(false)
    }

    pub fn items(&self) -> &[ModEntry] {
        &self.items
    }

    pub fn active_ordered(&self) -> impl Iterator<Item = (usize, &ModEntry)> + '_ {
        self.order
            .entries()
            .iter()
            .enumerate()
            .map(|(at, position)| (at, &self.items[*position]))
    }

    pub fn inactive(&self) -> impl Iterator<Item = &ModEntry> + '_ {
        self.tracker
            .inactive()
            .iter()
            .map(|position| &self.items[*position])
    }

    /// The current order as ids, ready for the persisted-list provider.
    pub fn active_ids(&self) -> Vec<String> {
        self.order
            .entries()
            .iter()
            .map(|position| self.items[*position].id.clone())
            .collect()
    }

    pub fn has_issues(&self) -> bool {
        self.any_issues
    }

    /// Requested-active ids that never resolved to a catalog item.
    pub fn unresolved_ids(&self) -> &[String] {
        self.tracker.unresolved()
    }

    fn resolve_positions(&self, ids: &[String]) -> Vec<usize> {
        let mut positions = Vec::new();
        for id in ids {
            if let Some(position) = self.index.get(id) {
                if !positions.contains(&position) {
                    positions.push(position);
                }
            }
        }
        positions
    }

    fn activate_positions(&mut self, positions: &[usize]) -> bool {
        let mut activated = Vec::new();
        for position in positions.iter().copied() {
            if self.tracker.activate(&mut self.items, position) {
                activated.push(position);
            }
        }
        if activated.is_empty() {
            return false;
        }
        let end = self.order.len();
        self.order.add_at(&activated, end);
        true
    }

    fn deactivate_positions(&mut self, positions: &[usize]) -> bool {
        let mut removed = Vec::new();
        for position in positions.iter().copied() {
            if self.tracker.deactivate(&mut self.items, position) {
                removed.push(position);
            }
        }
        if removed.is_empty() {
            return false;
        }
        self.order.remove(&removed);
        true
    }

    fn finish(&mut self, changed: bool) -> bool {
        if changed {
            self.recalculate_issues();
            self.notify();
        }
        changed
    }

    fn notify(&mut self) {
        if let Some(callback) = self.on_change.as_mut() {
            callback();
        }
    }

    /// Full rescan of every active item against the current order: missing
    /// or late dependencies, active incompatibilities, and violated
    /// before/after hints. No incremental diffing.
    fn recalculate_issues(&mut self) {
        let position_at: HashMap<String, usize> = self
            .order
            .entries()
            .iter()
            .enumerate()
            .map(|(at, position)| (normalize_id(&self.items[*position].id), at))
            .collect();

        let mut findings: Vec<(usize, Vec<String>)> = Vec::new();
        for (at, position) in self.order.entries().iter().copied().enumerate() {
            let item = &self.items[position];
            let own = normalize_id(&item.id);
            let mut lines = Vec::new();

            for dependency in &item.dependencies {
                let key = normalize_id(&dependency.id);
                if key.is_empty() || key == own {
                    continue;
                }
                match position_at.get(&key) {
                    None => lines.push(format!(
                        "Missing dependency: {}",
                        dependency.display_name()
                    )),
                    Some(dep_at) if *dep_at > at => lines.push(format!(
                        "Dependency {} loads after this mod",
                        dependency.display_name()
                    )),
                    Some(_) => {}
                }
            }

            let mut conflicts: Vec<_> = item.incompatibilities.iter().collect();
            conflicts.sort_by_key(|(target, _)| normalize_id(target));
            for (target, rule) in conflicts {
                let key = normalize_id(target);
                if key.is_empty() || key == own || !position_at.contains_key(&key) {
                    continue;
                }
                let name = if rule.name.trim().is_empty() {
                    self.resolved_name(target)
                } else {
                    rule.name.clone()
                };
                if rule.hard {
                    lines.push(format!("Incompatible with {name}"));
                } else {
                    lines.push(format!("Possible conflict with {name}"));
                }
            }

            for target in item.force_load_before.iter().chain(&item.load_before) {
                let key = normalize_id(target);
                if key.is_empty() || key == own {
                    continue;
                }
                if matches!(position_at.get(&key), Some(target_at) if *target_at < at) {
                    lines.push(format!(
                        "Should load before {}, but loads after",
                        self.resolved_name(target)
                    ));
                }
            }
            for target in item.force_load_after.iter().chain(&item.load_after) {
                let key = normalize_id(target);
                if key.is_empty() || key == own {
                    continue;
                }
                if matches!(position_at.get(&key), Some(target_at) if *target_at > at) {
                    lines.push(format!(
                        "Should load after {}, but loads before",
                        self.resolved_name(target)
                    ));
                }
            }

            if !lines.is_empty() {
                findings.push((position, lines));
            }
        }

        for item in &mut self.items {
            item.has_issue = false;
            item.issue_text.clear();
        }
        self.any_issues = !findings.is_empty();
        for (position, lines) in findings {
            let item = &mut self.items[position];
            item.has_issue = true;
            item.issue_text = lines.join("\n");
        }
    }

    fn resolved_name(&self, id: &str) -> String {
        match self.index.get(id) {
            Some(position) => self.items[position].display_name().to_string(),
            None => id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModCategory;
    use pretty_assertions::assert_eq;

    fn entry(id: &str, name: &str) -> ModEntry {
        ModEntry::new(id, name, ModCategory::Addon)
    }

    fn base_catalog() -> Vec<ModEntry> {
        vec![
            ModEntry::new("base", "Base Game", ModCategory::BaseGame),
            entry("alpha", "Alpha"),
            entry("beta", "Beta"),
        ]
    }

    #[test]
    fn empty_catalog_fails_loudly() {
        let mut engine = LoadOrderEngine::new();
        assert!(matches!(
            engine.initialize(Vec::new(), &[]),
            Err(EngineError::EmptyCatalog)
        ));
    }

    #[test]
    fn unknown_ids_are_silent_no_ops() {
        let mut engine = LoadOrderEngine::new();
        engine
            .initialize(base_catalog(), &["base".to_string()])
            .unwrap();
        assert!(!engine.activate("ghost"));
        assert!(!engine.deactivate("ghost"));
        assert!(!engine.reorder(&["ghost".to_string()], 0));
        assert_eq!(engine.active_ids(), vec!["base".to_string()]);
    }

    #[test]
    fn forced_base_game_lands_up_front() {
        let mut engine = LoadOrderEngine::new();
        engine
            .initialize(base_catalog(), &["alpha".to_string()])
            .unwrap();
        assert_eq!(
            engine.active_ids(),
            vec!["base".to_string(), "alpha".to_string()]
        );
    }

    #[test]
    fn duplicate_catalog_id_resolves_to_first_instance() {
        let mut catalog = base_catalog();
        catalog.push(entry("Alpha", "Alpha Copy"));
        let mut engine = LoadOrderEngine::new();
        engine
            .initialize(catalog, &["base".to_string(), "alpha".to_string()])
            .unwrap();
        assert!(engine.is_active("alpha"));
        assert!(engine.items()[1].active);
        assert!(!engine.items()[3].active);
    }
}
