use crate::catalog::{ModCategory, ModEntry};
use crate::index::normalize_id;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Tie-break rank for items with no explicit edge between them. Smaller
/// sorts earlier; explicit edges always win over rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortPriority {
    ForceBefore,
    Before,
    BaseGame,
    Expansion,
    AfterOrDependent,
    Unranked,
}

impl SortPriority {
    pub fn rank(item: &ModEntry) -> Self {
        if !item.force_load_before.is_empty() {
            return Self::ForceBefore;
        }
        if !item.load_before.is_empty() {
            return Self::Before;
        }
        match item.category {
            ModCategory::BaseGame => return Self::BaseGame,
            ModCategory::Expansion => return Self::Expansion,
            _ => {}
        }
        if !item.load_after.is_empty()
            || !item.force_load_after.is_empty()
            || !item.dependencies.is_empty()
        {
            return Self::AfterOrDependent;
        }
        Self::Unranked
    }
}

/// Catalog positions in sorted order, or the positions forming a cycle.
#[derive(Debug, Clone)]
pub enum SortOutcome {
    Sorted(Vec<usize>),
    Cycle(Vec<usize>),
}

/// Sorts the active subset. Edges come from the items' ordering hints and
/// dependency lists; references to anything outside the subset, and
/// self-references, are dropped. Ties break on (priority, display name) so
/// repeated runs over the same input give the same order.
pub fn sort_active(items: &[ModEntry], active: &[usize]) -> SortOutcome {
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    for (slot, position) in active.iter().enumerate() {
        let key = normalize_id(&items[*position].id);
        if key.is_empty() {
            continue;
        }
        slot_of.entry(key).or_insert(slot);
    }

    let count = active.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();
    let mut push_edge = |from: usize, to: usize, adjacency: &mut Vec<Vec<usize>>| {
        if from != to && seen_edges.insert((from, to)) {
            adjacency[from].push(to);
        }
    };

    for (slot, position) in active.iter().enumerate() {
        let item = &items[*position];
        for target in item.force_load_before.iter().chain(&item.load_before) {
            if let Some(other) = slot_of.get(&normalize_id(target)) {
                push_edge(slot, *other, &mut adjacency);
            }
        }
        for source in item.force_load_after.iter().chain(&item.load_after) {
            if let Some(other) = slot_of.get(&normalize_id(source)) {
                push_edge(*other, slot, &mut adjacency);
            }
        }
        for dependency in &item.dependencies {
            if let Some(other) = slot_of.get(&normalize_id(&dependency.id)) {
                push_edge(*other, slot, &mut adjacency);
            }
        }
    }
    for targets in &mut adjacency {
        targets.sort_unstable();
    }

    if let Some(cycle) = find_cycle(&adjacency) {
        return SortOutcome::Cycle(cycle.into_iter().map(|slot| active[slot]).collect());
    }

    let mut indegree = vec![0usize; count];
    for targets in &adjacency {
        for target in targets {
            indegree[*target] += 1;
        }
    }

    let sort_key = |slot: usize| {
        let item = &items[active[slot]];
        (
            SortPriority::rank(item),
            item.display_name().to_ascii_lowercase(),
            slot,
        )
    };
    let mut frontier = BinaryHeap::new();
    for slot in 0..count {
        if indegree[slot] == 0 {
            frontier.push(Reverse(sort_key(slot)));
        }
    }

    let mut sorted = Vec::with_capacity(count);
    while let Some(Reverse((_, _, slot))) = frontier.pop() {
        sorted.push(active[slot]);
        for target in &adjacency[slot] {
            indegree[*target] -= 1;
            if indegree[*target] == 0 {
                frontier.push(Reverse(sort_key(*target)));
            }
        }
    }

    if sorted.len() != count {
        // leftovers mean an inconsistency the cycle walk missed
        let placed: HashSet<usize> = sorted.iter().copied().collect();
        let unplaced = active
            .iter()
            .copied()
            .filter(|position| !placed.contains(position))
            .collect();
        return SortOutcome::Cycle(unplaced);
    }
    SortOutcome::Sorted(sorted)
}

/// Depth-first walk with an explicit recursion stack; returns the first
/// cycle path found, closed with the revisited node.
fn find_cycle(adjacency: &[Vec<usize>]) -> Option<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        OnStack,
        Done,
    }

    fn visit(
        node: usize,
        adjacency: &[Vec<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::OnStack;
        stack.push(node);
        for next in &adjacency[node] {
            match marks[*next] {
                Mark::New => {
                    if let Some(cycle) = visit(*next, adjacency, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::OnStack => {
                    let start = stack.iter().position(|entry| entry == next).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(*next);
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::New; adjacency.len()];
    let mut stack = Vec::new();
    for node in 0..adjacency.len() {
        if marks[node] == Mark::New {
            if let Some(cycle) = visit(node, adjacency, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ModCategory, ModDependency};
    use pretty_assertions::assert_eq;

    fn entry(id: &str, name: &str) -> ModEntry {
        ModEntry::new(id, name, ModCategory::Addon)
    }

    fn positions(items: &[ModEntry]) -> Vec<usize> {
        (0..items.len()).collect()
    }

    #[test]
    fn rank_orders_by_declared_constraints() {
        let mut forced = entry("a", "A");
        forced.force_load_before.push("b".to_string());
        assert_eq!(SortPriority::rank(&forced), SortPriority::ForceBefore);

        let mut soft = entry("a", "A");
        soft.load_before.push("b".to_string());
        assert_eq!(SortPriority::rank(&soft), SortPriority::Before);

        let base = ModEntry::new("base", "Base", ModCategory::BaseGame);
        assert_eq!(SortPriority::rank(&base), SortPriority::BaseGame);

        let expansion = ModEntry::new("x", "X", ModCategory::Expansion);
        assert_eq!(SortPriority::rank(&expansion), SortPriority::Expansion);

        let mut dependent = entry("a", "A");
        dependent.dependencies.push(ModDependency {
            id: "b".to_string(),
            ..ModDependency::default()
        });
        assert_eq!(SortPriority::rank(&dependent), SortPriority::AfterOrDependent);

        assert_eq!(SortPriority::rank(&entry("a", "A")), SortPriority::Unranked);
        assert!(SortPriority::ForceBefore < SortPriority::Unranked);
    }

    #[test]
    fn before_edge_places_declarer_first() {
        let mut a = entry("a", "Zed");
        a.load_before.push("b".to_string());
        let b = entry("b", "Apple");
        let items = vec![b, a];

        match sort_active(&items, &positions(&items)) {
            SortOutcome::Sorted(sorted) => assert_eq!(sorted, vec![1, 0]),
            SortOutcome::Cycle(cycle) => panic!("unexpected cycle: {cycle:?}"),
        }
    }

    #[test]
    fn after_and_dependency_edges_place_target_first() {
        let mut late = entry("late", "Aardvark");
        late.load_after.push("early".to_string());
        let mut dependent = entry("dep", "Aaa");
        dependent.dependencies.push(ModDependency {
            id: "early".to_string(),
            ..ModDependency::default()
        });
        let early = entry("early", "Zebra");
        let items = vec![late, dependent, early];

        match sort_active(&items, &positions(&items)) {
            SortOutcome::Sorted(sorted) => {
                let place = |position: usize| sorted.iter().position(|p| *p == position).unwrap();
                assert!(place(2) < place(0));
                assert!(place(2) < place(1));
            }
            SortOutcome::Cycle(cycle) => panic!("unexpected cycle: {cycle:?}"),
        }
    }

    #[test]
    fn ties_break_on_priority_then_name() {
        let base = ModEntry::new("base", "Base", ModCategory::BaseGame);
        let zeta = entry("zeta", "Zeta");
        let alpha = entry("alpha", "Alpha");
        let expansion = ModEntry::new("exp", "Expansion", ModCategory::Expansion);
        let items = vec![zeta, alpha, expansion, base];

        match sort_active(&items, &positions(&items)) {
            SortOutcome::Sorted(sorted) => assert_eq!(sorted, vec![3, 2, 1, 0]),
            SortOutcome::Cycle(cycle) => panic!("unexpected cycle: {cycle:?}"),
        }
    }

    #[test]
    fn self_and_unknown_references_are_dropped() {
        let mut odd = entry("odd", "Odd");
        odd.load_before.push("odd".to_string());
        odd.load_after.push("nowhere".to_string());
        let items = vec![odd];

        match sort_active(&items, &positions(&items)) {
            SortOutcome::Sorted(sorted) => assert_eq!(sorted, vec![0]),
            SortOutcome::Cycle(cycle) => panic!("unexpected cycle: {cycle:?}"),
        }
    }

    #[test]
    fn two_node_cycle_is_reported_with_path() {
        let mut a = entry("a", "A");
        a.load_before.push("b".to_string());
        let mut b = entry("b", "B");
        b.load_before.push("a".to_string());
        let items = vec![a, b];

        match sort_active(&items, &positions(&items)) {
            SortOutcome::Sorted(sorted) => panic!("unexpected order: {sorted:?}"),
            SortOutcome::Cycle(cycle) => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&0));
                assert!(cycle.contains(&1));
            }
        }
    }

    #[test]
    fn sort_is_deterministic() {
        let items = vec![entry("one", "Same"), entry("two", "Same"), entry("three", "Same")];
        let first = match sort_active(&items, &positions(&items)) {
            SortOutcome::Sorted(sorted) => sorted,
            SortOutcome::Cycle(cycle) => panic!("unexpected cycle: {cycle:?}"),
        };
        for _ in 0..5 {
            match sort_active(&items, &positions(&items)) {
                SortOutcome::Sorted(sorted) => assert_eq!(sorted, first),
                SortOutcome::Cycle(cycle) => panic!("unexpected cycle: {cycle:?}"),
            }
        }
    }
}
