use crate::catalog::ModEntry;
use std::collections::HashMap;

pub fn normalize_id(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

/// Case-insensitive package-id lookup over the full catalog. On duplicate
/// ids the first occurrence wins; later instances never resolve.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    by_id: HashMap<String, usize>,
}

impl IdIndex {
    pub fn build(items: &[ModEntry]) -> Self {
        let mut by_id = HashMap::new();
        for (position, item) in items.iter().enumerate() {
            let key = normalize_id(&item.id);
            if key.is_empty() {
                continue;
            }
            by_id.entry(key).or_insert(position);
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<usize> {
        self.by_id.get(&normalize_id(id)).copied()
    }

    pub fn map(&self) -> &HashMap<String, usize> {
        &self.by_id
    }
}
