use crate::index::normalize_id;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupEntry {
    pub name: String,
    #[serde(default)]
    pub workshop_id: Option<String>,
}

/// Canonical metadata for an identifier the catalog does not know. Used
/// only to repair the display name / external reference of unresolved
/// dependencies; network-backed implementations live outside this crate.
pub trait MetadataLookup {
    fn lookup(&self, id: &str) -> Option<LookupEntry>;
}

#[derive(Debug, Default, Clone)]
pub struct NullLookup;

impl MetadataLookup for NullLookup {
    fn lookup(&self, _id: &str) -> Option<LookupEntry> {
        None
    }
}

/// Lookup backed by a plain id -> entry table, loadable from a JSON file.
#[derive(Debug, Default, Clone)]
pub struct TableLookup {
    entries: HashMap<String, LookupEntry>,
}

impl TableLookup {
    pub fn new(entries: HashMap<String, LookupEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(id, entry)| (normalize_id(&id), entry))
            .collect();
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read lookup {:?}", path))?;
        let entries: HashMap<String, LookupEntry> =
            serde_json::from_str(&raw).context("parse lookup")?;
        Ok(Self::new(entries))
    }
}

impl MetadataLookup for TableLookup {
    fn lookup(&self, id: &str) -> Option<LookupEntry> {
        self.entries.get(&normalize_id(id)).cloned()
    }
}

/// A reference is browsable when it is a plain workshop handle, all
/// digits. Anything else gets the repair path.
pub fn is_browsable_reference(reference: Option<&str>) -> bool {
    match reference {
        Some(value) => !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()),
        None => false,
    }
}
