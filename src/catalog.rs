use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

/// One addon package as the engine sees it. Catalog construction happens
/// outside the engine; the engine only flips `active` and the issue fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: ModCategory,
    #[serde(default)]
    pub load_before: Vec<String>,
    #[serde(default)]
    pub force_load_before: Vec<String>,
    #[serde(default)]
    pub load_after: Vec<String>,
    #[serde(default)]
    pub force_load_after: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<ModDependency>,
    #[serde(default)]
    pub incompatibilities: HashMap<String, ConflictRule>,
    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub has_issue: bool,
    #[serde(skip)]
    pub issue_text: String,
}

impl ModEntry {
    pub fn new(id: &str, name: &str, category: ModCategory) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn is_base_game(&self) -> bool {
        matches!(self.category, ModCategory::BaseGame)
    }

    pub fn is_expansion(&self) -> bool {
        matches!(self.category, ModCategory::Expansion)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModCategory {
    BaseGame,
    Expansion,
    Addon,
    Override,
}

impl Default for ModCategory {
    fn default() -> Self {
        Self::Addon
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModDependency {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub workshop_id: Option<String>,
}

impl ModDependency {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub mods: Vec<ModEntry>,
}

pub fn load_catalog(path: &Path) -> Result<Vec<ModEntry>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read catalog {:?}", path))?;
    let catalog: CatalogFile = serde_json::from_str(&raw).context("parse catalog")?;
    Ok(catalog.mods)
}
