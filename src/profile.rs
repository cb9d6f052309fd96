use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// The persisted active-list document: profile name plus the ordered ids
/// of active mods. The engine consumes the id list at initialize and hands
/// back `active_ids()` to write here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadProfile {
    pub name: String,
    #[serde(default)]
    pub active: Vec<String>,
}

impl LoadProfile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: Vec::new(),
        }
    }

    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read profile {:?}", path))?;
            let profile: LoadProfile = serde_json::from_str(&raw).context("parse profile")?;
            return Ok(profile);
        }
        let profile = LoadProfile::new("Default");
        profile.save(path)?;
        Ok(profile)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create profile dir")?;
        }
        let raw = serde_json::to_string_pretty(self).context("serialize profile")?;
        fs::write(path, raw).with_context(|| format!("write profile {:?}", path))?;
        Ok(())
    }
}

pub fn default_profile_path() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base
        .data_local_dir()
        .join("loadsmith")
        .join("profile.json"))
}
