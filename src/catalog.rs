use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

const CATALOG_FILE: &str = "catalog.json";

/// One labelled reference photo of a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPhoto {
    pub label: String,
    pub image: PathBuf,
}

/// A named target and its form photos, in tie-break order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub forms: Vec<FormPhoto>,
}

/// Catalog of targets the bot cares about.
///
/// Target order decides which name wins a lookup, form order decides which
/// label wins when several photos clear the threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCatalog {
    #[serde(default)]
    targets: Vec<Target>,
}

impl TargetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog from the default location, empty if the file is absent
    pub fn load() -> Result<Self, CatalogError> {
        let path = Self::catalog_path()?;
        if !path.exists() {
            tracing::info!("[catalog] {} not found, starting with an empty catalog", path.display());
            return Ok(Self::new());
        }
        Self::load_from(&path)
    }

    /// Load a catalog file. Relative image paths resolve against the file's directory.
    pub fn load_from(path: &Path) -> Result<Self, CatalogError> {
        let wrap = |e: Box<dyn std::error::Error + Send + Sync>| CatalogError::LoadFailed {
            path: path.display().to_string(),
            source: e,
        };

        let content = fs::read_to_string(path).map_err(|e| wrap(Box::new(e)))?;
        let mut catalog: TargetCatalog =
            serde_json::from_str(&content).map_err(|e| wrap(Box::new(e)))?;

        if let Some(dup) = catalog.first_duplicate() {
            return Err(CatalogError::DuplicateTarget(dup));
        }

        if let Some(base) = path.parent() {
            catalog.resolve_relative_to(base);
        }

        tracing::info!(
            "[catalog] Loaded: {} names, {} photos.",
            catalog.len(),
            catalog.photo_count()
        );
        Ok(catalog)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CatalogError> {
        let wrap = |e: Box<dyn std::error::Error + Send + Sync>| CatalogError::SaveFailed {
            path: path.display().to_string(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| wrap(Box::new(e)))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| wrap(Box::new(e)))?;
        fs::write(path, json).map_err(|e| wrap(Box::new(e)))?;
        Ok(())
    }

    pub fn catalog_path() -> Result<PathBuf, CatalogError> {
        dirs::config_dir()
            .map(|dir| dir.join("EncounterScout").join(CATALOG_FILE))
            .ok_or_else(|| CatalogError::NotFound("user config directory".to_string()))
    }

    /// Append a target; names are unique ignoring case
    pub fn add_target(&mut self, name: impl Into<String>) -> Result<&mut Target, CatalogError> {
        let name = name.into();
        if self.find(&name).is_some() {
            return Err(CatalogError::DuplicateTarget(name));
        }
        self.targets.push(Target {
            name,
            forms: Vec::new(),
        });
        let last = self.targets.len() - 1;
        Ok(&mut self.targets[last])
    }

    /// Append a form photo to an existing target
    pub fn add_form(
        &mut self,
        target: &str,
        label: impl Into<String>,
        image: impl Into<PathBuf>,
    ) -> Result<(), CatalogError> {
        let key = normalize(target);
        let entry = self
            .targets
            .iter_mut()
            .find(|t| normalize(&t.name) == key)
            .ok_or_else(|| CatalogError::NotFound(target.to_string()))?;
        entry.forms.push(FormPhoto {
            label: label.into(),
            image: image.into(),
        });
        Ok(())
    }

    /// Case-insensitive lookup returning the canonical entry
    pub fn find(&self, name: &str) -> Option<&Target> {
        let key = normalize(name);
        if key.is_empty() {
            return None;
        }
        self.targets.iter().find(|t| normalize(&t.name) == key)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn photo_count(&self) -> usize {
        self.targets.iter().map(|t| t.forms.len()).sum()
    }

    fn first_duplicate(&self) -> Option<String> {
        let mut seen = std::collections::HashSet::new();
        self.targets
            .iter()
            .find(|t| !seen.insert(normalize(&t.name)))
            .map(|t| t.name.clone())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for form in self.targets.iter_mut().flat_map(|t| t.forms.iter_mut()) {
            if form.image.is_relative() {
                form.image = base.join(&form.image);
            }
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> TargetCatalog {
        let mut catalog = TargetCatalog::new();
        catalog.add_target("zymbat").unwrap();
        catalog.add_form("zymbat", "gamma", "zymbat/gamma.png").unwrap();
        catalog.add_form("zymbat", "dull", "zymbat/dull.png").unwrap();
        catalog.add_target("Vambat").unwrap();
        catalog
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let catalog = sample_catalog();

        let target = catalog.find("Zymbat").unwrap();
        assert_eq!(target.name, "zymbat");
        assert_eq!(catalog.find("  VAMBAT ").unwrap().name, "Vambat");
        assert!(catalog.find("Twilat").is_none());
        assert!(catalog.find("").is_none());
    }

    #[test]
    fn test_form_order_is_preserved() {
        let catalog = sample_catalog();
        let labels: Vec<&str> = catalog
            .find("zymbat")
            .unwrap()
            .forms
            .iter()
            .map(|f| f.label.as_str())
            .collect();
        assert_eq!(labels, vec!["gamma", "dull"]);
        assert_eq!(catalog.photo_count(), 2);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut catalog = sample_catalog();
        assert!(matches!(
            catalog.add_target("ZYMBAT"),
            Err(CatalogError::DuplicateTarget(_))
        ));
        assert!(matches!(
            catalog.add_form("missing", "gamma", "x.png"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = std::env::temp_dir().join(format!("encounter-scout-cat-{}", std::process::id()));
        let path = dir.join("catalog.json");
        sample_catalog().save_to(&path).unwrap();

        let loaded = TargetCatalog::load_from(&path).unwrap();
        let form = &loaded.find("zymbat").unwrap().forms[0];
        assert_eq!(form.image, dir.join("zymbat/gamma.png"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rejects_duplicate_names_in_file() {
        let dir = std::env::temp_dir().join(format!("encounter-scout-dup-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.json");
        fs::write(
            &path,
            r#"{ "targets": [ { "name": "Zymbat" }, { "name": "zymbat" } ] }"#,
        )
        .unwrap();

        assert!(matches!(
            TargetCatalog::load_from(&path),
            Err(CatalogError::DuplicateTarget(_))
        ));

        let _ = fs::remove_dir_all(&dir);
    }
}
