//! Registry of program assets taking part in builds
//!
//! The registry is owned explicitly by whoever drives builds. Discovery
//! is lazy: [`ProgramRegistry::ensure_built`] walks the project root the
//! first time it is needed and again after [`ProgramRegistry::invalidate`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use vesper_ast::ScriptRef;
use vesper_vm::ExternRegistry;
use walkdir::WalkDir;

use crate::{BuildConfig, ProgramAsset, Result, VmProgramAsset};

/// Index of a registered asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub usize);

pub struct ProgramRegistry {
    root: Option<PathBuf>,
    extension: String,
    externs: Arc<ExternRegistry>,
    assets: Vec<Box<dyn ProgramAsset>>,
    by_path: HashMap<ScriptRef, AssetId>,
    by_class: HashMap<String, AssetId>,
    built: bool,
}

impl ProgramRegistry {
    /// Registry filled by hand through [`ProgramRegistry::register`]
    pub fn new(externs: Arc<ExternRegistry>) -> Self {
        Self {
            root: None,
            extension: "vsp".to_string(),
            externs,
            assets: Vec::new(),
            by_path: HashMap::new(),
            by_class: HashMap::new(),
            built: true,
        }
    }

    /// Registry discovering `*.{extension}` files under `root`
    pub fn discover(root: impl Into<PathBuf>, extension: &str, externs: Arc<ExternRegistry>) -> Self {
        Self {
            root: Some(root.into()),
            extension: extension.trim_start_matches('.').to_string(),
            built: false,
            ..Self::new(externs)
        }
    }

    /// Registry discovering the sources `config` describes under `root`
    pub fn from_config(root: impl Into<PathBuf>, config: &BuildConfig, externs: Arc<ExternRegistry>) -> Self {
        Self::discover(root, &config.source_extension, externs)
    }

    pub fn externs(&self) -> &Arc<ExternRegistry> {
        &self.externs
    }

    pub fn register(&mut self, asset: Box<dyn ProgramAsset>) -> AssetId {
        let script = asset.script().clone();
        if let Some(&id) = self.by_path.get(&script) {
            self.assets[id.0] = asset;
            return id;
        }
        let id = AssetId(self.assets.len());
        self.assets.push(asset);
        self.by_path.insert(script, id);
        id
    }

    /// Walk the project root if discovery has not run yet
    pub fn ensure_built(&mut self) -> Result<()> {
        if self.built {
            return Ok(());
        }
        if let Some(root) = self.root.clone() {
            self.walk(&root)?;
        }
        self.built = true;
        Ok(())
    }

    /// Drop discovered assets and the class index
    pub fn invalidate(&mut self) {
        self.by_class.clear();
        if self.root.is_some() {
            self.assets.clear();
            self.by_path.clear();
            self.built = false;
        }
    }

    fn walk(&mut self, root: &Path) -> Result<()> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == self.extension.as_str())
            {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();

        for path in paths {
            let script = ScriptRef::new(path.strip_prefix(root).unwrap_or(path.as_path()));
            let asset = VmProgramAsset::from_file(&path, self.externs.clone()).with_script(script);
            if asset.source_text().is_none() {
                warn!(path = %path.display(), "Skipping program with unreadable source");
                continue;
            }
            self.register(Box::new(asset));
        }
        debug!(root = %root.display(), count = self.assets.len(), "Discovered programs");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn asset(&self, id: AssetId) -> Option<&dyn ProgramAsset> {
        self.assets.get(id.0).map(|a| a.as_ref())
    }

    pub fn asset_mut(&mut self, id: AssetId) -> Option<&mut (dyn ProgramAsset + 'static)> {
        self.assets.get_mut(id.0).map(|a| a.as_mut())
    }

    pub fn assets(&self) -> impl Iterator<Item = (AssetId, &dyn ProgramAsset)> {
        self.assets
            .iter()
            .enumerate()
            .map(|(i, a)| (AssetId(i), a.as_ref()))
    }

    pub fn id_of(&self, script: &ScriptRef) -> Option<AssetId> {
        self.by_path.get(script).copied()
    }

    pub fn lookup_by_path(&self, script: &ScriptRef) -> Option<&dyn ProgramAsset> {
        self.id_of(script).and_then(|id| self.asset(id))
    }

    /// Asset declaring the behaviour `name`; filled after a successful bind
    pub fn lookup_by_class(&self, name: &str) -> Option<&dyn ProgramAsset> {
        self.by_class.get(name).and_then(|&id| self.asset(id))
    }

    pub(crate) fn index_class(&mut self, name: &str, id: AssetId) {
        self.by_class.insert(name.to_string(), id);
    }
}

impl std::fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("root", &self.root)
            .field("assets", &self.assets.len())
            .field("built", &self.built)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_discovery_filters_by_extension() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("scripts/doors")).unwrap();
        fs::write(dir.path().join("scripts/doors/Door.vsp"), "behaviour Door {}").unwrap();
        fs::write(dir.path().join("scripts/Lamp.vsp"), "behaviour Lamp {}").unwrap();
        fs::write(dir.path().join("scripts/notes.txt"), "ignored").unwrap();

        let mut registry = ProgramRegistry::discover(dir.path(), "vsp", Arc::new(ExternRegistry::standard()));
        assert!(registry.is_empty());
        registry.ensure_built().unwrap();
        assert_eq!(registry.len(), 2);

        let door = ScriptRef::new(Path::new("scripts").join("doors").join("Door.vsp"));
        assert!(registry.lookup_by_path(&door).is_some());
    }

    #[test]
    fn test_config_sets_source_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Door.vspx"), "behaviour Door {}").unwrap();
        fs::write(dir.path().join("Lamp.vsp"), "behaviour Lamp {}").unwrap();
        let config = BuildConfig::from_json_str(r#"{ "source_extension": "vspx" }"#).unwrap();

        let mut registry = ProgramRegistry::from_config(dir.path(), &config, Arc::new(ExternRegistry::standard()));
        registry.ensure_built().unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup_by_path(&"Door.vspx".into()).is_some());
    }

    #[test]
    fn test_invalidate_rediscovers() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.vsp"), "behaviour A {}").unwrap();

        let mut registry = ProgramRegistry::discover(dir.path(), ".vsp", Arc::new(ExternRegistry::standard()));
        registry.ensure_built().unwrap();
        assert_eq!(registry.len(), 1);

        fs::write(dir.path().join("B.vsp"), "behaviour B {}").unwrap();
        registry.ensure_built().unwrap();
        assert_eq!(registry.len(), 1);

        registry.invalidate();
        registry.ensure_built().unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_replaces_same_script() {
        let externs = Arc::new(ExternRegistry::standard());
        let mut registry = ProgramRegistry::new(externs.clone());
        let a = registry.register(Box::new(VmProgramAsset::inline("A.vsp", "one", externs.clone())));
        let b = registry.register(Box::new(VmProgramAsset::inline("A.vsp", "two", externs)));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.asset(a).unwrap().source_text().as_deref(), Some("two"));
    }
}
