//! Build cache: fingerprints plus debug snapshots of generated assembly

use std::collections::HashMap;

use vesper_ast::ScriptRef;

use crate::{BuildType, Fingerprint, FingerprintStore, InMemoryFingerprints, Result};

pub struct BuildCache {
    fingerprints: Box<dyn FingerprintStore>,
    assembly_snapshots: HashMap<(ScriptRef, BuildType), String>,
    last_build_type: Option<BuildType>,
}

impl BuildCache {
    pub fn new(fingerprints: Box<dyn FingerprintStore>) -> Self {
        Self {
            fingerprints,
            assembly_snapshots: HashMap::new(),
            last_build_type: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryFingerprints::new()))
    }

    /// Record that `script`'s committed program was built from `source`
    pub fn update_fingerprint(&mut self, script: &ScriptRef, source: &str, build_type: BuildType) -> Result<()> {
        self.fingerprints
            .put(script, &Fingerprint::of(source, build_type))
    }

    pub fn clear_fingerprint(&mut self, script: &ScriptRef) -> Result<()> {
        self.fingerprints.delete(script)
    }

    pub fn fingerprint(&self, script: &ScriptRef) -> Result<Option<Fingerprint>> {
        self.fingerprints.get(script)
    }

    /// Whether the stored fingerprint matches `source` built as `build_type`
    pub fn is_up_to_date(&self, script: &ScriptRef, source: &str, build_type: BuildType) -> Result<bool> {
        let expected = Fingerprint::of(source, build_type);
        Ok(self.fingerprints.get(script)?.is_some_and(|fp| fp == expected))
    }

    pub fn set_assembly_snapshot(&mut self, script: &ScriptRef, build_type: BuildType, assembly: &str) {
        self.assembly_snapshots
            .insert((script.clone(), build_type), assembly.to_string());
    }

    /// Assembly text last generated for `script` in a `build_type` build
    pub fn assembly_snapshot(&self, script: &ScriptRef, build_type: BuildType) -> Option<&str> {
        self.assembly_snapshots
            .get(&(script.clone(), build_type))
            .map(String::as_str)
    }

    pub fn last_build_type(&self) -> Option<BuildType> {
        self.last_build_type
    }

    pub(crate) fn set_last_build_type(&mut self, build_type: BuildType) {
        self.last_build_type = Some(build_type);
    }
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for BuildCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildCache")
            .field("snapshots", &self.assembly_snapshots.len())
            .field("last_build_type", &self.last_build_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_to_date_tracks_source() {
        let mut cache = BuildCache::in_memory();
        let script = ScriptRef::new("Door.vsp");

        assert!(!cache.is_up_to_date(&script, "a", BuildType::Editor).unwrap());
        cache.update_fingerprint(&script, "a", BuildType::Editor).unwrap();
        assert!(cache.is_up_to_date(&script, "a", BuildType::Editor).unwrap());
        assert!(!cache.is_up_to_date(&script, "b", BuildType::Editor).unwrap());

        cache.clear_fingerprint(&script).unwrap();
        assert!(!cache.is_up_to_date(&script, "a", BuildType::Editor).unwrap());
    }

    #[test]
    fn test_up_to_date_tracks_build_type() {
        let mut cache = BuildCache::in_memory();
        let script = ScriptRef::new("Door.vsp");

        cache.update_fingerprint(&script, "a", BuildType::Editor).unwrap();
        assert!(cache.is_up_to_date(&script, "a", BuildType::Editor).unwrap());
        assert!(!cache.is_up_to_date(&script, "a", BuildType::Client).unwrap());
    }

    #[test]
    fn test_snapshots_keyed_by_build_type() {
        let mut cache = BuildCache::in_memory();
        let script = ScriptRef::new("Door.vsp");
        cache.set_assembly_snapshot(&script, BuildType::Client, ".data_start\n.data_end");
        assert!(cache.assembly_snapshot(&script, BuildType::Editor).is_none());
        assert_eq!(
            cache.assembly_snapshot(&script, BuildType::Client),
            Some(".data_start\n.data_end")
        );
    }
}
