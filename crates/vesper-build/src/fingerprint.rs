//! Content fingerprints of committed builds
//!
//! A fingerprint records "the committed program of this module was built
//! from exactly this source". Two backends:
//! - In-memory (for tests and one-shot builds)
//! - redb (persisted across editor sessions)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vesper_ast::ScriptRef;

use crate::{BuildType, Result};

const FINGERPRINTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("fingerprints");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// SHA-256 of the module source, lowercase hex
    pub hash: String,
    pub build_type: BuildType,
}

impl Fingerprint {
    pub fn of(source: &str, build_type: BuildType) -> Self {
        Self {
            hash: content_hash(source),
            build_type,
        }
    }
}

pub fn content_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Key-value store of fingerprints, keyed by script
pub trait FingerprintStore: Send {
    fn get(&self, script: &ScriptRef) -> Result<Option<Fingerprint>>;

    /// Store a fingerprint (insert or update)
    fn put(&mut self, script: &ScriptRef, fingerprint: &Fingerprint) -> Result<()>;

    /// Remove a fingerprint; removing a missing one is not an error
    fn delete(&mut self, script: &ScriptRef) -> Result<()>;

    /// Every script with a stored fingerprint
    fn list(&self) -> Result<Vec<ScriptRef>>;
}

#[derive(Debug, Default)]
pub struct InMemoryFingerprints {
    entries: HashMap<ScriptRef, Fingerprint>,
}

impl InMemoryFingerprints {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for InMemoryFingerprints {
    fn get(&self, script: &ScriptRef) -> Result<Option<Fingerprint>> {
        Ok(self.entries.get(script).cloned())
    }

    fn put(&mut self, script: &ScriptRef, fingerprint: &Fingerprint) -> Result<()> {
        self.entries.insert(script.clone(), fingerprint.clone());
        Ok(())
    }

    fn delete(&mut self, script: &ScriptRef) -> Result<()> {
        self.entries.remove(script);
        Ok(())
    }

    fn list(&self) -> Result<Vec<ScriptRef>> {
        let mut scripts: Vec<ScriptRef> = self.entries.keys().cloned().collect();
        scripts.sort();
        Ok(scripts)
    }
}

/// redb-backed fingerprint store
///
/// All fingerprints live in a single table of bincode-encoded records
/// keyed by the normalized script path.
pub struct RedbFingerprints {
    db: Database,
    path: PathBuf,
}

impl RedbFingerprints {
    /// Create or open a store at the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(FINGERPRINTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FingerprintStore for RedbFingerprints {
    fn get(&self, script: &ScriptRef) -> Result<Option<Fingerprint>> {
        let key = script.display_path();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FINGERPRINTS_TABLE)?;

        match table.get(key.as_str())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, script: &ScriptRef, fingerprint: &Fingerprint) -> Result<()> {
        let key = script.display_path();
        let bytes = bincode::serialize(fingerprint)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(FINGERPRINTS_TABLE)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    fn delete(&mut self, script: &ScriptRef) -> Result<()> {
        let key = script.display_path();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(FINGERPRINTS_TABLE)?;
            table.remove(key.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    fn list(&self) -> Result<Vec<ScriptRef>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FINGERPRINTS_TABLE)?;

        let mut scripts = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            scripts.push(ScriptRef::new(key.value()));
        }
        Ok(scripts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_hash_is_sha256_hex() {
        let hash = content_hash("");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_in_memory_crud() {
        let mut store = InMemoryFingerprints::new();
        let script = ScriptRef::new("Door.vsp");
        let fp = Fingerprint::of("behaviour Door {}", BuildType::Editor);

        store.put(&script, &fp).unwrap();
        assert_eq!(store.get(&script).unwrap(), Some(fp));

        store.delete(&script).unwrap();
        assert!(store.get(&script).unwrap().is_none());
        store.delete(&script).unwrap();
    }

    #[test]
    fn test_redb_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache").join("fingerprints.redb");
        let script = ScriptRef::new("Scripts/Door.vsp");
        let fp = Fingerprint::of("behaviour Door {}", BuildType::Client);

        {
            let mut store = RedbFingerprints::new(&path).unwrap();
            store.put(&script, &fp).unwrap();
        }

        let store = RedbFingerprints::new(&path).unwrap();
        assert_eq!(store.get(&script).unwrap(), Some(fp));
        assert_eq!(store.list().unwrap(), vec![script]);
    }
}
