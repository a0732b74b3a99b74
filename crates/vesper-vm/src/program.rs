//! Linked programs

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use vesper_ast::{Value, ValueType};

use crate::{Heap, HeapError};

/// Network synchronization of a heap variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncMode {
    #[default]
    NotSynced,
    /// Synced without interpolation
    None,
    Linear,
    Smooth,
}

impl SyncMode {
    pub fn is_synced(self) -> bool {
        self != SyncMode::NotSynced
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "none" => Some(SyncMode::None),
            "linear" => Some(SyncMode::Linear),
            "smooth" => Some(SyncMode::Smooth),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::NotSynced => "notsynced",
            SyncMode::None => "none",
            SyncMode::Linear => "linear",
            SyncMode::Smooth => "smooth",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name to heap address mapping of a linked program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramSymbols {
    addresses: HashMap<String, u32>,
    names: Vec<String>,
}

impl ProgramSymbols {
    pub(crate) fn insert(&mut self, name: String) -> u32 {
        let address = self.names.len() as u32;
        self.addresses.insert(name.clone(), address);
        self.names.push(name);
        address
    }

    pub fn address_of(&self, name: &str) -> Option<u32> {
        self.addresses.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.addresses.contains_key(name)
    }

    pub fn name_of(&self, address: u32) -> Option<&str> {
        self.names.get(address as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Push(u32),
    Pop,
    Copy,
    Extern(String),
    Jump(u32),
    JumpIfFalse(u32),
}

/// A linked, verified program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub heap: Heap,
    pub symbols: ProgramSymbols,
    pub code: Vec<Instruction>,
    /// Exported data symbols
    pub exports: Vec<String>,
    /// Exported entry points and their instruction index
    pub entry_points: BTreeMap<String, u32>,
    pub sync: BTreeMap<String, SyncMode>,
}

impl Program {
    pub fn address_of(&self, name: &str) -> Option<u32> {
        self.symbols.address_of(name)
    }

    /// Read a heap variable by symbol name
    pub fn get_variable(&self, name: &str) -> Option<&Value> {
        self.address_of(name).and_then(|addr| self.heap.get(addr))
    }

    /// Write a heap variable by symbol name
    pub fn set_variable(&mut self, name: &str, value: Value, ty: &ValueType) -> Result<(), HeapError> {
        let address = self
            .address_of(name)
            .ok_or_else(|| HeapError::UnknownSymbol(name.to_string()))?;
        self.heap.set(address, value, ty)
    }

    pub fn sync_mode(&self, name: &str) -> SyncMode {
        self.sync.get(name).copied().unwrap_or_default()
    }
}
