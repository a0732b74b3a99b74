//! Heap constant assignment
//!
//! Pass 1 runs right after compilation and writes literal defaults plus
//! the zero values public arrays and strings observably have on the
//! host. Pass 2 runs after field initializers and fills whatever is
//! still unset. Neither pass overwrites a slot that already holds a value.

use tracing::{debug, info};
use vesper_ast::{Value, ValueType};
use vesper_symbols::{SymbolDefinition, SymbolTable};
use vesper_vm::{HeapError, Program};

use crate::{ErrorKind, Module, ProgramRegistry};

/// A default that could not be written
#[derive(Debug, Clone, PartialEq)]
pub struct HeapWriteFailure {
    pub symbol: String,
    pub error: HeapError,
}

/// Pass 1: literal defaults, then public array and string zero values
pub fn assign_constants(symbols: &SymbolTable, program: &mut Program) -> Vec<HeapWriteFailure> {
    write_defaults(symbols, program, |symbol, slot_ty| {
        if let Some(value) = symbol.default_value.as_ref().filter(|v| !v.is_null()) {
            return Some(value.clone());
        }
        public_zero_value(symbol, slot_ty)
    })
}

/// Pass 2: zero values for anything still unset
///
/// Synced private strings are included because the synchronization
/// layer cannot serialize an absent string.
pub fn fill_unset_defaults(symbols: &SymbolTable, program: &mut Program) -> Vec<HeapWriteFailure> {
    write_defaults(symbols, program, |symbol, slot_ty| {
        public_zero_value(symbol, slot_ty).or_else(|| {
            (symbol.flags.is_private() && symbol.sync_mode.is_synced() && symbol.value_type.is_string())
                .then(|| Value::string(""))
        })
    })
}

fn public_zero_value(symbol: &SymbolDefinition, slot_ty: &ValueType) -> Option<Value> {
    if !symbol.flags.is_public() {
        return None;
    }
    if symbol.value_type.is_array() {
        slot_ty.element().map(|element| Value::empty_array(element.clone()))
    } else if symbol.value_type.is_string() {
        Some(Value::string(""))
    } else {
        None
    }
}

fn write_defaults<F>(symbols: &SymbolTable, program: &mut Program, mut default_for: F) -> Vec<HeapWriteFailure>
where
    F: FnMut(&SymbolDefinition, &ValueType) -> Option<Value>,
{
    let mut failures = Vec::new();
    for symbol in symbols.all_unique_symbols() {
        let Some(address) = program.address_of(&symbol.unique_name) else {
            debug!(symbol = %symbol.unique_name, "Symbol has no heap address");
            continue;
        };
        if program.heap.get(address).is_some() {
            continue;
        }
        // Slot types come from the assembly; jagged arrays live as object arrays
        let slot_ty = program
            .heap
            .get_type(address)
            .cloned()
            .unwrap_or_else(|| symbol.value_type.clone());
        let Some(value) = default_for(symbol, &slot_ty) else {
            continue;
        };
        if let Err(error) = program.heap.set(address, value, &slot_ty) {
            failures.push(HeapWriteFailure {
                symbol: symbol.unique_name.clone(),
                error,
            });
        }
    }
    failures
}

/// Run a pass over every compiled module, returning the number of errors
pub(crate) fn run_pass(
    name: &str,
    modules: &mut [Module],
    registry: &mut ProgramRegistry,
    pass: fn(&SymbolTable, &mut Program) -> Vec<HeapWriteFailure>,
) -> usize {
    info!(pass = name, "Assigning heap defaults");
    let mut error_count = 0;
    for module in modules.iter_mut() {
        let Some(symbols) = &module.symbols else {
            continue;
        };
        let Some(program) = registry
            .asset_mut(module.asset)
            .and_then(|asset| asset.program_mut())
        else {
            let error = module.error(ErrorKind::Internal, "compiled module has no program");
            module.report(error);
            error_count += 1;
            continue;
        };

        let failures = pass(symbols, program);
        for failure in failures {
            let error = module.error(
                ErrorKind::Internal,
                format!("failed to write default of '{}': {}", failure.symbol, failure.error),
            );
            module.report(error);
            error_count += 1;
        }
    }
    error_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_symbols::DeclFlags;
    use vesper_vm::{assemble, ExternRegistry, SyncMode};

    fn program_for(table: &SymbolTable) -> Program {
        let mut text = String::from(".data_start\n");
        for symbol in table.all_unique_symbols() {
            text.push_str(&format!(
                "    {}: %{}, null\n",
                symbol.unique_name,
                symbol.value_type.assembly_name()
            ));
        }
        text.push_str(".data_end\n.code_start\n.code_end\n");
        assemble(&text, table.len(), &ExternRegistry::standard()).unwrap()
    }

    #[test]
    fn test_pass_one_writes_literals_and_public_zero_values() {
        let mut table = SymbolTable::new();
        table
            .define_field("speed", ValueType::Float, DeclFlags::PRIVATE, Some(Value::Float(2.5)), SyncMode::NotSynced)
            .unwrap();
        table
            .define_field("names", ValueType::array_of(ValueType::String), DeclFlags::PUBLIC, None, SyncMode::NotSynced)
            .unwrap();
        table
            .define_field("title", ValueType::String, DeclFlags::PUBLIC, None, SyncMode::NotSynced)
            .unwrap();
        table
            .define_field("secret", ValueType::String, DeclFlags::PRIVATE, None, SyncMode::NotSynced)
            .unwrap();
        let mut program = program_for(&table);

        let failures = assign_constants(&table, &mut program);
        assert!(failures.is_empty());
        assert_eq!(program.get_variable("speed"), Some(&Value::Float(2.5)));
        assert_eq!(
            program.get_variable("names"),
            Some(&Value::empty_array(ValueType::String))
        );
        assert_eq!(program.get_variable("title"), Some(&Value::string("")));
        assert_eq!(program.get_variable("secret"), None);
    }

    #[test]
    fn test_pass_two_fills_synced_private_strings_only() {
        let mut table = SymbolTable::new();
        table
            .define_field("owner", ValueType::String, DeclFlags::PRIVATE, None, SyncMode::None)
            .unwrap();
        table
            .define_field("note", ValueType::String, DeclFlags::PRIVATE, None, SyncMode::NotSynced)
            .unwrap();
        let mut program = program_for(&table);

        assert!(assign_constants(&table, &mut program).is_empty());
        assert_eq!(program.get_variable("owner"), None);

        assert!(fill_unset_defaults(&table, &mut program).is_empty());
        assert_eq!(program.get_variable("owner"), Some(&Value::string("")));
        assert_eq!(program.get_variable("note"), None);
    }

    #[test]
    fn test_existing_values_are_never_overwritten() {
        let mut table = SymbolTable::new();
        table
            .define_field("title", ValueType::String, DeclFlags::PUBLIC, None, SyncMode::NotSynced)
            .unwrap();
        let mut program = program_for(&table);
        program
            .set_variable("title", Value::string("kept"), &ValueType::String)
            .unwrap();

        fill_unset_defaults(&table, &mut program);
        assert_eq!(program.get_variable("title"), Some(&Value::string("kept")));
    }

    #[test]
    fn test_constants_get_their_literal() {
        let mut table = SymbolTable::new();
        let id = table.define_constant(&Value::Int(7));
        let name = table.get(id).unwrap().unique_name.clone();
        let mut program = program_for(&table);

        assign_constants(&table, &mut program);
        assert_eq!(program.get_variable(&name), Some(&Value::Int(7)));
    }
}
