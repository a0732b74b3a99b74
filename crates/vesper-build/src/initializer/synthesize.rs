//! Auxiliary initializer units
//!
//! For a module with evaluated field initializers this writes a small
//! Vesper program:
//!
//! ```text
//! using Math;
//! initializer Initializer0 {
//!     const int SIDE = 4;
//!     const int LIMIT = 10;
//!     const int AREA = SIDE * SIDE;
//!     fn __init() {
//!         __program.store("AREA", AREA);
//!         int speed = max(3, SIDE);
//!         __program.store("speed", speed);
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

use vesper_ast::{ScriptRef, ValueType};
use vesper_symbols::{ClassDefinition, FieldDefinition};

use super::StoreRoute;

/// Name of the host object initializer routines store through
pub const PROGRAM_INTRINSIC: &str = "__program";
/// Entry routine of every unit
pub const ENTRY_ROUTINE: &str = "__init";

/// Synthesized source of one module's initializers
#[derive(Debug, Clone, PartialEq)]
pub struct InitializerUnit {
    pub index: usize,
    /// `Initializer{index}`
    pub class_name: String,
    /// Module the values are computed for
    pub script: ScriptRef,
    pub source: String,
    /// Heap symbols the unit may store into, with their declared types
    pub targets: BTreeMap<String, ValueType>,
}

impl InitializerUnit {
    pub fn class_name_for(index: usize) -> String {
        format!("Initializer{}", index)
    }
}

/// Build the unit for `class`, whose evaluated fields are `fields`
pub fn synthesize(index: usize, class: &ClassDefinition, fields: &[FieldDefinition]) -> InitializerUnit {
    let class_name = InitializerUnit::class_name_for(index);
    let mut consts = String::new();
    let mut body = String::new();
    let mut targets = BTreeMap::new();

    // Literal fields stay visible to the expressions that use them
    for field in &class.fields {
        if let Some(init) = field.initializer.as_ref().filter(|i| i.is_literal) {
            let _ = writeln!(consts, "    const {} {} = {};", field.declared_type, field.name, init.text);
        }
    }

    for field in fields {
        let Some(init) = &field.initializer else {
            continue;
        };
        let symbol = class
            .symbol(field.symbol)
            .map(|s| s.unique_name.clone())
            .unwrap_or_else(|| field.name.clone());

        if field.is_const {
            let _ = writeln!(consts, "    const {} {} = {};", field.declared_type, field.name, init.text);
        } else {
            let _ = writeln!(body, "        {} {} = {};", field.declared_type, field.name, init.text);
        }

        let store = match StoreRoute::for_type(&field.declared_type) {
            StoreRoute::Serialized => "store_serialized",
            StoreRoute::Direct(_) => "store",
        };
        let _ = writeln!(body, "        {}.{}({:?}, {});", PROGRAM_INTRINSIC, store, symbol, field.name);
        targets.insert(symbol, field.declared_type.clone());
    }

    let mut source = String::new();
    for using in &class.resolver.usings {
        let _ = writeln!(source, "using {};", using);
    }
    let _ = writeln!(source, "initializer {} {{", class_name);
    source.push_str(&consts);
    let _ = writeln!(source, "    fn {}() {{", ENTRY_ROUTINE);
    source.push_str(&body);
    source.push_str("    }\n}\n");

    InitializerUnit {
        index,
        class_name,
        script: class.script.clone(),
        source,
        targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_symbols::bind_module;
    use vesper_vm::ExternRegistry;

    fn unit_for(source: &str) -> InitializerUnit {
        let class = bind_module(&"Door.vsp".into(), source, &ExternRegistry::standard()).unwrap();
        let fields: Vec<FieldDefinition> = class.fields_with_initializers().cloned().collect();
        synthesize(3, &class, &fields)
    }

    #[test]
    fn test_unit_layout() {
        let unit = unit_for(
            r#"
using Math;
behaviour Door {
    const int SIDE = 4;
    const int AREA = SIDE * SIDE;
    public int speed = max(3, SIDE);
    public int plain = 2;
}
"#,
        );
        assert_eq!(unit.class_name, "Initializer3");
        assert_eq!(
            unit.source,
            "using Math;\n\
             initializer Initializer3 {\n\
             \x20   const int SIDE = 4;\n\
             \x20   const int plain = 2;\n\
             \x20   const int AREA = SIDE * SIDE;\n\
             \x20   fn __init() {\n\
             \x20       __program.store(\"AREA\", AREA);\n\
             \x20       int speed = max(3, SIDE);\n\
             \x20       __program.store(\"speed\", speed);\n\
             \x20   }\n\
             }\n"
        );
        assert_eq!(unit.targets.len(), 2);
        assert_eq!(unit.targets.get("speed"), Some(&ValueType::Int));
    }

    #[test]
    fn test_jagged_fields_store_serialized() {
        let unit = unit_for("behaviour Grid { public int[][] cells = new int[2][]; }");
        assert!(unit.source.contains("int[][] cells = new int[2][];"));
        assert!(unit.source.contains("__program.store_serialized(\"cells\", cells);"));
    }
}
