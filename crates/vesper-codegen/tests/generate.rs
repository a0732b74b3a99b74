//! Integration tests for generating assembly from bound classes
//!
//! Tests the full pipeline: bind -> generate -> assemble

use vesper_ast::{ScriptRef, Value, ValueType};
use vesper_codegen::{generate, GenerateError};
use vesper_symbols::{bind_module, ClassDefinition, TypeError};
use vesper_vm::{assemble, ExternRegistry, Program};

/// Helper to bind every source, then generate the first one
fn generate_first(sources: &[&str]) -> Result<(vesper_codegen::GeneratedModule, Program), Vec<GenerateError>> {
    let externs = ExternRegistry::standard();
    let classes: Vec<ClassDefinition> = sources
        .iter()
        .enumerate()
        .map(|(i, src)| {
            bind_module(&ScriptRef::new(format!("M{}.vsp", i)), src, &externs)
                .expect("Failed to bind")
        })
        .collect();

    let module = generate(&classes[0], &classes, &externs)?;
    let program = assemble(&module.assembly, module.symbol_count, &externs)
        .expect("Generated assembly failed to assemble");
    Ok((module, program))
}

#[test]
fn test_fields_exported_and_synced() {
    let (module, program) = generate_first(&[r#"
behaviour Door {
    public int count;
    [synced] private string owner;
    private float speed = 1.5;
}
"#])
    .unwrap();

    assert!(program.exports.contains(&"count".to_string()));
    assert!(!program.exports.contains(&"speed".to_string()));
    assert!(program.sync_mode("owner").is_synced());
    assert_eq!(program.heap.len(), module.symbol_count);
}

#[test]
fn test_method_body_generates_constants_and_temps() {
    let (module, program) = generate_first(&[r#"
using Math;
behaviour Counter {
    public int total;
    public fn bump() {
        int step = max(2, 3);
        total = total + step * 2;
    }
}
"#])
    .unwrap();

    assert!(program.entry_points.contains_key("bump"));
    let constant = module
        .symbols
        .all_unique_symbols()
        .find(|s| s.default_value == Some(Value::Int(2)))
        .expect("constant 2 interned");
    assert!(constant.unique_name.starts_with("__const_Int"));
    assert!(module.assembly.contains("Math.max__Int_Int__Int"));
    assert!(module.assembly.contains("Int.op_Multiply__Int_Int__Int"));
}

#[test]
fn test_cross_module_member_access() {
    let (module, _) = generate_first(&[
        r#"
behaviour Switch {
    public Lamp lamp;
    public fn flip() {
        lamp.toggle();
        int b = lamp.brightness;
    }
}
"#,
        r#"
behaviour Lamp {
    public int brightness;
    public fn toggle() { brightness = 0; }
}
"#,
    ])
    .unwrap();

    assert!(module.assembly.contains("Behaviour.send"));
    assert!(module.assembly.contains("Behaviour.get"));
}

#[test]
fn test_unknown_behaviour_type() {
    let errors = generate_first(&["behaviour A { public Missing other; }"]).unwrap_err();
    assert!(matches!(
        &errors[0],
        GenerateError::Type(TypeError::UnknownType { name, .. }) if name == "Missing"
    ));
}

#[test]
fn test_private_member_not_visible() {
    let errors = generate_first(&[
        "behaviour A { public B b; fn f() { int x = b.secret; } }",
        "behaviour B { private int secret; }",
    ])
    .unwrap_err();
    assert!(matches!(
        &errors[0],
        GenerateError::Type(TypeError::UnknownMember { .. })
    ));
}

#[test]
fn test_type_mismatch_reported_per_statement() {
    let errors = generate_first(&[r#"
behaviour A {
    public int n;
    fn f() {
        n = "text";
        n = 2.5;
        n = 3;
    }
}
"#])
    .unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.code() == "E-TYPE-001"));
}

#[test]
fn test_object_creation_rejected() {
    let errors = generate_first(&[
        "behaviour A { public B b; fn f() { b = new B(); } }",
        "behaviour B { }",
    ])
    .unwrap_err();
    assert!(matches!(errors[0], GenerateError::ObjectCreation { .. }));
}

#[test]
fn test_jagged_arrays_are_object_arrays_on_heap() {
    let (_, program) = generate_first(&["behaviour A { public int[][] grid; }"]).unwrap();
    let address = program.address_of("grid").unwrap();
    assert_eq!(
        program.heap.get_type(address),
        Some(&ValueType::array_of(ValueType::Object))
    );
}
