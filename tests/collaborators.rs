//! Builds driven through swapped-in generators, initializer backends and assets

mod common;

use common::*;
use vesper_ast::{LinePosition, ScriptRef, Value};
use vesper_build::initializer::{
    InitializerAssembly, InitializerCompilation, InitializerDiagnostic, InitializerFault, Severity,
};
use vesper_build::{
    AssemblyGenerator, BuildState, ErrorKind, HeapBridge, InitializerBackend, InitializerUnit, ModuleGenerator,
    ProgramAsset, VmProgramAsset,
};
use vesper_codegen::{GenerateError, GeneratedModule};
use vesper_symbols::{ClassDefinition, ClassLookup};
use vesper_vm::Program;

/// Generator that miscounts the symbols of one class
struct MiscountingGenerator {
    inner: AssemblyGenerator,
    class: &'static str,
}

impl ModuleGenerator for MiscountingGenerator {
    fn generate(&self, class: &ClassDefinition, classes: &dyn ClassLookup) -> Result<GeneratedModule, Vec<GenerateError>> {
        let mut generated = self.inner.generate(class, classes)?;
        if class.name == self.class {
            generated.symbol_count += 1;
        }
        Ok(generated)
    }
}

/// Generator that crashes on one class
struct CrashingGenerator {
    inner: AssemblyGenerator,
    class: &'static str,
}

impl ModuleGenerator for CrashingGenerator {
    fn generate(&self, class: &ClassDefinition, classes: &dyn ClassLookup) -> Result<GeneratedModule, Vec<GenerateError>> {
        if class.name == self.class {
            panic!("emitter ran out of registers");
        }
        self.inner.generate(class, classes)
    }
}

/// Asset whose assembler reports failures without a message
struct QuietAsset(VmProgramAsset);

impl ProgramAsset for QuietAsset {
    fn script(&self) -> &ScriptRef {
        self.0.script()
    }

    fn source_text(&self) -> Option<String> {
        self.0.source_text()
    }

    fn set_assembly_text(&mut self, text: &str) {
        self.0.set_assembly_text(text)
    }

    fn assembly_text(&self) -> &str {
        self.0.assembly_text()
    }

    fn assemble(&mut self, symbol_count: usize) -> Result<(), String> {
        self.0.assemble(symbol_count).map_err(|_| String::new())
    }

    fn program(&self) -> Option<&Program> {
        self.0.program()
    }

    fn program_mut(&mut self) -> Option<&mut Program> {
        self.0.program_mut()
    }

    fn compile_errors(&self) -> &[String] {
        self.0.compile_errors()
    }

    fn compile_errors_mut(&mut self) -> &mut Vec<String> {
        self.0.compile_errors_mut()
    }

    fn commit(&mut self) {
        self.0.commit()
    }

    fn live_program(&self) -> Option<&Program> {
        self.0.live_program()
    }
}

/// Backend returning fixed diagnostics and, optionally, an assembly
struct ScriptedBackend {
    diagnostics: Vec<InitializerDiagnostic>,
    crash_on_invoke: bool,
}

struct CrashingAssembly;

impl InitializerAssembly for CrashingAssembly {
    fn id(&self) -> &str {
        "crashing"
    }

    fn invoke(&self, _class_name: &str, _program: &mut Program, _bridge: &HeapBridge) -> Result<(), InitializerFault> {
        panic!("routine table corrupted");
    }
}

impl InitializerBackend for ScriptedBackend {
    fn compile(&self, _assembly_id: &str, _units: &[InitializerUnit], _classes: &dyn ClassLookup) -> InitializerCompilation {
        InitializerCompilation {
            diagnostics: self.diagnostics.clone(),
            assembly: self
                .crash_on_invoke
                .then(|| Box::new(CrashingAssembly) as Box<dyn InitializerAssembly>),
        }
    }
}

fn generator_builder(generator: impl ModuleGenerator + 'static) -> vesper_build::Builder {
    concurrent_builder().with_generator(generator)
}

#[test]
fn test_assemble_failure_stays_with_its_module() {
    let mut registry = registry(&[
        ("A.vsp", "behaviour A { public int x; }"),
        ("B.vsp", "behaviour B { public int y; }"),
    ]);
    let mut builder = generator_builder(MiscountingGenerator {
        inner: AssemblyGenerator::new(externs()),
        class: "B",
    });

    let report = builder.build(&mut registry).unwrap();

    assert_eq!(report.failed_gate, Some(BuildState::Compile));
    assert_eq!(report.error_count, 1);
    let error = &report.errors[0];
    assert_eq!(error.kind, ErrorKind::Assemble);
    assert_eq!(error.script, ScriptRef::from("B.vsp"));
    assert!(error.message.contains("E-ASM-006"), "{}", error.message);

    assert!(staged(&registry, "A.vsp").is_some());
    assert!(staged(&registry, "B.vsp").is_none());
    let b = registry.lookup_by_path(&"B.vsp".into()).unwrap();
    assert_eq!(b.compile_errors().len(), 1);
    assert!(live(&registry, "A.vsp").is_none());
}

#[test]
fn test_unexplained_assemble_failure_gets_a_message() {
    let externs = externs();
    let mut registry = vesper_build::ProgramRegistry::new(externs.clone());
    registry.register(Box::new(VmProgramAsset::inline(
        "A.vsp",
        "behaviour A { public int x; }",
        externs.clone(),
    )));
    registry.register(Box::new(QuietAsset(VmProgramAsset::inline(
        "B.vsp",
        "behaviour B { public int y; }",
        externs.clone(),
    ))));
    let mut builder = sequential_builder().with_generator(MiscountingGenerator {
        inner: AssemblyGenerator::new(externs),
        class: "B",
    });

    let report = builder.build(&mut registry).unwrap();

    assert_eq!(report.error_count, 1);
    assert_eq!(report.errors[0].message, "Failed to assemble program");
    let b = registry.lookup_by_path(&"B.vsp".into()).unwrap();
    assert_eq!(b.compile_errors(), ["Failed to assemble program".to_string()]);
}

#[test]
fn test_generator_panic_is_positioned_at_class() {
    let mut registry = registry(&[
        ("A.vsp", "behaviour A { public int x; }"),
        ("B.vsp", "\nbehaviour B { public int y; }"),
    ]);
    let mut builder = generator_builder(CrashingGenerator {
        inner: AssemblyGenerator::new(externs()),
        class: "B",
    });

    let report = builder.build(&mut registry).unwrap();

    assert_eq!(report.failed_gate, Some(BuildState::Compile));
    assert_eq!(report.error_count, 1);
    let error = &report.errors[0];
    assert_eq!(error.kind, ErrorKind::Generate);
    assert!(error.message.starts_with("internal compiler error: "));
    assert!(error.message.contains("emitter ran out of registers"));
    assert_eq!(error.line, 1);
    assert!(staged(&registry, "A.vsp").is_some());
}

#[test]
fn test_backend_without_assembly_fails_every_pending_module() {
    let mut registry = registry(&[
        ("A.vsp", "behaviour A { public int a = 2 * 3; }"),
        ("B.vsp", "behaviour B { public int b = 4 * 5; }"),
        ("C.vsp", "behaviour C { public int c = 1; }"),
    ]);
    let mut builder = sequential_builder().with_backend(ScriptedBackend {
        diagnostics: Vec::new(),
        crash_on_invoke: false,
    });

    let report = builder.build(&mut registry).unwrap();

    assert_eq!(report.failed_gate, Some(BuildState::EvaluateInitializers));
    assert_eq!(report.error_count, 2);
    assert!(report.errors.iter().all(|e| e.kind == ErrorKind::InitializerCompile));
    assert!(report.errors.iter().all(|e| e.script != ScriptRef::from("C.vsp")));
}

#[test]
fn test_every_batch_error_is_counted() {
    let mut registry = registry(&[("A.vsp", "behaviour A { public int a = 2 * 3; }")]);
    let stray = InitializerDiagnostic {
        severity: Severity::Error,
        unit: 7,
        message: "metadata reference could not be loaded".to_string(),
        code: None,
        position: LinePosition::default(),
    };
    let mut builder = sequential_builder().with_backend(ScriptedBackend {
        diagnostics: vec![stray],
        crash_on_invoke: false,
    });

    let report = builder.build(&mut registry).unwrap();

    assert_eq!(report.failed_gate, Some(BuildState::EvaluateInitializers));
    assert_eq!(report.error_count, 1);
    assert_eq!(report.errors[0].kind, ErrorKind::InitializerCompile);
    assert_eq!(report.errors[0].script, ScriptRef::from("A.vsp"));
    assert!(report.errors[0].message.contains("metadata reference"));
}

#[test]
fn test_initializer_panic_becomes_internal_error() {
    let mut registry = registry(&[("A.vsp", "behaviour A { public int a = 2 * 3; }")]);
    let mut builder = sequential_builder().with_backend(ScriptedBackend {
        diagnostics: Vec::new(),
        crash_on_invoke: true,
    });

    let report = builder.build(&mut registry).unwrap();

    assert_eq!(report.failed_gate, Some(BuildState::EvaluateInitializers));
    assert_eq!(report.error_count, 1);
    assert_eq!(report.errors[0].kind, ErrorKind::Internal);
    assert!(report.errors[0].message.contains("routine table corrupted"));
    assert!(live(&registry, "A.vsp").is_none());
}

#[test]
fn test_oversized_array_initializer_is_scoped_to_its_module() {
    let mut registry = registry(&[
        ("Ok.vsp", "behaviour Ok { public int a = 2 * 3; }"),
        ("Huge.vsp", "behaviour Huge { public int[] cells = new int[9223372036854775807]; }"),
    ]);

    let report = sequential_builder().build(&mut registry).unwrap();

    assert_eq!(report.failed_gate, Some(BuildState::EvaluateInitializers));
    assert_eq!(report.error_count, 1);
    assert_eq!(report.errors[0].kind, ErrorKind::InitializerSemantic);
    assert_eq!(report.errors[0].script, ScriptRef::from("Huge.vsp"));
    assert!(report.errors[0].message.contains("exceeds the limit"));
    assert_eq!(
        staged(&registry, "Ok.vsp").unwrap().get_variable("a"),
        Some(&Value::Int(6))
    );
}

#[test]
fn test_field_named_program_does_not_break_the_batch() {
    let mut registry = registry(&[
        ("P.vsp", "behaviour P { public int program = 2 * 2; public int init = program + 1; }"),
        ("Q.vsp", "behaviour Q { public int q = 3 * 3; }"),
    ]);

    let report = sequential_builder().build(&mut registry).unwrap();

    assert!(report.is_success(), "{}", report.render(&registry));
    assert_eq!(live_value(&registry, "P.vsp", "program"), Some(Value::Int(4)));
    assert_eq!(live_value(&registry, "P.vsp", "init"), Some(Value::Int(5)));
    assert_eq!(live_value(&registry, "Q.vsp", "q"), Some(Value::Int(9)));
}

#[test]
fn test_reserved_names_are_rejected_at_bind() {
    let mut registry = registry(&[("R.vsp", "behaviour R { public int __program; }")]);

    let report = sequential_builder().build(&mut registry).unwrap();

    assert_eq!(report.failed_gate, Some(BuildState::Bind));
    assert_eq!(report.errors[0].code(), Some("E-BIND-014"));
}
