//! Field initializer evaluation
//!
//! Fields whose default is not a literal are computed by compiling one
//! auxiliary unit per module, all units of a build as a single batch,
//! and running each unit's entry routine against its module's program.

mod backend;
mod bridge;
mod interpret;
mod synthesize;

pub use backend::{
    InitializerAssembly, InitializerBackend, InitializerCompilation, InitializerDiagnostic, InitializerFault,
    Severity,
};
pub use bridge::{HeapBridge, StoreRoute};
pub use interpret::InterpretedBackend;
pub use synthesize::{synthesize, InitializerUnit, ENTRY_ROUTINE, PROGRAM_INTRINSIC};

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info};

use crate::pool::panic_message;
use crate::{ClassSet, CompileError, ErrorKind, Module, ProgramRegistry};

pub struct FieldInitializerEvaluator {
    backend: Box<dyn InitializerBackend>,
    next_assembly: usize,
}

impl FieldInitializerEvaluator {
    pub fn new(backend: Box<dyn InitializerBackend>) -> Self {
        Self {
            backend,
            next_assembly: 0,
        }
    }

    /// Compute and store every evaluated field initializer
    ///
    /// Returns the number of errors reported. A failed batch compilation
    /// writes nothing to any heap.
    pub fn evaluate(&mut self, modules: &mut [Module], classes: &ClassSet, registry: &mut ProgramRegistry) -> usize {
        let pending: Vec<usize> = modules
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.fields_with_initializers.is_empty() && m.class.is_some())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let units: Vec<InitializerUnit> = pending
            .iter()
            .enumerate()
            .filter_map(|(index, &m)| {
                let module = &modules[m];
                let class = module.class.as_ref()?;
                Some(synthesize(index, class, &module.fields_with_initializers))
            })
            .collect();

        let assembly_id = format!("init{}", self.next_assembly);
        self.next_assembly += 1;
        info!(assembly = %assembly_id, units = units.len(), "Compiling field initializers");

        let mut compilation = self.backend.compile(&assembly_id, &units, classes);
        for warning in compilation.diagnostics.iter().filter(|d| !d.is_error()) {
            debug!("{}", warning);
        }

        let assembly = match (compilation.assembly.take(), compilation.error_count()) {
            (Some(assembly), 0) => assembly,
            (None, 0) => return report_missing_assembly(modules, &pending, &assembly_id),
            _ => return self.report_batch_failure(modules, &pending, &units, &compilation),
        };

        let bridge = HeapBridge::new();
        let mut error_count = 0;
        for (unit, &m) in units.iter().zip(&pending) {
            let module = &mut modules[m];
            let Some(program) = registry.asset_mut(module.asset).and_then(|a| a.program_mut()) else {
                let error = module.error(ErrorKind::Internal, "program is not loaded");
                module.report(error);
                error_count += 1;
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                assembly.invoke(&unit.class_name, program, &bridge)
            }));
            let error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(fault)) => Some(module.error(
                    ErrorKind::InitializerSemantic,
                    format!("Field initializer evaluation failed: {}", fault),
                )),
                Err(payload) => Some(module.error(
                    ErrorKind::Internal,
                    format!("internal compiler error: {}", panic_message(payload.as_ref())),
                )),
            };
            if let Some(error) = error {
                module.report(error);
                error_count += 1;
            }

            error_count += validate_results(module, registry);
        }

        debug!(writes = bridge.writes(), "Stored field initializer values");
        error_count
    }

    fn report_batch_failure(
        &self,
        modules: &mut [Module],
        pending: &[usize],
        units: &[InitializerUnit],
        compilation: &InitializerCompilation,
    ) -> usize {
        let mut error_count = 0;
        for diagnostic in compilation.errors() {
            error!("{}", diagnostic);
            error_count += 1;
            // Diagnostics outside any unit land on the first module of the batch
            let Some(&m) = pending.get(diagnostic.unit).or_else(|| pending.first()) else {
                continue;
            };
            let module = &mut modules[m];
            let mut compile_error = CompileError::new(
                ErrorKind::InitializerCompile,
                module.script.clone(),
                format!("{}: {}", InitializerUnit::class_name_for(diagnostic.unit), diagnostic.message),
                diagnostic.position,
            );
            if let Some(code) = diagnostic.code {
                compile_error = compile_error.with_code(code);
            }
            module.errors.push(compile_error);
        }

        let generated: String = units.iter().map(|u| u.source.as_str()).collect::<Vec<_>>().join("\n");
        error!("Generated source code:\n{}", generated);
        error_count
    }
}

/// A batch that compiled without errors but produced nothing to run
fn report_missing_assembly(modules: &mut [Module], pending: &[usize], assembly_id: &str) -> usize {
    error!(assembly = %assembly_id, "Initializer backend produced no assembly");
    for &m in pending {
        let module = &mut modules[m];
        let error = module.error(
            ErrorKind::InitializerCompile,
            format!("initializer assembly '{}' was not produced", assembly_id),
        );
        module.report(error);
    }
    pending.len()
}

/// Check stored values after the routine ran; composite instances are
/// reported but left in place
fn validate_results(module: &mut Module, registry: &mut ProgramRegistry) -> usize {
    let Some(asset) = registry.asset_mut(module.asset) else {
        return 0;
    };
    let unsupported: Vec<String> = {
        let Some(program) = asset.program() else {
            return 0;
        };
        module
            .fields_with_initializers
            .iter()
            .filter(|field| {
                let unique_name = module
                    .class
                    .as_ref()
                    .and_then(|c| c.symbol(field.symbol))
                    .map(|s| s.unique_name.as_str())
                    .unwrap_or(field.name.as_str());
                program
                    .get_variable(unique_name)
                    .is_some_and(|value| value.is_user_defined())
            })
            .map(|field| field.name.clone())
            .collect()
    };

    for name in &unsupported {
        let error = module.error(
            ErrorKind::InitializerSemantic,
            format!("Field: '{}' does not yet support field initializers on user-defined types", name),
        );
        asset.compile_errors_mut().push(error.to_string());
        module.report(error);
    }
    unsupported.len()
}
