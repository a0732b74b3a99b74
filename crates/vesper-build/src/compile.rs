//! Compile orchestrator
//!
//! Generates every module concurrently and assembles each result into
//! a staged program. Unlike binding, failures here are per module.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info};
use vesper_codegen::{generate, GenerateError, GeneratedModule};
use vesper_symbols::{ClassDefinition, ClassLookup};
use vesper_vm::ExternRegistry;

use crate::module::TaskDiagnostic;
use crate::pool::{panic_message, Job};
use crate::{BuildCache, BuildType, ClassSet, ErrorKind, Module, ProgramRegistry, WorkerPool};

/// Turns one bound class into assembly text
///
/// `classes` holds every class of the build for cross-module references.
pub trait ModuleGenerator: Send + Sync {
    fn generate(
        &self,
        class: &ClassDefinition,
        classes: &dyn ClassLookup,
    ) -> Result<GeneratedModule, Vec<GenerateError>>;
}

/// [`ModuleGenerator`] backed by the reference code generator
#[derive(Debug, Clone)]
pub struct AssemblyGenerator {
    externs: Arc<ExternRegistry>,
}

impl AssemblyGenerator {
    pub fn new(externs: Arc<ExternRegistry>) -> Self {
        Self { externs }
    }
}

impl ModuleGenerator for AssemblyGenerator {
    fn generate(
        &self,
        class: &ClassDefinition,
        classes: &dyn ClassLookup,
    ) -> Result<GeneratedModule, Vec<GenerateError>> {
        generate(class, classes, &self.externs)
    }
}

type CompileOutcome = Result<GeneratedModule, Vec<TaskDiagnostic>>;

fn compile_job(
    generator: Arc<dyn ModuleGenerator>,
    class: Arc<ClassDefinition>,
    classes: Arc<ClassSet>,
) -> Job<CompileOutcome> {
    Box::new(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(&class, classes.as_ref())));
        match result {
            Ok(Ok(generated)) => Ok(generated),
            Ok(Err(errors)) if errors.is_empty() => Err(vec![TaskDiagnostic::internal(
                ErrorKind::Generate,
                "generator failed without reporting a diagnostic",
                Some(class.span),
            )]),
            Ok(Err(errors)) => Err(errors
                .iter()
                .map(|e| TaskDiagnostic {
                    kind: ErrorKind::Generate,
                    message: e.to_string(),
                    code: Some(e.code()),
                    span: Some(e.span()),
                })
                .collect()),
            Err(payload) => Err(vec![TaskDiagnostic::internal(
                ErrorKind::Generate,
                &panic_message(payload.as_ref()),
                Some(class.span),
            )]),
        }
    })
}

/// Compile every bound module, returning the number of errors
pub(crate) fn compile_modules(
    modules: &mut [Module],
    classes: &Arc<ClassSet>,
    generator: &Arc<dyn ModuleGenerator>,
    pool: &WorkerPool,
    registry: &mut ProgramRegistry,
    cache: &mut BuildCache,
    build_type: BuildType,
) -> usize {
    let mut jobs = Vec::new();
    let mut indices = Vec::new();
    for (i, module) in modules.iter().enumerate() {
        if let Some(class) = &module.class {
            jobs.push(compile_job(generator.clone(), class.clone(), classes.clone()));
            indices.push(i);
        }
    }

    let total = jobs.len();
    info!(modules = total, "Compiling modules");

    let mut error_count = 0;
    let mut processed = 0;
    for completed in pool.run(jobs) {
        let module = &mut modules[indices[completed.index]];
        let outcome = completed.outcome.unwrap_or_else(|panic| {
            Err(vec![TaskDiagnostic::internal(ErrorKind::Generate, &panic.message, None)])
        });

        match outcome {
            Ok(generated) => error_count += install(module, generated, registry, cache, build_type),
            Err(diagnostics) => {
                for diagnostic in diagnostics {
                    let error = module.diagnostic(diagnostic);
                    if let Some(asset) = registry.asset_mut(module.asset) {
                        asset.compile_errors_mut().push(error.to_string());
                    }
                    module.report(error);
                    error_count += 1;
                }
            }
        }

        processed += 1;
        info!(progress = %format!("{}/{}", processed, total), file = %module.script, "Compiled module");
    }

    error_count
}

/// Assemble generated code into the module's asset; returns errors added
fn install(
    module: &mut Module,
    generated: GeneratedModule,
    registry: &mut ProgramRegistry,
    cache: &mut BuildCache,
    build_type: BuildType,
) -> usize {
    let Some(asset) = registry.asset_mut(module.asset) else {
        let error = module.error(ErrorKind::Internal, "program asset is no longer registered");
        module.report(error);
        return 1;
    };

    asset.set_assembly_text(&generated.assembly);
    let assembled = asset.assemble(generated.symbol_count);
    asset.set_assembly_text("");
    cache.set_assembly_snapshot(&module.script, build_type, &generated.assembly);

    match assembled {
        Ok(()) => {
            debug!(file = %module.script, symbols = generated.symbol_count, "Assembled program");
            module.symbols = Some(generated.symbols);
            0
        }
        Err(message) => {
            let message = if message.is_empty() {
                "Failed to assemble program".to_string()
            } else {
                message
            };
            asset.compile_errors_mut().push(message.clone());
            let error = module.error(ErrorKind::Assemble, message);
            module.report(error);
            1
        }
    }
}
