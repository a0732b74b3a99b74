//! Bind orchestrator
//!
//! Every module is bound on its own worker. Binding is all-or-nothing:
//! code generation resolves cross-module references against the full set
//! of classes, so one failing module fails the whole phase.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info};
use vesper_ast::ScriptRef;
use vesper_symbols::{BindError, Binder, ClassDefinition, NodeTracker};
use vesper_vm::ExternRegistry;

use crate::module::TaskDiagnostic;
use crate::pool::{panic_message, Job};
use crate::{ClassSet, ErrorKind, Module, WorkerPool};

/// Turns one module's source into a class definition
///
/// Implementations must be safe to call concurrently for different
/// modules. `tracker` should be updated with each node visited so a
/// panic can be positioned.
pub trait ModuleBinder: Send + Sync {
    fn bind(
        &self,
        script: &ScriptRef,
        source: &str,
        tracker: &NodeTracker,
    ) -> Result<ClassDefinition, Vec<BindError>>;
}

/// [`ModuleBinder`] backed by the reference Vesper binder
#[derive(Debug, Clone)]
pub struct SourceBinder {
    externs: Arc<ExternRegistry>,
}

impl SourceBinder {
    pub fn new(externs: Arc<ExternRegistry>) -> Self {
        Self { externs }
    }
}

impl ModuleBinder for SourceBinder {
    fn bind(
        &self,
        script: &ScriptRef,
        source: &str,
        tracker: &NodeTracker,
    ) -> Result<ClassDefinition, Vec<BindError>> {
        Binder::new(&self.externs).bind(script, source, tracker)
    }
}

type BindOutcome = Result<ClassDefinition, Vec<TaskDiagnostic>>;

fn bind_job(binder: Arc<dyn ModuleBinder>, script: ScriptRef, source: Arc<str>) -> Job<BindOutcome> {
    Box::new(move || {
        let tracker = NodeTracker::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| binder.bind(&script, &source, &tracker)));
        match result {
            Ok(Ok(class)) => Ok(class),
            Ok(Err(errors)) if errors.is_empty() => Err(vec![TaskDiagnostic::internal(
                ErrorKind::Bind,
                "binder failed without reporting a diagnostic",
                tracker.last(),
            )]),
            Ok(Err(errors)) => Err(errors
                .iter()
                .map(|e| TaskDiagnostic {
                    kind: ErrorKind::Bind,
                    message: e.to_string(),
                    code: Some(e.code()),
                    span: Some(e.span()),
                })
                .collect()),
            Err(payload) => Err(vec![TaskDiagnostic::internal(
                ErrorKind::Bind,
                &panic_message(payload.as_ref()),
                tracker.last(),
            )]),
        }
    })
}

/// Bind every module; `None` when any module failed
///
/// Diagnostics of every failing module are recorded before the phase
/// reports failure. On success each module holds its class.
pub(crate) fn bind_modules(
    modules: &mut [Module],
    binder: &Arc<dyn ModuleBinder>,
    pool: &WorkerPool,
) -> Option<ClassSet> {
    info!(modules = modules.len(), "Binding class definitions");

    let jobs = modules
        .iter()
        .map(|m| bind_job(binder.clone(), m.script.clone(), m.bound_source()))
        .collect();

    let mut classes: Vec<Option<ClassDefinition>> = vec![None; modules.len()];
    let mut failed = false;

    for completed in pool.run(jobs) {
        let module = &mut modules[completed.index];
        let outcome = completed.outcome.unwrap_or_else(|panic| {
            Err(vec![TaskDiagnostic::internal(ErrorKind::Bind, &panic.message, None)])
        });
        match outcome {
            Ok(class) => {
                debug!(file = %module.script, class = %class.name, "Bound module");
                classes[completed.index] = Some(class);
            }
            Err(diagnostics) => {
                failed = true;
                for diagnostic in diagnostics {
                    let error = module.diagnostic(diagnostic);
                    module.report(error);
                }
            }
        }
    }

    if failed {
        info!("Bind phase failed; no module will be compiled");
        return None;
    }

    let mut set = Vec::with_capacity(modules.len());
    for (module, class) in modules.iter_mut().zip(classes) {
        let class = Arc::new(class?);
        module.set_class(class.clone());
        set.push(class);
    }
    Some(ClassSet::new(set))
}
