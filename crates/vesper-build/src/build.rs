//! Build orchestrator
//!
//! A build walks a fixed sequence of gates:
//!
//! ```text
//! Start -> Bind -> Compile -> AssignDefaults -> EvaluateInitializers -> Finalize
//! ```
//!
//! Any gate that reports errors sends the build to `Rollback` instead.
//! Finalize records fingerprints, then commits every staged program;
//! Rollback clears the fingerprints of every module that took part so a
//! later incremental check cannot mistake the failed attempt for an
//! up-to-date build.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use vesper_ast::DefineHeader;
use vesper_vm::ExternRegistry;

use crate::bind::bind_modules;
use crate::compile::compile_modules;
use crate::heap::{assign_constants, fill_unset_defaults, run_pass};
use crate::{
    render_diagnostic, AssemblyGenerator, AssetId, BuildCache, BuildConfig, CompileError,
    FieldInitializerEvaluator, InitializerBackend, InterpretedBackend, Module, ModuleBinder, ModuleGenerator,
    ProgramRegistry, Result, SourceBinder, WorkerPool,
};

/// States of the build state machine, in the order they are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildState {
    Start,
    Bind,
    Compile,
    AssignDefaults,
    EvaluateInitializers,
    Finalize,
    Rollback,
    Finalized,
    RolledBack,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Start => "start",
            BuildState::Bind => "bind",
            BuildState::Compile => "compile",
            BuildState::AssignDefaults => "assign-defaults",
            BuildState::EvaluateInitializers => "evaluate-initializers",
            BuildState::Finalize => "finalize",
            BuildState::Rollback => "rollback",
            BuildState::Finalized => "finalized",
            BuildState::RolledBack => "rolled-back",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Every module's program was committed
    Finalized,
    /// Nothing was committed
    RolledBack,
}

/// Result of one build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    /// Gate that reported errors, when the build rolled back
    pub failed_gate: Option<BuildState>,
    pub errors: Vec<CompileError>,
    pub error_count: usize,
    pub elapsed: Duration,
    pub module_count: usize,
    /// Every state visited, `Start` first
    pub states: Vec<BuildState>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.outcome == BuildOutcome::Finalized
    }

    /// All diagnostics rendered against the sources they point into
    pub fn render(&self, registry: &ProgramRegistry) -> String {
        self.errors
            .iter()
            .map(|error| {
                match registry
                    .lookup_by_path(&error.script)
                    .and_then(|asset| asset.source_text())
                {
                    Some(source) => render_diagnostic(error, &source),
                    None => format!("{}\n", error),
                }
            })
            .collect()
    }
}

/// Fixup run once after every finalized build
pub trait PostBuildHook: Send {
    fn on_finalized(&mut self, registry: &mut ProgramRegistry);
}

impl<F> PostBuildHook for F
where
    F: FnMut(&mut ProgramRegistry) + Send,
{
    fn on_finalized(&mut self, registry: &mut ProgramRegistry) {
        self(registry)
    }
}

/// Drives builds of every module in a [`ProgramRegistry`]
pub struct Builder {
    config: BuildConfig,
    binder: Arc<dyn ModuleBinder>,
    generator: Arc<dyn ModuleGenerator>,
    evaluator: FieldInitializerEvaluator,
    cache: BuildCache,
    hooks: Vec<Box<dyn PostBuildHook>>,
    pool: WorkerPool,
}

impl Builder {
    /// Builder using the reference binder, generator and initializer backend
    pub fn new(config: BuildConfig, externs: Arc<ExternRegistry>) -> Result<Self> {
        let pool = WorkerPool::new(&config)?;
        Ok(Self {
            binder: Arc::new(SourceBinder::new(externs.clone())),
            generator: Arc::new(AssemblyGenerator::new(externs.clone())),
            evaluator: FieldInitializerEvaluator::new(Box::new(InterpretedBackend::new(externs))),
            cache: BuildCache::in_memory(),
            hooks: Vec::new(),
            config,
            pool,
        })
    }

    pub fn with_binder(mut self, binder: impl ModuleBinder + 'static) -> Self {
        self.binder = Arc::new(binder);
        self
    }

    pub fn with_generator(mut self, generator: impl ModuleGenerator + 'static) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    pub fn with_backend(mut self, backend: impl InitializerBackend + 'static) -> Self {
        self.evaluator = FieldInitializerEvaluator::new(Box::new(backend));
        self
    }

    pub fn with_cache(mut self, cache: BuildCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn add_hook(&mut self, hook: impl PostBuildHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Whether any module's source changed since it was last committed
    /// for this build type
    pub fn needs_build(&self, registry: &mut ProgramRegistry) -> Result<bool> {
        registry.ensure_built()?;
        for (_, asset) in registry.assets() {
            let Some(source) = asset.source_text() else {
                continue;
            };
            if !self
                .cache
                .is_up_to_date(asset.script(), &source, self.config.build_type)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Build every registered module
    ///
    /// `Err` is reserved for infrastructure failures such as an
    /// unreadable fingerprint store; diagnostics end up in the report.
    pub fn build(&mut self, registry: &mut ProgramRegistry) -> Result<BuildReport> {
        let started = Instant::now();
        let mut states = vec![BuildState::Start];

        registry.ensure_built()?;
        let mut modules = collect_modules(registry, &self.config.define_header());
        info!(
            modules = modules.len(),
            build_type = %self.config.build_type,
            sequential = self.pool.is_sequential(),
            "Starting build"
        );

        let failed_gate = self.run_gates(&mut modules, registry, &mut states);

        let outcome = match failed_gate {
            None => {
                states.push(BuildState::Finalize);
                self.finalize(&modules, registry)?;
                states.push(BuildState::Finalized);
                BuildOutcome::Finalized
            }
            Some(gate) => {
                states.push(BuildState::Rollback);
                info!(gate = %gate, "Build failed; rolling back");
                self.rollback(&modules)?;
                states.push(BuildState::RolledBack);
                BuildOutcome::RolledBack
            }
        };

        let errors: Vec<CompileError> = modules.iter().flat_map(|m| m.errors.iter().cloned()).collect();
        let elapsed = started.elapsed();
        log_summary(&modules, outcome, errors.len(), elapsed);

        Ok(BuildReport {
            outcome,
            failed_gate,
            error_count: errors.len(),
            errors,
            elapsed,
            module_count: modules.len(),
            states,
        })
    }

    /// Run every gate; returns the first gate that reported errors
    fn run_gates(
        &mut self,
        modules: &mut [Module],
        registry: &mut ProgramRegistry,
        states: &mut Vec<BuildState>,
    ) -> Option<BuildState> {
        states.push(BuildState::Bind);
        let Some(classes) = bind_modules(modules, &self.binder, &self.pool) else {
            return Some(BuildState::Bind);
        };
        for module in modules.iter() {
            if let Some(class) = &module.class {
                registry.index_class(&class.name, module.asset);
            }
        }
        let classes = Arc::new(classes);

        states.push(BuildState::Compile);
        let errors = compile_modules(
            modules,
            &classes,
            &self.generator,
            &self.pool,
            registry,
            &mut self.cache,
            self.config.build_type,
        );
        if errors > 0 {
            return Some(BuildState::Compile);
        }

        states.push(BuildState::AssignDefaults);
        if run_pass("constants", modules, registry, assign_constants) > 0 {
            return Some(BuildState::AssignDefaults);
        }

        states.push(BuildState::EvaluateInitializers);
        let mut errors = self.evaluator.evaluate(modules, &classes, registry);
        errors += run_pass("unset defaults", modules, registry, fill_unset_defaults);
        if errors > 0 {
            return Some(BuildState::EvaluateInitializers);
        }

        None
    }

    /// Fingerprints are all written before any program is committed;
    /// a store failure clears the ones already written and commits nothing.
    fn finalize(&mut self, modules: &[Module], registry: &mut ProgramRegistry) -> Result<()> {
        for (written, module) in modules.iter().enumerate() {
            if let Err(err) = self
                .cache
                .update_fingerprint(&module.script, &module.source, self.config.build_type)
            {
                warn!(file = %module.script, error = %err, "Failed to record fingerprint; nothing committed");
                if let Err(clear_err) = self.rollback(&modules[..written]) {
                    warn!(error = %clear_err, "Failed to clear fingerprints after aborted finalize");
                }
                return Err(err);
            }
        }
        for module in modules {
            if let Some(asset) = registry.asset_mut(module.asset) {
                asset.commit();
            }
        }
        for hook in &mut self.hooks {
            hook.on_finalized(registry);
        }
        self.cache.set_last_build_type(self.config.build_type);
        Ok(())
    }

    /// Clears every module's fingerprint; the first failure is returned
    /// once all of them have been attempted
    fn rollback(&mut self, modules: &[Module]) -> Result<()> {
        let mut first_error = None;
        for module in modules {
            if let Err(err) = self.cache.clear_fingerprint(&module.script) {
                warn!(file = %module.script, error = %err, "Failed to clear fingerprint");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .field("cache", &self.cache)
            .finish()
    }
}

/// One module per asset with readable source; stale asset errors are cleared
fn collect_modules(registry: &mut ProgramRegistry, header: &DefineHeader) -> Vec<Module> {
    let ids: Vec<AssetId> = registry.assets().map(|(id, _)| id).collect();
    let mut modules = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(asset) = registry.asset_mut(id) else {
            continue;
        };
        asset.compile_errors_mut().clear();
        match asset.source_text() {
            Some(source) => modules.push(Module::new(asset.script().clone(), id, source, header)),
            None => warn!(file = %asset.script(), "Program asset has no readable source; skipping"),
        }
    }
    modules
}

fn log_summary(modules: &[Module], outcome: BuildOutcome, error_count: usize, elapsed: Duration) {
    let built = if modules.len() <= 5 {
        modules
            .iter()
            .map(|m| m.script.file_name())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        format!("{} modules", modules.len())
    };
    match outcome {
        BuildOutcome::Finalized => info!(
            elapsed_ms = elapsed.as_millis() as u64,
            "Compile of {} finished in {:.3}s",
            built,
            elapsed.as_secs_f64()
        ),
        BuildOutcome::RolledBack => info!(
            errors = error_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "Compile of {} failed with {} error(s)",
            built,
            error_count
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VmProgramAsset;

    fn externs() -> Arc<ExternRegistry> {
        Arc::new(ExternRegistry::standard())
    }

    fn registry_with(sources: &[(&str, &str)]) -> ProgramRegistry {
        let externs = externs();
        let mut registry = ProgramRegistry::new(externs.clone());
        for (path, source) in sources {
            registry.register(Box::new(VmProgramAsset::inline(*path, *source, externs.clone())));
        }
        registry
    }

    fn builder() -> Builder {
        Builder::new(BuildConfig::default().sequential(), externs()).unwrap()
    }

    #[test]
    fn test_clean_build_visits_every_gate() {
        let mut registry = registry_with(&[("A.vsp", "behaviour A { public int x = 1; }")]);
        let report = builder().build(&mut registry).unwrap();

        assert!(report.is_success(), "{}", report.render(&registry));
        assert_eq!(
            report.states,
            vec![
                BuildState::Start,
                BuildState::Bind,
                BuildState::Compile,
                BuildState::AssignDefaults,
                BuildState::EvaluateInitializers,
                BuildState::Finalize,
                BuildState::Finalized,
            ]
        );
        assert_eq!(report.module_count, 1);
        assert!(registry.lookup_by_class("A").is_some());
    }

    #[test]
    fn test_bind_failure_skips_compile() {
        let mut registry = registry_with(&[
            ("A.vsp", "behaviour A { public int x = 1; }"),
            ("C.vsp", "behaviour C { fn start() { missing = 1; } }"),
        ]);
        let report = builder().build(&mut registry).unwrap();

        assert_eq!(report.outcome, BuildOutcome::RolledBack);
        assert_eq!(report.failed_gate, Some(BuildState::Bind));
        assert!(!report.states.contains(&BuildState::Compile));
        assert_eq!(report.states.last(), Some(&BuildState::RolledBack));
        assert!(registry
            .lookup_by_path(&"A.vsp".into())
            .and_then(|a| a.program())
            .is_none());
    }

    #[test]
    fn test_hooks_run_once_per_finalized_build() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let mut builder = builder();
        let counter = calls.clone();
        builder.add_hook(move |_: &mut ProgramRegistry| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut registry = registry_with(&[("A.vsp", "behaviour A { }"), ("B.vsp", "behaviour B { }")]);
        builder.build(&mut registry).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let mut broken = registry_with(&[("C.vsp", "behaviour C { fn f() { nope(); } }")]);
        builder.build(&mut broken).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_needs_build_tracks_sources() {
        let externs = externs();
        let mut registry = ProgramRegistry::new(externs.clone());
        let id = registry.register(Box::new(VmProgramAsset::inline(
            "A.vsp",
            "behaviour A { }",
            externs.clone(),
        )));
        let mut builder = builder();

        assert!(builder.needs_build(&mut registry).unwrap());
        builder.build(&mut registry).unwrap();
        assert!(!builder.needs_build(&mut registry).unwrap());

        registry.register(Box::new(VmProgramAsset::inline(
            "A.vsp",
            "behaviour A { public int y; }",
            externs,
        )));
        assert_eq!(registry.id_of(&"A.vsp".into()), Some(id));
        assert!(builder.needs_build(&mut registry).unwrap());
    }

    /// Store whose n-th `put` fails, and whose deletes fail for one script
    struct FlakyFingerprints {
        inner: crate::InMemoryFingerprints,
        puts: usize,
        fail_put_at: Option<usize>,
        fail_delete_of: Option<vesper_ast::ScriptRef>,
    }

    impl FlakyFingerprints {
        fn new(fail_put_at: Option<usize>, fail_delete_of: Option<&str>) -> Self {
            Self {
                inner: crate::InMemoryFingerprints::new(),
                puts: 0,
                fail_put_at,
                fail_delete_of: fail_delete_of.map(Into::into),
            }
        }
    }

    fn disk_full() -> crate::BuildError {
        crate::BuildError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }

    impl crate::FingerprintStore for FlakyFingerprints {
        fn get(&self, script: &vesper_ast::ScriptRef) -> Result<Option<crate::Fingerprint>> {
            self.inner.get(script)
        }

        fn put(&mut self, script: &vesper_ast::ScriptRef, fingerprint: &crate::Fingerprint) -> Result<()> {
            self.puts += 1;
            if self.fail_put_at == Some(self.puts) {
                return Err(disk_full());
            }
            self.inner.put(script, fingerprint)
        }

        fn delete(&mut self, script: &vesper_ast::ScriptRef) -> Result<()> {
            if self.fail_delete_of.as_ref() == Some(script) {
                return Err(disk_full());
            }
            self.inner.delete(script)
        }

        fn list(&self) -> Result<Vec<vesper_ast::ScriptRef>> {
            self.inner.list()
        }
    }

    fn three_modules() -> ProgramRegistry {
        registry_with(&[
            ("A.vsp", "behaviour A { public int a = 1; }"),
            ("B.vsp", "behaviour B { public int b = 2; }"),
            ("C.vsp", "behaviour C { public int c = 3; }"),
        ])
    }

    #[test]
    fn test_fingerprint_failure_commits_nothing() {
        let mut registry = three_modules();
        let mut builder =
            builder().with_cache(BuildCache::new(Box::new(FlakyFingerprints::new(Some(2), None))));

        assert!(builder.build(&mut registry).is_err());

        for path in ["A.vsp", "B.vsp", "C.vsp"] {
            let asset = registry.lookup_by_path(&path.into()).unwrap();
            assert!(asset.live_program().is_none(), "{} was committed", path);
            assert!(builder.cache().fingerprint(&path.into()).unwrap().is_none());
        }
        assert_eq!(builder.cache().last_build_type(), None);
    }

    #[test]
    fn test_rollback_clears_every_fingerprint_it_can() {
        let mut registry = three_modules();
        let mut builder =
            builder().with_cache(BuildCache::new(Box::new(FlakyFingerprints::new(None, Some("A.vsp")))));
        assert!(builder.build(&mut registry).unwrap().is_success());

        registry.register(Box::new(VmProgramAsset::inline(
            "C.vsp",
            "behaviour C { fn f() { gone = 1; } }",
            externs(),
        )));
        assert!(builder.build(&mut registry).is_err());

        assert!(builder.cache().fingerprint(&"A.vsp".into()).unwrap().is_some());
        assert!(builder.cache().fingerprint(&"B.vsp".into()).unwrap().is_none());
        assert!(builder.cache().fingerprint(&"C.vsp".into()).unwrap().is_none());
    }
}
