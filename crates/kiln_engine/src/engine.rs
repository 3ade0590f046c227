//! The compilation orchestrator.
//!
//! [`Engine`] owns the artifact store, the in-process image of installed
//! units, and both cache tiers, and resolves unit names through the load
//! ladder: already installed, then staged precompiled artifact, then
//! persistent cache, then compile from source. A single lock guards the
//! resolve-or-compile-or-install sequence so two concurrent requests for
//! the same not-yet-loaded name observe one result.

use crate::detector;
use crate::error::{CycleOutcome, EngineError};
use crate::loaded::LoadedUnit;
use crate::scan;
use crate::traits::{
    CompileDiagnostic, CompileRequest, DenyHotSwap, DependencyTracker, Enhancer, HotSwap,
    NoDependencies, NoopValueCache, UnitCompiler, ValueCache,
};
use kiln_cache::{PersistentArtifactCache, PrecompiledArtifactLoader};
use kiln_common::{unit_name, ArtifactEnvelope, Fingerprint, SigChecksum, UnitMeta};
use kiln_config::EngineConfig;
use kiln_reflect::{FieldHandle, HandleCache, MemberSource, MethodHandle};
use kiln_store::{ArtifactStore, CompilationUnit};
use kiln_templates::{TemplateArtifactCache, TemplateCompiler};
use kiln_vfs::{SearchPath, VfsFile};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// The engine's external collaborators, constructor-injected so
/// independent engine instances never share state.
pub struct Collaborators {
    /// The external compiler.
    pub compiler: Arc<dyn UnitCompiler>,

    /// The post-compile enhancement step.
    pub enhancer: Arc<dyn Enhancer>,

    /// Dependency expansion for change detection.
    pub dependencies: Arc<dyn DependencyTracker>,

    /// The platform hot-swap primitive.
    pub hot_swap: Arc<dyn HotSwap>,

    /// Application value cache cleared around redefinitions.
    pub value_cache: Arc<dyn ValueCache>,

    /// The template-rendering engine's load contract.
    pub template_compiler: Arc<dyn TemplateCompiler>,
}

impl Collaborators {
    /// Creates a collaborator set with portable baselines for the
    /// optional pieces: no dependency expansion, hot swap always
    /// denied, no value cache.
    pub fn new(
        compiler: Arc<dyn UnitCompiler>,
        enhancer: Arc<dyn Enhancer>,
        template_compiler: Arc<dyn TemplateCompiler>,
    ) -> Self {
        Self {
            compiler,
            enhancer,
            dependencies: Arc::new(NoDependencies),
            hot_swap: Arc::new(DenyHotSwap),
            value_cache: Arc::new(NoopValueCache),
            template_compiler,
        }
    }

    /// Replaces the dependency tracker.
    pub fn with_dependencies(mut self, dependencies: Arc<dyn DependencyTracker>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Replaces the hot-swap primitive.
    pub fn with_hot_swap(mut self, hot_swap: Arc<dyn HotSwap>) -> Self {
        self.hot_swap = hot_swap;
        self
    }

    /// Replaces the value cache.
    pub fn with_value_cache(mut self, value_cache: Arc<dyn ValueCache>) -> Self {
        self.value_cache = value_cache;
        self
    }
}

/// State guarded by the engine lock.
pub(crate) struct EngineState {
    /// Registry of known units.
    pub(crate) store: ArtifactStore,

    /// Units installed in the running process, by name.
    pub(crate) image: HashMap<String, Arc<LoadedUnit>>,

    /// Path-set digest recorded by the last scan.
    pub(crate) path_digest: u64,
}

/// Outcome of one batched compile-and-enhance pass.
pub(crate) struct BuildReport {
    /// Names successfully compiled and enhanced, byproducts included.
    pub(crate) built: Vec<String>,

    /// New signature checksum per built unit.
    pub(crate) new_sigs: HashMap<String, SigChecksum>,

    /// Per-unit failures; the named units have been evicted.
    pub(crate) failures: Vec<CompileDiagnostic>,
}

/// The incremental compilation and live reload engine.
pub struct Engine {
    pub(crate) dev_mode: bool,
    pub(crate) use_precompiled: bool,
    pub(crate) source_extension: String,
    pub(crate) sources: SearchPath,
    pub(crate) state: Mutex<EngineState>,
    pub(crate) persistent: PersistentArtifactCache,
    pub(crate) staged: PrecompiledArtifactLoader,
    pub(crate) handles: HandleCache,
    pub(crate) templates: Arc<TemplateArtifactCache>,
    pub(crate) compiler: Arc<dyn UnitCompiler>,
    pub(crate) enhancer: Arc<dyn Enhancer>,
    pub(crate) dependencies: Arc<dyn DependencyTracker>,
    pub(crate) hot_swap: Arc<dyn HotSwap>,
    pub(crate) value_cache: Arc<dyn ValueCache>,
}

impl Engine {
    /// Creates an engine for the application rooted at `app_root`.
    ///
    /// Source roots are scanned once to register known units and record
    /// the initial path-set digest. In precompiled mode the staging tree
    /// is additionally scanned and every staged artifact is installed up
    /// front; a staged artifact that cannot be read or decoded fails the
    /// startup pass.
    pub fn new(
        app_root: &Path,
        config: &EngineConfig,
        collaborators: Collaborators,
    ) -> Result<Self, EngineError> {
        let dev_mode = config.engine.mode.is_dev();

        let mut roots: Vec<VfsFile> = config
            .paths
            .source_roots
            .iter()
            .map(|root| VfsFile::open(app_root.join(root)))
            .collect();
        if let Some(framework) = &config.paths.framework_root {
            roots.push(VfsFile::open(app_root.join(framework)));
        }
        let sources = SearchPath::new(roots);

        let template_roots = SearchPath::new(
            config
                .paths
                .template_roots
                .iter()
                .map(|root| VfsFile::open(app_root.join(root)))
                .collect(),
        );

        let staging = VfsFile::open(app_root.join(&config.paths.staging_dir));
        let staged = PrecompiledArtifactLoader::new(
            staging.child("units"),
            sources.clone(),
            &config.engine.source_extension,
            dev_mode,
        );
        let templates = Arc::new(TemplateArtifactCache::new(
            template_roots,
            staging.child("templates"),
            collaborators.template_compiler,
            dev_mode,
            config.engine.use_precompiled,
        ));
        let persistent = PersistentArtifactCache::new(&app_root.join(&config.paths.cache_dir));

        let mut state = EngineState {
            store: ArtifactStore::new(),
            image: HashMap::new(),
            path_digest: 0,
        };
        let scanned = scan::scan_sources(&sources, &config.engine.source_extension);
        for source in &scanned {
            state
                .store
                .insert(CompilationUnit::with_source(&source.name, source.file.clone()));
        }
        state.path_digest = scan::path_digest(&scanned);

        let engine = Self {
            dev_mode,
            use_precompiled: config.engine.use_precompiled,
            source_extension: config.engine.source_extension.clone(),
            sources,
            state: Mutex::new(state),
            persistent,
            staged,
            handles: HandleCache::new(),
            templates,
            compiler: collaborators.compiler,
            enhancer: collaborators.enhancer,
            dependencies: collaborators.dependencies,
            hot_swap: collaborators.hot_swap,
            value_cache: collaborators.value_cache,
        };

        if engine.use_precompiled {
            let mut state = engine.lock_state();
            for artifact in engine.staged.scan_all() {
                let unit = state.store.get_or_create(&artifact.name);
                unit.staged = Some(artifact.artifact.clone());
                if unit.source.is_none() {
                    unit.source = artifact.source.clone();
                }
                let bytes = artifact.artifact.read()?;
                engine.install(&mut state, &artifact.name, bytes, None)?;
            }
        }

        info!(
            units = engine.lock_state().store.len(),
            dev_mode, "engine initialized"
        );
        Ok(engine)
    }

    /// Resolves a unit name to its installed form, loading it through
    /// the staged, cached, or compile path as needed.
    ///
    /// Install is idempotent: re-resolving an already-installed unit
    /// returns the identical artifact without further work.
    pub fn resolve(&self, name: &str) -> Result<Arc<LoadedUnit>, EngineError> {
        let mut state = self.lock_state();
        self.resolve_locked(&mut state, name)
    }

    /// Returns all known unit names. In development mode the source
    /// roots are re-synced first, so newly added files appear and units
    /// whose source vanished are dropped.
    pub fn known_units(&self) -> Vec<String> {
        let mut state = self.lock_state();
        if self.dev_mode {
            self.sync_with_sources(&mut state);
        }
        state.store.names().iter().map(|n| n.to_string()).collect()
    }

    /// Returns every loadable unit whose base-type chain includes
    /// `base`. Units that fail to load are skipped.
    pub fn find_assignable(&self, base: &str) -> Vec<Arc<LoadedUnit>> {
        let mut state = self.lock_state();
        self.load_all(&mut state);
        let hits: Vec<String> = state
            .store
            .assignable_to(base)
            .iter()
            .map(|u| u.name.clone())
            .collect();
        hits.iter()
            .filter_map(|name| state.image.get(name).cloned())
            .collect()
    }

    /// Returns every loadable unit carrying the given marker. Units
    /// that fail to load are skipped.
    pub fn find_annotated(&self, marker: &str) -> Vec<Arc<LoadedUnit>> {
        let mut state = self.lock_state();
        self.load_all(&mut state);
        let hits: Vec<String> = state
            .store
            .annotated_with(marker)
            .iter()
            .map(|u| u.name.clone())
            .collect();
        hits.iter()
            .filter_map(|name| state.image.get(name).cloned())
            .collect()
    }

    /// Resolves a unit by case-insensitive name, also accepting dots in
    /// place of the nested-unit separator.
    pub fn find_ignore_case(&self, name: &str) -> Option<Arc<LoadedUnit>> {
        let mut state = self.lock_state();
        if self.dev_mode {
            self.sync_with_sources(&mut state);
        }
        let exact = state.store.find_ignore_case(name)?.name.clone();
        self.resolve_locked(&mut state, &exact).ok()
    }

    /// Runs one change-detection cycle. Production mode never detects
    /// changes.
    pub fn run_detection_cycle(&self) -> CycleOutcome {
        let mut state = self.lock_state();
        if !self.dev_mode {
            return CycleOutcome::NoChange;
        }
        detector::run_cycle(self, &mut state)
    }

    /// Looks up a public method handle on an installed unit, walking
    /// its ancestor chain.
    pub fn method_handle(
        &self,
        owner: &str,
        name: &str,
        arg_types: &[&str],
    ) -> Option<MethodHandle> {
        let state = self.lock_state();
        self.handles
            .get_method(&ImageMembers { image: &state.image }, owner, name, arg_types)
    }

    /// Looks up a field handle on an installed unit, walking its
    /// ancestor chain.
    pub fn field_handle(&self, owner: &str, name: &str) -> Option<FieldHandle> {
        let state = self.lock_state();
        self.handles
            .get_field(&ImageMembers { image: &state.image }, owner, name)
    }

    /// Resolves a dispatch method on an installed unit: first public
    /// non-hook method matching the name case-insensitively, walking
    /// the ancestor chain.
    pub fn dispatch_method(&self, owner: &str, name: &str) -> Option<MethodHandle> {
        let state = self.lock_state();
        self.handles
            .find_dispatch_method(&ImageMembers { image: &state.image }, owner, name)
    }

    /// Drops cached reflection handles scoped to one unit.
    pub fn invalidate_reflection(&self, owner: &str) {
        self.handles.invalidate(owner);
    }

    /// Returns the number of cached reflection handles, negative
    /// results included.
    pub fn reflection_entries(&self) -> usize {
        self.handles.len()
    }

    /// Returns the current registry generation token. Changes whenever
    /// a unit is added, removed, or redefined.
    pub fn generation(&self) -> u64 {
        self.lock_state().store.generation()
    }

    /// Returns the template cache.
    pub fn templates(&self) -> &TemplateArtifactCache {
        &self.templates
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn load_all(&self, state: &mut EngineState) {
        if self.dev_mode {
            self.sync_with_sources(state);
        }
        let names: Vec<String> = state.store.names().iter().map(|n| n.to_string()).collect();
        for name in names {
            if let Err(err) = self.resolve_locked(state, &name) {
                debug!(unit = name.as_str(), %err, "skipped while loading all units");
            }
        }
    }

    pub(crate) fn resolve_locked(
        &self,
        state: &mut EngineState,
        name: &str,
    ) -> Result<Arc<LoadedUnit>, EngineError> {
        if let Some(loaded) = state.image.get(name) {
            return Ok(loaded.clone());
        }

        if !state.store.contains(name) {
            let relative = unit_name::to_relative_path(name, &self.source_extension);
            match self.sources.search(relative) {
                Some(source) => state
                    .store
                    .insert(CompilationUnit::with_source(name, source)),
                None => {
                    // May still resolve from a staged artifact.
                    state.store.get_or_create(name);
                }
            }
        }

        let source = state.store.get(name).and_then(|u| u.source.clone());

        // Staged precompiled fast path.
        if self.use_precompiled || source.is_none() {
            if let Some(staged) = self.staged.find(name) {
                if self.use_precompiled || !staged.source_is_newer() {
                    let bytes = match staged.artifact.read() {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            self.evict(state, name);
                            return Err(err.into());
                        }
                    };
                    if let Some(unit) = state.store.get_mut(name) {
                        unit.staged = Some(staged.artifact.clone());
                        if unit.source.is_none() {
                            unit.source = staged.source.clone();
                        }
                        unit.timestamp = unit.source.as_ref().and_then(|s| s.last_modified());
                    }
                    debug!(unit = name, "loading staged precompiled artifact");
                    return self.install(state, name, bytes, None);
                }
            } else if self.use_precompiled {
                // Precompiled mode fails fast rather than compiling.
                state.store.remove(name);
                return Err(EngineError::NotFound {
                    name: name.to_string(),
                });
            }
        }

        let Some(source) = source else {
            state.store.remove(name);
            return Err(EngineError::NotFound {
                name: name.to_string(),
            });
        };

        // Built earlier in a batch but not yet installed.
        if let Some(bytes) = state.store.get(name).and_then(|u| u.enhanced.clone()) {
            let sig = state.store.get(name).and_then(|u| u.sig_checksum);
            return self.install(state, name, bytes, sig);
        }

        // Persistent cache, keyed by current source content.
        let raw = match source.read() {
            Ok(raw) => raw,
            Err(err) => {
                self.evict(state, name);
                return Err(err.into());
            }
        };
        let fingerprint = Fingerprint::of(&raw);
        if let Some(bytes) = self.persistent.get(name, &fingerprint) {
            if let Some(unit) = state.store.get_mut(name) {
                unit.timestamp = source.last_modified();
            }
            debug!(unit = name, %fingerprint, "persistent cache hit");
            return self.install(state, name, bytes, None);
        }

        // Full miss: compile.
        let report = self.compile_units(state, &[name.to_string()]);
        let target = unit_name::enclosing(name);
        if let Some(diag) = report
            .failures
            .iter()
            .find(|d| d.name == name || d.name == target)
        {
            return Err(EngineError::Compile {
                name: diag.name.clone(),
                path: diag.path.clone(),
                line: diag.line,
                message: diag.message.clone(),
            });
        }
        match state.store.get(name).and_then(|u| u.enhanced.clone()) {
            Some(bytes) => {
                let sig = state.store.get(name).and_then(|u| u.sig_checksum);
                self.install(state, name, bytes, sig)
            }
            None => {
                // Compiled fine but produced no unit of this name.
                state.store.remove(name);
                Err(EngineError::NotFound {
                    name: name.to_string(),
                })
            }
        }
    }

    /// Compiles the named units plus anything else still pending, as
    /// one batch. Failed units are evicted, nested units included;
    /// successful ones are enhanced, written to the persistent cache,
    /// and left in the store ready to install.
    pub(crate) fn compile_units(&self, state: &mut EngineState, names: &[String]) -> BuildReport {
        let mut targets: Vec<String> = Vec::new();
        for name in names {
            let target = unit_name::enclosing(name).to_string();
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        for unit in state.store.iter() {
            if unit.source.is_some()
                && !unit.defined
                && unit.enhanced.is_none()
                && !unit.derivable
                && !unit_name::is_nested(&unit.name)
                && !targets.contains(&unit.name)
            {
                targets.push(unit.name.clone());
            }
        }

        let mut requests: Vec<CompileRequest> = Vec::new();
        let mut failures: Vec<CompileDiagnostic> = Vec::new();
        let mut fingerprints: HashMap<String, Fingerprint> = HashMap::new();
        let mut timestamps: HashMap<String, Option<SystemTime>> = HashMap::new();
        for target in &targets {
            let Some(source) = state.store.get(target).and_then(|u| u.source.clone()) else {
                continue;
            };
            match source.read() {
                Ok(raw) => {
                    fingerprints.insert(target.clone(), Fingerprint::of(&raw));
                    timestamps.insert(target.clone(), source.last_modified());
                    requests.push(CompileRequest {
                        name: target.clone(),
                        text: String::from_utf8_lossy(&raw).into_owned(),
                        source,
                    });
                }
                Err(err) => failures.push(CompileDiagnostic {
                    name: target.clone(),
                    path: source.path().to_path_buf(),
                    line: None,
                    message: err.to_string(),
                }),
            }
        }

        debug!(units = requests.len(), "compiling batch");
        let batch = self.compiler.compile(&requests);
        failures.extend(batch.failures.iter().cloned());

        for diag in &failures {
            warn!(unit = diag.name.as_str(), message = diag.message.as_str(), "compile failed");
            self.evict(state, &diag.name);
        }

        let mut built = Vec::new();
        let mut new_sigs = HashMap::new();
        for compiled in batch.units {
            let enclosing = unit_name::enclosing(&compiled.name).to_string();
            if failures.iter().any(|d| d.name == enclosing) {
                continue;
            }
            let enhanced = self
                .enhancer
                .enhance(&compiled.name, &compiled.bytes, &compiled.meta);
            let envelope = ArtifactEnvelope::new(compiled.meta.clone(), enhanced.body);
            let bytes = match envelope.encode() {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(unit = compiled.name.as_str(), %err, "envelope encoding failed");
                    self.evict(state, &compiled.name);
                    continue;
                }
            };

            let in_image = state.image.contains_key(&compiled.name);
            let enclosing_source = state.store.get(&enclosing).and_then(|u| u.source.clone());
            let unit = state.store.get_or_create(&compiled.name);
            if unit.source.is_none() {
                unit.source = enclosing_source;
            }
            unit.derivable = compiled.derivable;
            unit.compiled = Some(compiled.bytes);
            unit.enhanced = Some(bytes.clone());
            unit.meta = Some(compiled.meta);
            unit.timestamp = timestamps.get(&enclosing).copied().flatten();
            if !in_image {
                unit.sig_checksum = Some(enhanced.sig_checksum);
            }

            if let Some(fingerprint) = fingerprints.get(&enclosing) {
                if let Err(err) = self.persistent.put(&compiled.name, fingerprint, &bytes) {
                    warn!(unit = compiled.name.as_str(), %err, "persistent cache write failed");
                }
            }

            new_sigs.insert(compiled.name.clone(), enhanced.sig_checksum);
            built.push(compiled.name.clone());
        }

        BuildReport {
            built,
            new_sigs,
            failures,
        }
    }

    /// Installs envelope bytes into the running process under `name`.
    ///
    /// When no signature checksum is supplied, a best-effort derivation
    /// from the envelope's member table is attempted.
    pub(crate) fn install(
        &self,
        state: &mut EngineState,
        name: &str,
        envelope_bytes: Vec<u8>,
        sig: Option<SigChecksum>,
    ) -> Result<Arc<LoadedUnit>, EngineError> {
        let envelope = ArtifactEnvelope::decode(&envelope_bytes)?;
        let sig = sig.or_else(|| self.enhancer.derive_signature(&envelope.meta));
        let loaded = Arc::new(LoadedUnit {
            name: name.to_string(),
            meta: envelope.meta.clone(),
            body: envelope.body,
        });

        let unit = state.store.get_or_create(name);
        unit.enhanced = Some(envelope_bytes);
        unit.meta = Some(envelope.meta);
        unit.defined = true;
        unit.sig_checksum = sig;
        state.image.insert(name.to_string(), loaded.clone());
        state.store.bump_generation();
        self.handles.invalidate(name);
        debug!(unit = name, "installed");
        Ok(loaded)
    }

    /// Evicts a unit and everything sharing its source file, dropping
    /// installed images and reflection handles along the way.
    pub(crate) fn evict(&self, state: &mut EngineState, name: &str) {
        let source = state.store.get(name).and_then(|u| u.source.clone());
        let victims = match source {
            Some(source) => state.store.remove_with_source(&source),
            None => state
                .store
                .remove(name)
                .map(|u| vec![u.name])
                .unwrap_or_default(),
        };
        for victim in victims {
            state.image.remove(&victim);
            self.handles.invalidate(&victim);
            debug!(unit = victim.as_str(), "evicted");
        }
    }

    /// Re-syncs the registry with the source roots: registers newly
    /// appeared files and drops units whose source vanished. Returns
    /// the fresh path-set digest.
    pub(crate) fn sync_with_sources(&self, state: &mut EngineState) -> u64 {
        let scanned = scan::scan_sources(&self.sources, &self.source_extension);
        for source in &scanned {
            if !state.store.contains(&source.name) {
                state
                    .store
                    .insert(CompilationUnit::with_source(&source.name, source.file.clone()));
            }
        }

        let mut gone: Vec<VfsFile> = Vec::new();
        for unit in state.store.iter() {
            if let Some(source) = &unit.source {
                if !source.exists() && !gone.contains(source) {
                    gone.push(source.clone());
                }
            }
        }
        for source in gone {
            for victim in state.store.remove_with_source(&source) {
                state.image.remove(&victim);
                self.handles.invalidate(&victim);
                debug!(unit = victim.as_str(), "source removed, evicted");
            }
        }

        scan::path_digest(&scanned)
    }
}

/// Member tables sourced from the installed image.
pub(crate) struct ImageMembers<'a> {
    pub(crate) image: &'a HashMap<String, Arc<LoadedUnit>>,
}

impl MemberSource for ImageMembers<'_> {
    fn members_of(&self, owner: &str) -> Option<UnitMeta> {
        self.image.get(owner).map(|loaded| loaded.meta.clone())
    }
}
