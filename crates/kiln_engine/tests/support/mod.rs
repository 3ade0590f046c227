//! Shared harness for engine integration tests.
//!
//! Units use a line-oriented toy source format the stub compiler
//! understands: `base N`, `marker M`, `method name(Args)` with optional
//! `private` / `hook` words, `field name: Type`, `nested Simple`, and
//! `fail message` to force a diagnostic. Unknown lines are treated as
//! body text, so edits to them change the compiled bytes without
//! touching the signature.

#![allow(dead_code)]

use kiln_common::{ArtifactEnvelope, FieldDecl, MethodDecl, SigChecksum, UnitMeta};
use kiln_config::{EngineConfig, Mode};
use kiln_engine::{
    Collaborators, CompileBatch, CompileDiagnostic, CompileRequest, CompiledUnit, DependencyTracker,
    Engine, Enhanced, Enhancer, HotSwap, HotSwapError, Redefinition, UnitCompiler, ValueCache,
};
use kiln_templates::{RenderTemplate, TemplateCompiler, TemplateError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Parses the toy source format into a member table, nested unit names,
/// and an optional forced failure.
pub fn parse_source(text: &str) -> Result<(UnitMeta, Vec<String>), (u32, String)> {
    let mut meta = UnitMeta::default();
    let mut nested = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("base ") {
            meta.base = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("marker ") {
            meta.markers.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("field ") {
            let (name, type_name) = rest.split_once(':').unwrap_or((rest, "Any"));
            meta.fields.push(FieldDecl {
                name: name.trim().to_string(),
                type_name: type_name.trim().to_string(),
            });
        } else if let Some(rest) = line.strip_prefix("method ") {
            let (sig, flags) = rest.split_once(')').unwrap_or((rest, ""));
            let (name, args) = sig.split_once('(').unwrap_or((sig, ""));
            let arg_types: Vec<String> = args
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
            meta.methods.push(MethodDecl {
                name: name.trim().to_string(),
                arg_types,
                public: !flags.contains("private"),
                lifecycle_hook: flags.contains("hook"),
            });
        } else if let Some(rest) = line.strip_prefix("nested ") {
            nested.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("fail ") {
            return Err(((index + 1) as u32, rest.trim().to_string()));
        }
    }
    Ok((meta, nested))
}

/// Canonical signature over the externally visible shape: base, public
/// methods, fields. Markers and bodies do not participate.
pub fn signature_of(meta: &UnitMeta) -> SigChecksum {
    let mut canonical = String::new();
    if let Some(base) = &meta.base {
        canonical.push_str(base);
    }
    canonical.push('|');
    for method in &meta.methods {
        if method.public {
            canonical.push_str(&method.name);
            canonical.push('(');
            canonical.push_str(&method.arg_types.join(","));
            canonical.push_str(");");
        }
    }
    canonical.push('|');
    for field in &meta.fields {
        canonical.push_str(&field.name);
        canonical.push(':');
        canonical.push_str(&field.type_name);
        canonical.push(';');
    }
    SigChecksum::of(canonical.as_bytes())
}

/// Compiler over the toy format, counting invocations.
#[derive(Default)]
pub struct StubCompiler {
    pub calls: AtomicUsize,
}

impl UnitCompiler for StubCompiler {
    fn compile(&self, requests: &[CompileRequest]) -> CompileBatch {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut batch = CompileBatch::default();
        for request in requests {
            match parse_source(&request.text) {
                Ok((meta, nested)) => {
                    batch.units.push(CompiledUnit {
                        name: request.name.clone(),
                        bytes: format!("obj:{}", request.text).into_bytes(),
                        meta,
                        derivable: false,
                    });
                    for simple in nested {
                        batch.units.push(CompiledUnit {
                            name: format!("{}${simple}", request.name),
                            bytes: format!("obj:{}${simple}", request.name).into_bytes(),
                            meta: UnitMeta::default(),
                            derivable: true,
                        });
                    }
                }
                Err((line, message)) => batch.failures.push(CompileDiagnostic {
                    name: request.name.clone(),
                    path: request.source.path().to_path_buf(),
                    line: Some(line),
                    message,
                }),
            }
        }
        batch
    }
}

/// Enhancer prefixing bodies and deriving signatures from member tables.
#[derive(Default)]
pub struct StubEnhancer;

impl Enhancer for StubEnhancer {
    fn enhance(&self, _name: &str, body: &[u8], meta: &UnitMeta) -> Enhanced {
        Enhanced {
            body: [b"enh:".as_slice(), body].concat(),
            sig_checksum: signature_of(meta),
        }
    }

    fn derive_signature(&self, meta: &UnitMeta) -> Option<SigChecksum> {
        Some(signature_of(meta))
    }
}

/// Hot swap that always succeeds, recording what it was asked to swap.
#[derive(Default)]
pub struct PermitHotSwap {
    pub calls: AtomicUsize,
    pub swapped: Mutex<Vec<String>>,
}

impl HotSwap for PermitHotSwap {
    fn redefine(&self, redefinitions: &[Redefinition]) -> Result<(), HotSwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut swapped = self.swapped.lock().unwrap();
        swapped.extend(redefinitions.iter().map(|r| r.name.clone()));
        Ok(())
    }
}

/// Value cache counting clears.
#[derive(Default)]
pub struct CountingValueCache {
    pub clears: AtomicUsize,
}

impl ValueCache for CountingValueCache {
    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Dependency tracker backed by a fixed expansion map.
pub struct MapDependencies {
    pub map: HashMap<String, Vec<String>>,
}

impl DependencyTracker for MapDependencies {
    fn on_changed(&self, changed: &[String]) -> Vec<String> {
        changed
            .iter()
            .filter_map(|name| self.map.get(name))
            .flatten()
            .cloned()
            .collect()
    }
}

struct EchoTemplate {
    body: String,
}

impl RenderTemplate for EchoTemplate {
    fn render(&self, _args: &BTreeMap<String, String>) -> String {
        self.body.clone()
    }
}

/// Template compiler that echoes sources back.
#[derive(Default)]
pub struct SimpleTemplates;

impl TemplateCompiler for SimpleTemplates {
    fn compile(&self, _path: &str, source: &str) -> Result<Arc<dyn RenderTemplate>, TemplateError> {
        Ok(Arc::new(EchoTemplate {
            body: source.to_string(),
        }))
    }

    fn load_precompiled(
        &self,
        _path: &str,
        artifact: &[u8],
    ) -> Result<Arc<dyn RenderTemplate>, TemplateError> {
        Ok(Arc::new(EchoTemplate {
            body: String::from_utf8_lossy(artifact).into_owned(),
        }))
    }
}

/// One application directory with its collaborator stubs.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub compiler: Arc<StubCompiler>,
    pub hot_swap: Arc<PermitHotSwap>,
    pub values: Arc<CountingValueCache>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app/views")).unwrap();
        Self {
            dir,
            compiler: Arc::new(StubCompiler::default()),
            hot_swap: Arc::new(PermitHotSwap::default()),
            values: Arc::new(CountingValueCache::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn unit_path(&self, relative: &str) -> PathBuf {
        self.root().join("app").join(relative)
    }

    pub fn write_unit(&self, relative: &str, text: &str) {
        let path = self.unit_path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    pub fn delete_unit(&self, relative: &str) {
        std::fs::remove_file(self.unit_path(relative)).unwrap();
    }

    /// Pushes a unit source's mtime into the future so it reads as
    /// strictly newer than any recorded build timestamp.
    pub fn bump_mtime(&self, relative: &str, seconds: u64) {
        let file = std::fs::File::options()
            .write(true)
            .open(self.unit_path(relative))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(seconds))
            .unwrap();
    }

    pub fn write_template(&self, relative: &str, text: &str) {
        let path = self.root().join("app/views").join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn staged_unit_path(&self, name: &str) -> PathBuf {
        let relative = kiln_common::unit_name::to_artifact_path(name, "blob");
        self.root().join("precompiled/units").join(relative)
    }

    /// Stages a precompiled artifact envelope for a unit name.
    pub fn stage_unit(&self, name: &str, meta: UnitMeta, body: &[u8]) {
        let bytes = ArtifactEnvelope::new(meta, body.to_vec()).encode().unwrap();
        self.stage_raw(name, &bytes);
    }

    /// Stages raw bytes for a unit name, bypassing the envelope codec.
    pub fn stage_raw(&self, name: &str, bytes: &[u8]) {
        let path = self.staged_unit_path(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    /// Deletes a staged artifact.
    pub fn unstage_unit(&self, name: &str) {
        std::fs::remove_file(self.staged_unit_path(name)).unwrap();
    }

    pub fn compiles(&self) -> usize {
        self.compiler.calls.load(Ordering::SeqCst)
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.compiler.clone(),
            Arc::new(StubEnhancer),
            Arc::new(SimpleTemplates),
        )
        .with_hot_swap(self.hot_swap.clone())
        .with_value_cache(self.values.clone())
    }

    /// Development-mode engine with the permissive hot-swap stub.
    pub fn engine(&self) -> Engine {
        Engine::new(self.root(), &EngineConfig::default(), self.collaborators()).unwrap()
    }

    pub fn engine_with(&self, config: &EngineConfig, collaborators: Collaborators) -> Engine {
        Engine::new(self.root(), config, collaborators).unwrap()
    }
}

/// Production configuration trusting staged artifacts unconditionally.
pub fn precompiled_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.engine.mode = Mode::Prod;
    config.engine.use_precompiled = true;
    config
}
