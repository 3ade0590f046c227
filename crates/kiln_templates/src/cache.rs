//! The template cache and its load ladder.

use crate::artifact::RenderArtifact;
use crate::compiler::TemplateCompiler;
use crate::error::TemplateError;
use kiln_vfs::{SearchPath, VfsFile};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Tokens start above a round floor so generated renderer names are
/// visually distinct from small indices.
const FIRST_TOKEN: u64 = 1000;

/// A cache slot. `Missing` is the negative sentinel recorded in
/// precompiled-only mode so a known-absent template fails fast on every
/// later request instead of re-walking the staging tree.
enum Slot {
    Loaded(Arc<RenderArtifact>),
    Missing,
}

/// Loads and caches compiled render templates.
///
/// The load ladder mirrors unit resolution, without the persistent tier:
/// cached-in-memory, then precompiled fast path, then compile from
/// source. Staleness is purely timestamp-based and a stale template is
/// swapped wholesale.
pub struct TemplateArtifactCache {
    /// Development mode: check staleness on every cache hit.
    dev_mode: bool,

    /// Precompiled-only mode: never compile, fail fast when no staged
    /// artifact exists.
    use_precompiled: bool,

    roots: SearchPath,
    staging: VfsFile,
    compiler: Arc<dyn TemplateCompiler>,
    slots: Mutex<HashMap<String, Slot>>,
    tokens: Mutex<HashMap<String, u64>>,
    next_token: AtomicU64,
}

impl TemplateArtifactCache {
    /// Creates a template cache.
    ///
    /// `roots` are the ordered template source roots; `staging` is the
    /// directory tree holding precompiled template artifacts.
    pub fn new(
        roots: SearchPath,
        staging: VfsFile,
        compiler: Arc<dyn TemplateCompiler>,
        dev_mode: bool,
        use_precompiled: bool,
    ) -> Self {
        Self {
            dev_mode,
            use_precompiled,
            roots,
            staging,
            compiler,
            slots: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(FIRST_TOKEN),
        }
    }

    /// Returns the unique token for a template path, assigning one on
    /// first sight. Tokens survive cache invalidation so renderer names
    /// stay stable across reloads.
    pub fn token_for(&self, path: &str) -> u64 {
        let mut tokens = match self.tokens.lock() {
            Ok(tokens) => tokens,
            Err(poisoned) => poisoned.into_inner(),
        };
        *tokens
            .entry(path.to_string())
            .or_insert_with(|| self.next_token.fetch_add(1, Ordering::SeqCst))
    }

    /// Loads the template at the given relative path.
    pub fn load(&self, path: &str) -> Result<Arc<RenderArtifact>, TemplateError> {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };

        match slots.get(path) {
            Some(Slot::Missing) if self.use_precompiled => {
                return Err(TemplateError::NotFound {
                    path: path.to_string(),
                })
            }
            Some(Slot::Loaded(artifact)) => {
                if self.dev_mode && artifact.is_stale() {
                    trace!(path, "template stale, recompiling");
                    let rebuilt = self.build(path)?;
                    slots.insert(path.to_string(), Slot::Loaded(rebuilt.clone()));
                    return Ok(rebuilt);
                }
                return Ok(artifact.clone());
            }
            _ => {}
        }

        match self.build(path) {
            Ok(artifact) => {
                slots.insert(path.to_string(), Slot::Loaded(artifact.clone()));
                Ok(artifact)
            }
            Err(err) => {
                if self.use_precompiled && matches!(err, TemplateError::NotFound { .. }) {
                    slots.insert(path.to_string(), Slot::Missing);
                }
                Err(err)
            }
        }
    }

    /// Removes one template from the cache. Its token is retained.
    pub fn invalidate(&self, path: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(path);
        }
    }

    /// Removes every cached template. Called whenever any executable
    /// unit changes, since templates may reference code of any shape.
    pub fn invalidate_all(&self) {
        let count = match self.slots.lock() {
            Ok(mut slots) => {
                let count = slots.len();
                slots.clear();
                count
            }
            Err(_) => 0,
        };
        debug!(count, "template cache invalidated");
    }

    /// Returns the number of cached entries, negative sentinels included.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a template through the precompiled-then-source ladder.
    fn build(&self, path: &str) -> Result<Arc<RenderArtifact>, TemplateError> {
        let source = self.roots.search(path);
        let staged = self.staging.child(path);

        if staged.exists() {
            let source_newer = match (&source, staged.last_modified()) {
                (Some(src), Some(art)) => {
                    !self.use_precompiled && src.last_modified().is_some_and(|s| s > art)
                }
                _ => false,
            };
            if !source_newer {
                trace!(path, "loading precompiled template");
                let bytes = staged.read().map_err(|e| TemplateError::Compile {
                    path: path.to_string(),
                    line: None,
                    message: e.to_string(),
                })?;
                let renderer = self.compiler.load_precompiled(path, &bytes)?;
                return Ok(Arc::new(RenderArtifact {
                    path: path.to_string(),
                    token: self.token_for(path),
                    timestamp: staged.last_modified(),
                    precompiled: true,
                    source,
                    renderer,
                }));
            }
        }

        if self.use_precompiled {
            return Err(TemplateError::NotFound {
                path: path.to_string(),
            });
        }

        let Some(source) = source else {
            return Err(TemplateError::NotFound {
                path: path.to_string(),
            });
        };
        let text = source.read_to_string().map_err(|e| TemplateError::Compile {
            path: path.to_string(),
            line: None,
            message: e.to_string(),
        })?;
        debug!(path, "compiling template");
        let renderer = self.compiler.compile(path, &text)?;
        Ok(Arc::new(RenderArtifact {
            path: path.to_string(),
            token: self.token_for(path),
            timestamp: source.last_modified(),
            precompiled: false,
            source: Some(source),
            renderer,
        }))
    }
}
