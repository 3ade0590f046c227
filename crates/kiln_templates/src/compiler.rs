//! The template-rendering collaborator contract.
//!
//! The rendering engine itself is external; only its load contract is
//! modeled here.

use crate::error::TemplateError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A compiled, executable template.
pub trait RenderTemplate: Send + Sync {
    /// Renders the template with the given arguments.
    fn render(&self, args: &BTreeMap<String, String>) -> String;
}

/// Compiles template sources and loads precompiled template artifacts.
pub trait TemplateCompiler: Send + Sync {
    /// Compiles a template from source text.
    fn compile(&self, path: &str, source: &str) -> Result<Arc<dyn RenderTemplate>, TemplateError>;

    /// Loads a template from a precompiled artifact produced by an
    /// offline build step.
    fn load_precompiled(
        &self,
        path: &str,
        artifact: &[u8],
    ) -> Result<Arc<dyn RenderTemplate>, TemplateError>;
}
