//! Error types for template loading.

/// Errors surfaced while loading a render template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// No source or precompiled artifact exists for the path.
    #[error("template not found: {path}")]
    NotFound {
        /// The requested template path.
        path: String,
    },

    /// The template source failed to compile.
    #[error("template {path} does not compile{}: {message}", line_suffix(.line))]
    Compile {
        /// The template path.
        path: String,
        /// Line of the failure, when the compiler reports one.
        line: Option<u32>,
        /// Compiler message.
        message: String,
    },
}

fn line_suffix(line: &Option<u32>) -> String {
    match line {
        Some(line) => format!(" at line {line}"),
        None => String::new(),
    }
}
