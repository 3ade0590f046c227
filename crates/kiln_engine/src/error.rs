//! Engine errors and detection-cycle outcomes.

use std::path::PathBuf;

/// Errors surfaced by unit resolution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested name has neither a source file nor a staged
    /// artifact. Not fatal to the engine.
    #[error("unit not found: {name}")]
    NotFound {
        /// The requested unit name.
        name: String,
    },

    /// The unit's source failed to compile. The unit has been evicted
    /// and will be rediscovered on the next reference.
    #[error("{name} does not compile at {}{}: {message}", .path.display(), line_suffix(.line))]
    Compile {
        /// The failing unit name.
        name: String,
        /// Source file of the failure.
        path: PathBuf,
        /// Line of the failure, when the compiler reports one.
        line: Option<u32>,
        /// Compiler message.
        message: String,
    },

    /// A source file could not be read.
    #[error(transparent)]
    Vfs(#[from] kiln_vfs::VfsError),

    /// An artifact envelope could not be encoded or decoded.
    #[error(transparent)]
    Envelope(#[from] kiln_common::EnvelopeError),
}

fn line_suffix(line: &Option<u32>) -> String {
    match line {
        Some(line) => format!(" line {line}"),
        None => String::new(),
    }
}

/// Why a detection cycle demands a process reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadReason {
    /// A recompiled unit's signature checksum differs from the loaded
    /// one; callers compiled against the old shape may be invalid.
    SignatureChanged {
        /// The unit whose signature changed.
        unit: String,
    },

    /// The platform rejected an in-place redefinition.
    HotSwapFailed {
        /// The platform's rejection message.
        reason: String,
    },

    /// The set of source files itself changed: a unit appeared,
    /// disappeared, or moved.
    PathSetChanged,
}

/// Result of one detection cycle.
///
/// `ReloadRequired` is terminal for the cycle: the engine stops
/// processing further units and the owning process must reinitialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No source changed since the last cycle.
    NoChange,

    /// All changes were applied in place. `hotswapped` lists the units
    /// redefined in the running process; units that were recompiled but
    /// never loaded do not appear.
    Applied {
        /// Names of units redefined in place, in registry order.
        hotswapped: Vec<String>,
    },

    /// Changes cannot be applied in place; the owning process must
    /// reload. No unit has been partially redefined.
    ReloadRequired(ReloadReason),
}
