//! The in-process image of installed units.

use kiln_common::UnitMeta;

/// One unit installed in the running process.
///
/// Shared immutably: a redefinition installs a fresh `LoadedUnit` rather
/// than mutating this one, so holders of an old handle keep observing a
/// consistent artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedUnit {
    /// Qualified unit name.
    pub name: String,

    /// Member metadata backing handle lookup and type queries.
    pub meta: UnitMeta,

    /// The enhanced body installed in the process.
    pub body: Vec<u8>,
}
