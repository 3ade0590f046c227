//! Resolved member handles.

/// A resolved method lookup.
///
/// `owner` names the unit that declares the method, which for an
/// inherited method is an ancestor of the unit the lookup was scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    /// Declaring unit name.
    pub owner: String,

    /// Method name, case-preserved as declared.
    pub name: String,

    /// Declared argument type names.
    pub arg_types: Vec<String>,
}

/// A resolved field lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHandle {
    /// Declaring unit name.
    pub owner: String,

    /// Field name.
    pub name: String,

    /// Declared type name.
    pub type_name: String,
}
