//! Unit member metadata used for dispatch resolution and type queries.
//!
//! The engine never inspects loaded code reflectively. Instead the compiler
//! emits an explicit member table per unit, which travels inside the
//! artifact envelope and backs method/field handle lookup, assignable
//! queries, and marker queries.

use serde::{Deserialize, Serialize};

/// Derived metadata describing a compilation unit's externally visible shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMeta {
    /// Qualified name of the unit this one extends, if any. Ancestor
    /// chains for dispatch resolution and assignable queries are walked
    /// through this link.
    pub base: Option<String>,

    /// Marker names attached to the unit (e.g. `Controller`, `Job`).
    pub markers: Vec<String>,

    /// Callable members declared directly on the unit.
    pub methods: Vec<MethodDecl>,

    /// Data members declared directly on the unit.
    pub fields: Vec<FieldDecl>,
}

impl UnitMeta {
    /// Returns `true` if the unit carries the given marker.
    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }

    /// Finds a declared method by exact name and argument types.
    pub fn method(&self, name: &str, arg_types: &[&str]) -> Option<&MethodDecl> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.arg_types.iter().map(String::as_str).eq(arg_types.iter().copied()))
    }

    /// Finds a declared field by exact name.
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A callable member declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    /// Method name, case-preserved as declared.
    pub name: String,

    /// Declared argument type names, in order.
    pub arg_types: Vec<String>,

    /// `true` if the method is callable from outside the unit.
    pub public: bool,

    /// `true` if the method is a lifecycle hook. Hooks are never selected
    /// by dispatch-method resolution.
    pub lifecycle_hook: bool,
}

/// A data member declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name.
    pub name: String,

    /// Declared type name.
    pub type_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> UnitMeta {
        UnitMeta {
            base: Some("controllers.Base".to_string()),
            markers: vec!["Controller".to_string()],
            methods: vec![
                MethodDecl {
                    name: "index".to_string(),
                    arg_types: vec![],
                    public: true,
                    lifecycle_hook: false,
                },
                MethodDecl {
                    name: "show".to_string(),
                    arg_types: vec!["Id".to_string()],
                    public: true,
                    lifecycle_hook: false,
                },
            ],
            fields: vec![FieldDecl {
                name: "title".to_string(),
                type_name: "String".to_string(),
            }],
        }
    }

    #[test]
    fn marker_lookup() {
        let meta = sample_meta();
        assert!(meta.has_marker("Controller"));
        assert!(!meta.has_marker("Job"));
    }

    #[test]
    fn method_lookup_matches_arg_types() {
        let meta = sample_meta();
        assert!(meta.method("show", &["Id"]).is_some());
        assert!(meta.method("show", &[]).is_none());
        assert!(meta.method("index", &[]).is_some());
    }

    #[test]
    fn field_lookup() {
        let meta = sample_meta();
        assert_eq!(meta.field("title").unwrap().type_name, "String");
        assert!(meta.field("missing").is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let meta = sample_meta();
        let json = serde_json::to_string(&meta).unwrap();
        let back: UnitMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }
}
