//! The handle cache and its resolution rules.

use crate::handle::{FieldHandle, MethodHandle};
use kiln_common::UnitMeta;
use std::collections::HashMap;
use std::sync::RwLock;

/// Supplies member tables for loaded units.
///
/// Implemented by the engine over its installed-unit registry. The cache
/// holds no unit lifetimes; it only derives lookup results from what the
/// source reports at resolution time.
pub trait MemberSource {
    /// Returns the member table for a loaded unit, or `None` if no unit
    /// of that name is loaded.
    fn members_of(&self, owner: &str) -> Option<UnitMeta>;
}

type MethodKey = (String, String, Vec<String>);
type FieldKey = (String, String);

/// Caches resolved method, field, and dispatch-method handles per owner.
///
/// All three lookups cache "no such member" as a positive result, so a
/// repeated failing lookup costs one map probe rather than an ancestor
/// walk. Reads take a shared lock; inserts are insert-if-absent, keeping
/// the first resolution if two threads race.
#[derive(Debug, Default)]
pub struct HandleCache {
    methods: RwLock<HashMap<MethodKey, Option<MethodHandle>>>,
    fields: RwLock<HashMap<FieldKey, Option<FieldHandle>>>,
    dispatch: RwLock<HashMap<FieldKey, Option<MethodHandle>>>,
}

impl HandleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a public method by exact name and argument types, walking
    /// the owner's ancestor chain.
    pub fn get_method(
        &self,
        source: &dyn MemberSource,
        owner: &str,
        name: &str,
        arg_types: &[&str],
    ) -> Option<MethodHandle> {
        let key = (
            owner.to_string(),
            name.to_string(),
            arg_types.iter().map(|t| t.to_string()).collect(),
        );
        if let Some(cached) = self.methods.read().ok()?.get(&key) {
            return cached.clone();
        }

        let resolved = walk_chain(source, owner, |decl_owner, meta| {
            meta.method(name, arg_types)
                .filter(|m| m.public)
                .map(|m| MethodHandle {
                    owner: decl_owner.to_string(),
                    name: m.name.clone(),
                    arg_types: m.arg_types.clone(),
                })
        });
        self.methods
            .write()
            .ok()?
            .entry(key)
            .or_insert(resolved)
            .clone()
    }

    /// Looks up a field by exact name, walking the owner's ancestor chain.
    pub fn get_field(
        &self,
        source: &dyn MemberSource,
        owner: &str,
        name: &str,
    ) -> Option<FieldHandle> {
        let key = (owner.to_string(), name.to_string());
        if let Some(cached) = self.fields.read().ok()?.get(&key) {
            return cached.clone();
        }

        let resolved = walk_chain(source, owner, |decl_owner, meta| {
            meta.field(name).map(|f| FieldHandle {
                owner: decl_owner.to_string(),
                name: f.name.clone(),
                type_name: f.type_name.clone(),
            })
        });
        self.fields
            .write()
            .ok()?
            .entry(key)
            .or_insert(resolved)
            .clone()
    }

    /// Resolves a dispatch method: the first public method whose name
    /// matches case-insensitively and that is not tagged as a lifecycle
    /// hook, walking the owner's ancestor chain. This resolution order is
    /// deterministic and part of the engine's contract.
    pub fn find_dispatch_method(
        &self,
        source: &dyn MemberSource,
        owner: &str,
        name: &str,
    ) -> Option<MethodHandle> {
        let key = (owner.to_string(), name.to_ascii_lowercase());
        if let Some(cached) = self.dispatch.read().ok()?.get(&key) {
            return cached.clone();
        }

        let resolved = walk_chain(source, owner, |decl_owner, meta| {
            meta.methods
                .iter()
                .find(|m| m.public && !m.lifecycle_hook && m.name.eq_ignore_ascii_case(name))
                .map(|m| MethodHandle {
                    owner: decl_owner.to_string(),
                    name: m.name.clone(),
                    arg_types: m.arg_types.clone(),
                })
        });
        self.dispatch
            .write()
            .ok()?
            .entry(key)
            .or_insert(resolved)
            .clone()
    }

    /// Removes every cached entry scoped to the given owner.
    ///
    /// Must be called exactly once per unit that is redefined or newly
    /// installed. Calling it for an untouched owner only costs
    /// re-resolution, never correctness.
    pub fn invalidate(&self, owner: &str) {
        if let Ok(mut methods) = self.methods.write() {
            methods.retain(|key, _| key.0 != owner);
        }
        if let Ok(mut fields) = self.fields.write() {
            fields.retain(|key, _| key.0 != owner);
        }
        if let Ok(mut dispatch) = self.dispatch.write() {
            dispatch.retain(|key, _| key.0 != owner);
        }
    }

    /// Removes every cached entry.
    pub fn clear(&self) {
        if let Ok(mut methods) = self.methods.write() {
            methods.clear();
        }
        if let Ok(mut fields) = self.fields.write() {
            fields.clear();
        }
        if let Ok(mut dispatch) = self.dispatch.write() {
            dispatch.clear();
        }
    }

    /// Returns the total number of cached entries, negative results
    /// included.
    pub fn len(&self) -> usize {
        let methods = self.methods.read().map(|m| m.len()).unwrap_or(0);
        let fields = self.fields.read().map(|m| m.len()).unwrap_or(0);
        let dispatch = self.dispatch.read().map(|m| m.len()).unwrap_or(0);
        methods + fields + dispatch
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Walks `owner` and its ancestors, applying `select` to each member
/// table until it yields a handle. A cycle in the base chain terminates
/// the walk.
fn walk_chain<T>(
    source: &dyn MemberSource,
    owner: &str,
    select: impl Fn(&str, &UnitMeta) -> Option<T>,
) -> Option<T> {
    let mut seen: Vec<String> = Vec::new();
    let mut current = owner.to_string();
    loop {
        let meta = source.members_of(&current)?;
        if let Some(found) = select(&current, &meta) {
            return Some(found);
        }
        seen.push(current);
        match meta.base {
            Some(base) if !seen.contains(&base) => current = base,
            _ => return None,
        }
    }
}
