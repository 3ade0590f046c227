//! The ordered registry of known compilation units.

use crate::unit::CompilationUnit;
use kiln_vfs::VfsFile;
use std::collections::BTreeMap;

/// Ordered in-memory registry of known compilation units, keyed by
/// qualified name.
///
/// At most one entry exists per name. Every structural mutation bumps a
/// generation counter so collaborators can cheaply observe that the set
/// of loaded code changed.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    units: BTreeMap<String, CompilationUnit>,
    generation: u64,
}

impl ArtifactStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current generation token. The value changes whenever
    /// a unit is added, removed, or redefined.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bumps the generation token. Called by the engine after an
    /// in-place redefinition, which mutates a unit without changing the
    /// set of names.
    pub fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// Returns `true` if a unit with this name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Looks up a unit by name.
    pub fn get(&self, name: &str) -> Option<&CompilationUnit> {
        self.units.get(name)
    }

    /// Looks up a unit mutably by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut CompilationUnit> {
        self.units.get_mut(name)
    }

    /// Inserts a unit, replacing any previous entry of the same name.
    pub fn insert(&mut self, unit: CompilationUnit) {
        self.units.insert(unit.name.clone(), unit);
        self.generation += 1;
    }

    /// Returns the unit with this name, creating an empty record if it is
    /// not yet known.
    pub fn get_or_create(&mut self, name: &str) -> &mut CompilationUnit {
        if !self.units.contains_key(name) {
            self.generation += 1;
        }
        self.units
            .entry(name.to_string())
            .or_insert_with(|| CompilationUnit::new(name))
    }

    /// Removes a unit from the registry, forcing rediscovery on the next
    /// reference.
    pub fn remove(&mut self, name: &str) -> Option<CompilationUnit> {
        let removed = self.units.remove(name);
        if removed.is_some() {
            self.generation += 1;
        }
        removed
    }

    /// Removes every unit backed by the given source file and returns the
    /// evicted names. Nested units share their enclosing unit's source,
    /// so a deleted file takes all of them out together.
    pub fn remove_with_source(&mut self, source: &VfsFile) -> Vec<String> {
        let victims: Vec<String> = self
            .units
            .values()
            .filter(|u| u.source.as_ref() == Some(source))
            .map(|u| u.name.clone())
            .collect();
        for name in &victims {
            self.units.remove(name);
            self.generation += 1;
        }
        victims
    }

    /// Returns all known unit names, in registry (sorted) order.
    pub fn names(&self) -> Vec<&str> {
        self.units.keys().map(String::as_str).collect()
    }

    /// Iterates all units in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.values()
    }

    /// Iterates all units mutably, in registry order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CompilationUnit> {
        self.units.values_mut()
    }

    /// Returns the number of known units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if no units are known.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Finds a unit by case-insensitive name, also accepting dots in
    /// place of the nested-unit separator.
    pub fn find_ignore_case(&self, name: &str) -> Option<&CompilationUnit> {
        self.units.values().find(|u| {
            u.name.eq_ignore_ascii_case(name) || u.name.replace('$', ".").eq_ignore_ascii_case(name)
        })
    }

    /// Returns the names of units whose base-type chain includes `base`.
    ///
    /// The chain is walked through each unit's metadata; units without
    /// metadata (never built) do not participate. A cycle in the chain
    /// terminates the walk rather than looping.
    pub fn assignable_to(&self, base: &str) -> Vec<&CompilationUnit> {
        self.units
            .values()
            .filter(|u| self.extends(u, base))
            .collect()
    }

    fn extends(&self, unit: &CompilationUnit, base: &str) -> bool {
        let mut seen = vec![unit.name.as_str()];
        let mut current = unit.meta.as_ref().and_then(|m| m.base.as_deref());
        while let Some(parent) = current {
            if parent == base {
                return true;
            }
            if seen.contains(&parent) {
                return false;
            }
            seen.push(parent);
            current = self
                .units
                .get(parent)
                .and_then(|u| u.meta.as_ref())
                .and_then(|m| m.base.as_deref());
        }
        false
    }

    /// Returns the units carrying the given marker.
    pub fn annotated_with(&self, marker: &str) -> Vec<&CompilationUnit> {
        self.units
            .values()
            .filter(|u| u.meta.as_ref().is_some_and(|m| m.has_marker(marker)))
            .collect()
    }
}
