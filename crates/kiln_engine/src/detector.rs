//! The change-detection cycle.
//!
//! One cycle walks the state machine
//! `Idle -> Scanning -> {NoChange | Recompiling} -> {Applied | ReloadRequired} -> Idle`.
//! `ReloadRequired` is terminal: the cycle stops where it is raised and
//! never leaves a unit partially redefined, so the owning process can
//! reinitialize from a consistent registry.

use crate::engine::{Engine, EngineState};
use crate::error::{CycleOutcome, ReloadReason};
use crate::loaded::LoadedUnit;
use crate::scan;
use crate::traits::Redefinition;
use kiln_common::{unit_name, ArtifactEnvelope};
use kiln_vfs::VfsFile;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) fn run_cycle(engine: &Engine, state: &mut EngineState) -> CycleOutcome {
    // Directly changed: built units whose source is strictly newer than
    // the recorded build timestamp. Units never built are not changes,
    // they are simply not yet loaded.
    let dirty: Vec<String> = state
        .store
        .iter()
        .filter(|u| u.timestamp.is_some() && u.is_stale())
        .map(|u| u.name.clone())
        .collect();

    // Best-effort signature re-derivation for units that predate their
    // checksum. Failure only costs hot-swap precision.
    for name in &dirty {
        rederive_signature(engine, state, name);
    }

    // Affected set: direct changes plus dependency expansion.
    let mut affected = dirty.clone();
    if !dirty.is_empty() {
        for extra in engine.dependencies.on_changed(&dirty) {
            if !affected.contains(&extra)
                && state.store.get(&extra).is_some_and(|u| u.source.is_some())
            {
                affected.push(extra);
            }
        }
    }

    let mut changed = false;
    let mut hotswapped: Vec<String> = Vec::new();
    if !affected.is_empty() {
        info!(units = affected.len(), "recompiling affected set");
        changed = true;

        let mut prior_sigs = HashMap::new();
        for name in &affected {
            if let Some(unit) = state.store.get_mut(name) {
                prior_sigs.insert(name.clone(), unit.sig_checksum);
                let timestamp = unit.source.as_ref().and_then(|s| s.last_modified());
                unit.refresh(timestamp);
            }
        }

        let report = engine.compile_units(state, &affected);

        // An affected unit the batch no longer emits was subsumed by the
        // edit, e.g. a nested unit dropped from its enclosing source. It
        // must not keep serving the pre-edit artifact.
        for name in &affected {
            if report.built.contains(name) {
                continue;
            }
            let enclosing = unit_name::enclosing(name);
            if report
                .failures
                .iter()
                .any(|d| d.name == *name || d.name == enclosing)
            {
                continue;
            }
            if state.store.remove(name).is_some() {
                state.image.remove(name);
                engine.handles.invalidate(name);
                debug!(unit = name.as_str(), "no longer produced, evicted");
            }
        }

        // Classify before touching the image: a single signature change
        // makes the whole cycle reload-required, with nothing applied.
        for (name, new_sig) in &report.new_sigs {
            if !state.image.contains_key(name) {
                continue;
            }
            let prior = prior_sigs.get(name).copied().flatten();
            if prior != Some(*new_sig) {
                warn!(unit = name.as_str(), "signature changed, reload required");
                engine.templates.invalidate_all();
                return CycleOutcome::ReloadRequired(ReloadReason::SignatureChanged {
                    unit: name.clone(),
                });
            }
        }

        let mut queue: Vec<Redefinition> = Vec::new();
        for name in &report.built {
            if !state.image.contains_key(name) {
                continue;
            }
            if let Some(bytes) = state.store.get(name).and_then(|u| u.enhanced.clone()) {
                queue.push(Redefinition {
                    name: name.clone(),
                    bytes,
                });
            }
        }

        if !queue.is_empty() {
            // Old-shape instances must not outlive the swap.
            engine.value_cache.clear();
            match engine.hot_swap.redefine(&queue) {
                Ok(()) => {
                    for redefinition in &queue {
                        adopt(engine, state, redefinition);
                        hotswapped.push(redefinition.name.clone());
                    }
                    info!(units = hotswapped.len(), "hot swap applied");
                }
                Err(err) => {
                    warn!(%err, "hot swap rejected, reload required");
                    engine.templates.invalidate_all();
                    return CycleOutcome::ReloadRequired(ReloadReason::HotSwapFailed {
                        reason: err.reason,
                    });
                }
            }
        }
    }

    // Removed sources take out every unit sharing them, nested units
    // included.
    let mut gone: Vec<VfsFile> = Vec::new();
    for unit in state.store.iter() {
        if let Some(source) = &unit.source {
            if !source.exists() && !gone.contains(source) {
                gone.push(source.clone());
            }
        }
    }
    for source in &gone {
        for victim in state.store.remove_with_source(source) {
            state.image.remove(&victim);
            engine.handles.invalidate(&victim);
            debug!(unit = victim.as_str(), "source removed, evicted");
            changed = true;
        }
    }

    if changed {
        engine.templates.invalidate_all();
    }

    // Wholesale path-set changes escalate to reload-required.
    let scanned = scan::scan_sources(&engine.sources, &engine.source_extension);
    let digest = scan::path_digest(&scanned);
    if digest != state.path_digest {
        state.path_digest = digest;
        info!("path set changed, reload required");
        return CycleOutcome::ReloadRequired(ReloadReason::PathSetChanged);
    }

    if changed {
        CycleOutcome::Applied { hotswapped }
    } else {
        CycleOutcome::NoChange
    }
}

/// Re-derives a missing signature checksum from the stored envelope's
/// member table.
fn rederive_signature(engine: &Engine, state: &mut EngineState, name: &str) {
    let Some(unit) = state.store.get_mut(name) else {
        return;
    };
    if unit.sig_checksum.is_some() {
        return;
    }
    let Some(bytes) = &unit.enhanced else {
        return;
    };
    if let Ok(envelope) = ArtifactEnvelope::decode(bytes) {
        unit.sig_checksum = engine.enhancer.derive_signature(&envelope.meta);
    }
}

/// Adopts a successfully redefined unit: replaces its image entry,
/// marks it defined, and drops its reflection handles.
fn adopt(engine: &Engine, state: &mut EngineState, redefinition: &Redefinition) {
    let Ok(envelope) = ArtifactEnvelope::decode(&redefinition.bytes) else {
        warn!(unit = redefinition.name.as_str(), "undecodable redefinition, image kept");
        return;
    };
    state.image.insert(
        redefinition.name.clone(),
        Arc::new(LoadedUnit {
            name: redefinition.name.clone(),
            meta: envelope.meta,
            body: envelope.body,
        }),
    );
    if let Some(unit) = state.store.get_mut(&redefinition.name) {
        unit.defined = true;
    }
    state.store.bump_generation();
    engine.handles.invalidate(&redefinition.name);
}
