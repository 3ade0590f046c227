//! Resolution ladder integration tests.

mod support;

use kiln_common::UnitMeta;
use kiln_engine::EngineError;
use std::sync::Arc;
use support::Harness;

#[test]
fn resolve_twice_returns_identical_artifact() {
    let h = Harness::new();
    h.write_unit("controllers/Home.unit", "method index()\nbody hello");
    let engine = h.engine();

    let first = engine.resolve("controllers.Home").unwrap();
    let second = engine.resolve("controllers.Home").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(h.compiles(), 1);
    assert_eq!(first.body, b"enh:obj:method index()\nbody hello");
}

#[test]
fn pending_units_are_batched_into_one_invocation() {
    let h = Harness::new();
    h.write_unit("controllers/Home.unit", "method index()");
    h.write_unit("models/User.unit", "field name: String");
    let engine = h.engine();

    engine.resolve("controllers.Home").unwrap();
    assert_eq!(h.compiles(), 1);

    // The batch already built models.User; resolving it installs the
    // pending output without another compiler invocation.
    engine.resolve("models.User").unwrap();
    assert_eq!(h.compiles(), 1);
}

#[test]
fn persistent_cache_survives_restart() {
    let h = Harness::new();
    h.write_unit("controllers/Home.unit", "method index()");
    {
        let engine = h.engine();
        engine.resolve("controllers.Home").unwrap();
    }
    assert_eq!(h.compiles(), 1);

    // Same source content, fresh engine: served from the persistent
    // cache without invoking the compiler.
    let engine = h.engine();
    let loaded = engine.resolve("controllers.Home").unwrap();
    assert_eq!(h.compiles(), 1);
    assert_eq!(loaded.body, b"enh:obj:method index()");
}

#[test]
fn compile_error_surfaces_location_and_evicts() {
    let h = Harness::new();
    h.write_unit("controllers/Broken.unit", "method index()\nfail unknown symbol");
    let engine = h.engine();

    match engine.resolve("controllers.Broken").unwrap_err() {
        EngineError::Compile {
            name,
            path,
            line,
            message,
        } => {
            assert_eq!(name, "controllers.Broken");
            assert!(path.ends_with("controllers/Broken.unit"));
            assert_eq!(line, Some(2));
            assert_eq!(message, "unknown symbol");
        }
        other => panic!("expected compile error, got {other}"),
    }
    // Rediscovery recompiles and fails again.
    assert!(engine.resolve("controllers.Broken").is_err());
    assert_eq!(h.compiles(), 2);
}

#[test]
fn unknown_name_is_not_found() {
    let h = Harness::new();
    let engine = h.engine();
    assert!(matches!(
        engine.resolve("ghost.Unit").unwrap_err(),
        EngineError::NotFound { .. }
    ));
}

#[test]
fn nested_unit_resolves_through_enclosing_source() {
    let h = Harness::new();
    h.write_unit("controllers/Home.unit", "method index()\nnested Form");
    let engine = h.engine();

    let nested = engine.resolve("controllers.Home$Form").unwrap();
    assert_eq!(nested.body, b"enh:obj:controllers.Home$Form");
    assert_eq!(h.compiles(), 1);

    // The enclosing unit came out of the same batch.
    engine.resolve("controllers.Home").unwrap();
    assert_eq!(h.compiles(), 1);
}

#[test]
fn precompiled_mode_loads_staged_artifact_without_compiling() {
    let h = Harness::new();
    h.stage_unit(
        "controllers.Home",
        UnitMeta {
            markers: vec!["Controller".to_string()],
            ..UnitMeta::default()
        },
        b"staged-body",
    );

    let engine = h.engine_with(&support::precompiled_config(), h.collaborators());
    let loaded = engine.resolve("controllers.Home").unwrap();
    assert_eq!(loaded.body, b"staged-body");
    assert!(loaded.meta.has_marker("Controller"));
    assert_eq!(h.compiles(), 0);
}

#[test]
fn precompiled_mode_fails_fast_on_missing_artifact() {
    let h = Harness::new();
    // A source exists, but precompiled mode must not fall back to it.
    h.write_unit("controllers/Home.unit", "method index()");

    let engine = h.engine_with(&support::precompiled_config(), h.collaborators());
    assert!(matches!(
        engine.resolve("controllers.Missing").unwrap_err(),
        EngineError::NotFound { .. }
    ));
    assert_eq!(h.compiles(), 0);
}

#[test]
fn startup_scan_installs_staged_artifacts() {
    let h = Harness::new();
    h.stage_unit("controllers.Home", UnitMeta::default(), b"staged-body");
    h.stage_unit("jobs.Cleanup", UnitMeta::default(), b"staged-job");

    let engine = h.engine_with(&support::precompiled_config(), h.collaborators());
    // The startup pass already installed the staged set: the blobs are
    // no longer needed to serve it.
    h.unstage_unit("controllers.Home");
    h.unstage_unit("jobs.Cleanup");

    assert_eq!(
        engine.resolve("controllers.Home").unwrap().body,
        b"staged-body"
    );
    assert_eq!(engine.resolve("jobs.Cleanup").unwrap().body, b"staged-job");
    assert_eq!(h.compiles(), 0);
}

#[test]
fn corrupt_staged_artifact_fails_startup() {
    let h = Harness::new();
    h.stage_raw("controllers.Home", b"not an envelope");

    assert!(kiln_engine::Engine::new(
        h.root(),
        &support::precompiled_config(),
        h.collaborators()
    )
    .is_err());
}

#[test]
fn staged_artifact_serves_sourceless_unit_in_dev() {
    let h = Harness::new();
    h.stage_unit("jobs.Cleanup", UnitMeta::default(), b"staged-job");

    let engine = h.engine();
    let loaded = engine.resolve("jobs.Cleanup").unwrap();
    assert_eq!(loaded.body, b"staged-job");
    assert_eq!(h.compiles(), 0);
}

#[test]
fn assignable_and_annotated_queries() {
    let h = Harness::new();
    h.write_unit("controllers/Base.unit", "method render(View)");
    h.write_unit(
        "controllers/Home.unit",
        "base controllers.Base\nmarker Controller\nmethod index()",
    );
    h.write_unit("models/User.unit", "field name: String");
    let engine = h.engine();

    let assignable = engine.find_assignable("controllers.Base");
    assert_eq!(assignable.len(), 1);
    assert_eq!(assignable[0].name, "controllers.Home");

    let annotated = engine.find_annotated("Controller");
    assert_eq!(annotated.len(), 1);
    assert_eq!(annotated[0].name, "controllers.Home");
}

#[test]
fn find_ignore_case_resolves_exact_unit() {
    let h = Harness::new();
    h.write_unit("controllers/Home.unit", "method index()");
    let engine = h.engine();

    let loaded = engine.find_ignore_case("CONTROLLERS.home").unwrap();
    assert_eq!(loaded.name, "controllers.Home");
    assert!(engine.find_ignore_case("controllers.missing").is_none());
}

#[test]
fn handle_lookup_walks_ancestors_and_caches() {
    let h = Harness::new();
    h.write_unit(
        "controllers/Base.unit",
        "method render(View)\nmethod checkAccess() hook\nfield request: Request",
    );
    h.write_unit("controllers/Home.unit", "base controllers.Base\nmethod Index()");
    let engine = h.engine();
    engine.resolve("controllers.Base").unwrap();
    engine.resolve("controllers.Home").unwrap();

    let render = engine
        .method_handle("controllers.Home", "render", &["View"])
        .unwrap();
    assert_eq!(render.owner, "controllers.Base");

    let field = engine.field_handle("controllers.Home", "request").unwrap();
    assert_eq!(field.type_name, "Request");

    // Dispatch: case-insensitive, hooks skipped.
    let dispatch = engine.dispatch_method("controllers.Home", "index").unwrap();
    assert_eq!(dispatch.name, "Index");
    assert!(engine
        .dispatch_method("controllers.Home", "checkaccess")
        .is_none());

    assert!(engine.reflection_entries() > 0);
    engine.invalidate_reflection("controllers.Home");
    engine.invalidate_reflection("controllers.Base");
    assert_eq!(engine.reflection_entries(), 0);
}

#[test]
fn generation_changes_on_install() {
    let h = Harness::new();
    h.write_unit("controllers/Home.unit", "method index()");
    let engine = h.engine();

    let before = engine.generation();
    engine.resolve("controllers.Home").unwrap();
    assert_ne!(before, engine.generation());

    // Identity hit leaves the generation alone.
    let settled = engine.generation();
    engine.resolve("controllers.Home").unwrap();
    assert_eq!(settled, engine.generation());
}
