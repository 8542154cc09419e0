use std::sync::Arc;

use buildstate::project::{read_state, write_state};
use buildstate::{BuildConfig, BuildJob, BuildKind, FileChange, ProjectId, TypeName};

use crate::helpers::fixtures::{
    assert_same_as_full_build, built_from_scratch, changed, full_build, project, run, state,
    type_names, workspace,
};
use crate::helpers::mock_compiler::{MockCompiler, MockType};

fn deletion_fixture() -> (Arc<MockCompiler>, buildstate::BuildWorkspace) {
    let compiler = Arc::new(MockCompiler::new());
    compiler.set_unit("P", "src/a/Other.java", vec![MockType::new("a/Other")]);
    compiler.set_unit(
        "P",
        "src/b/WithOther.java",
        vec![MockType::new("b/WithOther").refs(&["Other"])],
    );
    compiler.set_unit("P", "src/c/Alone.java", vec![MockType::new("c/Alone").refs(&["String"])]);
    let mut ws = workspace(compiler.clone(), BuildConfig::default());
    ws.add_project(project("P"));
    (compiler, ws)
}

#[test]
fn test_removing_a_package_drops_its_types() {
    let (compiler, ws) = deletion_fixture();
    full_build(&ws);

    compiler.remove_unit("P", "src/a/Other.java");
    compiler.reset_log();
    let result = changed(&ws, "P", vec![FileChange::removed("src/a")]);

    assert_eq!(result.kind, BuildKind::Incremental);
    assert_eq!(result.next_build_number, 1);
    assert_eq!(type_names(&result), vec!["b/WithOther"]);
    assert_eq!(compiler.compiled("P"), vec!["src/b/WithOther.java"]);

    let after = state(&ws, "P");
    assert!(!after.is_known_type(&TypeName::new("a/Other")));
    assert!(!after.is_known_package("a"));
    assert!(after.is_known_type(&TypeName::new("c/Alone")));

    let bytes = write_state(&after).unwrap();
    let reread = read_state(&bytes, Some(&ProjectId::new("P"))).unwrap();
    assert_eq!(&reread, after.as_ref());
    assert_same_as_full_build(&reread, &built_from_scratch(compiler, project("P")));
}

#[test]
fn test_removing_a_single_unit() {
    let (compiler, ws) = deletion_fixture();
    full_build(&ws);

    compiler.remove_unit("P", "src/a/Other.java");
    let result = changed(&ws, "P", vec![FileChange::removed("src/a/Other.java")]);
    assert_eq!(type_names(&result), vec!["b/WithOther"]);
    assert!(!state(&ws, "P").is_known_type(&TypeName::new("a/Other")));
    assert_same_as_full_build(&state(&ws, "P"), &built_from_scratch(compiler, project("P")));
}

#[test]
fn test_non_structural_change_compiles_only_the_unit() {
    let (compiler, ws) = deletion_fixture();
    full_build(&ws);

    compiler.reset_log();
    let result = changed(&ws, "P", vec![FileChange::changed("src/a/Other.java")]);
    assert_eq!(type_names(&result), vec!["a/Other"]);
    assert_eq!(compiler.compiled("P"), vec!["src/a/Other.java"]);
}

#[test]
fn test_type_moved_out_of_unit_is_removed() {
    let (compiler, ws) = deletion_fixture();
    full_build(&ws);

    // The unit now defines a differently named type
    compiler.set_unit("P", "src/a/Other.java", vec![MockType::new("a/Renamed")]);
    let result = changed(&ws, "P", vec![FileChange::changed("src/a/Other.java")]);

    let after = state(&ws, "P");
    assert!(!after.is_known_type(&TypeName::new("a/Other")));
    assert!(after.is_known_type(&TypeName::new("a/Renamed")));
    assert!(type_names(&result).contains(&"b/WithOther"));
    assert_same_as_full_build(&after, &built_from_scratch(compiler, project("P")));
}

#[test]
fn test_unit_from_an_earlier_loop_is_recompiled() {
    let compiler = Arc::new(MockCompiler::new());
    compiler.set_unit("P", "src/p/A.java", vec![MockType::new("p/A").structural()]);
    compiler.set_unit("P", "src/p/B.java", vec![MockType::new("p/B").refs(&["Cee"])]);
    compiler.set_unit(
        "P",
        "src/p/Cee.java",
        vec![MockType::new("p/Cee").refs(&["A"]).structural()],
    );
    let mut ws = workspace(compiler.clone(), BuildConfig::default());
    ws.add_project(project("P"));
    full_build(&ws);

    compiler.reset_log();
    let result = changed(
        &ws,
        "P",
        vec![FileChange::changed("src/p/A.java"), FileChange::changed("src/p/B.java")],
    );

    assert_eq!(result.kind, BuildKind::Incremental);
    assert_eq!(
        compiler.compiled("P"),
        vec!["src/p/A.java", "src/p/B.java", "src/p/Cee.java", "src/p/B.java"]
    );
    assert_eq!(type_names(&result), vec!["p/A", "p/B", "p/Cee"]);
}

#[test]
fn test_added_unit_is_compiled() {
    let (compiler, ws) = deletion_fixture();
    full_build(&ws);

    compiler.set_unit("P", "src/d/Fresh.java", vec![MockType::new("d/Fresh")]);
    let result = changed(&ws, "P", vec![FileChange::added("src/d/Fresh.java")]);
    assert_eq!(type_names(&result), vec!["d/Fresh"]);
    assert!(state(&ws, "P").is_known_package("d"));
}

#[test]
fn test_change_list_unknown_falls_back_to_full() {
    let (_compiler, ws) = deletion_fixture();
    full_build(&ws);

    let job = BuildJob {
        changes: None,
        ..BuildJob::incremental("P", Vec::new())
    };
    let result = run(&ws, vec![job]).remove(0);
    assert_eq!(result.kind, BuildKind::Full);
    assert_eq!(result.next_build_number, 0);
}

fn two_projects() -> (Arc<MockCompiler>, buildstate::BuildWorkspace) {
    let compiler = Arc::new(MockCompiler::new());
    compiler.set_unit("Lib", "src/lib/Api.java", vec![MockType::new("lib/Api")]);
    compiler.set_unit("Lib", "src/lib/Util.java", vec![MockType::new("lib/Util")]);
    compiler.set_unit(
        "App",
        "src/app/Main.java",
        vec![MockType::new("app/Main").qualified_refs(&["lib.Api"])],
    );
    compiler.set_unit(
        "App",
        "src/app/Other.java",
        vec![MockType::new("app/Other").refs(&["Util"])],
    );
    let mut ws = workspace(compiler.clone(), BuildConfig::default());
    ws.add_project(project("Lib"));
    ws.add_project(project("App").with_dependency("Lib"));
    (compiler, ws)
}

#[test]
fn test_structural_change_reaches_dependent_project() {
    let (compiler, ws) = two_projects();
    full_build(&ws);

    compiler.set_unit("Lib", "src/lib/Api.java", vec![MockType::new("lib/Api").structural()]);
    let lib_job = ws.on_changed(
        &ProjectId::new("Lib"),
        vec![FileChange::changed("src/lib/Api.java")],
    );
    let results = run(&ws, ws.with_dependents(vec![lib_job]));

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].project, ProjectId::new("Lib"));
    assert_eq!(type_names(&results[1]), vec!["app/Main"]);

    let lib = state(&ws, "Lib");
    let app = state(&ws, "App");
    assert_eq!(
        app.structural_build_times.get(&ProjectId::new("Lib")).copied(),
        Some(lib.last_structural_build_time)
    );
}

#[test]
fn test_body_change_does_not_reach_dependent_project() {
    let (_compiler, ws) = two_projects();
    full_build(&ws);
    let before = state(&ws, "Lib").last_structural_build_time;

    let lib_job = ws.on_changed(
        &ProjectId::new("Lib"),
        vec![FileChange::changed("src/lib/Api.java")],
    );
    let results = run(&ws, ws.with_dependents(vec![lib_job]));

    assert_eq!(state(&ws, "Lib").last_structural_build_time, before);
    assert_eq!(results[1].kind, BuildKind::Incremental);
    assert!(results[1].rebuilt_types.is_empty());
}

#[test]
fn test_structural_build_time_moves_forward() {
    let (compiler, ws) = two_projects();
    full_build(&ws);
    let first = state(&ws, "Lib").last_structural_build_time;

    compiler.set_unit("Lib", "src/lib/Api.java", vec![MockType::new("lib/Api").structural()]);
    changed(&ws, "Lib", vec![FileChange::changed("src/lib/Api.java")]);
    let second = state(&ws, "Lib").last_structural_build_time;
    changed(&ws, "Lib", vec![FileChange::changed("src/lib/Api.java")]);
    let third = state(&ws, "Lib").last_structural_build_time;

    assert!(first < second);
    assert!(second < third);
}
