use std::sync::Arc;

use buildstate::project::{ClasspathLocation, SourceLocation, read_state, write_state};
use buildstate::semantic::categories;
use buildstate::{
    BuildConfig, BuildWorkspace, FileChange, ProjectDescriptor, ProjectId, Release, TypeName,
};

use crate::helpers::fixtures::{
    assert_same_as_full_build, built_from_scratch, changed, full_build, state, type_names,
    workspace,
};
use crate::helpers::mock_compiler::{MockCompiler, MockType};

fn multi_release_project() -> ProjectDescriptor {
    ProjectDescriptor::new("M")
        .with_source(SourceLocation::new("src8", "bin8").with_release(Release(8)))
        .with_source(SourceLocation::new("src9", "bin9").with_release(Release(9)))
        .with_binary(ClasspathLocation::Jar {
            path: "lib/gen.jar".into(),
            last_modified: 1_700_000_000_000,
            release: Some(Release(8)),
            annotation_path: Some("annotations/gen".into()),
            on_module_path: false,
        })
}

fn build_with(units: &[(&str, u32)]) -> (Arc<MockCompiler>, BuildWorkspace) {
    let compiler = Arc::new(MockCompiler::new());
    for (locator, release) in units {
        compiler.set_unit("M", locator, vec![MockType::new("pgen/CGen").release(*release)]);
    }
    compiler.set_unit(
        "M",
        "src9/use/User.java",
        vec![MockType::new("use/User").refs(&["CGen"]).release(9)],
    );
    let mut ws = workspace(compiler.clone(), BuildConfig::default());
    ws.add_project(multi_release_project());
    (compiler, ws)
}

#[test]
fn test_same_type_in_different_releases_is_not_a_duplicate() {
    let (_compiler, ws) = build_with(&[("src8/pgen/CGen.java", 8), ("src9/pgen/CGen.java", 9)]);
    let results = full_build(&ws);
    assert!(results[0].problems.is_empty(), "{:?}", results[0].problems);

    let m = state(&ws, "M");
    let name = TypeName::new("pgen/CGen");
    assert_eq!(
        m.type_locators.locator_for(&name, Some(Release(8))).map(|l| l.as_str()),
        Some("src8/pgen/CGen.java")
    );
    assert_eq!(
        m.type_locators.locator_for(&name, Some(Release(9))).map(|l| l.as_str()),
        Some("src9/pgen/CGen.java")
    );

    let reread = read_state(&write_state(&m).unwrap(), Some(&ProjectId::new("M"))).unwrap();
    assert_eq!(&reread, m.as_ref());
}

#[test]
fn test_same_type_twice_in_one_release_is_a_duplicate() {
    let (_compiler, ws) = build_with(&[("src8/pgen/CGen.java", 8), ("src8/pgen/Copy.java", 8)]);
    let results = full_build(&ws);

    let problems = &results[0].problems;
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].category_id(), categories::DUPLICATE_TYPE);
    assert!(problems[0].is_error());
    assert_eq!(problems[0].path(), "src8/pgen/Copy.java");
}

#[test]
fn test_structural_change_recompiles_every_release_of_dependents() {
    let (compiler, ws) = build_with(&[("src8/pgen/CGen.java", 8), ("src9/pgen/CGen.java", 9)]);
    full_build(&ws);

    compiler.set_unit(
        "M",
        "src9/pgen/CGen.java",
        vec![MockType::new("pgen/CGen").release(9).structural()],
    );
    compiler.reset_log();
    let result = changed(&ws, "M", vec![FileChange::changed("src9/pgen/CGen.java")]);

    assert!(result.problems.is_empty());
    assert_eq!(type_names(&result), vec!["pgen/CGen", "use/User"]);
    assert_eq!(
        compiler.compiled("M"),
        vec!["src9/pgen/CGen.java", "src9/use/User.java"]
    );
}

/// `pgen/CGen` in both releases; only the release 8 variant references
/// `dep/Dep`.
fn diverging_releases() -> (Arc<MockCompiler>, BuildWorkspace) {
    let compiler = Arc::new(MockCompiler::new());
    compiler.set_unit("M", "src8/dep/Dep.java", vec![MockType::new("dep/Dep").release(8)]);
    compiler.set_unit(
        "M",
        "src8/pgen/CGen.java",
        vec![MockType::new("pgen/CGen").refs(&["Dep"]).release(8)],
    );
    compiler.set_unit("M", "src9/pgen/CGen.java", vec![MockType::new("pgen/CGen").release(9)]);
    let mut ws = workspace(compiler.clone(), BuildConfig::default());
    ws.add_project(multi_release_project());
    full_build(&ws);
    (compiler, ws)
}

#[test]
fn test_dependent_in_one_release_is_recompiled() {
    let (compiler, ws) = diverging_releases();

    compiler.set_unit(
        "M",
        "src8/dep/Dep.java",
        vec![MockType::new("dep/Dep").release(8).structural()],
    );
    compiler.reset_log();
    changed(&ws, "M", vec![FileChange::changed("src8/dep/Dep.java")]);

    let compiled = compiler.compiled("M");
    assert_eq!(compiled[0], "src8/dep/Dep.java");
    assert!(compiled.contains(&"src8/pgen/CGen.java".to_string()), "{compiled:?}");
}

#[test]
fn test_unit_dropping_a_type_keeps_other_release() {
    let (compiler, ws) = diverging_releases();

    compiler.set_unit("M", "src9/pgen/CGen.java", Vec::new());
    changed(&ws, "M", vec![FileChange::changed("src9/pgen/CGen.java")]);

    let m = state(&ws, "M");
    let name = TypeName::new("pgen/CGen");
    assert_eq!(
        m.type_locators.locator_for(&name, Some(Release(8))).map(|l| l.as_str()),
        Some("src8/pgen/CGen.java")
    );
    assert!(m.type_locators.locator_for(&name, Some(Release(9))).is_none());
    let facts = m.reference_table.get(&name).unwrap();
    assert!(facts.get(Some(Release(8))).is_some());
    assert!(facts.get(Some(Release(9))).is_none());
    assert_same_as_full_build(&m, &built_from_scratch(compiler, multi_release_project()));
}

#[test]
fn test_removing_one_release_keeps_the_other() {
    let (compiler, ws) = diverging_releases();

    compiler.remove_unit("M", "src9/pgen/CGen.java");
    changed(&ws, "M", vec![FileChange::removed("src9/pgen/CGen.java")]);

    let m = state(&ws, "M");
    let name = TypeName::new("pgen/CGen");
    assert!(m.is_known_type(&name));
    assert!(
        m.reference_table
            .get(&name)
            .and_then(|facts| facts.get(Some(Release(8))))
            .is_some()
    );
    assert_same_as_full_build(&m, &built_from_scratch(compiler.clone(), multi_release_project()));

    // Facts kept for release 8 still find it affected
    compiler.set_unit(
        "M",
        "src8/dep/Dep.java",
        vec![MockType::new("dep/Dep").release(8).structural()],
    );
    compiler.reset_log();
    changed(&ws, "M", vec![FileChange::changed("src8/dep/Dep.java")]);
    assert_eq!(
        compiler.compiled("M"),
        vec!["src8/dep/Dep.java", "src8/pgen/CGen.java"]
    );
}
