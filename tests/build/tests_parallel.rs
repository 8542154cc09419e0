use std::sync::Arc;
use std::time::Duration;

use buildstate::BuildConfig;
use rstest::rstest;

use crate::helpers::fixtures::{full_build, project, workspace};
use crate::helpers::mock_compiler::{MockCompiler, MockType};

fn compiler_for(projects: &[&str], delay: Duration) -> Arc<MockCompiler> {
    let compiler = MockCompiler::new().with_delay(delay);
    for name in projects {
        let locator = format!("src/{}/Main.java", name.to_lowercase());
        let type_name = format!("{}/Main", name.to_lowercase());
        compiler.set_unit(name, &locator, vec![MockType::new(&type_name)]);
    }
    Arc::new(compiler)
}

#[rstest]
#[case::two_workers(2, true)]
#[case::one_worker(1, false)]
fn test_independent_builds_overlap_with_enough_workers(
    #[case] workers: usize,
    #[case] overlap: bool,
) {
    let compiler = compiler_for(&["Left", "Right"], Duration::from_millis(1000));
    let mut ws = workspace(
        compiler.clone(),
        BuildConfig::default().with_max_parallel_builds(workers),
    );
    ws.add_project(project("Left"));
    ws.add_project(project("Right"));

    full_build(&ws);

    let left = compiler.timing_of("Left").unwrap();
    let right = compiler.timing_of("Right").unwrap();
    assert_eq!(left.overlaps(&right), overlap);
}

#[test]
fn test_dependent_builds_never_overlap() {
    let compiler = compiler_for(&["Base", "Mid", "Top", "Side"], Duration::from_millis(200));
    let mut ws = workspace(compiler.clone(), BuildConfig::default().with_max_parallel_builds(4));
    ws.add_project(project("Base"));
    ws.add_project(project("Mid").with_dependency("Base"));
    ws.add_project(project("Top").with_dependency("Mid").with_dependency("Base"));
    ws.add_project(project("Side"));

    let results = full_build(&ws);
    assert_eq!(results.len(), 4);

    let base = compiler.timing_of("Base").unwrap();
    let mid = compiler.timing_of("Mid").unwrap();
    let top = compiler.timing_of("Top").unwrap();
    let side = compiler.timing_of("Side").unwrap();
    assert!(base.end <= mid.start);
    assert!(mid.end <= top.start);
    assert!(!base.overlaps(&top));
    assert!(side.overlaps(&base));
}
