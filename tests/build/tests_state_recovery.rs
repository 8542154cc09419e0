use std::path::Path;
use std::sync::Arc;

use buildstate::{BuildKind, FileChange, ProjectId};
use rstest::rstest;

use crate::helpers::fixtures::{changed, full_build, project, workspace_in};
use crate::helpers::mock_compiler::{MockCompiler, MockType};

fn compiler() -> Arc<MockCompiler> {
    let compiler = Arc::new(MockCompiler::new());
    compiler.set_unit("P", "src/p/A.java", vec![MockType::new("p/A")]);
    compiler.set_unit("P", "src/p/B.java", vec![MockType::new("p/B").refs(&["A"])]);
    compiler.set_unit("Q", "src/q/C.java", vec![MockType::new("q/C")]);
    compiler
}

fn keep(_dir: &Path) {}

fn corrupt(dir: &Path) {
    std::fs::write(dir.join("P.state"), b"not a state file").unwrap();
}

fn truncate(dir: &Path) {
    let path = dir.join("P.state");
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
}

fn foreign(dir: &Path) {
    std::fs::copy(dir.join("Q.state"), dir.join("P.state")).unwrap();
}

fn wrong_version(dir: &Path) {
    let path = dir.join("P.state");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = bytes[0].wrapping_add(1);
    std::fs::write(&path, bytes).unwrap();
}

fn empty(dir: &Path) {
    std::fs::write(dir.join("P.state"), b"").unwrap();
}

fn deleted(dir: &Path) {
    std::fs::remove_file(dir.join("P.state")).unwrap();
}

#[rstest]
#[case::intact(keep, BuildKind::Incremental)]
#[case::corrupt(corrupt, BuildKind::Full)]
#[case::truncated(truncate, BuildKind::Full)]
#[case::foreign(foreign, BuildKind::Full)]
#[case::version_mismatch(wrong_version, BuildKind::Full)]
#[case::empty(empty, BuildKind::Full)]
#[case::missing(deleted, BuildKind::Full)]
fn test_saved_state_is_used_only_when_valid(
    #[case] tamper: fn(&Path),
    #[case] expected: BuildKind,
) {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut ws = workspace_in(compiler(), dir.path());
        ws.add_project(project("P"));
        ws.add_project(project("Q"));
        full_build(&ws);
    }
    assert!(dir.path().join("P.state").exists());
    tamper(dir.path());

    let mut ws = workspace_in(compiler(), dir.path());
    ws.add_project(project("P"));
    ws.add_project(project("Q"));
    let result = changed(&ws, "P", vec![FileChange::changed("src/p/A.java")]);
    assert_eq!(result.kind, expected);
}

#[test]
fn test_reloaded_state_matches_saved_state() {
    let dir = tempfile::tempdir().unwrap();
    let saved = {
        let mut ws = workspace_in(compiler(), dir.path());
        ws.add_project(project("P"));
        full_build(&ws);
        ws.state(&ProjectId::new("P")).unwrap()
    };

    let mut ws = workspace_in(compiler(), dir.path());
    ws.add_project(project("P"));
    assert_eq!(ws.state(&ProjectId::new("P")).as_deref(), Some(saved.as_ref()));
}

#[test]
fn test_missing_dependency_state_is_reported_stale() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = workspace_in(compiler(), dir.path());
    ws.add_project(project("Q"));
    ws.add_project(project("P").with_dependency("Q"));

    // Only P is built, so Q has never produced a state
    let job = buildstate::BuildJob::full("P");
    let results = crate::helpers::fixtures::run(&ws, vec![job]);

    assert_eq!(results[0].stale_dependencies, vec![ProjectId::new("Q")]);
    assert_eq!(results[0].problems.len(), 1);
    let p = ws.state(&ProjectId::new("P")).unwrap();
    assert!(!p.structural_build_times.contains_key(&ProjectId::new("Q")));
}
