//! Workspace fixtures shared by the build tests.

use std::path::Path;
use std::sync::Arc;

use buildstate::project::{JobOutcome, SourceLocation};
use buildstate::{
    BuildConfig, BuildJob, BuildKind, BuildResult, BuildWorkspace, FileChange, ProjectDescriptor,
    ProjectId, ProjectState,
};
use tokio_util::sync::CancellationToken;

use super::mock_compiler::MockCompiler;

/// A project with one source folder `src` and output `bin`.
pub fn project(name: &str) -> ProjectDescriptor {
    ProjectDescriptor::new(name).with_source(SourceLocation::new("src", "bin"))
}

pub fn workspace(compiler: Arc<MockCompiler>, config: BuildConfig) -> BuildWorkspace {
    BuildWorkspace::new(config, compiler)
}

pub fn workspace_in(compiler: Arc<MockCompiler>, state_dir: &Path) -> BuildWorkspace {
    workspace(compiler, BuildConfig::default().with_state_dir(state_dir))
}

/// Run jobs and unwrap every outcome.
pub fn run(workspace: &BuildWorkspace, jobs: Vec<BuildJob>) -> Vec<BuildResult> {
    workspace
        .build(jobs, &CancellationToken::new())
        .unwrap()
        .into_iter()
        .map(|JobOutcome { project, result }| {
            result.unwrap_or_else(|err| panic!("build of {project} failed: {err}"))
        })
        .collect()
}

pub fn full_build(workspace: &BuildWorkspace) -> Vec<BuildResult> {
    let outcomes = workspace
        .build_all(BuildKind::Full, &CancellationToken::new())
        .unwrap();
    outcomes.into_iter().map(|o| o.result.unwrap()).collect()
}

pub fn changed(workspace: &BuildWorkspace, project: &str, changes: Vec<FileChange>) -> BuildResult {
    let job = workspace.on_changed(&ProjectId::new(project), changes);
    run(workspace, vec![job]).remove(0)
}

pub fn state(workspace: &BuildWorkspace, project: &str) -> Arc<ProjectState> {
    workspace.state(&ProjectId::new(project)).unwrap()
}

pub fn type_names(result: &BuildResult) -> Vec<&str> {
    result.rebuilt_types.iter().map(|t| t.as_str()).collect()
}

/// State of a full build of `descriptor` in a fresh workspace over the same
/// compiler, for comparing an incremental result against.
pub fn built_from_scratch(
    compiler: Arc<MockCompiler>,
    descriptor: ProjectDescriptor,
) -> Arc<ProjectState> {
    let project = descriptor.id.clone();
    let mut fresh = workspace(compiler, BuildConfig::default());
    fresh.add_project(descriptor);
    full_build(&fresh);
    fresh.state(&project).unwrap()
}

/// The incremental state matches what a full build computes from the same
/// sources.
pub fn assert_same_as_full_build(incremental: &ProjectState, full: &ProjectState) {
    assert_eq!(incremental.reference_table, full.reference_table);
    assert_eq!(incremental.type_locators, full.type_locators);
}
