//! Workspace-level entry point.
//!
//! A [`BuildWorkspace`] owns the declared projects, their dependency graph
//! and the state store. It turns change notifications into jobs and runs
//! them through the [`BuildScheduler`], publishing each project's new state
//! only once its build has been persisted.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span};

use super::builder::{BuildError, BuildResult, Compiler, DependencyState, ProjectBuilder};
use super::config::BuildConfig;
use super::graph::ProjectGraph;
use super::job::{BuildJob, BuildKind, FileChange, ProjectDescriptor};
use super::scheduler::{BuildPlan, BuildScheduler, JobOutcome, SchedulerError};
use super::state::ProjectState;
use super::state_io::StateError;
use super::store::{DependencyLock, StateStore};
use crate::base::{FxIndexMap, ProjectId};

/// The projects of a workspace, their saved states and the compiler that
/// builds them.
pub struct BuildWorkspace {
    config: BuildConfig,
    store: StateStore,
    graph: ProjectGraph,
    descriptors: FxIndexMap<ProjectId, ProjectDescriptor>,
    compiler: Box<dyn Compiler>,
}

impl BuildWorkspace {
    pub fn new(config: BuildConfig, compiler: impl Compiler + 'static) -> Self {
        let store = StateStore::new(config.state_dir.clone());
        Self {
            config,
            store,
            graph: ProjectGraph::new(),
            descriptors: FxIndexMap::default(),
            compiler: Box::new(compiler),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn graph(&self) -> &ProjectGraph {
        &self.graph
    }

    pub fn descriptor(&self, project: &ProjectId) -> Option<&ProjectDescriptor> {
        self.descriptors.get(project)
    }

    /// Declare a project, or replace its declaration.
    pub fn add_project(&mut self, descriptor: ProjectDescriptor) {
        self.graph
            .add_project(descriptor.id.clone(), descriptor.dependencies.iter().cloned());
        self.descriptors.insert(descriptor.id.clone(), descriptor);
    }

    /// Forget a deleted project along with its saved state.
    pub fn remove_project(&mut self, project: &ProjectId) -> Result<(), StateError> {
        self.graph.remove_project(project);
        self.descriptors.shift_remove(project);
        self.store.discard(project)
    }

    /// Last completed state of a project.
    pub fn state(&self, project: &ProjectId) -> Option<Arc<ProjectState>> {
        self.store.get(project)
    }

    /// Turn a change notification into an incremental job.
    pub fn on_changed(&self, project: &ProjectId, changes: Vec<FileChange>) -> BuildJob {
        BuildJob::incremental(project.clone(), changes)
            .with_dependencies(self.graph.dependencies(project).iter().cloned())
    }

    /// Add an incremental job with no file changes for every project that
    /// depends on a job's project, so dependents pick up structural changes.
    pub fn with_dependents(&self, jobs: Vec<BuildJob>) -> Vec<BuildJob> {
        let mut all: FxIndexMap<ProjectId, BuildJob> = FxIndexMap::default();
        for job in jobs {
            all.insert(job.project.clone(), job);
        }
        let requested: Vec<ProjectId> = all.keys().cloned().collect();
        for project in requested {
            for dependent in self.graph.descendants(&project) {
                all.entry(dependent.clone())
                    .or_insert_with(|| self.on_changed(&dependent, Vec::new()));
            }
        }
        all.into_values().collect()
    }

    /// Build every declared project.
    pub fn build_all(
        &self,
        kind: BuildKind,
        cancel: &CancellationToken,
    ) -> Result<Vec<JobOutcome>, SchedulerError> {
        let jobs = self
            .graph
            .projects()
            .map(|project| match kind {
                BuildKind::Full => BuildJob::full(project.clone()),
                BuildKind::Incremental => BuildJob {
                    changes: None,
                    ..self.on_changed(project, Vec::new())
                },
            })
            .collect();
        self.build(jobs, cancel)
    }

    /// Run `jobs`, in parallel where the project graph allows.
    ///
    /// A cyclic graph or a job for an undeclared project rejects the whole
    /// batch. Otherwise every job yields its own outcome.
    pub fn build(
        &self,
        jobs: Vec<BuildJob>,
        cancel: &CancellationToken,
    ) -> Result<Vec<JobOutcome>, SchedulerError> {
        self.graph.validate()?;
        let jobs = jobs
            .into_iter()
            .map(|job| self.normalize(job))
            .collect::<Result<Vec<_>, _>>()?;
        let plan = BuildPlan::new(&self.graph, jobs)?;
        let scheduler = BuildScheduler::new(self.config.effective_parallel_builds());
        Ok(scheduler.execute(plan, |job| self.run_job(job, cancel)))
    }

    fn normalize(&self, mut job: BuildJob) -> Result<BuildJob, SchedulerError> {
        if !self.descriptors.contains_key(&job.project) {
            return Err(SchedulerError::UnknownProject {
                project: job.project,
                referenced_by: None,
            });
        }
        job.dependencies = self.graph.dependencies(&job.project).to_vec();
        Ok(job)
    }

    /// Build one project under its slot lock and publish the new state.
    fn run_job(
        &self,
        job: &BuildJob,
        cancel: &CancellationToken,
    ) -> Result<BuildResult, BuildError> {
        let span = info_span!("job", project = %job.project);
        let _entered = span.enter();

        let Some(descriptor) = self.descriptors.get(&job.project) else {
            return Err(BuildError::Undeclared(job.project.clone()));
        };

        let mut lock = self.store.acquire_project_lock(&job.project);
        let dependency_locks: Vec<DependencyLock> = job
            .dependencies
            .iter()
            .map(|dependency| self.store.acquire_dependency_lock(dependency))
            .collect();
        debug!(
            "[SCHED] locked {} and {} dependency state(s)",
            job.project,
            dependency_locks.len()
        );

        let dependencies: Vec<DependencyState<'_>> = dependency_locks
            .iter()
            .map(|lock| DependencyState {
                project: lock.project(),
                state: lock.state().map(|state| &**state),
            })
            .collect();
        let previous = lock.current().cloned();

        let builder = ProjectBuilder::new(self.compiler.as_ref(), &self.config, cancel);
        let outcome = builder.build(descriptor, job, previous.as_deref(), &dependencies)?;
        drop(dependencies);
        drop(dependency_locks);

        self.store
            .persist(&outcome.state)
            .map_err(|err| BuildError::persist(&job.project, err))?;
        lock.publish(Arc::new(outcome.state));
        Ok(outcome.result)
    }
}
