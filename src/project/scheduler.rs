//! Parallel execution of project builds.
//!
//! A [`BuildPlan`] orders the requested jobs by the project graph. A job is
//! ready once none of its ancestors in the plan is pending or running, so
//! two builds only ever overlap when neither project depends on the other.
//! Workers block on a condition variable until a job becomes ready or the
//! plan is drained.
//!
//! A failed job does not stop the plan. Its dependents still build against
//! the dependency's last completed state.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::builder::{BuildError, BuildResult};
use super::graph::ProjectGraph;
use super::job::{BuildJob, BuildKind};
use crate::base::{FxIndexMap, ProjectId};

/// Errors that reject a whole set of jobs before any of them runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("project dependency cycle between {}", join(.projects))]
    Cycle { projects: Vec<ProjectId> },

    #[error("unknown project {project}{}", referenced_by_suffix(.referenced_by))]
    UnknownProject {
        project: ProjectId,
        referenced_by: Option<ProjectId>,
    },
}

fn join(projects: &[ProjectId]) -> String {
    projects
        .iter()
        .map(ProjectId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn referenced_by_suffix(referenced_by: &Option<ProjectId>) -> String {
    referenced_by
        .as_ref()
        .map(|project| format!(" (referenced by {project})"))
        .unwrap_or_default()
}

/// Result of one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub project: ProjectId,
    pub result: Result<BuildResult, BuildError>,
}

// ============================================================================
// BUILD PLAN
// ============================================================================

/// Jobs to run and the projects each one waits for.
#[derive(Debug, Default)]
pub struct BuildPlan {
    /// Not yet started, in topological order
    pending: FxIndexMap<ProjectId, BuildJob>,
    running: FxHashSet<ProjectId>,
    /// project -> its ancestors that are part of this plan
    blockers: FxHashMap<ProjectId, FxHashSet<ProjectId>>,
    /// Topological position, used to order results
    position: FxHashMap<ProjectId, usize>,
    finished: Vec<JobOutcome>,
}

impl BuildPlan {
    /// Plan `jobs` over `graph`. Jobs for the same project are merged: a
    /// full job wins over an incremental one and change lists are joined.
    pub fn new(graph: &ProjectGraph, jobs: Vec<BuildJob>) -> Result<Self, SchedulerError> {
        let order = graph.topological_order()?;

        let mut merged: FxHashMap<ProjectId, BuildJob> = FxHashMap::default();
        for job in jobs {
            if !graph.contains(&job.project) {
                return Err(SchedulerError::UnknownProject {
                    project: job.project,
                    referenced_by: None,
                });
            }
            match merged.remove(&job.project) {
                Some(existing) => {
                    let project = job.project.clone();
                    merged.insert(project, merge_jobs(existing, job));
                }
                None => {
                    merged.insert(job.project.clone(), job);
                }
            }
        }

        let mut plan = Self::default();
        for project in order {
            if let Some(job) = merged.remove(&project) {
                plan.position.insert(project.clone(), plan.pending.len());
                plan.pending.insert(project, job);
            }
        }
        for project in plan.pending.keys() {
            let blockers: FxHashSet<ProjectId> = graph
                .ancestors(project)
                .into_iter()
                .filter(|ancestor| plan.pending.contains_key(ancestor))
                .collect();
            plan.blockers.insert(project.clone(), blockers);
        }
        Ok(plan)
    }

    /// Number of jobs not yet finished.
    pub fn len(&self) -> usize {
        self.pending.len() + self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Projects of the pending jobs, in the order they were planned.
    pub fn pending(&self) -> impl Iterator<Item = &ProjectId> {
        self.pending.keys()
    }

    fn is_ready(&self, project: &ProjectId) -> bool {
        self.blockers.get(project).is_none_or(|blockers| {
            blockers
                .iter()
                .all(|b| !self.running.contains(b) && !self.pending.contains_key(b))
        })
    }

    /// Start the first ready job, if any.
    pub fn take_next(&mut self) -> Option<BuildJob> {
        let index = self
            .pending
            .keys()
            .position(|project| self.is_ready(project))?;
        let (project, job) = self.pending.shift_remove_index(index)?;
        self.running.insert(project);
        Some(job)
    }

    /// Record a finished job.
    pub fn complete(&mut self, project: ProjectId, result: Result<BuildResult, BuildError>) {
        self.running.remove(&project);
        self.finished.push(JobOutcome { project, result });
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.running.is_empty()
    }

    /// Outcomes in plan order.
    fn into_outcomes(mut self) -> Vec<JobOutcome> {
        let position = self.position;
        self.finished
            .sort_by_key(|outcome| position.get(&outcome.project).copied().unwrap_or(usize::MAX));
        self.finished
    }
}

fn merge_jobs(first: BuildJob, second: BuildJob) -> BuildJob {
    let kind = if first.kind == BuildKind::Full || second.kind == BuildKind::Full {
        BuildKind::Full
    } else {
        BuildKind::Incremental
    };
    let changes = match (first.changes, second.changes) {
        (Some(mut a), Some(b)) => {
            a.extend(b);
            Some(a)
        }
        _ => None,
    };
    BuildJob {
        project: first.project,
        kind,
        changes,
        dependencies: first.dependencies,
    }
}

// ============================================================================
// EXECUTION
// ============================================================================

struct SharedPlan {
    plan: Mutex<BuildPlan>,
    ready: Condvar,
}

/// Runs a [`BuildPlan`] on a fixed number of worker threads.
#[derive(Debug, Clone, Copy)]
pub struct BuildScheduler {
    workers: usize,
}

impl BuildScheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job of `plan` with `run`, returning one outcome per job in
    /// plan order.
    pub fn execute<F>(&self, plan: BuildPlan, run: F) -> Vec<JobOutcome>
    where
        F: Fn(&BuildJob) -> Result<BuildResult, BuildError> + Sync,
    {
        let workers = self.workers.min(plan.len()).max(1);
        info!("[SCHED] {} job(s) on {} worker(s)", plan.len(), workers);

        let shared = SharedPlan {
            plan: Mutex::new(plan),
            ready: Condvar::new(),
        };
        let started = Instant::now();

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| worker_loop(&shared, &run));
            }
        });

        let outcomes = shared.plan.into_inner().into_outcomes();
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            "[SCHED] finished {} job(s), {} failed, in {} ms",
            outcomes.len(),
            failed,
            started.elapsed().as_millis()
        );
        outcomes
    }
}

fn worker_loop<F>(shared: &SharedPlan, run: &F)
where
    F: Fn(&BuildJob) -> Result<BuildResult, BuildError> + Sync,
{
    loop {
        let job = {
            let mut plan = shared.plan.lock();
            loop {
                if let Some(job) = plan.take_next() {
                    break Some(job);
                }
                if plan.is_complete() {
                    break None;
                }
                shared.ready.wait(&mut plan);
            }
        };
        let Some(job) = job else {
            break;
        };

        debug!("[SCHED] starting {} ({})", job.project, job.kind);
        // Every taken job must be completed, panics included
        let result = catch_unwind(AssertUnwindSafe(|| run(&job)))
            .unwrap_or_else(|_| Err(BuildError::Panicked(job.project.clone())));
        match &result {
            Ok(built) => debug!(
                "[SCHED] finished {} ({} types rebuilt)",
                job.project,
                built.rebuilt_types.len()
            ),
            Err(err) => warn!("[SCHED] {} failed: {}", job.project, err),
        }

        let mut plan = shared.plan.lock();
        plan.complete(job.project, result);
        shared.ready.notify_all();
    }
}
