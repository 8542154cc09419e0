//! Project dependency graph.
//!
//! Edges point from a project to the projects it is built against. The
//! graph must be acyclic; [`ProjectGraph::validate`] reports the projects
//! caught in a cycle.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use super::scheduler::SchedulerError;
use crate::base::{FxIndexMap, ProjectId};

/// Declared project references of a workspace.
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    /// project -> projects it depends on, in declaration order
    nodes: FxIndexMap<ProjectId, Vec<ProjectId>>,
    /// Reverse index: project -> projects that depend on it
    dependents: FxHashMap<ProjectId, Vec<ProjectId>>,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a project and the projects it references. Declaring a
    /// project again replaces its references.
    pub fn add_project(
        &mut self,
        project: ProjectId,
        dependencies: impl IntoIterator<Item = ProjectId>,
    ) {
        let dependencies: Vec<ProjectId> = dependencies.into_iter().collect();
        if let Some(old) = self.nodes.get(&project) {
            for dependency in old {
                if let Some(list) = self.dependents.get_mut(dependency) {
                    list.retain(|p| p != &project);
                }
            }
        }
        for dependency in &dependencies {
            self.dependents
                .entry(dependency.clone())
                .or_default()
                .push(project.clone());
        }
        self.nodes.insert(project, dependencies);
    }

    /// Remove a deleted project. Projects referencing it keep the
    /// reference and fail validation until they are redeclared.
    pub fn remove_project(&mut self, project: &ProjectId) {
        if let Some(dependencies) = self.nodes.shift_remove(project) {
            for dependency in &dependencies {
                if let Some(list) = self.dependents.get_mut(dependency) {
                    list.retain(|p| p != project);
                }
            }
        }
    }

    pub fn contains(&self, project: &ProjectId) -> bool {
        self.nodes.contains_key(project)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectId> {
        self.nodes.keys()
    }

    pub fn dependencies(&self, project: &ProjectId) -> &[ProjectId] {
        self.nodes.get(project).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn dependents(&self, project: &ProjectId) -> &[ProjectId] {
        self.dependents
            .get(project)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every project `project` transitively depends on.
    pub fn ancestors(&self, project: &ProjectId) -> FxHashSet<ProjectId> {
        self.walk(project, |p| self.dependencies(p))
    }

    /// Every project that transitively depends on `project`.
    pub fn descendants(&self, project: &ProjectId) -> FxHashSet<ProjectId> {
        self.walk(project, |p| self.dependents(p))
    }

    fn walk<'a>(
        &'a self,
        start: &ProjectId,
        next: impl Fn(&ProjectId) -> &'a [ProjectId],
    ) -> FxHashSet<ProjectId> {
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(current) = queue.pop_front() {
            for neighbour in next(&current) {
                if seen.insert(neighbour.clone()) {
                    queue.push_back(neighbour.clone());
                }
            }
        }
        seen
    }

    /// True if one project is an ancestor of the other.
    pub fn are_related(&self, a: &ProjectId, b: &ProjectId) -> bool {
        a == b || self.ancestors(a).contains(b) || self.ancestors(b).contains(a)
    }

    /// Check that every reference names a declared project and that the
    /// graph has no cycle.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        for (project, dependencies) in &self.nodes {
            if let Some(missing) = dependencies.iter().find(|d| !self.nodes.contains_key(*d)) {
                return Err(SchedulerError::UnknownProject {
                    project: missing.clone(),
                    referenced_by: Some(project.clone()),
                });
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Projects ordered so every project comes after its dependencies.
    /// Ties keep declaration order.
    pub fn topological_order(&self) -> Result<Vec<ProjectId>, SchedulerError> {
        let mut in_degree: FxIndexMap<&ProjectId, usize> = self
            .nodes
            .iter()
            .map(|(project, dependencies)| {
                let count = dependencies
                    .iter()
                    .filter(|d| self.nodes.contains_key(*d))
                    .count();
                (project, count)
            })
            .collect();

        let mut queue: VecDeque<&ProjectId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(project, _)| *project)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(project) = queue.pop_front() {
            order.push(project.clone());
            for dependent in self.dependents(project) {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            let cycle: Vec<ProjectId> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(project, _)| project.clone())
                .collect();
            return Err(SchedulerError::Cycle { projects: cycle });
        }
        Ok(order)
    }
}
