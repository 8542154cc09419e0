//! Builds one project against its previous state.
//!
//! A full build compiles every unit the compiler discovers into a fresh
//! state. An incremental build starts from a copy of the previous state,
//! drops what was removed, compiles what changed, and then keeps compiling
//! whatever the [`AffectedSetResolver`] reports until a loop produces no
//! new work. When that takes more than `max_compile_loops` loops, the build
//! is thrown away and redone in full.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span};

use super::config::BuildConfig;
use super::job::{BuildJob, BuildKind, ChangeKind, FileChange, ProjectDescriptor};
use super::location::SourceLocation;
use super::state::ProjectState;
use super::state_io::StateError;
use crate::base::{FxIndexMap, FxIndexSet, Locator, ProjectId, Release, TypeName};
use crate::semantic::{
    AffectedSetResolver, Problem, ProblemCollector, ReferenceCollection, ResolverError, categories,
};

// ============================================================================
// COMPILER INTERFACE
// ============================================================================

/// A source unit handed to the compiler.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceUnit {
    pub locator: Locator,
    pub release: Option<Release>,
}

impl SourceUnit {
    pub fn new(locator: impl Into<Locator>) -> Self {
        Self {
            locator: locator.into(),
            release: None,
        }
    }

    pub fn with_release(mut self, release: Release) -> Self {
        self.release = Some(release);
        self
    }
}

/// One type produced by the compiler, with everything the engine needs to
/// know about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledUnit {
    pub type_name: TypeName,
    pub locator: Locator,
    pub release: Option<Release>,
    pub references: ReferenceCollection,
    /// The type's public shape differs from its previous compilation
    pub structural_change: bool,
    pub problems: Vec<Problem>,
}

impl CompiledUnit {
    pub fn new(
        type_name: impl Into<TypeName>,
        locator: impl Into<Locator>,
        references: ReferenceCollection,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            locator: locator.into(),
            release: None,
            references,
            structural_change: false,
            problems: Vec::new(),
        }
    }

    pub fn with_release(mut self, release: Option<Release>) -> Self {
        self.release = release;
        self
    }

    pub fn structural(mut self, changed: bool) -> Self {
        self.structural_change = changed;
        self
    }

    pub fn with_problem(mut self, problem: Problem) -> Self {
        self.problems.push(problem);
        self
    }
}

/// A batch of units to compile.
#[derive(Debug)]
pub struct CompileRequest<'a> {
    pub project: &'a ProjectId,
    pub kind: BuildKind,
    pub units: &'a [SourceUnit],
    /// 1 for the first batch of a build
    pub compile_loop: usize,
}

/// The compiler could not process a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("compiling {project} failed: {message}")]
pub struct CompileError {
    pub project: ProjectId,
    pub message: String,
}

impl CompileError {
    pub fn new(project: &ProjectId, message: impl Into<String>) -> Self {
        Self {
            project: project.clone(),
            message: message.into(),
        }
    }
}

/// The language front end driven by the builder.
pub trait Compiler: Send + Sync {
    /// Every source unit of a project, for a full build.
    fn discover(&self, project: &ProjectDescriptor) -> Result<Vec<SourceUnit>, CompileError>;

    /// Compile a batch of units.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<CompiledUnit>, CompileError>;

    /// Delete generated output of a source folder before a full build.
    fn scrub_output(
        &self,
        project: &ProjectId,
        location: &SourceLocation,
    ) -> Result<(), CompileError> {
        let _ = (project, location);
        Ok(())
    }
}

impl<C: Compiler + ?Sized> Compiler for Arc<C> {
    fn discover(&self, project: &ProjectDescriptor) -> Result<Vec<SourceUnit>, CompileError> {
        (**self).discover(project)
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<CompiledUnit>, CompileError> {
        (**self).compile(request)
    }

    fn scrub_output(
        &self,
        project: &ProjectId,
        location: &SourceLocation,
    ) -> Result<(), CompileError> {
        (**self).scrub_output(project, location)
    }
}

// ============================================================================
// BUILD RESULT
// ============================================================================

/// What a project build did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildResult {
    pub project: ProjectId,
    /// Kind of build actually performed
    pub kind: BuildKind,
    pub rebuilt_types: Vec<TypeName>,
    pub problems: Vec<Problem>,
    pub next_build_number: i32,
    /// Dependencies that had no usable state
    pub stale_dependencies: Vec<ProjectId>,
}

/// A finished build: the result and the state to publish.
#[derive(Debug)]
pub struct BuildOutcome {
    pub state: ProjectState,
    pub result: BuildResult,
}

/// Errors that fail a project build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("could not save the state of {project}: {source}")]
    Persist {
        project: ProjectId,
        #[source]
        source: StateError,
    },

    #[error("project {0} is not declared in the workspace")]
    Undeclared(ProjectId),

    #[error("build of {0} panicked")]
    Panicked(ProjectId),
}

impl BuildError {
    /// Create a persistence error.
    pub fn persist(project: &ProjectId, source: StateError) -> Self {
        Self::Persist {
            project: project.clone(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BuildError::Resolver(ResolverError::Cancelled))
    }
}

/// A dependency's last completed state as seen by a dependent's build.
#[derive(Clone, Copy, Debug)]
pub struct DependencyState<'a> {
    pub project: &'a ProjectId,
    pub state: Option<&'a ProjectState>,
}

// ============================================================================
// PROJECT BUILDER
// ============================================================================

/// Runs full and incremental builds of single projects.
pub struct ProjectBuilder<'a> {
    compiler: &'a dyn Compiler,
    config: &'a BuildConfig,
    cancel: &'a CancellationToken,
}

impl<'a> ProjectBuilder<'a> {
    pub fn new(
        compiler: &'a dyn Compiler,
        config: &'a BuildConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            compiler,
            config,
            cancel,
        }
    }

    /// Build a project.
    ///
    /// `previous` is the project's last completed state. An incremental
    /// job falls back to a full build when there is no usable previous
    /// state, no change list, a changed classpath, or too many compile
    /// loops.
    pub fn build(
        &self,
        descriptor: &ProjectDescriptor,
        job: &BuildJob,
        previous: Option<&ProjectState>,
        dependencies: &[DependencyState<'_>],
    ) -> Result<BuildOutcome, BuildError> {
        let span = info_span!("build", project = %descriptor.id);
        let _entered = span.enter();

        let stale: Vec<ProjectId> = dependencies
            .iter()
            .filter(|dependency| dependency.state.is_none())
            .map(|dependency| dependency.project.clone())
            .collect();

        if descriptor.source_locations.is_empty() {
            info!("[BUILD] {} has no source folders, nothing to build", descriptor.id);
            let pass = BuildPass::new(ProjectState::noop(descriptor.id.clone()), false, 0);
            return Ok(self.finish(descriptor, pass, BuildKind::Full, dependencies, stale));
        }

        if let Some((previous, changes)) = incremental_base(descriptor, job, previous) {
            let pass = self.build_incremental(descriptor, previous, changes, dependencies)?;
            if let Some(pass) = pass {
                let kind = BuildKind::Incremental;
                return Ok(self.finish(descriptor, pass, kind, dependencies, stale));
            }
            info!(
                "[BUILD] {} needed more than {} compile loops, rebuilding in full",
                descriptor.id, self.config.max_compile_loops
            );
        } else if job.kind == BuildKind::Incremental {
            debug!("[BUILD] {} has no usable previous state, building in full", descriptor.id);
        }

        let pass = self.build_full(descriptor, previous)?;
        Ok(self.finish(descriptor, pass, BuildKind::Full, dependencies, stale))
    }

    fn check_cancelled(&self) -> Result<(), BuildError> {
        if self.cancel.is_cancelled() {
            return Err(ResolverError::Cancelled.into());
        }
        Ok(())
    }

    fn build_full(
        &self,
        descriptor: &ProjectDescriptor,
        previous: Option<&ProjectState>,
    ) -> Result<BuildPass, BuildError> {
        let state = ProjectState::new(
            descriptor.id.clone(),
            descriptor.source_locations.clone(),
            descriptor.binary_locations.clone(),
        );
        let mut pass = BuildPass::new(state, false, self.config.max_structurally_changed_types);
        pass.state.stamp_full_build(previous);

        for location in &descriptor.source_locations {
            let had_output =
                previous.is_some_and(|p| !p.is_source_folder_empty(&location.source_folder));
            if had_output {
                debug!("[BUILD] scrubbing output of {}", location.source_folder);
                self.compiler.scrub_output(&descriptor.id, location)?;
            }
        }

        self.check_cancelled()?;
        let units = self.compiler.discover(descriptor)?;
        info!("[BUILD] full build of {}: {} unit(s)", descriptor.id, units.len());
        let compiled = self.compiler.compile(&CompileRequest {
            project: &descriptor.id,
            kind: BuildKind::Full,
            units: &units,
            compile_loop: 1,
        })?;
        for unit in compiled {
            pass.record_unit(unit);
        }
        Ok(pass)
    }

    /// Returns `None` when the compile loop limit is exceeded.
    fn build_incremental(
        &self,
        descriptor: &ProjectDescriptor,
        previous: &ProjectState,
        changes: &[FileChange],
        dependencies: &[DependencyState<'_>],
    ) -> Result<Option<BuildPass>, BuildError> {
        let mut pass = BuildPass::new(
            previous.copy_for_next_build(),
            true,
            self.config.max_structurally_changed_types,
        );
        let mut batch: FxIndexMap<Locator, SourceUnit> = FxIndexMap::default();

        for change in changes {
            match change.kind {
                ChangeKind::Removed => {
                    let is_folder = pass
                        .state
                        .type_locators
                        .types_defined_by(&change.path)
                        .is_empty();
                    let removed = if is_folder {
                        pass.state.remove_folder(change.path.as_str())
                    } else {
                        pass.state.remove_locator(&change.path)
                    };
                    debug!("[BUILD] {} removed {} type(s)", change.path, removed.len());
                    pass.remove_types(removed);
                }
                ChangeKind::Added | ChangeKind::Changed => {
                    let unit = source_unit(&pass.state, &change.path);
                    batch.insert(change.path.clone(), unit);
                }
            }
        }

        for dependency in dependencies {
            let Some(state) = dependency.state else {
                continue;
            };
            if !previous.was_structurally_changed(dependency.project, Some(state)) {
                continue;
            }
            match previous.structurally_changed_types_of(state) {
                Some(changed) => {
                    debug!(
                        "[BUILD] dependency {} changed {} type(s)",
                        dependency.project,
                        changed.len()
                    );
                    for name in changed {
                        pass.resolver.seed_changed(name);
                    }
                }
                None => {
                    debug!(
                        "[BUILD] dependency {} changed, checking all its types",
                        dependency.project
                    );
                    for name in state.type_locators.type_names() {
                        pass.resolver.seed_changed(name);
                    }
                }
            }
        }

        let affected = pass.resolver.propagate(&pass.state.reference_table, self.cancel)?;
        add_units_for(&mut batch, &pass.state, &affected);

        let mut compile_loop = 0;
        while !batch.is_empty() {
            compile_loop += 1;
            if compile_loop > self.config.max_compile_loops {
                return Ok(None);
            }
            self.check_cancelled()?;

            let units: Vec<SourceUnit> = std::mem::take(&mut batch).into_values().collect();
            let before: Vec<(&Locator, Vec<TypeName>)> = units
                .iter()
                .map(|unit| {
                    let defined = pass.state.type_locators.types_defined_by(&unit.locator);
                    (&unit.locator, defined)
                })
                .collect();
            debug!("[BUILD] compile loop {}: {} unit(s)", compile_loop, units.len());
            pass.resolver.begin_loop();

            let compiled = self.compiler.compile(&CompileRequest {
                project: &descriptor.id,
                kind: BuildKind::Incremental,
                units: &units,
                compile_loop,
            })?;

            // Types a unit used to define but no longer produces
            let produced: FxHashSet<(&Locator, &TypeName)> = compiled
                .iter()
                .map(|unit| (&unit.locator, &unit.type_name))
                .collect();
            let vanished: Vec<(&Locator, TypeName)> = before
                .into_iter()
                .flat_map(|(locator, names)| names.into_iter().map(move |name| (locator, name)))
                .filter(|(locator, name)| !produced.contains(&(*locator, name)))
                .collect();
            for (locator, name) in vanished {
                let removed = pass.state.remove_type_from(&name, locator);
                pass.remove_types(removed);
            }

            for unit in compiled {
                pass.record_unit(unit);
            }

            let affected = pass.resolver.propagate(&pass.state.reference_table, self.cancel)?;
            add_units_for(&mut batch, &pass.state, &affected);
        }
        Ok(Some(pass))
    }

    fn finish(
        &self,
        descriptor: &ProjectDescriptor,
        mut pass: BuildPass,
        kind: BuildKind,
        dependencies: &[DependencyState<'_>],
        stale: Vec<ProjectId>,
    ) -> BuildOutcome {
        for dependency in dependencies {
            pass.state.observe_dependency(dependency.project, dependency.state);
        }
        for project in &stale {
            pass.problems.add(Problem::warning(
                descriptor.id.as_str(),
                categories::STALE_DEPENDENCY,
                format!("no build state available for dependency {project}"),
            ));
        }
        let resolver_problems = pass.resolver.take_problems();
        pass.problems.extend(resolver_problems);

        let result = BuildResult {
            project: descriptor.id.clone(),
            kind,
            rebuilt_types: pass.rebuilt.into_iter().collect(),
            problems: pass.problems.take_sorted(),
            next_build_number: pass.state.build_number,
            stale_dependencies: stale,
        };
        info!(
            "[BUILD] {} {} build #{}: {} type(s) rebuilt, {} problem(s)",
            descriptor.id,
            kind,
            result.next_build_number,
            result.rebuilt_types.len(),
            result.problems.len()
        );
        BuildOutcome {
            state: pass.state,
            result,
        }
    }
}

/// The previous state and change list, if an incremental build is possible.
fn incremental_base<'s>(
    descriptor: &ProjectDescriptor,
    job: &'s BuildJob,
    previous: Option<&'s ProjectState>,
) -> Option<(&'s ProjectState, &'s [FileChange])> {
    if job.kind != BuildKind::Incremental {
        return None;
    }
    let previous = previous.filter(|state| !state.is_noop())?;
    let changes = job.changes.as_deref()?;
    if previous.source_locations != descriptor.source_locations
        || previous.binary_locations != descriptor.binary_locations
    {
        debug!("[BUILD] classpath of {} changed", descriptor.id);
        return None;
    }
    Some((previous, changes))
}

fn source_unit(state: &ProjectState, locator: &Locator) -> SourceUnit {
    SourceUnit {
        locator: locator.clone(),
        release: state
            .source_location_of(locator)
            .and_then(|location| location.release),
    }
}

/// Queue the units defining `types`, every release included.
fn add_units_for(
    batch: &mut FxIndexMap<Locator, SourceUnit>,
    state: &ProjectState,
    types: &[TypeName],
) {
    for name in types {
        if let Some(locator) = state.type_locators.locator_for(name, None) {
            batch
                .entry(locator.clone())
                .or_insert_with(|| source_unit(state, locator));
        }
        if let Some(per_release) = state.type_locators.release_map().get(name) {
            for (release, locator) in per_release {
                batch.entry(locator.clone()).or_insert_with(|| SourceUnit {
                    locator: locator.clone(),
                    release: Some(*release),
                });
            }
        }
    }
}

/// Mutable pieces of one build.
struct BuildPass {
    state: ProjectState,
    resolver: AffectedSetResolver,
    problems: ProblemCollector,
    rebuilt: FxIndexSet<TypeName>,
    incremental: bool,
    tagged: bool,
    max_changed_types: usize,
}

impl BuildPass {
    fn new(state: ProjectState, incremental: bool, max_changed_types: usize) -> Self {
        Self {
            state,
            resolver: AffectedSetResolver::new(),
            problems: ProblemCollector::new(),
            rebuilt: FxIndexSet::default(),
            incremental,
            tagged: false,
            max_changed_types,
        }
    }

    fn record_unit(&mut self, unit: CompiledUnit) {
        let CompiledUnit {
            type_name,
            locator,
            release,
            references,
            structural_change,
            problems,
        } = unit;
        self.problems.extend(problems);

        if self
            .resolver
            .check_duplicate(&self.state.type_locators, &type_name, &locator, release)
        {
            return;
        }

        if self.incremental {
            let is_new = !self.state.is_known_type(&type_name);
            if is_new {
                self.resolver.seed_added(&self.state.type_locators, &type_name);
            }
            if is_new || structural_change {
                self.note_structural_change(&type_name);
            }
        }
        self.resolver.report_structural_change(&type_name, structural_change);
        self.resolver.mark_compiled(type_name.clone());
        self.state.record(type_name.clone(), locator, release, references);
        self.rebuilt.insert(type_name);
    }

    fn remove_types(&mut self, names: Vec<TypeName>) {
        for name in names {
            self.resolver.seed_deleted(&name);
            self.note_structural_change(&name);
        }
    }

    fn note_structural_change(&mut self, name: &TypeName) {
        if !self.tagged {
            self.state.tag_as_structurally_changed();
            self.tagged = true;
        }
        self.state.record_structural_change(name, self.max_changed_types);
    }
}
