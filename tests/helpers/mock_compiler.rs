//! A scripted compiler: each project has a table of units, and each unit
//! produces a fixed list of types.

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use buildstate::project::{CompileError, CompileRequest, CompiledUnit, Compiler, SourceUnit};
use buildstate::{Locator, ProjectDescriptor, ProjectId, ReferenceCollection, Release};
use parking_lot::Mutex;

/// One type a unit produces.
#[derive(Clone, Debug)]
pub struct MockType {
    pub type_name: String,
    pub release: Option<Release>,
    pub simple: Vec<String>,
    pub qualified: Vec<String>,
    pub structural: bool,
}

impl MockType {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            release: None,
            simple: Vec::new(),
            qualified: Vec::new(),
            structural: false,
        }
    }

    pub fn refs(mut self, simple: &[&str]) -> Self {
        self.simple.extend(simple.iter().map(|s| s.to_string()));
        self
    }

    pub fn qualified_refs(mut self, qualified: &[&str]) -> Self {
        self.qualified.extend(qualified.iter().map(|s| s.to_string()));
        self
    }

    pub fn release(mut self, release: u32) -> Self {
        self.release = Some(Release(release));
        self
    }

    pub fn structural(mut self) -> Self {
        self.structural = true;
        self
    }

    fn compile(&self, locator: &Locator, unit_release: Option<Release>) -> CompiledUnit {
        let references = ReferenceCollection::from_names(
            self.simple.iter().map(String::as_str),
            self.qualified.iter().map(String::as_str),
        );
        CompiledUnit::new(self.type_name.as_str(), locator.clone(), references)
            .with_release(self.release.or(unit_release))
            .structural(self.structural)
    }
}

/// Start and end of one compile call.
#[derive(Clone, Debug)]
pub struct CompileTiming {
    pub project: ProjectId,
    pub start: Instant,
    pub end: Instant,
}

impl CompileTiming {
    pub fn overlaps(&self, other: &CompileTiming) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Default)]
pub struct MockCompiler {
    units: Mutex<BTreeMap<String, BTreeMap<String, Vec<MockType>>>>,
    delay: Duration,
    timings: Mutex<Vec<CompileTiming>>,
    compiled: Mutex<Vec<(ProjectId, Locator)>>,
}

impl MockCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every compile call sleeps for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_unit(&self, project: &str, locator: &str, types: Vec<MockType>) {
        self.units
            .lock()
            .entry(project.to_string())
            .or_default()
            .insert(locator.to_string(), types);
    }

    pub fn remove_unit(&self, project: &str, locator: &str) {
        if let Some(units) = self.units.lock().get_mut(project) {
            units.remove(locator);
        }
    }

    pub fn timings(&self) -> Vec<CompileTiming> {
        self.timings.lock().clone()
    }

    pub fn timing_of(&self, project: &str) -> Option<CompileTiming> {
        self.timings
            .lock()
            .iter()
            .find(|t| t.project.as_str() == project)
            .cloned()
    }

    /// Locators compiled for `project` since the last [`Self::reset_log`].
    pub fn compiled(&self, project: &str) -> Vec<String> {
        self.compiled
            .lock()
            .iter()
            .filter(|(p, _)| p.as_str() == project)
            .map(|(_, l)| l.as_str().to_string())
            .collect()
    }

    pub fn reset_log(&self) {
        self.timings.lock().clear();
        self.compiled.lock().clear();
    }
}

impl Compiler for MockCompiler {
    fn discover(&self, project: &ProjectDescriptor) -> Result<Vec<SourceUnit>, CompileError> {
        let units = self.units.lock();
        Ok(units
            .get(project.id.as_str())
            .map(|units| {
                units
                    .iter()
                    .map(|(locator, types)| SourceUnit {
                        locator: Locator::new(locator),
                        release: types.first().and_then(|t| t.release),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<CompiledUnit>, CompileError> {
        let start = Instant::now();
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let units = self.units.lock();
        let table = units.get(request.project.as_str());
        let mut compiled = Vec::new();
        for unit in request.units {
            self.compiled
                .lock()
                .push((request.project.clone(), unit.locator.clone()));
            if let Some(types) = table.and_then(|t| t.get(unit.locator.as_str())) {
                compiled.extend(types.iter().map(|ty| ty.compile(&unit.locator, unit.release)));
            }
        }
        drop(units);
        self.timings.lock().push(CompileTiming {
            project: request.project.clone(),
            start,
            end: Instant::now(),
        });
        Ok(compiled)
    }
}
