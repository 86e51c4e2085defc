//! Create-once registry of compilation units.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use indexmap::IndexSet;
use medley_config::Role;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::error::DevError;
use super::resolver::ProjectIdentity;
use super::unit::{CompilationUnit, UnitKey};

/// Site projects and SSR projects live under different roots, so the same
/// identity can name one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectClass {
    Site,
    Ssr,
}

impl ProjectClass {
    pub fn of(role: Role) -> Self {
        match role {
            Role::Site => ProjectClass::Site,
            Role::Client | Role::Server => ProjectClass::Ssr,
        }
    }

    pub fn roles(self) -> &'static [Role] {
        match self {
            ProjectClass::Site => &[Role::Site],
            ProjectClass::Ssr => &[Role::Client, Role::Server],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectClass::Site => "site",
            ProjectClass::Ssr => "ssr",
        }
    }

    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "site" => Some(ProjectClass::Site),
            "ssr" => Some(ProjectClass::Ssr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectKey {
    pub class: ProjectClass,
    pub project: ProjectIdentity,
}

impl ProjectKey {
    pub fn new(class: ProjectClass, project: ProjectIdentity) -> Self {
        Self { class, project }
    }

    pub fn unit(&self, role: Role) -> UnitKey {
        UnitKey::new(self.project.clone(), role)
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class.as_str(), self.project)
    }
}

impl UnitKey {
    pub fn project_key(&self) -> ProjectKey {
        ProjectKey::new(ProjectClass::of(self.role), self.project.clone())
    }
}

/// Maps `(project, role)` to its live unit.
///
/// Creation holds the map entry for the key, so concurrent callers for the
/// same key wait and then all receive the one unit that was created.
#[derive(Default)]
pub struct CompilerRegistry {
    units: DashMap<UnitKey, Arc<CompilationUnit>>,
    recency: Mutex<IndexSet<ProjectKey>>,
}

impl CompilerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &UnitKey) -> Option<Arc<CompilationUnit>> {
        self.units.get(key).map(|unit| unit.clone())
    }

    pub fn contains(&self, key: &UnitKey) -> bool {
        self.units.contains_key(key)
    }

    /// Return the unit for `key`, building it with `make` if absent.
    ///
    /// The boolean is `true` only for the caller whose `make` ran. `make`
    /// must not block or touch this registry; it runs under the entry lock.
    pub fn get_or_create<F>(
        &self,
        key: UnitKey,
        make: F,
    ) -> Result<(Arc<CompilationUnit>, bool), DevError>
    where
        F: FnOnce(&UnitKey) -> Result<Arc<CompilationUnit>, DevError>,
    {
        let project = key.project_key();
        let result = match self.units.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let unit = make(entry.key())?;
                entry.insert(unit.clone());
                (unit, true)
            }
        };
        self.touch(&project);
        Ok(result)
    }

    /// Mark `project` as most recently used.
    pub fn touch(&self, project: &ProjectKey) {
        let mut recency = self.recency.lock();
        recency.shift_remove(project);
        recency.insert(project.clone());
    }

    /// Least recently used projects to evict so at most `max` remain.
    /// `keep` is never chosen. Chosen projects are forgotten here; the caller
    /// removes their units with [`CompilerRegistry::remove_project`].
    pub fn lru_victims(&self, max: usize, keep: &ProjectKey) -> Vec<ProjectKey> {
        let mut recency = self.recency.lock();
        let mut victims = Vec::new();
        let mut index = 0;
        while recency.len() > max && index < recency.len() {
            let candidate = recency[index].clone();
            if &candidate == keep {
                index += 1;
                continue;
            }
            recency.shift_remove_index(index);
            victims.push(candidate);
        }
        victims
    }

    /// Drop every unit of `project` and hand them back to the caller.
    pub fn remove_project(&self, project: &ProjectKey) -> Vec<Arc<CompilationUnit>> {
        self.recency.lock().shift_remove(project);
        project
            .class
            .roles()
            .iter()
            .filter_map(|role| self.units.remove(&project.unit(*role)))
            .map(|(_, unit)| unit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn projects(&self) -> Vec<ProjectKey> {
        self.recency.lock().iter().cloned().collect()
    }
}
