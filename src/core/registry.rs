use crate::app::modules;
use crate::config::pricing::PricingConfig;
use crate::core::module::QuoteModule;
use crate::utils::error::{QuoteError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const MIN_PRIORITY: u16 = 10;
pub const MAX_PRIORITY: u16 = 99;

/// A declared dependency that can never be satisfied at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyIssue {
    /// The dependency id is not registered at all.
    Unregistered { module_id: String, dependency: String },
    /// The dependency runs at the same or a later priority, so it never activates in time.
    Misordered {
        module_id: String,
        dependency: String,
        module_priority: u16,
        dependency_priority: u16,
    },
}

impl DependencyIssue {
    pub fn module_id(&self) -> &str {
        match self {
            DependencyIssue::Unregistered { module_id, .. }
            | DependencyIssue::Misordered { module_id, .. } => module_id,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DependencyIssue::Unregistered {
                module_id,
                dependency,
            } => format!(
                "'{}' depends on '{}', which is not registered",
                module_id, dependency
            ),
            DependencyIssue::Misordered {
                module_id,
                dependency,
                module_priority,
                dependency_priority,
            } => format!(
                "'{}' (priority {}) depends on '{}' (priority {}), which never runs before it",
                module_id, module_priority, dependency, dependency_priority
            ),
        }
    }
}

/// Immutable, priority-ordered catalog of quote modules.
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: Vec<Arc<QuoteModule>>,
    index: HashMap<String, usize>,
}

impl ModuleRegistry {
    /// Builds the catalog, sorted by priority. Modules sharing a priority keep
    /// their registration order.
    pub fn new(modules: Vec<QuoteModule>) -> Result<Self> {
        Self::from_shared(modules.into_iter().map(Arc::new).collect())
    }

    pub fn with_defaults(config: &PricingConfig) -> Result<Self> {
        Self::new(modules::catalog(config))
    }

    fn from_shared(mut modules: Vec<Arc<QuoteModule>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for module in &modules {
            if !seen.insert(module.id().to_string()) {
                return Err(QuoteError::DuplicateModule(module.id().to_string()));
            }
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&module.priority()) {
                return Err(QuoteError::InvalidPriority {
                    module_id: module.id().to_string(),
                    priority: module.priority(),
                });
            }
        }

        // sort_by_key is stable: registration order breaks priority ties
        modules.sort_by_key(|m| m.priority());

        let index = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id().to_string(), i))
            .collect();

        let registry = Self { modules, index };
        for issue in registry.dependency_issues() {
            tracing::warn!("⚠️ Module dependency will never be satisfied: {}", issue.describe());
        }

        tracing::debug!("Module registry built with {} modules", registry.len());
        Ok(registry)
    }

    pub fn modules(&self) -> &[Arc<QuoteModule>] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&QuoteModule> {
        self.index.get(id).map(|&i| self.modules[i].as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.id()).collect()
    }

    /// Modules whose priority lies in `[phase * 10, phase * 10 + 10)`, in execution order.
    pub fn get_modules_by_phase(&self, phase: u16) -> Vec<&QuoteModule> {
        let start = u32::from(phase) * 10;
        let end = start + 10;
        self.modules
            .iter()
            .filter(|m| (start..end).contains(&u32::from(m.priority())))
            .map(|m| m.as_ref())
            .collect()
    }

    /// Same catalog minus the given ids. The remaining modules are shared, not copied.
    pub fn without<'a, I>(&self, excluded: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let excluded: HashSet<&str> = excluded.into_iter().collect();
        let modules: Vec<Arc<QuoteModule>> = self
            .modules
            .iter()
            .filter(|m| !excluded.contains(m.id()))
            .cloned()
            .collect();
        let index = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id().to_string(), i))
            .collect();
        Self { modules, index }
    }

    /// Dependencies that cannot be satisfied given the current ordering.
    pub fn dependency_issues(&self) -> Vec<DependencyIssue> {
        let mut issues = Vec::new();
        for module in &self.modules {
            for dependency in module.dependencies() {
                match self.get(dependency) {
                    None => issues.push(DependencyIssue::Unregistered {
                        module_id: module.id().to_string(),
                        dependency: dependency.clone(),
                    }),
                    Some(dep) if dep.priority() >= module.priority() => {
                        issues.push(DependencyIssue::Misordered {
                            module_id: module.id().to_string(),
                            dependency: dependency.clone(),
                            module_priority: module.priority(),
                            dependency_priority: dep.priority(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        issues
    }

    /// Fails on the first dependency issue. Execution never needs this; the
    /// engine silently skips modules whose dependencies did not activate.
    pub fn validate_strict(&self) -> Result<()> {
        match self.dependency_issues().into_iter().next() {
            Some(issue) => Err(QuoteError::ConfigValidationError {
                field: format!("modules.{}.dependencies", issue.module_id()),
                message: issue.describe(),
            }),
            None => Ok(()),
        }
    }
}
