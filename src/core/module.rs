use crate::domain::model::QuoteContext;
use crate::utils::error::Result;
use std::fmt;
use std::sync::Arc;

pub type ApplyFn = Arc<dyn Fn(QuoteContext) -> Result<QuoteContext> + Send + Sync>;
pub type Predicate = Arc<dyn Fn(&QuoteContext) -> bool + Send + Sync>;

/// Whether a module's business condition has to be checked before it runs.
#[derive(Clone)]
pub enum Applicability {
    Unconditional,
    Conditional(Predicate),
}

impl Applicability {
    pub fn allows(&self, ctx: &QuoteContext) -> bool {
        match self {
            Applicability::Unconditional => true,
            Applicability::Conditional(predicate) => predicate(ctx),
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, Applicability::Conditional(_))
    }
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applicability::Unconditional => f.write_str("Unconditional"),
            Applicability::Conditional(_) => f.write_str("Conditional(..)"),
        }
    }
}

/// A named, prioritized, optionally conditional transform of the quote context.
///
/// `apply` must be pure: it receives the context, appends its own
/// contributions plus its id to `computed.activated_modules`, and hands the
/// context back. A module whose preconditions are unmet returns the context
/// untouched instead of failing; only input validation modules return errors.
///
/// `dependencies` are checked at run time against the activation trail. They
/// do not influence ordering, which is decided by `priority` alone
/// (`phase * 10 + slot`).
#[derive(Clone)]
pub struct QuoteModule {
    id: String,
    description: String,
    priority: u16,
    dependencies: Vec<String>,
    applicability: Applicability,
    apply: ApplyFn,
}

impl QuoteModule {
    pub fn new<F>(id: &str, priority: u16, description: &str, apply: F) -> Self
    where
        F: Fn(QuoteContext) -> Result<QuoteContext> + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            priority,
            dependencies: Vec::new(),
            applicability: Applicability::Unconditional,
            apply: Arc::new(apply),
        }
    }

    pub fn depends_on(mut self, dependencies: &[&str]) -> Self {
        self.dependencies
            .extend(dependencies.iter().map(|d| d.to_string()));
        self
    }

    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&QuoteContext) -> bool + Send + Sync + 'static,
    {
        self.applicability = Applicability::Conditional(Arc::new(predicate));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// Decade band of the priority: 1 for 10..=19, up to 9 for 90..=99.
    pub fn phase(&self) -> u16 {
        self.priority / 10
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn applicability(&self) -> &Applicability {
        &self.applicability
    }

    pub fn is_applicable(&self, ctx: &QuoteContext) -> bool {
        self.applicability.allows(ctx)
    }

    pub fn apply(&self, ctx: QuoteContext) -> Result<QuoteContext> {
        (self.apply)(ctx)
    }
}

impl fmt::Debug for QuoteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuoteModule")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .field("applicability", &self.applicability)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accumulator::{CostCategory, CostEntry};

    fn flat_fee(id: &'static str, amount: f64) -> QuoteModule {
        QuoteModule::new(id, 41, "flat fee", move |mut ctx| {
            ctx.computed
                .add_cost(CostEntry::new(id, CostCategory::Fee, "Flat fee", amount));
            ctx.computed.activate(id);
            Ok(ctx)
        })
    }

    #[test]
    fn test_builder_defaults() {
        let module = flat_fee("flat-fee", 10.0);
        assert_eq!(module.id(), "flat-fee");
        assert_eq!(module.priority(), 41);
        assert_eq!(module.phase(), 4);
        assert!(module.dependencies().is_empty());
        assert!(!module.applicability().is_conditional());
        assert!(module.is_applicable(&QuoteContext::new()));
    }

    #[test]
    fn test_conditional_module() {
        let module = flat_fee("piano-fee", 50.0)
            .depends_on(&["workforce-sizing"])
            .when(|ctx| ctx.has_piano());

        assert_eq!(module.dependencies(), &["workforce-sizing".to_string()]);
        assert!(module.applicability().is_conditional());
        assert!(!module.is_applicable(&QuoteContext::new()));

        let ctx = QuoteContext {
            piano: Some(true),
            ..QuoteContext::default()
        };
        assert!(module.is_applicable(&ctx));
    }

    #[test]
    fn test_apply_appends_contribution() {
        let module = flat_fee("flat-fee", 10.0);
        let ctx = module.apply(QuoteContext::new()).unwrap();
        assert_eq!(ctx.computed.total_cost(), 10.0);
        assert_eq!(ctx.computed.activated_modules(), &["flat-fee".to_string()]);
    }
}
