use crate::core::accumulator::{ComputedContext, CostCategory};
use crate::core::module::QuoteModule;
use crate::core::registry::ModuleRegistry;
use crate::domain::model::QuoteContext;
use crate::utils::error::{QuoteError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// What happened to one module during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// `apply` ran and the module recorded its activation.
    Activated,
    /// `apply` ran but the module found nothing to contribute.
    NoOp,
    /// A declared dependency had not activated when the module's turn came.
    SkippedDependency { missing: String },
    /// The module's business condition did not hold.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub module_id: String,
    #[serde(flatten)]
    pub status: StepStatus,
}

#[derive(Debug, Clone)]
pub struct BaseCostResult {
    /// Sum of every accumulated cost entry, before any scenario adjustment.
    pub base_cost: f64,
    pub context: QuoteContext,
    pub steps: Vec<StepOutcome>,
}

impl BaseCostResult {
    pub fn computed(&self) -> &ComputedContext {
        &self.context.computed
    }

    pub fn into_computed(self) -> ComputedContext {
        self.context.computed
    }

    pub fn step(&self, module_id: &str) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|s| s.module_id == module_id)
            .map(|s| &s.status)
    }
}

/// Runs the ordered module catalog over a quote context.
///
/// The engine holds no per-run state and can be shared between threads; each
/// call to [`BaseCostEngine::execute`] works on its own context.
#[derive(Debug, Clone)]
pub struct BaseCostEngine {
    registry: Arc<ModuleRegistry>,
}

impl BaseCostEngine {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn execute(&self, initial: QuoteContext) -> Result<BaseCostResult> {
        let modules = self.registry.modules();
        tracing::debug!("Starting quote pipeline with {} modules", modules.len());

        // id -> position in the activation trail, so dependency checks are O(1)
        let mut activated: HashMap<String, usize> = initial
            .computed
            .activated_modules()
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut ctx = initial;
        let mut steps = Vec::with_capacity(modules.len());

        for module in modules {
            let status = self.run_step(module, &mut ctx, &activated)?;
            if status == StepStatus::Activated {
                activated.insert(module.id().to_string(), activated.len());
            }
            steps.push(StepOutcome {
                module_id: module.id().to_string(),
                status,
            });
        }

        let base_cost = ctx.computed.total_cost();
        tracing::info!(
            "✅ Quote pipeline completed: {} of {} modules activated, base cost {:.2}€",
            ctx.computed.activated_modules().len(),
            modules.len(),
            base_cost
        );

        Ok(BaseCostResult {
            base_cost,
            context: ctx,
            steps,
        })
    }

    fn run_step(
        &self,
        module: &QuoteModule,
        ctx: &mut QuoteContext,
        activated: &HashMap<String, usize>,
    ) -> Result<StepStatus> {
        if let Some(missing) = module
            .dependencies()
            .iter()
            .find(|dep| !activated.contains_key(dep.as_str()))
        {
            tracing::debug!("⏭️ Skipping {}: dependency '{}' not activated", module.id(), missing);
            return Ok(StepStatus::SkippedDependency {
                missing: missing.clone(),
            });
        }

        if !module.is_applicable(ctx) {
            tracing::debug!("⏭️ Skipping {}: not applicable", module.id());
            return Ok(StepStatus::NotApplicable);
        }

        let before = ctx.computed.sizes();
        let snapshot = ctx.computed.clone();
        let input = std::mem::take(ctx);
        *ctx = module.apply(input).map_err(|e| {
            tracing::error!("❌ Module {} aborted the quote: {}", module.id(), e);
            e.attributed_to(module.id())
        })?;
        let after = ctx.computed.sizes();

        let contract_error = |reason: &str| QuoteError::ModuleContract {
            module_id: module.id().to_string(),
            reason: reason.to_string(),
        };

        if !ctx.computed.extends(&snapshot) {
            return Err(contract_error("accumulated entries were removed or rewritten"));
        }
        if ctx.computed.costs()[before.costs()..]
            .iter()
            .any(|c| c.amount < 0.0 && c.category != CostCategory::Discount)
        {
            return Err(contract_error("negative amount outside the DISCOUNT category"));
        }

        match after.activated - before.activated {
            0 if after.grew_since(&before) => {
                Err(contract_error("contributed entries without recording its activation"))
            }
            0 => {
                tracing::debug!("{} ran without contributing", module.id());
                Ok(StepStatus::NoOp)
            }
            1 => {
                let recorded = ctx.computed.activated_modules().last().map(String::as_str);
                if recorded != Some(module.id()) {
                    return Err(contract_error("recorded an activation under another id"));
                }
                tracing::debug!("🔄 Applied {}", module.id());
                Ok(StepStatus::Activated)
            }
            _ => Err(contract_error("recorded more than one activation")),
        }
    }
}
