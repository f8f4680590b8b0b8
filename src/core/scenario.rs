use crate::app::modules::ids;
use crate::config::pricing::PricingConfig;
use crate::core::accumulator::round_currency;
use crate::core::registry::ModuleRegistry;
use crate::domain::model::QuoteContext;
use crate::utils::error::{QuoteError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_non_negative, validate_strictly_positive,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Customer options a scenario forces, whatever the order said.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextPatch {
    pub reassembly: Option<bool>,
    pub force_supplies: Option<bool>,
    pub packing_service: Option<bool>,
    pub bulky_furniture: Option<bool>,
    pub flexible_dates: Option<bool>,
    pub piano: Option<bool>,
}

impl ContextPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, ctx: &mut QuoteContext) {
        let fields = [
            (self.reassembly, &mut ctx.reassembly),
            (self.force_supplies, &mut ctx.force_supplies),
            (self.packing_service, &mut ctx.packing_service),
            (self.bulky_furniture, &mut ctx.bulky_furniture),
            (self.flexible_dates, &mut ctx.flexible_dates),
            (self.piano, &mut ctx.piano),
        ];
        for (forced, target) in fields {
            if let Some(value) = forced {
                *target = Some(value);
            }
        }
    }
}

/// `final = max(minimum_price, subtotal * multiplier + flat_amount)`, rounded to the cent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceAdjustment {
    pub multiplier: f64,
    pub flat_amount: f64,
    pub minimum_price: Option<f64>,
}

impl Default for PriceAdjustment {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            flat_amount: 0.0,
            minimum_price: None,
        }
    }
}

impl PriceAdjustment {
    pub fn scaled(multiplier: f64) -> Self {
        Self {
            multiplier,
            ..Self::default()
        }
    }

    pub fn with_minimum(mut self, minimum_price: f64) -> Self {
        self.minimum_price = Some(minimum_price);
        self
    }

    pub fn apply(&self, subtotal: f64) -> f64 {
        let adjusted = subtotal * self.multiplier + self.flat_amount;
        let floored = match self.minimum_price {
            Some(minimum) => adjusted.max(minimum),
            None => adjusted,
        };
        round_currency(floored)
    }
}

/// Everything a scenario changes relative to the plain computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOverride {
    pub disabled_modules: BTreeSet<String>,
    pub forced_context: ContextPatch,
    pub price_adjustment: PriceAdjustment,
}

impl ScenarioOverride {
    /// True when the scenario prices the very same computation as the base run.
    pub fn reuses_base_run(&self) -> bool {
        self.disabled_modules.is_empty() && self.forced_context.is_empty()
    }

    /// The input of this scenario's engine run: a fresh accumulator and the forced options.
    pub fn patched_context(&self, ctx: &QuoteContext) -> QuoteContext {
        let mut patched = ctx.without_computed();
        self.forced_context.apply(&mut patched);
        patched
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub overrides: ScenarioOverride,
}

impl Scenario {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            overrides: ScenarioOverride::default(),
        }
    }

    pub fn disabling(mut self, module_ids: &[&str]) -> Self {
        self.overrides
            .disabled_modules
            .extend(module_ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn forcing(mut self, patch: ContextPatch) -> Self {
        self.overrides.forced_context = patch;
        self
    }

    pub fn priced(mut self, adjustment: PriceAdjustment) -> Self {
        self.overrides.price_adjustment = adjustment;
        self
    }
}

/// Ordered set of scenarios with unique, case-insensitive ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    pub fn new(scenarios: Vec<Scenario>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for scenario in &scenarios {
            validate_non_empty_string("scenarios.id", &scenario.id)?;
            if !seen.insert(scenario.id.to_ascii_uppercase()) {
                return Err(QuoteError::DuplicateScenario(scenario.id.clone()));
            }
        }
        Ok(Self { scenarios })
    }

    /// ECO, STANDARD, CONFORT, PREMIUM and FLEX, floored at the configured minimum price.
    pub fn defaults(config: &PricingConfig) -> Self {
        let floor = config.commercial.minimum_price;
        let scenarios = vec![
            Scenario::new("ECO", "Eco: transport only, customer packs and dismantles")
                .disabling(&[ids::REASSEMBLY, ids::PACKING_SUPPLIES, ids::PACKING_SERVICE])
                .priced(PriceAdjustment::scaled(0.95).with_minimum(floor)),
            Scenario::new("STANDARD", "Standard")
                .priced(PriceAdjustment::default().with_minimum(floor)),
            Scenario::new("CONFORT", "Confort: reassembly and packing supplies included")
                .forcing(ContextPatch {
                    reassembly: Some(true),
                    force_supplies: Some(true),
                    ..ContextPatch::default()
                })
                .priced(PriceAdjustment::scaled(1.05).with_minimum(floor)),
            Scenario::new("PREMIUM", "Premium: full packing and reassembly")
                .forcing(ContextPatch {
                    reassembly: Some(true),
                    force_supplies: Some(true),
                    packing_service: Some(true),
                    ..ContextPatch::default()
                })
                .priced(PriceAdjustment::scaled(1.12).with_minimum(floor)),
            Scenario::new("FLEX", "Flex: we choose the day, you save")
                .forcing(ContextPatch {
                    flexible_dates: Some(true),
                    ..ContextPatch::default()
                })
                .priced(PriceAdjustment::default().with_minimum(floor)),
        ];
        Self { scenarios }
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        let id = id.trim();
        self.scenarios.iter().find(|s| s.id.eq_ignore_ascii_case(id))
    }

    /// Checks the scenarios make sense for `registry`: positive multipliers and
    /// only known module ids in the disabled lists.
    pub fn validate_against(&self, registry: &ModuleRegistry) -> Result<()> {
        for scenario in &self.scenarios {
            let adjustment = &scenario.overrides.price_adjustment;
            validate_strictly_positive(
                &format!("scenarios.{}.price_adjustment.multiplier", scenario.id),
                adjustment.multiplier,
            )?;
            if let Some(minimum) = adjustment.minimum_price {
                validate_non_negative(
                    &format!("scenarios.{}.price_adjustment.minimum_price", scenario.id),
                    minimum,
                )?;
            }
            if !adjustment.flat_amount.is_finite() {
                return Err(QuoteError::InvalidConfigValueError {
                    field: format!("scenarios.{}.price_adjustment.flat_amount", scenario.id),
                    value: adjustment.flat_amount.to_string(),
                    reason: "must be a finite amount".to_string(),
                });
            }

            if let Some(unknown) = scenario
                .overrides
                .disabled_modules
                .iter()
                .find(|id| !registry.contains(id))
            {
                return Err(QuoteError::ConfigValidationError {
                    field: format!("scenarios.{}.disabled_modules", scenario.id),
                    message: format!("Module '{}' is not registered", unknown),
                });
            }
        }
        Ok(())
    }
}
