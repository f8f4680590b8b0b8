//! Prices every commercial scenario of one order.
//!
//! The plain computation runs once. A scenario that changes nothing but the
//! final price reuses it; a scenario that disables modules or forces
//! customer options gets its own engine run over a filtered catalog and a
//! patched context.

use crate::config::pricing::PricingConfig;
use crate::core::accumulator::{keys, round_currency, ComputedContext, CostCategory};
use crate::core::engine::{BaseCostEngine, BaseCostResult};
use crate::core::registry::ModuleRegistry;
use crate::core::scenario::{Scenario, ScenarioCatalog};
use crate::domain::model::QuoteContext;
use crate::utils::error::{QuoteError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBreakdown {
    /// Sum of the scenario run's cost entries.
    pub subtotal: f64,
    /// `final_price - subtotal`, what the scenario's price adjustment added or removed.
    pub adjustment_amount: f64,
    pub category_totals: BTreeMap<CostCategory, f64>,
    pub risk_score: f64,
    pub disabled_modules: Vec<String>,
    pub computed: ComputedContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioQuote {
    pub scenario_id: String,
    pub label: String,
    pub final_price: f64,
    pub breakdown: QuoteBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiQuote {
    /// Cost of the plain computation, before any scenario override.
    pub base_cost: f64,
    pub quotes: Vec<ScenarioQuote>,
}

impl MultiQuote {
    pub fn get(&self, scenario_id: &str) -> Option<&ScenarioQuote> {
        self.quotes
            .iter()
            .find(|q| q.scenario_id.eq_ignore_ascii_case(scenario_id.trim()))
    }

    pub fn cheapest(&self) -> Option<&ScenarioQuote> {
        self.quotes
            .iter()
            .min_by(|a, b| a.final_price.total_cmp(&b.final_price))
    }
}

#[derive(Debug, Clone)]
pub struct MultiQuoteService {
    engine: BaseCostEngine,
    scenarios: ScenarioCatalog,
}

impl MultiQuoteService {
    pub fn new(registry: Arc<ModuleRegistry>, scenarios: ScenarioCatalog) -> Self {
        Self {
            engine: BaseCostEngine::new(registry),
            scenarios,
        }
    }

    /// Default module catalog and the five default scenarios, both built from `config`.
    pub fn with_defaults(config: &PricingConfig) -> Result<Self> {
        let registry = ModuleRegistry::with_defaults(config)?;
        Ok(Self::new(Arc::new(registry), ScenarioCatalog::defaults(config)))
    }

    pub fn scenarios(&self) -> &ScenarioCatalog {
        &self.scenarios
    }

    pub fn engine(&self) -> &BaseCostEngine {
        &self.engine
    }

    /// Quotes every scenario of the catalog, in catalog order.
    pub fn quote_all(&self, ctx: &QuoteContext) -> Result<MultiQuote> {
        let ctx = pinned(ctx);
        let base = self.engine.execute(ctx.without_computed())?;

        let mut quotes = Vec::with_capacity(self.scenarios.len());
        for scenario in self.scenarios.scenarios() {
            quotes.push(self.price(scenario, &ctx, Some(&base))?);
        }

        tracing::info!(
            "✅ Priced {} scenarios, base cost {:.2}€",
            quotes.len(),
            base.base_cost
        );
        Ok(MultiQuote {
            base_cost: base.base_cost,
            quotes,
        })
    }

    /// Quotes one scenario. Gives the same figures as picking it out of [`Self::quote_all`].
    pub fn quote_scenario(&self, ctx: &QuoteContext, scenario_id: &str) -> Result<ScenarioQuote> {
        let scenario = self
            .scenarios
            .get(scenario_id)
            .ok_or_else(|| QuoteError::UnknownScenario(scenario_id.to_string()))?;
        self.price(scenario, &pinned(ctx), None)
    }

    /// Quotes the scenario the customer picked, or every scenario when none was picked.
    pub fn quote_selected(&self, ctx: &QuoteContext) -> Result<MultiQuote> {
        let selected = ctx
            .selected_scenario
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(scenario_id) = selected else {
            return self.quote_all(ctx);
        };
        let scenario = self
            .scenarios
            .get(scenario_id)
            .ok_or_else(|| QuoteError::UnknownScenario(scenario_id.to_string()))?;

        let ctx = pinned(ctx);
        let base = self.engine.execute(ctx.without_computed())?;
        let quote = self.price(scenario, &ctx, Some(&base))?;
        Ok(MultiQuote {
            base_cost: base.base_cost,
            quotes: vec![quote],
        })
    }

    fn price(
        &self,
        scenario: &Scenario,
        ctx: &QuoteContext,
        base: Option<&BaseCostResult>,
    ) -> Result<ScenarioQuote> {
        let overrides = &scenario.overrides;

        let computed = match base {
            Some(base) if overrides.reuses_base_run() => base.computed().clone(),
            _ => {
                let input = overrides.patched_context(ctx);
                let result = if overrides.disabled_modules.is_empty() {
                    self.engine.execute(input)?
                } else {
                    let registry = self
                        .engine
                        .registry()
                        .without(overrides.disabled_modules.iter().map(String::as_str));
                    BaseCostEngine::new(Arc::new(registry)).execute(input)?
                };
                result.into_computed()
            }
        };

        let subtotal = computed.total_cost();
        let final_price = overrides.price_adjustment.apply(subtotal);
        tracing::debug!(
            "Scenario {}: subtotal {:.2}€, final {:.2}€",
            scenario.id,
            subtotal,
            final_price
        );

        Ok(ScenarioQuote {
            scenario_id: scenario.id.clone(),
            label: scenario.label.clone(),
            final_price,
            breakdown: QuoteBreakdown {
                subtotal,
                adjustment_amount: round_currency(final_price - subtotal),
                category_totals: computed.category_totals(),
                risk_score: computed.metadata_f64(keys::RISK_SCORE).unwrap_or(0.0),
                disabled_modules: overrides.disabled_modules.iter().cloned().collect(),
                computed,
            },
        })
    }
}

/// Fixes "today" once so every scenario run of one request sees the same date.
fn pinned(ctx: &QuoteContext) -> QuoteContext {
    let mut ctx = ctx.clone();
    if ctx.reference_date.is_none() {
        ctx.reference_date = Some(Utc::now().date_naive());
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::modules::ids;
    use crate::app::modules::testing::order;

    fn service() -> MultiQuoteService {
        MultiQuoteService::with_defaults(&PricingConfig::default()).unwrap()
    }

    #[test]
    fn test_standard_matches_base_cost() {
        let quotes = service().quote_all(&order()).unwrap();

        assert_eq!(quotes.base_cost, 1002.8);
        let standard = quotes.get("STANDARD").unwrap();
        assert_eq!(standard.final_price, 1002.8);
        assert_eq!(standard.breakdown.adjustment_amount, 0.0);
        assert_eq!(quotes.quotes.len(), 5);
    }

    #[test]
    fn test_eco_drops_options_and_discounts() {
        let quotes = service().quote_all(&order()).unwrap();
        let eco = quotes.get("eco").unwrap();

        assert!(eco.breakdown.computed.cross_sell_proposals().is_empty());
        assert!(!eco.breakdown.computed.is_activated(ids::REASSEMBLY));
        // same costs as STANDARD, 5 % off
        assert_eq!(eco.breakdown.subtotal, 1002.8);
        assert_eq!(eco.final_price, 952.66);
    }

    #[test]
    fn test_confort_bills_forced_options() {
        let quotes = service().quote_all(&order()).unwrap();
        let confort = quotes.get("CONFORT").unwrap();

        // 872 + 132 reassembly + 82.5 supplies = 1086.5, margin 162.98
        assert_eq!(confort.breakdown.subtotal, 1249.48);
        assert_eq!(confort.final_price, 1311.95);
        assert_eq!(
            confort.breakdown.category_totals.get(&CostCategory::Supplies),
            Some(&82.5)
        );
    }

    #[test]
    fn test_single_scenario_matches_full_run() {
        let service = service();
        let ctx = order();
        let all = service.quote_all(&ctx).unwrap();

        for id in service.scenarios().ids() {
            let single = service.quote_scenario(&ctx, id).unwrap();
            assert_eq!(Some(&single), all.get(id), "{}", id);
        }
    }

    #[test]
    fn test_quote_selected() {
        let service = service();
        let mut ctx = order();
        ctx.selected_scenario = Some("premium".to_string());

        let selected = service.quote_selected(&ctx).unwrap();
        assert_eq!(selected.quotes.len(), 1);
        assert_eq!(selected.quotes[0].scenario_id, "PREMIUM");

        ctx.selected_scenario = Some("GOLD".to_string());
        assert!(matches!(
            service.quote_selected(&ctx),
            Err(QuoteError::UnknownScenario(_))
        ));

        ctx.selected_scenario = None;
        assert_eq!(service.quote_selected(&ctx).unwrap().quotes.len(), 5);
    }

    #[test]
    fn test_fatal_input_aborts_every_scenario() {
        let mut ctx = order();
        ctx.moving_date = Some("2020-01-01".to_string());

        let err = service().quote_all(&ctx).unwrap_err();
        assert!(err.is_fatal_input());
    }
}
