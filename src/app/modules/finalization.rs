//! Phase 9: closes the computation. Runs after every cost and risk contributor.

use super::ids;
use crate::config::pricing::PricingConfig;
use crate::core::accumulator::{keys, CostCategory, CostEntry};
use crate::core::module::QuoteModule;
use serde_json::{Map, Value};
use std::sync::Arc;

const MEDIUM_RISK_FROM: f64 = 20.0;
const HIGH_RISK_FROM: f64 = 50.0;

pub fn modules(config: &Arc<PricingConfig>) -> Vec<QuoteModule> {
    vec![
        risk_score_aggregation(config.clone()),
        commercial_margin(config.clone()),
        minimum_price(config.clone()),
        quote_summary(),
    ]
}

pub fn risk_level(score: f64) -> &'static str {
    if score >= HIGH_RISK_FROM {
        "HIGH"
    } else if score >= MEDIUM_RISK_FROM {
        "MEDIUM"
    } else {
        "LOW"
    }
}

pub fn risk_score_aggregation(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::RISK_SCORE_AGGREGATION,
        90,
        "Sums the risk contributions into a bounded score",
        move |mut ctx| {
            const ID: &str = ids::RISK_SCORE_AGGREGATION;
            let rates = &config.risk;

            let score = ctx.computed.total_risk().min(rates.max_score);
            let level = risk_level(score);

            ctx.computed.set_metadata(keys::RISK_SCORE, score);
            ctx.computed.set_metadata(keys::RISK_LEVEL, level);
            if score >= rates.manual_review_threshold {
                ctx.computed.add_flag(
                    ID,
                    "MANUAL_REVIEW",
                    format!("Risk score {} requires a sales manager review", score),
                );
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
}

pub fn commercial_margin(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::COMMERCIAL_MARGIN,
        91,
        "Company margin on the operational subtotal",
        move |mut ctx| {
            const ID: &str = ids::COMMERCIAL_MARGIN;
            let rate = config.commercial.margin_rate;

            let subtotal = ctx.computed.total_cost();
            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Margin, "Commercial margin", subtotal * rate)
                    .with_meta("rate", rate)
                    .with_meta("base", subtotal),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .when(|ctx| ctx.computed.total_cost() > 0.0)
}

pub fn minimum_price(config: Arc<PricingConfig>) -> QuoteModule {
    let minimum = config.commercial.minimum_price;
    QuoteModule::new(
        ids::MINIMUM_PRICE,
        92,
        "Tops small jobs up to the minimum billable price",
        move |mut ctx| {
            const ID: &str = ids::MINIMUM_PRICE;

            let subtotal = ctx.computed.total_cost();
            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Adjustment, "Minimum price top-up", minimum - subtotal)
                    .with_meta("minimumPrice", minimum),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::COMMERCIAL_MARGIN])
    .when(move |ctx| ctx.computed.total_cost() < minimum)
}

pub fn quote_summary() -> QuoteModule {
    QuoteModule::new(
        ids::QUOTE_SUMMARY,
        93,
        "Records the subtotal and per-category totals",
        |mut ctx| {
            const ID: &str = ids::QUOTE_SUMMARY;

            let totals: Map<String, Value> = ctx
                .computed
                .category_totals()
                .into_iter()
                .map(|(category, total)| (category.as_str().to_string(), Value::from(total)))
                .collect();
            let subtotal = ctx.computed.total_cost();
            let lines = ctx.computed.costs().len();

            ctx.computed.set_metadata(keys::SUBTOTAL, subtotal);
            ctx.computed.set_metadata(keys::COST_LINE_COUNT, lines);
            ctx.computed.set_metadata(keys::CATEGORY_TOTALS, Value::Object(totals));
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::super::testing::{costs_from, order, run};
    use super::*;
    use crate::core::engine::StepStatus;

    #[test]
    fn test_risk_levels() {
        assert_eq!(risk_level(0.0), "LOW");
        assert_eq!(risk_level(19.5), "LOW");
        assert_eq!(risk_level(20.0), "MEDIUM");
        assert_eq!(risk_level(50.0), "HIGH");
    }

    #[test]
    fn test_reference_order_totals() {
        let result = run(order());
        let computed = result.computed();

        // 595 labor + 270 trucks + 7 fuel = 872, margin 130.80
        assert_eq!(costs_from(&result, ids::COMMERCIAL_MARGIN), 130.8);
        assert_eq!(result.step(ids::MINIMUM_PRICE), Some(&StepStatus::NotApplicable));
        assert_eq!(result.base_cost, 1002.8);
        assert_eq!(computed.metadata_f64(keys::SUBTOTAL), Some(1002.8));
        assert_eq!(computed.metadata_u64(keys::COST_LINE_COUNT), Some(5));
        assert_eq!(computed.metadata_f64(keys::RISK_SCORE), Some(8.0));
        assert_eq!(computed.metadata_str(keys::RISK_LEVEL), Some("LOW"));

        let totals = computed.metadata_value(keys::CATEGORY_TOTALS).unwrap();
        assert_eq!(totals["LABOR"], 595.0);
        assert_eq!(totals["VEHICLE"], 270.0);
    }

    #[test]
    fn test_minimum_price_top_up() {
        let mut ctx = order();
        ctx.volume = Some(4.0);
        ctx.volume_confidence = Some(crate::domain::model::VolumeConfidence::High);

        // 210 labor + 90 truck + 3.50 fuel = 303.50, margin 45.53 -> 349.03
        let result = run(ctx);
        assert_eq!(costs_from(&result, ids::MINIMUM_PRICE), 0.97);
        assert_eq!(result.base_cost, 350.0);
    }

    #[test]
    fn test_manual_review_flag() {
        let mut ctx = order();
        ctx.volume = None;
        ctx.rooms = Some(4);
        ctx.declared_value = Some(90_000.0);
        ctx.pickup.floor = Some(6);
        ctx.delivery.carry_distance_m = Some(50.0);

        // 25 volume + 10 access + 10 declared value
        let result = run(ctx);
        assert_eq!(result.computed().metadata_f64(keys::RISK_SCORE), Some(45.0));
        assert!(!result.computed().has_flag("MANUAL_REVIEW"));

        let mut config = PricingConfig::default();
        config.risk.manual_review_threshold = 40.0;
        let mut ctx = order();
        ctx.volume = None;
        ctx.rooms = Some(4);
        ctx.declared_value = Some(90_000.0);
        ctx.pickup.floor = Some(6);
        ctx.delivery.carry_distance_m = Some(50.0);
        let result = super::super::testing::run_with(&config, ctx);
        assert!(result.computed().has_flag("MANUAL_REVIEW"));
        assert_eq!(result.computed().metadata_str(keys::RISK_LEVEL), Some("MEDIUM"));
    }
}
