//! Phase 8: optional services.
//!
//! Each module either bills the service the customer (or a scenario) asked
//! for, or records it as a cross-sell proposal with an estimated price.

use super::{adjusted_volume, ids};
use crate::config::pricing::PricingConfig;
use crate::core::accumulator::{CostCategory, CostEntry, RequirementKind};
use crate::core::module::QuoteModule;
use crate::domain::model::QuoteContext;
use std::sync::Arc;

pub fn modules(config: &Arc<PricingConfig>) -> Vec<QuoteModule> {
    vec![
        reassembly(config.clone()),
        packing_supplies(config.clone()),
        packing_service(config.clone()),
        piano_transport(config.clone()),
        bulky_furniture_handling(config.clone()),
    ]
}

fn volume_at_least(ctx: &QuoteContext, min_m3: f64) -> bool {
    adjusted_volume(ctx).map(|v| v >= min_m3).unwrap_or(false)
}

pub fn reassembly(config: Arc<PricingConfig>) -> QuoteModule {
    let proposal_min = config.options.reassembly_proposal_min_m3;
    QuoteModule::new(
        ids::REASSEMBLY,
        80,
        "Furniture dismantling and reassembly",
        move |mut ctx| {
            const ID: &str = ids::REASSEMBLY;

            let Some(volume) = adjusted_volume(&ctx) else {
                return Ok(ctx);
            };
            let price = volume * config.options.reassembly_per_m3;

            if ctx.wants_reassembly() {
                ctx.computed.add_cost(
                    CostEntry::new(ID, CostCategory::Service, "Dismantling and reassembly", price)
                        .with_meta("volumeM3", volume),
                );
            } else {
                ctx.computed.add_cross_sell(
                    ID,
                    "REASSEMBLY",
                    "Let our crew dismantle and reassemble your furniture",
                    price,
                );
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ADJUSTMENT])
    .when(move |ctx| ctx.wants_reassembly() || volume_at_least(ctx, proposal_min))
}

pub fn packing_supplies(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::PACKING_SUPPLIES,
        81,
        "Boxes, tape and wrapping",
        move |mut ctx| {
            const ID: &str = ids::PACKING_SUPPLIES;

            let Some(volume) = adjusted_volume(&ctx) else {
                return Ok(ctx);
            };
            let price = volume * config.options.supplies_per_m3;

            if ctx.wants_supplies() {
                ctx.computed.add_cost(
                    CostEntry::new(ID, CostCategory::Supplies, "Packing supplies", price)
                        .with_meta("volumeM3", volume),
                );
            } else {
                ctx.computed.add_cross_sell(
                    ID,
                    "PACKING_SUPPLIES",
                    "Packing supplies kit delivered before the move",
                    price,
                );
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ADJUSTMENT])
}

pub fn packing_service(config: Arc<PricingConfig>) -> QuoteModule {
    let proposal_min = config.options.packing_proposal_min_m3;
    QuoteModule::new(
        ids::PACKING_SERVICE,
        82,
        "Crew packs and unpacks the household",
        move |mut ctx| {
            const ID: &str = ids::PACKING_SERVICE;

            let Some(volume) = adjusted_volume(&ctx) else {
                return Ok(ctx);
            };
            let price = volume * config.options.packing_per_m3;

            if ctx.wants_packing() {
                ctx.computed.add_cost(
                    CostEntry::new(ID, CostCategory::Service, "Packing service", price)
                        .with_meta("volumeM3", volume),
                );
                ctx.computed.add_requirement(
                    ID,
                    RequirementKind::Preparation,
                    "Packing crew on site the day before loading",
                    true,
                );
            } else {
                ctx.computed
                    .add_cross_sell(ID, "PACKING_SERVICE", "Full packing by our crew", price);
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ADJUSTMENT])
    .when(move |ctx| ctx.wants_packing() || volume_at_least(ctx, proposal_min))
}

pub fn piano_transport(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::PIANO_TRANSPORT,
        83,
        "Piano handling, priced per floor climbed on foot",
        move |mut ctx| {
            const ID: &str = ids::PIANO_TRANSPORT;
            let options = &config.options;

            let floors: u32 = ctx.sites().iter().map(|(_, site)| site.floors_on_foot()).sum();
            let price = options.piano_flat + floors as f64 * options.piano_per_floor;

            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Service, "Piano transport", price)
                    .with_meta("floorsOnFoot", floors),
            );
            ctx.computed.add_requirement(
                ID,
                RequirementKind::Equipment,
                "Piano board and lifting straps",
                true,
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::WORKFORCE_SIZING])
    .when(|ctx| ctx.has_piano())
}

pub fn bulky_furniture_handling(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::BULKY_FURNITURE_HANDLING,
        84,
        "Handling fee for oversized furniture",
        move |mut ctx| {
            const ID: &str = ids::BULKY_FURNITURE_HANDLING;

            ctx.computed.add_cost(CostEntry::new(
                ID,
                CostCategory::Service,
                "Bulky furniture handling",
                config.options.bulky_handling,
            ));
            ctx.computed.add_requirement(
                ID,
                RequirementKind::Equipment,
                "Moving blankets and dolly for oversized items",
                true,
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::BULKY_FURNITURE_VOLUME])
    .when(|ctx| ctx.has_bulky_furniture())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{costs_from, order, run};
    use super::*;
    use crate::core::engine::StepStatus;

    #[test]
    fn test_unrequested_options_become_proposals() {
        let result = run(order());
        let computed = result.computed();

        let proposals: Vec<(&str, f64)> = computed
            .cross_sell_proposals()
            .iter()
            .map(|p| (p.service.as_str(), p.estimated_price))
            .collect();
        assert_eq!(
            proposals,
            vec![
                ("REASSEMBLY", 132.0),
                ("PACKING_SUPPLIES", 82.5),
                ("PACKING_SERVICE", 396.0),
            ]
        );
        assert_eq!(costs_from(&result, ids::REASSEMBLY), 0.0);
    }

    #[test]
    fn test_requested_options_are_billed() {
        let mut ctx = order();
        ctx.reassembly = Some(true);
        ctx.force_supplies = Some(true);
        ctx.packing_service = Some(true);

        let result = run(ctx);
        assert_eq!(costs_from(&result, ids::REASSEMBLY), 132.0);
        assert_eq!(costs_from(&result, ids::PACKING_SUPPLIES), 82.5);
        assert_eq!(costs_from(&result, ids::PACKING_SERVICE), 396.0);
        assert!(result.computed().cross_sell_proposals().is_empty());
    }

    #[test]
    fn test_small_volume_gets_no_proposals() {
        let mut ctx = order();
        ctx.volume = Some(10.0);

        let result = run(ctx);
        assert_eq!(result.step(ids::REASSEMBLY), Some(&StepStatus::NotApplicable));
        assert_eq!(result.step(ids::PACKING_SERVICE), Some(&StepStatus::NotApplicable));
        assert_eq!(result.computed().cross_sell_proposals().len(), 1);
    }

    #[test]
    fn test_piano_priced_per_floor_on_foot() {
        let mut ctx = order();
        ctx.piano = Some(true);
        ctx.pickup.floor = Some(2);
        ctx.delivery.floor = Some(3);
        ctx.delivery.has_elevator = Some(true);

        let result = run(ctx);
        assert_eq!(costs_from(&result, ids::PIANO_TRANSPORT), 240.0);
    }

    #[test]
    fn test_bulky_handling_follows_bulky_volume() {
        let mut ctx = order();
        ctx.bulky_furniture = Some(true);

        let result = run(ctx);
        assert_eq!(costs_from(&result, ids::BULKY_FURNITURE_HANDLING), 60.0);
        assert!(result.computed().is_activated(ids::BULKY_FURNITURE_VOLUME));
    }
}
