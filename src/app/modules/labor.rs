use super::{adjusted_volume, ids};
use crate::config::pricing::PricingConfig;
use crate::core::accumulator::{keys, CostCategory, CostEntry, RequirementKind};
use crate::core::module::QuoteModule;
use crate::domain::model::{QuoteContext, Site};
use std::sync::Arc;

pub fn modules(config: &Arc<PricingConfig>) -> Vec<QuoteModule> {
    vec![
        workforce_sizing(config.clone()),
        base_labor(config.clone()),
        access_penalty(ids::PICKUP_ACCESS_PENALTY, 42, "pickup", pickup, config.clone()),
        access_penalty(ids::DELIVERY_ACCESS_PENALTY, 43, "delivery", delivery, config.clone()),
        carry_distance(config.clone()),
        furniture_lift(config.clone()),
        overnight_stay(config.clone()),
    ]
}

fn pickup(ctx: &QuoteContext) -> &Site {
    &ctx.pickup
}

fn delivery(ctx: &QuoteContext) -> &Site {
    &ctx.delivery
}

pub fn workforce_sizing(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::WORKFORCE_SIZING,
        40,
        "Sizes the crew from the adjusted volume",
        move |mut ctx| {
            const ID: &str = ids::WORKFORCE_SIZING;
            let labor = &config.labor;

            let Some(volume) = adjusted_volume(&ctx) else {
                return Ok(ctx);
            };

            let by_volume = (volume / labor.m3_per_worker).ceil() as u32;
            let piano_extra = u32::from(ctx.has_piano());
            let workers =
                (by_volume.max(labor.default_workers) + piano_extra).min(labor.max_workers);

            ctx.computed.set_metadata(keys::WORKERS_COUNT, workers);
            ctx.computed.add_requirement(
                ID,
                RequirementKind::Personnel,
                format!("{} movers", workers),
                true,
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ADJUSTMENT])
}

fn workers(ctx: &QuoteContext, config: &PricingConfig) -> u64 {
    ctx.computed
        .metadata_u64(keys::WORKERS_COUNT)
        .unwrap_or(config.labor.default_workers as u64)
}

pub fn base_labor(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::BASE_LABOR,
        41,
        "Crew hours for loading and unloading",
        move |mut ctx| {
            const ID: &str = ids::BASE_LABOR;
            let labor = &config.labor;

            let Some(volume) = adjusted_volume(&ctx) else {
                return Ok(ctx);
            };
            let crew = workers(&ctx, &config);

            let raw_hours = volume / (crew as f64 * labor.m3_per_worker_hour);
            // billed by the quarter hour
            let hours = ((raw_hours * 4.0).ceil() / 4.0).max(labor.minimum_hours);
            let amount = hours * crew as f64 * labor.hourly_rate;

            ctx.computed.set_metadata(keys::LABOR_HOURS, hours);
            ctx.computed.add_cost(
                CostEntry::new(
                    ID,
                    CostCategory::Labor,
                    format!("{} movers for {} h", crew, hours),
                    amount,
                )
                .with_meta("hours", hours)
                .with_meta("workers", crew)
                .with_meta("hourlyRate", labor.hourly_rate),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::WORKFORCE_SIZING])
}

/// Stairs surcharge for one end of the move: every floor climbed on foot is billed.
pub fn access_penalty(
    id: &'static str,
    priority: u16,
    site_name: &'static str,
    site: fn(&QuoteContext) -> &Site,
    config: Arc<PricingConfig>,
) -> QuoteModule {
    QuoteModule::new(
        id,
        priority,
        "Charges the floors climbed without elevator or furniture lift",
        move |mut ctx| {
            let floors = site(&ctx).floors_on_foot();
            let amount = floors as f64 * config.access.floor_penalty;

            ctx.computed.add_cost(
                CostEntry::new(
                    id,
                    CostCategory::Labor,
                    format!("Stairs at {} ({} floors)", site_name, floors),
                    amount,
                )
                .with_meta("floors", floors)
                .with_meta("perFloor", config.access.floor_penalty),
            );
            ctx.computed.activate(id);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::MANDATORY_FIELDS])
    .when(move |ctx| site(ctx).floors_on_foot() > 0)
}

fn chargeable_carry_steps(site: &Site, config: &PricingConfig) -> u32 {
    let excess = site.carry_distance_m() - config.access.free_carry_distance_m;
    if excess <= 0.0 {
        0
    } else {
        (excess / config.access.carry_step_m).ceil() as u32
    }
}

pub fn carry_distance(config: Arc<PricingConfig>) -> QuoteModule {
    let gate = config.clone();
    QuoteModule::new(
        ids::CARRY_DISTANCE,
        44,
        "Charges long walks between the truck and the door",
        move |mut ctx| {
            const ID: &str = ids::CARRY_DISTANCE;

            let charges: Vec<(&'static str, u32)> = ctx
                .sites()
                .iter()
                .map(|(name, site)| (*name, chargeable_carry_steps(site, &config)))
                .filter(|(_, steps)| *steps > 0)
                .collect();

            for (name, steps) in charges {
                ctx.computed.add_cost(
                    CostEntry::new(
                        ID,
                        CostCategory::Labor,
                        format!("Carry distance at {}", name),
                        steps as f64 * config.access.carry_penalty_per_step,
                    )
                    .with_meta("steps", steps),
                );
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::MANDATORY_FIELDS])
    .when(move |ctx| {
        ctx.sites()
            .iter()
            .any(|(_, site)| chargeable_carry_steps(site, &gate) > 0)
    })
}

pub fn furniture_lift(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::FURNITURE_LIFT,
        45,
        "Rents a furniture lift where the customer asked for one",
        move |mut ctx| {
            const ID: &str = ids::FURNITURE_LIFT;

            let lift_sites: Vec<&'static str> = ctx
                .sites()
                .iter()
                .filter(|(_, site)| site.has_furniture_lift())
                .map(|(name, _)| *name)
                .collect();

            for name in lift_sites {
                ctx.computed.add_cost(CostEntry::new(
                    ID,
                    CostCategory::Equipment,
                    format!("Furniture lift at {}", name),
                    config.access.furniture_lift_cost,
                ));
                ctx.computed.add_requirement(
                    ID,
                    RequirementKind::Equipment,
                    format!("Furniture lift and operator at {}", name),
                    true,
                );
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::MANDATORY_FIELDS])
    .when(|ctx| ctx.sites().iter().any(|(_, site)| site.has_furniture_lift()))
}

pub fn overnight_stay(config: Arc<PricingConfig>) -> QuoteModule {
    let threshold = config.transport.overnight_distance_km;
    QuoteModule::new(
        ids::OVERNIGHT_STAY,
        46,
        "Accommodation allowance when the crew cannot return the same day",
        move |mut ctx| {
            const ID: &str = ids::OVERNIGHT_STAY;

            let crew = workers(&ctx, &config);
            let amount = crew as f64 * config.labor.overnight_allowance_per_worker;

            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Labor, "Crew overnight allowance", amount)
                    .with_meta("workers", crew),
            );
            ctx.computed.add_flag(
                ID,
                "OVERNIGHT_STAY",
                "Two-day job: book crew accommodation",
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::DISTANCE_RESOLUTION, ids::WORKFORCE_SIZING])
    .when(move |ctx| {
        ctx.computed
            .metadata_f64(keys::DISTANCE_KM)
            .map(|d| d > threshold)
            .unwrap_or(false)
    })
}
