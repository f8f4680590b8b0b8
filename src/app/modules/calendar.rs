use super::{days_until_move, ids};
use crate::config::pricing::PricingConfig;
use crate::core::accumulator::{keys, CostCategory, CostEntry};
use crate::core::module::QuoteModule;
use std::sync::Arc;

pub fn modules(config: &Arc<PricingConfig>) -> Vec<QuoteModule> {
    vec![
        weekend_surcharge(config.clone()),
        high_season_surcharge(config.clone()),
        short_notice_surcharge(config.clone()),
        flexible_date_discount(config.clone()),
    ]
}

pub fn weekend_surcharge(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::WEEKEND_SURCHARGE,
        50,
        "Weekend rate on the labor lines",
        move |mut ctx| {
            const ID: &str = ids::WEEKEND_SURCHARGE;
            let rate = config.calendar.weekend_rate;

            let labor = ctx.computed.total_for(&[CostCategory::Labor]);
            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Surcharge, "Weekend surcharge", labor * rate)
                    .with_meta("rate", rate)
                    .with_meta("base", labor),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::DATE_VALIDATION, ids::BASE_LABOR])
    .when(|ctx| ctx.computed.metadata_bool(keys::IS_WEEKEND).unwrap_or(false))
}

pub fn high_season_surcharge(config: Arc<PricingConfig>) -> QuoteModule {
    let months = config.calendar.high_season_months.clone();
    QuoteModule::new(
        ids::HIGH_SEASON_SURCHARGE,
        51,
        "Summer season rate on crew and trucks",
        move |mut ctx| {
            const ID: &str = ids::HIGH_SEASON_SURCHARGE;
            let rate = config.calendar.high_season_rate;

            let base = ctx
                .computed
                .total_for(&[CostCategory::Labor, CostCategory::Vehicle]);
            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Surcharge, "High season surcharge", base * rate)
                    .with_meta("rate", rate)
                    .with_meta("base", base),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::DATE_VALIDATION, ids::BASE_LABOR])
    .when(move |ctx| {
        ctx.computed
            .metadata_u64(keys::MOVING_MONTH)
            .map(|m| months.contains(&(m as u32)))
            .unwrap_or(false)
    })
}

/// Rate applies to the whole subtotal accumulated so far, not only labor.
pub fn short_notice_surcharge(config: Arc<PricingConfig>) -> QuoteModule {
    let notice_days = config.calendar.short_notice_days;
    QuoteModule::new(
        ids::SHORT_NOTICE_SURCHARGE,
        52,
        "Surcharge for moves booked less than a week ahead",
        move |mut ctx| {
            const ID: &str = ids::SHORT_NOTICE_SURCHARGE;
            let rate = config.calendar.short_notice_rate;

            let days = days_until_move(&ctx).unwrap_or(0);
            let subtotal = ctx.computed.total_cost();
            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Surcharge, "Short notice surcharge", subtotal * rate)
                    .with_meta("rate", rate)
                    .with_meta("base", subtotal)
                    .with_meta("daysUntilMove", days),
            );
            ctx.computed.add_flag(
                ID,
                "URGENT_PLANNING",
                format!("Move in {} days: confirm crew availability today", days),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::DATE_VALIDATION])
    .when(move |ctx| {
        days_until_move(ctx)
            .map(|d| d < notice_days)
            .unwrap_or(false)
    })
}

pub fn flexible_date_discount(config: Arc<PricingConfig>) -> QuoteModule {
    let notice_days = config.calendar.short_notice_days;
    QuoteModule::new(
        ids::FLEXIBLE_DATE_DISCOUNT,
        53,
        "Discount when the customer lets us pick the day",
        move |mut ctx| {
            const ID: &str = ids::FLEXIBLE_DATE_DISCOUNT;
            let rate = config.calendar.flexible_discount_rate;

            let labor = ctx.computed.total_for(&[CostCategory::Labor]);
            if labor <= 0.0 {
                return Ok(ctx);
            }
            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Discount, "Flexible date discount", -(labor * rate))
                    .with_meta("rate", rate)
                    .with_meta("base", labor),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::DATE_VALIDATION, ids::BASE_LABOR])
    .when(move |ctx| {
        ctx.has_flexible_dates()
            && days_until_move(ctx)
                .map(|d| d >= notice_days)
                .unwrap_or(false)
    })
}
