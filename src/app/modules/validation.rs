//! Phase 1: input normalization and validation.
//!
//! These are the only modules allowed to fail: a bad order aborts the whole
//! computation before any price is produced.

use super::ids;
use crate::core::accumulator::keys;
use crate::core::module::QuoteModule;
use crate::domain::model::{QuoteContext, ServiceType, Site};
use crate::utils::error::{QuoteError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};

const LOWEST_FLOOR: i32 = -5;

pub fn modules() -> Vec<QuoteModule> {
    vec![input_sanitization(), date_validation(), mandatory_fields()]
}

pub fn input_sanitization() -> QuoteModule {
    QuoteModule::new(
        ids::INPUT_SANITIZATION,
        10,
        "Trims free-text fields and rejects negative quantities",
        |mut ctx| {
            const ID: &str = ids::INPUT_SANITIZATION;

            for (name, site) in [("pickup", &mut ctx.pickup), ("delivery", &mut ctx.delivery)] {
                sanitize_site(name, site)?;
            }

            check_quantity(ctx.volume, "volume")?;
            check_quantity(ctx.declared_value, "declaredValue")?;
            check_quantity(ctx.distance_km, "distanceKm")?;

            ctx.selected_scenario = ctx
                .selected_scenario
                .take()
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty());

            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
}

fn sanitize_site(name: &str, site: &mut Site) -> Result<()> {
    site.address = site
        .address
        .take()
        .map(|a| a.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|a| !a.is_empty());
    site.postal_code = site
        .postal_code
        .take()
        .map(|p| p.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|p| !p.is_empty());

    if site.floor() < LOWEST_FLOOR {
        return Err(QuoteError::fatal_input(
            ids::INPUT_SANITIZATION,
            &format!("{}.floor", name),
            format!("floor {} is below {}", site.floor(), LOWEST_FLOOR),
        ));
    }
    check_quantity(site.carry_distance_m, &format!("{}.carryDistanceM", name))
}

fn check_quantity(value: Option<f64>, field: &str) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(QuoteError::fatal_input(
            ids::INPUT_SANITIZATION,
            field,
            format!("{} must be a positive number", v),
        )),
        _ => Ok(()),
    }
}

pub fn date_validation() -> QuoteModule {
    QuoteModule::new(
        ids::DATE_VALIDATION,
        11,
        "Parses the moving date and rejects missing or past dates",
        |mut ctx| {
            const ID: &str = ids::DATE_VALIDATION;

            let raw = ctx
                .moving_date
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| QuoteError::fatal_input(ID, "movingDate", "moving date is required"))?;

            let date = parse_moving_date(raw).ok_or_else(|| {
                QuoteError::fatal_input(ID, "movingDate", format!("'{}' is not a valid date", raw))
            })?;

            let today = ctx
                .reference_date
                .unwrap_or_else(|| Utc::now().date_naive());
            let days_until = (date - today).num_days();
            if days_until < 0 {
                return Err(QuoteError::fatal_input(
                    ID,
                    "movingDate",
                    format!("{} is in the past", date),
                ));
            }

            let weekday = date.weekday();
            let computed = &mut ctx.computed;
            computed.set_metadata(keys::MOVING_DATE, date.format("%Y-%m-%d").to_string());
            computed.set_metadata(keys::DAYS_UNTIL_MOVE, days_until);
            computed.set_metadata(keys::MOVING_WEEKDAY, weekday.to_string());
            computed.set_metadata(
                keys::IS_WEEKEND,
                matches!(weekday, Weekday::Sat | Weekday::Sun),
            );
            computed.set_metadata(keys::MOVING_MONTH, date.month());
            computed.activate(ID);
            Ok(ctx)
        },
    )
}

/// Accepts `YYYY-MM-DD`, `DD/MM/YYYY` and RFC 3339 timestamps.
pub fn parse_moving_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}

pub fn mandatory_fields() -> QuoteModule {
    QuoteModule::new(
        ids::MANDATORY_FIELDS,
        12,
        "Checks the fields every order must carry",
        |mut ctx| {
            const ID: &str = ids::MANDATORY_FIELDS;

            let service = ctx
                .service_type
                .ok_or_else(|| QuoteError::fatal_input(ID, "serviceType", "service type is required"))?;

            if !ctx.pickup.has_address() {
                return Err(QuoteError::fatal_input(ID, "pickup.address", "pickup address is required"));
            }
            if service.transports_goods() && !ctx.delivery.has_address() {
                return Err(QuoteError::fatal_input(
                    ID,
                    "delivery.address",
                    "delivery address is required for this service",
                ));
            }
            if service == ServiceType::Moving && !has_volume_input(&ctx) {
                return Err(QuoteError::fatal_input(
                    ID,
                    "volume",
                    "a volume or a number of rooms is required to quote a move",
                ));
            }

            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::INPUT_SANITIZATION])
}

fn has_volume_input(ctx: &QuoteContext) -> bool {
    ctx.volume.map(|v| v > 0.0).unwrap_or(false) || ctx.rooms.is_some()
}
