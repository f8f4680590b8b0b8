use super::{adjusted_volume, days_until_move, ids};
use crate::config::pricing::PricingConfig;
use crate::core::accumulator::{CostCategory, CostEntry, RequirementKind, Severity};
use crate::core::module::QuoteModule;
use crate::domain::model::{QuoteContext, Site};
use std::sync::Arc;

pub fn modules(config: &Arc<PricingConfig>) -> Vec<QuoteModule> {
    vec![
        insurance_premium(config.clone()),
        high_value_declaration(config.clone()),
        parking_authorization(config.clone()),
    ]
}

/// Ad valorem premium when the customer declares a value, otherwise the
/// contractual per-m³ coverage is only noted.
pub fn insurance_premium(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::INSURANCE_PREMIUM,
        70,
        "Prices the goods-in-transit insurance",
        move |mut ctx| {
            const ID: &str = ids::INSURANCE_PREMIUM;
            let rates = &config.insurance;

            match ctx.declared_value.filter(|v| *v > 0.0) {
                Some(value) => {
                    let premium = (value * rates.rate).max(rates.minimum_premium);
                    ctx.computed.add_cost(
                        CostEntry::new(ID, CostCategory::Insurance, "Declared value insurance", premium)
                            .with_meta("declaredValue", value)
                            .with_meta("rate", rates.rate),
                    );
                    ctx.computed.add_insurance_note(
                        ID,
                        format!("Goods covered up to the declared {:.0} €", value),
                        Some(value),
                    );
                }
                None => {
                    let Some(volume) = adjusted_volume(&ctx) else {
                        return Ok(ctx);
                    };
                    let coverage = volume * rates.coverage_per_m3;
                    ctx.computed.add_insurance_note(
                        ID,
                        format!(
                            "No declared value: contractual coverage of {:.0} € per m³",
                            rates.coverage_per_m3
                        ),
                        Some(coverage),
                    );
                }
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ADJUSTMENT])
}

pub fn high_value_declaration(config: Arc<PricingConfig>) -> QuoteModule {
    let threshold = config.insurance.high_value_threshold;
    QuoteModule::new(
        ids::HIGH_VALUE_DECLARATION,
        71,
        "Requires an itemized inventory for high declared values",
        move |mut ctx| {
            const ID: &str = ids::HIGH_VALUE_DECLARATION;
            let value = ctx.declared_value.unwrap_or(0.0);

            ctx.computed.add_legal_impact(
                ID,
                Severity::Critical,
                format!(
                    "Declared value of {:.0} € exceeds {:.0} €: signed inventory mandatory",
                    value, threshold
                ),
            );
            ctx.computed.add_requirement(
                ID,
                RequirementKind::Documentation,
                "Itemized inventory signed by the customer before loading",
                true,
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::INSURANCE_PREMIUM])
    .when(move |ctx| ctx.declared_value.map(|v| v > threshold).unwrap_or(false))
}

fn needs_parking_permit(site: &Site, prefixes: &[String]) -> bool {
    site.postal_code
        .as_deref()
        .map(|code| prefixes.iter().any(|p| code.starts_with(p.as_str())))
        .unwrap_or(false)
}

fn permit_sites(ctx: &QuoteContext, prefixes: &[String]) -> Vec<&'static str> {
    ctx.sites()
        .iter()
        .filter(|(_, site)| needs_parking_permit(site, prefixes))
        .map(|(name, _)| *name)
        .collect()
}

pub fn parking_authorization(config: Arc<PricingConfig>) -> QuoteModule {
    let prefixes = config.legal.dense_postal_prefixes.clone();
    QuoteModule::new(
        ids::PARKING_AUTHORIZATION,
        72,
        "Street parking permits in dense city centers",
        move |mut ctx| {
            const ID: &str = ids::PARKING_AUTHORIZATION;
            let legal = &config.legal;

            let sites = permit_sites(&ctx, &legal.dense_postal_prefixes);
            for name in &sites {
                ctx.computed.add_cost(CostEntry::new(
                    ID,
                    CostCategory::Fee,
                    format!("Parking permit at {}", name),
                    legal.parking_authorization_fee,
                ));
                ctx.computed.add_requirement(
                    ID,
                    RequirementKind::Authorization,
                    format!("Municipal parking authorization at {}", name),
                    true,
                );
            }

            if let Some(days) = days_until_move(&ctx).filter(|d| *d < legal.parking_lead_days) {
                ctx.computed.add_legal_impact(
                    ID,
                    Severity::Warning,
                    format!(
                        "Permit requests usually take {} days, only {} left",
                        legal.parking_lead_days, days
                    ),
                );
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::DATE_VALIDATION, ids::VEHICLE_SELECTION])
    .when(move |ctx| !permit_sites(ctx, &prefixes).is_empty())
}
