//! Phase 6: risk contributions. These modules only score; nothing here is billed.

use super::ids;
use crate::config::pricing::PricingConfig;
use crate::core::accumulator::{keys, RiskContribution};
use crate::core::module::QuoteModule;
use crate::domain::model::{QuoteContext, Site, VolumeConfidence};
use std::sync::Arc;

pub fn modules(config: &Arc<PricingConfig>) -> Vec<QuoteModule> {
    vec![
        volume_uncertainty_risk(config.clone()),
        access_risk(config.clone()),
        declared_value_risk(config.clone()),
    ]
}

pub fn volume_uncertainty_risk(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::VOLUME_UNCERTAINTY_RISK,
        60,
        "Scores how far the real volume may drift from the estimate",
        move |mut ctx| {
            const ID: &str = ids::VOLUME_UNCERTAINTY_RISK;
            let rates = &config.risk;

            // drift is the confidence margin alone; later volume additions are not uncertainty
            let margin_adjusted = ctx
                .computed
                .adjustments()
                .iter()
                .find(|a| a.module_id == ids::VOLUME_ADJUSTMENT && a.field == keys::ADJUSTED_VOLUME)
                .map(|a| a.to);
            let (Some(base), Some(adjusted)) =
                (ctx.computed.metadata_f64(keys::BASE_VOLUME), margin_adjusted)
            else {
                return Ok(ctx);
            };
            if base <= 0.0 {
                return Ok(ctx);
            }

            let confidence = ctx
                .computed
                .metadata_str(keys::VOLUME_CONFIDENCE)
                .and_then(VolumeConfidence::parse)
                .unwrap_or(VolumeConfidence::Medium);
            let mut score = match confidence {
                VolumeConfidence::Low => rates.volume_base_low,
                VolumeConfidence::Medium => rates.volume_base_medium,
                VolumeConfidence::High => rates.volume_base_high,
            };
            let drift = (adjusted - base).abs() / base;
            if drift >= rates.volume_diff_threshold {
                score += rates.volume_diff_penalty;
            }
            let score = score.min(rates.volume_cap);

            ctx.computed.add_risk(
                RiskContribution::new(
                    ID,
                    score,
                    format!("{} volume confidence", confidence.as_str()),
                )
                .with_meta("drift", super::round2(drift)),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ADJUSTMENT])
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AccessHazard {
    HighFloor,
    LongCarry,
}

fn access_hazards(site: &Site, config: &PricingConfig) -> Vec<AccessHazard> {
    let mut hazards = Vec::new();
    if site.floor() > config.risk.access_floor_threshold
        && !site.has_elevator()
        && !site.has_furniture_lift()
    {
        hazards.push(AccessHazard::HighFloor);
    }
    if site.carry_distance_m() > config.risk.carry_risk_distance_m {
        hazards.push(AccessHazard::LongCarry);
    }
    hazards
}

fn has_access_hazard(ctx: &QuoteContext, config: &PricingConfig) -> bool {
    ctx.sites()
        .iter()
        .any(|(_, site)| !access_hazards(site, config).is_empty())
}

pub fn access_risk(config: Arc<PricingConfig>) -> QuoteModule {
    let gate = config.clone();
    QuoteModule::new(
        ids::ACCESS_RISK,
        61,
        "Scores breakage risk from stairs and long carries",
        move |mut ctx| {
            const ID: &str = ids::ACCESS_RISK;
            let rates = &config.risk;

            let mut contributions = Vec::new();
            for (name, site) in ctx.sites() {
                for hazard in access_hazards(site, &config) {
                    let contribution = match hazard {
                        AccessHazard::HighFloor => RiskContribution::new(
                            ID,
                            rates.access_risk_per_site,
                            format!("{} on floor {} without elevator", name, site.floor()),
                        ),
                        AccessHazard::LongCarry => RiskContribution::new(
                            ID,
                            rates.carry_risk,
                            format!("{} carry of {} m", name, site.carry_distance_m()),
                        ),
                    };
                    contributions.push(contribution.with_meta("site", name));
                }
            }

            for contribution in contributions {
                ctx.computed.add_risk(contribution);
            }
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::MANDATORY_FIELDS])
    .when(move |ctx| has_access_hazard(ctx, &gate))
}

pub fn declared_value_risk(config: Arc<PricingConfig>) -> QuoteModule {
    let threshold = config.risk.declared_value_medium;
    QuoteModule::new(
        ids::DECLARED_VALUE_RISK,
        62,
        "Scores high declared values",
        move |mut ctx| {
            const ID: &str = ids::DECLARED_VALUE_RISK;
            let rates = &config.risk;

            let value = ctx.declared_value.unwrap_or(0.0);
            let score = if value > rates.declared_value_high {
                rates.declared_value_high_risk
            } else {
                rates.declared_value_medium_risk
            };

            ctx.computed.add_risk(
                RiskContribution::new(ID, score, format!("declared value of {:.0} €", value))
                    .with_meta("declaredValue", value),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .when(move |ctx| ctx.declared_value.map(|v| v > threshold).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{order, run};
    use super::*;
    use crate::core::engine::StepStatus;

    fn risk_from(result: &crate::core::engine::BaseCostResult, module_id: &str) -> f64 {
        result
            .computed()
            .risk_contributions()
            .iter()
            .filter(|r| r.module_id == module_id)
            .map(|r| r.amount)
            .sum()
    }

    #[test]
    fn test_medium_confidence_without_drift() {
        // 30 -> 33 m³ is a 10 % drift, below the 15 % threshold
        let result = run(order());
        assert_eq!(risk_from(&result, ids::VOLUME_UNCERTAINTY_RISK), 8.0);
    }

    #[test]
    fn test_bulky_furniture_is_not_counted_as_drift() {
        // 30 -> 33 m³ margin, then +3 m³ reserved for bulky items: drift stays 10 %
        let mut ctx = order();
        ctx.bulky_furniture = Some(true);

        let result = run(ctx);
        assert_eq!(result.computed().metadata_f64(keys::ADJUSTED_VOLUME), Some(36.0));
        assert_eq!(risk_from(&result, ids::VOLUME_UNCERTAINTY_RISK), 8.0);
        let contribution = result
            .computed()
            .risk_contributions()
            .iter()
            .find(|r| r.module_id == ids::VOLUME_UNCERTAINTY_RISK)
            .unwrap();
        assert_eq!(contribution.metadata.get("drift"), Some(&serde_json::json!(0.1)));
    }

    #[test]
    fn test_room_estimate_adds_drift_penalty() {
        let mut ctx = order();
        ctx.volume = None;
        ctx.rooms = Some(3);

        // LOW 15 + 10 for the 15 % margin
        let result = run(ctx);
        assert_eq!(risk_from(&result, ids::VOLUME_UNCERTAINTY_RISK), 25.0);
    }

    #[test]
    fn test_volume_risk_is_capped() {
        let mut config = PricingConfig::default();
        config.risk.volume_base_low = 28.0;
        let mut ctx = order();
        ctx.volume_confidence = Some(VolumeConfidence::Low);
        ctx.bulky_furniture = Some(true);

        let result = super::super::testing::run_with(&config, ctx);
        assert_eq!(risk_from(&result, ids::VOLUME_UNCERTAINTY_RISK), 30.0);
    }

    #[test]
    fn test_access_risk_per_hazard() {
        let mut ctx = order();
        ctx.pickup.floor = Some(5);
        ctx.delivery.carry_distance_m = Some(45.0);

        let result = run(ctx);
        let contributions: Vec<_> = result
            .computed()
            .risk_contributions()
            .iter()
            .filter(|r| r.module_id == ids::ACCESS_RISK)
            .collect();
        assert_eq!(contributions.len(), 2);
        assert_eq!(risk_from(&result, ids::ACCESS_RISK), 10.0);
    }

    #[test]
    fn test_access_risk_ignores_served_floors() {
        let mut ctx = order();
        ctx.pickup.floor = Some(6);
        ctx.pickup.has_elevator = Some(true);
        ctx.delivery.floor = Some(3);

        let result = run(ctx);
        assert_eq!(result.step(ids::ACCESS_RISK), Some(&StepStatus::NotApplicable));
    }

    #[test]
    fn test_declared_value_tiers() {
        let mut ctx = order();
        ctx.declared_value = Some(15_000.0);
        assert_eq!(risk_from(&run(ctx), ids::DECLARED_VALUE_RISK), 0.0);

        let mut ctx = order();
        ctx.declared_value = Some(30_000.0);
        assert_eq!(risk_from(&run(ctx), ids::DECLARED_VALUE_RISK), 5.0);

        let mut ctx = order();
        ctx.declared_value = Some(80_000.0);
        assert_eq!(risk_from(&run(ctx), ids::DECLARED_VALUE_RISK), 10.0);
    }
}
