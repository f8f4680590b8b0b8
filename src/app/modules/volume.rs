use super::{ids, round2};
use crate::config::pricing::PricingConfig;
use crate::core::accumulator::keys;
use crate::core::module::QuoteModule;
use crate::domain::model::VolumeConfidence;
use std::sync::Arc;

const SOURCE_DECLARED: &str = "declared";
const SOURCE_ROOMS: &str = "rooms";

pub fn modules(config: &Arc<PricingConfig>) -> Vec<QuoteModule> {
    vec![
        volume_estimation(config.clone()),
        volume_adjustment(config.clone()),
        bulky_furniture_volume(config.clone()),
    ]
}

/// Base volume: the declared volume when there is one, otherwise a room-count estimate.
pub fn volume_estimation(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::VOLUME_ESTIMATION,
        20,
        "Establishes the base volume from the declared volume or the room count",
        move |mut ctx| {
            const ID: &str = ids::VOLUME_ESTIMATION;
            let rates = &config.volume;

            let (base, source) = match (ctx.volume, ctx.rooms) {
                (Some(v), _) if v > 0.0 => (v, SOURCE_DECLARED),
                (_, Some(rooms)) => (
                    rates.studio_base_m3 + rooms as f64 * rates.per_room_m3,
                    SOURCE_ROOMS,
                ),
                _ => return Ok(ctx),
            };

            ctx.computed.set_metadata(keys::BASE_VOLUME, round2(base));
            ctx.computed.set_metadata(keys::VOLUME_SOURCE, source);
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::MANDATORY_FIELDS])
    .when(|ctx| ctx.volume.is_some() || ctx.rooms.is_some())
}

/// Adds a safety margin that shrinks as the customer's estimate gets more reliable.
pub fn volume_adjustment(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::VOLUME_ADJUSTMENT,
        21,
        "Applies the confidence margin to the base volume",
        move |mut ctx| {
            const ID: &str = ids::VOLUME_ADJUSTMENT;
            let rates = &config.volume;

            let Some(base) = ctx.computed.metadata_f64(keys::BASE_VOLUME) else {
                return Ok(ctx);
            };

            // room counts are a rough proxy whatever the customer claims
            let confidence = if ctx.computed.metadata_str(keys::VOLUME_SOURCE) == Some(SOURCE_ROOMS) {
                VolumeConfidence::Low
            } else {
                ctx.volume_confidence.unwrap_or(VolumeConfidence::Medium)
            };
            let margin = match confidence {
                VolumeConfidence::Low => rates.margin_low,
                VolumeConfidence::Medium => rates.margin_medium,
                VolumeConfidence::High => rates.margin_high,
            };
            let adjusted = round2(base * (1.0 + margin));

            let computed = &mut ctx.computed;
            computed.set_metadata(keys::ADJUSTED_VOLUME, adjusted);
            computed.set_metadata(keys::VOLUME_CONFIDENCE, confidence.as_str());
            computed.add_adjustment(
                ID,
                keys::ADJUSTED_VOLUME,
                base,
                adjusted,
                format!("{} confidence margin of {:.0}%", confidence.as_str(), margin * 100.0),
            );
            computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ESTIMATION])
}

pub fn bulky_furniture_volume(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::BULKY_FURNITURE_VOLUME,
        22,
        "Reserves extra truck space for bulky furniture",
        move |mut ctx| {
            const ID: &str = ids::BULKY_FURNITURE_VOLUME;

            let Some(current) = ctx.computed.metadata_f64(keys::ADJUSTED_VOLUME) else {
                return Ok(ctx);
            };
            let adjusted = round2(current + config.volume.bulky_extra_m3);

            ctx.computed.set_metadata(keys::ADJUSTED_VOLUME, adjusted);
            ctx.computed
                .add_adjustment(ID, keys::ADJUSTED_VOLUME, current, adjusted, "bulky furniture");
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ADJUSTMENT])
    .when(|ctx| ctx.has_bulky_furniture())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{order, run};
    use super::*;
    use crate::core::engine::StepStatus;

    #[test]
    fn test_declared_volume_with_medium_confidence() {
        let result = run(order());
        let computed = result.computed();

        assert_eq!(computed.metadata_f64(keys::BASE_VOLUME), Some(30.0));
        assert_eq!(computed.metadata_str(keys::VOLUME_SOURCE), Some("declared"));
        assert_eq!(computed.metadata_f64(keys::ADJUSTED_VOLUME), Some(33.0));
        assert_eq!(computed.metadata_str(keys::VOLUME_CONFIDENCE), Some("MEDIUM"));

        let adjustment = &computed.adjustments()[0];
        assert_eq!(adjustment.module_id, ids::VOLUME_ADJUSTMENT);
        assert_eq!((adjustment.from, adjustment.to), (30.0, 33.0));
    }

    #[test]
    fn test_room_estimate_is_low_confidence() {
        let mut ctx = order();
        ctx.volume = None;
        ctx.rooms = Some(3);
        ctx.volume_confidence = Some(VolumeConfidence::High);

        let result = run(ctx);
        let computed = result.computed();
        assert_eq!(computed.metadata_f64(keys::BASE_VOLUME), Some(35.0));
        assert_eq!(computed.metadata_str(keys::VOLUME_CONFIDENCE), Some("LOW"));
        assert_eq!(computed.metadata_f64(keys::ADJUSTED_VOLUME), Some(40.25));
    }

    #[test]
    fn test_bulky_furniture_adds_space() {
        let mut ctx = order();
        ctx.bulky_furniture = Some(true);

        let result = run(ctx);
        assert_eq!(result.computed().metadata_f64(keys::ADJUSTED_VOLUME), Some(36.0));
        assert_eq!(result.computed().adjustments().len(), 2);
    }

    #[test]
    fn test_bulky_volume_skipped_without_flag() {
        let result = run(order());
        assert_eq!(
            result.step(ids::BULKY_FURNITURE_VOLUME),
            Some(&StepStatus::NotApplicable)
        );
    }
}
