//! Default catalog of pricing modules, grouped by phase.
//!
//! | Phase | Priorities | File |
//! |-------|-----------|------|
//! | 1 validation | 10-19 | `validation.rs` |
//! | 2 volume | 20-29 | `volume.rs` |
//! | 3 transport | 30-39 | `transport.rs` |
//! | 4 labor & access | 40-49 | `labor.rs` |
//! | 5 calendar | 50-59 | `calendar.rs` |
//! | 6 risk | 60-69 | `risk.rs` |
//! | 7 insurance & legal | 70-79 | `legal.rs` |
//! | 8 cross-sell options | 80-89 | `options.rs` |
//! | 9 finalization | 90-99 | `finalization.rs` |

pub mod calendar;
pub mod finalization;
pub mod labor;
pub mod legal;
pub mod options;
pub mod risk;
pub mod transport;
pub mod validation;
pub mod volume;

use crate::config::pricing::PricingConfig;
use crate::core::accumulator::keys;
use crate::core::module::QuoteModule;
use crate::domain::model::QuoteContext;
use std::sync::Arc;

pub mod ids {
    pub const INPUT_SANITIZATION: &str = "input-sanitization";
    pub const DATE_VALIDATION: &str = "date-validation";
    pub const MANDATORY_FIELDS: &str = "mandatory-fields";

    pub const VOLUME_ESTIMATION: &str = "volume-estimation";
    pub const VOLUME_ADJUSTMENT: &str = "volume-adjustment";
    pub const BULKY_FURNITURE_VOLUME: &str = "bulky-furniture-volume";

    pub const DISTANCE_RESOLUTION: &str = "distance-resolution";
    pub const VEHICLE_SELECTION: &str = "vehicle-selection";
    pub const FUEL_COST: &str = "fuel-cost";
    pub const LONG_DISTANCE_SURCHARGE: &str = "long-distance-surcharge";

    pub const WORKFORCE_SIZING: &str = "workforce-sizing";
    pub const BASE_LABOR: &str = "base-labor";
    pub const PICKUP_ACCESS_PENALTY: &str = "pickup-access-penalty";
    pub const DELIVERY_ACCESS_PENALTY: &str = "delivery-access-penalty";
    pub const CARRY_DISTANCE: &str = "carry-distance";
    pub const FURNITURE_LIFT: &str = "furniture-lift";
    pub const OVERNIGHT_STAY: &str = "overnight-stay";

    pub const WEEKEND_SURCHARGE: &str = "weekend-surcharge";
    pub const HIGH_SEASON_SURCHARGE: &str = "high-season-surcharge";
    pub const SHORT_NOTICE_SURCHARGE: &str = "short-notice-surcharge";
    pub const FLEXIBLE_DATE_DISCOUNT: &str = "flexible-date-discount";

    pub const VOLUME_UNCERTAINTY_RISK: &str = "volume-uncertainty-risk";
    pub const ACCESS_RISK: &str = "access-risk";
    pub const DECLARED_VALUE_RISK: &str = "declared-value-risk";

    pub const INSURANCE_PREMIUM: &str = "insurance-premium";
    pub const HIGH_VALUE_DECLARATION: &str = "high-value-declaration";
    pub const PARKING_AUTHORIZATION: &str = "parking-authorization";

    pub const REASSEMBLY: &str = "reassembly";
    pub const PACKING_SUPPLIES: &str = "packing-supplies";
    pub const PACKING_SERVICE: &str = "packing-service";
    pub const PIANO_TRANSPORT: &str = "piano-transport";
    pub const BULKY_FURNITURE_HANDLING: &str = "bulky-furniture-handling";

    pub const RISK_SCORE_AGGREGATION: &str = "risk-score-aggregation";
    pub const COMMERCIAL_MARGIN: &str = "commercial-margin";
    pub const MINIMUM_PRICE: &str = "minimum-price";
    pub const QUOTE_SUMMARY: &str = "quote-summary";
}

/// Every default module, in registration order. The registry sorts them by priority.
pub fn catalog(config: &PricingConfig) -> Vec<QuoteModule> {
    let config = Arc::new(config.clone());

    let mut modules = Vec::new();
    modules.extend(validation::modules());
    modules.extend(volume::modules(&config));
    modules.extend(transport::modules(&config));
    modules.extend(labor::modules(&config));
    modules.extend(calendar::modules(&config));
    modules.extend(risk::modules(&config));
    modules.extend(legal::modules(&config));
    modules.extend(options::modules(&config));
    modules.extend(finalization::modules(&config));
    modules
}

/// Volumes and ratios, kept to two decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn adjusted_volume(ctx: &QuoteContext) -> Option<f64> {
    ctx.computed
        .metadata_f64(keys::ADJUSTED_VOLUME)
        .filter(|v| *v > 0.0)
}

pub(crate) fn days_until_move(ctx: &QuoteContext) -> Option<i64> {
    ctx.computed.metadata_i64(keys::DAYS_UNTIL_MOVE)
}
