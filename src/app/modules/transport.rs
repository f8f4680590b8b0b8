use super::{adjusted_volume, ids, round2};
use crate::config::pricing::{PricingConfig, SurchargeTier, TruckOption};
use crate::core::accumulator::{keys, CostCategory, CostEntry};
use crate::core::module::QuoteModule;
use crate::domain::model::{QuoteContext, ServiceType};
use serde_json::json;
use std::sync::Arc;

const VOLUME_EPSILON: f64 = 1e-6;

pub fn modules(config: &Arc<PricingConfig>) -> Vec<QuoteModule> {
    vec![
        distance_resolution(config.clone()),
        vehicle_selection(config.clone()),
        fuel_cost(config.clone()),
        long_distance_surcharge(config.clone()),
    ]
}

pub fn distance_resolution(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::DISTANCE_RESOLUTION,
        30,
        "Resolves the road distance, falling back to the default distance",
        move |mut ctx| {
            const ID: &str = ids::DISTANCE_RESOLUTION;

            let (distance, source) = match ctx.distance_km {
                Some(d) => (d, "provided"),
                None => {
                    let fallback = config.transport.default_distance_km;
                    ctx.computed.add_flag(
                        ID,
                        "DISTANCE_DEFAULTED",
                        format!("No route distance supplied, assuming {} km", fallback),
                    );
                    (fallback, "default")
                }
            };

            ctx.computed.set_metadata(keys::DISTANCE_KM, distance);
            ctx.computed.set_metadata(keys::DISTANCE_SOURCE, source);
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::MANDATORY_FIELDS])
    .when(moves_goods)
}

fn moves_goods(ctx: &QuoteContext) -> bool {
    ctx.service_type
        .map(ServiceType::transports_goods)
        .unwrap_or(false)
}

/// Identical trucks picked for the job and the volume they carry together.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleAssignment {
    pub truck: TruckOption,
    pub count: u64,
    pub loaded_m3: f64,
}

impl VehicleAssignment {
    pub fn rental_cost(&self) -> f64 {
        self.truck.rental_cost * self.count as f64
    }
}

/// Fills as many of the largest truck as the volume allows, then closes with
/// the smallest truck that holds what is left. At most two assignments come back.
pub fn select_vehicles(volume: f64, fleet: &[TruckOption]) -> Vec<VehicleAssignment> {
    let mut sorted: Vec<&TruckOption> = fleet
        .iter()
        .filter(|t| t.capacity_m3 > VOLUME_EPSILON)
        .collect();
    sorted.sort_by(|a, b| a.capacity_m3.total_cmp(&b.capacity_m3));
    let Some(largest) = sorted.last().copied() else {
        return Vec::new();
    };
    if !volume.is_finite() || volume <= VOLUME_EPSILON {
        return Vec::new();
    }

    let mut assignments = Vec::with_capacity(2);
    let full = (volume / largest.capacity_m3).floor();
    let mut remaining = volume - full * largest.capacity_m3;
    let mut count = full as u64;
    // a sliver left by float error belongs to the last full truck
    if largest.capacity_m3 - remaining <= VOLUME_EPSILON {
        count += 1;
        remaining = 0.0;
    }
    if count > 0 {
        assignments.push(VehicleAssignment {
            truck: largest.clone(),
            count,
            loaded_m3: round2(count as f64 * largest.capacity_m3),
        });
    }
    if remaining > VOLUME_EPSILON {
        let truck = sorted
            .iter()
            .find(|t| t.capacity_m3 >= remaining)
            .copied()
            .unwrap_or(largest);
        assignments.push(VehicleAssignment {
            truck: truck.clone(),
            count: 1,
            loaded_m3: round2(remaining),
        });
    }
    assignments
}

pub fn vehicle_selection(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::VEHICLE_SELECTION,
        31,
        "Chooses the trucks needed for the adjusted volume",
        move |mut ctx| {
            const ID: &str = ids::VEHICLE_SELECTION;

            let Some(volume) = adjusted_volume(&ctx) else {
                return Ok(ctx);
            };
            let assignments = select_vehicles(volume, &config.transport.trucks);
            if assignments.is_empty() {
                return Ok(ctx);
            }

            let computed = &mut ctx.computed;
            for assignment in &assignments {
                let label = match assignment.count {
                    1 => format!("{} rental", assignment.truck.label),
                    n => format!("{} rental x{}", assignment.truck.label, n),
                };
                computed.add_cost(
                    CostEntry::new(ID, CostCategory::Vehicle, label, assignment.rental_cost())
                        .with_meta("count", assignment.count)
                        .with_meta("capacityM3", assignment.truck.capacity_m3)
                        .with_meta("loadedM3", assignment.loaded_m3),
                );
            }
            let vehicle_count: u64 = assignments.iter().map(|a| a.count).sum();
            let fleet: Vec<serde_json::Value> = assignments
                .iter()
                .map(|a| json!({"label": a.truck.label, "count": a.count}))
                .collect();
            computed.set_metadata(keys::VEHICLE_COUNT, vehicle_count);
            computed.set_metadata(keys::VEHICLES, fleet);
            computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::VOLUME_ADJUSTMENT])
    .when(moves_goods)
}

pub fn fuel_cost(config: Arc<PricingConfig>) -> QuoteModule {
    QuoteModule::new(
        ids::FUEL_COST,
        32,
        "Charges fuel for every truck over the road distance",
        move |mut ctx| {
            const ID: &str = ids::FUEL_COST;

            let distance = ctx.computed.metadata_f64(keys::DISTANCE_KM).unwrap_or(0.0);
            let vehicles = ctx.computed.metadata_u64(keys::VEHICLE_COUNT).unwrap_or(0);
            if distance <= 0.0 || vehicles == 0 {
                return Ok(ctx);
            }

            let amount = distance * config.transport.fuel_cost_per_km * vehicles as f64;
            ctx.computed.add_cost(
                CostEntry::new(ID, CostCategory::Transport, "Fuel", amount)
                    .with_meta("distanceKm", distance)
                    .with_meta("vehicles", vehicles),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::DISTANCE_RESOLUTION, ids::VEHICLE_SELECTION])
}

/// Bills `excess_km` band by band, each band at its own per-km rate.
pub fn progressive_surcharge(excess_km: f64, tiers: &[SurchargeTier]) -> Vec<(f64, f64)> {
    let mut remaining = excess_km;
    let mut bands = Vec::new();
    for tier in tiers {
        if remaining <= 0.0 {
            break;
        }
        let billed = match tier.span_km {
            Some(span) => remaining.min(span),
            None => remaining,
        };
        bands.push((billed, tier.rate_per_km));
        remaining -= billed;
    }
    bands
}

pub fn long_distance_surcharge(config: Arc<PricingConfig>) -> QuoteModule {
    let threshold = config.transport.long_distance_threshold_km;
    QuoteModule::new(
        ids::LONG_DISTANCE_SURCHARGE,
        33,
        "Progressive per-km surcharge beyond the local radius",
        move |mut ctx| {
            const ID: &str = ids::LONG_DISTANCE_SURCHARGE;
            let transport = &config.transport;

            let distance = ctx.computed.metadata_f64(keys::DISTANCE_KM).unwrap_or(0.0);
            let excess = distance - transport.long_distance_threshold_km;
            let bands = progressive_surcharge(excess, &transport.surcharge_tiers);
            if bands.is_empty() {
                return Ok(ctx);
            }

            let amount: f64 = bands.iter().map(|(km, rate)| km * rate).sum();
            let detail: Vec<serde_json::Value> = bands
                .iter()
                .map(|(km, rate)| json!({"km": km, "ratePerKm": rate}))
                .collect();
            ctx.computed.add_cost(
                CostEntry::new(
                    ID,
                    CostCategory::Transport,
                    format!("Long distance surcharge ({:.0} km beyond {:.0} km)", excess, transport.long_distance_threshold_km),
                    amount,
                )
                .with_meta("excessKm", excess)
                .with_meta("bands", detail),
            );
            ctx.computed.activate(ID);
            Ok(ctx)
        },
    )
    .depends_on(&[ids::DISTANCE_RESOLUTION])
    .when(move |ctx| {
        ctx.computed
            .metadata_f64(keys::DISTANCE_KM)
            .map(|d| d > threshold)
            .unwrap_or(false)
    })
}
