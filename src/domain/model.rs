use crate::core::accumulator::ComputedContext;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Moving,
    Delivery,
    PackingOnly,
    Storage,
}

impl ServiceType {
    /// Services that load goods at one address and unload them at another.
    pub fn transports_goods(self) -> bool {
        matches!(self, ServiceType::Moving | ServiceType::Delivery)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeConfidence {
    Low,
    Medium,
    High,
}

impl VolumeConfidence {
    pub fn as_str(self) -> &'static str {
        match self {
            VolumeConfidence::Low => "LOW",
            VolumeConfidence::Medium => "MEDIUM",
            VolumeConfidence::High => "HIGH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(VolumeConfidence::Low),
            "MEDIUM" => Some(VolumeConfidence::Medium),
            "HIGH" => Some(VolumeConfidence::High),
            _ => None,
        }
    }
}

/// One end of the move: where goods are loaded or unloaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Site {
    pub address: Option<String>,
    pub postal_code: Option<String>,
    /// 0 is the ground floor, negative values are basements.
    pub floor: Option<i32>,
    pub has_elevator: Option<bool>,
    /// Distance in metres between the truck and the door.
    pub carry_distance_m: Option<f64>,
    pub furniture_lift: Option<bool>,
}

impl Site {
    pub fn floor(&self) -> i32 {
        self.floor.unwrap_or(0)
    }

    pub fn has_elevator(&self) -> bool {
        self.has_elevator.unwrap_or(false)
    }

    pub fn has_furniture_lift(&self) -> bool {
        self.furniture_lift.unwrap_or(false)
    }

    pub fn carry_distance_m(&self) -> f64 {
        self.carry_distance_m.unwrap_or(0.0)
    }

    /// Floors the crew has to climb on foot with every item.
    pub fn floors_on_foot(&self) -> u32 {
        if self.has_elevator() || self.has_furniture_lift() {
            0
        } else {
            self.floor().max(0) as u32
        }
    }

    pub fn has_address(&self) -> bool {
        self.address
            .as_deref()
            .map(|a| !a.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Input and working record of one price computation.
///
/// Raw order fields are set by the caller; `computed` is filled by the
/// pipeline modules as the context moves through the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteContext {
    pub service_type: Option<ServiceType>,
    pub pickup: Site,
    pub delivery: Site,
    /// Road distance as resolved by the geocoding collaborator.
    pub distance_km: Option<f64>,
    pub volume: Option<f64>,
    pub volume_confidence: Option<VolumeConfidence>,
    pub rooms: Option<u32>,
    pub declared_value: Option<f64>,
    /// Raw date string as submitted; parsed by the date validation module.
    pub moving_date: Option<String>,
    /// "Today" from the caller's point of view, used to reject past dates.
    pub reference_date: Option<NaiveDate>,
    pub flexible_dates: Option<bool>,
    pub reassembly: Option<bool>,
    pub bulky_furniture: Option<bool>,
    pub force_supplies: Option<bool>,
    pub packing_service: Option<bool>,
    pub piano: Option<bool>,
    pub selected_scenario: Option<String>,
    pub computed: ComputedContext,
}

impl QuoteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sites(&self) -> [(&'static str, &Site); 2] {
        [("pickup", &self.pickup), ("delivery", &self.delivery)]
    }

    pub fn wants_reassembly(&self) -> bool {
        self.reassembly.unwrap_or(false)
    }

    pub fn has_bulky_furniture(&self) -> bool {
        self.bulky_furniture.unwrap_or(false)
    }

    pub fn wants_supplies(&self) -> bool {
        self.force_supplies.unwrap_or(false)
    }

    pub fn wants_packing(&self) -> bool {
        self.packing_service.unwrap_or(false)
    }

    pub fn has_piano(&self) -> bool {
        self.piano.unwrap_or(false)
    }

    pub fn has_flexible_dates(&self) -> bool {
        self.flexible_dates.unwrap_or(false)
    }

    /// Same order, fresh accumulator.
    pub fn without_computed(&self) -> Self {
        Self {
            computed: ComputedContext::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case_form() {
        let json = serde_json::json!({
            "serviceType": "MOVING",
            "pickup": {"address": "1 rue de Rivoli", "floor": 4, "hasElevator": false},
            "delivery": {"address": "2 quai des Chartrons", "postalCode": "33000"},
            "volume": 30.0,
            "volumeConfidence": "MEDIUM",
            "movingDate": "2026-11-20",
            "reassembly": true
        });

        let ctx: QuoteContext = serde_json::from_value(json).unwrap();
        assert_eq!(ctx.service_type, Some(ServiceType::Moving));
        assert_eq!(ctx.pickup.floor(), 4);
        assert!(!ctx.pickup.has_elevator());
        assert_eq!(ctx.delivery.postal_code.as_deref(), Some("33000"));
        assert_eq!(ctx.volume_confidence, Some(VolumeConfidence::Medium));
        assert!(ctx.wants_reassembly());
        assert!(!ctx.has_piano());
        assert!(ctx.computed.activated_modules().is_empty());
    }

    #[test]
    fn test_floors_on_foot() {
        let mut site = Site {
            floor: Some(3),
            ..Site::default()
        };
        assert_eq!(site.floors_on_foot(), 3);

        site.has_elevator = Some(true);
        assert_eq!(site.floors_on_foot(), 0);

        site.has_elevator = Some(false);
        site.furniture_lift = Some(true);
        assert_eq!(site.floors_on_foot(), 0);

        let basement = Site {
            floor: Some(-1),
            ..Site::default()
        };
        assert_eq!(basement.floors_on_foot(), 0);
    }

    #[test]
    fn test_volume_confidence_parse() {
        assert_eq!(VolumeConfidence::parse(" medium "), Some(VolumeConfidence::Medium));
        assert_eq!(VolumeConfidence::parse("unknown"), None);
    }
}
