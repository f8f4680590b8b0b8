use crate::utils::error::{QuoteError, Result};
use crate::utils::validation::{
    validate_non_negative, validate_positive_number, validate_range, validate_rate,
    validate_strictly_positive, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Numeric tariff read by the pricing modules.
///
/// Every section falls back to the built-in tariff, so a TOML file only has
/// to list the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub volume: VolumeRates,
    pub transport: TransportRates,
    pub labor: LaborRates,
    pub access: AccessRates,
    pub calendar: CalendarRates,
    pub risk: RiskRates,
    pub insurance: InsuranceRates,
    pub legal: LegalRates,
    pub options: OptionRates,
    pub commercial: CommercialRates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeRates {
    pub per_room_m3: f64,
    pub studio_base_m3: f64,
    pub margin_low: f64,
    pub margin_medium: f64,
    pub margin_high: f64,
    pub bulky_extra_m3: f64,
}

impl Default for VolumeRates {
    fn default() -> Self {
        Self {
            per_room_m3: 10.0,
            studio_base_m3: 5.0,
            margin_low: 0.15,
            margin_medium: 0.10,
            margin_high: 0.05,
            bulky_extra_m3: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckOption {
    pub label: String,
    pub capacity_m3: f64,
    pub rental_cost: f64,
}

/// One band of the long-distance surcharge. `span_km = None` covers everything left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurchargeTier {
    pub span_km: Option<f64>,
    pub rate_per_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportRates {
    pub default_distance_km: f64,
    pub fuel_cost_per_km: f64,
    pub long_distance_threshold_km: f64,
    pub surcharge_tiers: Vec<SurchargeTier>,
    pub trucks: Vec<TruckOption>,
    pub overnight_distance_km: f64,
}

impl Default for TransportRates {
    fn default() -> Self {
        Self {
            default_distance_km: 20.0,
            fuel_cost_per_km: 0.35,
            long_distance_threshold_km: 50.0,
            surcharge_tiers: vec![
                SurchargeTier {
                    span_km: Some(200.0),
                    rate_per_km: 0.15,
                },
                SurchargeTier {
                    span_km: None,
                    rate_per_km: 0.20,
                },
            ],
            trucks: vec![
                TruckOption {
                    label: "12m³ truck".to_string(),
                    capacity_m3: 12.0,
                    rental_cost: 90.0,
                },
                TruckOption {
                    label: "20m³ truck".to_string(),
                    capacity_m3: 20.0,
                    rental_cost: 130.0,
                },
                TruckOption {
                    label: "30m³ truck".to_string(),
                    capacity_m3: 30.0,
                    rental_cost: 180.0,
                },
            ],
            overnight_distance_km: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaborRates {
    pub default_workers: u32,
    pub max_workers: u32,
    pub m3_per_worker: f64,
    pub m3_per_worker_hour: f64,
    pub hourly_rate: f64,
    pub minimum_hours: f64,
    pub overnight_allowance_per_worker: f64,
}

impl Default for LaborRates {
    fn default() -> Self {
        Self {
            default_workers: 2,
            max_workers: 8,
            m3_per_worker: 10.0,
            m3_per_worker_hour: 2.0,
            hourly_rate: 35.0,
            minimum_hours: 3.0,
            overnight_allowance_per_worker: 90.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRates {
    pub floor_penalty: f64,
    pub free_carry_distance_m: f64,
    pub carry_step_m: f64,
    pub carry_penalty_per_step: f64,
    pub furniture_lift_cost: f64,
}

impl Default for AccessRates {
    fn default() -> Self {
        Self {
            floor_penalty: 25.0,
            free_carry_distance_m: 10.0,
            carry_step_m: 10.0,
            carry_penalty_per_step: 15.0,
            furniture_lift_cost: 250.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarRates {
    pub weekend_rate: f64,
    pub high_season_months: Vec<u32>,
    pub high_season_rate: f64,
    pub short_notice_days: i64,
    pub short_notice_rate: f64,
    pub flexible_discount_rate: f64,
}

impl Default for CalendarRates {
    fn default() -> Self {
        Self {
            weekend_rate: 0.10,
            high_season_months: vec![6, 7, 8, 9],
            high_season_rate: 0.15,
            short_notice_days: 7,
            short_notice_rate: 0.10,
            flexible_discount_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskRates {
    pub volume_base_low: f64,
    pub volume_base_medium: f64,
    pub volume_base_high: f64,
    pub volume_diff_threshold: f64,
    pub volume_diff_penalty: f64,
    pub volume_cap: f64,
    pub access_floor_threshold: i32,
    pub access_risk_per_site: f64,
    pub carry_risk_distance_m: f64,
    pub carry_risk: f64,
    pub declared_value_medium: f64,
    pub declared_value_medium_risk: f64,
    pub declared_value_high: f64,
    pub declared_value_high_risk: f64,
    pub max_score: f64,
    pub manual_review_threshold: f64,
}

impl Default for RiskRates {
    fn default() -> Self {
        Self {
            volume_base_low: 15.0,
            volume_base_medium: 8.0,
            volume_base_high: 3.0,
            volume_diff_threshold: 0.15,
            volume_diff_penalty: 10.0,
            volume_cap: 30.0,
            access_floor_threshold: 3,
            access_risk_per_site: 5.0,
            carry_risk_distance_m: 30.0,
            carry_risk: 5.0,
            declared_value_medium: 20_000.0,
            declared_value_medium_risk: 5.0,
            declared_value_high: 50_000.0,
            declared_value_high_risk: 10.0,
            max_score: 100.0,
            manual_review_threshold: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsuranceRates {
    pub rate: f64,
    pub minimum_premium: f64,
    pub coverage_per_m3: f64,
    pub high_value_threshold: f64,
}

impl Default for InsuranceRates {
    fn default() -> Self {
        Self {
            rate: 0.005,
            minimum_premium: 15.0,
            coverage_per_m3: 400.0,
            high_value_threshold: 50_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalRates {
    pub dense_postal_prefixes: Vec<String>,
    pub parking_authorization_fee: f64,
    pub parking_lead_days: i64,
}

impl Default for LegalRates {
    fn default() -> Self {
        Self {
            dense_postal_prefixes: vec!["75".to_string()],
            parking_authorization_fee: 35.0,
            parking_lead_days: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionRates {
    pub reassembly_per_m3: f64,
    pub reassembly_proposal_min_m3: f64,
    pub supplies_per_m3: f64,
    pub packing_per_m3: f64,
    pub packing_proposal_min_m3: f64,
    pub piano_flat: f64,
    pub piano_per_floor: f64,
    pub bulky_handling: f64,
}

impl Default for OptionRates {
    fn default() -> Self {
        Self {
            reassembly_per_m3: 4.0,
            reassembly_proposal_min_m3: 15.0,
            supplies_per_m3: 2.5,
            packing_per_m3: 12.0,
            packing_proposal_min_m3: 20.0,
            piano_flat: 180.0,
            piano_per_floor: 30.0,
            bulky_handling: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommercialRates {
    pub margin_rate: f64,
    pub minimum_price: f64,
}

impl Default for CommercialRates {
    fn default() -> Self {
        Self {
            margin_rate: 0.15,
            minimum_price: 350.0,
        }
    }
}

impl PricingConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(QuoteError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| QuoteError::ConfigValidationError {
            field: "pricing_toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn validate_config(&self) -> Result<()> {
        let v = &self.volume;
        validate_strictly_positive("volume.per_room_m3", v.per_room_m3)?;
        validate_non_negative("volume.studio_base_m3", v.studio_base_m3)?;
        validate_rate("volume.margin_low", v.margin_low)?;
        validate_rate("volume.margin_medium", v.margin_medium)?;
        validate_rate("volume.margin_high", v.margin_high)?;
        validate_non_negative("volume.bulky_extra_m3", v.bulky_extra_m3)?;

        let t = &self.transport;
        validate_non_negative("transport.default_distance_km", t.default_distance_km)?;
        validate_non_negative("transport.fuel_cost_per_km", t.fuel_cost_per_km)?;
        validate_non_negative("transport.long_distance_threshold_km", t.long_distance_threshold_km)?;
        validate_non_negative("transport.overnight_distance_km", t.overnight_distance_km)?;
        self.validate_trucks()?;
        self.validate_tiers()?;

        let l = &self.labor;
        validate_positive_number("labor.default_workers", l.default_workers as usize, 1)?;
        validate_positive_number("labor.max_workers", l.max_workers as usize, l.default_workers as usize)?;
        validate_strictly_positive("labor.m3_per_worker", l.m3_per_worker)?;
        validate_strictly_positive("labor.m3_per_worker_hour", l.m3_per_worker_hour)?;
        validate_non_negative("labor.hourly_rate", l.hourly_rate)?;
        validate_non_negative("labor.minimum_hours", l.minimum_hours)?;
        validate_non_negative("labor.overnight_allowance_per_worker", l.overnight_allowance_per_worker)?;

        let a = &self.access;
        validate_non_negative("access.floor_penalty", a.floor_penalty)?;
        validate_non_negative("access.free_carry_distance_m", a.free_carry_distance_m)?;
        validate_strictly_positive("access.carry_step_m", a.carry_step_m)?;
        validate_non_negative("access.carry_penalty_per_step", a.carry_penalty_per_step)?;
        validate_non_negative("access.furniture_lift_cost", a.furniture_lift_cost)?;

        let c = &self.calendar;
        validate_rate("calendar.weekend_rate", c.weekend_rate)?;
        validate_rate("calendar.high_season_rate", c.high_season_rate)?;
        validate_rate("calendar.short_notice_rate", c.short_notice_rate)?;
        validate_rate("calendar.flexible_discount_rate", c.flexible_discount_rate)?;
        validate_range("calendar.short_notice_days", c.short_notice_days, 0, 365)?;
        for month in &c.high_season_months {
            validate_range("calendar.high_season_months", *month, 1, 12)?;
        }

        let r = &self.risk;
        validate_strictly_positive("risk.max_score", r.max_score)?;
        validate_range("risk.volume_cap", r.volume_cap, 0.0, r.max_score)?;
        validate_rate("risk.volume_diff_threshold", r.volume_diff_threshold)?;
        validate_range(
            "risk.manual_review_threshold",
            r.manual_review_threshold,
            0.0,
            r.max_score,
        )?;

        let i = &self.insurance;
        validate_rate("insurance.rate", i.rate)?;
        validate_non_negative("insurance.minimum_premium", i.minimum_premium)?;
        validate_non_negative("insurance.coverage_per_m3", i.coverage_per_m3)?;

        validate_non_negative("legal.parking_authorization_fee", self.legal.parking_authorization_fee)?;

        let o = &self.options;
        for (field, value) in [
            ("options.reassembly_per_m3", o.reassembly_per_m3),
            ("options.supplies_per_m3", o.supplies_per_m3),
            ("options.packing_per_m3", o.packing_per_m3),
            ("options.piano_flat", o.piano_flat),
            ("options.piano_per_floor", o.piano_per_floor),
            ("options.bulky_handling", o.bulky_handling),
        ] {
            validate_non_negative(field, value)?;
        }

        validate_rate("commercial.margin_rate", self.commercial.margin_rate)?;
        validate_non_negative("commercial.minimum_price", self.commercial.minimum_price)?;

        Ok(())
    }

    fn validate_trucks(&self) -> Result<()> {
        if self.transport.trucks.is_empty() {
            return Err(QuoteError::ConfigValidationError {
                field: "transport.trucks".to_string(),
                message: "At least one truck must be configured".to_string(),
            });
        }
        for truck in &self.transport.trucks {
            validate_strictly_positive("transport.trucks.capacity_m3", truck.capacity_m3)?;
            validate_non_negative("transport.trucks.rental_cost", truck.rental_cost)?;
        }
        Ok(())
    }

    fn validate_tiers(&self) -> Result<()> {
        let tiers = &self.transport.surcharge_tiers;
        for (i, tier) in tiers.iter().enumerate() {
            validate_non_negative("transport.surcharge_tiers.rate_per_km", tier.rate_per_km)?;
            match tier.span_km {
                Some(span) => validate_strictly_positive("transport.surcharge_tiers.span_km", span)?,
                None if i + 1 < tiers.len() => {
                    return Err(QuoteError::ConfigValidationError {
                        field: "transport.surcharge_tiers".to_string(),
                        message: "Only the last surcharge tier may be open-ended".to_string(),
                    })
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Trucks sorted by ascending capacity.
    pub fn fleet(&self) -> Vec<TruckOption> {
        let mut trucks = self.transport.trucks.clone();
        trucks.sort_by(|a, b| a.capacity_m3.total_cmp(&b.capacity_m3));
        trucks
    }
}

impl Validate for PricingConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
pub(crate) fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| QuoteError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = PricingConfig::from_toml_str("").unwrap();
        assert_eq!(config, PricingConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let toml_content = r#"
[access]
floor_penalty = 30.0

[labor]
hourly_rate = 40.0

[[transport.trucks]]
label = "van"
capacity_m3 = 8.0
rental_cost = 60.0
"#;

        let config = PricingConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.access.floor_penalty, 30.0);
        assert_eq!(config.access.furniture_lift_cost, 250.0);
        assert_eq!(config.labor.hourly_rate, 40.0);
        assert_eq!(config.labor.default_workers, 2);
        assert_eq!(config.transport.trucks.len(), 1);
        assert_eq!(config.transport.fuel_cost_per_km, 0.35);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MQ_TEST_HOURLY_RATE", "42.5");

        let config = PricingConfig::from_toml_str(
            r#"
[labor]
hourly_rate = ${MQ_TEST_HOURLY_RATE}
"#,
        )
        .unwrap();
        assert_eq!(config.labor.hourly_rate, 42.5);

        std::env::remove_var("MQ_TEST_HOURLY_RATE");
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = PricingConfig::from_toml_str("[labor\nhourly_rate = 1").unwrap_err();
        assert!(matches!(err, QuoteError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PricingConfig::default();
        config.calendar.weekend_rate = 2.0;
        assert!(config.validate().is_err());

        let mut config = PricingConfig::default();
        config.transport.trucks.clear();
        assert!(config.validate().is_err());

        let mut config = PricingConfig::default();
        config.transport.surcharge_tiers = vec![
            SurchargeTier {
                span_km: None,
                rate_per_km: 0.1,
            },
            SurchargeTier {
                span_km: Some(100.0),
                rate_per_km: 0.2,
            },
        ];
        assert!(config.validate().is_err());

        let mut config = PricingConfig::default();
        config.calendar.high_season_months = vec![13];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fleet_is_sorted_by_capacity() {
        let mut config = PricingConfig::default();
        config.transport.trucks.reverse();
        let capacities: Vec<f64> = config.fleet().iter().map(|t| t.capacity_m3).collect();
        assert_eq!(capacities, vec![12.0, 20.0, 30.0]);
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[commercial]\nminimum_price = 500.0\n")
            .unwrap();

        let config = PricingConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.commercial.minimum_price, 500.0);
        assert_eq!(config.commercial.margin_rate, 0.15);
    }
}
