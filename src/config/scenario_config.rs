use crate::config::pricing::substitute_env_vars;
use crate::core::registry::ModuleRegistry;
use crate::core::scenario::{Scenario, ScenarioCatalog};
use crate::utils::error::{QuoteError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_unique, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scenario definitions read from a `[[scenarios]]` TOML document. When
/// given, they replace the built-in ECO/STANDARD/CONFORT/PREMIUM/FLEX set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub scenarios: Vec<Scenario>,
}

impl ScenarioConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(QuoteError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| QuoteError::ConfigValidationError {
            field: "scenario_toml_parsing".to_string(),
            message: format!("Scenario TOML parsing error: {}", e),
        })
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            return Err(QuoteError::MissingConfigError {
                field: "scenarios".to_string(),
            });
        }

        for scenario in &self.scenarios {
            validate_non_empty_string("scenarios.id", &scenario.id)?;
        }

        let ids: Vec<String> = self
            .scenarios
            .iter()
            .map(|s| s.id.trim().to_ascii_uppercase())
            .collect();
        validate_unique("scenarios.id", ids.iter().map(String::as_str))
    }

    pub fn into_catalog(self) -> Result<ScenarioCatalog> {
        ScenarioCatalog::new(self.scenarios)
    }

    /// Loads, validates and checks the scenarios against the module catalog they will run on.
    pub fn load_catalog<P: AsRef<Path>>(path: P, registry: &ModuleRegistry) -> Result<ScenarioCatalog> {
        let config = Self::from_file(&path)?;
        config.validate()?;
        let catalog = config.into_catalog()?;
        catalog.validate_against(registry)?;

        tracing::info!(
            "📄 Loaded {} scenarios from {}",
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }
}

impl Validate for ScenarioConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::pricing::PricingConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SCENARIOS: &str = r#"
[[scenarios]]
id = "BASIC"
label = "Basic"
disabled_modules = ["reassembly", "packing-service"]

[scenarios.price_adjustment]
multiplier = 0.9
minimum_price = 300.0

[[scenarios]]
id = "WHITE_GLOVE"
label = "White glove"

[scenarios.forced_context]
reassembly = true
packing_service = true

[scenarios.price_adjustment]
multiplier = 1.2
flat_amount = 50.0
"#;

    #[test]
    fn test_scenario_config_parsing() {
        let config = ScenarioConfig::from_toml_str(SCENARIOS).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.scenarios.len(), 2);

        let basic = &config.scenarios[0];
        assert_eq!(basic.overrides.disabled_modules.len(), 2);
        assert_eq!(basic.overrides.price_adjustment.multiplier, 0.9);
        assert_eq!(basic.overrides.price_adjustment.flat_amount, 0.0);
        assert_eq!(basic.overrides.price_adjustment.minimum_price, Some(300.0));
        assert!(basic.overrides.forced_context.is_empty());

        let glove = &config.scenarios[1];
        assert_eq!(glove.overrides.forced_context.reassembly, Some(true));
        assert_eq!(glove.overrides.forced_context.piano, None);
        assert_eq!(glove.overrides.price_adjustment.flat_amount, 50.0);
    }

    #[test]
    fn test_duplicate_ids_fail_validation() {
        let config = ScenarioConfig::from_toml_str(
            r#"
[[scenarios]]
id = "eco"

[[scenarios]]
id = "ECO"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let err = ScenarioConfig::from_toml_str("scenarios = []").unwrap().validate().unwrap_err();
        assert!(matches!(err, QuoteError::MissingConfigError { .. }));
        assert!(ScenarioConfig::from_toml_str("").is_err());
    }

    #[test]
    fn test_load_catalog_checks_module_ids() {
        let registry = ModuleRegistry::with_defaults(&PricingConfig::default()).unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SCENARIOS.as_bytes()).unwrap();
        let catalog = ScenarioConfig::load_catalog(file.path(), &registry).unwrap();
        assert_eq!(catalog.ids(), vec!["BASIC", "WHITE_GLOVE"]);

        let mut unknown = NamedTempFile::new().unwrap();
        unknown
            .write_all(b"[[scenarios]]\nid = \"X\"\ndisabled_modules = [\"teleportation\"]\n")
            .unwrap();
        assert!(ScenarioConfig::load_catalog(unknown.path(), &registry).is_err());
    }
}
