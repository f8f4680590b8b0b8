pub mod pricing;
pub mod scenario_config;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_non_empty_string, validate_path, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "moving-quote")]
#[command(about = "Prices a moving order under every commercial scenario")]
pub struct CliConfig {
    #[arg(long, help = "Order form as JSON; reads stdin when omitted")]
    pub input: Option<String>,

    #[arg(long, help = "Pricing tariff TOML; built-in tariff when omitted")]
    pub pricing: Option<String>,

    #[arg(long, help = "Scenario definitions TOML; replaces the default scenarios")]
    pub scenarios: Option<String>,

    #[arg(long, help = "Quote a single scenario instead of all of them")]
    pub scenario: Option<String>,

    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    #[arg(long, help = "Write the report to this file instead of stdout")]
    pub output: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("input", &self.input),
            ("pricing", &self.pricing),
            ("scenarios", &self.scenarios),
            ("output", &self.output),
        ] {
            if let Some(path) = path {
                validate_path(field, path)?;
            }
        }
        if let Some(scenario) = &self.scenario {
            validate_non_empty_string("scenario", scenario)?;
        }
        Ok(())
    }
}
