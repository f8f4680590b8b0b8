use anyhow::Context;
use clap::Parser;
use moving_quote::adapters::{JsonFormAdapter, StaticPricingSource, TomlPricingSource};
use moving_quote::app::report;
use moving_quote::config::scenario_config::ScenarioConfig;
use moving_quote::config::OutputFormat;
use moving_quote::core::{PricingConfigSource, QuoteInputAdapter, ScenarioCatalog};
use moving_quote::utils::error::ErrorCategory;
use moving_quote::utils::{logger, validation::Validate};
use moving_quote::{CliConfig, ModuleRegistry, MultiQuoteService, QuoteError};
use std::io::Read;
use std::sync::Arc;

fn main() {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting moving-quote CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match run(&config) {
        Ok(destination) => {
            tracing::info!("✅ Quote completed, report written to {}", destination);
        }
        Err(e) => {
            let Some(quote_error) = e.downcast_ref::<QuoteError>() else {
                tracing::error!("❌ Quote failed: {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            };
            tracing::error!(
                "❌ Quote failed: {:#} (Category: {:?})",
                e,
                quote_error.category()
            );
            tracing::error!("💡 Recovery suggestion: {}", quote_error.recovery_suggestion());

            eprintln!("❌ {}", quote_error.user_friendly_message());
            eprintln!("💡 {}", quote_error.recovery_suggestion());

            let exit_code = match quote_error.category() {
                ErrorCategory::Validation => 2,
                ErrorCategory::Configuration => 3,
                ErrorCategory::Pipeline => 4,
                ErrorCategory::System => 1,
            };
            std::process::exit(exit_code);
        }
    }
}

fn run(config: &CliConfig) -> anyhow::Result<String> {
    let pricing = match &config.pricing {
        Some(path) => TomlPricingSource::new(path)
            .pricing_config()
            .with_context(|| format!("loading pricing from {}", path))?,
        None => StaticPricingSource::default().pricing_config()?,
    };

    let registry = ModuleRegistry::with_defaults(&pricing)?;
    let scenarios = match &config.scenarios {
        Some(path) => ScenarioConfig::load_catalog(path, &registry)
            .with_context(|| format!("loading scenarios from {}", path))?,
        None => ScenarioCatalog::defaults(&pricing),
    };
    tracing::info!(
        "🔄 {} modules, {} scenarios",
        registry.len(),
        scenarios.len()
    );
    let service = MultiQuoteService::new(Arc::new(registry), scenarios);

    let raw = read_input(config.input.as_deref())?;

    let mut ctx = JsonFormAdapter::new().to_quote_context(&raw)?;
    if let Some(id) = &config.scenario {
        ctx.selected_scenario = Some(id.clone());
    }
    let quotes = service.quote_selected(&ctx)?;

    let rendered = match config.format {
        OutputFormat::Json => report::render_json(&quotes)?,
        OutputFormat::Csv => report::render_csv(&quotes)?,
    };

    match &config.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(QuoteError::IoError)
                .with_context(|| format!("writing report to {}", path))?;
            Ok(path.clone())
        }
        None => {
            println!("{}", rendered);
            Ok("stdout".to_string())
        }
    }
}

fn read_input(path: Option<&str>) -> Result<String, QuoteError> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            Ok(raw)
        }
    }
}
