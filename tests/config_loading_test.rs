use anyhow::Result;
use moving_quote::adapters::{JsonFormAdapter, TomlPricingSource};
use moving_quote::app::report;
use moving_quote::config::scenario_config::ScenarioConfig;
use moving_quote::core::{PricingConfigSource, QuoteInputAdapter, ScenarioCatalog};
use moving_quote::{ModuleRegistry, MultiQuoteService};
use std::io::Write;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

const ORDER: &str = r#"{
    "serviceType": "MOVING",
    "pickup": { "address": "12 rue des Lilas", "postalCode": "69003", "floor": 0 },
    "delivery": { "address": "4 avenue Foch", "postalCode": "69006", "floor": 0 },
    "distanceKm": 10,
    "volume": 30,
    "volumeConfidence": "MEDIUM",
    "movingDate": "2026-11-17",
    "referenceDate": "2026-10-16"
}"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_pricing_file_changes_the_quote() -> Result<()> {
    let pricing_file = write_temp(
        r#"
[labor]
hourly_rate = 40.0
"#,
    );

    let pricing = TomlPricingSource::new(pricing_file.path()).pricing_config()?;
    let service = MultiQuoteService::with_defaults(&pricing)?;
    let ctx = JsonFormAdapter::new().to_quote_context(ORDER)?;

    // 4 movers * 4.25 h * 40 = 680, + 270 trucks + 7 fuel = 957, margin 143.55
    let quotes = service.quote_all(&ctx)?;
    assert_eq!(quotes.base_cost, 1100.55);
    Ok(())
}

#[test]
fn test_invalid_pricing_file_is_rejected() {
    let pricing_file = write_temp(
        r#"
[commercial]
margin_rate = 3.5
"#,
    );

    let err = TomlPricingSource::new(pricing_file.path())
        .pricing_config()
        .unwrap_err();
    assert_eq!(
        err.category(),
        moving_quote::utils::error::ErrorCategory::Configuration
    );
}

#[test]
fn test_missing_pricing_file_is_a_system_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = TomlPricingSource::new(temp_dir.path().join("absent.toml"))
        .pricing_config()
        .unwrap_err();
    assert_eq!(err.category(), moving_quote::utils::error::ErrorCategory::System);
}

#[test]
fn test_scenario_file_replaces_defaults() -> Result<()> {
    std::env::set_var("MQ_IT_DISCOUNT", "0.9");
    let scenario_file = write_temp(
        r#"
[[scenarios]]
id = "BASIC"
label = "Basic"
disabled_modules = ["reassembly", "packing-supplies", "packing-service"]

[scenarios.price_adjustment]
multiplier = ${MQ_IT_DISCOUNT}

[[scenarios]]
id = "FULL"
label = "Everything included"

[scenarios.forced_context]
reassembly = true
force_supplies = true
"#,
    );

    let pricing = moving_quote::PricingConfig::default();
    let registry = ModuleRegistry::with_defaults(&pricing)?;
    let catalog = ScenarioConfig::load_catalog(scenario_file.path(), &registry)?;
    assert_eq!(catalog.ids(), vec!["BASIC", "FULL"]);

    let service = MultiQuoteService::new(Arc::new(registry), catalog);
    let ctx = JsonFormAdapter::new().to_quote_context(ORDER)?;
    let quotes = service.quote_all(&ctx)?;

    assert_eq!(quotes.get("BASIC").unwrap().final_price, 902.52);
    // same costs as CONFORT without its 5 % uplift
    assert_eq!(quotes.get("FULL").unwrap().final_price, 1249.48);
    Ok(())
}

#[test]
fn test_scenario_file_with_unknown_module_is_rejected() {
    let scenario_file = write_temp(
        r#"
[[scenarios]]
id = "BROKEN"
disabled_modules = ["teleportation"]
"#,
    );

    let registry = ModuleRegistry::with_defaults(&moving_quote::PricingConfig::default()).unwrap();
    assert!(ScenarioConfig::load_catalog(scenario_file.path(), &registry).is_err());
}

#[test]
fn test_csv_report_written_to_disk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output_path = temp_dir.path().join("quotes.csv");

    let pricing = moving_quote::PricingConfig::default();
    let service = MultiQuoteService::new(
        Arc::new(ModuleRegistry::with_defaults(&pricing)?),
        ScenarioCatalog::defaults(&pricing),
    );
    let ctx = JsonFormAdapter::new().to_quote_context(ORDER)?;
    let quotes = service.quote_all(&ctx)?;

    std::fs::write(&output_path, report::render_csv(&quotes)?)?;

    let content = std::fs::read_to_string(&output_path)?;
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("scenario,module,category,label,amount"));
    assert!(content.contains("STANDARD,,TOTAL,Standard,1002.80"));
    assert!(content.contains("ECO,base-labor,LABOR,"));
    Ok(())
}
