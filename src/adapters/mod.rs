// Adapters layer: concrete collaborators behind the domain ports.

use crate::config::pricing::PricingConfig;
use crate::domain::model::QuoteContext;
use crate::domain::ports::{PricingConfigSource, QuoteInputAdapter};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;

/// Reads a camelCase JSON form submission.
#[derive(Debug, Clone, Default)]
pub struct JsonFormAdapter {
    today: Option<NaiveDate>,
}

impl JsonFormAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps `date` instead of the system date on forms without a `referenceDate`.
    pub fn with_today(mut self, date: NaiveDate) -> Self {
        self.today = Some(date);
        self
    }
}

impl QuoteInputAdapter for JsonFormAdapter {
    fn to_quote_context(&self, raw: &str) -> Result<QuoteContext> {
        let mut ctx: QuoteContext = serde_json::from_str(raw)?;
        if ctx.reference_date.is_none() {
            ctx.reference_date = Some(self.today.unwrap_or_else(|| Utc::now().date_naive()));
        }
        tracing::debug!("Parsed order form ({:?})", ctx.service_type);
        Ok(ctx)
    }
}

/// Tariff loaded from a TOML file and validated on every read.
#[derive(Debug, Clone)]
pub struct TomlPricingSource {
    path: PathBuf,
}

impl TomlPricingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PricingConfigSource for TomlPricingSource {
    fn pricing_config(&self) -> Result<PricingConfig> {
        let config = PricingConfig::from_file(&self.path)?;
        config.validate()?;
        tracing::info!("📄 Pricing loaded from {}", self.path.display());
        Ok(config)
    }
}

/// Fixed in-memory tariff, the built-in one by default.
#[derive(Debug, Clone, Default)]
pub struct StaticPricingSource {
    config: PricingConfig,
}

impl StaticPricingSource {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }
}

impl PricingConfigSource for StaticPricingSource {
    fn pricing_config(&self) -> Result<PricingConfig> {
        Ok(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_json_form_stamps_reference_date() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let adapter = JsonFormAdapter::new().with_today(today);

        let ctx = adapter
            .to_quote_context(r#"{"serviceType": "MOVING", "volume": 20, "movingDate": "2026-11-17"}"#)
            .unwrap();
        assert_eq!(ctx.reference_date, Some(today));
        assert_eq!(ctx.volume, Some(20.0));

        let ctx = adapter
            .to_quote_context(r#"{"referenceDate": "2026-09-01"}"#)
            .unwrap();
        assert_eq!(ctx.reference_date, NaiveDate::from_ymd_opt(2026, 9, 1));
    }

    #[test]
    fn test_json_form_rejects_malformed_input() {
        let err = JsonFormAdapter::new().to_quote_context("{not json").unwrap_err();
        assert!(matches!(err, crate::utils::error::QuoteError::SerializationError(_)));
    }

    #[test]
    fn test_toml_pricing_source() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[labor]\nhourly_rate = 38.0\n").unwrap();

        let config = TomlPricingSource::new(file.path()).pricing_config().unwrap();
        assert_eq!(config.labor.hourly_rate, 38.0);

        let mut invalid = NamedTempFile::new().unwrap();
        invalid.write_all(b"[commercial]\nmargin_rate = 3.0\n").unwrap();
        assert!(TomlPricingSource::new(invalid.path()).pricing_config().is_err());
    }

    #[test]
    fn test_static_pricing_source() {
        let source = StaticPricingSource::default();
        assert_eq!(source.pricing_config().unwrap(), PricingConfig::default());
    }
}
