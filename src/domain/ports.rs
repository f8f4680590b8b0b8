use crate::config::pricing::PricingConfig;
use crate::domain::model::QuoteContext;
use crate::utils::error::Result;

/// Turns a raw order submission into a typed context.
pub trait QuoteInputAdapter: Send + Sync {
    fn to_quote_context(&self, raw: &str) -> Result<QuoteContext>;
}

/// Supplies the numeric tariff the pricing modules read.
pub trait PricingConfigSource: Send + Sync {
    fn pricing_config(&self) -> Result<PricingConfig>;
}
