pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::config::pricing::PricingConfig;
pub use crate::core::{BaseCostEngine, ModuleRegistry, MultiQuoteService, QuoteContext};
pub use crate::utils::error::{QuoteError, Result};
