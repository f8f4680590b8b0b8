pub mod accumulator;
pub mod engine;
pub mod module;
pub mod multi_quote;
pub mod registry;
pub mod scenario;

pub use crate::domain::model::QuoteContext;
pub use crate::domain::ports::{PricingConfigSource, QuoteInputAdapter};
pub use crate::utils::error::Result;
pub use accumulator::ComputedContext;
pub use engine::{BaseCostEngine, BaseCostResult, StepStatus};
pub use module::{Applicability, QuoteModule};
pub use multi_quote::{MultiQuote, MultiQuoteService, ScenarioQuote};
pub use registry::ModuleRegistry;
pub use scenario::{ContextPatch, PriceAdjustment, Scenario, ScenarioCatalog, ScenarioOverride};
