use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("[{module_id}] invalid input '{field}': {reason}")]
    FatalInput {
        module_id: String,
        field: String,
        reason: String,
    },

    #[error("[{module_id}] module failed: {message}")]
    ModuleFailed { module_id: String, message: String },

    #[error("[{module_id}] accumulator contract violated: {reason}")]
    ModuleContract { module_id: String, reason: String },

    #[error("Duplicate module id: {0}")]
    DuplicateModule(String),

    #[error("Module '{module_id}' has priority {priority}, expected a value in 10..=99")]
    InvalidPriority { module_id: String, priority: u16 },

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Duplicate scenario id: {0}")]
    DuplicateScenario(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Pipeline,
    Configuration,
    System,
}

impl QuoteError {
    pub fn fatal_input(module_id: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::FatalInput {
            module_id: module_id.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Module that raised the error, when the error came out of the pipeline.
    pub fn module_id(&self) -> Option<&str> {
        match self {
            Self::FatalInput { module_id, .. }
            | Self::ModuleFailed { module_id, .. }
            | Self::ModuleContract { module_id, .. } => Some(module_id),
            Self::InvalidPriority { module_id, .. } => Some(module_id),
            _ => None,
        }
    }

    pub fn is_fatal_input(&self) -> bool {
        matches!(self, Self::FatalInput { .. })
    }

    /// Tags an error escaping `module_id` so the caller can see where it came from.
    /// Errors that already name a module are returned unchanged.
    pub fn attributed_to(self, module_id: &str) -> Self {
        if self.module_id().is_some() {
            return self;
        }
        Self::ModuleFailed {
            module_id: module_id.to_string(),
            message: self.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FatalInput { .. } => ErrorCategory::Validation,
            Self::ModuleFailed { .. }
            | Self::ModuleContract { .. }
            | Self::DuplicateModule(_)
            | Self::InvalidPriority { .. } => ErrorCategory::Pipeline,
            Self::UnknownScenario(_)
            | Self::DuplicateScenario(_)
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) | Self::CsvError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::FatalInput { field, reason, .. } => {
                format!("The order cannot be quoted: {} ({})", reason, field)
            }
            Self::UnknownScenario(id) => format!("No offer named '{}' is available", id),
            Self::SerializationError(e) => format!("The order file is not valid JSON: {}", e),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => "Fix the order fields reported above and submit again",
            ErrorCategory::Pipeline => "The module catalog is inconsistent; check module ids and priorities",
            ErrorCategory::Configuration => "Check the pricing and scenario configuration files",
            ErrorCategory::System => "Check that the input files exist and are readable",
        }
    }
}

pub type Result<T> = std::result::Result<T, QuoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributed_to_keeps_existing_module() {
        let err = QuoteError::fatal_input("date-validation", "movingDate", "missing");
        let err = err.attributed_to("engine");
        assert_eq!(err.module_id(), Some("date-validation"));
        assert!(err.is_fatal_input());
    }

    #[test]
    fn test_attributed_to_wraps_foreign_errors() {
        let err = QuoteError::ConfigError {
            message: "bad tariff".to_string(),
        }
        .attributed_to("fuel-cost");
        assert_eq!(err.module_id(), Some("fuel-cost"));
        assert!(err.to_string().contains("bad tariff"));
        assert_eq!(err.category(), ErrorCategory::Pipeline);
    }

    #[test]
    fn test_fatal_input_message_names_module() {
        let err = QuoteError::fatal_input("mandatory-fields", "serviceType", "service type is required");
        assert_eq!(
            err.to_string(),
            "[mandatory-fields] invalid input 'serviceType': service type is required"
        );
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}
