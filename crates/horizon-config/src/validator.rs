//! Configuration validation.

use crate::schema::Config;

/// Smallest `max_message_size` that still fits a `NEW_USER` request with headroom.
const MIN_MESSAGE_SIZE: usize = 128;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_store(config, &mut result);
        Self::validate_realtime(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        if config.store.path.is_empty() {
            result.add_error(ValidationError::new("store.path", "Store path cannot be empty"));
        }
    }

    fn validate_realtime(config: &Config, result: &mut ValidationResult) {
        let realtime = &config.realtime;

        if realtime.outbound_queue_capacity == 0 {
            result.add_error(ValidationError::new(
                "realtime.outbound_queue_capacity",
                "outbound_queue_capacity must be greater than 0",
            ));
        } else if realtime.outbound_queue_capacity > 4096 {
            result.add_warning(ValidationWarning::new(
                "realtime.outbound_queue_capacity",
                "outbound_queue_capacity is very high (>4096), slow clients may hold a lot of memory",
            ));
        }

        if realtime.max_message_size < MIN_MESSAGE_SIZE {
            result.add_error(ValidationError::new(
                "realtime.max_message_size",
                format!("max_message_size must be at least {} bytes", MIN_MESSAGE_SIZE),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
