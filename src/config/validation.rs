//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, chunk sizes within GELF limits)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LoggingOptions → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::schema::LoggingOptions;

/// Smallest chunk that still leaves room for the 12-byte GELF chunk header.
pub const MIN_GELF_CHUNK_SIZE: usize = 512;

/// Largest UDP payload.
pub const MAX_GELF_CHUNK_SIZE: usize = 65_507;

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint on `options`.
pub fn validate_options(options: &LoggingOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if options.poll_interval_secs == 0 {
        errors.push(ValidationError::new("poll_interval_secs", "must be greater than 0"));
    }
    if options.seq.batch_size == 0 {
        errors.push(ValidationError::new("seq.batch_size", "must be greater than 0"));
    }
    if options.seq.flush_interval_ms == 0 {
        errors.push(ValidationError::new("seq.flush_interval_ms", "must be greater than 0"));
    }
    if options.seq.request_timeout_secs == 0 {
        errors.push(ValidationError::new("seq.request_timeout_secs", "must be greater than 0"));
    }
    if options.seq.queue_capacity == 0 {
        errors.push(ValidationError::new("seq.queue_capacity", "must be greater than 0"));
    }
    if !(MIN_GELF_CHUNK_SIZE..=MAX_GELF_CHUNK_SIZE).contains(&options.gelf.max_chunk_size) {
        errors.push(ValidationError::new(
            "gelf.max_chunk_size",
            format!(
                "must be between {} and {}",
                MIN_GELF_CHUNK_SIZE, MAX_GELF_CHUNK_SIZE
            ),
        ));
    }
    if options.gelf.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("gelf.connect_timeout_secs", "must be greater than 0"));
    }
    if options.gelf.queue_capacity == 0 {
        errors.push(ValidationError::new("gelf.queue_capacity", "must be greater than 0"));
    }
    if options.gelf.retry_initial_ms == 0 {
        errors.push(ValidationError::new("gelf.retry_initial_ms", "must be greater than 0"));
    }
    if options.gelf.retry_max_ms < options.gelf.retry_initial_ms {
        errors.push(ValidationError::new(
            "gelf.retry_max_ms",
            "must not be less than gelf.retry_initial_ms",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
